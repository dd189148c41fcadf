//! Linear rational-expectations system with one occasionally binding constraint

use crate::error::{Error, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk form of a [`LinearSystem`]. Matrices are row-major nested arrays.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemSpec {
    /// Number of jump variables
    pub dim_x: usize,
    /// Total state size; inferred from `A` when absent
    #[serde(default)]
    pub dim_y: Option<usize>,
    /// Transition while the constraint binds
    #[serde(rename = "N")]
    pub n: Vec<Vec<f64>>,
    /// Terminal condition selecting the stable manifold
    #[serde(rename = "J")]
    pub j: Vec<Vec<f64>>,
    /// Transition while the constraint is slack
    #[serde(rename = "A")]
    pub a: Vec<Vec<f64>>,
    /// Per-period constant while the constraint binds
    pub cx: Vec<f64>,
    /// Constraint row
    pub b: Vec<f64>,
    /// Constraint bound
    pub x_bar: f64,
}

/// `y = [x; v]` with `x` the `dim_x` jump variables and `v` the state.
#[derive(Clone, Debug)]
pub struct LinearSystem {
    pub(crate) n: DMatrix<f64>,
    pub(crate) j: DMatrix<f64>,
    pub(crate) a: DMatrix<f64>,
    pub(crate) cx: DVector<f64>,
    pub(crate) b: DVector<f64>,
    pub(crate) x_bar: f64,
    pub(crate) dim_x: usize,
}

fn shape(m: &DMatrix<f64>) -> String {
    format!("{}x{}", m.nrows(), m.ncols())
}

fn check_shape(name: &'static str, m: &DMatrix<f64>, rows: usize, cols: usize) -> Result<()> {
    if m.nrows() != rows || m.ncols() != cols {
        return Err(Error::Dimension { name, expected: format!("{rows}x{cols}"), got: shape(m) });
    }
    if m.iter().any(|x| !x.is_finite()) {
        return Err(Error::NonFinite(name));
    }
    Ok(())
}

fn check_len(name: &'static str, v: &DVector<f64>, len: usize) -> Result<()> {
    if v.len() != len {
        return Err(Error::Dimension { name, expected: len.to_string(), got: v.len().to_string() });
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(Error::NonFinite(name));
    }
    Ok(())
}

fn rows_to_matrix(name: &'static str, rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let ncols = rows.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = rows.iter().find(|r| r.len() != ncols) {
        return Err(Error::Dimension {
            name,
            expected: format!("{ncols} columns in every row"),
            got: format!("a row with {}", bad.len()),
        });
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}

impl LinearSystem {
    /// Builds a system, checking that all shapes agree with `dim_x` and `A`.
    pub fn new(
        n: DMatrix<f64>,
        j: DMatrix<f64>,
        a: DMatrix<f64>,
        cx: DVector<f64>,
        b: DVector<f64>,
        x_bar: f64,
        dim_x: usize,
    ) -> Result<Self> {
        let dim_y = a.nrows();
        check_shape("A", &a, dim_y, dim_y)?;
        if dim_x == 0 || dim_x >= dim_y {
            return Err(Error::InvalidArgument(format!(
                "require 0 < dim_x < dim_y; got dim_x={dim_x}, dim_y={dim_y}"
            )));
        }
        check_shape("N", &n, dim_y, dim_y)?;
        check_shape("J", &j, dim_x, dim_y)?;
        check_len("cx", &cx, dim_y)?;
        check_len("b", &b, dim_y)?;
        if !x_bar.is_finite() {
            return Err(Error::NonFinite("x_bar"));
        }
        Ok(Self { n, j, a, cx, b, x_bar, dim_x })
    }

    /// Parses a JSON [`SystemSpec`].
    pub fn from_json(s: &str) -> Result<Self> {
        let spec: SystemSpec = serde_json::from_str(s)?;
        Self::try_from(spec)
    }

    /// Reads and parses a JSON [`SystemSpec`] file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Same system with another constraint bound.
    pub fn with_x_bar(&self, x_bar: f64) -> Result<Self> {
        if !x_bar.is_finite() {
            return Err(Error::NonFinite("x_bar"));
        }
        Ok(Self { x_bar, ..self.clone() })
    }

    /// Number of jump variables.
    pub fn dim_x(&self) -> usize { self.dim_x }
    /// Total state size.
    pub fn dim_y(&self) -> usize { self.a.nrows() }
    /// Size of the predetermined state `v`.
    pub fn dim_v(&self) -> usize { self.dim_y() - self.dim_x }
    /// Constraint bound.
    pub fn x_bar(&self) -> f64 { self.x_bar }
    /// Constraint row.
    pub fn b(&self) -> &DVector<f64> { &self.b }

    /// Checks that `v` is a state vector of this system.
    pub fn check_state(&self, v: &DVector<f64>) -> Result<()> {
        check_len("v", v, self.dim_v())
    }
}

impl TryFrom<SystemSpec> for LinearSystem {
    type Error = Error;

    fn try_from(spec: SystemSpec) -> Result<Self> {
        let a = rows_to_matrix("A", &spec.a)?;
        if let Some(dim_y) = spec.dim_y {
            if dim_y != a.nrows() {
                return Err(Error::Dimension {
                    name: "dim_y",
                    expected: a.nrows().to_string(),
                    got: dim_y.to_string(),
                });
            }
        }
        Self::new(
            rows_to_matrix("N", &spec.n)?,
            rows_to_matrix("J", &spec.j)?,
            a,
            DVector::from_vec(spec.cx),
            DVector::from_vec(spec.b),
            spec.x_bar,
            spec.dim_x,
        )
    }
}
