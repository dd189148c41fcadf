//! The (l, k) search for occasionally binding constraints.
//!
//! A regime `(l, k)` says the constraint is slack for `l` periods and then
//! binds for `k` periods, after which the system is back on its stable
//! manifold. For a given state `v` the search walks `(l, k)` until the
//! regime is consistent with the constraint `b·y ≥ x_bar` it implies.
//!
//! Two evaluators provide the state `y_s` implied by a regime: [`Direct`]
//! recomputes the matrix powers on every call, [`Precalc`] reads them from
//! tables built once per system.

use crate::error::{Error, Result};
use crate::linalg::{geom_series, matrix_power};
use crate::system::LinearSystem;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Outer passes before the l-search is abandoned.
pub const MAX_PASSES: usize = 100_000;

/// Default k bound of [`boehlgorithm_jit`].
pub const DEFAULT_K_MAX: usize = 20;

/// Default table sizes of [`Precalc::new`].
pub const DEFAULT_LL_MAX: usize = 5;
/// See [`DEFAULT_LL_MAX`].
pub const DEFAULT_KK_MAX: usize = 30;

/// Where the l- and k-searches give up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    /// Reaching this l resets l to 0 (constraint treated as slack)
    pub l_max: usize,
    /// Reaching this k stops the k-search
    pub k_max: usize,
}

/// Outcome of one search.
#[derive(Clone, Debug)]
pub struct Solution {
    /// Next period's state `v`
    pub v_next: DVector<f64>,
    /// Periods before the constraint binds
    pub l: usize,
    /// Periods the constraint binds
    pub k: usize,
    /// Outer passes taken
    pub passes: usize,
    /// The k-search hit its limit in the final pass
    pub k_capped: bool,
    /// The pass budget ran out and l was forced to 0
    pub budget_exhausted: bool,
}

/// Anything that can produce `y_s` for a regime `(l, k)`.
pub trait Evaluator {
    /// Search bounds compatible with this evaluator.
    fn limits(&self) -> SearchLimits;

    /// State at horizon `s` under regime `(l, k)` starting from `v`.
    fn ll(&self, l: usize, k: usize, s: usize, v: &DVector<f64>) -> Result<DVector<f64>>;
}

/// `(S, s)` with `x = S v + s`, the jump variables implied by `(l, k)`.
pub fn create_ss(sys: &LinearSystem, l: usize, k: usize) -> Result<(DMatrix<f64>, DVector<f64>)> {
    let dim_x = sys.dim_x();
    let jn = &sys.j * matrix_power(&sys.n, k) * matrix_power(&sys.a, l);
    let term = &sys.j * geom_series(&sys.n, k) * &sys.cx;
    let core = -jn
        .columns(0, dim_x)
        .clone_owned()
        .try_inverse()
        .ok_or(Error::Singular { l, k })?;
    Ok((&core * jn.columns(dim_x, sys.dim_v()), &core * term))
}

/// `(N^k0 A^l0, G_k0(N) cx)` with `k0 = max(s-l, 0)` and `l0 = min(l, s)`.
pub fn create_ll(sys: &LinearSystem, l: usize, s: usize) -> (DMatrix<f64>, DVector<f64>) {
    let k0 = s.saturating_sub(l);
    let l0 = l.min(s);
    let matrices = matrix_power(&sys.n, k0) * matrix_power(&sys.a, l0);
    let term = geom_series(&sys.n, k0) * &sys.cx;
    (matrices, term)
}

/// Jump variables `x` for state `v` under regime `(l, k)`.
pub fn ss_direct(sys: &LinearSystem, l: usize, k: usize, v: &DVector<f64>) -> Result<DVector<f64>> {
    let (mat, term) = create_ss(sys, l, k)?;
    Ok(mat * v + term)
}

fn propagate(
    (matrices, term): (&DMatrix<f64>, &DVector<f64>),
    dim_x: usize,
    x: &DVector<f64>,
    v: &DVector<f64>,
) -> DVector<f64> {
    let dim_v = matrices.ncols() - dim_x;
    matrices.columns(0, dim_x) * x + matrices.columns(dim_x, dim_v) * v + term
}

/// `y_s` under regime `(l, k)`, recomputed from scratch. With `k = 0` the
/// constraint never binds and `l` is replaced by `s`.
pub fn ll_direct(
    sys: &LinearSystem,
    l: usize,
    k: usize,
    s: usize,
    v: &DVector<f64>,
) -> Result<DVector<f64>> {
    let l = if k == 0 { s } else { l };
    let x = ss_direct(sys, l, k, v)?;
    let (matrices, term) = create_ll(sys, l, s);
    Ok(propagate((&matrices, &term), sys.dim_x(), &x, v))
}

/// Evaluator that recomputes every matrix power.
#[derive(Clone, Copy, Debug)]
pub struct Direct<'a> {
    system: &'a LinearSystem,
    k_max: usize,
}

impl<'a> Direct<'a> {
    /// Direct evaluation; both searches give up past `k_max`.
    pub fn new(system: &'a LinearSystem, k_max: usize) -> Self {
        Self { system, k_max }
    }
}

impl Evaluator for Direct<'_> {
    fn limits(&self) -> SearchLimits {
        SearchLimits { l_max: self.k_max + 1, k_max: self.k_max + 1 }
    }

    fn ll(&self, l: usize, k: usize, s: usize, v: &DVector<f64>) -> Result<DVector<f64>> {
        ll_direct(self.system, l, k, s, v)
    }
}

/// Tables of `create_ss(l, k)` and `create_ll(l, s)`.
#[derive(Clone, Debug)]
pub struct Precalc {
    ll_max: usize,
    kk_max: usize,
    dim_x: usize,
    dim_y: usize,
    // row-major over (l, k); None where the terminal block is singular
    ss: Vec<Option<(DMatrix<f64>, DVector<f64>)>>,
    // row-major over (l, s), s < ll_max + kk_max
    ll: Vec<(DMatrix<f64>, DVector<f64>)>,
}

impl Precalc {
    /// Builds the tables for `l < ll_max`, `k < kk_max` and `s < ll_max + kk_max`.
    pub fn new(sys: &LinearSystem, ll_max: usize, kk_max: usize) -> Result<Self> {
        if ll_max < 2 || kk_max < 1 {
            return Err(Error::InvalidArgument(format!(
                "precalc needs ll_max >= 2 and kk_max >= 1; got ll_max={ll_max}, kk_max={kk_max}"
            )));
        }
        let ss_max = ll_max + kk_max;
        let mut ss = Vec::with_capacity(ll_max * kk_max);
        let mut ll = Vec::with_capacity(ll_max * ss_max);
        for l in 0..ll_max {
            for k in 0..kk_max {
                ss.push(match create_ss(sys, l, k) {
                    Ok(entry) => Some(entry),
                    Err(Error::Singular { .. }) => None,
                    Err(e) => return Err(e),
                });
            }
            for s in 0..ss_max {
                ll.push(create_ll(sys, l, s));
            }
        }
        let singular = ss.iter().filter(|e| e.is_none()).count();
        debug!(ll_max, kk_max, singular, "precalc tables built");
        Ok(Self { ll_max, kk_max, dim_x: sys.dim_x(), dim_y: sys.dim_y(), ss, ll })
    }

    /// Table size in l.
    pub fn ll_max(&self) -> usize {
        self.ll_max
    }

    /// Table size in k.
    pub fn kk_max(&self) -> usize {
        self.kk_max
    }

    /// Whether the tables were built for a system of this shape.
    pub fn fits(&self, sys: &LinearSystem) -> bool {
        self.dim_x == sys.dim_x() && self.dim_y == sys.dim_y()
    }
}

impl Evaluator for Precalc {
    fn limits(&self) -> SearchLimits {
        SearchLimits { l_max: self.ll_max - 1, k_max: self.kk_max - 1 }
    }

    fn ll(&self, l: usize, k: usize, s: usize, v: &DVector<f64>) -> Result<DVector<f64>> {
        let l = if k == 0 { s } else { l };
        let ss_max = self.ll_max + self.kk_max;
        if l >= self.ll_max || k >= self.kk_max || s >= ss_max {
            return Err(Error::OutOfTable { l, k, s, ll_max: self.ll_max, kk_max: self.kk_max });
        }
        let (mat, term) = self.ss[l * self.kk_max + k]
            .as_ref()
            .ok_or(Error::Singular { l, k })?;
        let x = mat * v + term;
        let (matrices, term) = &self.ll[l * ss_max + s];
        Ok(propagate((matrices, term), self.dim_x, &x, v))
    }
}

/// Runs the (l, k) search for state `v` with any evaluator.
pub fn search<E: Evaluator + ?Sized>(
    eval: &E,
    system: &LinearSystem,
    v: &DVector<f64>,
) -> Result<Solution> {
    system.check_state(v)?;
    let limits = eval.limits();
    let excess = |l: usize, k: usize, s: usize| -> Result<f64> {
        Ok(system.b.dot(&eval.ll(l, k, s, v)?) - system.x_bar)
    };

    let (mut l, mut k) = (0_usize, 0_usize);
    let (mut l1, mut k1) = (1_usize, 1_usize);
    let mut passes = 0;
    let mut k_capped = false;
    let mut budget_exhausted = false;

    while (l, k) != (l1, k1) {
        passes += 1;
        (l1, k1) = (l, k);
        l = l.saturating_sub(1);
        k_capped = false;

        if passes < MAX_PASSES {
            while excess(l, k, l)? > 0.0 {
                if l >= limits.l_max {
                    l = 0;
                    break;
                }
                l += 1;
            }
        } else {
            if !budget_exhausted {
                warn!(passes, "search did not settle, forcing l = 0");
            }
            budget_exhausted = true;
            l = 0;
        }

        if l == l1 {
            k = k.saturating_sub(1);
            while excess(l, k, l + k)? < 0.0 {
                k += 1;
                if k >= limits.k_max {
                    warn!(l, k, "k_max reached, exiting k-search");
                    k_capped = true;
                    break;
                }
            }
        }
        debug!(passes, l, k, "search pass");
    }

    let y = eval.ll(l, k, 1, v)?;
    let v_next = y.rows(system.dim_x(), system.dim_v()).clone_owned();
    Ok(Solution { v_next, l, k, passes, k_capped, budget_exhausted })
}

/// Search with direct evaluation; both searches give up past `k_max`.
pub fn boehlgorithm_jit(system: &LinearSystem, v: &DVector<f64>, k_max: usize) -> Result<Solution> {
    search(&Direct::new(system, k_max), system, v)
}

/// Search against precomputed tables.
pub fn boehlgorithm_pp(
    system: &LinearSystem,
    v: &DVector<f64>,
    precalc: &Precalc,
) -> Result<Solution> {
    if !precalc.fits(system) {
        return Err(Error::Dimension {
            name: "precalc",
            expected: format!("dim_x={}, dim_y={}", system.dim_x(), system.dim_y()),
            got: format!("dim_x={}, dim_y={}", precalc.dim_x, precalc.dim_y),
        });
    }
    search(precalc, system, v)
}
