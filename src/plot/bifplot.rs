//! Bifurcation diagrams

use super::{draw_mesh, finite_bounds, padded, tight, AxisFormat, AxisText, Chart};
use anyhow::{anyhow, Result};
use ndarray::Array2;
use plotters::prelude::*;
use std::path::Path;

/// Options of [`bifplot`].
#[derive(Clone, Debug)]
pub struct BifPlotOptions {
    /// Circles when true, single pixels when false; by default circles up to 50 rows
    pub plot_dots: Option<bool>,
    /// Marker color
    pub color: RGBColor,
    /// x axis label
    pub xlabel: Option<String>,
    /// y axis label
    pub ylabel: Option<String>,
    /// Image size in pixels
    pub size: (u32, u32),
}

impl Default for BifPlotOptions {
    fn default() -> Self {
        Self { plot_dots: None, color: BLACK, xlabel: None, ylabel: None, size: (640, 480) }
    }
}

/// Plots every entry of row `i` of `x` at parameter value `y[i]`.
///
/// Without `y` the row index is the parameter.
pub fn bifplot(y: Option<&[f64]>, x: &Array2<f64>, opts: &BifPlotOptions, out: &Path) -> Result<()> {
    let rows = x.nrows();
    let params: Vec<f64> = match y {
        Some(y) if y.len() == rows => y.to_vec(),
        Some(y) => return Err(anyhow!("{} parameter values for {} rows", y.len(), rows)),
        None => (0..rows).map(|i| i as f64).collect(),
    };
    let dots = opts.plot_dots.unwrap_or(rows <= 50);

    let points: Vec<(f64, f64)> = params
        .iter()
        .zip(x.rows())
        .flat_map(|(&p, row)| row.into_iter().map(move |&v| (p, v)))
        .filter(|(p, v)| p.is_finite() && v.is_finite())
        .collect();

    let root = BitMapBackend::new(out, opts.size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart: Chart<'_, '_> = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(
            tight(finite_bounds(params.iter().copied())),
            padded(finite_bounds(points.iter().map(|(_, v)| *v))),
        )?;
    draw_mesh(
        &mut chart,
        AxisFormat::Plain,
        AxisText { x_desc: opts.xlabel.as_deref(), y_desc: opts.ylabel.as_deref(), x_labels: None },
    )?;

    let color = opts.color;
    if dots {
        chart.draw_series(points.into_iter().map(|p| Circle::new(p, 3, color.filled())))?;
    } else {
        chart.draw_series(points.into_iter().map(|p| Pixel::new(p, color)))?;
    }
    root.present()?;
    Ok(())
}
