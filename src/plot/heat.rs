//! Heatmaps with a symmetric-log color scale

use super::{draw_mesh, finite_bounds, AxisFormat, AxisText, Chart};
use anyhow::{anyhow, Result};
use ndarray::Array2;
use plotters::prelude::*;
use std::path::Path;

/// Extent of the heatmap grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GridBounds {
    /// `[-g, g]` on both axes
    Symmetric(f64),
    /// `[-gx, gx] × [-gy, gy]`
    SymmetricXY(f64, f64),
    /// `[x0, x1] × [y0, y1]`
    Explicit((f64, f64), (f64, f64)),
}

impl GridBounds {
    /// `[x0, x1, y0, y1]`
    pub fn extent(&self) -> [f64; 4] {
        match *self {
            GridBounds::Symmetric(g) => [-g, g, -g, g],
            GridBounds::SymmetricXY(gx, gy) => [-gx, gx, -gy, gy],
            GridBounds::Explicit((x0, x1), (y0, y1)) => [x0, x1, y0, y1],
        }
    }
}

/// Symmetric log normalization onto `[0, 1]`: linear inside
/// `±linthresh`, logarithmic outside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SymLogNorm {
    /// Value mapped to 0
    pub vmin: f64,
    /// Value mapped to 1
    pub vmax: f64,
    /// Half-width of the linear region
    pub linthresh: f64,
    /// Width of the linear region in decades
    pub linscale: f64,
    /// Logarithm base
    pub base: f64,
}

impl SymLogNorm {
    /// `linthresh = 1`, `linscale = 1`, base 10.
    pub fn new(vmin: f64, vmax: f64) -> Self {
        Self { vmin, vmax, linthresh: 1.0, linscale: 1.0, base: 10.0 }
    }

    fn linscale_adj(&self) -> f64 {
        self.linscale / (1.0 - 1.0 / self.base)
    }

    /// Forward transform, before rescaling.
    pub fn transform(&self, a: f64) -> f64 {
        let adj = self.linscale_adj();
        if a.abs() > self.linthresh {
            a.signum() * self.linthresh * (adj + (a.abs() / self.linthresh).log(self.base))
        } else {
            a * adj
        }
    }

    /// Inverse of [`SymLogNorm::transform`].
    pub fn inverse(&self, a: f64) -> f64 {
        let adj = self.linscale_adj();
        if a.abs() > self.linthresh * adj {
            a.signum() * self.linthresh * self.base.powf(a.abs() / self.linthresh - adj)
        } else {
            a / adj
        }
    }

    /// `value` mapped to `[0, 1]` (unclamped).
    pub fn norm(&self, value: f64) -> f64 {
        let (t0, t1) = (self.transform(self.vmin), self.transform(self.vmax));
        if t1 == t0 {
            return 0.0;
        }
        (self.transform(value) - t0) / (t1 - t0)
    }

    /// Value whose norm is `u`.
    pub fn denorm(&self, u: f64) -> f64 {
        let (t0, t1) = (self.transform(self.vmin), self.transform(self.vmax));
        self.inverse(t0 + u * (t1 - t0))
    }
}

fn ramp(t: f64, from: f64, to: f64, start: f64) -> f64 {
    if t <= from {
        start
    } else if t >= to {
        1.0
    } else {
        start + (1.0 - start) * (t - from) / (to - from)
    }
}

/// Black-red-yellow-white color map; `t` is clamped to `[0, 1]`.
pub fn hot(t: f64) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let r = ramp(t, 0.0, 0.365079, 0.0416);
    let g = ramp(t, 0.365079, 0.746032, 0.0);
    let b = ramp(t, 0.746032, 1.0, 0.0);
    let to_u8 = |c: f64| (c * 255.0).round() as u8;
    RGBColor(to_u8(r), to_u8(g), to_u8(b))
}

/// Options of [`grheat`].
#[derive(Clone, Debug)]
pub struct HeatOptions {
    /// x axis label
    pub xlabel: Option<String>,
    /// y axis label
    pub ylabel: Option<String>,
    /// Color bar label
    pub zlabel: Option<String>,
    /// Image size in pixels
    pub size: (u32, u32),
}

impl Default for HeatOptions {
    fn default() -> Self {
        Self { xlabel: None, ylabel: None, zlabel: None, size: (760, 600) }
    }
}

const BAR_WIDTH: u32 = 140;
const BAR_STEPS: usize = 200;

/// Draws `x` as a heatmap over `bounds`, row 0 at the top, with a color bar.
/// NaN cells are left blank.
pub fn grheat(x: &Array2<f64>, bounds: GridBounds, opts: &HeatOptions, out: &Path) -> Result<()> {
    let (rows, cols) = x.dim();
    if rows == 0 || cols == 0 {
        return Err(anyhow!("grheat needs a non-empty matrix, got {rows}x{cols}"));
    }
    let [x0, x1, y0, y1] = bounds.extent();
    if !(x1 > x0 && y1 > y0) {
        return Err(anyhow!("empty grid bounds {:?}", bounds));
    }
    let (vmin, vmax) = finite_bounds(x.iter().copied()).unwrap_or((0.0, 1.0));
    let norm = SymLogNorm::new(vmin, vmax);

    let root = BitMapBackend::new(out, opts.size).into_drawing_area();
    root.fill(&WHITE)?;
    let (main, bar) = root.split_horizontally(opts.size.0.saturating_sub(BAR_WIDTH));

    let mut chart: Chart<'_, '_> = ChartBuilder::on(&main)
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;
    draw_mesh(
        &mut chart,
        AxisFormat::Plain,
        AxisText { x_desc: opts.xlabel.as_deref(), y_desc: opts.ylabel.as_deref(), x_labels: None },
    )?;
    let (dx, dy) = ((x1 - x0) / cols as f64, (y1 - y0) / rows as f64);
    chart.draw_series(x.indexed_iter().filter(|(_, v)| v.is_finite()).map(|((i, j), &v)| {
        let left = x0 + j as f64 * dx;
        let top = y1 - i as f64 * dy;
        Rectangle::new([(left, top), (left + dx, top - dy)], hot(norm.norm(v)).filled())
    }))?;

    let label = |u: &f64| format!("{:.3}", norm.denorm(*u));
    let mut colorbar = ChartBuilder::on(&bar)
        .margin_top(20)
        .margin_bottom(60)
        .margin_right(10)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..1.0, 0.0..1.0)?;
    let mut mesh = colorbar.configure_mesh();
    mesh.disable_x_mesh().disable_y_mesh().disable_x_axis().y_labels(6).y_label_formatter(&label);
    if let Some(z) = opts.zlabel.as_deref() {
        mesh.y_desc(z);
    }
    mesh.draw()?;
    let step = 1.0 / BAR_STEPS as f64;
    colorbar.draw_series((0..BAR_STEPS).map(|n| {
        let u = n as f64 * step;
        Rectangle::new([(0.0, u), (1.0, u + step)], hot(u + step / 2.0).filled())
    }))?;

    root.present()?;
    Ok(())
}
