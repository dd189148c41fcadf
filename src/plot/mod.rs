//! Visualization: time-series bundles, bifurcation diagrams and heatmaps.
//!
//! Every function renders PNG files through plotters' bitmap backend. Figures
//! with several panels are described by [`Page`]s, see [`figurator`].

mod bifplot;
mod grplot;
mod heat;

pub use bifplot::{bifplot, BifPlotOptions};
pub use grplot::{
    grid_pages, grplot, nonzero_states, percentile, summarize, Bundle, GrPlot, GrPlotOptions,
    LineStyle, Stat, Summary, XScale,
};
pub use heat::{grheat, hot, GridBounds, HeatOptions, SymLogNorm};

/// Alias kept for callers used to the short name.
pub use grplot::grplot as pplot;

use crate::error::Error;
use anyhow::Result;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub(crate) type Panel<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
pub(crate) type Chart<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Matplotlib's default color cycle.
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0x7f, 0x7f, 0x7f),
    RGBColor(0xbc, 0xbd, 0x22),
    RGBColor(0x17, 0xbe, 0xcf),
];

/// How the axes of a panel are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AxisFormat {
    /// Horizontal tick labels
    #[default]
    Plain,
    /// Rotated x tick labels, for long x values
    Rotate,
    /// No axes at all
    Off,
}

impl FromStr for AxisFormat {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self, Error> {
        match mode {
            "plain" => Ok(Self::Plain),
            "rotate" => Ok(Self::Rotate),
            "off" => Ok(Self::Off),
            other => Err(Error::UnsupportedAxisMode(other.to_string())),
        }
    }
}

/// Parses an axis mode (`"rotate"` or `"off"`).
pub fn axformater(mode: &str) -> Result<AxisFormat, Error> {
    mode.parse()
}

/// One output image holding a `rows × cols` grid of panels.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    /// Output file
    pub path: PathBuf,
    /// Panel rows
    pub rows: usize,
    /// Panel columns
    pub cols: usize,
    /// Image size in pixels
    pub size: (u32, u32),
    /// Figure title
    pub title: Option<String>,
}

impl Page {
    /// Number of panels on this page.
    pub fn panels(&self) -> usize {
        self.rows * self.cols
    }
}

/// `out` itself for a single page, else `stem_<i+1>.ext` next to it.
pub(crate) fn numbered(out: &Path, i: usize, n: usize) -> PathBuf {
    if n <= 1 {
        return out.to_path_buf();
    }
    let stem = out.file_stem().and_then(|s| s.to_str()).unwrap_or("figure");
    let ext = out.extension().and_then(|s| s.to_str()).unwrap_or("png");
    out.with_file_name(format!("{stem}_{}.{ext}", i + 1))
}

/// Pixel size of a `rows × cols` figure at 100 px per inch, 4 × 3 inches per panel.
pub(crate) fn default_size(rows: usize, cols: usize) -> (u32, u32) {
    (cols as u32 * 400, rows as u32 * 300)
}

/// Lays out `nfigs` figures of `nrows × ncols` panels each.
pub fn figurator(
    out: &Path,
    nrows: usize,
    ncols: usize,
    nfigs: usize,
    size: Option<(u32, u32)>,
) -> Vec<Page> {
    (0..nfigs)
        .map(|i| Page {
            path: numbered(out, i, nfigs),
            rows: nrows,
            cols: ncols,
            size: size.unwrap_or_else(|| default_size(nrows, ncols)),
            title: None,
        })
        .collect()
}

/// Renders one page, calling `panel` for each grid cell in row-major order.
pub fn draw_page<F>(page: &Page, mut panel: F) -> Result<()>
where
    F: FnMut(usize, &Panel<'_>) -> Result<()>,
{
    if let Some(dir) = page.path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let root = BitMapBackend::new(&page.path, page.size).into_drawing_area();
    root.fill(&WHITE)?;
    let body = match &page.title {
        Some(t) => root.titled(t, ("sans-serif", 24))?,
        None => root.clone(),
    };
    for (j, area) in body.split_evenly((page.rows, page.cols)).iter().enumerate() {
        panel(j, area)?;
    }
    root.present()?;
    Ok(())
}

/// Smallest and largest finite value, if any.
pub(crate) fn finite_bounds<I: IntoIterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values
        .into_iter()
        .filter(|x| x.is_finite())
        .fold(None, |acc, x| match acc {
            None => Some((x, x)),
            Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
        })
}

/// Range with 5% headroom on both sides; never empty.
pub(crate) fn padded(bounds: Option<(f64, f64)>) -> Range<f64> {
    match bounds {
        None => 0.0..1.0,
        Some((lo, hi)) if hi - lo <= f64::EPSILON * hi.abs().max(1.0) => (lo - 0.5)..(hi + 0.5),
        Some((lo, hi)) => {
            let pad = 0.05 * (hi - lo);
            (lo - pad)..(hi + pad)
        }
    }
}

/// Range from min to max without padding; never empty.
pub(crate) fn tight(bounds: Option<(f64, f64)>) -> Range<f64> {
    match bounds {
        Some((lo, hi)) if hi > lo => lo..hi,
        other => padded(other),
    }
}

/// Splits `(x, y)` pairs into runs of finite points.
pub(crate) fn segments(xs: &[f64], ys: impl IntoIterator<Item = f64>) -> Vec<Vec<(f64, f64)>> {
    let mut out = vec![];
    let mut run = vec![];
    for (&x, y) in xs.iter().zip(ys) {
        if x.is_finite() && y.is_finite() {
            run.push((x, y));
        } else if !run.is_empty() {
            out.push(std::mem::take(&mut run));
        }
    }
    if !run.is_empty() {
        out.push(run);
    }
    out
}

/// Labels for a panel's axes.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct AxisText<'a> {
    pub x_desc: Option<&'a str>,
    pub y_desc: Option<&'a str>,
    pub x_labels: Option<usize>,
}

pub(crate) fn draw_mesh(chart: &mut Chart<'_, '_>, format: AxisFormat, text: AxisText<'_>) -> Result<()> {
    if format == AxisFormat::Off {
        return Ok(());
    }
    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh().disable_y_mesh();
    if let Some(n) = text.x_labels {
        mesh.x_labels(n);
    }
    if let Some(d) = text.x_desc {
        mesh.x_desc(d);
    }
    if let Some(d) = text.y_desc {
        mesh.y_desc(d);
    }
    if format == AxisFormat::Rotate {
        mesh.x_label_style(TextStyle::from(
            ("sans-serif", 12).into_font().transform(FontTransform::Rotate90),
        ));
    }
    mesh.draw()?;
    Ok(())
}
