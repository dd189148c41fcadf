//! Panels of time series, one per state, for bundles of draws

use super::{
    default_size, draw_mesh, draw_page, figurator, finite_bounds, padded, segments, AxisFormat,
    AxisText, Chart, Panel, PALETTE,
};
use anyhow::{anyhow, Result};
use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use plotters::prelude::*;
use std::path::{Path, PathBuf};

const MAROON: RGBColor = RGBColor(0x80, 0x00, 0x00);

/// `draws × periods × states` array of simulated paths.
#[derive(Clone, Debug, PartialEq)]
pub struct Bundle(pub Array3<f64>);

impl Bundle {
    /// Number of draws.
    pub fn draws(&self) -> usize { self.0.shape()[0] }
    /// Number of periods.
    pub fn periods(&self) -> usize { self.0.shape()[1] }
    /// Number of states.
    pub fn states(&self) -> usize { self.0.shape()[2] }
}

impl From<Array1<f64>> for Bundle {
    fn from(series: Array1<f64>) -> Self {
        Self(series.insert_axis(Axis(1)).insert_axis(Axis(0)))
    }
}

impl From<Array2<f64>> for Bundle {
    fn from(draw: Array2<f64>) -> Self {
        Self(draw.insert_axis(Axis(0)))
    }
}

impl From<Array3<f64>> for Bundle {
    fn from(draws: Array3<f64>) -> Self {
        Self(draws)
    }
}

/// Central statistic drawn as the line of a large bundle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stat {
    /// NaN-aware median
    #[default]
    Median,
    /// NaN-aware mean
    Mean,
}

impl Stat {
    fn apply(self, lane: ArrayView1<'_, f64>) -> f64 {
        match self {
            Stat::Median => percentile(lane, 50.0),
            Stat::Mean => {
                let (sum, n) = lane
                    .iter()
                    .filter(|x| !x.is_nan())
                    .fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
                if n == 0 { f64::NAN } else { sum / n as f64 }
            }
        }
    }
}

/// NaN-aware percentile `q ∈ [0, 100]` with linear interpolation between
/// order statistics. NaN when the lane holds no number.
pub fn percentile(lane: ArrayView1<'_, f64>, q: f64) -> f64 {
    let mut vals: Vec<f64> = lane.iter().copied().filter(|x| !x.is_nan()).collect();
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.sort_by(f64::total_cmp);
    let rank = (q / 100.0).clamp(0.0, 1.0) * (vals.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    vals[lo] + (rank - lo as f64) * (vals[hi] - vals[lo])
}

/// What gets drawn for one bundle. Arrays are `periods × states`.
#[derive(Clone, Debug, Default)]
pub struct Summary {
    /// Central line
    pub line: Option<Array2<f64>>,
    /// Lower and upper band
    pub interval: Option<(Array2<f64>, Array2<f64>)>,
    /// Every draw, for bulk plots
    pub bulk: Option<Array3<f64>>,
}

/// Reduces a bundle to a line, a band, or both.
///
/// One draw is a line, two are a band, three are band-line-band. Larger
/// bundles become the `sigma` band around `stat`, or are kept whole when
/// `bulk_plot` is set.
pub fn summarize(bundle: &Bundle, sigma: f64, stat: Stat, bulk_plot: bool) -> Summary {
    let x = &bundle.0;
    let draw = |i: usize| x.index_axis(Axis(0), i).to_owned();
    match bundle.draws() {
        0 => Summary::default(),
        1 => Summary { line: Some(draw(0)), ..Summary::default() },
        2 => Summary { interval: Some((draw(0), draw(1))), ..Summary::default() },
        3 => Summary { line: Some(draw(1)), interval: Some((draw(0), draw(2))), bulk: None },
        _ if bulk_plot => Summary { bulk: Some(x.clone()), ..Summary::default() },
        _ => {
            let shape = (bundle.periods(), bundle.states());
            let lane = |t: usize, j: usize| x.index_axis(Axis(2), j).index_axis_move(Axis(1), t);
            let lower = Array2::from_shape_fn(shape, |(t, j)| percentile(lane(t, j), sigma * 50.0));
            let upper =
                Array2::from_shape_fn(shape, |(t, j)| percentile(lane(t, j), (1.0 - sigma / 2.0) * 100.0));
            let line = Array2::from_shape_fn(shape, |(t, j)| stat.apply(lane(t, j)));
            Summary { line: Some(line), interval: Some((lower, upper)), bulk: None }
        }
    }
}

fn has_nonzero(x: &Array2<f64>, j: usize) -> bool {
    // NaN counts as nonzero
    x.column(j).iter().any(|v| !(v.abs() < 1e-8))
}

/// Indices of the states that are not identically zero in some summary.
pub fn nonzero_states(summaries: &[Summary], states: usize) -> Vec<usize> {
    if summaries.iter().any(|s| s.bulk.is_some()) {
        return (0..states).collect();
    }
    (0..states)
        .filter(|&j| {
            summaries.iter().any(|s| {
                s.line.as_ref().is_some_and(|l| has_nonzero(l, j))
                    || s.interval.as_ref().is_some_and(|(lo, hi)| has_nonzero(lo, j) || has_nonzero(hi, j))
            })
        })
        .collect()
}

/// `(rows, cols)` of each figure holding `n` panels at most 2×2 each.
pub fn grid_pages(n: usize) -> Vec<(usize, usize)> {
    let pages = n / 4 + usize::from(n % 4 != 0);
    let (mut rows, mut cols) = (2_usize, 2_usize);
    (0..pages)
        .map(|i| {
            let spare = (4 * (i + 1)).saturating_sub(n);
            if spare > 1 { rows -= 1; }
            if spare > 2 { cols -= 1; }
            (rows, cols)
        })
        .collect()
}

/// Values on the x axis.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum XScale {
    /// `0, 1, 2, ...`
    #[default]
    Index,
    /// `start, start + step, ...`
    Range {
        /// First value
        start: f64,
        /// Increment per period
        step: f64,
    },
    /// One value per period
    Values(Vec<f64>),
}

impl XScale {
    fn values(&self, periods: usize) -> Result<Vec<f64>> {
        match self {
            XScale::Index => Ok((0..periods).map(|t| t as f64).collect()),
            XScale::Range { start, step } => Ok((0..periods).map(|t| start + step * t as f64).collect()),
            XScale::Values(v) if v.len() == periods => Ok(v.clone()),
            XScale::Values(v) => Err(anyhow!("x scale has {} values for {} periods", v.len(), periods)),
        }
    }
}

/// How a line is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineStyle {
    /// Solid line
    #[default]
    Line,
    /// Dots at each period
    Dots,
}

/// Options of [`grplot`].
#[derive(Clone, Debug)]
pub struct GrPlotOptions {
    /// x axis values
    pub xscale: XScale,
    /// Panel titles per state; defaults to `1..=n` when there are several states
    pub labels: Option<Vec<String>>,
    /// Figure title, numbered when there are several figures
    pub title: String,
    /// Style per bundle, cycled
    pub styles: Vec<LineStyle>,
    /// Color per bundle; missing entries take the default palette
    pub colors: Vec<RGBColor>,
    /// Legend entry per bundle, drawn on the first panel
    pub legend: Option<Vec<String>>,
    /// Draw every draw of large bundles instead of a band
    pub bulk_plot: bool,
    /// Figure size in pixels; defaults to 400×300 per panel
    pub size: Option<(u32, u32)>,
    /// Number of x ticks
    pub nlocbins: Option<usize>,
    /// Band width: the band covers `1 - sigma` of the draws
    pub sigma: f64,
    /// Opacity of lines and bands
    pub alpha: Option<f64>,
    /// Central line of large bundles
    pub stat: Stat,
    /// Axis format of every panel
    pub axis: AxisFormat,
}

impl Default for GrPlotOptions {
    fn default() -> Self {
        Self {
            xscale: XScale::Index,
            labels: None,
            title: String::new(),
            styles: vec![],
            colors: vec![],
            legend: None,
            bulk_plot: false,
            size: None,
            nlocbins: None,
            sigma: 0.05,
            alpha: None,
            stat: Stat::Median,
            axis: AxisFormat::Plain,
        }
    }
}

/// Files written by [`grplot`] and the states that got a panel.
#[derive(Clone, Debug)]
pub struct GrPlot {
    /// One image per figure
    pub files: Vec<PathBuf>,
    /// Original indices of the plotted states
    pub states: Vec<usize>,
}

struct Object<'a> {
    summary: &'a Summary,
    color: RGBColor,
    bulk_color: RGBColor,
    style: LineStyle,
    legend: Option<&'a str>,
}

/// Plots bundles of time series, one panel per nonzero state, four panels per figure.
pub fn grplot(bundles: &[Bundle], opts: &GrPlotOptions, out: &Path) -> Result<GrPlot> {
    let first = bundles.first().ok_or_else(|| anyhow!("grplot needs at least one bundle"))?;
    let (periods, states) = (first.periods(), first.states());
    if let Some(b) = bundles.iter().find(|b| b.periods() != periods || b.states() != states) {
        return Err(anyhow!(
            "bundle shape {}x{} differs from the first bundle's {}x{}",
            b.periods(),
            b.states(),
            periods,
            states
        ));
    }
    let xs = opts.xscale.values(periods)?;

    let labels: Vec<String> = match &opts.labels {
        Some(l) if l.len() == states => l.clone(),
        Some(l) => return Err(anyhow!("{} labels for {} states", l.len(), states)),
        None if states > 1 => (1..=states).map(|i| i.to_string()).collect(),
        None => vec![String::new()],
    };

    let summaries: Vec<Summary> = bundles
        .iter()
        .map(|b| summarize(b, opts.sigma, opts.stat, opts.bulk_plot))
        .collect();
    let selected = nonzero_states(&summaries, states);

    let objects: Vec<Object<'_>> = summaries
        .iter()
        .enumerate()
        .map(|(i, summary)| Object {
            summary,
            color: opts.colors.get(i).copied().unwrap_or(PALETTE[i % PALETTE.len()]),
            bulk_color: opts.colors.get(i).copied().unwrap_or(MAROON),
            style: if opts.styles.is_empty() { LineStyle::Line } else { opts.styles[i % opts.styles.len()] },
            legend: opts.legend.as_ref().and_then(|l| l.get(i)).map(String::as_str),
        })
        .collect();
    let single = objects.len() == 1;

    let grid = grid_pages(selected.len());
    let mut pages = figurator(out, 2, 2, grid.len(), opts.size);
    let mut files = Vec::with_capacity(pages.len());
    for (i, (page, &(rows, cols))) in pages.iter_mut().zip(&grid).enumerate() {
        // only the last page shrinks
        if (page.rows, page.cols) != (rows, cols) {
            page.rows = rows;
            page.cols = cols;
            page.size = opts.size.unwrap_or_else(|| default_size(rows, cols));
        }
        page.title = match (opts.title.is_empty(), grid.len()) {
            (true, _) => None,
            (false, 1) => Some(opts.title.clone()),
            (false, _) => Some(format!("{} {}", opts.title, i + 1)),
        };
        draw_page(page, |j, area| {
            let Some(&state) = selected.get(4 * i + j) else {
                return Ok(());
            };
            draw_state(area, &xs, state, &labels[state], &objects, opts, single, 4 * i + j == 0)
        })?;
        files.push(page.path.clone());
    }
    Ok(GrPlot { files, states: selected })
}

#[allow(clippy::too_many_arguments)]
fn draw_state(
    area: &Panel<'_>,
    xs: &[f64],
    state: usize,
    label: &str,
    objects: &[Object<'_>],
    opts: &GrPlotOptions,
    single: bool,
    with_legend: bool,
) -> Result<()> {
    let mut values = vec![];
    for o in objects {
        if let Some(l) = &o.summary.line {
            values.extend(l.column(state).iter().copied());
        }
        if let Some((lo, hi)) = &o.summary.interval {
            values.extend(lo.column(state).iter().chain(hi.column(state).iter()).copied());
        }
        if let Some(b) = &o.summary.bulk {
            values.extend(b.index_axis(Axis(2), state).iter().copied());
        }
    }
    let y_range = padded(finite_bounds(values));
    let x_range = super::tight(finite_bounds(xs.iter().copied()));

    let mut chart: Chart<'_, '_> = ChartBuilder::on(area)
        .margin(10)
        .caption(label, ("sans-serif", 18))
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, y_range)?;
    draw_mesh(
        &mut chart,
        opts.axis,
        AxisText { x_labels: opts.nlocbins, ..AxisText::default() },
    )?;

    let mut labelled = false;
    for o in objects {
        let s = o.summary;
        if let Some((lo, hi)) = &s.interval {
            let band = opts.alpha.unwrap_or(0.3);
            let mut upper: Vec<(f64, f64)> = vec![];
            let mut lower: Vec<(f64, f64)> = vec![];
            for (t, &x) in xs.iter().enumerate() {
                let (a, b) = (lo[[t, state]], hi[[t, state]]);
                if x.is_finite() && a.is_finite() && b.is_finite() {
                    lower.push((x, a));
                    upper.push((x, b));
                }
            }
            lower.reverse();
            upper.extend(lower);
            let anno = chart.draw_series(std::iter::once(Polygon::new(upper, o.color.mix(band).filled())))?;
            if s.line.is_none() {
                if let (Some(name), true) = (o.legend, with_legend) {
                    let c = o.color;
                    anno.label(name)
                        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], c.mix(band).filled()));
                    labelled = true;
                }
            }
        } else if let Some(b) = &s.bulk {
            let faint = o.bulk_color.mix(opts.alpha.unwrap_or(0.05));
            for d in 0..b.shape()[0] {
                let path = b.index_axis(Axis(0), d).index_axis_move(Axis(1), state);
                for seg in segments(xs, path.iter().copied()) {
                    chart.draw_series(LineSeries::new(seg, faint))?;
                }
            }
        }
        if let Some(l) = &s.line {
            let opacity = if s.interval.is_none() && single { opts.alpha.unwrap_or(1.0) } else { 1.0 };
            let style = o.color.mix(opacity).stroke_width(2);
            for (n, seg) in segments(xs, l.column(state).iter().copied()).into_iter().enumerate() {
                let anno = match o.style {
                    LineStyle::Line => chart.draw_series(LineSeries::new(seg, style))?,
                    LineStyle::Dots => chart.draw_series(
                        seg.into_iter().map(|p| Circle::new(p, 2, o.color.mix(opacity).filled())),
                    )?,
                };
                if let (0, Some(name), true) = (n, o.legend, with_legend) {
                    let c = o.color;
                    anno.label(name)
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], c.stroke_width(2)));
                    labelled = true;
                }
            }
        }
    }
    if labelled {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}
