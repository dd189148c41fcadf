use approx::assert_relative_eq;
use ndarray::{array, Array1, Array2, Array3};
use std::path::{Path, PathBuf};
use zlbkit::plot::{
    axformater, bifplot, draw_page, figurator, grheat, grid_pages, grplot, hot, nonzero_states,
    summarize, AxisFormat, BifPlotOptions, Bundle, GrPlotOptions, GridBounds, HeatOptions, LineStyle,
    Stat, SymLogNorm, XScale,
};
use zlbkit::Error;

#[test]
fn bundles_take_any_rank() {
    let one = Bundle::from(Array1::from_vec(vec![1.0, 2.0, 3.0]));
    assert_eq!((one.draws(), one.periods(), one.states()), (1, 3, 1));

    let two = Bundle::from(Array2::<f64>::zeros((5, 2)));
    assert_eq!((two.draws(), two.periods(), two.states()), (1, 5, 2));

    let three = Bundle::from(Array3::<f64>::zeros((7, 5, 2)));
    assert_eq!((three.draws(), three.periods(), three.states()), (7, 5, 2));
}

#[test]
fn summary_depends_on_number_of_draws() {
    let draws = |n: usize| {
        Bundle::from(Array3::from_shape_fn((n, 4, 1), |(d, t, _)| d as f64 + t as f64))
    };

    let s = summarize(&draws(1), 0.05, Stat::Median, false);
    assert!(s.line.is_some() && s.interval.is_none() && s.bulk.is_none());

    let s = summarize(&draws(2), 0.05, Stat::Median, false);
    assert!(s.line.is_none() && s.interval.is_some());

    let s = summarize(&draws(3), 0.05, Stat::Median, false);
    let line = s.line.unwrap();
    let (lo, hi) = s.interval.unwrap();
    assert_eq!(line[[0, 0]], 1.0);
    assert_eq!((lo[[0, 0]], hi[[0, 0]]), (0.0, 2.0));

    let s = summarize(&draws(4), 0.05, Stat::Median, true);
    assert!(s.bulk.is_some() && s.line.is_none());
}

#[test]
fn large_bundles_get_percentile_bands() {
    // 101 draws 0..=100 in every period and state
    let bundle = Bundle::from(Array3::from_shape_fn((101, 3, 2), |(d, _, _)| d as f64));
    let s = summarize(&bundle, 0.1, Stat::Median, false);
    let line = s.line.unwrap();
    let (lo, hi) = s.interval.unwrap();
    assert_relative_eq!(line[[2, 1]], 50.0);
    assert_relative_eq!(lo[[0, 0]], 5.0, epsilon = 1e-9);
    assert_relative_eq!(hi[[0, 0]], 95.0, epsilon = 1e-9);

    let mean = summarize(&bundle, 0.1, Stat::Mean, false).line.unwrap();
    assert_relative_eq!(mean[[1, 0]], 50.0);
}

#[test]
fn zero_states_are_dropped() {
    let draw = array![[1.0, 0.0, 0.0], [2.0, 0.0, f64::NAN]];
    let s = summarize(&Bundle::from(draw), 0.05, Stat::Median, false);
    // all-zero column 1 goes, NaN keeps column 2
    assert_eq!(nonzero_states(&[s], 3), vec![0, 2]);

    let other = array![[0.0, 1e-3, 0.0], [0.0, 0.0, 0.0]];
    let a = summarize(&Bundle::from(array![[1.0, 0.0, 0.0], [1.0, 0.0, 0.0]]), 0.05, Stat::Median, false);
    let b = summarize(&Bundle::from(other), 0.05, Stat::Median, false);
    assert_eq!(nonzero_states(&[a, b], 3), vec![0, 1]);
}

#[test]
fn bulk_keeps_every_state() {
    let s = summarize(&Bundle::from(Array3::<f64>::zeros((5, 3, 2))), 0.05, Stat::Median, true);
    assert_eq!(nonzero_states(&[s], 2), vec![0, 1]);
}

#[test]
fn last_page_shrinks() {
    assert!(grid_pages(0).is_empty());
    assert_eq!(grid_pages(1), vec![(1, 1)]);
    assert_eq!(grid_pages(2), vec![(1, 2)]);
    assert_eq!(grid_pages(3), vec![(2, 2)]);
    assert_eq!(grid_pages(5), vec![(2, 2), (1, 1)]);
    assert_eq!(grid_pages(6), vec![(2, 2), (1, 2)]);
    assert_eq!(grid_pages(8), vec![(2, 2), (2, 2)]);
}

#[test]
fn figurator_numbers_pages() {
    let pages = figurator(Path::new("out/irf.png"), 2, 3, 2, None);
    let paths: Vec<PathBuf> = pages.iter().map(|p| p.path.clone()).collect();
    assert_eq!(paths, vec![PathBuf::from("out/irf_1.png"), PathBuf::from("out/irf_2.png")]);
    assert_eq!(pages[0].size, (1200, 600));
    assert_eq!(pages[0].panels(), 6);

    let single = figurator(Path::new("out/irf.png"), 1, 1, 1, Some((300, 200)));
    assert_eq!(single[0].path, PathBuf::from("out/irf.png"));
    assert_eq!(single[0].size, (300, 200));
}

#[test]
fn axis_modes() {
    assert_eq!(axformater("rotate").unwrap(), AxisFormat::Rotate);
    assert_eq!(axformater("off").unwrap(), AxisFormat::Off);
    assert!(matches!(axformater("spin"), Err(Error::UnsupportedAxisMode(m)) if m == "spin"));
}

#[test]
fn grid_bounds_extent() {
    assert_eq!(GridBounds::Symmetric(2.0).extent(), [-2.0, 2.0, -2.0, 2.0]);
    assert_eq!(GridBounds::SymmetricXY(1.0, 3.0).extent(), [-1.0, 1.0, -3.0, 3.0]);
    assert_eq!(GridBounds::Explicit((0.0, 1.0), (5.0, 6.0)).extent(), [0.0, 1.0, 5.0, 6.0]);
}

#[test]
fn symlog_is_linear_near_zero() {
    let norm = SymLogNorm::new(-100.0, 100.0);
    // base 10, linscale 1: slope 1 / (1 - 1/10) inside the threshold
    assert_relative_eq!(norm.transform(0.5), 0.5 / 0.9, epsilon = 1e-12);
    assert_relative_eq!(norm.transform(10.0), 1.0 / 0.9 + 1.0, epsilon = 1e-12);
    assert_relative_eq!(norm.transform(-10.0), -(1.0 / 0.9 + 1.0), epsilon = 1e-12);
    assert_relative_eq!(norm.norm(0.0), 0.5, epsilon = 1e-12);
    assert_relative_eq!(norm.norm(-100.0), 0.0);
    assert_relative_eq!(norm.norm(100.0), 1.0);

    let flat = SymLogNorm::new(3.0, 3.0);
    assert_eq!(flat.norm(3.0), 0.0);
}

#[test]
fn hot_runs_black_to_white() {
    let start = hot(0.0);
    assert_eq!((start.0, start.1, start.2), (11, 0, 0));
    let end = hot(1.0);
    assert_eq!((end.0, end.1, end.2), (255, 255, 255));
    let mid = hot(0.5);
    assert_eq!(mid.0, 255);
    assert!(mid.1 > 0 && mid.1 < 255);
    assert_eq!(mid.2, 0);
    let (a, b) = (hot(f64::NAN), hot(-3.0));
    assert_eq!((a.0, a.1, a.2), (b.0, b.1, b.2));
}

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("zlbkit_plots_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn grplot_writes_one_file_per_page() {
    let dir = scratch("grplot");
    let path = Array2::from_shape_fn((12, 5), |(t, j)| (j as f64 + 1.0) * 0.9_f64.powi(t as i32));
    let draws = Array3::from_shape_fn((20, 12, 5), |(d, t, j)| (j + d) as f64 * 0.1 - t as f64 * 0.01);
    let opts = GrPlotOptions {
        title: "Responses".to_string(),
        legend: Some(vec!["path".to_string(), "draws".to_string()]),
        styles: vec![LineStyle::Line, LineStyle::Dots],
        xscale: XScale::Range { start: 1990.0, step: 0.25 },
        ..GrPlotOptions::default()
    };
    let plot = grplot(&[Bundle::from(path), Bundle::from(draws)], &opts, &dir.join("g.png")).unwrap();

    assert_eq!(plot.states, vec![0, 1, 2, 3, 4]);
    assert_eq!(plot.files, vec![dir.join("g_1.png"), dir.join("g_2.png")]);
    assert!(plot.files.iter().all(|f| f.exists()));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn grplot_bulk_and_single_page() {
    let dir = scratch("bulk");
    let draws = Array3::from_shape_fn((6, 8, 2), |(d, t, j)| d as f64 + t as f64 + j as f64);
    let opts = GrPlotOptions { bulk_plot: true, ..GrPlotOptions::default() };
    let plot = grplot(&[Bundle::from(draws)], &opts, &dir.join("bulk.png")).unwrap();
    assert_eq!(plot.files, vec![dir.join("bulk.png")]);
    assert!(plot.files[0].exists());

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn grplot_rejects_mismatched_bundles() {
    let a = Bundle::from(Array2::<f64>::ones((4, 2)));
    let b = Bundle::from(Array2::<f64>::ones((5, 2)));
    assert!(grplot(&[a, b], &GrPlotOptions::default(), Path::new("unused.png")).is_err());
    assert!(grplot(&[], &GrPlotOptions::default(), Path::new("unused.png")).is_err());
}

#[test]
fn draw_page_visits_every_panel() {
    let dir = scratch("page");
    let mut page = figurator(&dir.join("page.png"), 2, 3, 1, Some((300, 200))).remove(0);
    page.title = Some("grid".to_string());
    let mut seen = vec![];
    draw_page(&page, |j, _| {
        seen.push(j);
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, (0..6).collect::<Vec<_>>());
    assert!(page.path.exists());

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn bifplot_writes_sparse_and_dense_diagrams() {
    let dir = scratch("bif");
    std::fs::create_dir_all(&dir).unwrap();

    let sparse = Array2::from_shape_fn((10, 4), |(i, j)| (i as f64 * 0.3).sin() + j as f64 * 0.01);
    let params: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
    let opts = BifPlotOptions { xlabel: Some("x_bar".to_string()), ..BifPlotOptions::default() };
    bifplot(Some(params.as_slice()), &sparse, &opts, &dir.join("b.png")).unwrap();
    assert!(dir.join("b.png").exists());

    let dense = Array2::from_shape_fn((80, 3), |(i, j)| if j == 1 { f64::NAN } else { i as f64 });
    bifplot(None, &dense, &BifPlotOptions::default(), &dir.join("dense.png")).unwrap();
    assert!(dir.join("dense.png").exists());

    assert!(bifplot(Some(&params[..3]), &sparse, &opts, &dir.join("bad.png")).is_err());

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn grheat_skips_nan_cells() {
    let dir = scratch("heat");
    std::fs::create_dir_all(&dir).unwrap();

    let mut x = Array2::from_shape_fn((6, 6), |(i, j)| (i * j) as f64 - 8.0);
    x[[0, 0]] = f64::NAN;
    x[[3, 4]] = f64::NAN;
    let opts = HeatOptions { zlabel: Some("k".to_string()), ..HeatOptions::default() };
    grheat(&x, GridBounds::SymmetricXY(1.0, 2.0), &opts, &dir.join("h.png")).unwrap();
    assert!(dir.join("h.png").exists());

    let empty = Array2::<f64>::zeros((0, 3));
    assert!(grheat(&empty, GridBounds::Symmetric(1.0), &opts, &dir.join("e.png")).is_err());
    assert!(grheat(&x, GridBounds::Symmetric(0.0), &opts, &dir.join("z.png")).is_err());

    let _ = std::fs::remove_dir_all(dir);
}
