use zlbkit::boehl::{DEFAULT_KK_MAX, DEFAULT_K_MAX, DEFAULT_LL_MAX};
use zlbkit::plot::{
    bifplot, grheat, grplot, BifPlotOptions, Bundle, GrPlotOptions, GridBounds, HeatOptions,
};
use zlbkit::{LinearSystem, Model};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use nalgebra::DVector;
use ndarray::Array2;
use serde::Serialize;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "zlbkit",
    version,
    about = "Occasionally binding constraint solver + plots"
)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// System file (JSON)
    #[arg(long)]
    system: PathBuf,
    /// Initial state v, comma separated; zeros when omitted
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    v: Vec<f64>,
    /// Override the constraint bound
    #[arg(long, allow_hyphen_values = true)]
    x_bar: Option<f64>,
    /// Search against precomputed tables
    #[arg(long)]
    precalc: bool,
    #[arg(long, default_value_t = DEFAULT_LL_MAX)]
    ll_max: usize,
    #[arg(long, default_value_t = DEFAULT_KK_MAX)]
    kk_max: usize,
    /// Bound of the table-free search
    #[arg(long, default_value_t = DEFAULT_K_MAX)]
    k_max: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One step of the (l, k) search; prints JSON
    Solve {
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Iterate the search and write the path
    Simulate {
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long, default_value_t = 40)]
        periods: usize,
        #[arg(long, default_value = "out")]
        out_dir: String,
        #[arg(long = "no-draw", action = clap::ArgAction::SetFalse, default_value_t = true)]
        draw: bool,
    },
    /// Sweep x_bar and plot the long-run values of one state
    Bifurcation {
        #[command(flatten)]
        model: ModelArgs,
        #[arg(long, allow_hyphen_values = true)]
        from: f64,
        #[arg(long, allow_hyphen_values = true)]
        to: f64,
        #[arg(long, default_value_t = 100)]
        steps: usize,
        #[arg(long, default_value_t = 200)]
        periods: usize,
        /// Periods kept at the end of each run
        #[arg(long, default_value_t = 50)]
        tail: usize,
        /// Index into v of the plotted state
        #[arg(long, default_value_t = 0)]
        state: usize,
        #[arg(long, default_value = "out")]
        out_dir: String,
        #[arg(long = "no-draw", action = clap::ArgAction::SetFalse, default_value_t = true)]
        draw: bool,
    },
    /// Binding duration k over a grid of initial states
    Heat {
        #[command(flatten)]
        model: ModelArgs,
        /// Grid covers [-bound, bound] in both states
        #[arg(long, default_value_t = 1.0)]
        bound: f64,
        /// Cells per side
        #[arg(long, default_value_t = 41)]
        grid: usize,
        #[arg(long, default_value_t = 0)]
        state_a: usize,
        #[arg(long, default_value_t = 1)]
        state_b: usize,
        #[arg(long, default_value = "out")]
        out_dir: String,
        #[arg(long = "no-draw", action = clap::ArgAction::SetFalse, default_value_t = true)]
        draw: bool,
    },
}

#[derive(Serialize)]
struct SolveReport {
    l: usize,
    k: usize,
    v_next: Vec<f64>,
    passes: usize,
    k_capped: bool,
    budget_exhausted: bool,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_model(args: &ModelArgs, system: LinearSystem) -> Result<Model> {
    let mut model = Model::new(system).with_k_max(args.k_max);
    if args.precalc {
        model.preprocess(args.ll_max, args.kk_max)?;
    }
    Ok(model)
}

fn load(args: &ModelArgs) -> Result<(Model, DVector<f64>)> {
    let mut system = LinearSystem::from_path(&args.system)?;
    if let Some(x_bar) = args.x_bar {
        system = system.with_x_bar(x_bar)?;
    }
    let v = if args.v.is_empty() {
        DVector::zeros(system.dim_v())
    } else {
        DVector::from_vec(args.v.clone())
    };
    system.check_state(&v)?;
    info!(
        dim_x = system.dim_x(),
        dim_y = system.dim_y(),
        x_bar = system.x_bar(),
        precalc = args.precalc,
        "system loaded"
    );
    Ok((build_model(args, system)?, v))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Solve { model } => run_solve(&model),
        Command::Simulate { model, periods, out_dir, draw } => {
            run_simulate(&model, periods, &out_dir, draw)
        }
        Command::Bifurcation { model, from, to, steps, periods, tail, state, out_dir, draw } => {
            run_bifurcation(&model, (from, to, steps), periods, tail, state, &out_dir, draw)
        }
        Command::Heat { model, bound, grid, state_a, state_b, out_dir, draw } => {
            run_heat(&model, bound, grid, (state_a, state_b), &out_dir, draw)
        }
    }
}

fn run_solve(args: &ModelArgs) -> Result<()> {
    let (model, v) = load(args)?;
    let sol = model.boehlgorithm(&v)?;
    let report = SolveReport {
        l: sol.l,
        k: sol.k,
        v_next: sol.v_next.iter().copied().collect(),
        passes: sol.passes,
        k_capped: sol.k_capped,
        budget_exhausted: sol.budget_exhausted,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_simulate(args: &ModelArgs, periods: usize, out_dir: &str, draw: bool) -> Result<()> {
    if periods == 0 {
        return Err(anyhow!("periods must be ≥ 1"));
    }
    let (model, v0) = load(args)?;
    let sim = model.simulate(&v0, periods)?;
    if sim.warnings() > 0 {
        warn!(periods = sim.warnings(), "search hit its limits");
    }
    create_dir_all(out_dir)?;
    write_simulation_csv(out_dir, &model, &sim)?;

    if draw {
        let states = sim.states();
        let labels = (1..=states.ncols()).map(|i| format!("v{i}")).collect();
        let opts = GrPlotOptions {
            title: "Impulse response".to_string(),
            labels: Some(labels),
            ..GrPlotOptions::default()
        };
        let plot = grplot(&[Bundle::from(states)], &opts, &Path::new(out_dir).join("simulation.png"))?;
        info!(files = plot.files.len(), states = plot.states.len(), "simulation plotted");
    }
    Ok(())
}

fn write_simulation_csv(out_dir: &str, model: &Model, sim: &zlbkit::Simulation) -> Result<()> {
    let file_path = format!("{}/simulation.csv", out_dir);
    let mut file = File::create(&file_path)?;

    let system = model.system();
    writeln!(file, "# Constrained simulation")?;
    writeln!(file, "# dim_x={}, dim_y={}, x_bar={}", system.dim_x(), system.dim_y(), system.x_bar())?;
    match model.precalc() {
        Some(pre) => writeln!(file, "# Tables: ll_max={}, kk_max={}", pre.ll_max(), pre.kk_max())?,
        None => writeln!(file, "# Tables: none")?,
    }
    let binding = sim.regimes().iter().filter(|(_, k)| *k > 0).count();
    writeln!(file, "# Periods with a binding spell ahead: {}", binding)?;
    writeln!(file)?;

    let mut wtr = csv::Writer::from_writer(file);
    let dim_v = system.dim_v();
    let mut header = vec!["period".to_string(), "l".to_string(), "k".to_string()];
    header.extend((1..=dim_v).map(|i| format!("v{i}")));
    wtr.write_record(&header)?;

    let states = sim.states();
    for (t, (row, &(l, k))) in states.rows().into_iter().zip(sim.regimes()).enumerate() {
        let mut record = vec![t.to_string(), l.to_string(), k.to_string()];
        record.extend(row.iter().map(|x| x.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn run_bifurcation(
    args: &ModelArgs,
    (from, to, steps): (f64, f64, usize),
    periods: usize,
    tail: usize,
    state: usize,
    out_dir: &str,
    draw: bool,
) -> Result<()> {
    if steps < 2 || !(to > from) {
        return Err(anyhow!("require steps ≥ 2 and from < to; got steps={steps}, from={from}, to={to}"));
    }
    if tail == 0 || tail > periods {
        return Err(anyhow!("require 1 ≤ tail ≤ periods; got tail={tail}, periods={periods}"));
    }
    let (mut model, v0) = load(args)?;
    if state >= model.system().dim_v() {
        return Err(anyhow!("state {} out of range for dim_v={}", state, model.system().dim_v()));
    }

    let params: Vec<f64> =
        (0..steps).map(|i| from + (to - from) * i as f64 / (steps - 1) as f64).collect();
    let mut tails = Array2::<f64>::zeros((steps, tail));
    for (i, &x_bar) in params.iter().enumerate() {
        let system = model.system().with_x_bar(x_bar)?;
        model = model.with_system(system);
        let states = model.simulate(&v0, periods)?.states();
        for (j, t) in (periods - tail..periods).enumerate() {
            tails[[i, j]] = states[[t, state]];
        }
    }
    info!(steps, tail, "bifurcation sweep done");

    create_dir_all(out_dir)?;
    let mut wtr = csv::Writer::from_path(format!("{}/bifurcation.csv", out_dir))?;
    let mut header = vec!["x_bar".to_string()];
    header.extend((0..tail).map(|j| format!("t{j}")));
    wtr.write_record(&header)?;
    for (x_bar, row) in params.iter().zip(tails.rows()) {
        let mut record = vec![x_bar.to_string()];
        record.extend(row.iter().map(|x| x.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;

    if draw {
        let opts = BifPlotOptions {
            xlabel: Some("x_bar".to_string()),
            ylabel: Some(format!("v{}", state + 1)),
            ..BifPlotOptions::default()
        };
        bifplot(Some(params.as_slice()), &tails, &opts, &Path::new(out_dir).join("bifurcation.png"))?;
    }
    Ok(())
}

fn run_heat(
    args: &ModelArgs,
    bound: f64,
    grid: usize,
    (a, b): (usize, usize),
    out_dir: &str,
    draw: bool,
) -> Result<()> {
    let (model, v0) = load(args)?;
    let dim_v = model.system().dim_v();
    if a == b || a >= dim_v || b >= dim_v {
        return Err(anyhow!("need two distinct states below dim_v={dim_v}; got {a} and {b}"));
    }
    if grid < 2 || !(bound > 0.0) {
        return Err(anyhow!("require grid ≥ 2 and bound > 0; got grid={grid}, bound={bound}"));
    }

    let coord = |n: usize| -bound + 2.0 * bound * (n as f64 + 0.5) / grid as f64;
    let mut ks = Array2::<f64>::from_elem((grid, grid), f64::NAN);
    for i in 0..grid {
        for j in 0..grid {
            let mut v = v0.clone();
            v[a] = coord(j);
            v[b] = coord(grid - 1 - i);
            match model.boehlgorithm(&v) {
                Ok(sol) => ks[[i, j]] = sol.k as f64,
                Err(e) => warn!(i, j, error = %e, "grid point skipped"),
            }
        }
    }
    info!(grid, "heat grid done");

    create_dir_all(out_dir)?;
    let mut wtr = csv::Writer::from_path(format!("{}/heat.csv", out_dir))?;
    for row in ks.rows() {
        wtr.write_record(row.iter().map(|x| x.to_string()))?;
    }
    wtr.flush()?;

    if draw {
        let opts = HeatOptions {
            xlabel: Some(format!("v{}", a + 1)),
            ylabel: Some(format!("v{}", b + 1)),
            zlabel: Some("k".to_string()),
            ..HeatOptions::default()
        };
        grheat(&ks, GridBounds::Symmetric(bound), &opts, &Path::new(out_dir).join("heat.png"))?;
    }
    Ok(())
}
