use dlmm_engine::fuzz::{FuzzConfig, Harness};
use dlmm_engine::plot::{plot_liquidity, plot_price_ladder, plot_rounding_slack};
use dlmm_engine::price::PriceModel;
use dlmm_engine::report::{price_ladder, write_ladder_csv, write_run};
use dlmm_engine::SwapDirection;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{create_dir_all, read_to_string};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(
    name = "dlmm-engine",
    version,
    about = "DLMM bin engine + fixed-point/float correctness oracle"
)]
struct Args {
    /// JSON file with a `FuzzConfig` (pool, planner and harness settings)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Seeded randomized run with invariant and oracle checks
    Fuzz {
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        iterations: Option<u64>,
        /// Keep going after an exploit finding
        #[arg(long, action = clap::ArgAction::SetTrue)]
        no_halt: bool,
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,
        #[arg(long = "no-draw", action = clap::ArgAction::SetFalse, default_value_t = true)]
        draw: bool,
    },
    /// Multi-bin quote against the seeded pool
    Quote {
        #[arg(long, value_enum, default_value_t = Side::XForY)]
        direction: Side,
        #[arg(long)]
        amount: u128,
        #[arg(long)]
        max_unfavorable_bins: Option<u32>,
    },
    /// Price ladder for a bin step
    Price {
        #[arg(long, default_value_t = 100_000_000)]
        initial_price: u128,
        #[arg(long, default_value_t = 25)]
        bin_step: u16,
        #[arg(long, default_value_t = -500, allow_hyphen_values = true)]
        from: i32,
        #[arg(long, default_value_t = 500, allow_hyphen_values = true)]
        to: i32,
        #[arg(long, default_value = "out")]
        out_dir: PathBuf,
        #[arg(long = "no-draw", action = clap::ArgAction::SetFalse, default_value_t = true)]
        draw: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Side {
    XForY,
    YForX,
}

impl From<Side> for SwapDirection {
    fn from(s: Side) -> Self {
        match s {
            Side::XForY => SwapDirection::XForY,
            Side::YForX => SwapDirection::YForX,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<FuzzConfig> {
    let Some(path) = path else {
        return Ok(FuzzConfig::default());
    };
    let text = read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let cfg: FuzzConfig = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    cfg.pool.validate().map_err(|e| anyhow!("invalid pool config in {}: {e}", path.display()))?;
    Ok(cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("dlmm_engine={log_level}").parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut cfg = load_config(args.config.as_deref())?;

    match args.cmd {
        Cmd::Fuzz { seed, iterations, no_halt, out_dir, draw } => {
            if let Some(s) = seed {
                cfg.seed = s;
            }
            if let Some(n) = iterations {
                cfg.iterations = n;
            }
            if no_halt {
                cfg.halt_on_exploit = false;
            }
            run_fuzz(cfg, &out_dir, draw)
        }
        Cmd::Quote { direction, amount, max_unfavorable_bins } => run_quote(cfg, direction.into(), amount, max_unfavorable_bins),
        Cmd::Price { initial_price, bin_step, from, to, out_dir, draw } => {
            run_price(initial_price, bin_step, from, to, &out_dir, draw)
        }
    }
}

fn run_fuzz(cfg: FuzzConfig, out_dir: &Path, draw: bool) -> Result<()> {
    let mut harness = Harness::new(cfg)?;
    let report = harness.run()?;
    let files = write_run(out_dir, &report)?;
    info!(csv = %files.transactions.display(), json = %files.summary.display(), "reports written");

    if draw {
        plot_rounding_slack(&report, &out_dir.join("rounding_slack.svg"))?;
        let engine = harness.engine();
        let pool = engine.state().pool(harness.pool_id())?;
        let grid = engine.prices().grid(pool.pool.initial_price, pool.pool.bin_step)?;
        plot_liquidity(pool, &grid, &out_dir.join("liquidity.svg"))?;
    }

    for v in &report.violations {
        warn!("{v}");
    }
    if !report.is_clean() {
        return Err(anyhow!(
            "fuzz run (seed {}) found {} violations and {} exploits",
            report.seed,
            report.violations.len(),
            report.exploits.len()
        ));
    }
    println!(
        "seed={} executed={} rejected={} slack=[{:?}, {:?}]",
        report.seed,
        report.executed,
        report.rejections.values().sum::<u64>(),
        report.min_slack,
        report.max_slack
    );
    Ok(())
}

fn run_quote(cfg: FuzzConfig, direction: SwapDirection, amount: u128, max_unfavorable_bins: Option<u32>) -> Result<()> {
    let harness = Harness::new(cfg)?;
    let plan = harness.engine().quote_swap(harness.pool_id(), direction, amount, max_unfavorable_bins)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn run_price(initial_price: u128, bin_step: u16, from: i32, to: i32, out_dir: &Path, draw: bool) -> Result<()> {
    let mut model = PriceModel::default();
    model.register(bin_step)?;
    let rows = price_ladder(&model, initial_price, bin_step, from, to)?;
    create_dir_all(out_dir)?;
    write_ladder_csv(&out_dir.join("price_ladder.csv"), bin_step, initial_price, &rows)?;
    if draw {
        plot_price_ladder(&rows, &out_dir.join("price_ladder.svg"))?;
    }
    info!(bins = rows.len(), bin_step, "price ladder written");
    Ok(())
}
