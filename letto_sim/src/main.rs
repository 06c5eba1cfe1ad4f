//! Letto CLI
//!
//! Replays seeded ceremonies, or runs the live console draw.

use clap::{Parser, ValueEnum};
use letto_core::{DrawConfig, DrawSession, DrawStore, MemoryDrawStore, Persistence, SledDrawStore};
use letto_env::TokioContext;
use letto_sim::console::{run_live, ConsolePresenter};
use letto_sim::{CeremonyPlan, CeremonyReport, CeremonyRunner, SimError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Replay seeded ceremonies and check every invariant
    Ceremony,
    /// Interactive draw on the wall clock
    Live,
}

/// Letto prize-drawing CLI
#[derive(Parser, Debug)]
#[command(name = "letto-sim")]
#[command(about = "Run or simulate a prize-drawing ceremony", long_about = None)]
struct Args {
    /// What to run
    #[arg(short, long, value_enum, default_value = "ceremony")]
    mode: Mode,

    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of consecutive seeds to run (ceremony mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// JSON draw configuration (built-in roster if absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sled database directory for persisted results
    /// (live mode defaults to ./letto.sled, ceremony mode to memory;
    /// ceremony mode refuses a store that already holds results)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Tier quotas, e.g. "参与奖=10,三等奖=5" (ceremony mode)
    #[arg(short, long)]
    plan: Option<String>,

    /// Rebuild the controller from storage every N draws (0 = never)
    #[arg(long, default_value = "0")]
    restart_every: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the ceremony report to a JSON file (single seed only)
    #[arg(long)]
    export: Option<String>,
}

fn load_config(args: &Args) -> Result<DrawConfig, SimError> {
    match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            Ok(DrawConfig::from_json_file(path)?)
        }
        None => Ok(DrawConfig::default()),
    }
}

fn open_store(path: Option<&PathBuf>) -> Result<Arc<dyn DrawStore>, SimError> {
    Ok(match path {
        Some(path) => Arc::new(SledDrawStore::open(path)?),
        None => Arc::new(MemoryDrawStore::new()),
    })
}

fn run_ceremonies(args: &Args, config: DrawConfig) -> Result<bool, SimError> {
    let config = Arc::new(config);
    let plan: CeremonyPlan = match &args.plan {
        Some(plan) => plan.parse()?,
        None => CeremonyPlan::default(),
    };

    if args.export.is_some() && args.seeds > 1 {
        error!("--export only supports a single seed");
        return Ok(false);
    }

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    // Runs purge their store, so never replay over real results
    let store = open_store(args.store.as_ref())?;
    if store.read(&config.storage_key)?.is_some() {
        return Err(SimError::StoreInUse(config.storage_key.clone()));
    }

    let mut reports: Vec<CeremonyReport> = Vec::new();
    for offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(offset as u64);
        let report = CeremonyRunner::new(Arc::clone(&config), seed)
            .with_plan(plan.clone())
            .with_restart_every(args.restart_every)
            .with_store(Arc::clone(&store))
            .run()?;

        if !args.json {
            if report.passed {
                info!(
                    "✓ ceremony (seed={}) PASSED: {} draws, {:.0}s virtual",
                    seed,
                    report.draws.len(),
                    report.duration_sec
                );
                for draw in &report.draws {
                    info!(
                        "  {:>6.1}s  {:<6} #{:<2} {}{}",
                        draw.time_sec,
                        draw.tier,
                        draw.ordinal,
                        draw.winner,
                        if draw.rigged { "  (rigged)" } else { "" }
                    );
                }
            } else {
                error!(
                    "✗ ceremony (seed={}) FAILED: {}",
                    seed,
                    report.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }

        if let Some(path) = &args.export {
            report.write_to_file(path)?;
            info!("Exported {} draws to {}", report.draws.len(), path);
        }
        reports.push(report);
    }

    let failed = reports.iter().filter(|r| !r.passed).count();
    if args.json {
        let summary = serde_json::json!({
            "total": reports.len(),
            "passed": reports.len() - failed,
            "failed": failed,
            "results": reports.iter().map(|r| {
                serde_json::json!({
                    "seed": r.seed,
                    "passed": r.passed,
                    "draws": r.draws.len(),
                    "winners": r.winners(),
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(out) => println!("{}", out),
            Err(e) => error!("Failed to render summary: {}", e),
        }
    } else if failed == 0 {
        info!("✅ All {} ceremony runs passed!", reports.len());
    } else {
        error!("❌ {}/{} ceremony runs failed!", failed, reports.len());
    }

    Ok(failed == 0)
}

fn run_live_mode(args: &Args, config: DrawConfig) -> Result<bool, SimError> {
    let config = Arc::new(config);
    let path = args.store.clone().unwrap_or_else(|| PathBuf::from("letto.sled"));
    info!("Persisting results to {}", path.display());
    let persistence = Persistence::new(open_store(Some(&path))?, config.storage_key.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let session = DrawSession::open(
            TokioContext::shared(),
            config,
            persistence,
            Arc::new(ConsolePresenter),
        )?;
        run_live(Arc::new(session)).await
    })?;
    Ok(true)
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !args.json {
        info!("Letto v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let outcome = load_config(&args).and_then(|config| match args.mode {
        Mode::Ceremony => run_ceremonies(&args, config),
        Mode::Live => {
            if args.plan.is_some() || args.export.is_some() {
                warn!("--plan and --export are ignored in live mode");
            }
            run_live_mode(&args, config)
        }
    });

    // Exit with proper code for CI
    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    }
}
