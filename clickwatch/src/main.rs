// clickwatch/src/main.rs
//
// Clickwatch daemon: tails a JSONL click feed written by the game host,
// samples every actor each period and writes flags + feature rows.
//
// Usage:
//   clickwatch --path /var/run/host/clicks.jsonl
//   clickwatch --config clickwatch.json --output /var/lib/clickwatch --from-start

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use clickwatch::feed::tail_jsonl;
use clickwatch::{
    ClickwatchConfig, Clock, CsvExporter, FeedRecord, FlagDispatcher, Pipeline, SamplingScheduler,
    SystemClock, TickSink,
};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "clickwatch",
    about   = "Autoclicker detection over live click streams",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(long, help = "JSON config file (defaults apply when omitted)")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "/tmp/clickwatch_feed.jsonl", help = "JSONL click feed")]
    path: PathBuf,

    #[arg(long, help = "Process existing feed content before tailing")]
    from_start: bool,

    #[arg(long, help = "Directory for features.csv and flags.jsonl")]
    output: Option<PathBuf>,
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => ClickwatchConfig::load(path)?,
        None => ClickwatchConfig::default(),
    };
    if let Some(dir) = &cli.output {
        cfg = cfg.with_output_dir(dir);
    }

    let directive = if cfg.debug { "clickwatch=debug" } else { "clickwatch=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .compact()
        .init();

    let pipeline = Arc::new(Pipeline::from_config(&cfg)?);
    let dispatcher = Arc::new(FlagDispatcher::new(&cfg.flags)?);

    let mut sinks: Vec<Arc<dyn TickSink>> = vec![Arc::clone(&dispatcher) as Arc<dyn TickSink>];
    if cfg.export.enabled {
        sinks.push(Arc::new(CsvExporter::new(&cfg.export)?));
    }

    let clock = Arc::new(SystemClock);
    let span = info_span!("clickwatch", window_ms = cfg.detection.window_millis);
    let scheduler = Arc::new(SamplingScheduler::start(
        Arc::clone(&pipeline),
        clock,
        sinks,
        Duration::from_millis(cfg.detection.sample_period_ms as u64),
        span,
    ));

    print_banner(&cli, &cfg);

    tokio::spawn(stats_loop(Arc::clone(&pipeline), Arc::clone(&scheduler), Instant::now()));

    let (tx, mut rx) = mpsc::channel::<FeedRecord>(16384);
    let path = cli.path.clone();
    let seek_end = !cli.from_start;
    tokio::spawn(async move {
        if let Err(e) = tail_jsonl(path, tx, seek_end).await {
            error!("Feed stopped: {}", e);
        }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, draining");
                break;
            }
            rec = rx.recv() => match rec {
                Some(rec @ FeedRecord::Click { .. }) => {
                    let ts = rec.timestamp().unwrap_or_else(|| SystemClock.now_millis());
                    pipeline.record(rec.actor(), ts, rec.orientation());
                }
                Some(FeedRecord::Disconnect { actor }) => {
                    pipeline.remove(&actor);
                    dispatcher.forget(&actor);
                }
                None => {
                    warn!("Feed closed");
                    break;
                }
            }
        }
    }

    scheduler.shutdown().await;
    let s = scheduler.stats();
    info!(
        ticks = s.ticks,
        skipped = s.skipped,
        flags = s.flags,
        flag_lines = dispatcher.written(),
        "clickwatch stopped"
    );
    Ok(())
}

// ── Terminal output ───────────────────────────────────────────────────────────

fn print_banner(cli: &Cli, cfg: &ClickwatchConfig) {
    println!("\x1b[1m  clickwatch\x1b[0m  \x1b[90mautoclicker detection | v{}\x1b[0m", env!("CARGO_PKG_VERSION"));
    println!("  Feed   : \x1b[96m{}\x1b[0m{}", cli.path.display(), if cli.from_start { "  (from start)" } else { "" });
    println!(
        "  Window : {} ms  |  tick every {} ms",
        cfg.detection.window_millis, cfg.detection.sample_period_ms
    );
    println!("  Flags  : \x1b[90m{}\x1b[0m", cfg.flags.path.display());
    if cfg.export.enabled {
        println!("  Export : \x1b[90m{}\x1b[0m", cfg.export.path.display());
    }
    println!("  Press Ctrl+C to stop.\n");
}

async fn stats_loop(pipeline: Arc<Pipeline>, scheduler: Arc<SamplingScheduler>, start: Instant) {
    loop {
        tokio::time::sleep(Duration::from_secs(30)).await;
        let s = scheduler.stats();
        info!(
            uptime_s = start.elapsed().as_secs(),
            events = pipeline.collector().total_events(),
            actors = pipeline.collector().n_actors(),
            ticks = s.ticks,
            skipped = s.skipped,
            flags = s.flags,
            "stats"
        );
    }
}
