use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use signal_dispatch::{
    metrics, DispatchMetrics, Delivery, HttpTransport, MemoryTransport, StaticIdentity, Transport,
};
use signaltap_cli::collector::{Collector, CollectorReport};
use signaltap_cli::config::CollectorConfig;
use signaltap_cli::trace::{self, CompiledTrace, Trace};
use signaltap_core_types::{ProfileId, SessionId, SourceId};
use tracing::{info, warn};
use url::Url;

use super::output::print_structured;
use crate::cli::context::CliContext;

const DRY_RUN_ENDPOINT: &str = "http://dry-run.invalid/collect";

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// Trace file (JSON or YAML)
    pub trace: PathBuf,

    /// Capture batches in memory and print them instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Playback speed multiplier
    #[arg(long, default_value = "1.0")]
    pub speed: f64,

    /// Request timeout for batch delivery, in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// How long to wait for in-flight beacons after the run, in seconds
    #[arg(long, default_value_t = 5)]
    pub beacon_grace_secs: u64,
}

#[derive(Serialize)]
struct ReplaySummary {
    trace: PathBuf,
    dry_run: bool,
    skipped_events: usize,
    report: CollectorReport,
    metrics: DispatchMetrics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    deliveries: Vec<Delivery>,
}

pub async fn cmd_replay(args: ReplayArgs, ctx: &CliContext) -> Result<()> {
    if !(args.speed.is_finite() && args.speed > 0.0) {
        bail!("--speed must be a positive number, got {}", args.speed);
    }
    let trace = Trace::load(&args.trace)
        .await
        .with_context(|| format!("loading trace {}", args.trace.display()))?;
    let compiled = trace.compile().context("compiling trace")?;
    let skipped_events = compiled.skipped;
    info!(
        trace = %args.trace.display(),
        events = compiled.events.len(),
        skipped = skipped_events,
        speed = args.speed,
        "replaying trace"
    );

    let (report, deliveries) = if args.dry_run {
        let config = with_dry_run_placeholders(ctx.config().clone())?;
        let transport = MemoryTransport::new();
        let report =
            run_collector(&config, compiled, Arc::new(transport.clone()), args.speed).await?;
        (report, transport.take_deliveries())
    } else {
        let config = ctx.config();
        if config.dispatch.endpoint.is_none() {
            warn!("no collector endpoint configured; batches will stay queued");
        }
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(args.timeout_secs))?);
        let report = run_collector(config, compiled, transport.clone(), args.speed).await?;
        if !transport
            .settle(Duration::from_secs(args.beacon_grace_secs))
            .await
        {
            warn!("beacons still in flight after the grace period");
        }
        (report, Vec::new())
    };

    let summary = ReplaySummary {
        trace: args.trace,
        dry_run: args.dry_run,
        skipped_events,
        report,
        metrics: metrics::snapshot(),
        deliveries,
    };
    if !print_structured(ctx.output(), &summary)? {
        print_human(&summary);
    }
    Ok(())
}

/// Runs the collector over a compiled trace. Ctrl-C unloads the page early.
async fn run_collector(
    config: &CollectorConfig,
    compiled: CompiledTrace,
    transport: Arc<dyn Transport>,
    speed: f64,
) -> Result<CollectorReport> {
    let identity = Arc::new(StaticIdentity::new(config.identity()));
    let handle = Collector::new(config, compiled.page, transport, identity)
        .with_clock_rate(speed)
        .spawn();

    tokio::select! {
        played = trace::play(&handle, compiled.events, speed) => {
            played.context("replaying trace events")?;
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, unloading page");
            handle.shutdown();
        }
    }

    Ok(handle.finish().await?)
}

/// Fills in whatever a dry run needs so flushes are never skipped for missing settings.
fn with_dry_run_placeholders(mut config: CollectorConfig) -> Result<CollectorConfig> {
    if config.dispatch.endpoint.is_none() {
        config.dispatch.endpoint = Some(Url::parse(DRY_RUN_ENDPOINT)?);
    }
    if config.dispatch.source_id.is_none() {
        config.dispatch.source_id = SourceId::parse("dry-run-source");
    }
    if config.identity.profile_id.is_none() {
        config.identity.profile_id = ProfileId::parse("dry-run-profile");
    }
    if config.identity.session_id.is_none() {
        config.identity.session_id = SessionId::parse("dry-run-session");
    }
    Ok(config)
}

fn print_human(summary: &ReplaySummary) {
    let report = &summary.report;
    println!("Replayed {}", summary.trace.display());
    println!(
        "  events: {} handled, {} skipped",
        report.events, summary.skipped_events
    );
    println!("  tracked elements: {}", report.tracked_elements);
    println!(
        "  batches: {} sent, {} beacons, {} below floor, {} not ready, {} failed",
        report.batches_sent,
        report.beacons_accepted,
        report.below_floor,
        report.not_ready,
        report.failed
    );
    println!("  elements sent: {}", report.elements_sent);
    if report.pending_at_exit > 0 {
        println!("  still queued: {}", report.pending_at_exit);
    }

    for delivery in &summary.deliveries {
        println!(
            "\n{:?} {} ({} elements)",
            delivery.mode,
            delivery.endpoint,
            delivery.batch.elements.len()
        );
        for element in &delivery.batch.elements {
            println!(
                "  [{}] {} {:?}: {}ms visible, {}ms hover, {} clicks, x{}",
                element.id,
                element.tag,
                element.content,
                element.duration,
                element.mouse_over_duration,
                element.click_count,
                element.duplicate_count
            );
        }
    }
}
