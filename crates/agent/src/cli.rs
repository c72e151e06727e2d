//! Command-line entry points.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use domain::models::{InstallationId, InstallationStatus, LocationUpdate, TechnicianId, WorkItem};
use shared::time::today_colombia;

use crate::backend::Backend;
use crate::config::Config;
use crate::navigation::build_navigation_url_with_limit;
use crate::positioning::{BatteryProbe, ReplayPositionProvider, SysfsBattery};
use crate::timer::InstallationTimer;
use crate::tracking::LocationTrackingService;
use crate::workflow::WorkOrderFlow;

/// Grace period for an in-flight report when tracking stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "fieldtech", version, about = "Field technician agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the day's installations in visiting order with a directions link.
    Route(RouteArgs),
    /// Replay a recorded GPS trace through the tracking service.
    Track(TrackArgs),
    /// Set an installation's status (en_camino, en_progreso, completada).
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct RouteArgs {
    #[arg(long)]
    pub technician_id: TechnicianId,
    /// Agenda date (YYYY-MM-DD); today in Colombia when omitted.
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct TrackArgs {
    #[arg(long)]
    pub technician_id: TechnicianId,
    /// JSON array of location samples.
    #[arg(long)]
    pub trace: PathBuf,
    #[arg(long, default_value_t = 5)]
    pub replay_interval_secs: u64,
    /// Tag reports with this installation.
    #[arg(long)]
    pub installation_id: Option<InstallationId>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long)]
    pub technician_id: TechnicianId,
    #[arg(long)]
    pub installation_id: InstallationId,
    #[arg(long)]
    pub status: InstallationStatus,
}

pub async fn run(cli: Cli, config: &Config, backend: Arc<dyn Backend>) -> anyhow::Result<()> {
    match cli.command {
        Command::Route(args) => route(config, backend, args).await,
        Command::Track(args) => track(config, backend, args).await,
        Command::Status(args) => status(backend, args).await,
    }
}

async fn route(config: &Config, backend: Arc<dyn Backend>, args: RouteArgs) -> anyhow::Result<()> {
    let date = args.date.unwrap_or_else(today_colombia);
    let timer = Arc::new(InstallationTimer::new(Arc::clone(&backend)));
    let flow = WorkOrderFlow::new(args.technician_id, backend, timer, None);

    let stops = flow
        .agenda(Some(date))
        .await
        .context("loading installations")?;
    if stops.is_empty() {
        println!("No pending installations for {}", date);
        return Ok(());
    }

    println!("Route for {}:", date);
    for stop in &stops {
        let item = &stop.item;
        println!(
            "{:>3}. {:<8} {} - {} [{}]",
            stop.stop_number,
            item.scheduled_time.as_deref().unwrap_or("--:--"),
            item.lead_name,
            item.navigation_label(),
            item.status
        );
    }

    let items: Vec<WorkItem> = stops.into_iter().map(|stop| stop.item).collect();
    let url = build_navigation_url_with_limit(&items, config.route.max_waypoints);
    println!();
    println!("{}", url);
    Ok(())
}

async fn track(config: &Config, backend: Arc<dyn Backend>, args: TrackArgs) -> anyhow::Result<()> {
    let provider = Arc::new(ReplayPositionProvider::from_file(
        &args.trace,
        Duration::from_secs(args.replay_interval_secs),
    )?);
    if provider.is_empty() {
        bail!("trace {} has no samples", args.trace.display());
    }
    info!(samples = provider.len(), "Loaded GPS trace");

    let battery = SysfsBattery::detect().map(|probe| Arc::new(probe) as Arc<dyn BatteryProbe>);
    let tracker = LocationTrackingService::new(
        provider.clone(),
        backend,
        battery,
        config.tracking.clone(),
    );

    let subscription = tracker.on_location_update(|update| match update {
        LocationUpdate::Position(sample) => info!(
            latitude = sample.latitude,
            longitude = sample.longitude,
            accuracy = ?sample.accuracy,
            "Position"
        ),
        LocationUpdate::Error(err) => warn!(error = %err, "Positioning error"),
    });

    tracker.set_current_installation(args.installation_id);
    if !tracker.start_tracking(args.technician_id).await {
        subscription.unsubscribe();
        bail!("could not start location tracking");
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = provider.wait_finished() => info!("Trace finished"),
    }

    tracker.send_now().await;
    tracker.shutdown(SHUTDOWN_GRACE).await;
    subscription.unsubscribe();
    Ok(())
}

async fn status(backend: Arc<dyn Backend>, args: StatusArgs) -> anyhow::Result<()> {
    let timer = Arc::new(InstallationTimer::new(Arc::clone(&backend)));
    // Mirror a timer started elsewhere so completion stops it first
    timer.refresh(args.installation_id).await?;

    let flow = WorkOrderFlow::new(args.technician_id, backend, Arc::clone(&timer), None);
    let response = flow.update_status(args.installation_id, args.status).await?;
    println!("{} ({})", response.message, response.status);

    let state = timer.state();
    if state.installation_id == Some(args.installation_id) && state.started_at.is_some() {
        println!(
            "Timer: {}",
            domain::models::format_elapsed(timer.elapsed_seconds())
        );
    }
    Ok(())
}
