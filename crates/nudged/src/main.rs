//! nudged - The nudge reminder service
//!
//! This is the main entry point for the nudge service.
//! It wires together all the components:
//! - Configuration loading
//! - Settings persistence (SQLite)
//! - Local delivery backend and habit file
//! - Notification service (policy + scheduler)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nudge_api::SettingsPatch;
use nudge_config::{EngineConfig, load_config_or_default};
use nudge_core::{NotificationService, RecomputeOutcome, ServiceError, SystemClock};
use nudge_host_local::{DeliveredNotification, JsonHabitSource, LocalDelivery};
use nudge_store::{KeyValueStore, SqliteStore};
use nudge_util::{HabitId, default_config_path};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// nudged - Habit reminder service
#[derive(Parser, Debug)]
#[command(name = "nudged")]
#[command(about = "Habit reminder scheduling service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/nudge/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set NUDGE_DATA_DIR env var)
    #[arg(short, long, env = "NUDGE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Run the reminder service until SIGINT/SIGTERM (default)
    Run,

    /// Print the current notification settings as JSON
    Settings,

    /// Update settings, e.g. `set enabled=true morningTime=07:30`
    Set {
        #[arg(required = true, value_name = "FIELD=VALUE")]
        assignments: Vec<String>,
    },

    /// Print the streak of one habit, or of every habit
    Streak { habit_id: Option<String> },

    /// Fire the test notification now
    TestFire,
}

/// Components shared by every subcommand
struct App {
    config: EngineConfig,
    service: NotificationService,
    delivery: Arc<LocalDelivery>,
}

impl App {
    async fn new(args: &Args) -> Result<Self> {
        let mut config = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(config_path = %args.config.display(), "Configuration loaded");

        if let Some(data_dir) = &args.data_dir {
            config.service.data_dir = data_dir.clone();
        }
        let data_dir = config.service.data_dir.clone();

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("nudge.db");
        let store: Arc<dyn KeyValueStore> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        let habits = Arc::new(JsonHabitSource::new(&config.service.habits_file));
        info!(habits_file = %habits.path().display(), "Habit source initialized");

        let delivery = Arc::new(LocalDelivery::new());

        let service = NotificationService::load(
            &config,
            store,
            delivery.clone(),
            habits,
            Arc::new(SystemClock),
        )
        .await
        .context("Failed to load notification service")?;

        Ok(Self {
            config,
            service,
            delivery,
        })
    }

    async fn run(self) -> Result<()> {
        let mut delivered = self
            .delivery
            .subscribe()
            .context("Delivery events already taken")?;

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let mut tick_timer = tokio::time::interval(self.config.service.tick_interval);

        info!(
            tick_interval_secs = self.config.service.tick_interval.as_secs(),
            armed = self.service.armed().await.len(),
            "Service running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // SIGHUP: pick up settings written by `nudged set` and habit file changes
                _ = sighup.recv() => {
                    info!("Received SIGHUP, reloading settings");
                    match self.service.reload_settings().await {
                        Ok(Some(outcome)) => log_outcome(&outcome),
                        Ok(None) => log_outcome(&self.service.recompute().await),
                        Err(e) => warn!(error = %e, "Failed to reload settings"),
                    }
                }

                _ = tick_timer.tick() => {
                    if let Some(outcome) = self.service.tick().await {
                        log_outcome(&outcome);
                    }
                }

                Some(event) = delivered.recv() => {
                    handle_delivered(&self.service, event).await;
                }
            }
        }

        info!(armed = self.service.armed().await.len(), "Shutdown complete");
        Ok(())
    }
}

fn log_outcome(outcome: &RecomputeOutcome) {
    let report = outcome.report();
    if report.is_success() {
        debug!(
            armed = report.armed.len(),
            cancelled = report.cancelled.len(),
            coalesced = outcome.is_coalesced(),
            "Recompute finished"
        );
    } else {
        warn!(
            failed = ?report.failed_categories(),
            "Some reminders could not be scheduled"
        );
    }
}

/// A one-shot fired: the next one (tomorrow's motivational, say) must be armed
async fn handle_delivered(service: &NotificationService, event: DeliveredNotification) {
    debug!(title = %event.payload.title, delivered_at = %event.delivered_at, "Delivery observed");
    log_outcome(&service.recompute().await);
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn set_settings(app: &App, assignments: &[String]) -> Result<()> {
    let patch = SettingsPatch::from_assignments(assignments).map_err(ServiceError::from)?;

    match app.service.update_settings(&patch).await {
        Ok(_) => {}
        // The new settings stand; report what went wrong with them
        Err(e @ (ServiceError::PermissionDenied
        | ServiceError::Delivery(_)
        | ServiceError::Storage(_))) => {
            print_json(&app.service.get_settings())?;
            return Err(e).context("Settings applied with errors");
        }
        Err(e) => return Err(e).context("Settings update refused"),
    }

    print_json(&app.service.get_settings())
}

fn print_streaks(app: &App, habit_id: Option<String>) -> Result<()> {
    match habit_id {
        Some(id) => {
            let streak = app.service.get_streak(&HabitId::new(id))?;
            print_json(&streak)
        }
        None => {
            let streaks: Vec<_> = app
                .service
                .streaks()
                .into_iter()
                .map(|(habit, streak)| {
                    json!({
                        "id": habit.id,
                        "name": habit.name,
                        "currentStreak": streak.current_streak,
                        "completedToday": streak.completed_today,
                        "atRisk": streak.at_risk,
                    })
                })
                .collect();
            print_json(&streaks)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for command output
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "nudged starting");

    if nudge_util::is_mock_time_active() {
        warn!(now = %nudge_util::now(), "Mock time is active");
    }

    let app = App::new(&args).await?;

    match args.command.clone().unwrap_or(Command::Run) {
        Command::Run => app.run().await,
        Command::Settings => print_json(&app.service.get_settings()),
        Command::Set { assignments } => set_settings(&app, &assignments).await,
        Command::Streak { habit_id } => print_streaks(&app, habit_id),
        Command::TestFire => {
            app.service
                .test_fire()
                .await
                .context("Failed to send test notification")?;
            drain(app.delivery.subscribe());
            Ok(())
        }
    }
}

/// Log notifications that were delivered before exit
fn drain(rx: Option<mpsc::UnboundedReceiver<DeliveredNotification>>) {
    if let Some(mut rx) = rx {
        while let Ok(event) = rx.try_recv() {
            println!("{}: {}", event.payload.title, event.payload.body);
        }
    }
}
