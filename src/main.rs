// Main entry point - Command dispatch and dependency injection
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::task::JoinSet;

use crate::application::actuation_loop::ActuationLoop;
use crate::application::collector::{Collector, CollectorRunner};
use crate::application::confirm_loop::ConfirmLoop;
use crate::application::decision_loop::DecisionLoop;
use crate::application::provisioning_service::ProvisioningService;
use crate::application::telemetry_repository::TimeSeriesRepository;
use crate::domain::bucket::default_buckets;
use crate::infrastructure::config::{load_settings, log_level};
use crate::infrastructure::heartbeat::Heartbeat;
use crate::infrastructure::influx_cli::InfluxCli;
use crate::infrastructure::influx_repository::InfluxRepository;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::solcast::{SolcastCollector, SOLCAST_BASE_URL};
use crate::infrastructure::sonnen::SonnenCollector;
use crate::infrastructure::tibber::{TibberCollector, TIBBER_API_URL};
use crate::presentation::status_server;

#[derive(Parser)]
#[command(
    name = "ems",
    about = "Home energy management: price collection, battery decisions and InfluxDB provisioning",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run collectors, control loops and the status server (default)
    Run,

    /// Create the decisions and telemetry buckets, tolerating ones that already exist
    InitBuckets {
        /// Organization that owns the buckets
        #[arg(long, env = "DOCKER_INFLUXDB_INIT_ORG", default_value = "")]
        org: String,

        /// Admin token passed to the influx CLI
        #[arg(
            long,
            env = "DOCKER_INFLUXDB_INIT_ADMIN_TOKEN",
            default_value = "",
            hide_env_values = true
        )]
        token: String,

        /// Path to the influx CLI
        #[arg(long, default_value = "influx")]
        influx_bin: String,
    },
}

type Tasks = JoinSet<anyhow::Result<()>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run().await,
        Commands::InitBuckets {
            org,
            token,
            influx_bin,
        } => init_buckets(&org, &token, influx_bin).await,
    }
}

/// Always succeeds once the banners are printed: failed creates only produce
/// a notice, so re-running after a partial run is safe.
async fn init_buckets(org: &str, token: &str, influx_bin: String) -> anyhow::Result<()> {
    init_logging(&log_level(None), true);
    if org.is_empty() || token.is_empty() {
        tracing::warn!(
            org_set = !org.is_empty(),
            token_set = !token.is_empty(),
            "provision.missing_credentials"
        );
    }

    let service = ProvisioningService::new(InfluxCli::new(influx_bin), default_buckets());
    let mut stdout = std::io::stdout();
    let report = service.provision(org, token, &mut stdout).await?;

    tracing::info!(
        created = report.created(),
        total = report.outcomes.len(),
        "provision.done"
    );
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let loaded = load_settings();
    init_logging(&log_level(loaded.as_ref().ok().map(|s| &s.ems)), false);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ems.starting");

    let settings = match loaded {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "ems.config_error");
            return Err(e);
        }
    };
    tracing::info!(
        dry_run = settings.ems.dry_run,
        decision_interval = settings.ems.decision_interval_sec,
        influx_url = %settings.influx.url,
        log_level = %settings.ems.log_level,
        "ems.config_loaded"
    );

    let influx = InfluxRepository::new(
        settings.influx.url.clone(),
        settings.influx.token.clone(),
        settings.influx.org.clone(),
    );
    match influx.ping().await {
        Ok(true) => tracing::info!("ems.influx_connected"),
        Ok(false) => {
            tracing::error!("ems.influx_not_ready");
            anyhow::bail!("InfluxDB at {} is not ready", settings.influx.url);
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "ems.influx_not_ready");
            return Err(e);
        }
    }
    let repository: Arc<dyn TimeSeriesRepository> = Arc::new(influx);

    let (decision_loop, decisions) = DecisionLoop::new(
        repository.clone(),
        settings.influx.bucket.clone(),
        settings.ems.decision_interval(),
    );
    let (actuation_loop, sent) = ActuationLoop::new(
        decisions,
        settings.ems.actuation_interval(),
        settings.ems.dry_run,
    );
    let confirm_loop = ConfirmLoop::new(sent, settings.ems.confirm_interval());

    let mut tasks = Tasks::new();

    let heartbeat = Heartbeat::new(settings.ems.heartbeat_path.clone());
    tasks.spawn(heartbeat.run_forever());

    let status_addr = settings.ems.status_addr.clone();
    tasks.spawn(async move { status_server::serve(&status_addr).await });

    tasks.spawn(async move {
        decision_loop.run_forever().await;
        Ok(())
    });
    tasks.spawn(async move {
        actuation_loop.run_forever().await;
        Ok(())
    });
    tasks.spawn(async move {
        confirm_loop.run_forever().await;
        Ok(())
    });

    let tibber = TibberCollector::new(
        TIBBER_API_URL,
        settings.tibber.token.clone(),
        settings.influx.bucket.clone(),
    )?;
    spawn_collector(&mut tasks, tibber, &repository);

    if let Some(sonnen) = &settings.sonnen {
        spawn_collector(
            &mut tasks,
            SonnenCollector::new(&sonnen.ip, sonnen.token.clone())?,
            &repository,
        );
    }
    if let Some(solcast) = &settings.solcast {
        let collector = SolcastCollector::new(
            SOLCAST_BASE_URL,
            solcast.api_key.clone(),
            solcast.site_1.clone(),
            solcast.site_2.clone(),
            settings.influx.bucket.clone(),
        )?;
        spawn_collector(&mut tasks, collector, &repository);
    }

    tracing::info!(tasks = tasks.len(), "ems.loops_starting");

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("ems.shutdown");
            Ok(())
        }
        Some(joined) = tasks.join_next() => match joined {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        },
    };

    tasks.shutdown().await;
    if let Err(e) = &outcome {
        tracing::error!(error = %format!("{e:#}"), "ems.task_failed");
    }
    tracing::info!("ems.stopped");
    outcome
}

fn spawn_collector<C>(tasks: &mut Tasks, collector: C, repository: &Arc<dyn TimeSeriesRepository>)
where
    C: Collector + 'static,
{
    let runner = CollectorRunner::new(collector, repository.clone());
    tasks.spawn(async move {
        runner.run_forever().await;
        Ok(())
    });
}
