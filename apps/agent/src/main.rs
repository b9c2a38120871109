mod apply;
mod config;
mod cycle;
mod db;
mod errors;
mod inbox;
mod listing;
mod llm_client;
mod matcher;
mod models;
mod routes;
mod state;
mod store;

use anyhow::{bail, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::apply::{ApplyExecutor, WebDriverConfig, WebDriverExecutor};
use crate::config::Config;
use crate::cycle::{spawn_scheduler, CycleSettings, Orchestrator, TriggerOutcome, TriggerSource};
use crate::db::create_pool;
use crate::inbox::{ImapConfig, ImapInbox, Inbox};
use crate::listing::{IndeedSource, ListingSource, NaukriSource};
use crate::llm_client::{CoverLetterGenerator, LocalLlmClient};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::JobStore;

const WEBDRIVER_TIMEOUT: Duration = Duration::from_secs(60);
const IMAP_TIMEOUT: Duration = Duration::from_secs(60);

/// Finds fresh job listings, drafts cover letters, applies or queues, and
/// watches the inbox for replies.
#[derive(Debug, Parser)]
#[command(name = "agent", version)]
struct Cli {
    /// Run one full cycle and exit.
    #[arg(long)]
    run_once: bool,

    /// Run the scheduler without the HTTP dashboard.
    #[arg(long, conflicts_with = "run_once")]
    no_server: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting job agent v{}", env!("CARGO_PKG_VERSION"));
    info!(
        role = %config.job_role,
        location = %config.job_location,
        mode = %config.apply_mode,
        "Search configured"
    );

    let db = create_pool(&config.database_url).await?;
    let store = JobStore::new(db);
    let orchestrator = Arc::new(build_orchestrator(&mut config, store.clone())?);

    if cli.run_once {
        return match orchestrator.trigger(TriggerSource::Cli).await {
            TriggerOutcome::Completed(report) => {
                info!("Run report: {}", serde_json::to_string(&report)?);
                Ok(())
            }
            TriggerOutcome::Failed(reason) => bail!("cycle aborted: {reason}"),
            TriggerOutcome::AlreadyRunning => bail!("another cycle is already running"),
        };
    }

    let scheduler = spawn_scheduler(
        orchestrator.clone(),
        config.cycle_interval,
        config.first_run_delay,
    );

    if cli.no_server {
        shutdown_signal().await;
        scheduler.abort();
        return Ok(());
    }

    let app = build_router(AppState {
        store,
        orchestrator,
    })
    .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Dashboard listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.abort();
    info!("Shut down cleanly");
    Ok(())
}

/// Wires the concrete collaborators. Takes the IMAP credentials out of `config`.
fn build_orchestrator(config: &mut Config, store: JobStore) -> Result<Orchestrator> {
    let indeed: Arc<dyn ListingSource> = Arc::new(IndeedSource::new(
        &config.job_role,
        &config.job_location,
        config.http_timeout,
    )?);
    let naukri: Arc<dyn ListingSource> = Arc::new(NaukriSource::new(
        &config.job_role,
        &config.job_location,
        config.http_timeout,
    )?);

    let llm = LocalLlmClient::new(config.local_llm_endpoint.clone(), config.llm_timeout)?;
    if llm.is_configured() {
        info!("Local LLM endpoint configured");
    } else {
        info!("LOCAL_LLM_ENDPOINT not set, cover letters will be stub drafts");
    }
    let generator: Arc<dyn CoverLetterGenerator> = Arc::new(llm);

    let executor: Arc<dyn ApplyExecutor> = Arc::new(WebDriverExecutor::new(WebDriverConfig {
        remote_url: config.webdriver_url.clone(),
        chromedriver_path: config.chromedriver_path.clone(),
        chromedriver_port: config.chromedriver_port,
        headless: config.headless,
        resume_path: PathBuf::from(&config.resume_path),
        settle: config.page_settle,
        request_timeout: WEBDRIVER_TIMEOUT,
    })?);

    let inbox = match config.imap.take() {
        Some(imap) => {
            info!(host = %imap.host, user = %imap.username, "Inbox configured");
            let inbox: Arc<dyn Inbox> = Arc::new(ImapInbox::new(ImapConfig {
                host: imap.host,
                port: imap.port,
                username: imap.username,
                password: imap.password,
                folder: "INBOX".to_string(),
                timeout: IMAP_TIMEOUT,
            }));
            Some(inbox)
        }
        None => {
            info!("IMAP credentials not set, reply matching disabled");
            None
        }
    };

    Ok(Orchestrator::new(
        store,
        vec![indeed, naukri],
        generator,
        executor,
        inbox,
        CycleSettings {
            mode: config.apply_mode,
            resume_path: config.resume_path.clone(),
            reply_lookback_days: config.reply_lookback_days,
        },
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
