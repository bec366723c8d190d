//! claimsync — INSS claim synchronization and notification pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults (config from ./claimsync.toml if present)
//! cargo run --release
//!
//! # Explicit config and data directory
//! ./claimsync --config /etc/claimsync/claimsync.toml --data-dir /var/lib/claimsync
//! ```
//!
//! # Environment Variables
//!
//! - `CLAIMSYNC_CONFIG`: path to the TOML config file
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use claimsync::api::{api_routes, AppState};
use claimsync::classifier::{Classifier, CompositeClassifier};
use claimsync::clients::{AiServiceClient, CaseManager, CrmClient, PortalClient};
use claimsync::config;
use claimsync::gateway::{BridgeClient, SessionManager};
use claimsync::learning::LearningStore;
use claimsync::notify::NotificationRouter;
use claimsync::storage::{self, NotificationAudit, ProcessLock};
use claimsync::sync::{MemoryJobStore, Orchestrator};
use claimsync::tags::TagReconciler;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "claimsync")]
#[command(about = "INSS claim synchronization and notification pipeline")]
#[command(version)]
struct CliArgs {
    /// Override the server bind address (default from config: "0.0.0.0:8080")
    #[arg(short, long)]
    addr: Option<String>,

    /// Path to the TOML config file (overrides CLAIMSYNC_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    /// Data directory for the sled database and lock file
    #[arg(long, env = "CLAIMSYNC_DATA_DIR")]
    data_dir: Option<String>,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    GatewaySupervisor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::GatewaySupervisor => write!(f, "GatewaySupervisor"),
        }
    }
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    if let Some(path) = &args.config {
        std::env::set_var("CLAIMSYNC_CONFIG", path);
    }
    let cfg = config::ClaimsyncConfig::load();
    cfg.validate().context("invalid configuration")?;
    config::init(cfg);
    let cfg = config::get();

    let server_addr = args.addr.clone().unwrap_or_else(|| cfg.server.addr.clone());
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| cfg.storage.data_dir.clone());

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  claimsync — INSS Claim Synchronization Pipeline");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("");
    info!("  Data dir:       {}", data_dir);
    info!("  Portal:         {}", cfg.portal.base_url);
    info!("  CRM:            {}", cfg.crm.base_url);
    info!("  AI service:     {}", cfg.classifier.ai_url);
    info!("  Gateway bridge: {}", cfg.gateway.bridge_url);
    info!("  Window:         {} days", cfg.pipeline.report_window_days);
    info!("");

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir))?;

    info!("Acquiring process lock...");
    let _process_lock =
        ProcessLock::acquire(&data_dir).context("failed to acquire process lock")?;

    storage::init(&data_dir).context("failed to open durable storage")?;
    let audit = NotificationAudit::open_global().context("failed to open notification audit")?;
    let learning = LearningStore::open_global().context("failed to open learning store")?;

    match audit.prune_older_than(cfg.storage.retention_days) {
        Ok(0) => {}
        Ok(n) => info!("Pruned {} audit records older than {} days", n, cfg.storage.retention_days),
        Err(e) => warn!("Audit prune failed: {}", e),
    }
    match learning.prune_older_than(cfg.storage.retention_days) {
        Ok(0) => {}
        Ok(n) => info!("Pruned {} learning entries older than {} days", n, cfg.storage.retention_days),
        Err(e) => warn!("Learning prune failed: {}", e),
    }

    // External clients, all behind traits.
    let portal = Arc::new(PortalClient::from_config().context("portal client")?);
    let crm: Arc<dyn CaseManager> =
        Arc::new(CrmClient::from_config().context("CRM client")?);
    let ai = Arc::new(AiServiceClient::from_config().context("AI service client")?);
    let classifier: Arc<dyn Classifier> = Arc::new(CompositeClassifier::from_config(ai));

    // Messaging gateway session.
    let transport = Arc::new(BridgeClient::from_config().context("gateway bridge client")?);
    let session = SessionManager::from_config(transport);
    session.start().await;
    info!("Gateway session: {}", session.state());

    let router = Arc::new(NotificationRouter::new(
        crm.clone(),
        session.clone(),
        audit.clone(),
    ));
    let orchestrator = Orchestrator::new(
        portal,
        crm.clone(),
        classifier,
        Arc::new(TagReconciler::new(crm)),
        router,
        learning.clone(),
        Arc::new(MemoryJobStore::new()),
    );

    // Graceful shutdown via Ctrl+C.
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // Task: HTTP server.
    let app = api_routes(AppState {
        orchestrator,
        session: session.clone(),
        audit,
        learning,
    });
    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("failed to bind to {}", server_addr))?;
    info!("HTTP server listening on {}", server_addr);
    let http_cancel = cancel_token.clone();
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                http_cancel.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;
        match result {
            Ok(()) => Ok(TaskName::HttpServer),
            Err(e) => Err(anyhow::anyhow!("HTTP server error: {}", e)),
        }
    });

    // Task: gateway supervision loop.
    let gw_session = session.clone();
    let gw_cancel = cancel_token.clone();
    task_set.spawn(async move {
        info!("[GatewaySupervisor] Task starting");
        gw_session.run(gw_cancel).await;
        Ok(TaskName::GatewaySupervisor)
    });

    let supervisor_result = run_supervisor(&mut task_set, cancel_token).await;

    // Shutdown order matters: drain HTTP (already done via graceful
    // shutdown), close the messaging session so its artifacts stay
    // structurally sound, then flush sled.
    session.shutdown().await;
    storage::flush();

    info!("");
    info!("claimsync shutdown complete");
    supervisor_result
}
