//! # Reward-Relay Service
//!
//! Binary entry point for the reward-relay HTTP service.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes logging
//! - Wires the webhook store, GitHub provider, dispatch pool, hook service,
//!   and the background reconciler
//! - Starts the HTTP server from reward-relay-api

mod config;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reward_relay_api::{create_router, AppState};
use reward_relay_core::{
    spawn_reconciliation, DispatchPool, EventDispatcher, HookService, HooksProvider,
    MemoryRewardEngine, MemorySettingsStore, MemoryWebhookStore, Reconciler, RepositoryGate,
    RewardEngine, SignatureVerifier, StaticIdentityResolver, StaticManagerDirectory,
    TriggerRegistry, WebhookStore,
};
use reward_relay_github::{CachedHooksProvider, GithubHooksClient};

use crate::config::{LoggingConfig, RelayConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/reward-relay/relay.toml (system-wide defaults)
    //  2. ./config/relay.toml (deployment-local override)
    //  3. Path given by REWARD_RELAY_CONFIG_PATH (operator-specified file)
    //  4. Environment variables prefixed REWARD_RELAY (double-underscore
    //     separator), e.g. REWARD_RELAY__SERVER__PORT=9000 sets server.port
    //
    // Every field carries a default, so an entirely unconfigured environment
    // yields a runnable service. A malformed file or an unparseable value is
    // a hard startup error.
    // -------------------------------------------------------------------------
    let config = match RelayConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // The log format lives in the configuration we just failed to
            // load, so fall back to the default format for the error itself.
            init_tracing(&LoggingConfig::default());
            error!(error = %e, "Service configuration is unusable; aborting");
            std::process::exit(3);
        }
    };

    init_tracing(&config.logging);

    info!("Starting Reward-Relay Service");

    // -------------------------------------------------------------------------
    // Wire the pipeline
    //
    // Registrations, repository gating, and the reward engine run in-process;
    // the GitHub client is the only remote dependency. The caching wrapper is
    // shared by the hook service and the reconciler, which drops its contents
    // at the start of every cycle.
    // -------------------------------------------------------------------------
    let client = match GithubHooksClient::new(config.github.client_config()) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to construct the GitHub client; aborting");
            std::process::exit(3);
        }
    };
    let provider: Arc<dyn HooksProvider> = Arc::new(CachedHooksProvider::new(Arc::new(client)));

    let store: Arc<dyn WebhookStore> = Arc::new(MemoryWebhookStore::default());
    let gate = Arc::new(RepositoryGate::new(Arc::new(MemorySettingsStore::new())));
    let engine: Arc<dyn RewardEngine> = Arc::new(MemoryRewardEngine::new());
    let registry = TriggerRegistry::new();

    let managers = Arc::new(StaticManagerDirectory::new());
    for username in &config.management.managers {
        managers.grant(username.clone()).await;
    }
    if config.management.managers.is_empty() {
        warn!("No managers configured; every management request will be rejected");
    }

    let identities = Arc::new(StaticIdentityResolver::new());
    for (login, username) in &config.identity.links {
        identities.link(login.clone(), username.clone()).await;
    }

    let reconciler = Arc::new(Reconciler::new(store.clone(), provider.clone()));

    let dispatcher = Arc::new(EventDispatcher::new(
        SignatureVerifier::new(config.github.scheme()?),
        registry.clone(),
        store.clone(),
        gate.clone(),
        engine.clone(),
        identities,
    ));
    let pool = Arc::new(DispatchPool::start(
        dispatcher,
        config.dispatch.queue_depth,
        config.dispatch.workers,
    ));
    info!(
        queue_depth = config.dispatch.queue_depth,
        workers = config.dispatch.workers,
        "Started dispatch pool"
    );

    let hooks = Arc::new(HookService::new(
        store,
        provider,
        gate,
        engine,
        managers,
        Arc::clone(&reconciler),
        registry,
    ));

    spawn_reconciliation(
        reconciler,
        Duration::from_secs(config.reconciliation.interval_secs),
    );
    info!(
        interval_secs = config.reconciliation.interval_secs,
        "Scheduled background reconciliation"
    );

    let app = create_router(AppState::new(hooks, pool));

    // -------------------------------------------------------------------------
    // Serve
    // -------------------------------------------------------------------------
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind((
        config.server.host.as_str(),
        config.server.port,
    ))
    .await
    {
        Ok(listener) => listener,
        Err(e) => {
            error!(address = %address, error = %e, "Failed to bind HTTP listener; aborting");
            std::process::exit(1);
        }
    };

    info!("Starting HTTP server on {}", address);

    // Note: axum's graceful shutdown allows in-flight requests to complete.
    // The server stops accepting new connections as soon as the signal
    // arrives, then waits for the requests already being handled.
    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown");
            },
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
    {
        error!(error = %e, "HTTP server failed");
        std::process::exit(2);
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` overrides the configured level when set.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "reward_relay_service={level},reward_relay_api={level},\
             reward_relay_core={level},reward_relay_github={level},tower_http=debug",
            level = logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
