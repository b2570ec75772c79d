//! Mall Voice Server Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use mall_voice_agent::{DialogueEvent, DialogueOrchestrator, ErrorLearningSystem};
use mall_voice_config::{load_settings, Settings};
use mall_voice_server::{create_router, init_metrics, record_call_ended, record_error_cleanup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("MALL_VOICE_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized, use eprintln for early logging
            eprintln!(
                "Loaded configuration from files (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        },
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        },
    };

    init_tracing(&config);

    tracing::info!("Starting Mall Voice Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled && init_metrics().is_some() {
        tracing::info!("Initialized Prometheus metrics at /metrics");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let cleanup_interval = config.errors.cleanup_interval();

    let state = AppState::from_settings(config, env)?;
    tracing::info!(stores = state.catalog.len(), "Dialogue engine ready");

    // Background tasks
    let sweep_shutdown = state.contexts.start_sweep_task();
    let cleanup_shutdown = start_error_cleanup_task(Arc::clone(&state.errors), cleanup_interval);
    spawn_event_observer(&state.orchestrator);

    let orchestrator = Arc::clone(&state.orchestrator);
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = sweep_shutdown.send(true);
    let _ = cleanup_shutdown.send(true);

    let flushed = orchestrator.shutdown().await;
    tracing::info!(flushed, "Server shutdown complete");
    Ok(())
}

/// Periodically purge error records past the retention window
fn start_error_cleanup_task(errors: Arc<ErrorLearningSystem>, interval: Duration) -> watch::Sender<bool> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    let removed = errors.cleanup();
                    record_error_cleanup(removed);
                    if removed > 0 {
                        tracing::info!(removed, "Purged expired error records");
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Error cleanup task shutting down");
                        break;
                    }
                }
            }
        }
    });

    shutdown_tx
}

/// Count call endings from the orchestrator's event stream
fn spawn_event_observer(orchestrator: &DialogueOrchestrator) {
    let mut events = orchestrator.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DialogueEvent::CallEnded { call_id, reason, .. }) => {
                    tracing::debug!(call_id = %call_id, reason = %reason, "Call ended");
                    record_call_ended(&reason);
                },
                Ok(_) => {},
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event observer lagged");
                },
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

/// Initialize tracing (console, optionally JSON)
fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("mall_voice={level},conversation_log={level},tower_http=debug").into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
