//! reqmon server binary.
//!
//! Loads config, opens the request log, serves the HTTP API until SIGINT or
//! SIGTERM, then runs the monitor's shutdown hook.

use reqmon_ingest::CaptureGate;
use reqmon_log::RequestMonitor;
use reqmon_server::config::{self, Config, LoggingConfig};
use reqmon_server::{app, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// First CLI argument, then `REQMON_CONFIG_PATH`, then `config.toml`.
fn config_path() -> (String, &'static str) {
    let non_blank = |value: &String| !value.trim().is_empty();

    if let Some(path) = std::env::args().nth(1).filter(non_blank) {
        return (path, "cli-arg");
    }
    if let Some(path) = std::env::var("REQMON_CONFIG_PATH").ok().filter(non_blank) {
        return (path, "env-var");
    }
    ("config.toml".to_string(), "default")
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_monitor(config: &Config) -> RequestMonitor {
    let pool = reqmon_db::create_pool(
        &config.database.path,
        reqmon_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("cannot open the request log database, check database.path");

    let monitor = RequestMonitor::new(pool, CaptureGate::new(&config.capture.excluded_prefixes));
    monitor
        .on_enable()
        .expect("cannot bring the request log schema up to date");
    monitor
}

#[tokio::main]
async fn main() {
    let (path, source) = config_path();
    let config = config::load_config(Some(&path)).expect("invalid configuration");
    init_tracing(&config.logging);
    tracing::info!(source, path = %path, "loaded configuration");

    let monitor = open_monitor(&config);

    let admin_token = config.admin.token().map(str::to_string);
    if admin_token.is_none() {
        tracing::warn!("admin.token is not set; /api routes are open to anyone who can reach them");
    }

    let router = app(AppState {
        monitor: monitor.clone(),
        admin_token,
    });

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("cannot bind {addr}: {e}"));
    tracing::info!(%addr, "reqmon listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let clear = config.retention.clear_on_disable;
    match tokio::task::spawn_blocking(move || monitor.on_disable(clear)).await {
        Ok(Ok(())) => tracing::info!("reqmon stopped"),
        Ok(Err(e)) => tracing::error!("failed to clear request log on shutdown: {}", e),
        Err(e) => tracing::error!("shutdown task failed: {}", e),
    }
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "shutting down");
}
