use chorepoints_server::settlement::scheduler::{self, Schedule};
use chorepoints_server::{server, storage};
mod cli;

use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    use clap::Parser;
    let args = cli::Cli::parse();

    // Console-only logging with env-driven level
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(true)
        .init();

    let config = match server::AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error=%e, "Failed to load config");
            std::process::exit(2);
        }
    };

    let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "data/app.db".into());
    // Ensure data dir exists when using default
    if let Some(parent) = std::path::Path::new(&db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        let _ = std::fs::create_dir_all(parent);
    }
    let store = match storage::Store::connect_sqlite(&db_path).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error=%e, path=%db_path, "Failed to connect DB");
            std::process::exit(3);
        }
    };

    if let Err(e) = store
        .seed_from_config(&config.children, &config.chores, &config.settings)
        .await
    {
        tracing::error!(error=%e, "Failed to seed DB");
        std::process::exit(4);
    }

    let state = match server::AppState::new(config, store) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error=%e, "Invalid config");
            std::process::exit(2);
        }
    };

    if let Some(cli::Command::Settle { job_code }) = args.command {
        let job_code = job_code.unwrap_or_else(|| state.config.settlement.job_code.clone());
        let now = chrono::Utc::now().with_timezone(&state.tz);
        match state.store.run_settlement(&job_code, now).await {
            Ok(report) => match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    tracing::error!(error=%e, "Failed to encode report");
                    std::process::exit(1);
                }
            },
            Err(e) => {
                tracing::error!(error=%e, kind = e.kind(), "Settlement failed");
                std::process::exit(5);
            }
        }
        return;
    }

    // Decide listen port: env PORT overrides config.listen_port, default 5151
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .or(state.config.listen_port)
        .unwrap_or(5151);

    let shutdown_token = state.shutdown_token();

    let scheduler_task = if state.config.settlement.enabled {
        match state.config.run_at() {
            Ok(run_at) => Some(scheduler::spawn(
                state.store.clone(),
                Schedule {
                    job_code: state.config.settlement.job_code.clone(),
                    run_at,
                    tz: state.tz,
                },
                shutdown_token.clone(),
            )),
            Err(e) => {
                tracing::error!(error=%e, "Invalid settlement schedule");
                std::process::exit(2);
            }
        }
    } else {
        tracing::info!("settlement scheduler disabled");
        None
    };

    let app = server::router(state);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    tracing::info!(%addr, "Starting server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error=%e, %addr, "Failed to bind listener");
            std::process::exit(6);
        }
    };

    let shutdown_token_for_server = shutdown_token.clone();
    let mut server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_token_for_server.cancelled_owned())
            .await
    });

    shutdown_signal().await;
    tracing::info!("shutdown: initiating graceful stop");
    shutdown_token.cancel();
    match tokio::time::timeout(std::time::Duration::from_secs(3), &mut server_task).await {
        Ok(join_res) => match join_res {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(%err, "server error"),
            Err(e) => tracing::error!(error=%e, "server task join error"),
        },
        Err(_) => {
            tracing::warn!("shutdown: forcing server abort due to timeout");
            server_task.abort();
        }
    }
    // a settlement in flight finishes inside spawn_blocking regardless
    if let Some(task) = scheduler_task {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(3), task).await;
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigint = signal(SignalKind::interrupt()).expect("listen SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("listen SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("shutdown: received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("shutdown: received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown: received Ctrl+C");
    }
}
