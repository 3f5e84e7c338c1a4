//! HTTPTables 网关服务
//!
//! 启动流程：加载配置 → 初始化可观测性 → 构建引擎并加载规则 → 启动规则监听 → 对外服务。

use std::time::Duration;

use anyhow::Result;
use httptables_gateway::{build_router, AppState, RulesWatcher};
use httptables_shared::{config::AppConfig, observability};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

const SERVICE_NAME: &str = "httptables-gateway";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;

    let _guard = observability::init(&config.observability).await?;

    info!(
        "Starting {} in {} mode...",
        SERVICE_NAME, config.environment
    );

    let state = AppState::from_config(&config.policy)?;

    let watch_handle = match (&config.policy.rules_file, config.policy.watch_rules) {
        (Some(path), true) => {
            let watcher = RulesWatcher::new(
                path,
                Duration::from_millis(config.policy.debounce_ms),
                state.engine.loader().clone(),
                state.rules.clone(),
            );
            match watcher.start() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!(error = %e, "规则文件监听启动失败，规则将不会热更新");
                    None
                }
            }
        }
        _ => None,
    };

    let app = build_router(state);
    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Gateway listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = watch_handle {
        handle.stop().await;
    }

    info!("Service shutdown complete");
    Ok(())
}

/// 等待关闭信号（Ctrl+C 或 SIGTERM）
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
