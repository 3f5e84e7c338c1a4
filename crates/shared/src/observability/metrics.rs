//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现。
//! 指标通过独立端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 在 `metrics_port` 上启动独立的 HTTP 服务器，暴露 `/metrics` 和 `/health`。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "httptables_decisions_total",
        "Total number of policy decisions by resulting policy"
    );
    metrics::describe_histogram!(
        "httptables_decision_duration_seconds",
        "Time spent applying the rule set to one request"
    );
    metrics::describe_counter!(
        "httptables_configuration_errors_total",
        "Total number of requests rejected because the rule set is malformed"
    );
    metrics::describe_counter!(
        "httptables_rule_reloads_total",
        "Total number of rule file reload attempts"
    );
    metrics::describe_gauge!("httptables_rules_loaded", "Number of rules currently active");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录一次策略判定
#[inline]
pub fn record_decision(policy: &str, duration_secs: f64) {
    metrics::counter!("httptables_decisions_total", "policy" => policy.to_string()).increment(1);
    metrics::histogram!("httptables_decision_duration_seconds").record(duration_secs);
}

#[inline]
pub fn record_configuration_error() {
    metrics::counter!("httptables_configuration_errors_total").increment(1);
}

/// 记录规则热加载结果
#[inline]
pub fn record_rule_reload(success: bool, rule_count: usize) {
    metrics::counter!(
        "httptables_rule_reloads_total",
        "status" => if success { "success" } else { "failure" }
    )
    .increment(1);

    if success {
        metrics::gauge!("httptables_rules_loaded").set(rule_count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 未初始化 recorder 时这些函数也不应 panic
        record_http_request("GET", "/api/test", 200, 0.1);
        record_decision("DROP", 0.001);
        record_configuration_error();
        record_rule_reload(true, 3);
        record_rule_reload(false, 0);
    }
}
