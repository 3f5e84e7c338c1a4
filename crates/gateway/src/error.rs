//! 网关错误类型定义

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use httptables::ConfigurationError;
use serde_json::json;

/// 网关错误类型
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 请求命中 DROP 策略
    #[error("Dropping request on url: {url}")]
    Dropped { url: String, status: StatusCode },

    #[error("规则配置错误: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("读取规则文件失败: {path}: {source}")]
    RulesFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("规则文件监听失败: {0}")]
    Watcher(#[from] notify::Error),

    #[error("无效的拒绝状态码: {0}")]
    InvalidDropStatus(u16),
}

impl GatewayError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Dropped { status, .. } => *status,
            Self::Configuration(_)
            | Self::RulesFile { .. }
            | Self::Watcher(_)
            | Self::InvalidDropStatus(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Dropped { .. } => "REQUEST_DROPPED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::RulesFile { .. } => "RULES_FILE_ERROR",
            Self::Watcher(_) => "WATCHER_ERROR",
            Self::InvalidDropStatus(_) => "INVALID_DROP_STATUS",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 规则错误的细节只记录日志，不回显给客户端
        let message = match &self {
            Self::Dropped { .. } => self.to_string(),
            other => {
                tracing::error!(error = %other, "请求处理失败");
                "服务内部错误，请稍后重试".to_string()
            }
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
