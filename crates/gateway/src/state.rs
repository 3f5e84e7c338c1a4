//! 网关共享状态

use std::path::Path;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::StatusCode;
use httptables::{accessor_by_name, Engine, EngineOptions, Rule};
use httptables_shared::config::PolicyConfig;
use tracing::info;

use crate::error::{GatewayError, Result};
use crate::rules::{load_rules_file, new_rule_set, RuleSetHandle};

/// 作用于 HTTP 请求的策略引擎
pub type HttpEngine = Engine<Request>;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<HttpEngine>,
    pub rules: RuleSetHandle,
    /// 命中 DROP 时返回的状态码
    pub drop_status: StatusCode,
}

impl AppState {
    pub fn new(engine: HttpEngine, rules: Vec<Rule>, drop_status: StatusCode) -> Self {
        Self {
            engine: Arc::new(engine),
            rules: new_rule_set(rules),
            drop_status,
        }
    }

    /// 按策略配置构建引擎并加载初始规则集
    pub fn from_config(config: &PolicyConfig) -> Result<Self> {
        let accessor = accessor_by_name(&config.field_accessor)?;
        let engine: HttpEngine = Engine::with_accessor(
            EngineOptions::with_default_policy(config.default_policy.as_str()),
            accessor,
        );

        let drop_status = StatusCode::from_u16(config.drop_status)
            .map_err(|_| GatewayError::InvalidDropStatus(config.drop_status))?;

        let rules = match &config.rules_file {
            Some(path) => load_rules_file(Path::new(path), engine.loader())?,
            None => Vec::new(),
        };

        info!(
            default_policy = %engine.default_policy(),
            field_accessor = %config.field_accessor,
            rules = rules.len(),
            "策略引擎已初始化"
        );

        Ok(Self::new(engine, rules, drop_status))
    }
}
