//! HTTPTables 网关
//!
//! 把策略引擎接入 axum 请求管道：按配置构建引擎，从 JSON 文件加载规则并热更新，
//! 在中间件中对每个请求判定 ACCEPT 或 DROP。

pub mod error;
pub mod middleware;
pub mod routes;
pub mod rules;
pub mod state;

pub use error::GatewayError;
pub use middleware::AttachedRules;
pub use routes::build_router;
pub use rules::{load_rules_file, RuleSetHandle, RulesWatcher};
pub use state::AppState;
