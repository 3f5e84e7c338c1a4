//! 策略过滤中间件
//!
//! 两个阶段配合使用：`attach_rules` 把当前规则集挂到请求扩展上，
//! `policy_filter` 读取规则集并调用引擎判定。DROP 直接返回拒绝响应，
//! ACCEPT 继续交给后续处理。

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use httptables::{Policy, Rule};
use httptables_shared::observability::metrics;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::state::AppState;

/// 挂在请求扩展上的规则集
#[derive(Clone, Debug)]
pub struct AttachedRules(pub Arc<Vec<Rule>>);

/// 把当前生效的规则集挂到请求上
pub async fn attach_rules(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let rules = state.rules.load_full();
    request.extensions_mut().insert(AttachedRules(rules));
    next.run(request).await
}

/// 按挂载的规则集判定请求
///
/// 请求上没有规则集时按空规则集处理，即直接采用默认策略。
pub async fn policy_filter(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let attached = request.extensions().get::<AttachedRules>().cloned();
    let rules: &[Rule] = attached.as_ref().map(|r| r.0.as_slice()).unwrap_or(&[]);

    let start = Instant::now();
    let decision = state.engine.apply_rules(Some(&request), rules);
    let elapsed = start.elapsed().as_secs_f64();

    let policy = match decision {
        Ok(policy) => policy,
        Err(e) => {
            metrics::record_configuration_error();
            return Err(e.into());
        }
    };
    metrics::record_decision(policy.name(), elapsed);

    match policy {
        Policy::Drop => {
            let url = request.uri().to_string();
            warn!(url = %url, method = %request.method(), "请求被 DROP 策略拒绝");
            Err(GatewayError::Dropped {
                url,
                status: state.drop_status,
            })
        }
        Policy::Accept => {
            debug!(url = %request.uri(), "请求通过");
            Ok(next.run(request).await)
        }
    }
}
