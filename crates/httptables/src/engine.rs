//! 策略引擎
//!
//! 按顺序扫描规则，返回第一条匹配规则的策略；没有规则匹配时返回默认策略。
//! 引擎本身无状态，每次调用都完整扫描一遍规则列表。

use crate::accessor::{header_accessor, FieldAccessor, HeaderSource};
use crate::error::{type_name, ConfigurationError, Result};
use crate::loader::RuleLoader;
use crate::matcher::check;
use crate::policy::Policy;
use crate::rule::Rule;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 引擎构造参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineOptions {
    /// 默认策略名称，未设置或无法识别时为 `ACCEPT`
    #[serde(default)]
    pub default_policy: Option<String>,
}

impl EngineOptions {
    pub fn with_default_policy(policy: impl Into<String>) -> Self {
        Self {
            default_policy: Some(policy.into()),
        }
    }
}

/// 策略引擎
///
/// 构造后只有字段访问器可以替换。替换需要 `&mut self`，
/// 共享给多个线程的引擎若要热替换访问器，由宿主自行同步（例如整体换出 `Arc<Engine>`）。
pub struct Engine<R> {
    default_policy: Policy,
    accessor: FieldAccessor<R>,
    loader: RuleLoader,
    rules: Option<Arc<Vec<Rule>>>,
}

impl<R> Engine<R>
where
    R: HeaderSource + 'static,
{
    /// 使用默认的请求头访问器创建引擎
    pub fn new(options: EngineOptions) -> Self {
        Self::with_accessor(options, header_accessor())
    }
}

impl<R> Engine<R> {
    pub fn with_accessor(options: EngineOptions, accessor: FieldAccessor<R>) -> Self {
        let default_policy = Self::resolve_default_policy(options.default_policy.as_deref());
        debug!(default_policy = %default_policy, "默认策略已设置");

        Self {
            default_policy,
            accessor,
            loader: RuleLoader::new(),
            rules: None,
        }
    }

    fn resolve_default_policy(name: Option<&str>) -> Policy {
        match name {
            None => Policy::Accept,
            Some(name) => Policy::from_name(name).unwrap_or_else(|| {
                warn!(policy = name, "未知的默认策略, 回退到 ACCEPT");
                Policy::Accept
            }),
        }
    }

    pub fn default_policy(&self) -> Policy {
        self.default_policy
    }

    /// 替换字段访问器，对之后的所有求值立即生效
    pub fn set_field_accessor<F>(&mut self, accessor: F)
    where
        F: Fn(&R, &str) -> Option<Value> + Send + Sync + 'static,
    {
        debug!("设置自定义字段访问器");
        self.accessor = Arc::new(accessor);
    }

    pub fn access_field(&self, request: &R, field: &str) -> Option<Value> {
        (self.accessor)(request, field)
    }

    pub fn loader(&self) -> &RuleLoader {
        &self.loader
    }

    /// 用于注册具名谓词和指令
    pub fn loader_mut(&mut self) -> &mut RuleLoader {
        &mut self.loader
    }

    /// 附加本地规则，供 [`Engine::test`] 使用
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.set_rules(rules);
        self
    }

    pub fn set_rules(&mut self, rules: Vec<Rule>) {
        self.rules = Some(Arc::new(rules));
    }

    pub fn rules(&self) -> Option<&[Rule]> {
        self.rules.as_deref().map(Vec::as_slice)
    }

    /// 判断请求是否满足规则的全部字段条件
    ///
    /// 任一字段不匹配立即返回 `false`；条件映射为空时恒为 `true`。
    pub fn is_matching(&self, request: &R, rule: &Rule) -> Result<bool> {
        let label = rule.name.as_deref().unwrap_or("<unnamed>");
        self.matches(request, rule, label)
    }

    fn matches(&self, request: &R, rule: &Rule, label: &str) -> Result<bool> {
        let conditions =
            rule.conditions
                .as_ref()
                .ok_or_else(|| ConfigurationError::InvalidConditions {
                    rule: label.to_string(),
                })?;

        for (field, matcher) in conditions.iter() {
            debug!(field, "检查字段");
            let observed = self.access_field(request, field);
            if !check(matcher, observed.as_ref()) {
                debug!(field, "字段不匹配");
                return Ok(false);
            }
            debug!(field, "字段匹配");
        }

        Ok(true)
    }

    /// 按顺序应用规则，返回第一条匹配规则的策略
    ///
    /// 匹配规则的策略无法识别时返回默认策略；没有规则匹配时返回默认策略。
    #[instrument(skip_all, fields(rules = rules.len()))]
    pub fn apply_rules(&self, request: Option<&R>, rules: &[Rule]) -> Result<Policy> {
        let request = request.ok_or(ConfigurationError::MissingRequest)?;

        for (index, rule) in rules.iter().enumerate() {
            if let Some(policy) = self.decide(request, index, rule)? {
                return Ok(policy);
            }
        }

        Ok(self.default_policy)
    }

    /// 对 JSON 规则文档求值
    ///
    /// 规则在扫描到时才逐条加载，首个匹配之后的元素即使格式错误也不会报错。
    #[instrument(skip_all)]
    pub fn apply_value(&self, request: Option<&R>, rules: &Value) -> Result<Policy> {
        let items = rules
            .as_array()
            .ok_or_else(|| ConfigurationError::RulesNotSequence {
                found: type_name(rules).to_string(),
            })?;
        let request = request.ok_or(ConfigurationError::MissingRequest)?;

        for (index, item) in items.iter().enumerate() {
            let rule = self.loader.load_rule(index, item)?;
            if let Some(policy) = self.decide(request, index, &rule)? {
                return Ok(policy);
            }
        }

        Ok(self.default_policy)
    }

    /// 规则匹配时返回其策略，不匹配时返回 `None`
    fn decide(&self, request: &R, index: usize, rule: &Rule) -> Result<Option<Policy>> {
        let label = rule.label(index);
        debug!(rule = %label, "分析规则");

        if !self.matches(request, rule, &label)? {
            debug!(rule = %label, "规则不匹配");
            return Ok(None);
        }

        let policy = match rule.resolved_policy() {
            Some(policy) => policy,
            None => {
                warn!(
                    rule = %label,
                    policy = ?rule.policy,
                    default_policy = %self.default_policy,
                    "规则策略无法识别, 使用默认策略"
                );
                self.default_policy
            }
        };
        debug!(rule = %label, policy = %policy, "规则匹配");
        Ok(Some(policy))
    }

    /// 对本地附加的规则求值
    pub fn test(&self, request: &R) -> Result<Policy> {
        let rules = self
            .rules
            .as_ref()
            .ok_or_else(|| ConfigurationError::RulesNotSequence {
                found: "null".to_string(),
            })?;
        self.apply_rules(Some(request), rules)
    }
}

impl<R> Clone for Engine<R> {
    fn clone(&self) -> Self {
        Self {
            default_policy: self.default_policy,
            accessor: self.accessor.clone(),
            loader: self.loader.clone(),
            rules: self.rules.clone(),
        }
    }
}

impl<R> fmt::Debug for Engine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("default_policy", &self.default_policy)
            .field("loader", &self.loader)
            .field("rules", &self.rules.as_ref().map(|r| r.len()))
            .finish()
    }
}
