//! 规则模型

use crate::matcher::Matcher;
use crate::policy::Policy;

/// 字段条件映射
///
/// 按插入顺序迭代；重复插入同名字段时原位替换匹配器。
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    entries: Vec<(String, Matcher)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, matcher: impl Into<Matcher>) -> Self {
        self.insert(name, matcher);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, matcher: impl Into<Matcher>) {
        let name = name.into();
        let matcher = matcher.into();

        match self.entries.iter_mut().find(|(field, _)| *field == name) {
            Some(entry) => entry.1 = matcher,
            None => self.entries.push((name, matcher)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Matcher> {
        self.entries
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, m)| m)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Matcher)> {
        self.entries.iter().map(|(field, m)| (field.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, M: Into<Matcher>> FromIterator<(K, M)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (K, M)>>(iter: I) -> Self {
        let mut conditions = Self::new();
        for (name, matcher) in iter {
            conditions.insert(name, matcher);
        }
        conditions
    }
}

/// 规则定义
///
/// `policy` 以策略名称书写（如 `"DROP"`），无法识别时由引擎回退到默认策略。
/// `conditions` 为 `None` 表示规则缺少条件映射，求值时报配置错误。
/// 空的条件映射会匹配所有请求。
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: Option<String>,
    pub policy: Option<String>,
    pub conditions: Option<Conditions>,
}

impl Rule {
    pub fn new(policy: impl Into<String>) -> Self {
        Self {
            name: None,
            policy: Some(policy.into()),
            conditions: Some(Conditions::new()),
        }
    }

    pub fn dropping() -> Self {
        Self::new(Policy::Drop.name())
    }

    pub fn accepting() -> Self {
        Self::new(Policy::Accept.name())
    }

    pub fn without_conditions(policy: impl Into<String>) -> Self {
        Self {
            conditions: None,
            ..Self::new(policy)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 追加一个字段条件
    pub fn when(mut self, field: impl Into<String>, matcher: impl Into<Matcher>) -> Self {
        self.conditions
            .get_or_insert_with(Conditions::new)
            .insert(field, matcher);
        self
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// 规则中声明的策略（未声明或无法识别时为 `None`）
    pub fn resolved_policy(&self) -> Option<Policy> {
        self.policy.as_deref().and_then(Policy::from_name)
    }

    /// 日志中使用的规则标识：有名称用名称，否则用序号
    pub fn label(&self, index: usize) -> String {
        self.name.clone().unwrap_or_else(|| index.to_string())
    }
}
