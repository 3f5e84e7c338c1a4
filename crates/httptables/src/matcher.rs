//! 条件匹配器
//!
//! 规则中每个字段对应一个 [`Matcher`]，由 [`check`] 递归解释。
//! 分派优先级固定为：数组 > 谓词 > 正则 > 指令 > 布尔 > 字面量。
//!
//! 谓词和指令返回新的匹配器继续求值，引擎不限制递归深度：
//! 一个总是返回自身的谓词会耗尽调用栈。

use crate::error::{ConfigurationError, Result};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// 谓词：以观测值为参数，生成新的匹配器
pub type PredicateFn = Arc<dyn Fn(&Value) -> Matcher + Send + Sync>;

/// 指令：以规则给定的固定参数调用，生成新的匹配器
pub type InstructionFn = Arc<dyn Fn(&[Matcher]) -> Matcher + Send + Sync>;

/// 匹配器
#[derive(Clone)]
pub enum Matcher {
    /// 任一元素匹配即匹配，空列表永不匹配
    Any(Vec<Matcher>),
    Predicate(PredicateFn),
    Pattern(Regex),
    Instruction {
        instruction: InstructionFn,
        args: Vec<Matcher>,
    },
    /// 忽略观测值，直接返回该布尔值
    Bool(bool),
    Literal(Value),
}

impl Matcher {
    pub fn any(matchers: impl IntoIterator<Item = Matcher>) -> Self {
        Self::Any(matchers.into_iter().collect())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Matcher + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// 编译正则匹配器
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|source| ConfigurationError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn instruction<F>(f: F, args: Vec<Matcher>) -> Self
    where
        F: Fn(&[Matcher]) -> Matcher + Send + Sync + 'static,
    {
        Self::Instruction {
            instruction: Arc::new(f),
            args,
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn matches(&self, observed: Option<&Value>) -> bool {
        check(self, observed)
    }
}

/// 判断观测值是否满足匹配器
///
/// 观测值缺失（`None` 或 JSON `null`）时直接返回 `false`，优先于一切分派。
pub fn check(matcher: &Matcher, observed: Option<&Value>) -> bool {
    let value = match observed {
        None | Some(Value::Null) => {
            trace!("观测值为空");
            return false;
        }
        Some(v) => v,
    };

    evaluate(matcher, value)
}

fn evaluate(matcher: &Matcher, value: &Value) -> bool {
    match matcher {
        Matcher::Any(matchers) => {
            trace!(count = matchers.len(), "数组匹配器, 任一元素匹配即可");
            matchers
                .iter()
                .fold(false, |total, m| total || evaluate(m, value))
        }
        Matcher::Predicate(f) => {
            trace!("谓词匹配器");
            evaluate(&f(value), value)
        }
        Matcher::Pattern(regex) => {
            trace!(pattern = %regex, "正则匹配器");
            regex.is_match(&as_text(value))
        }
        Matcher::Instruction { instruction, args } => {
            trace!(args = args.len(), "指令匹配器");
            evaluate(&instruction(args.as_slice()), value)
        }
        Matcher::Bool(b) => {
            trace!(value = *b, "布尔匹配器");
            *b
        }
        Matcher::Literal(expected) => {
            trace!(expected = %expected, "字面量匹配器");
            literal_eq(expected, value)
        }
    }
}

/// 字面量相等：数字按数值比较（`200` 与 `200.0` 相等），其余类型严格比较
fn literal_eq(expected: &Value, value: &Value) -> bool {
    match (expected, value) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => expected == value,
    }
}

/// 正则匹配时把观测值转为文本
///
/// 数组按逗号拼接元素（null 元素为空串），对象为 `[object Object]`，
/// 整数值的浮点数不带小数部分。
fn as_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed("null"),
        Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => Cow::Owned(i.to_string()),
            (_, Some(u), _) => Cow::Owned(u.to_string()),
            (_, _, Some(f)) => Cow::Owned(f.to_string()),
            _ => Cow::Owned(n.to_string()),
        },
        Value::Array(items) => Cow::Owned(
            items
                .iter()
                .map(|item| match item {
                    Value::Null => Cow::Borrowed(""),
                    other => as_text(other),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Cow::Borrowed("[object Object]"),
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any(matchers) => f.debug_tuple("Any").field(matchers).finish(),
            Self::Predicate(_) => f.write_str("Predicate(<predicate>)"),
            Self::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Self::Instruction { args, .. } => f
                .debug_struct("Instruction")
                .field("instruction", &"<instruction>")
                .field("args", args)
                .finish(),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
        }
    }
}

impl From<&str> for Matcher {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for Matcher {
    fn from(value: String) -> Self {
        Self::Literal(Value::String(value))
    }
}

impl From<i64> for Matcher {
    fn from(value: i64) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<bool> for Matcher {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<Regex> for Matcher {
    fn from(value: Regex) -> Self {
        Self::Pattern(value)
    }
}

impl From<Vec<Matcher>> for Matcher {
    fn from(value: Vec<Matcher>) -> Self {
        Self::Any(value)
    }
}
