//! 策略引擎错误类型
//!
//! 只有一类错误：调用方提供的数据违反了结构约定。
//! 未识别的策略码、缺失的字段都不是错误，分别回退到默认策略和不匹配。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("规则必须以数组形式传入, 实际为 {found}")]
    RulesNotSequence { found: String },

    #[error("请求不能为空")]
    MissingRequest,

    #[error("规则格式错误: 第 {index} 条规则应为对象, 实际为 {found}")]
    MalformedRule { index: usize, found: String },

    #[error("规则 '{rule}' 的 conditions 格式错误")]
    InvalidConditions { rule: String },

    #[error("未知的字段访问器: {0}")]
    UnknownAccessor(String),

    #[error("未注册的指令或谓词: {0}")]
    UnknownInstruction(String),

    #[error("不支持的匹配器: {0}")]
    UnsupportedMatcher(String),

    #[error("无效的正则表达式 '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// JSON 值的类型名称，用于错误信息
pub(crate) fn type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
