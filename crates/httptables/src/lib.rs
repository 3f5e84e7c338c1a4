//! HTTP 请求策略引擎
//!
//! 对入站请求按顺序应用规则，决定 ACCEPT 还是 DROP：
//! - 递归匹配器（数组、谓词、正则、指令、布尔、字面量）
//! - 规则内字段条件按 AND 求值，短路返回
//! - 规则列表首个匹配生效，无匹配时回退默认策略
//! - 可替换的字段访问器，以及 JSON 规则文档加载

pub mod accessor;
pub mod engine;
pub mod error;
pub mod loader;
pub mod matcher;
pub mod policy;
pub mod rule;

pub use accessor::{
    accessor_by_name, header_accessor, request_accessor, FieldAccessor, HeaderSource,
};
pub use engine::{Engine, EngineOptions};
pub use error::{ConfigurationError, Result};
pub use loader::RuleLoader;
pub use matcher::{check, InstructionFn, Matcher, PredicateFn};
pub use policy::Policy;
pub use rule::{Conditions, Rule};
