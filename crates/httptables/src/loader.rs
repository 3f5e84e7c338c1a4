//! 规则文档加载
//!
//! 把 JSON 规则文档映射为内存中的 [`Rule`] 列表，并执行结构检查。
//!
//! 匹配器的 JSON 写法：
//!
//! | JSON | 匹配器 |
//! |---|---|
//! | 数组 | `Any` |
//! | 布尔 | `Bool` |
//! | 字符串 / 数字 / null | `Literal` |
//! | `{"pattern": "^/api/"}` | `Pattern` |
//! | `{"predicate": "name"}` | 已注册的谓词 |
//! | `{"instruction": "name", "args": [...]}` | 已注册的指令 |
//! | `{"literal": {...}}` | 任意 JSON 字面量 |

use crate::error::{type_name, ConfigurationError, Result};
use crate::matcher::{InstructionFn, Matcher, PredicateFn};
use crate::rule::{Conditions, Rule};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// 规则加载器
///
/// 持有具名谓词和指令的注册表，规则数据通过名称引用它们。
#[derive(Clone, Default)]
pub struct RuleLoader {
    predicates: HashMap<String, PredicateFn>,
    instructions: HashMap<String, InstructionFn>,
}

impl RuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_predicate<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Value) -> Matcher + Send + Sync + 'static,
    {
        self.predicates.insert(name.into(), Arc::new(f));
        self
    }

    pub fn register_instruction<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&[Matcher]) -> Matcher + Send + Sync + 'static,
    {
        self.instructions.insert(name.into(), Arc::new(f));
        self
    }

    /// 从 JSON 字符串加载规则
    pub fn load_str(&self, json: &str) -> Result<Vec<Rule>> {
        let value: Value = serde_json::from_str(json)?;
        self.load(&value)
    }

    /// 从 JSON 值加载规则
    #[instrument(skip(self, document))]
    pub fn load(&self, document: &Value) -> Result<Vec<Rule>> {
        let items = document
            .as_array()
            .ok_or_else(|| ConfigurationError::RulesNotSequence {
                found: type_name(document).to_string(),
            })?;

        let rules = items
            .iter()
            .enumerate()
            .map(|(index, item)| self.load_rule(index, item))
            .collect::<Result<Vec<_>>>()?;

        debug!(count = rules.len(), "规则文档已加载");
        Ok(rules)
    }

    /// 加载规则文档中的单条规则，`index` 用于错误信息和无名规则的标签
    pub fn load_rule(&self, index: usize, item: &Value) -> Result<Rule> {
        let object = item
            .as_object()
            .ok_or_else(|| ConfigurationError::MalformedRule {
                index,
                found: type_name(item).to_string(),
            })?;

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string);

        // 非字符串的策略保留其 JSON 文本，求值时回退到默认策略
        let policy = object.get("policy").and_then(|p| match p {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

        let label = name.clone().unwrap_or_else(|| index.to_string());
        let conditions = match object.get("conditions") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(self.load_conditions(map)?),
            Some(_) => return Err(ConfigurationError::InvalidConditions { rule: label }),
        };

        Ok(Rule {
            name,
            policy,
            conditions,
        })
    }

    fn load_conditions(&self, map: &Map<String, Value>) -> Result<Conditions> {
        map.iter()
            .map(|(field, value)| {
                let matcher = self.parse_matcher(value)?;
                Ok::<_, ConfigurationError>((field.clone(), matcher))
            })
            .collect()
    }

    /// 解析单个匹配器
    pub fn parse_matcher(&self, value: &Value) -> Result<Matcher> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.parse_matcher(item))
                .collect::<Result<Vec<_>>>()
                .map(Matcher::Any),
            Value::Bool(b) => Ok(Matcher::Bool(*b)),
            Value::Object(map) => self.parse_object_matcher(map),
            literal => Ok(Matcher::Literal(literal.clone())),
        }
    }

    fn parse_object_matcher(&self, map: &Map<String, Value>) -> Result<Matcher> {
        if let Some(literal) = map.get("literal") {
            return Ok(Matcher::Literal(literal.clone()));
        }

        if let Some(pattern) = map.get("pattern") {
            let pattern = pattern.as_str().ok_or_else(|| {
                ConfigurationError::UnsupportedMatcher(format!(
                    "pattern 需要字符串, 实际为 {}",
                    type_name(pattern)
                ))
            })?;
            return Matcher::pattern(pattern);
        }

        if let Some(name) = map.get("predicate") {
            let name = Self::reference_name(name)?;
            let f = self
                .predicates
                .get(name)
                .ok_or_else(|| ConfigurationError::UnknownInstruction(name.to_string()))?;
            return Ok(Matcher::Predicate(f.clone()));
        }

        if let Some(name) = map.get("instruction") {
            let name = Self::reference_name(name)?;
            let instruction = self
                .instructions
                .get(name)
                .ok_or_else(|| ConfigurationError::UnknownInstruction(name.to_string()))?;

            let args = match map.get("args") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| self.parse_matcher(item))
                    .collect::<Result<Vec<_>>>()?,
                Some(other) => {
                    return Err(ConfigurationError::UnsupportedMatcher(format!(
                        "指令 '{}' 的 args 需要数组, 实际为 {}",
                        name,
                        type_name(other)
                    )));
                }
            };

            return Ok(Matcher::Instruction {
                instruction: instruction.clone(),
                args,
            });
        }

        Err(ConfigurationError::UnsupportedMatcher(
            Value::Object(map.clone()).to_string(),
        ))
    }

    fn reference_name(value: &Value) -> Result<&str> {
        value.as_str().ok_or_else(|| {
            ConfigurationError::UnsupportedMatcher(format!(
                "谓词或指令名称需要字符串, 实际为 {}",
                type_name(value)
            ))
        })
    }
}

impl fmt::Debug for RuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut predicates: Vec<&String> = self.predicates.keys().collect();
        let mut instructions: Vec<&String> = self.instructions.keys().collect();
        predicates.sort();
        instructions.sort();

        f.debug_struct("RuleLoader")
            .field("predicates", &predicates)
            .field("instructions", &instructions)
            .finish()
    }
}
