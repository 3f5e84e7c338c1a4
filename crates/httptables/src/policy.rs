//! 策略定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 访问策略
///
/// 每个策略对应一个稳定的数值码。规则里的策略以名称书写，
/// 通过 [`Policy::from_name`] 按名称查表解析。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Policy {
    Drop = 0,
    Accept = 1,
}

impl Policy {
    pub const ALL: [Policy; 2] = [Policy::Drop, Policy::Accept];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Drop => "DROP",
            Self::Accept => "ACCEPT",
        }
    }

    /// 按名称查找策略（区分大小写，与规则数据中的写法一致）
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }

    pub fn is_supported(name: &str) -> bool {
        Self::from_name(name).is_some()
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
