//! 配置管理模块
//!
//! 支持多层 TOML 配置文件加载与环境变量覆盖。

use crate::observability::ObservabilityConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// 策略配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// 默认策略名称（ACCEPT / DROP）
    pub default_policy: String,
    /// 字段访问器：headers（只读请求头）或 request（url、method 和请求头）
    pub field_accessor: String,
    /// JSON 规则文件路径，未设置时规则集为空
    pub rules_file: Option<String>,
    /// DROP 时返回的 HTTP 状态码
    pub drop_status: u16,
    /// 是否监听规则文件变化并热加载
    pub watch_rules: bool,
    pub debounce_ms: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_policy: "ACCEPT".to_string(),
            field_accessor: "request".to_string(),
            rules_file: None,
            drop_status: 403,
            watch_rules: true,
            debounce_ms: 500,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    pub policy: PolicyConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 配置目录取 `CONFIG_DIR`（默认 `config`），环境名取 `HTTPTABLES_ENV`（默认 `development`）。
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("HTTPTABLES_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), &env, service_name)
    }

    /// 从指定目录加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. {dir}/default.toml
    /// 2. {dir}/{environment}.toml
    /// 3. {dir}/{service_name}.toml
    /// 4. 环境变量（HTTPTABLES_ 前缀，层级用双下划线，如 HTTPTABLES_POLICY__DEFAULT_POLICY）
    pub fn load_from(config_dir: &Path, env: &str, service_name: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("HTTPTABLES")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.observability.service_name = config.service_name.clone();

        Ok(config)
    }

    /// 获取服务地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
