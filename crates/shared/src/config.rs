//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 环境变量前缀，如 RULE_ENGINE_COMPILER__MERGE_CONDITIONS -> compiler.merge_conditions
pub const ENV_PREFIX: &str = "RULE_ENGINE";

/// 编译器配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// 是否把 字段/比较符/值 合并为一个条件，关闭时保持旧的丢弃行为
    pub merge_conditions: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            merge_conditions: true,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LogConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub compiler: CompilerConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 配置目录由 CONFIG_DIR 指定（默认 `config`），环境由 RULE_ENGINE_ENV 指定（默认 development）。
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env =
            std::env::var(format!("{}_ENV", ENV_PREFIX)).unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), &env, service_name)
    }

    /// 从指定目录加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（RULE_ENGINE_ 前缀，`__` 分隔层级）
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
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_config_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rule-shared-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.compiler.merge_conditions);
        assert_eq!(config.log.level, "info");
        assert!(!config.log.is_json());
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        let dir = temp_config_dir("empty");
        let config = AppConfig::load_from(&dir, "development", "rule-engine").unwrap();

        assert_eq!(config.service_name, "rule-engine");
        assert_eq!(config.environment, "development");
        assert!(!config.is_production());
    }

    #[test]
    fn test_service_file_overrides_default_file() {
        let dir = temp_config_dir("layered");
        fs::write(
            dir.join("default.toml"),
            "[log]\nlevel = \"warn\"\nformat = \"pretty\"\n",
        )
        .unwrap();
        fs::write(dir.join("production.toml"), "[log]\nformat = \"json\"\n").unwrap();
        fs::write(dir.join("rule-engine.toml"), "[log]\nlevel = \"debug\"\n").unwrap();

        let config = AppConfig::load_from(&dir, "production", "rule-engine").unwrap();

        assert_eq!(config.log.level, "debug");
        assert!(config.log.is_json());
        assert!(config.is_production());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_env_override() {
        let dir = temp_config_dir("env");
        fs::write(dir.join("default.toml"), "[compiler]\nmerge_conditions = true\n").unwrap();

        // SAFETY: 该变量只在本测试中读写
        unsafe {
            std::env::set_var("RULE_ENGINE_COMPILER__MERGE_CONDITIONS", "false");
        }
        let config = AppConfig::load_from(&dir, "development", "rule-engine").unwrap();
        unsafe {
            std::env::remove_var("RULE_ENGINE_COMPILER__MERGE_CONDITIONS");
        }

        assert!(!config.compiler.merge_conditions);
        fs::remove_dir_all(&dir).unwrap();
    }
}
