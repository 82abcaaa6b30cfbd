//! CLI 配置管理
//!
//! 加载优先级: 环境变量 > 配置文件 > 默认值
//!
//! 配置文件查找顺序:
//! 1. `--config` 参数或 `$ATP_CONFIG`
//! 2. `./atp.toml`, `./atp.yaml`
//! 3. `~/.config/atp/config.toml`

use anyhow::{Context, Result};
use atp_executor::RunnerConfig;
use atp_generator::{GeneratorConfig, Provider};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// CLI 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtpConfig {
    /// 日志级别 (`RUST_LOG` 优先)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// 测试进程配置
    #[serde(default)]
    pub runner: RunnerConfig,

    /// 用例生成配置
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_path() -> String {
    "~/.config/atp/data.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for AtpConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            database: DatabaseConfig::default(),
            runner: RunnerConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

/// 配置文件格式
enum Format {
    Toml,
    Yaml,
    Json,
}

fn format_of(path: &Path) -> Result<Format> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => Ok(Format::Toml),
        Some("yaml") | Some("yml") => Ok(Format::Yaml),
        Some("json") => Ok(Format::Json),
        _ => anyhow::bail!("不支持的配置文件格式: {:?}", path),
    }
}

impl AtpConfig {
    /// 从多个源加载配置
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::find_config_file(explicit) {
            Some(path) => {
                tracing::debug!("加载配置文件: {:?}", path);
                Self::load_from_file(&path)?
            }
            None => {
                tracing::debug!("未找到配置文件，使用默认配置");
                Self::default()
            }
        };

        config.apply_env(|key| env::var(key).ok())?;
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?;

        let config = match format_of(path)? {
            Format::Toml => toml::from_str(&content)
                .with_context(|| format!("解析 TOML 配置失败: {:?}", path))?,
            Format::Yaml => serde_yaml::from_str(&content)
                .with_context(|| format!("解析 YAML 配置失败: {:?}", path))?,
            Format::Json => serde_json::from_str(&content)
                .with_context(|| format!("解析 JSON 配置失败: {:?}", path))?,
        };

        Ok(config)
    }

    /// 查找配置文件 (按优先级搜索)
    fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = env::var("ATP_CONFIG") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }

        let local = [PathBuf::from("./atp.toml"), PathBuf::from("./atp.yaml")];
        if let Some(path) = local.iter().find(|p| p.exists()) {
            return Some(path.clone());
        }

        dirs::home_dir()
            .map(|home| home.join(".config").join("atp").join("config.toml"))
            .filter(|p| p.exists())
    }

    /// 用环境变量覆盖配置
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = var("ATP_DB_PATH") {
            self.database.path = path;
        }
        if let Some(level) = var("ATP_LOG_LEVEL") {
            self.log_level = level;
        }

        if let Some(program) = var("ATP_RUNNER_PROGRAM") {
            self.runner.program = program;
        }
        if let Some(root) = var("ATP_PROJECT_ROOT") {
            self.runner.project_root = PathBuf::from(root);
        }
        if let Some(dir) = var("ATP_GENERATED_DIR") {
            self.runner.generated_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = var("ATP_RUNNER_TIMEOUT") {
            let secs: u64 = timeout
                .trim()
                .parse()
                .with_context(|| format!("ATP_RUNNER_TIMEOUT 无效: {}", timeout))?;
            self.runner.timeout_secs = (secs > 0).then_some(secs);
        }

        if let Some(provider) = var("ATP_LLM_PROVIDER") {
            self.generator.provider = provider.parse::<Provider>()?;
        }
        if let Some(model) = var("ATP_LLM_MODEL") {
            self.generator.model = Some(model);
        }
        if let Some(url) = var("ATP_OLLAMA_URL") {
            if self.generator.provider == Provider::Ollama {
                self.generator.url = Some(url);
            }
        }
        if let Some(key) = var("GROQ_API_KEY") {
            self.generator.api_key = Some(key);
        }

        Ok(())
    }

    fn expand_paths(&mut self) {
        let root = self.runner.project_root.to_string_lossy().into_owned();
        self.runner.project_root = PathBuf::from(shellexpand::tilde(&root).as_ref());
    }

    /// 验证配置
    ///
    /// 生成器配置在构造生成器时才校验，未配置 Groq key 不影响其他命令。
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            anyhow::bail!("database.path 不能为空");
        }
        self.runner.validate()?;
        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建配置目录失败: {:?}", parent))?;
        }

        let content = match format_of(path)? {
            Format::Toml => toml::to_string_pretty(self).context("序列化 TOML 失败")?,
            Format::Yaml => serde_yaml::to_string(self).context("序列化 YAML 失败")?,
            Format::Json => serde_json::to_string_pretty(self).context("序列化 JSON 失败")?,
        };

        fs::write(path, content).with_context(|| format!("写入配置文件失败: {:?}", path))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AtpConfig::default();
        assert_eq!(config.database.path, "~/.config/atp/data.db");
        assert_eq!(config.runner.program, "npx playwright test");
        assert_eq!(config.generator.provider, Provider::Ollama);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = AtpConfig::default();
        config.runner.program = "from-file".to_string();

        config
            .apply_env(lookup(&[
                ("ATP_RUNNER_PROGRAM", "npx playwright test --headed"),
                ("ATP_RUNNER_TIMEOUT", "300"),
                ("ATP_LLM_PROVIDER", "groq"),
                ("GROQ_API_KEY", "gsk_test"),
                ("ATP_OLLAMA_URL", "http://gpu-box:11434"),
            ]))
            .unwrap();

        assert_eq!(config.runner.program, "npx playwright test --headed");
        assert_eq!(config.runner.timeout_secs, Some(300));
        assert_eq!(config.generator.provider, Provider::Groq);
        assert_eq!(config.generator.api_key.as_deref(), Some("gsk_test"));
        // Ollama 地址不影响 Groq
        assert_eq!(config.generator.url, None);
    }

    #[test]
    fn test_invalid_env_values() {
        let mut config = AtpConfig::default();
        assert!(config.apply_env(lookup(&[("ATP_RUNNER_TIMEOUT", "soon")])).is_err());
        assert!(config.apply_env(lookup(&[("ATP_LLM_PROVIDER", "openai")])).is_err());
    }

    #[test]
    fn test_save_and_load_all_formats() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AtpConfig::default();
        config.database.path = "/tmp/atp-test.db".to_string();
        config.runner.max_output_bytes = 4096;
        config
            .runner
            .env
            .insert("BASE_URL".to_string(), "https://staging.test".to_string());
        config.generator.model = Some("qwen2.5".to_string());

        for name in ["atp.toml", "atp.yaml", "atp.json"] {
            let path = dir.path().join(name);
            config.save_to_file(&path).unwrap();

            let loaded = AtpConfig::load_from_file(&path).unwrap();
            assert_eq!(loaded.database.path, "/tmp/atp-test.db");
            assert_eq!(loaded.runner.max_output_bytes, 4096);
            assert_eq!(loaded.runner.env["BASE_URL"], "https://staging.test");
            assert_eq!(loaded.generator.model.as_deref(), Some("qwen2.5"));
        }
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atp.toml");
        fs::write(&path, "[runner]\nproject_root = \"/srv/e2e\"\n").unwrap();

        let config = AtpConfig::load_from_file(&path).unwrap();
        assert_eq!(config.runner.project_root, PathBuf::from("/srv/e2e"));
        assert_eq!(config.runner.max_output_bytes, 10 * 1024 * 1024);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_unsupported_format() {
        assert!(AtpConfig::default()
            .save_to_file(Path::new("/tmp/atp.ini"))
            .is_err());
    }
}
