use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    /// 搜索结果缓存有效期（秒）
    pub search_ttl_secs: u64,
    /// 已安装包快照有效期（秒）
    pub installed_ttl_secs: u64,
    pub probe_timeout_secs: u64,
    pub search_timeout_secs: u64,
    /// 每次搜索最多返回的条目数
    pub result_limit: usize,
    /// 缓存条目数超过该值后触发过期清理
    pub sweep_threshold: usize,
    pub max_query_len: usize,
    /// nix-env 搜索输出的字节上限，超出视为查询过宽
    pub max_output_bytes: usize,
    /// 描述文本的最大字符数
    pub description_limit: usize,
    pub nix_command: String,
    pub nix_env_command: String,
    pub system_profile: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5001,
            search_ttl_secs: 3600,
            installed_ttl_secs: 300,
            probe_timeout_secs: 10,
            search_timeout_secs: 30,
            result_limit: 50,
            sweep_threshold: 100,
            max_query_len: 100,
            max_output_bytes: 1_000_000,
            description_limit: 200,
            nix_command: "nix".to_string(),
            nix_env_command: "nix-env".to_string(),
            system_profile: PathBuf::from("/nix/var/nix/profiles/system"),
        }
    }
}

impl Config {
    /// 配置文件路径：LIAN_NIX_CONFIG > ~/.config/lian-nix/config.toml
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("LIAN_NIX_CONFIG") {
            return PathBuf::from(path);
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config/lian-nix/config.toml")
    }

    pub fn load_or_default() -> Result<Self> {
        let mut config = Self::load_from(&Self::default_path())?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// 环境变量优先于配置文件
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("LIAN_NIX_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("LIAN_NIX_PORT 不是合法端口: {}", port))?;
        }
        if let Ok(bind) = std::env::var("LIAN_NIX_BIND") {
            self.bind = bind;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn installed_ttl(&self) -> Duration {
        Duration::from_secs(self.installed_ttl_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}
