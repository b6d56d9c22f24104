//! CLI 配置文件
//!
//! 两条臂的串口路径保存在用户配置目录下的 TOML 文件里
//! （Linux/macOS: `~/.config/soarm/config.toml`），通过
//! `soarm-cli config set` 写入。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// leader 臂的串口路径
    pub leader_port: Option<String>,
    /// follower 臂的串口路径
    pub follower_port: Option<String>,
}

impl CliConfig {
    /// 配置文件路径
    pub fn path() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .context("no user config directory available")?
            .join("soarm")
            .join("config.toml"))
    }

    /// 加载配置（文件不存在时返回默认值）
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// 保存配置，返回写入路径
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
