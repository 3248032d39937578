//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// 链目录文件路径
    pub chains_path: String,
    /// 逗号分隔的允许来源，"*" 表示任意
    pub cors_allow_origin: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

/// 下发方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchPolicy {
    /// 钱包 i 付款后把余额转给钱包 i+1（默认）
    #[default]
    Relay,
    /// 每个钱包只付款，不做余额中继（钱包需各自预充值）
    Direct,
}

impl std::str::FromStr for DispatchPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "relay" => Ok(DispatchPolicy::Relay),
            "direct" => Ok(DispatchPolicy::Direct),
            other => anyhow::bail!("RELAY_DISPATCH_POLICY must be 'relay' or 'direct', got '{}'", other),
        }
    }
}

/// 中继编排配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// 两跳之间的暂停（毫秒）
    pub hop_delay_ms: u64,
    /// 视为最终确认所需的确认数
    pub confirmations: usize,
    pub confirmation_timeout_secs: u64,
    /// 单个 RPC 端点探测超时
    pub probe_timeout_secs: u64,
    /// receipt 轮询间隔
    pub poll_interval_ms: u64,
    /// 整个批次的超时（不设置则不限）
    pub batch_timeout_secs: Option<u64>,
    pub dispatch_policy: DispatchPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into()),
            chains_path: std::env::var("CHAINS_PATH")
                .unwrap_or_else(|_| "helper/chains.json".into()),
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").unwrap_or_else(|_| "*".into()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: std::env::var("LOG_FILE_ENABLED")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            hop_delay_ms: std::env::var("RELAY_HOP_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
            confirmations: std::env::var("RELAY_CONFIRMATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            confirmation_timeout_secs: std::env::var("RELAY_CONFIRMATION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(180),
            probe_timeout_secs: std::env::var("RELAY_PROBE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            poll_interval_ms: std::env::var("RELAY_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2000),
            batch_timeout_secs: std::env::var("RELAY_BATCH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            dispatch_policy: std::env::var("RELAY_DISPATCH_POLICY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        }
    }
}

impl RelayConfig {
    pub fn hop_delay(&self) -> Duration {
        Duration::from_millis(self.hop_delay_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            relay: RelayConfig::default(),
        })
    }

    /// 从配置文件加载配置（缺失的段/字段回落到环境变量默认值）
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            anyhow::bail!("BIND_ADDR must be a socket address, got '{}'", self.server.bind_addr);
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if self.relay.confirmations == 0 {
            anyhow::bail!("RELAY_CONFIRMATIONS must be at least 1");
        }
        if self.relay.probe_timeout_secs == 0 || self.relay.confirmation_timeout_secs == 0 {
            anyhow::bail!("RPC timeouts must be positive");
        }
        if self.relay.poll_interval_ms == 0 {
            anyhow::bail!("RELAY_POLL_INTERVAL_MS must be positive");
        }
        if self.relay.batch_timeout_secs == Some(0) {
            anyhow::bail!("RELAY_BATCH_TIMEOUT_SECS must be positive when set");
        }

        Ok(())
    }
}
