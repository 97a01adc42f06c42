//! 主节点客户端调优参数。
//!
//! ### 设计目的（Why）
//! - 解析器在构造时接收读超时、锁读超时、单客户端并发通道数与分块大小四个参数，
//!   并原样透传给每个版本专属工厂，自身不解释其含义；
//! - 参数可从 TOML 的 `[client]` 表加载，缺省键沿用默认值。
//!
//! ### 契约说明（What）
//! - 默认值：读超时 20 秒、锁读超时 20 秒、每客户端 20 条通道、分块 2 MiB；
//! - 任意参数为零均视为非法，返回 [`ConfigError::NonPositive`]。

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_LOCK_READ_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_MAX_CONCURRENT_CHANNELS: u32 = 20;
const DEFAULT_CHUNK_SIZE: u32 = 2 * 1024 * 1024;

/// 透传给客户端工厂的四个调优参数。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientSettings {
    read_timeout: Duration,
    lock_read_timeout: Duration,
    max_concurrent_channels_per_client: u32,
    chunk_size: u32,
}

impl ClientSettings {
    /// 以显式参数构造并校验设置。
    pub fn new(
        read_timeout: Duration,
        lock_read_timeout: Duration,
        max_concurrent_channels_per_client: u32,
        chunk_size: u32,
    ) -> Result<Self, ConfigError> {
        let settings = Self {
            read_timeout,
            lock_read_timeout,
            max_concurrent_channels_per_client,
            chunk_size,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// 从 TOML 文本解析设置。
    ///
    /// ```toml
    /// [client]
    /// read_timeout_ms = 20000
    /// lock_read_timeout_ms = 20000
    /// max_concurrent_channels_per_client = 20
    /// chunk_size = 2097152
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let document: SettingsDocument = toml::from_str(source)?;
        let raw = document.client.unwrap_or_default();
        let defaults = Self::default();
        Self::new(
            raw.read_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.read_timeout),
            raw.lock_read_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_read_timeout),
            raw.max_concurrent_channels_per_client
                .unwrap_or(defaults.max_concurrent_channels_per_client),
            raw.chunk_size.unwrap_or(defaults.chunk_size),
        )
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn lock_read_timeout(&self) -> Duration {
        self.lock_read_timeout
    }

    pub fn max_concurrent_channels_per_client(&self) -> u32 {
        self.max_concurrent_channels_per_client
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.read_timeout.is_zero() {
            return Err(ConfigError::NonPositive {
                field: "read_timeout",
            });
        }
        if self.lock_read_timeout.is_zero() {
            return Err(ConfigError::NonPositive {
                field: "lock_read_timeout",
            });
        }
        if self.max_concurrent_channels_per_client == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_concurrent_channels_per_client",
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "chunk_size",
            });
        }
        Ok(())
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            lock_read_timeout: DEFAULT_LOCK_READ_TIMEOUT,
            max_concurrent_channels_per_client: DEFAULT_MAX_CONCURRENT_CHANNELS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsDocument {
    client: Option<RawClientSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClientSettings {
    read_timeout_ms: Option<u64>,
    lock_read_timeout_ms: Option<u64>,
    max_concurrent_channels_per_client: Option<u32>,
    chunk_size: Option<u32>,
}
