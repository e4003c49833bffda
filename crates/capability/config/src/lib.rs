//! 桥接进程运行配置加载。

use std::env;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 读数投递方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// 读循环内同步等待 POST 完成（默认）
    Sync,
    /// 放入有界队列，由后台任务投递
    Queued,
}

/// 桥接进程运行配置。
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub ingest_url: String,
    pub port_description: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub handshake_settle_ms: u64,
    pub handshake_timeout_ms: u64,
    pub handshake_byte_budget: usize,
    pub connect_attempts: u32,
    pub connect_delay_ms: u64,
    pub idle_ms: u64,
    pub forward_timeout_ms: u64,
    pub delivery: DeliveryMode,
    pub queue_capacity: usize,
    pub verbose: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ingest_url: "http://127.0.0.1:5000/api/data".to_string(),
            port_description: "FT231X USB UART".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 1000,
            handshake_settle_ms: 1100,
            handshake_timeout_ms: 1000,
            handshake_byte_budget: 16,
            connect_attempts: 5,
            connect_delay_ms: 2000,
            idle_ms: 100,
            forward_timeout_ms: 5000,
            delivery: DeliveryMode::Sync,
            queue_capacity: 64,
            verbose: false,
        }
    }
}

impl BridgeConfig {
    /// 从环境变量读取配置，未设置的项使用默认值。
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let ingest_url = env::var("BRIDGE_INGEST_URL").unwrap_or(defaults.ingest_url);
        let port_description =
            env::var("BRIDGE_PORT_DESCRIPTION").unwrap_or(defaults.port_description);
        let baud_rate = read_with_default("BRIDGE_BAUD_RATE", defaults.baud_rate)?;
        let read_timeout_ms =
            read_with_default("BRIDGE_READ_TIMEOUT_MS", defaults.read_timeout_ms)?;
        let handshake_settle_ms =
            read_with_default("BRIDGE_HANDSHAKE_SETTLE_MS", defaults.handshake_settle_ms)?;
        let handshake_timeout_ms =
            read_with_default("BRIDGE_HANDSHAKE_TIMEOUT_MS", defaults.handshake_timeout_ms)?;
        let handshake_byte_budget =
            read_with_default("BRIDGE_HANDSHAKE_BYTE_BUDGET", defaults.handshake_byte_budget)?;
        let connect_attempts =
            read_with_default("BRIDGE_CONNECT_ATTEMPTS", defaults.connect_attempts)?;
        let connect_delay_ms =
            read_with_default("BRIDGE_CONNECT_DELAY_MS", defaults.connect_delay_ms)?;
        let idle_ms = read_with_default("BRIDGE_IDLE_MS", defaults.idle_ms)?;
        let forward_timeout_ms =
            read_with_default("BRIDGE_FORWARD_TIMEOUT_MS", defaults.forward_timeout_ms)?;
        let delivery = read_delivery("BRIDGE_DELIVERY", defaults.delivery)?;
        let queue_capacity =
            read_with_default("BRIDGE_QUEUE_CAPACITY", defaults.queue_capacity)?;
        let verbose = read_bool_with_default("BRIDGE_DEBUG", false)
            || read_bool_with_default("BRIDGE_VERBOSE", false);

        if handshake_byte_budget == 0 {
            return Err(ConfigError::Invalid(
                "BRIDGE_HANDSHAKE_BYTE_BUDGET".to_string(),
                "0".to_string(),
            ));
        }
        if queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "BRIDGE_QUEUE_CAPACITY".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            ingest_url,
            port_description,
            baud_rate,
            read_timeout_ms,
            handshake_settle_ms,
            handshake_timeout_ms,
            handshake_byte_budget,
            connect_attempts,
            connect_delay_ms,
            idle_ms,
            forward_timeout_ms,
            delivery,
            queue_capacity,
            verbose,
        })
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn handshake_settle(&self) -> Duration {
        Duration::from_millis(self.handshake_settle_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

/// 读取可解析类型的环境变量，未设置时使用默认值。
fn read_with_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_delivery(key: &str, default: DeliveryMode) -> Result<DeliveryMode, ConfigError> {
    match env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(DeliveryMode::Sync),
            "queued" | "queue" => Ok(DeliveryMode::Queued),
            _ => Err(ConfigError::Invalid(key.to_string(), value)),
        },
        Err(_) => Ok(default),
    }
}

/// 判断开关类环境变量是否为真值。
pub fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on")
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => is_truthy(&value),
        Err(_) => default,
    }
}
