//! 串口相关配置类型

use std::time::Duration;

/// 进入命令模式的转义序列
pub const HANDSHAKE_COMMAND: &[u8] = b"+++";

/// 命令模式应答中期望出现的子串
pub const HANDSHAKE_ACK: &str = "OK";

/// 重试策略（配置，不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 两次尝试之间的等待
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// 读循环按需重连时使用的单次尝试
    pub fn single(delay: Duration) -> Self {
        Self::new(1, delay)
    }
}

/// 持久连接参数
#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// 端口描述需包含的子串
    pub target_description: String,
    /// 波特率
    pub baud_rate: u32,
    /// 读超时
    pub read_timeout: Duration,
}

/// 握手参数
#[derive(Debug, Clone)]
pub struct HandshakeSettings {
    /// 波特率
    pub baud_rate: u32,
    /// 应答读超时
    pub response_timeout: Duration,
    /// 发送转义序列后的静置时间
    pub settle: Duration,
    /// 应答最多读取的字节数
    pub byte_budget: usize,
    /// 转义序列
    pub command: Vec<u8>,
    /// 期望的应答子串
    pub expected_ack: String,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            response_timeout: Duration::from_millis(1000),
            settle: Duration::from_millis(1100),
            byte_budget: 16,
            command: HANDSHAKE_COMMAND.to_vec(),
            expected_ack: HANDSHAKE_ACK.to_string(),
        }
    }
}
