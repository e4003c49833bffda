//! 串口错误类型定义

/// 串口链路错误
#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 串口驱动错误（打开、查询缓冲区等）
    #[error("serial port error: {0}")]
    Port(String),

    /// 设备断开（读到 EOF）
    #[error("serial link closed")]
    Closed,
}

impl From<tokio_serial::Error> for SerialError {
    fn from(err: tokio_serial::Error) -> Self {
        Self::Port(err.to_string())
    }
}

/// 单次连接尝试失败的原因
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// 没有描述匹配的端口
    #[error("no serial port matches description: {0}")]
    Discovery(String),

    /// 握手无应答或应答不符
    #[error("identity handshake failed on {0}")]
    Verification(String),

    /// 已校验的端口打开失败
    #[error("failed to open {port}: {source}")]
    Connection {
        port: String,
        #[source]
        source: SerialError,
    },
}
