//! 转发能力：把 SensorReading 投递到后端接入端点。
//!
//! - [`HttpForwarder`]：同步投递，调用方等待 POST 完成后才继续读串口。
//! - [`QueuedForwarder`]：可选扩展，有界队列 + 后台任务，队列满时返回
//!   [`ForwardError::Backpressure`] 并丢弃该条读数。

mod http;
mod queued;

pub use http::HttpForwarder;
pub use queued::QueuedForwarder;

use async_trait::async_trait;
use domain::SensorReading;

/// 转发错误。
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backpressure: {0}")]
    Backpressure(String),
}

/// 读数转发器抽象。
#[async_trait]
pub trait ReadingForwarder: Send + Sync {
    async fn forward(&self, reading: SensorReading) -> Result<(), ForwardError>;
}
