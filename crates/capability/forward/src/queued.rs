use crate::{ForwardError, ReadingForwarder};
use async_trait::async_trait;
use bridge_telemetry::record_forward_failure;
use domain::SensorReading;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 有界队列投递。
///
/// `forward` 只负责入队，真正的投递由后台任务按入队顺序串行完成；
/// 所有 `QueuedForwarder` 句柄被丢弃后，后台任务投递完剩余读数再退出。
#[derive(Clone)]
pub struct QueuedForwarder {
    sender: mpsc::Sender<SensorReading>,
}

impl QueuedForwarder {
    /// 创建队列并启动后台投递任务，需在 tokio 运行时内调用。
    pub fn spawn(
        inner: Arc<dyn ReadingForwarder>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(reading) = receiver.recv().await {
                if let Err(err) = inner.forward(reading).await {
                    warn!(target: "bridge.forward", error = %err, "forward_failed");
                }
            }
            info!(target: "bridge.forward", "forward_queue_drained");
        });
        (Self { sender }, worker)
    }
}

#[async_trait]
impl ReadingForwarder for QueuedForwarder {
    async fn forward(&self, reading: SensorReading) -> Result<(), ForwardError> {
        self.sender.try_send(reading).map_err(|err| {
            record_forward_failure();
            match err {
                TrySendError::Full(_) => ForwardError::Backpressure("queue full".to_string()),
                TrySendError::Closed(_) => {
                    ForwardError::Backpressure("queue closed".to_string())
                }
            }
        })
    }
}
