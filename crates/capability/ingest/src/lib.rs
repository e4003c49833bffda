//! 串口读循环：重连、读取、切帧、逐帧交给处理器。

mod frame;

pub use frame::{AccumulationBuffer, extract};

use async_trait::async_trait;
use bridge_serial::{ConnectionManager, RetryPolicy, SerialError, Sleeper};
use bridge_telemetry::{record_bytes_read, record_frame_extracted, record_read_error};
use domain::RawFrame;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 采集错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("handler error: {0}")]
    Handler(String),
    #[error("read error: {0}")]
    Read(#[from] SerialError),
}

/// RawFrame 处理器。
#[async_trait]
pub trait FrameHandler: Send + Sync {
    async fn handle(&self, frame: RawFrame) -> Result<(), IngestError>;
}

/// 读循环参数。
#[derive(Debug, Clone)]
pub struct ReadLoopSettings {
    /// 无数据或重连后的空闲等待
    pub idle_interval: Duration,
    /// 未连接时每轮的重连策略（单次尝试）
    pub reconnect: RetryPolicy,
}

impl Default for ReadLoopSettings {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_millis(100),
            reconnect: RetryPolicy::single(Duration::from_secs(2)),
        }
    }
}

/// 单轮循环的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 未连接，本轮重连成功
    Reconnected,
    /// 未连接，本轮重连失败
    ReconnectFailed,
    /// 已连接但没有可读数据
    Idle,
    /// 读取了数据并处理了若干帧（可能为 0）
    Processed { bytes: usize, frames: usize },
    /// 读错误，已断开
    ReadFailed,
}

/// 串口采集源：持有连接管理器与累积缓冲区，二者只在读循环内被访问。
pub struct SerialSource {
    manager: ConnectionManager,
    buffer: AccumulationBuffer,
    sleeper: Arc<dyn Sleeper>,
    settings: ReadLoopSettings,
}

impl SerialSource {
    pub fn new(
        manager: ConnectionManager,
        sleeper: Arc<dyn Sleeper>,
        settings: ReadLoopSettings,
    ) -> Self {
        Self {
            manager,
            buffer: AccumulationBuffer::new(),
            sleeper,
            settings,
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConnectionManager {
        &mut self.manager
    }

    pub fn buffer(&self) -> &AccumulationBuffer {
        &self.buffer
    }

    /// 运行读循环，直到 `shutdown` 变为 true 或发送端被丢弃。
    ///
    /// 退出时关闭主连接。
    pub async fn run(
        &mut self,
        handler: Arc<dyn FrameHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(target: "bridge.ingest", "read_loop_started");
        while !*shutdown.borrow() {
            tokio::select! {
                outcome = self.cycle(handler.as_ref()) => {
                    debug!(target: "bridge.ingest", ?outcome, "read_cycle");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.manager.disconnect();
        info!(target: "bridge.ingest", "read_loop_stopped");
    }

    /// 执行一轮循环。
    pub async fn cycle(&mut self, handler: &dyn FrameHandler) -> CycleOutcome {
        let Some(link) = self.manager.link_mut() else {
            let reconnect = self.settings.reconnect;
            let connected = self.manager.connect(&reconnect).await;
            self.sleeper.sleep(self.settings.idle_interval).await;
            return if connected {
                CycleOutcome::Reconnected
            } else {
                CycleOutcome::ReconnectFailed
            };
        };

        let read = match link.bytes_available() {
            Ok(0) => Ok(None),
            Ok(available) => link.read_some(available).await.map(Some),
            Err(err) => Err(err),
        };

        let bytes = match read {
            Ok(Some(bytes)) if !bytes.is_empty() => bytes,
            Ok(_) => {
                self.sleeper.sleep(self.settings.idle_interval).await;
                return CycleOutcome::Idle;
            }
            Err(err) => {
                let err = IngestError::from(err);
                record_read_error();
                warn!(
                    target: "bridge.ingest",
                    session_id = ?self.manager.session_id(),
                    error = %err,
                    "serial_read_failed"
                );
                self.manager.disconnect();
                return CycleOutcome::ReadFailed;
            }
        };

        record_bytes_read(bytes.len());
        self.buffer.push_bytes(&bytes);

        let mut frames = 0;
        while let Some(frame) = self.buffer.next_frame() {
            frames += 1;
            record_frame_extracted();
            debug!(target: "bridge.ingest", frame = %frame.as_str(), "frame_extracted");
            if let Err(err) = handler.handle(frame).await {
                warn!(target: "bridge.ingest", error = %err, "frame_handler_failed");
            }
        }

        CycleOutcome::Processed {
            bytes: bytes.len(),
            frames,
        }
    }
}
