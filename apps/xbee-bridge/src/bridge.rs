//! 桥接链路装配模块
//!
//! 将串口连接管理、读循环、规范化与转发组装为一条完整链路：
//! 串口字节 → RawFrame → SensorReading → HTTP 接入端点。
//! 任何单帧的解析或转发失败都只记录日志，不影响读循环。

use async_trait::async_trait;
use bridge_config::{BridgeConfig, DeliveryMode};
use bridge_forward::{ForwardError, HttpForwarder, QueuedForwarder, ReadingForwarder};
use bridge_ingest::{FrameHandler, IngestError, ReadLoopSettings, SerialSource};
use bridge_normalize::Normalizer;
use bridge_serial::{
    ConnectionManager, HANDSHAKE_ACK, HANDSHAKE_COMMAND, HandshakeSettings, HandshakeVerifier,
    LinkSettings, PortOpener, RetryPolicy, Sleeper, SystemPortDiscovery, TokioSerialOpener,
    TokioSleeper,
};
use bridge_telemetry::record_parse_failure;
use domain::RawFrame;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 帧处理器
///
/// 实现 `FrameHandler`：解码并规范化每一帧，再交给转发器。
pub struct ForwardingHandler {
    /// 规范化器，将 JSON 对象规整为 SensorReading
    normalizer: Normalizer,
    /// 转发器（同步 HTTP 或队列投递）
    forwarder: Arc<dyn ReadingForwarder>,
}

impl ForwardingHandler {
    pub fn new(normalizer: Normalizer, forwarder: Arc<dyn ReadingForwarder>) -> Self {
        Self {
            normalizer,
            forwarder,
        }
    }
}

#[async_trait]
impl FrameHandler for ForwardingHandler {
    async fn handle(&self, frame: RawFrame) -> Result<(), IngestError> {
        // 1. 解码 + 规范化：非法帧丢弃并记录，继续处理后续帧
        let reading = match self.normalizer.normalize_frame(&frame) {
            Ok(reading) => reading,
            Err(err) => {
                record_parse_failure();
                warn!(
                    target: "bridge.ingest",
                    frame = %frame.as_str(),
                    error = %err,
                    "frame_parse_failed"
                );
                return Ok(());
            }
        };
        debug!(
            target: "bridge.ingest",
            fields = reading.fields.len(),
            received_at = ?reading.received_at,
            "reading_normalized"
        );

        // 2. 转发：失败只记录，读数丢弃，不重试
        if let Err(err) = self.forwarder.forward(reading).await {
            let backpressure = matches!(err, ForwardError::Backpressure(_));
            warn!(
                target: "bridge.forward",
                error = %err,
                backpressure,
                "forward_failed"
            );
        }
        Ok(())
    }
}

/// 装配完成的桥接链路
pub struct Bridge {
    /// 读循环（持有主连接与累积缓冲区）
    pub source: SerialSource,
    /// 帧处理器
    pub handler: Arc<ForwardingHandler>,
    /// 队列投递的后台任务，仅 queued 模式存在
    pub forward_worker: Option<JoinHandle<()>>,
}

/// 根据配置选择转发器
///
/// queued 模式在后台启动投递任务，需在 tokio 运行时内调用。
pub fn build_forwarder(
    config: &BridgeConfig,
) -> Result<(Arc<dyn ReadingForwarder>, Option<JoinHandle<()>>), ForwardError> {
    let http = Arc::new(HttpForwarder::new(
        &config.ingest_url,
        config.forward_timeout(),
    )?);
    match config.delivery {
        DeliveryMode::Sync => {
            info!(target: "bridge.forward", endpoint = %http.endpoint(), "forward_mode_sync");
            let forwarder: Arc<dyn ReadingForwarder> = http;
            Ok((forwarder, None))
        }
        DeliveryMode::Queued => {
            info!(
                target: "bridge.forward",
                endpoint = %http.endpoint(),
                capacity = config.queue_capacity,
                "forward_mode_queued"
            );
            let (queue, worker) = QueuedForwarder::spawn(http, config.queue_capacity);
            let forwarder: Arc<dyn ReadingForwarder> = Arc::new(queue);
            Ok((forwarder, Some(worker)))
        }
    }
}

/// 基于本机串口构建连接管理器
pub fn build_connection_manager(config: &BridgeConfig) -> ConnectionManager {
    let opener: Arc<dyn PortOpener> = Arc::new(TokioSerialOpener);
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
    let handshake = HandshakeSettings {
        baud_rate: config.baud_rate,
        response_timeout: config.handshake_timeout(),
        settle: config.handshake_settle(),
        byte_budget: config.handshake_byte_budget,
        command: HANDSHAKE_COMMAND.to_vec(),
        expected_ack: HANDSHAKE_ACK.to_string(),
    };
    let verifier = HandshakeVerifier::new(opener.clone(), sleeper.clone(), handshake);
    ConnectionManager::new(
        Arc::new(SystemPortDiscovery),
        Arc::new(verifier),
        opener,
        sleeper,
        LinkSettings {
            target_description: config.port_description.clone(),
            baud_rate: config.baud_rate,
            read_timeout: config.read_timeout(),
        },
    )
}

/// 读循环参数：未连接时每轮只尝试一次
pub fn read_loop_settings(config: &BridgeConfig) -> ReadLoopSettings {
    ReadLoopSettings {
        idle_interval: config.idle_interval(),
        reconnect: RetryPolicy::single(config.connect_delay()),
    }
}

/// 装配完整链路
pub fn build_bridge(config: &BridgeConfig) -> Result<Bridge, ForwardError> {
    let (forwarder, forward_worker) = build_forwarder(config)?;
    let handler = Arc::new(ForwardingHandler::new(Normalizer::default(), forwarder));
    let source = SerialSource::new(
        build_connection_manager(config),
        Arc::new(TokioSleeper),
        read_loop_settings(config),
    );
    Ok(Bridge {
        source,
        handler,
        forward_worker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_ingest::CycleOutcome;
    use bridge_serial::{IdentityVerifier, PortDiscovery, SerialError, SerialLink};
    use domain::{PortDescriptor, SensorReading};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 记录收到的读数；`fail` 为 true 时每次都返回非 200 错误。
    #[derive(Default)]
    struct RecordingForwarder {
        received: Mutex<Vec<SensorReading>>,
        fail: bool,
    }

    impl RecordingForwarder {
        fn failing() -> Self {
            Self {
                received: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn received(&self) -> Vec<SensorReading> {
            self.received.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl ReadingForwarder for RecordingForwarder {
        async fn forward(&self, reading: SensorReading) -> Result<(), ForwardError> {
            self.received.lock().expect("lock").push(reading);
            if self.fail {
                return Err(ForwardError::Status {
                    status: 503,
                    body: String::new(),
                });
            }
            Ok(())
        }
    }

    struct OnePort;

    impl PortDiscovery for OnePort {
        fn list_ports(&self) -> Vec<PortDescriptor> {
            vec![PortDescriptor::new("/dev/ttyUSB0", "FT231X USB UART")]
        }
    }

    struct Trusted;

    #[async_trait]
    impl IdentityVerifier for Trusted {
        async fn verify(&self, _port: &PortDescriptor) -> bool {
            true
        }
    }

    type Chunks = Arc<Mutex<VecDeque<Vec<u8>>>>;

    struct ChunkLink {
        chunks: Chunks,
    }

    #[async_trait]
    impl SerialLink for ChunkLink {
        fn port_name(&self) -> &str {
            "/dev/ttyUSB0"
        }

        fn bytes_available(&self) -> Result<usize, SerialError> {
            let chunks = self.chunks.lock().expect("lock");
            Ok(chunks.front().map_or(0, Vec::len))
        }

        async fn read_some(&mut self, _max: usize) -> Result<Vec<u8>, SerialError> {
            Ok(self.chunks.lock().expect("lock").pop_front().unwrap_or_default())
        }

        async fn write_all(&mut self, _data: &[u8]) -> Result<(), SerialError> {
            Ok(())
        }
    }

    struct ChunkOpener {
        chunks: Chunks,
    }

    #[async_trait]
    impl PortOpener for ChunkOpener {
        async fn open(
            &self,
            _port: &PortDescriptor,
            _baud_rate: u32,
            _read_timeout: Duration,
        ) -> Result<Box<dyn SerialLink>, SerialError> {
            Ok(Box::new(ChunkLink {
                chunks: self.chunks.clone(),
            }))
        }
    }

    struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn fake_source(chunks: Chunks) -> SerialSource {
        let manager = ConnectionManager::new(
            Arc::new(OnePort),
            Arc::new(Trusted),
            Arc::new(ChunkOpener { chunks }),
            Arc::new(NoSleep),
            LinkSettings {
                target_description: "FT231X".to_string(),
                baud_rate: 9600,
                read_timeout: Duration::from_millis(10),
            },
        );
        SerialSource::new(
            manager,
            Arc::new(NoSleep),
            ReadLoopSettings {
                idle_interval: Duration::ZERO,
                reconnect: RetryPolicy::single(Duration::ZERO),
            },
        )
    }

    #[tokio::test]
    async fn handler_forwards_normalized_reading() {
        let forwarder = Arc::new(RecordingForwarder::default());
        let handler = ForwardingHandler::new(Normalizer::default(), forwarder.clone());

        handler
            .handle(RawFrame::new(r#"{"lpg":"12.5","foo":"bar","millis":42}"#))
            .await
            .expect("handled");

        let received = forwarder.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].get("LPG"), Some(&json!(12.5)));
        assert_eq!(received[0].get("foo"), Some(&json!("bar")));
        assert!(received[0].received_at.is_some());
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped() {
        let forwarder = Arc::new(RecordingForwarder::default());
        let handler = ForwardingHandler::new(Normalizer::default(), forwarder.clone());

        handler
            .handle(RawFrame::new(r#"{"lpg":}"#))
            .await
            .expect("parse failure is not an error");

        assert!(forwarder.received().is_empty());
    }

    #[tokio::test]
    async fn forward_failure_is_not_an_error() {
        let forwarder = Arc::new(RecordingForwarder::failing());
        let handler = ForwardingHandler::new(Normalizer::default(), forwarder.clone());

        handler
            .handle(RawFrame::new(r#"{"co":1}"#))
            .await
            .expect("forward failure is swallowed");
        assert_eq!(forwarder.received().len(), 1);
    }

    #[tokio::test]
    async fn read_loop_continues_after_forward_failure() {
        let chunks: Chunks = Arc::new(Mutex::new(VecDeque::new()));
        let forwarder = Arc::new(RecordingForwarder::failing());
        let handler = ForwardingHandler::new(Normalizer::default(), forwarder.clone());
        let mut source = fake_source(chunks.clone());

        assert_eq!(source.cycle(&handler).await, CycleOutcome::Reconnected);

        chunks
            .lock()
            .expect("lock")
            .push_back(br#"{"co":1}"#.to_vec());
        assert_eq!(
            source.cycle(&handler).await,
            CycleOutcome::Processed { bytes: 8, frames: 1 }
        );

        chunks
            .lock()
            .expect("lock")
            .push_back(br#"{"co":2}{"co":"#.to_vec());
        assert_eq!(
            source.cycle(&handler).await,
            CycleOutcome::Processed { bytes: 14, frames: 1 }
        );

        assert!(source.manager().is_connected());
        let values: Vec<_> = forwarder
            .received()
            .iter()
            .map(|reading| reading.get("CO").cloned())
            .collect();
        assert_eq!(values, vec![Some(json!(1.0)), Some(json!(2.0))]);
        assert_eq!(source.buffer().as_str(), r#"{"co":"#);
    }

    #[test]
    fn invalid_endpoint_fails_assembly() {
        let config = BridgeConfig {
            ingest_url: "not a url".to_string(),
            ..BridgeConfig::default()
        };
        let err = build_forwarder(&config).err().expect("invalid endpoint");
        assert!(matches!(err, ForwardError::InvalidEndpoint(_)));
    }

    #[tokio::test]
    async fn queued_mode_starts_worker() {
        let config = BridgeConfig {
            delivery: DeliveryMode::Queued,
            ..BridgeConfig::default()
        };
        let (forwarder, worker) = build_forwarder(&config).expect("forwarder");
        let worker = worker.expect("queued worker");
        drop(forwarder);
        worker.await.expect("worker drains and exits");
    }

    #[test]
    fn read_loop_uses_single_reconnect_attempt() {
        let config = BridgeConfig::default();
        let settings = read_loop_settings(&config);
        assert_eq!(settings.reconnect.max_attempts, 1);
        assert_eq!(settings.idle_interval, Duration::from_millis(100));
    }
}
