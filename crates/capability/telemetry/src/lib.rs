//! 日志初始化、连接会话 ID 与基础计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub bytes_read: u64,
    pub frames_extracted: u64,
    pub parse_failures: u64,
    pub readings_forwarded: u64,
    pub forward_failures: u64,
    pub connect_attempts: u64,
    pub connections_established: u64,
    pub read_errors: u64,
}

/// 进程级计数指标。
pub struct TelemetryMetrics {
    bytes_read: AtomicU64,
    frames_extracted: AtomicU64,
    parse_failures: AtomicU64,
    readings_forwarded: AtomicU64,
    forward_failures: AtomicU64,
    connect_attempts: AtomicU64,
    connections_established: AtomicU64,
    read_errors: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            bytes_read: AtomicU64::new(0),
            frames_extracted: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            readings_forwarded: AtomicU64::new(0),
            forward_failures: AtomicU64::new(0),
            connect_attempts: AtomicU64::new(0),
            connections_established: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            frames_extracted: self.frames_extracted.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            readings_forwarded: self.readings_forwarded.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 未设置 RUST_LOG 时的默认过滤级别。
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "warn" }
}

/// 初始化 tracing。
///
/// `verbose` 来自 `BRIDGE_DEBUG` / `BRIDGE_VERBOSE` 开关；显式设置的 `RUST_LOG` 优先。
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 为新建立的串口连接生成 session_id。
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录读取的串口字节数。
pub fn record_bytes_read(count: usize) {
    metrics()
        .bytes_read
        .fetch_add(count as u64, Ordering::Relaxed);
}

/// 记录提取出的完整帧数。
pub fn record_frame_extracted() {
    metrics().frames_extracted.fetch_add(1, Ordering::Relaxed);
}

/// 记录帧解析失败次数。
pub fn record_parse_failure() {
    metrics().parse_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录转发成功次数。
pub fn record_reading_forwarded() {
    metrics().readings_forwarded.fetch_add(1, Ordering::Relaxed);
}

/// 记录转发失败次数（含非 200 应答、传输错误、队列满）。
pub fn record_forward_failure() {
    metrics().forward_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录连接尝试次数。
pub fn record_connect_attempt() {
    metrics().connect_attempts.fetch_add(1, Ordering::Relaxed);
}

/// 记录成功建立的连接次数。
pub fn record_connection_established() {
    metrics()
        .connections_established
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录已建立连接上的读错误次数。
pub fn record_read_error() {
    metrics().read_errors.fetch_add(1, Ordering::Relaxed);
}
