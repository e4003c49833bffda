#![allow(dead_code)]

use async_trait::async_trait;
use bridge_serial::{
    IdentityVerifier, PortDiscovery, PortOpener, SerialError, SerialLink, Sleeper,
};
use domain::PortDescriptor;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn xbee_port() -> PortDescriptor {
    PortDescriptor::new("/dev/ttyUSB0", "FT231X USB UART")
}

pub struct StaticDiscovery {
    pub ports: Vec<PortDescriptor>,
    pub calls: AtomicUsize,
}

impl StaticDiscovery {
    pub fn new(ports: Vec<PortDescriptor>) -> Self {
        Self {
            ports,
            calls: AtomicUsize::new(0),
        }
    }
}

impl PortDiscovery for StaticDiscovery {
    fn list_ports(&self) -> Vec<PortDescriptor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ports.clone()
    }
}

/// 按脚本依次返回校验结果，脚本用尽后返回 false。
pub struct ScriptedVerifier {
    results: Mutex<VecDeque<bool>>,
    pub calls: AtomicUsize,
}

impl ScriptedVerifier {
    pub fn new(results: &[bool]) -> Self {
        Self {
            results: Mutex::new(results.iter().copied().collect()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentityVerifier for ScriptedVerifier {
    async fn verify(&self, _port: &PortDescriptor) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results.lock().unwrap().pop_front().unwrap_or(false)
    }
}

/// 记录等待时长但不真正等待。
#[derive(Default)]
pub struct RecordingSleeper {
    pub calls: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn durations(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap().push(duration);
    }
}

/// 脚本化的链路：`reads` 依次作为 read_some 的结果，用尽后返回空（读超时）。
pub struct MockLink {
    name: String,
    reads: VecDeque<Result<Vec<u8>, SerialError>>,
    pub written: Arc<Mutex<Vec<u8>>>,
    pub requested: Arc<Mutex<Vec<usize>>>,
    open_handles: Arc<AtomicUsize>,
}

#[async_trait]
impl SerialLink for MockLink {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn bytes_available(&self) -> Result<usize, SerialError> {
        Ok(self
            .reads
            .front()
            .and_then(|read| read.as_ref().ok())
            .map(|bytes| bytes.len())
            .unwrap_or(0))
    }

    async fn read_some(&mut self, max: usize) -> Result<Vec<u8>, SerialError> {
        self.requested.lock().unwrap().push(max);
        match self.reads.pop_front() {
            Some(Ok(mut bytes)) => {
                if bytes.len() > max {
                    let rest = bytes.split_off(max);
                    self.reads.push_front(Ok(rest));
                }
                Ok(bytes)
            }
            Some(Err(err)) => Err(err),
            None => Ok(Vec::new()),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError> {
        self.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 每次 open 按脚本生成一条 MockLink，并统计仍未释放的句柄数。
pub struct ScriptedOpener {
    scripts: Mutex<VecDeque<Result<Vec<Result<Vec<u8>, SerialError>>, SerialError>>>,
    pub open_handles: Arc<AtomicUsize>,
    pub opens: AtomicUsize,
    pub written: Arc<Mutex<Vec<u8>>>,
    pub requested: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedOpener {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            open_handles: Arc::new(AtomicUsize::new(0)),
            opens: AtomicUsize::new(0),
            written: Arc::new(Mutex::new(Vec::new())),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 下一次 open 成功，链路按 `reads` 返回数据。
    pub fn push_link(&self, reads: Vec<Result<Vec<u8>, SerialError>>) {
        self.scripts.lock().unwrap().push_back(Ok(reads));
    }

    /// 下一次 open 失败。
    pub fn push_failure(&self, err: SerialError) {
        self.scripts.lock().unwrap().push_back(Err(err));
    }

    pub fn live_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortOpener for ScriptedOpener {
    async fn open(
        &self,
        port: &PortDescriptor,
        _baud_rate: u32,
        _read_timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, SerialError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()));
        let reads = script?;
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockLink {
            name: port.path.clone(),
            reads: reads.into_iter().collect(),
            written: self.written.clone(),
            requested: self.requested.clone(),
            open_handles: self.open_handles.clone(),
        }))
    }
}
