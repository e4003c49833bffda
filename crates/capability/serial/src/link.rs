//! 串口链路抽象与 tokio-serial 实现

use crate::error::SerialError;
use async_trait::async_trait;
use domain::PortDescriptor;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

/// 一条已打开的串口连接。
///
/// 链路在 drop 时关闭，持有者即唯一使用者。
#[async_trait]
pub trait SerialLink: Send {
    /// 设备路径
    fn port_name(&self) -> &str;

    /// 当前输入缓冲区中可立即读取的字节数
    fn bytes_available(&self) -> Result<usize, SerialError>;

    /// 最多读取 `max` 字节；读超时内无数据时返回空
    async fn read_some(&mut self, max: usize) -> Result<Vec<u8>, SerialError>;

    /// 写入全部字节并刷新
    async fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError>;
}

/// 串口打开器
#[async_trait]
pub trait PortOpener: Send + Sync {
    async fn open(
        &self,
        port: &PortDescriptor,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, SerialError>;
}

/// 基于 tokio-serial 的串口链路
pub struct TokioSerialLink {
    port_name: String,
    stream: SerialStream,
    read_timeout: Duration,
}

impl TokioSerialLink {
    pub fn new(
        port_name: impl Into<String>,
        stream: SerialStream,
        read_timeout: Duration,
    ) -> Self {
        Self {
            port_name: port_name.into(),
            stream,
            read_timeout,
        }
    }
}

#[async_trait]
impl SerialLink for TokioSerialLink {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn bytes_available(&self) -> Result<usize, SerialError> {
        use tokio_serial::SerialPort as _;
        let count = self.stream.bytes_to_read()?;
        Ok(count as usize)
    }

    async fn read_some(&mut self, max: usize) -> Result<Vec<u8>, SerialError> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; max];
        match tokio::time::timeout(self.read_timeout, self.stream.read(&mut buf)).await {
            Ok(Ok(0)) => Err(SerialError::Closed),
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(buf)
            }
            Ok(Err(err)) => Err(SerialError::Io(err)),
            Err(_) => Ok(Vec::new()),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// 使用 tokio-serial 打开本机串口
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSerialOpener;

#[async_trait]
impl PortOpener for TokioSerialOpener {
    async fn open(
        &self,
        port: &PortDescriptor,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, SerialError> {
        let stream = tokio_serial::new(port.path.as_str(), baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(read_timeout)
            .open_native_async()?;
        debug!(target: "bridge.serial", port = %port.path, baud_rate, "serial_port_opened");
        Ok(Box::new(TokioSerialLink::new(
            port.path.clone(),
            stream,
            read_timeout,
        )))
    }
}
