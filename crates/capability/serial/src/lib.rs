//! # 串口能力模块
//!
//! 负责找到并保持与传感器串口设备的连接：
//! - **端口发现**：枚举主机串口，按描述子串筛选
//! - **身份校验**：短连接发送 `+++` 进入命令模式，确认应答包含 `OK`
//! - **连接管理**：发现 → 校验 → 打开持久连接，有限次重试
//!
//! ## 架构设计
//!
//! ```text
//! PortDiscovery ──► select_port(description)
//!                        │
//!                        ▼
//!                IdentityVerifier (短连接，作用域内释放)
//!                        │
//!                        ▼
//!                   PortOpener ──► ConnectionState::Connected(SerialLink)
//! ```
//!
//! 所有与硬件和时间相关的环节都通过 trait 注入，便于测试中替换。

mod discovery;
mod error;
mod link;
mod manager;
mod timer;
mod types;
mod verify;

pub use discovery::{
    PortDiscovery, SystemPortDiscovery, describe_port_type, describe_usb, select_port,
};
pub use error::{ConnectError, SerialError};
pub use link::{PortOpener, SerialLink, TokioSerialLink, TokioSerialOpener};
pub use manager::{ConnectionManager, ConnectionState};
pub use timer::{Sleeper, TokioSleeper};
pub use types::*;
pub use verify::{HandshakeVerifier, IdentityVerifier};
