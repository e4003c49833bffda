//! 连接管理：发现 → 校验 → 打开持久连接

use crate::discovery::{PortDiscovery, select_port};
use crate::error::ConnectError;
use crate::link::{PortOpener, SerialLink};
use crate::timer::Sleeper;
use crate::types::{LinkSettings, RetryPolicy};
use crate::verify::IdentityVerifier;
use bridge_telemetry::{new_session_id, record_connect_attempt, record_connection_established};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// 主连接状态。`Connected` 中的链路始终是可用的打开句柄
pub enum ConnectionState {
    Disconnected,
    Connected(Box<dyn SerialLink>),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("Disconnected"),
            Self::Connected(link) => f
                .debug_tuple("Connected")
                .field(&link.port_name())
                .finish(),
        }
    }
}

/// 连接管理器，持有主连接及其状态
pub struct ConnectionManager {
    discovery: Arc<dyn PortDiscovery>,
    verifier: Arc<dyn IdentityVerifier>,
    opener: Arc<dyn PortOpener>,
    sleeper: Arc<dyn Sleeper>,
    settings: LinkSettings,
    state: ConnectionState,
    session_id: Option<String>,
}

impl ConnectionManager {
    pub fn new(
        discovery: Arc<dyn PortDiscovery>,
        verifier: Arc<dyn IdentityVerifier>,
        opener: Arc<dyn PortOpener>,
        sleeper: Arc<dyn Sleeper>,
        settings: LinkSettings,
    ) -> Self {
        Self {
            discovery,
            verifier,
            opener,
            sleeper,
            settings,
            state: ConnectionState::Disconnected,
            session_id: None,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// 当前连接的 session_id（未连接时为 None）
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// 主连接链路（未连接时为 None）
    pub fn link_mut(&mut self) -> Option<&mut (dyn SerialLink + 'static)> {
        match &mut self.state {
            ConnectionState::Connected(link) => Some(link.as_mut()),
            ConnectionState::Disconnected => None,
        }
    }

    /// 建立主连接，最多尝试 `policy.max_attempts` 次，两次尝试之间等待 `policy.delay`。
    ///
    /// 已连接时直接返回 true；全部失败时返回 false，状态保持 `Disconnected`。
    pub async fn connect(&mut self, policy: &RetryPolicy) -> bool {
        if self.is_connected() {
            return true;
        }

        for attempt in 1..=policy.max_attempts {
            record_connect_attempt();
            let result = connect_once(
                self.discovery.as_ref(),
                self.verifier.as_ref(),
                self.opener.as_ref(),
                &self.settings,
            )
            .await;
            match result {
                Ok(link) => {
                    let session_id = new_session_id();
                    info!(
                        target: "bridge.serial",
                        session_id = %session_id,
                        port = %link.port_name(),
                        attempt,
                        "serial_connected"
                    );
                    record_connection_established();
                    self.state = ConnectionState::Connected(link);
                    self.session_id = Some(session_id);
                    return true;
                }
                Err(err) => {
                    warn!(
                        target: "bridge.serial",
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        "serial_connect_failed"
                    );
                }
            }
            if attempt < policy.max_attempts {
                self.sleeper.sleep(policy.delay).await;
            }
        }
        false
    }

    /// 关闭主连接（drop 链路）并回到 `Disconnected`
    pub fn disconnect(&mut self) {
        if let ConnectionState::Connected(link) =
            std::mem::replace(&mut self.state, ConnectionState::Disconnected)
        {
            info!(
                target: "bridge.serial",
                session_id = ?self.session_id,
                port = %link.port_name(),
                "serial_disconnected"
            );
        }
        self.session_id = None;
    }
}

/// 单次连接尝试：发现 → 选端口 → 校验 → 打开。
///
/// 主连接句柄只要求 `Send`，这里只借用各协作者，不借用整个管理器。
async fn connect_once(
    discovery: &dyn PortDiscovery,
    verifier: &dyn IdentityVerifier,
    opener: &dyn PortOpener,
    settings: &LinkSettings,
) -> Result<Box<dyn SerialLink>, ConnectError> {
    let ports = discovery.list_ports();
    let port = select_port(&ports, &settings.target_description)
        .ok_or_else(|| ConnectError::Discovery(settings.target_description.clone()))?;

    if !verifier.verify(port).await {
        return Err(ConnectError::Verification(port.path.clone()));
    }

    opener
        .open(port, settings.baud_rate, settings.read_timeout)
        .await
        .map_err(|source| ConnectError::Connection {
            port: port.path.clone(),
            source,
        })
}
