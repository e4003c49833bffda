//! 设备身份校验（命令模式握手）

use crate::error::SerialError;
use crate::link::PortOpener;
use crate::timer::Sleeper;
use crate::types::HandshakeSettings;
use async_trait::async_trait;
use domain::PortDescriptor;
use std::sync::Arc;
use tracing::debug;

/// 身份校验器：确认端口上是目标设备。内部错误一律视为未通过
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, port: &PortDescriptor) -> bool;
}

/// `+++` / `OK` 握手校验器
///
/// 每次校验单独打开一条短连接，函数返回时连接随之释放，
/// 与读循环持有的主连接互不干扰。
pub struct HandshakeVerifier {
    opener: Arc<dyn PortOpener>,
    sleeper: Arc<dyn Sleeper>,
    settings: HandshakeSettings,
}

impl HandshakeVerifier {
    pub fn new(
        opener: Arc<dyn PortOpener>,
        sleeper: Arc<dyn Sleeper>,
        settings: HandshakeSettings,
    ) -> Self {
        Self {
            opener,
            sleeper,
            settings,
        }
    }

    pub fn settings(&self) -> &HandshakeSettings {
        &self.settings
    }

    async fn handshake(&self, port: &PortDescriptor) -> Result<bool, SerialError> {
        let mut link = self
            .opener
            .open(port, self.settings.baud_rate, self.settings.response_timeout)
            .await?;
        link.write_all(&self.settings.command).await?;
        self.sleeper.sleep(self.settings.settle).await;

        let budget = self.settings.byte_budget;
        let mut response = Vec::with_capacity(budget);
        while response.len() < budget {
            let chunk = link.read_some(budget - response.len()).await?;
            if chunk.is_empty() {
                break;
            }
            response.extend_from_slice(&chunk);
            if contains_ack(&response, &self.settings.expected_ack) {
                break;
            }
        }

        let verified = contains_ack(&response, &self.settings.expected_ack);
        debug!(
            target: "bridge.serial",
            port = %port.path,
            response = %String::from_utf8_lossy(&response),
            verified,
            "handshake_response"
        );
        Ok(verified)
    }
}

#[async_trait]
impl IdentityVerifier for HandshakeVerifier {
    async fn verify(&self, port: &PortDescriptor) -> bool {
        match self.handshake(port).await {
            Ok(verified) => verified,
            Err(err) => {
                debug!(
                    target: "bridge.serial",
                    port = %port.path,
                    error = %err,
                    "handshake_failed"
                );
                false
            }
        }
    }
}

fn contains_ack(response: &[u8], ack: &str) -> bool {
    String::from_utf8_lossy(response).contains(ack)
}
