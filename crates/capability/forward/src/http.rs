use crate::{ForwardError, ReadingForwarder};
use api_contract::IngestAck;
use async_trait::async_trait;
use bridge_telemetry::{record_forward_failure, record_reading_forwarded};
use domain::SensorReading;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::debug;

/// 向固定端点 POST JSON 读数，仅 HTTP 200 视为成功，不重试。
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpForwarder {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ForwardError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| ForwardError::InvalidEndpoint(format!("{endpoint}: {err}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ForwardError::InvalidEndpoint(format!(
                "unsupported scheme: {}",
                endpoint.scheme()
            )));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, reading: &SensorReading) -> Result<(), ForwardError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&reading.to_body())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status != StatusCode::OK {
            return Err(ForwardError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let ack = IngestAck::parse(&body).unwrap_or_default();
        debug!(
            target: "bridge.forward",
            ack_status = %ack.status,
            ack_message = %ack.message,
            acknowledged = ack.is_success(),
            "reading_forwarded"
        );
        Ok(())
    }
}

#[async_trait]
impl ReadingForwarder for HttpForwarder {
    async fn forward(&self, reading: SensorReading) -> Result<(), ForwardError> {
        let result = self.post(&reading).await;
        match &result {
            Ok(()) => record_reading_forwarded(),
            Err(_) => record_forward_failure(),
        }
        result
    }
}
