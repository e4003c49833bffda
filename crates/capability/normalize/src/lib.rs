//! 帧解码与读数规范化。
//!
//! RawFrame 先解码为 JSON 对象，再由 [`Normalizer`] 规整字段名、
//! 把数值字段转换为浮点数，并在存在设备相对时间字段时附加接收时间。

use api_contract::{canonical_field, is_numeric_field, is_relative_time_field};
use chrono::{DateTime, Utc};
use domain::{RawFrame, SensorReading};
use serde_json::{Map, Number, Value};
use std::sync::Arc;

/// 规范化错误。
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// 接收时间来源。
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟。
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 将一帧文本解码为 JSON 对象；顶层不是对象时同样视为解析失败。
pub fn decode_frame(frame: &RawFrame) -> Result<Map<String, Value>, NormalizeError> {
    let value: Value = serde_json::from_str(frame.as_str())
        .map_err(|err| NormalizeError::InvalidPayload(err.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(NormalizeError::InvalidPayload(format!(
            "expected object, got {}",
            value_kind(&other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// JSON 对象 → SensorReading。
#[derive(Clone)]
pub struct Normalizer {
    clock: Arc<dyn Clock>,
}

impl Normalizer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// 规整一条读数，不会失败，也不会丢弃字段。
    ///
    /// 改名后若与已有键重名，后出现的值覆盖先出现的值，位置保持先出现者的位置。
    pub fn normalize(&self, payload: Map<String, Value>) -> SensorReading {
        let has_relative_time = payload.keys().any(|key| is_relative_time_field(key));

        let mut fields = Map::with_capacity(payload.len());
        for (key, value) in payload {
            let key = match canonical_field(&key) {
                Some(canonical) => canonical.to_string(),
                None => key,
            };
            let value = if is_numeric_field(&key) {
                coerce_f64(value)
            } else {
                value
            };
            fields.insert(key, value);
        }

        let reading = SensorReading::new(fields);
        if has_relative_time {
            reading.with_received_at(self.clock.now())
        } else {
            reading
        }
    }

    /// 解码并规整一帧。
    pub fn normalize_frame(&self, frame: &RawFrame) -> Result<SensorReading, NormalizeError> {
        decode_frame(frame).map(|payload| self.normalize(payload))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

/// 尝试转换为 f64；失败时原样返回。
fn coerce_f64(value: Value) -> Value {
    let parsed = match &value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed.and_then(Number::from_f64) {
        Some(number) => Value::Number(number),
        None => value,
    }
}
