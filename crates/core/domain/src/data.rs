use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// 接收时间戳在请求体中的字段名。
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// 端口发现产出的串口描述。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// 设备路径（如 `/dev/ttyUSB0`、`COM3`）
    pub path: String,
    /// 人类可读的设备描述（USB product 字符串等）
    pub description: String,
}

impl PortDescriptor {
    pub fn new(path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
        }
    }
}

/// 从字节流中识别出的一段完整顶层 JSON 对象文本。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame(String);

impl RawFrame {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// 规范化后的传感器读数。
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub fields: Map<String, Value>,
    /// 桥接进程自身时钟记录的接收时间
    pub received_at: Option<DateTime<Utc>>,
}

impl SensorReading {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            received_at: None,
        }
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// 生成接入端点的 JSON 请求体。
    ///
    /// 带接收时间时写入 `timestamp`（RFC 3339，毫秒精度，UTC），
    /// 覆盖设备自带的同名字段。
    pub fn to_body(&self) -> Value {
        let mut body = self.fields.clone();
        if let Some(received_at) = self.received_at {
            body.insert(
                TIMESTAMP_FIELD.to_string(),
                Value::String(received_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        Value::Object(body)
    }
}
