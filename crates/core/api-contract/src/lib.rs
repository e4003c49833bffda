//! 后端接入端点的稳定契约。

use serde::{Deserialize, Serialize};

/// 后端期望的规范字段名。
pub const CANONICAL_FIELDS: [&str; 15] = [
    "LPG",
    "CO",
    "Smoke",
    "CO_MQ7",
    "CH4",
    "CO_MQ9",
    "CO2",
    "NH3",
    "NOx",
    "Alcohol",
    "Benzene",
    "H2",
    "Air",
    "Temperature",
    "Humidity",
];

/// 后端按原名读取的颗粒物字段（透传，不参与改名）。
pub const PARTICULATE_FIELDS: [&str; 3] = ["dust_density", "pm2_5", "pm10"];

/// 设备上报的相对时间字段（开机后毫秒数等，大小写不敏感）。
pub const RELATIVE_TIME_FIELDS: [&str; 3] = ["millis", "uptime", "uptime_ms"];

/// 按大小写不敏感规则查找规范字段名。
pub fn canonical_field(key: &str) -> Option<&'static str> {
    CANONICAL_FIELDS
        .iter()
        .copied()
        .find(|canonical| canonical.eq_ignore_ascii_case(key))
}

/// 需要转换为浮点数的字段（规范字段 + 颗粒物字段）。
pub fn is_numeric_field(key: &str) -> bool {
    CANONICAL_FIELDS.contains(&key) || PARTICULATE_FIELDS.contains(&key)
}

/// 是否为设备相对时间字段。
pub fn is_relative_time_field(key: &str) -> bool {
    RELATIVE_TIME_FIELDS
        .iter()
        .any(|field| field.eq_ignore_ascii_case(key))
}

/// 接入端点的应答体（`{"status": "...", "message": "..."}`）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestAck {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl IngestAck {
    /// 尝试解析应答体；非 JSON 时返回 None。
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}
