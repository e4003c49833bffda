//! 桥接子系统共享的领域模型。

pub mod data;

pub use data::{PortDescriptor, RawFrame, SensorReading, TIMESTAMP_FIELD};
