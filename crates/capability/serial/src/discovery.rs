//! 端口发现

use domain::PortDescriptor;
use tokio_serial::SerialPortType;
use tracing::{debug, warn};

/// 端口发现：纯查询，没有端口时返回空列表
pub trait PortDiscovery: Send + Sync {
    fn list_ports(&self) -> Vec<PortDescriptor>;
}

/// 枚举本机串口
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortDiscovery;

impl PortDiscovery for SystemPortDiscovery {
    fn list_ports(&self) -> Vec<PortDescriptor> {
        let ports = match tokio_serial::available_ports() {
            Ok(ports) => ports,
            Err(err) => {
                warn!(target: "bridge.serial", error = %err, "port_enumeration_failed");
                return Vec::new();
            }
        };
        let ports: Vec<PortDescriptor> = ports
            .into_iter()
            .map(|info| {
                let description = describe_port_type(&info.port_type);
                PortDescriptor::new(info.port_name, description)
            })
            .collect();
        debug!(target: "bridge.serial", count = ports.len(), "ports_enumerated");
        ports
    }
}

/// 端口类型对应的可读描述
pub fn describe_port_type(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            describe_usb(usb.product.as_deref(), usb.manufacturer.as_deref())
        }
        SerialPortType::PciPort => "PCI serial port".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth serial port".to_string(),
        SerialPortType::Unknown => "n/a".to_string(),
    }
}

/// USB 端口描述：优先 product，其次 manufacturer
pub fn describe_usb(product: Option<&str>, manufacturer: Option<&str>) -> String {
    product
        .filter(|value| !value.is_empty())
        .or(manufacturer.filter(|value| !value.is_empty()))
        .unwrap_or("USB serial port")
        .to_string()
}

/// 选出第一个描述包含 `target` 的端口（区分大小写）
pub fn select_port<'a>(
    ports: &'a [PortDescriptor],
    target: &str,
) -> Option<&'a PortDescriptor> {
    ports.iter().find(|port| port.description.contains(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_description_prefers_product() {
        assert_eq!(
            describe_usb(Some("FT231X USB UART"), Some("FTDI")),
            "FT231X USB UART"
        );
        assert_eq!(describe_usb(None, Some("FTDI")), "FTDI");
        assert_eq!(describe_usb(Some(""), Some("FTDI")), "FTDI");
        assert_eq!(describe_usb(None, None), "USB serial port");
    }

    #[test]
    fn non_usb_descriptions() {
        assert_eq!(describe_port_type(&SerialPortType::PciPort), "PCI serial port");
        assert_eq!(describe_port_type(&SerialPortType::Unknown), "n/a");
    }

    #[test]
    fn select_first_matching_port() {
        let ports = vec![
            PortDescriptor::new("/dev/ttyS0", "n/a"),
            PortDescriptor::new("/dev/ttyUSB0", "FT231X USB UART"),
            PortDescriptor::new("/dev/ttyUSB1", "FT231X USB UART"),
        ];
        let port = select_port(&ports, "FT231X").expect("match");
        assert_eq!(port.path, "/dev/ttyUSB0");
        assert!(select_port(&ports, "ft231x").is_none());
        assert!(select_port(&[], "FT231X").is_none());
    }
}
