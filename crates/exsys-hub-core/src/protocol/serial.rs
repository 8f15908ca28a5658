//! Serial port handling
//!
//! Port discovery and opening the hub's management port (8N1, no flow control).

use serde::Serialize;
use serialport::{SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::ProtocolError;

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,

    /// Serial number (if available)
    pub serial_number: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb_info) => Self {
                name: info.port_name,
                vid: Some(usb_info.vid),
                pid: Some(usb_info.pid),
                manufacturer: usb_info.manufacturer,
                product: usb_info.product,
                serial_number: usb_info.serial_number,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// USB serial device families, in the order hubs usually show up
const USB_TTY_PREFIXES: [&str; 2] = ["ttyACM", "ttyUSB"];

/// Ordering for discovered ports.
///
/// CDC-ACM devices come before USB-serial adapters, each numbered
/// numerically so ttyUSB10 follows ttyUSB9. Anything else sorts by name last.
fn port_sort_key(name: &str) -> (usize, usize, String) {
    let device = name.rsplit('/').next().unwrap_or(name);
    USB_TTY_PREFIXES
        .iter()
        .enumerate()
        .find_map(|(rank, prefix)| {
            let unit = device.strip_prefix(prefix)?.parse().unwrap_or(usize::MAX);
            Some((rank, unit, device.to_string()))
        })
        .unwrap_or((USB_TTY_PREFIXES.len(), 0, device.to_string()))
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    match serialport::available_ports() {
        Ok(ports) => {
            for info in ports {
                let p = PortInfo::from(info);
                map.entry(p.name.clone()).or_insert(p);
            }
        }
        Err(e) => tracing::warn!("Serial port enumeration failed: {}", e),
    }

    // Linux-only: USB adapters that the enumeration API missed
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if USB_TTY_PREFIXES.iter().any(|prefix| fname.starts_with(prefix)) {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    sort_ports(map.into_values().collect())
}

fn sort_ports(mut ports: Vec<PortInfo>) -> Vec<PortInfo> {
    ports.sort_by_key(|p| port_sort_key(&p.name));
    ports
}

/// Open the hub's management port, 8N1 without flow control
pub fn open_port(
    name: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<SerialStream, ProtocolError> {
    tokio_serial::new(name, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(timeout)
        .open_native_async()
        .map_err(|e| ProtocolError::Open {
            port: name.to_string(),
            reason: e.to_string(),
        })
}
