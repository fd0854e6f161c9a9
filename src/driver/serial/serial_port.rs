//! real serial transport for the dmx usb pro
//! the usb link ignores the baud rate, it is set only because the port api requires one

use std::io::Write;
use std::time::Duration;

use tokio_serial::{SerialPort, SerialPortType};

use crate::common::error::DriverError;
use crate::driver::dmx::entity::SerialDeviceInfo;
use crate::driver::dmx::traits::{DeviceEnumerator, DmxTransport, SerialConnector};
use crate::{debug, info};

const LOG_TAG: &str = "serial_port.rs | dmx serial transport";
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

pub struct SerialPortTransport {
    device: String,
    port: Option<Box<dyn SerialPort>>,
}

impl DmxTransport for SerialPortTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), DriverError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| DriverError::WriteFailed(format!("port closed, device: {}", self.device)))?;
        port.write_all(data)
            .and_then(|_| port.flush())
            .map_err(|e| DriverError::WriteFailed(format!("device: {}, err: {}", self.device, e)))
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!(LOG_TAG, "serial port closed, device: {}", self.device);
        }
    }
}

/// opens and lists ports through tokio-serial
#[derive(Debug, Clone)]
pub struct SerialPortConnector {
    write_timeout: Duration,
}

impl Default for SerialPortConnector {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_TIMEOUT)
    }
}

impl SerialPortConnector {
    pub fn new(write_timeout: Duration) -> Self {
        Self { write_timeout }
    }
}

impl SerialConnector for SerialPortConnector {
    fn open(&self, device: &str, baud_rate: u32) -> Result<Box<dyn DmxTransport>, DriverError> {
        let port = tokio_serial::new(device, baud_rate)
            .timeout(self.write_timeout)
            .open()
            .map_err(|e| DriverError::ConnectionFailed {
                device: device.to_string(),
                reason: e.to_string(),
            })?;
        info!(LOG_TAG, "serial port opened, device: {}, baud rate: {}", device, baud_rate);
        Ok(Box::new(SerialPortTransport {
            device: device.to_string(),
            port: Some(port),
        }))
    }
}

impl DeviceEnumerator for SerialPortConnector {
    fn list_available_devices(&self) -> Result<Vec<SerialDeviceInfo>, DriverError> {
        let ports = tokio_serial::available_ports().map_err(|e| DriverError::Enumeration(e.to_string()))?;
        debug!(LOG_TAG, "found {} serial ports", ports.len());

        Ok(ports
            .into_iter()
            .map(|p| {
                let display_name = match &p.port_type {
                    SerialPortType::UsbPort(usb) => match &usb.product {
                        Some(product) => format!("{} ({})", product, p.port_name),
                        None => p.port_name.clone(),
                    },
                    _ => p.port_name.clone(),
                };
                SerialDeviceInfo {
                    display_name,
                    path: p.port_name,
                }
            })
            .collect())
    }
}
