use crate::common::error::DriverError;
use super::entity::SerialDeviceInfo;

/// an open link to a dmx usb pro interface
pub trait DmxTransport: Send {
    /// write one complete frame
    fn write(&mut self, data: &[u8]) -> Result<(), DriverError>;

    fn is_open(&self) -> bool;

    /// release the port, later writes fail
    fn close(&mut self);
}

/// opens transports by device identifier
pub trait SerialConnector: Send + Sync {
    fn open(&self, device: &str, baud_rate: u32) -> Result<Box<dyn DmxTransport>, DriverError>;
}

/// lists serial devices available on this machine
pub trait DeviceEnumerator {
    fn list_available_devices(&self) -> Result<Vec<SerialDeviceInfo>, DriverError>;
}
