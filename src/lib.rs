//! ENTTEC DMX USB PRO driver
//!
//! Buffers a 512 channel DMX universe from any thread and streams it to the
//! interface at a fixed frame rate from one background thread.

pub mod common;
pub mod driver;

pub use common::error::DriverError;
pub use common::setting::{DmxSettings, Settings};
pub use driver::dmx::codec::{encode_frame, DmxProCodec};
pub use driver::dmx::dmx_pro::{DmxPro, DmxProConfig};
pub use driver::dmx::entity::{ChannelBuffer, DriverState, Rgb8, SerialDeviceInfo};
pub use driver::dmx::stats::SendStatsSnapshot;
pub use driver::dmx::traits::{DeviceEnumerator, DmxTransport, SerialConnector};
pub use driver::serial::dummy::{DummySerialConnector, WrittenFrame};
pub use driver::serial::serial_port::SerialPortConnector;
