use super::prelude::*;

/// packed 8 bit color, written to three consecutive channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<(u8, u8, u8)> for Rgb8 {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self { r, g, b }
    }
}

impl From<[u8; 3]> for Rgb8 {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

/// Buffer to simplify building up data for DMX transmission.
///
/// Always holds exactly 512 channels, indexed from 0. Hardware note: some
/// DMX USB PRO units have been seen ignoring the last four channels
/// (508..=511); they are still encoded and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBuffer {
    data: [DmxValue; DMX_CHANNEL_LEN],
}

impl Default for ChannelBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelBuffer {
    pub fn new() -> Self {
        Self {
            data: [0; DMX_CHANNEL_LEN],
        }
    }

    /// Set an individual channel value.
    ///
    /// # Panics
    /// If `channel >= 512`.
    pub fn set_value(&mut self, value: DmxValue, channel: DmxChannel) {
        assert!(
            channel < DMX_CHANNEL_LEN,
            "dmx channel {} out of range, max {}",
            channel,
            DMX_CHANNEL_LEN - 1
        );
        self.data[channel] = value;
    }

    /// Set a color value across three channels starting at `channel`.
    ///
    /// # Panics
    /// If `channel + 2 >= 512`. Nothing is written in that case.
    pub fn set_color(&mut self, color: impl Into<Rgb8>, channel: DmxChannel) {
        assert!(
            channel < DMX_CHANNEL_LEN - 2,
            "dmx color at channel {} does not fit, max {}",
            channel,
            DMX_CHANNEL_LEN - 3
        );
        let color = color.into();
        self.data[channel..channel + 3].copy_from_slice(&[color.r, color.g, color.b]);
    }

    pub fn get(&self, channel: DmxChannel) -> Option<DmxValue> {
        self.data.get(channel).copied()
    }

    pub fn fill(&mut self, value: DmxValue) {
        self.data.fill(value);
    }

    pub fn clear(&mut self) {
        self.fill(0);
    }

    pub fn data(&self) -> &[DmxValue; DMX_CHANNEL_LEN] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl AsRef<[u8]> for ChannelBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// 驱动生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Connecting,
    Running,
    Stopped,
}

/// one entry of the serial device list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialDeviceInfo {
    pub display_name: String,
    pub path: String,
}
