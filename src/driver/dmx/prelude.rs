//! enttec dmx usb pro 协议常量
//! device api: https://www.enttec.com/docs/dmx_usb_pro_api_spec.pdf

// dmx channel type
pub type DmxValue = u8;
// dmx channel index type, 0-based inside buffers
pub type DmxChannel = usize;

// dmx channel length
pub const DMX_CHANNEL_LEN: usize = 512;

// start of message delimiter
pub const DMXPRO_START_MSG: u8 = 0x7E;
// end of message delimiter
pub const DMXPRO_END_MSG: u8 = 0xE7;
// output only send dmx packet request
pub const DMXPRO_SEND_LABEL: u8 = 6;
// dmx start code, first payload byte
pub const DMX_START_CODE: u8 = 0x00;
// virtual com does not drive the usb link, nominal value only
pub const DMXPRO_BAUD_RATE: u32 = 57600;
pub const DMXPRO_FRAME_RATE: u32 = 35;
// start code + 512 channels
pub const DMXPRO_DATA_SIZE: usize = DMX_CHANNEL_LEN + 1;
// 4 header bytes + data + end delimiter
pub const DMXPRO_PACKET_SIZE: usize = DMXPRO_DATA_SIZE + 5;
