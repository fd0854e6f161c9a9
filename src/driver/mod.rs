pub mod dmx;
pub mod serial;
