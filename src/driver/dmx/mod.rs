pub mod prelude;
pub mod entity;
pub mod codec;
pub mod traits;
pub mod stats;
pub mod dmx_thread;
pub mod dmx_pro;
