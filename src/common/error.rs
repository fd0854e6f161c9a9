use thiserror::Error;

/// 设备驱动错误
#[derive(Error, Debug)]
pub enum DriverError {
    /// serial port could not be opened
    #[error("cannot open dmx device, device: {device}, reason: {reason}")]
    ConnectionFailed { device: String, reason: String },

    /// a single frame failed to reach the device
    #[error("cannot write frame to dmx device: {0}")]
    WriteFailed(String),

    /// channel number outside 1..=512
    #[error("dmx channel out of range: {0}")]
    InvalidChannel(usize),

    #[error("dmx device name is empty")]
    InvalidDeviceName,

    #[error("dmx driver already initialized")]
    AlreadyInitialized,

    #[error("dmx driver already stopped")]
    AlreadyStopped,

    #[error("cannot start dmx worker thread: {0}")]
    ThreadSpawn(String),

    #[error("cannot list serial devices: {0}")]
    Enumeration(String),

    /// 锁被毒化（线程 panic）
    #[error("poisoned lock (thread panic)")]
    PoisonedLock,

    #[error("config error: {0}")]
    Config(String),
}
