//! in-memory transport used by dummy mode
//! frames are kept in memory with the time they were written, no port is touched

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::common::error::DriverError;
use crate::driver::dmx::entity::SerialDeviceInfo;
use crate::driver::dmx::traits::{DeviceEnumerator, DmxTransport, SerialConnector};
use crate::{info, trace};

const LOG_TAG: &str = "dummy.rs | dummy dmx transport";

#[derive(Debug, Clone)]
pub struct WrittenFrame {
    pub at: Instant,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct DummyShared {
    frames: Mutex<Vec<WrittenFrame>>,
    fail_open: AtomicBool,
    fail_write: AtomicBool,
    open_count: AtomicUsize,
    open_delay_ms: AtomicU64,
    write_delay_ms: AtomicU64,
    devices: Mutex<Vec<SerialDeviceInfo>>,
}

/// connector handing out dummy transports that share one frame log
#[derive(Debug, Clone, Default)]
pub struct DummySerialConnector {
    shared: Arc<DummyShared>,
}

impl DummySerialConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<SerialDeviceInfo>) -> Self {
        let connector = Self::default();
        if let Ok(mut list) = connector.shared.devices.lock() {
            *list = devices;
        }
        connector
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.shared.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_write(&self, fail: bool) {
        self.shared.fail_write.store(fail, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.shared.open_count.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> Vec<WrittenFrame> {
        self.shared
            .frames
            .lock()
            .map(|frames| frames.clone())
            .unwrap_or_default()
    }

    pub fn frame_count(&self) -> usize {
        self.shared.frames.lock().map(|frames| frames.len()).unwrap_or(0)
    }

    /// every later `open` sleeps this long before returning
    pub fn set_open_delay(&self, delay: Duration) {
        self.shared.open_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// every later `write` sleeps this long, like a stalled usb link
    pub fn set_write_delay(&self, delay: Duration) {
        self.shared.write_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

impl SerialConnector for DummySerialConnector {
    fn open(&self, device: &str, baud_rate: u32) -> Result<Box<dyn DmxTransport>, DriverError> {
        sleep_ms(&self.shared.open_delay_ms);
        if self.shared.fail_open.load(Ordering::SeqCst) {
            return Err(DriverError::ConnectionFailed {
                device: device.to_string(),
                reason: "dummy open failure".to_string(),
            });
        }
        self.shared.open_count.fetch_add(1, Ordering::SeqCst);
        info!(LOG_TAG, "dummy mode, serial port will not be open, device: {}, baud rate: {}", device, baud_rate);
        Ok(Box::new(DummyTransport {
            shared: Arc::clone(&self.shared),
            open: true,
        }))
    }
}

impl DeviceEnumerator for DummySerialConnector {
    fn list_available_devices(&self) -> Result<Vec<SerialDeviceInfo>, DriverError> {
        self.shared
            .devices
            .lock()
            .map(|list| list.clone())
            .map_err(|_| DriverError::PoisonedLock)
    }
}

fn sleep_ms(delay_ms: &AtomicU64) {
    let ms = delay_ms.load(Ordering::SeqCst);
    if ms > 0 {
        thread::sleep(Duration::from_millis(ms));
    }
}

struct DummyTransport {
    shared: Arc<DummyShared>,
    open: bool,
}

impl DmxTransport for DummyTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), DriverError> {
        if !self.open {
            return Err(DriverError::WriteFailed("dummy port closed".to_string()));
        }
        sleep_ms(&self.shared.write_delay_ms);
        if self.shared.fail_write.load(Ordering::SeqCst) {
            return Err(DriverError::WriteFailed("dummy write failure".to_string()));
        }
        trace!(LOG_TAG, "dummy write, len: {}", data.len());
        let mut frames = self.shared.frames.lock().map_err(|_| DriverError::PoisonedLock)?;
        frames.push(WrittenFrame {
            at: Instant::now(),
            data: data.to_vec(),
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }
}
