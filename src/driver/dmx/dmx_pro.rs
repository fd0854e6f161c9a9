//! dmx usb pro 驱动
//!
//! 功能
//! - 保存最新一次提交的通道数据（pending buffer），任意线程都可以写入
//! - 创建独立的发送线程，按固定帧率不断向串口发送数据
//! - 串口打开失败或写入失败都不会终止程序，可以通过 reconnect 恢复
//!
//! Updates are "last write wins": the worker snapshots whatever is pending at
//! each tick, so states submitted faster than the frame period never reach the
//! wire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};

use super::codec::encode_frame;
use super::dmx_thread::{frame_interval, run_loop, write_frame, DmxThreadContext, PendingBuffer, SharedTransport};
use super::entity::DriverState;
use super::prelude::*;
use super::stats::{SendStats, SendStatsSnapshot};
use super::traits::{DeviceEnumerator, SerialConnector};
use crate::common::error::DriverError;
use crate::common::setting::DmxSettings;
use crate::driver::serial::dummy::DummySerialConnector;
use crate::driver::serial::serial_port::SerialPortConnector;
use crate::{error, info, warn};

const LOG_TAG: &str = "dmx_pro.rs | dmx usb pro driver";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmxProConfig {
    pub frame_rate: u32,
    pub baud_rate: u32,
    pub zero_on_init: bool,
    pub zero_on_shutdown: bool,
}

impl Default for DmxProConfig {
    fn default() -> Self {
        Self {
            frame_rate: DMXPRO_FRAME_RATE,
            baud_rate: DMXPRO_BAUD_RATE,
            zero_on_init: true,
            zero_on_shutdown: true,
        }
    }
}

impl From<&DmxSettings> for DmxProConfig {
    fn from(settings: &DmxSettings) -> Self {
        Self {
            frame_rate: settings.frame_rate,
            baud_rate: settings.baud_rate,
            zero_on_init: settings.zero_on_init,
            zero_on_shutdown: settings.zero_on_shutdown,
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    // dropping it wakes the worker out of its inter-frame wait
    stop_tx: Sender<()>,
}

pub struct DmxPro {
    // 串口设备标识符
    device_name: String,
    config: DmxProConfig,
    connector: Arc<dyn SerialConnector>,
    pending: PendingBuffer,
    transport: SharedTransport,
    // mirrors whether `transport` holds an open port, readable without the transport lock
    connected: AtomicBool,
    running: Arc<AtomicBool>,
    stats: Arc<SendStats>,
    // held across init, reconnect and shutdown so they never interleave
    lifecycle: Mutex<()>,
    state: Mutex<DriverState>,
    worker: Mutex<Option<Worker>>,
}

impl DmxPro {
    /// create a driver for `device_name`, nothing is opened until `init`
    pub fn create(
        device_name: &str,
        config: DmxProConfig,
        connector: Arc<dyn SerialConnector>,
    ) -> Result<Arc<Self>, DriverError> {
        if device_name.trim().is_empty() {
            return Err(DriverError::InvalidDeviceName);
        }

        Ok(Arc::new(Self {
            device_name: device_name.to_string(),
            config,
            connector,
            pending: Arc::new(Mutex::new(vec![0; DMX_CHANNEL_LEN])),
            transport: Arc::new(Mutex::new(None)),
            connected: AtomicBool::new(false),
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SendStats::new()),
            lifecycle: Mutex::new(()),
            state: Mutex::new(DriverState::Uninitialized),
            worker: Mutex::new(None),
        }))
    }

    /// create from settings, picking the dummy connector when `dummy` is set
    pub fn from_settings(settings: &DmxSettings) -> Result<Arc<Self>, DriverError> {
        let connector: Arc<dyn SerialConnector> = if settings.dummy {
            Arc::new(DummySerialConnector::new())
        } else {
            Arc::new(SerialPortConnector::default())
        };
        Self::create(&settings.device_name, DmxProConfig::from(settings), connector)
    }

    /// Open the port and start the worker thread.
    ///
    /// A port that fails to open is logged and leaves the driver running but
    /// disconnected; `reconnect` can bring it back. With `zero_first` one
    /// all-zero frame is written before the worker starts.
    pub fn init(&self, zero_first: bool) -> Result<(), DriverError> {
        let _lifecycle = self.lifecycle.lock().map_err(|_| DriverError::PoisonedLock)?;
        match self.state() {
            DriverState::Uninitialized => {}
            DriverState::Stopped => return Err(DriverError::AlreadyStopped),
            DriverState::Connecting | DriverState::Running => return Err(DriverError::AlreadyInitialized),
        }

        self.set_state(DriverState::Connecting);
        info!(LOG_TAG, "init dmx usb pro, device: {}, config: {:?}", self.device_name, self.config);

        if !self.open_transport() {
            warn!(LOG_TAG, "device {} is not connected, frames will be dropped", self.device_name);
        }

        if zero_first {
            self.set_zeros();
            write_frame(&self.transport, &encode_frame(&[0; DMX_CHANNEL_LEN]), &self.stats);
        }

        self.running.store(true, Ordering::SeqCst);
        let (stop_tx, stop_rx) = channel::bounded(0);
        let ctx = DmxThreadContext {
            device_name: self.device_name.clone(),
            pending: Arc::clone(&self.pending),
            transport: Arc::clone(&self.transport),
            running: Arc::clone(&self.running),
            stats: Arc::clone(&self.stats),
            frame_interval: frame_interval(self.config.frame_rate),
        };

        let spawned = thread::Builder::new()
            .name(format!("dmxpro-send-{}", self.device_name))
            .spawn(move || run_loop(ctx, stop_rx));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.set_state(DriverState::Uninitialized);
                return Err(DriverError::ThreadSpawn(e.to_string()));
            }
        };

        *self.worker.lock().map_err(|_| DriverError::PoisonedLock)? = Some(Worker { handle, stop_tx });
        self.set_state(DriverState::Running);
        Ok(())
    }

    /// true iff a port is attached and open, never waits on a write in flight
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Buffer all message data to be sent on the next DMX update. Threadsafe.
    ///
    /// Replaces whatever was pending. Data past 512 bytes is dropped.
    pub fn buffer_data(&self, data: impl AsRef<[u8]>) {
        let mut data = data.as_ref();
        if data.len() > DMX_CHANNEL_LEN {
            warn!(LOG_TAG, "buffer_data got {} bytes, only {} are sent", data.len(), DMX_CHANNEL_LEN);
            data = &data[..DMX_CHANNEL_LEN];
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.clear();
        pending.extend_from_slice(data);
    }

    /// Fill the data buffer with a single value. Threadsafe.
    pub fn fill_buffer(&self, value: DmxValue) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.clear();
        pending.resize(DMX_CHANNEL_LEN, value);
    }

    pub fn set_zeros(&self) {
        self.fill_buffer(0);
    }

    /// Set an individual channel value using 1-indexed positions.
    ///
    /// The write can interleave with a concurrent `buffer_data`, so a frame
    /// may mix old and new values.
    #[deprecated(note = "can send incomplete data over the wire, use buffer_data with a ChannelBuffer instead")]
    pub fn set_value(&self, value: DmxValue, channel: usize) -> Result<(), DriverError> {
        if channel == 0 || channel > DMX_CHANNEL_LEN {
            return Err(DriverError::InvalidChannel(channel));
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.len() < channel {
            pending.resize(channel, 0);
        }
        pending[channel - 1] = value;
        Ok(())
    }

    /// Close and reopen the port, the worker keeps running.
    ///
    /// The state reads `Connecting` until the open returns. Returns whether
    /// the port is open afterwards; a stopped driver is never reopened.
    pub fn reconnect(&self) -> bool {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self.state();
        if previous == DriverState::Stopped {
            warn!(LOG_TAG, "reconnect ignored, driver stopped, device: {}", self.device_name);
            return false;
        }

        info!(LOG_TAG, "reconnecting, device: {}", self.device_name);
        self.set_state(DriverState::Connecting);
        let connected = self.open_transport();
        self.set_state(previous);
        connected
    }

    /// Stop the worker, optionally blank the universe, then release the port.
    ///
    /// The worker finishes its current tick before exiting. Calling this again
    /// does nothing.
    pub fn shutdown(&self, send_zeros: bool) {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if self.state() == DriverState::Stopped {
            return;
        }

        self.running.store(false, Ordering::SeqCst);
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            drop(worker.stop_tx);
            if worker.handle.join().is_err() {
                error!(LOG_TAG, "dmx worker thread panicked, device: {}", self.device_name);
            }
        }

        if send_zeros {
            self.set_zeros();
            write_frame(&self.transport, &encode_frame(&[0; DMX_CHANNEL_LEN]), &self.stats);
        }

        if let Some(mut port) = self.transport.lock().unwrap_or_else(PoisonError::into_inner).take() {
            port.close();
        }
        self.connected.store(false, Ordering::SeqCst);

        self.set_state(DriverState::Stopped);
        info!(LOG_TAG, "dmx usb pro shut down, device: {}, stats: {:?}", self.device_name, self.stats.snapshot());
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn config(&self) -> &DmxProConfig {
        &self.config
    }

    pub fn state(&self) -> DriverState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: DriverState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn stats(&self) -> SendStatsSnapshot {
        self.stats.snapshot()
    }

    /// copy of the data the next frame will carry
    pub fn pending_snapshot(&self) -> Vec<DmxValue> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// log every serial device the enumerator knows about
    pub fn list_devices(enumerator: &dyn DeviceEnumerator) -> Result<(), DriverError> {
        let devices = enumerator.list_available_devices()?;
        info!(LOG_TAG, "--- DMX usb pro > List serial devices ---");
        for device in devices.iter() {
            info!(LOG_TAG, "{} [{}]", device.display_name, device.path);
        }
        info!(LOG_TAG, "-----------------------------------------");
        Ok(())
    }

    /// paths of every serial device, usable as `device_name`
    pub fn get_devices_list(enumerator: &dyn DeviceEnumerator) -> Result<Vec<String>, DriverError> {
        Ok(enumerator
            .list_available_devices()?
            .into_iter()
            .map(|device| device.path)
            .collect())
    }

    // 关闭旧端口后再打开，同一个串口不能同时打开两次
    // the open itself runs without the transport lock, the worker drops frames meanwhile
    fn open_transport(&self) -> bool {
        let old = self.transport.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut old) = old {
            old.close();
        }

        match self.connector.open(&self.device_name, self.config.baud_rate) {
            Ok(port) => {
                *self.transport.lock().unwrap_or_else(PoisonError::into_inner) = Some(port);
                self.connected.store(true, Ordering::SeqCst);
                true
            }
            Err(e) => {
                error!(LOG_TAG, "{}", e);
                false
            }
        }
    }
}

impl Drop for DmxPro {
    fn drop(&mut self) {
        self.shutdown(self.config.zero_on_shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::logger::init_logger;
    use crate::driver::dmx::entity::{ChannelBuffer, Rgb8, SerialDeviceInfo};
    use std::time::Duration;

    fn make_driver(frame_rate: u32) -> (Arc<DmxPro>, DummySerialConnector) {
        init_logger();
        let connector = DummySerialConnector::new();
        let config = DmxProConfig {
            frame_rate,
            ..DmxProConfig::default()
        };
        let driver = DmxPro::create("/dev/ttyUSB0", config, Arc::new(connector.clone())).unwrap();
        (driver, connector)
    }

    fn channels(frame: &[u8]) -> &[u8] {
        &frame[5..5 + DMX_CHANNEL_LEN]
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let result = DmxPro::create("  ", DmxProConfig::default(), Arc::new(DummySerialConnector::new()));
        assert!(matches!(result, Err(DriverError::InvalidDeviceName)));
    }

    #[test]
    fn test_from_settings_dummy() {
        let settings = DmxSettings {
            device_name: "dummy0".to_string(),
            dummy: true,
            ..DmxSettings::default()
        };
        let driver = DmxPro::from_settings(&settings).unwrap();
        assert_eq!(driver.device_name(), "dummy0");
        assert_eq!(driver.config().frame_rate, DMXPRO_FRAME_RATE);
        driver.init(false).unwrap();
        assert!(driver.is_connected());
        driver.shutdown(false);
    }

    #[test]
    fn test_init_zero_first() {
        let (driver, connector) = make_driver(20);
        driver.buffer_data([255u8; DMX_CHANNEL_LEN]);
        assert_eq!(driver.state(), DriverState::Uninitialized);
        assert!(!driver.is_connected());

        driver.init(true).unwrap();
        assert_eq!(driver.state(), DriverState::Running);
        assert!(driver.is_connected());

        let frames = connector.frames();
        assert!(!frames.is_empty());
        assert_eq!(frames[0].data.len(), DMXPRO_PACKET_SIZE);
        assert!(channels(&frames[0].data).iter().all(|b| *b == 0));
        driver.shutdown(false);
    }

    #[test]
    fn test_init_twice() {
        let (driver, _connector) = make_driver(50);
        driver.init(false).unwrap();
        assert!(matches!(driver.init(false), Err(DriverError::AlreadyInitialized)));
        driver.shutdown(false);
        assert!(matches!(driver.init(false), Err(DriverError::AlreadyStopped)));
    }

    #[test]
    fn test_open_failure_then_reconnect() {
        let (driver, connector) = make_driver(100);
        connector.set_fail_open(true);

        driver.init(true).unwrap();
        assert_eq!(driver.state(), DriverState::Running);
        assert!(!driver.is_connected());
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(connector.frame_count(), 0);
        assert!(driver.stats().frames_dropped > 0);

        connector.set_fail_open(false);
        assert!(driver.reconnect());
        assert!(driver.is_connected());
        std::thread::sleep(Duration::from_millis(50));
        assert!(connector.frame_count() > 0);
        driver.shutdown(false);
    }

    #[test]
    fn test_reconnect_reopens_port() {
        let (driver, connector) = make_driver(50);
        driver.init(false).unwrap();
        assert_eq!(connector.open_count(), 1);
        assert!(driver.reconnect());
        assert_eq!(connector.open_count(), 2);
        driver.shutdown(false);
        assert!(!driver.reconnect());
        assert_eq!(connector.open_count(), 2);
    }

    #[test]
    fn test_buffered_data_reaches_wire() {
        let (driver, connector) = make_driver(100);
        let mut buffer = ChannelBuffer::new();
        buffer.set_color(Rgb8::new(1, 2, 3), 0);
        buffer.set_value(99, 511);

        driver.init(false).unwrap();
        driver.buffer_data(&buffer);
        std::thread::sleep(Duration::from_millis(60));
        driver.shutdown(false);

        let frames = connector.frames();
        let last = frames.last().unwrap();
        assert_eq!(channels(&last.data), &buffer.data()[..]);
    }

    #[test]
    fn test_buffer_data_replaces_and_truncates() {
        let (driver, _connector) = make_driver(50);
        driver.buffer_data([7u8; 600]);
        assert_eq!(driver.pending_snapshot(), vec![7u8; DMX_CHANNEL_LEN]);

        driver.buffer_data([1u8, 2, 3]);
        assert_eq!(driver.pending_snapshot(), vec![1, 2, 3]);

        driver.fill_buffer(9);
        assert_eq!(driver.pending_snapshot(), vec![9u8; DMX_CHANNEL_LEN]);
    }

    #[test]
    #[allow(deprecated)]
    fn test_set_value_one_indexed() {
        let (driver, _connector) = make_driver(50);
        driver.buffer_data([0u8; 4]);
        driver.set_value(10, 1).unwrap();
        driver.set_value(20, 8).unwrap();
        driver.set_value(30, 512).unwrap();

        let pending = driver.pending_snapshot();
        assert_eq!(pending.len(), DMX_CHANNEL_LEN);
        assert_eq!(pending[0], 10);
        assert_eq!(pending[7], 20);
        assert_eq!(pending[511], 30);

        assert!(matches!(driver.set_value(1, 0), Err(DriverError::InvalidChannel(0))));
        assert!(matches!(driver.set_value(1, 513), Err(DriverError::InvalidChannel(513))));
    }

    #[test]
    fn test_shutdown_sends_one_zero_frame() {
        let (driver, connector) = make_driver(100);
        driver.buffer_data([255u8; DMX_CHANNEL_LEN]);
        driver.init(false).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        driver.shutdown(true);
        assert_eq!(driver.state(), DriverState::Stopped);
        assert!(!driver.is_connected());

        let frames = connector.frames();
        let zero_frames = frames
            .iter()
            .filter(|f| channels(&f.data).iter().all(|b| *b == 0))
            .count();
        assert_eq!(zero_frames, 1);
        assert!(channels(&frames.last().unwrap().data).iter().all(|b| *b == 0));

        // the worker is gone, nothing more is written
        let count = connector.frame_count();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(connector.frame_count(), count);

        driver.shutdown(true);
        assert_eq!(connector.frame_count(), count);
    }

    #[test]
    fn test_shutdown_without_zeros() {
        let (driver, connector) = make_driver(100);
        driver.buffer_data([5u8; DMX_CHANNEL_LEN]);
        driver.init(false).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        driver.shutdown(false);

        let frames = connector.frames();
        assert!(frames.iter().all(|f| channels(&f.data).iter().all(|b| *b == 5)));
    }

    #[test]
    fn test_drop_shuts_down() {
        let (driver, connector) = make_driver(100);
        driver.buffer_data([3u8; DMX_CHANNEL_LEN]);
        driver.init(false).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        drop(driver);

        let frames = connector.frames();
        assert!(channels(&frames.last().unwrap().data).iter().all(|b| *b == 0));
    }

    #[test]
    fn test_is_connected_during_slow_write() {
        let (driver, connector) = make_driver(10);
        connector.set_write_delay(Duration::from_millis(400));
        driver.init(false).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        // the worker is inside a 400ms write holding the transport
        let start = std::time::Instant::now();
        assert!(driver.is_connected());
        driver.buffer_data([1u8; DMX_CHANNEL_LEN]);
        assert!(start.elapsed() < Duration::from_millis(50), "took {:?}", start.elapsed());

        driver.shutdown(false);
        assert!(!driver.is_connected());
    }

    #[test]
    fn test_reconnect_passes_through_connecting() {
        let (driver, connector) = make_driver(50);
        driver.init(false).unwrap();
        connector.set_open_delay(Duration::from_millis(300));

        let remote = Arc::clone(&driver);
        let handle = std::thread::spawn(move || remote.reconnect());
        std::thread::sleep(Duration::from_millis(100));

        let start = std::time::Instant::now();
        assert_eq!(driver.state(), DriverState::Connecting);
        assert!(!driver.is_connected());
        assert!(start.elapsed() < Duration::from_millis(50));

        assert!(handle.join().unwrap());
        assert_eq!(driver.state(), DriverState::Running);
        assert!(driver.is_connected());
        driver.shutdown(false);
    }

    #[test]
    fn test_shutdown_waits_for_reconnect() {
        let (driver, connector) = make_driver(50);
        driver.init(false).unwrap();
        connector.set_open_delay(Duration::from_millis(200));

        let remote = Arc::clone(&driver);
        let handle = std::thread::spawn(move || remote.reconnect());
        std::thread::sleep(Duration::from_millis(50));

        driver.shutdown(false);
        assert!(handle.join().unwrap());
        assert_eq!(connector.open_count(), 2);

        // the port opened by reconnect was released by shutdown
        assert_eq!(driver.state(), DriverState::Stopped);
        assert!(!driver.is_connected());
        let count = connector.frame_count();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(connector.frame_count(), count);
        assert!(!driver.reconnect());
    }

    #[test]
    fn test_device_lists() {
        init_logger();
        let enumerator = DummySerialConnector::with_devices(vec![
            SerialDeviceInfo {
                display_name: "DMX USB PRO (/dev/ttyUSB0)".to_string(),
                path: "/dev/ttyUSB0".to_string(),
            },
            SerialDeviceInfo {
                display_name: "/dev/ttyS0".to_string(),
                path: "/dev/ttyS0".to_string(),
            },
        ]);

        DmxPro::list_devices(&enumerator).unwrap();
        let paths = DmxPro::get_devices_list(&enumerator).unwrap();
        assert_eq!(paths, vec!["/dev/ttyUSB0".to_string(), "/dev/ttyS0".to_string()]);
    }
}
