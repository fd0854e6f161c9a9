//! dmx 发送线程
//! - 每个周期从 pending buffer 复制一份数据，锁只在复制期间持有
//! - 编码成 dmx usb pro 帧后写入串口
//! - 写入失败只记录，不重发，下个周期发送最新数据
//! - 睡眠剩余的帧间隔，停止通道断开或者 running 标志清除时退出

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, RecvTimeoutError};

use super::codec::encode_frame;
use super::prelude::*;
use super::stats::SendStats;
use super::traits::DmxTransport;
use crate::{debug, info, trace, warn};

const LOG_TAG: &str = "dmx_thread.rs | dmx worker";

pub type SharedTransport = Arc<Mutex<Option<Box<dyn DmxTransport>>>>;
pub type PendingBuffer = Arc<Mutex<Vec<DmxValue>>>;

/// everything the worker shares with the driver
pub struct DmxThreadContext {
    pub device_name: String,
    pub pending: PendingBuffer,
    pub transport: SharedTransport,
    pub running: Arc<AtomicBool>,
    pub stats: Arc<SendStats>,
    pub frame_interval: Duration,
}

pub fn frame_interval(frame_rate: u32) -> Duration {
    Duration::from_secs(1) / frame_rate.max(1)
}

/// `stop_rx` never carries messages, the driver drops its sender to wake the wait
pub fn run_loop(ctx: DmxThreadContext, stop_rx: Receiver<()>) {
    info!(
        LOG_TAG,
        "dmx worker thread started, device: {}, frame interval: {:?}", ctx.device_name, ctx.frame_interval
    );

    let mut working: Vec<DmxValue> = Vec::with_capacity(DMX_CHANNEL_LEN);

    while ctx.running.load(Ordering::SeqCst) {
        let tick_start = Instant::now();

        {
            let pending = ctx.pending.lock().unwrap_or_else(PoisonError::into_inner);
            working.clear();
            working.extend_from_slice(&pending);
        }

        let frame = encode_frame(&working);
        write_frame(&ctx.transport, &frame, &ctx.stats);

        let remaining = ctx.frame_interval.saturating_sub(tick_start.elapsed());
        match stop_rx.recv_timeout(remaining) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!(LOG_TAG, "stop channel closed, stopping");
                break;
            }
        }
    }

    info!(LOG_TAG, "dmx worker thread stopped, device: {}", ctx.device_name);
}

/// write one encoded frame, returns true when the device accepted it
pub(crate) fn write_frame(transport: &SharedTransport, frame: &[u8], stats: &SendStats) -> bool {
    let mut guard = transport.lock().unwrap_or_else(PoisonError::into_inner);
    match guard.as_mut() {
        Some(port) => match port.write(frame) {
            Ok(()) => {
                trace!(LOG_TAG, "frame sent, len: {}", frame.len());
                stats.record_sent();
                true
            }
            Err(e) => {
                warn!(LOG_TAG, "frame skipped, {}", e);
                stats.record_failure();
                false
            }
        },
        None => {
            trace!(LOG_TAG, "no port is available, skip this frame");
            stats.record_dropped();
            false
        }
    }
}
