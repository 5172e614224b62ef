//! Frame delivery from the capture loop to the caller's callback

use std::sync::atomic::{AtomicBool, Ordering};

use capkit_backend::PacketSink;
use capkit_core::PacketRecord;
use tracing::trace;

use crate::stats::StatsAccumulator;

/// Per-`start()` sink wrapped around the caller's callback
///
/// Runs on the capture-loop thread. Frames are accounted and handed to the
/// callback synchronously; there is no queue, so a slow callback throttles
/// the driver.
pub(crate) struct DeliveryPipeline<'a, F> {
    callback: F,
    stats: &'a StatsAccumulator,
    paused: &'a AtomicBool,
    stop_requested: bool,
}

impl<'a, F> DeliveryPipeline<'a, F>
where
    F: FnMut(&PacketRecord<'_>) -> bool,
{
    pub(crate) fn new(callback: F, stats: &'a StatsAccumulator, paused: &'a AtomicBool) -> Self {
        Self {
            callback,
            stats,
            paused,
            stop_requested: false,
        }
    }

    /// True once the callback asked to stop
    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}

impl<F> PacketSink for DeliveryPipeline<'_, F>
where
    F: FnMut(&PacketRecord<'_>) -> bool,
{
    fn deliver(&mut self, packet: &PacketRecord<'_>) -> bool {
        if self.stop_requested {
            return false;
        }
        if self.paused.load(Ordering::Acquire) {
            trace!(len = packet.len(), "Discarding frame while paused");
            return true;
        }

        self.stats.record_packet(u64::from(packet.wire_len()));

        if !(self.callback)(packet) {
            self.stop_requested = true;
            return false;
        }
        true
    }
}
