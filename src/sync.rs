//! Cluster-synchronised latest-frame slot

use tracing::{debug, trace, warn};

use crate::gate::FrameVersionGate;
use crate::types::Frame;

/// Holds the newest frame received for a stream until the whole wall has it.
///
/// Only the latest frame is kept: a frame that was received but never
/// synced is replaced (and counted as dropped) when a newer one arrives.
#[derive(Debug, Default)]
pub struct SyncFrame {
    pending: Option<Frame>,
    received_version: u64,
    synced_version: u64,
    dropped: u64,
}

impl SyncFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a newly received frame. Frames not newer than the last one are ignored.
    pub fn update(&mut self, frame: Frame) {
        if frame.version <= self.received_version {
            warn!(
                stream = %frame.stream_id,
                version = frame.version,
                latest = self.received_version,
                "ignoring out-of-order frame"
            );
            return;
        }

        if let Some(replaced) = self.pending.replace(frame) {
            self.dropped += 1;
            debug!(
                stream = %replaced.stream_id,
                version = replaced.version,
                dropped = self.dropped,
                "unsynced frame replaced by a newer one"
            );
        }
        self.received_version = self.pending.as_ref().map_or(self.received_version, |f| f.version);
    }

    /// Collective step: hand out the pending frame once every process holds it.
    ///
    /// Must be called exactly once per cycle on every process, whether or not
    /// a frame is pending locally.
    pub fn sync<G: FrameVersionGate + ?Sized>(&mut self, gate: &mut G) -> Option<Frame> {
        let agreed = gate.check_version(self.received_version);
        if !agreed || self.received_version <= self.synced_version {
            return None;
        }

        self.synced_version = self.received_version;
        trace!(version = self.synced_version, "frame version agreed across the wall");
        self.pending.take()
    }

    /// Version of the newest received frame.
    pub fn received_version(&self) -> u64 {
        self.received_version
    }

    /// Version of the last frame handed out by [`sync`](Self::sync).
    pub fn synced_version(&self) -> u64 {
        self.synced_version
    }

    /// Frames replaced before the wall agreed on them.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }
}
