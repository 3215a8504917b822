//! In-process frame source fed through a channel

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::trace;

use super::{FrameSource, SourceEvent};
use crate::types::{Frame, Segment, Size, StreamId};
use crate::{Result, WallError};

/// Receiving end handed to the driver.
#[derive(Debug)]
pub struct ChannelSource {
    events: mpsc::UnboundedReceiver<SourceEvent>,
    requests: mpsc::UnboundedSender<StreamId>,
}

/// Sending end: plays the streamer side, stamping frame versions per stream.
#[derive(Debug)]
pub struct FrameFeeder {
    events: mpsc::UnboundedSender<SourceEvent>,
    requests: mpsc::UnboundedReceiver<StreamId>,
    versions: HashMap<StreamId, u64>,
}

impl ChannelSource {
    pub fn new() -> (Self, FrameFeeder) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        (
            Self { events: event_rx, requests: request_tx },
            FrameFeeder { events: event_tx, requests: request_rx, versions: HashMap::new() },
        )
    }
}

#[async_trait::async_trait]
impl FrameSource for ChannelSource {
    async fn next_event(&mut self) -> Result<Option<SourceEvent>> {
        Ok(self.events.recv().await)
    }

    async fn request_frame(&mut self, stream: &StreamId) -> Result<()> {
        // A feeder that went away simply stops producing.
        let _ = self.requests.send(stream.clone());
        Ok(())
    }
}

impl FrameFeeder {
    pub fn open(&mut self, stream: impl Into<StreamId>, size: Size) -> Result<()> {
        let stream = stream.into();
        self.versions.entry(stream.clone()).or_insert(0);
        self.send(SourceEvent::Opened { stream, size })
    }

    /// Send the next frame of `stream`; returns the version it was given.
    pub fn send_frame(&mut self, stream: impl Into<StreamId>, segments: Vec<Segment>) -> Result<u64> {
        let stream = stream.into();
        let version = self.versions.entry(stream.clone()).or_insert(0);
        *version += 1;
        let version = *version;
        trace!(stream = %stream, version, segments = segments.len(), "feeding frame");
        self.send(SourceEvent::Frame(Frame::new(stream, version, segments)))?;
        Ok(version)
    }

    pub fn close(&mut self, stream: impl Into<StreamId>) -> Result<()> {
        let stream = stream.into();
        self.versions.remove(&stream);
        self.send(SourceEvent::Closed { stream })
    }

    /// Wait for the wall to ask for another frame.
    pub async fn next_request(&mut self) -> Option<StreamId> {
        self.requests.recv().await
    }

    /// A pending frame request, if any.
    pub fn try_next_request(&mut self) -> Option<StreamId> {
        self.requests.try_recv().ok()
    }

    fn send(&self, event: SourceEvent) -> Result<()> {
        self.events.send(event).map_err(|_| WallError::source_failed("frame source was dropped"))
    }
}
