//! Stream registry: stream identifiers to windows and pixel stream state.
//!
//! The registry is the only place that creates or destroys a
//! [`PixelStreamState`]. Window lifecycle changes are published as
//! [`RegistryEvent`]s on a broadcast channel instead of callbacks.
//!
//! Streams are kept in a `BTreeMap` so every wall process updates them in the
//! same order; together with opening and closing streams identically on every
//! process this keeps the collective gate calls balanced.
//!
//! A frame for a stream nobody opened yet is parked until every process holds
//! one. The stream is then opened on all of them in the same cycle.

mod window;

pub use window::{
    ContentWindow, DisplayGroup, EventReceiver, InteractionEvent, InteractionKind, WindowState,
};

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::hash::{DefaultHasher, Hash, Hasher};

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, trace, warn};

use crate::decoder::SegmentDecoder;
use crate::display::DisplayRegion;
use crate::gate::{FrameVersionGate, ReduceOp};
use crate::pixel_stream::{CycleReport, PipelineResources, PixelStreamState};
use crate::renderer::RenderOptions;
use crate::types::{Frame, Point, Rect, Size, StreamId};

const EVENT_CAPACITY: usize = 64;

/// Notifications published by the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    StreamOpened { stream: StreamId, size: Size },
    StreamClosed { stream: StreamId },
    DimensionsChanged { stream: StreamId, size: Size },
    EventRegistrationReply { stream: StreamId, success: bool },
}

struct StreamEntry {
    window: ContentWindow,
    state: PixelStreamState,
}

/// Region used for streams whose window is not on the wall.
struct Nowhere;

impl DisplayRegion for Nowhere {
    fn is_region_visible(&self, _region: &Rect) -> bool {
        false
    }
}

/// Owns every stream of one wall process.
pub struct StreamRegistry {
    display_group: DisplayGroup,
    streams: BTreeMap<StreamId, StreamEntry>,
    resources: PipelineResources,
    render_options: RenderOptions,
    retired: Vec<SegmentDecoder>,
    /// Latest frame of each stream waiting for a wall-wide implicit open
    pending: BTreeMap<StreamId, Frame>,
    events: broadcast::Sender<RegistryEvent>,
}

impl StreamRegistry {
    pub fn new(wall_size: Size, resources: PipelineResources) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            display_group: DisplayGroup::new(wall_size),
            streams: BTreeMap::new(),
            resources,
            render_options: RenderOptions::default(),
            retired: Vec::new(),
            pending: BTreeMap::new(),
            events,
        }
    }

    /// Open a stream window, or update an existing one.
    ///
    /// New windows are centered on the wall and sized 1:1 to the stream.
    /// Either way the window ends up selected and shown, and a frame parked
    /// for the stream is handed over.
    pub fn open_stream(&mut self, id: impl Into<StreamId>, size: Size) -> &ContentWindow {
        let id = id.into();
        debug!(stream = %id, width = size.width, height = size.height, "opening pixel stream");

        if !self.display_group.contains(&id) {
            self.display_group.add_window(&id);
            let _ = self.events.send(RegistryEvent::StreamOpened { stream: id.clone(), size });
        }

        let parked = self.pending.remove(&id);
        let center = self.display_group.coordinates().center();
        let entry = match self.streams.entry(id) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let entry = Self::new_entry(&self.resources, self.render_options, vacant.key(), size);
                let entry = vacant.insert(entry);
                entry.window.move_center_to(center);
                entry
            }
        };
        entry.window.set_dimensions(size);
        entry.window.set_state(WindowState::Selected);
        if let Some(frame) = parked {
            entry.state.set_new_frame(frame);
        }
        &entry.window
    }

    /// Close a stream and drop its window. Unknown streams are ignored.
    pub fn close_stream(&mut self, id: &StreamId) {
        debug!(stream = %id, "closing pixel stream");
        if self.pending.remove(id).is_some() {
            debug!(stream = %id, "dropped frame of a stream that never opened");
        }
        if !self.streams.contains_key(id) {
            return;
        }
        self.display_group.remove_window(id);
        self.on_window_removed(id);
    }

    /// Place a window for `id` at `position` (wall center if `None`) with `size`.
    ///
    /// An existing window is repositioned instead of duplicated. The window is
    /// registered but only shown once the stream is opened.
    pub fn create_window(
        &mut self,
        id: impl Into<StreamId>,
        position: Option<Point>,
        size: Size,
    ) -> &ContentWindow {
        let id = id.into();
        if self.streams.contains_key(&id) {
            warn!(stream = %id, "already have a window for stream");
        }
        let center = position.unwrap_or_else(|| self.display_group.coordinates().center());
        &self.place_window(id, center, size).window
    }

    fn place_window(&mut self, id: StreamId, center: Point, size: Size) -> &mut StreamEntry {
        let entry = self.entry_mut_or_insert(id, size);
        entry.window.resize(size);
        entry.window.move_center_to(center);
        entry
    }

    fn entry_mut_or_insert(&mut self, id: StreamId, size: Size) -> &mut StreamEntry {
        let resources = &self.resources;
        let options = self.render_options;
        match self.streams.entry(id) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let entry = Self::new_entry(resources, options, vacant.key(), size);
                vacant.insert(entry)
            }
        }
    }

    fn new_entry(
        resources: &PipelineResources,
        options: RenderOptions,
        id: &StreamId,
        size: Size,
    ) -> StreamEntry {
        info!(stream = %id, "pixel stream registered");
        let mut state = PixelStreamState::new(id.clone(), resources.clone());
        state.set_rendering_options(options);
        StreamEntry { window: ContentWindow::new(id.clone(), size), state }
    }

    /// Forget the registry entry for `id` without notifying listeners.
    ///
    /// Returns false if there was none.
    pub fn remove_window_entry(&mut self, id: &StreamId) -> bool {
        let Some(entry) = self.streams.remove(id) else {
            return false;
        };
        self.display_group.remove_window(id);
        self.retire(entry.state);
        true
    }

    /// Callback for a window removed from the display group by someone else.
    pub fn on_window_removed(&mut self, id: &StreamId) {
        if !self.remove_window_entry(id) {
            return;
        }
        info!(stream = %id, "pixel stream window closed");
        let _ = self.events.send(RegistryEvent::StreamClosed { stream: id.clone() });
    }

    fn retire(&mut self, state: PixelStreamState) {
        let mut decoders = state.into_decoders();
        decoders.retain_mut(SegmentDecoder::is_running);
        if !decoders.is_empty() {
            debug!(running = decoders.len(), "keeping decoders of closed stream until they finish");
            self.retired.extend(decoders);
        }
    }

    /// Drop retired decoders whose worker finished; returns how many were dropped.
    pub fn reap_retired_decoders(&mut self) -> usize {
        let before = self.retired.len();
        self.retired.retain_mut(SegmentDecoder::is_running);
        before - self.retired.len()
    }

    /// Retired decoders still waiting on their worker.
    pub fn retired_decoders(&self) -> usize {
        self.retired.len()
    }

    pub fn window(&self, id: &StreamId) -> Option<&ContentWindow> {
        self.streams.get(id).map(|entry| &entry.window)
    }

    pub fn stream(&self, id: &StreamId) -> Option<&PixelStreamState> {
        self.streams.get(id).map(|entry| &entry.state)
    }

    pub fn stream_ids(&self) -> impl Iterator<Item = &StreamId> {
        self.streams.keys()
    }

    /// Streams with a frame parked until the wall agrees to open them.
    pub fn pending_streams(&self) -> impl Iterator<Item = &StreamId> {
        self.pending.keys()
    }

    pub fn display_group(&self) -> &DisplayGroup {
        &self.display_group
    }

    /// Update the declared content size without moving the window.
    pub fn on_frame_dimensions_known(&mut self, id: &StreamId, size: Size) {
        let Some(entry) = self.streams.get_mut(id) else {
            error!(stream = %id, "could not find window to update dimensions");
            return;
        };
        if entry.window.dimensions() == size {
            return;
        }
        entry.window.set_dimensions(size);
        let _ = self.events.send(RegistryEvent::DimensionsChanged { stream: id.clone(), size });
    }

    pub fn hide_window(&mut self, id: &StreamId) {
        if let Some(entry) = self.streams.get_mut(id) {
            entry.window.set_state(WindowState::Hidden);
        }
    }

    pub fn show_window(&mut self, id: &StreamId) {
        if let Some(entry) = self.streams.get_mut(id) {
            entry.window.set_state(WindowState::Selected);
        }
    }

    /// Attach an input sink to a stream's window.
    ///
    /// With `exclusive`, fails if the window already has a receiver. The
    /// outcome is also published as [`RegistryEvent::EventRegistrationReply`].
    pub fn register_event_receiver(
        &mut self,
        id: &StreamId,
        exclusive: bool,
        receiver: EventReceiver,
    ) -> bool {
        let success = match self.streams.get_mut(id) {
            Some(entry) => {
                let window = &mut entry.window;
                let registered = (!exclusive || !window.has_event_receivers())
                    && window.register_event_receiver(receiver);
                if registered {
                    window.set_state(WindowState::Selected);
                }
                registered
            }
            None => {
                error!(stream = %id, "could not find window to register event receiver");
                false
            }
        };

        let _ = self
            .events
            .send(RegistryEvent::EventRegistrationReply { stream: id.clone(), success });
        success
    }

    /// Forward an interaction to the stream's receivers.
    pub fn dispatch_event(&mut self, id: &StreamId, event: InteractionEvent) -> usize {
        self.streams.get_mut(id).map_or(0, |entry| entry.window.dispatch(event))
    }

    /// Hand a network frame to its stream.
    ///
    /// A frame of an unopened stream is parked; [`pre_render_update`] opens
    /// the stream once every process of the wall holds a frame for it.
    ///
    /// [`pre_render_update`]: Self::pre_render_update
    pub fn push_frame(&mut self, frame: Frame) {
        let id = frame.stream_id.clone();
        let Some(entry) = self.streams.get_mut(&id) else {
            trace!(stream = %id, version = frame.version, "parking frame of unopened stream");
            self.pending.insert(id, frame);
            return;
        };
        let size = frame.dimensions().to_size();
        entry.state.set_new_frame(frame);
        self.on_frame_dimensions_known(&id, size);
    }

    /// Open at most one parked stream, and only if every process parked it.
    ///
    /// Always makes two collective calls.
    fn open_agreed_pending_stream<G: FrameVersionGate + ?Sized>(
        &mut self,
        gate: &mut G,
    ) -> Option<StreamId> {
        let candidate = self.pending.keys().map(pending_key).min().unwrap_or(u64::MAX);
        let agreed = gate.all_reduce(candidate, ReduceOp::Min);
        let local = self.pending.keys().find(|id| pending_key(id) == agreed).cloned();
        let everywhere = gate.all_reduce(u64::from(local.is_some()), ReduceOp::Min) == 1;
        if !everywhere {
            return None;
        }

        let id = local?;
        let frame = self.pending.remove(&id)?;
        info!(stream = %id, version = frame.version, "opening stream on its first frame");
        self.open_stream(id.clone(), frame.dimensions().to_size());
        self.push_frame(frame);
        Some(id)
    }

    pub fn set_render_options(&mut self, options: RenderOptions) {
        self.render_options = options;
        for entry in self.streams.values_mut() {
            entry.state.set_rendering_options(options);
        }
    }

    /// Run one update cycle for every stream, in stream id order.
    ///
    /// Hidden windows and windows not on the wall still take part in the
    /// collective calls but decode nothing.
    pub fn pre_render_update<G, D>(
        &mut self,
        gate: &mut G,
        display: &D,
    ) -> Vec<(StreamId, CycleReport)>
    where
        G: FrameVersionGate + ?Sized,
        D: DisplayRegion + ?Sized,
    {
        self.open_agreed_pending_stream(gate);

        let mut reports = Vec::with_capacity(self.streams.len());
        for (id, entry) in &mut self.streams {
            let window_rect = *entry.window.coordinates();
            let shown =
                self.display_group.contains(id) && entry.window.state() != WindowState::Hidden;
            let report = if shown {
                entry.state.pre_render_update(window_rect, gate, display)
            } else {
                entry.state.pre_render_update(window_rect, gate, &Nowhere)
            };
            reports.push((id.clone(), report));
        }
        reports
    }

    /// Draw every shown window, bottom first. Returns the segments drawn.
    pub fn render<D: DisplayRegion + ?Sized>(&self, display: &D) -> usize {
        self.display_group
            .windows()
            .iter()
            .filter_map(|id| self.streams.get(id))
            .filter(|entry| entry.window.state() != WindowState::Hidden)
            .map(|entry| entry.state.render(display))
            .sum()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Registry events as a stream; events missed by a slow consumer are skipped.
    pub fn events(&self) -> impl Stream<Item = RegistryEvent> + use<> {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| event.ok())
    }
}

/// Wall-wide key of a stream id. Every process runs the same binary, so the
/// fixed-key std hasher gives the same value everywhere.
fn pending_key(id: &StreamId) -> u64 {
    let mut hasher = DefaultHasher::new();
    id.as_str().hash(&mut hasher);
    hasher.finish()
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("display_group", &self.display_group)
            .field("streams", &self.streams.keys().collect::<Vec<_>>())
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .field("retired", &self.retired.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ScreenRegion;
    use crate::gate::SingleProcessGate;
    use crate::test_utils::{
        HeldCodec, RecordingTextureFactory, compressed_grid_frame, test_resources, wait_until,
    };
    use std::time::Duration;

    const WALL: Size = Size { width: 1000.0, height: 1000.0 };

    fn registry(codec: &HeldCodec) -> StreamRegistry {
        StreamRegistry::new(WALL, test_resources(codec, &RecordingTextureFactory::new()))
    }

    fn wall_display() -> ScreenRegion {
        ScreenRegion::new(Rect::from_size(WALL))
    }

    #[tokio::test]
    async fn lifecycle_is_published() {
        let mut registry = registry(&HeldCodec::released());
        let mut events = registry.subscribe();
        let id = StreamId::from("bla");

        registry.open_stream(id.clone(), Size::new(500.0, 400.0));
        registry.on_frame_dimensions_known(&id, Size::new(640.0, 480.0));
        registry.on_frame_dimensions_known(&id, Size::new(640.0, 480.0));
        registry.close_stream(&id);
        registry.close_stream(&id);

        assert_eq!(
            events.try_recv().unwrap(),
            RegistryEvent::StreamOpened { stream: id.clone(), size: Size::new(500.0, 400.0) }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            RegistryEvent::DimensionsChanged { stream: id.clone(), size: Size::new(640.0, 480.0) }
        );
        assert_eq!(events.try_recv().unwrap(), RegistryEvent::StreamClosed { stream: id });
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn exclusive_registration_fails_without_side_effects() {
        let mut registry = registry(&HeldCodec::released());
        let id = StreamId::from("bla");
        registry.create_window(id.clone(), None, Size::new(100.0, 100.0));
        assert_eq!(registry.window(&id).unwrap().state(), WindowState::Unselected);

        let (first, _first_rx) = EventReceiver::channel();
        let (second, _second_rx) = EventReceiver::channel();
        let mut events = registry.subscribe();

        assert!(registry.register_event_receiver(&id, true, first));
        assert_eq!(registry.window(&id).unwrap().state(), WindowState::Selected);

        registry.hide_window(&id);
        assert!(!registry.register_event_receiver(&id, true, second.clone()));
        assert_eq!(registry.window(&id).unwrap().state(), WindowState::Hidden);

        assert!(registry.register_event_receiver(&id, false, second));
        let (orphan, _orphan_rx) = EventReceiver::channel();
        assert!(!registry.register_event_receiver(&StreamId::from("missing"), false, orphan));

        let replies: Vec<bool> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| match event {
                RegistryEvent::EventRegistrationReply { success, .. } => success,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(replies, vec![true, false, true, false]);
    }

    #[tokio::test]
    async fn events_stream_yields_published_events() {
        let mut registry = registry(&HeldCodec::released());
        let events = registry.events();
        registry.open_stream("a", Size::new(10.0, 10.0));
        registry.close_stream(&StreamId::from("a"));

        let collected: Vec<RegistryEvent> = events.take(2).collect().await;
        assert!(matches!(collected[0], RegistryEvent::StreamOpened { .. }));
        assert!(matches!(collected[1], RegistryEvent::StreamClosed { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_frame_opens_stream_centered_on_next_cycle() {
        let mut registry = registry(&HeldCodec::released());
        let mut gate = SingleProcessGate::new();
        let id = StreamId::from("s");
        registry.push_frame(compressed_grid_frame("s", 1, 2, 2, 64));

        assert!(registry.window(&id).is_none());
        assert_eq!(registry.pending_streams().collect::<Vec<_>>(), vec![&id]);

        let reports = registry.pre_render_update(&mut gate, &wall_display());
        assert_eq!(reports.len(), 1);
        assert!(reports[0].1.new_frame);
        assert_eq!(gate.collective_calls(), 2 + 3);
        assert_eq!(registry.pending_streams().count(), 0);

        let window = registry.window(&StreamId::from("s")).unwrap();
        assert_eq!(window.state(), WindowState::Selected);
        assert_eq!(window.dimensions(), Size::new(128.0, 128.0));
        assert_eq!(window.coordinates().center(), Point::new(500.0, 500.0));
        assert!(registry.display_group().contains(&StreamId::from("s")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hidden_windows_decode_nothing() {
        let codec = HeldCodec::released();
        let mut registry = registry(&codec);
        let mut gate = SingleProcessGate::new();
        let id = StreamId::from("s");

        registry.push_frame(compressed_grid_frame("s", 1, 2, 1, 16));
        registry.pre_render_update(&mut gate, &wall_display());
        registry.hide_window(&id);
        for _ in 0..4 {
            registry.pre_render_update(&mut gate, &wall_display());
        }
        assert_eq!(codec.decode_count(), 0);
        assert_eq!(registry.render(&wall_display()), 0);

        registry.show_window(&id);
        let decoded = wait_until(Duration::from_secs(5), || {
            registry.pre_render_update(&mut gate, &wall_display());
            registry
                .stream(&id)
                .is_some_and(|s| s.front_buffer().iter().all(|seg| !seg.is_compressed()))
        });
        assert!(decoded);
        assert_eq!(codec.decode_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn closing_keeps_running_decoders_until_done() {
        let codec = HeldCodec::new();
        let mut registry = registry(&codec);
        let mut gate = SingleProcessGate::new();
        let id = StreamId::from("s");

        registry.push_frame(compressed_grid_frame("s", 1, 3, 1, 16));
        registry.pre_render_update(&mut gate, &wall_display());
        registry.pre_render_update(&mut gate, &wall_display());
        assert!(wait_until(Duration::from_secs(5), || codec.decode_count() == 3));

        registry.close_stream(&id);
        assert!(registry.window(&id).is_none());
        assert_eq!(registry.retired_decoders(), 3);
        assert_eq!(registry.reap_retired_decoders(), 0);

        codec.release();
        let mut reaped = 0;
        assert!(wait_until(Duration::from_secs(5), || {
            reaped += registry.reap_retired_decoders();
            registry.retired_decoders() == 0
        }));
        assert_eq!(reaped, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn parked_frames_follow_explicit_open_and_close() {
        let mut registry = registry(&HeldCodec::released());
        let mut gate = SingleProcessGate::new();
        let opened = StreamId::from("opened");
        let closed = StreamId::from("closed");

        registry.push_frame(compressed_grid_frame("opened", 1, 1, 1, 8));
        registry.push_frame(compressed_grid_frame("opened", 2, 1, 1, 8));
        registry.push_frame(compressed_grid_frame("closed", 1, 1, 1, 8));

        registry.open_stream(opened.clone(), Size::new(8.0, 8.0));
        registry.close_stream(&closed);
        assert_eq!(registry.pending_streams().count(), 0);
        assert!(registry.window(&closed).is_none());

        registry.pre_render_update(&mut gate, &wall_display());
        assert_eq!(registry.stream(&opened).map(PixelStreamState::front_version), Some(2));
    }

    #[tokio::test]
    async fn remove_window_entry_is_silent() {
        let mut registry = registry(&HeldCodec::released());
        let id = StreamId::from("bla");
        registry.open_stream(id.clone(), Size::new(10.0, 10.0));
        let mut events = registry.subscribe();

        assert!(registry.remove_window_entry(&id));
        assert!(!registry.remove_window_entry(&id));
        assert!(registry.window(&id).is_none());
        assert!(!registry.display_group().contains(&id));
        assert!(events.try_recv().is_err());
    }
}
