//! Window placement records and the display group they are shown in

use tokio::sync::mpsc;
use tracing::trace;

use crate::types::{Point, Rect, Size, StreamId};

/// Interaction state of a content window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowState {
    /// Receives interaction; set when a stream opens or gains a receiver.
    Selected,
    #[default]
    Unselected,
    /// Kept in the group but not drawn, and its segments are not decoded.
    Hidden,
}

/// Kind of user interaction forwarded to a stream's event receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Press,
    Move,
    Release,
    Wheel,
}

/// One interaction, with `position` normalized to the window (0..1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionEvent {
    pub kind: InteractionKind,
    pub position: Point,
}

/// Input sink attached to a stream window.
#[derive(Debug, Clone)]
pub struct EventReceiver {
    sender: mpsc::UnboundedSender<InteractionEvent>,
}

impl EventReceiver {
    /// A receiver and the channel end its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<InteractionEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn same_as(&self, other: &EventReceiver) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

/// Placement of one stream on the wall.
#[derive(Debug, Clone)]
pub struct ContentWindow {
    stream: StreamId,
    coordinates: Rect,
    dimensions: Size,
    state: WindowState,
    receivers: Vec<EventReceiver>,
}

impl ContentWindow {
    pub fn new(stream: StreamId, dimensions: Size) -> Self {
        Self {
            stream,
            coordinates: Rect::from_size(dimensions),
            dimensions,
            state: WindowState::default(),
            receivers: Vec::new(),
        }
    }

    pub fn stream(&self) -> &StreamId {
        &self.stream
    }

    /// Window rectangle in scene (wall) coordinates.
    pub fn coordinates(&self) -> &Rect {
        &self.coordinates
    }

    /// Declared pixel size of the stream content.
    pub fn dimensions(&self) -> Size {
        self.dimensions
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn set_state(&mut self, state: WindowState) {
        self.state = state;
    }

    pub fn set_dimensions(&mut self, dimensions: Size) {
        self.dimensions = dimensions;
    }

    pub fn resize(&mut self, size: Size) {
        self.coordinates.resize_around_center(size);
    }

    pub fn move_center_to(&mut self, center: Point) {
        self.coordinates.move_center_to(center);
    }

    pub fn has_event_receivers(&self) -> bool {
        self.receivers.iter().any(|receiver| !receiver.is_closed())
    }

    /// Attach a receiver. Registering the same receiver twice fails.
    pub fn register_event_receiver(&mut self, receiver: EventReceiver) -> bool {
        self.receivers.retain(|existing| !existing.is_closed());
        if self.receivers.iter().any(|existing| existing.same_as(&receiver)) {
            return false;
        }
        self.receivers.push(receiver);
        true
    }

    /// Send `event` to every live receiver, returning how many got it.
    pub fn dispatch(&mut self, event: InteractionEvent) -> usize {
        self.receivers.retain(|receiver| receiver.sender.send(event).is_ok());
        trace!(stream = %self.stream, receivers = self.receivers.len(), "interaction dispatched");
        self.receivers.len()
    }
}

/// The wall: its extent and the stacking order of the windows shown on it.
#[derive(Debug, Clone)]
pub struct DisplayGroup {
    coordinates: Rect,
    windows: Vec<StreamId>,
}

impl DisplayGroup {
    pub fn new(size: Size) -> Self {
        Self { coordinates: Rect::from_size(size), windows: Vec::new() }
    }

    pub fn coordinates(&self) -> &Rect {
        &self.coordinates
    }

    /// Add a window on top, or raise it if it is already shown.
    pub fn add_window(&mut self, stream: &StreamId) {
        self.windows.retain(|shown| shown != stream);
        self.windows.push(stream.clone());
    }

    /// Returns false if the window was not shown.
    pub fn remove_window(&mut self, stream: &StreamId) -> bool {
        let before = self.windows.len();
        self.windows.retain(|shown| shown != stream);
        self.windows.len() != before
    }

    pub fn contains(&self, stream: &StreamId) -> bool {
        self.windows.contains(stream)
    }

    /// Shown windows, bottom first.
    pub fn windows(&self) -> &[StreamId] {
        &self.windows
    }
}
