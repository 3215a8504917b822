//! One wall process: source events in, one update and render pass per cycle.
//!
//! Stream open and close events must reach every process of the wall in the
//! same cycle, since they change the number of collective gate calls per
//! cycle. Frames may arrive at different times on different processes; the
//! first frame of a stream nobody opened waits in the registry until every
//! process holds one.

use tracing::{debug, trace};

use crate::config::WallConfig;
use crate::display::ScreenRegion;
use crate::driver::DriverChannels;
use crate::gate::FrameVersionGate;
use crate::pixel_stream::PipelineResources;
use crate::registry::StreamRegistry;
use crate::source::SourceEvent;
use crate::types::StreamId;

/// What one [`WallProcess::cycle`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Source events applied before updating
    pub events: usize,
    /// Streams that consumed a frame and asked for the next one
    pub frame_requests: Vec<StreamId>,
    pub decodes_started: usize,
    pub uploads: usize,
    /// Segments drawn by the render pass
    pub drawn: usize,
    /// Retired decoders released this cycle
    pub reaped: usize,
}

/// Per-process orchestration around a [`StreamRegistry`].
pub struct WallProcess<G> {
    registry: StreamRegistry,
    display: ScreenRegion,
    gate: G,
    driver: Option<DriverChannels>,
    cycles: u64,
}

impl<G: FrameVersionGate> WallProcess<G> {
    pub fn new(config: &WallConfig, gate: G, resources: PipelineResources) -> Self {
        let mut registry = StreamRegistry::new(config.wall, resources);
        registry.set_render_options(config.rendering);
        Self { registry, display: config.display_region(), gate, driver: None, cycles: 0 }
    }

    /// Take events from, and send frame requests to, a running driver.
    pub fn attach_driver(&mut self, channels: DriverChannels) {
        if let Some(previous) = self.driver.replace(channels) {
            previous.cancel.cancel();
        }
    }

    pub fn apply_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Opened { stream, size } => {
                self.registry.open_stream(stream, size);
            }
            SourceEvent::Frame(frame) => self.registry.push_frame(frame),
            SourceEvent::Closed { stream } => self.registry.close_stream(&stream),
        }
    }

    /// Run one render cycle: drain driver events, update every stream,
    /// request next frames, release finished retired decoders and render.
    pub fn cycle(&mut self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let mut pending = Vec::new();
        if let Some(driver) = self.driver.as_mut() {
            while let Ok(event) = driver.events.try_recv() {
                pending.push(event);
            }
        }
        summary.events = pending.len();
        for event in pending {
            self.apply_event(event);
        }

        for (stream, report) in self.registry.pre_render_update(&mut self.gate, &self.display) {
            summary.decodes_started += report.decodes_started;
            summary.uploads += report.uploads;
            if report.new_frame {
                summary.frame_requests.push(stream);
            }
        }

        if let Some(driver) = &self.driver {
            for stream in &summary.frame_requests {
                if driver.requests.send(stream.clone()).is_err() {
                    debug!(stream = %stream, "driver gone, frame request dropped");
                }
            }
        }

        summary.reaped = self.registry.reap_retired_decoders();
        summary.drawn = self.registry.render(&self.display);
        self.cycles += 1;
        trace!(cycle = self.cycles, drawn = summary.drawn, "cycle complete");
        summary
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut StreamRegistry {
        &mut self.registry
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    /// The gate, for collective calls of the embedding application.
    ///
    /// Such calls must be made identically on every process.
    pub fn gate_mut(&mut self) -> &mut G {
        &mut self.gate
    }

    pub fn display(&self) -> &ScreenRegion {
        &self.display
    }

    /// Cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Stop the attached driver, if any.
    pub fn shutdown(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.cancel.cancel();
        }
    }
}

impl<G> Drop for WallProcess<G> {
    fn drop(&mut self) {
        if let Some(driver) = &self.driver {
            driver.cancel.cancel();
        }
    }
}
