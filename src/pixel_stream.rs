//! Per-stream double buffer and the visibility-driven update loop.
//!
//! # Update cycle
//!
//! [`PixelStreamState::pre_render_update`] runs once per render cycle:
//!
//! 1. **Sync**: take a newer frame into the back buffer once every process has it.
//! 2. **Decode check**: if any process still decodes this stream, stop here.
//! 3. **Promote**: after a swap, resize renderers to the front buffer and mark them dirty.
//! 4. **Upload**: push dirty, visible, uncompressed segments into their renderers.
//! 5. **Swap**: move a waiting back buffer to the front and resize the decoders.
//! 6. **Decode**: start decoding compressed, visible segments with an idle decoder.
//!
//! The front buffer is only replaced in step 5, which is never reached while a
//! decoder anywhere on the wall is running. Renderers only see the new segment
//! layout in step 3, after every decode for it finished.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::decoder::{DecodeExecutor, SegmentCodec, SegmentDecoder};
use crate::display::DisplayRegion;
use crate::gate::FrameVersionGate;
use crate::renderer::{RenderOptions, SegmentRenderer, TextureFactory};
use crate::sync::SyncFrame;
use crate::types::{Frame, FrameDimensions, Rect, Segment, SegmentParameters, StreamId};

/// Codec, worker pool and texture backend shared by every stream of a process.
#[derive(Clone)]
pub struct PipelineResources {
    pub codec: Arc<dyn SegmentCodec>,
    pub executor: DecodeExecutor,
    pub textures: Arc<dyn TextureFactory>,
}

impl PipelineResources {
    pub fn new(
        codec: Arc<dyn SegmentCodec>,
        executor: DecodeExecutor,
        textures: Arc<dyn TextureFactory>,
    ) -> Self {
        Self { codec, executor, textures }
    }
}

impl std::fmt::Debug for PipelineResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineResources").field("executor", &self.executor).finish_non_exhaustive()
    }
}

/// What one call to [`PixelStreamState::pre_render_update`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// A new frame was synced; the source may send the next one.
    pub new_frame: bool,
    /// Steps 3 to 6 were skipped because a decode was running somewhere.
    pub decoding_in_progress: bool,
    /// Renderers were rebuilt for the front buffer.
    pub promoted: bool,
    /// Textures uploaded from uncompressed segments.
    pub uploads: usize,
    /// The back buffer became the front buffer.
    pub swapped: bool,
    /// Decodes started this cycle.
    pub decodes_started: usize,
}

/// Rendering state of one pixel stream on one wall process.
pub struct PixelStreamState {
    id: StreamId,
    resources: PipelineResources,
    sync_frame: SyncFrame,

    front_buffer: Vec<Segment>,
    front_version: u64,
    back_buffer: Option<(u64, Vec<Segment>)>,
    buffers_swapped: bool,

    decoders: Vec<SegmentDecoder>,
    renderers: Vec<SegmentRenderer>,

    dimensions: FrameDimensions,
    window_rect: Rect,
    options: RenderOptions,
    dropped_back_buffers: u64,
}

impl PixelStreamState {
    pub fn new(id: StreamId, resources: PipelineResources) -> Self {
        Self {
            id,
            resources,
            sync_frame: SyncFrame::new(),
            front_buffer: Vec::new(),
            front_version: 0,
            back_buffer: None,
            buffers_swapped: false,
            decoders: Vec::new(),
            renderers: Vec::new(),
            dimensions: FrameDimensions::default(),
            window_rect: Rect::default(),
            options: RenderOptions::default(),
            dropped_back_buffers: 0,
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// Queue a frame received from the network. It reaches the back buffer
    /// once the whole wall agrees on it.
    pub fn set_new_frame(&mut self, frame: Frame) {
        if frame.stream_id != self.id {
            warn!(stream = %self.id, other = %frame.stream_id, "frame for another stream ignored");
            return;
        }
        self.sync_frame.update(frame);
    }

    pub fn set_rendering_options(&mut self, options: RenderOptions) {
        self.options = options;
    }

    pub fn rendering_options(&self) -> RenderOptions {
        self.options
    }

    /// Run one update cycle for the window at `window_rect` (scene coordinates).
    ///
    /// Performs the same number of collective gate calls on every invocation.
    pub fn pre_render_update<G, D>(
        &mut self,
        window_rect: Rect,
        gate: &mut G,
        display: &D,
    ) -> CycleReport
    where
        G: FrameVersionGate + ?Sized,
        D: DisplayRegion + ?Sized,
    {
        let mut report = CycleReport { new_frame: self.sync(gate), ..CycleReport::default() };

        self.window_rect = window_rect;

        if self.is_decoding_in_progress(gate) {
            trace!(stream = %self.id, "decode in progress on the wall, cycle skipped");
            report.decoding_in_progress = true;
            return report;
        }

        self.collect_decoded_segments();

        if self.buffers_swapped {
            self.adjust_segment_renderer_count(self.front_buffer.len());
            self.update_renderers();
            self.dimensions = FrameDimensions::of_segments(&self.front_buffer);
            self.buffers_swapped = false;
            report.promoted = true;
            debug!(
                stream = %self.id,
                version = self.front_version,
                segments = self.front_buffer.len(),
                width = self.dimensions.width,
                height = self.dimensions.height,
                "front buffer promoted to renderers"
            );
        }

        report.uploads = self.update_visible_textures(display);

        if self.back_buffer.is_some() {
            self.swap_buffers();
            self.adjust_frame_decoder_count(self.front_buffer.len());
            report.swapped = true;
        }

        report.decodes_started = self.decode_visible_textures(display);
        report
    }

    /// Draw every renderer whose segment lands on this process' screens.
    ///
    /// Returns the number of segments drawn.
    pub fn render<D: DisplayRegion + ?Sized>(&self, display: &D) -> usize {
        let mut drawn = 0;
        for renderer in &self.renderers {
            let Some(scene) = scene_rect(renderer.rect(), self.dimensions, &self.window_rect) else {
                continue;
            };
            if display.is_region_visible(&scene) {
                renderer.render(&scene, &self.options);
                drawn += 1;
            }
        }
        drawn
    }

    fn sync<G: FrameVersionGate + ?Sized>(&mut self, gate: &mut G) -> bool {
        let Some(frame) = self.sync_frame.sync(gate) else {
            return false;
        };

        if let Some((version, _)) = self.back_buffer.take() {
            self.dropped_back_buffers += 1;
            debug!(stream = %self.id, version, "undisplayed back buffer overwritten");
        }
        trace!(stream = %self.id, version = frame.version, segments = frame.len(), "new back buffer");
        self.back_buffer = Some((frame.version, frame.segments));
        true
    }

    fn is_decoding_in_progress<G: FrameVersionGate + ?Sized>(&mut self, gate: &mut G) -> bool {
        let local = self.local_active_decodes();
        gate.global_active_decode_count(local) > 0
    }

    /// Number of this process' decoders still running.
    pub fn local_active_decodes(&mut self) -> usize {
        let mut running = 0;
        for decoder in &mut self.decoders {
            if decoder.is_running() {
                running += 1;
            }
        }
        running
    }

    fn collect_decoded_segments(&mut self) {
        for (index, decoder) in self.decoders.iter_mut().enumerate() {
            let Some(outcome) = decoder.take_result() else {
                continue;
            };
            let Some(segment) = self.front_buffer.get_mut(index) else {
                continue;
            };
            let applied = outcome.and_then(|image| segment.apply_decoded(image));
            if let Err(e) = applied {
                decoder.mark_failed();
                warn!(stream = %self.id, index, error = %e, "segment decode failed, keeping previous texture");
            }
        }
    }

    fn update_renderers(&mut self) {
        debug_assert_eq!(self.renderers.len(), self.front_buffer.len());
        for (renderer, segment) in self.renderers.iter_mut().zip(&self.front_buffer) {
            renderer.set_parameters(&segment.parameters);
            renderer.set_texture_needs_update();
        }
    }

    fn update_visible_textures<D: DisplayRegion + ?Sized>(&mut self, display: &D) -> usize {
        let mut uploads = 0;
        for (renderer, segment) in self.renderers.iter_mut().zip(&self.front_buffer) {
            if !renderer.texture_needs_update()
                || segment.is_compressed()
                || !segment_visible(&segment.parameters, self.dimensions, &self.window_rect, display)
            {
                continue;
            }

            match segment.raw_image().and_then(|image| renderer.update_texture(&image)) {
                Ok(()) => uploads += 1,
                Err(e) => warn!(stream = %self.id, error = %e, "texture upload skipped"),
            }
        }
        uploads
    }

    fn swap_buffers(&mut self) {
        let Some((version, segments)) = self.back_buffer.take() else {
            return;
        };
        trace!(stream = %self.id, from = self.front_version, to = version, "swapping buffers");
        self.front_buffer = segments;
        self.front_version = version;
        self.buffers_swapped = true;
    }

    fn decode_visible_textures<D: DisplayRegion + ?Sized>(&mut self, display: &D) -> usize {
        debug_assert_eq!(self.decoders.len(), self.front_buffer.len());
        let mut started = 0;
        for (decoder, segment) in self.decoders.iter_mut().zip(&self.front_buffer) {
            if segment.is_compressed()
                && !decoder.has_failed()
                && segment_visible(&segment.parameters, self.dimensions, &self.window_rect, display)
                && decoder.start_decoding(segment)
            {
                started += 1;
            }
        }
        started
    }

    /// Decoders persist by index; only missing ones are created.
    fn adjust_frame_decoder_count(&mut self, count: usize) {
        let resources = &self.resources;
        if self.decoders.len() < count {
            self.decoders.resize_with(count, || {
                SegmentDecoder::new(Arc::clone(&resources.codec), resources.executor.clone())
            });
        } else {
            self.decoders.truncate(count);
        }
        for decoder in &mut self.decoders {
            decoder.clear_failure();
        }
    }

    /// Renderers are rebuilt from scratch whenever the segment count changes.
    fn adjust_segment_renderer_count(&mut self, count: usize) {
        if self.renderers.len() == count {
            return;
        }
        let textures = &self.resources.textures;
        self.renderers = (0..count).map(|_| SegmentRenderer::new(textures.create_texture())).collect();
    }

    /// Read-only view of the segments currently being decoded/rendered.
    pub fn front_buffer(&self) -> &[Segment] {
        &self.front_buffer
    }

    pub fn front_version(&self) -> u64 {
        self.front_version
    }

    pub fn has_back_buffer(&self) -> bool {
        self.back_buffer.is_some()
    }

    /// A swap happened and the renderers have not caught up yet.
    pub fn is_swap_pending(&self) -> bool {
        self.buffers_swapped
    }

    pub fn decoders(&self) -> &[SegmentDecoder] {
        &self.decoders
    }

    pub fn renderers(&self) -> &[SegmentRenderer] {
        &self.renderers
    }

    /// Stream extent in pixels, as of the last promotion.
    pub fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    /// Frames that arrived but were replaced before they could be shown.
    pub fn dropped_frames(&self) -> u64 {
        self.sync_frame.dropped_frames() + self.dropped_back_buffers
    }

    /// Give up the decoders, e.g. to keep running ones alive after a close.
    pub fn into_decoders(self) -> Vec<SegmentDecoder> {
        self.decoders
    }
}

impl std::fmt::Debug for PixelStreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelStreamState")
            .field("id", &self.id)
            .field("front_version", &self.front_version)
            .field("front_segments", &self.front_buffer.len())
            .field("back_buffer", &self.back_buffer.as_ref().map(|(version, _)| *version))
            .field("buffers_swapped", &self.buffers_swapped)
            .field("decoders", &self.decoders.len())
            .field("renderers", &self.renderers.len())
            .finish()
    }
}

/// Map a rectangle in stream pixels into the window's scene rectangle.
///
/// `None` while the stream has no extent yet.
pub fn scene_rect(segment: &Rect, dimensions: FrameDimensions, window: &Rect) -> Option<Rect> {
    if dimensions.is_empty() {
        return None;
    }
    let width = dimensions.width as f64;
    let height = dimensions.height as f64;
    Some(Rect::new(
        window.x + segment.x / width * window.width,
        window.y + segment.y / height * window.height,
        segment.width / width * window.width,
        segment.height / height * window.height,
    ))
}

fn segment_visible<D: DisplayRegion + ?Sized>(
    params: &SegmentParameters,
    dimensions: FrameDimensions,
    window: &Rect,
    display: &D,
) -> bool {
    let rect = Rect::new(params.x as f64, params.y as f64, params.width as f64, params.height as f64);
    scene_rect(&rect, dimensions, window).is_some_and(|scene| display.is_region_visible(&scene))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ScreenRegion;
    use crate::gate::SingleProcessGate;
    use crate::test_utils::{
        HeldCodec, RecordingTextureFactory, compressed_grid_frame, raw_grid_frame, test_resources,
        wait_until,
    };
    use std::time::Duration;

    const WALL: Rect = Rect { x: 0.0, y: 0.0, width: 1000.0, height: 1000.0 };

    fn stream(codec: &HeldCodec, textures: &RecordingTextureFactory) -> PixelStreamState {
        PixelStreamState::new(StreamId::from("s"), test_resources(codec, textures))
    }

    /// Cycle until no decode is running and nothing is left to swap or promote.
    fn settle(
        state: &mut PixelStreamState,
        window: Rect,
        gate: &mut SingleProcessGate,
        display: &ScreenRegion,
    ) {
        let settled = wait_until(Duration::from_secs(5), || {
            let report = state.pre_render_update(window, gate, display);
            !report.decoding_in_progress
                && !report.swapped
                && report.decodes_started == 0
                && !state.is_swap_pending()
                && state.local_active_decodes() == 0
        });
        assert!(settled, "stream never settled: {state:?}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn raw_frame_is_promoted_and_uploaded() {
        let codec = HeldCodec::released();
        let textures = RecordingTextureFactory::new();
        let mut state = stream(&codec, &textures);
        let mut gate = SingleProcessGate::new();
        let display = ScreenRegion::new(WALL);

        state.set_new_frame(raw_grid_frame("s", 1, 2, 2, 8));

        let first = state.pre_render_update(WALL, &mut gate, &display);
        assert!(first.new_frame && first.swapped && !first.promoted);
        assert_eq!(state.renderers().len(), 0);

        let second = state.pre_render_update(WALL, &mut gate, &display);
        assert!(second.promoted);
        assert_eq!(second.uploads, 4);
        assert_eq!(state.dimensions(), FrameDimensions { width: 16, height: 16 });
        assert_eq!(state.render(&display), 4);
        assert_eq!(codec.decode_count(), 0);

        let drawn: Vec<Rect> = textures.draws().iter().map(|draw| draw.rect).collect();
        assert_eq!(
            drawn,
            vec![
                Rect::new(0.0, 0.0, 500.0, 500.0),
                Rect::new(500.0, 0.0, 500.0, 500.0),
                Rect::new(0.0, 500.0, 500.0, 500.0),
                Rect::new(500.0, 500.0, 500.0, 500.0),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn draws_follow_window_and_stream_size() {
        let codec = HeldCodec::released();
        let textures = RecordingTextureFactory::new();
        let mut state = stream(&codec, &textures);
        let mut gate = SingleProcessGate::new();
        let display = ScreenRegion::new(WALL);

        // 16x8 stream: two 8x8 tiles side by side.
        state.set_new_frame(raw_grid_frame("s", 1, 2, 1, 8));
        let placed = Rect::new(500.0, 500.0, 400.0, 400.0);
        settle(&mut state, placed, &mut gate, &display);
        assert_eq!(state.render(&display), 2);

        let small = Rect::new(0.0, 0.0, 100.0, 100.0);
        state.pre_render_update(small, &mut gate, &display);
        assert_eq!(state.render(&display), 2);

        let drawn: Vec<Rect> = textures.draws().iter().map(|draw| draw.rect).collect();
        assert_eq!(
            drawn,
            vec![
                Rect::new(500.0, 500.0, 200.0, 400.0),
                Rect::new(700.0, 500.0, 200.0, 400.0),
                Rect::new(0.0, 0.0, 50.0, 100.0),
                Rect::new(50.0, 0.0, 50.0, 100.0),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn arrays_match_front_buffer_after_promotion() {
        let codec = HeldCodec::released();
        let textures = RecordingTextureFactory::new();
        let mut state = stream(&codec, &textures);
        let mut gate = SingleProcessGate::new();
        let display = ScreenRegion::new(WALL);

        for (version, cols) in [(1u64, 3u32), (2, 1), (3, 5)] {
            state.set_new_frame(compressed_grid_frame("s", version, cols, 1, 8));
            settle(&mut state, WALL, &mut gate, &display);

            assert_eq!(state.front_version(), version);
            assert_eq!(state.decoders().len(), cols as usize);
            assert_eq!(state.renderers().len(), cols as usize);
            assert_eq!(state.front_buffer().len(), cols as usize);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_swap_while_decoding() {
        let codec = HeldCodec::new();
        let textures = RecordingTextureFactory::new();
        let mut state = stream(&codec, &textures);
        let mut gate = SingleProcessGate::new();
        let display = ScreenRegion::new(WALL);

        // First frame: decode cannot start until dimensions are known.
        state.set_new_frame(compressed_grid_frame("s", 1, 2, 2, 8));
        state.pre_render_update(WALL, &mut gate, &display);
        let report = state.pre_render_update(WALL, &mut gate, &display);
        assert_eq!(report.decodes_started, 4);

        state.set_new_frame(compressed_grid_frame("s", 2, 3, 3, 8));
        for _ in 0..20 {
            let report = state.pre_render_update(WALL, &mut gate, &display);
            assert!(report.decoding_in_progress);
            assert_eq!(state.front_version(), 1);
            assert_eq!(state.front_buffer().len(), 4);
            assert!(state.front_buffer().iter().all(|s| s.is_compressed()));
        }
        assert!(state.has_back_buffer());

        codec.release();
        settle(&mut state, WALL, &mut gate, &display);
        assert_eq!(state.front_version(), 2);
        assert_eq!(state.front_buffer().len(), 9);
        assert!(state.front_buffer().iter().all(|s| !s.is_compressed()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invisible_segments_are_never_decoded() {
        let codec = HeldCodec::released();
        let textures = RecordingTextureFactory::new();
        let mut state = stream(&codec, &textures);
        let mut gate = SingleProcessGate::new();
        // Process shows only the left half of the wall.
        let display = ScreenRegion::new(Rect::new(0.0, 0.0, 500.0, 1000.0));

        state.set_new_frame(compressed_grid_frame("s", 1, 4, 1, 10));
        settle(&mut state, WALL, &mut gate, &display);

        let decoded = codec.decoded();
        assert_eq!(decoded.len(), 2);
        assert!(decoded.iter().all(|params| params.x < 20));
        assert_eq!(state.front_buffer().iter().filter(|s| s.is_compressed()).count(), 2);
        assert_eq!(state.render(&display), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn moving_window_decodes_newly_visible_segments() {
        let codec = HeldCodec::released();
        let textures = RecordingTextureFactory::new();
        let mut state = stream(&codec, &textures);
        let mut gate = SingleProcessGate::new();
        let display = ScreenRegion::new(Rect::new(0.0, 0.0, 500.0, 1000.0));

        state.set_new_frame(compressed_grid_frame("s", 1, 2, 1, 10));
        let offscreen = Rect::new(600.0, 0.0, 200.0, 100.0);
        settle(&mut state, offscreen, &mut gate, &display);
        assert_eq!(codec.decode_count(), 0);

        let onscreen = Rect::new(100.0, 0.0, 200.0, 100.0);
        settle(&mut state, onscreen, &mut gate, &display);
        assert_eq!(codec.decode_count(), 2);
        assert!(state.renderers().iter().all(|r| r.has_texture()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn decoders_persist_by_index_when_segment_count_grows() {
        let codec = HeldCodec::released();
        let textures = RecordingTextureFactory::new();
        let mut state = stream(&codec, &textures);
        let mut gate = SingleProcessGate::new();
        let display = ScreenRegion::new(WALL);

        state.set_new_frame(compressed_grid_frame("s", 1, 3, 1, 8));
        settle(&mut state, WALL, &mut gate, &display);
        let before: Vec<u64> = state.decoders().iter().map(SegmentDecoder::id).collect();

        state.set_new_frame(compressed_grid_frame("s", 2, 4, 1, 8));
        settle(&mut state, WALL, &mut gate, &display);
        let after: Vec<u64> = state.decoders().iter().map(SegmentDecoder::id).collect();

        assert_eq!(after.len(), 4);
        assert_eq!(state.renderers().len(), 4);
        assert_eq!(&after[..3], &before[..]);
        assert!(!before.contains(&after[3]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_decode_keeps_previous_texture() {
        let codec = HeldCodec::released();
        let textures = RecordingTextureFactory::new();
        let mut state = stream(&codec, &textures);
        let mut gate = SingleProcessGate::new();
        let display = ScreenRegion::new(WALL);

        state.set_new_frame(compressed_grid_frame("s", 1, 2, 1, 8));
        settle(&mut state, WALL, &mut gate, &display);
        let uploads = textures.uploads();
        assert_eq!(uploads, 2);

        codec.fail_segments_at(8);
        state.set_new_frame(compressed_grid_frame("s", 2, 2, 1, 8));
        settle(&mut state, WALL, &mut gate, &display);

        assert_eq!(state.front_version(), 2);
        assert!(state.front_buffer()[1].is_compressed());
        assert!(state.decoders()[1].has_failed());
        assert!(state.renderers()[1].has_texture());
        assert_eq!(textures.uploads(), uploads + 1);

        let attempts = codec.decode_count();
        for _ in 0..5 {
            state.pre_render_update(WALL, &mut gate, &display);
        }
        assert_eq!(codec.decode_count(), attempts, "failed segment is not retried");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wrongly_sized_decode_is_not_retried() {
        use crate::types::DecodedImage;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let codec = Arc::new(move |_segment: &Segment| -> crate::Result<DecodedImage> {
            counter.fetch_add(1, Ordering::SeqCst);
            DecodedImage::new(1, 1, vec![0u8; 4])
        });
        let textures = RecordingTextureFactory::new();
        let resources = PipelineResources::new(
            codec,
            DecodeExecutor::current().unwrap(),
            Arc::new(textures.clone()),
        );
        let mut state = PixelStreamState::new(StreamId::from("s"), resources);
        let mut gate = SingleProcessGate::new();
        let display = ScreenRegion::new(WALL);

        state.set_new_frame(compressed_grid_frame("s", 1, 2, 1, 8));
        settle(&mut state, WALL, &mut gate, &display);

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(state.decoders().iter().all(SegmentDecoder::has_failed));
        assert!(state.front_buffer().iter().all(Segment::is_compressed));
        for _ in 0..5 {
            state.pre_render_update(WALL, &mut gate, &display);
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(textures.uploads(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overwritten_back_buffer_counts_as_dropped() {
        let codec = HeldCodec::released();
        let textures = RecordingTextureFactory::new();
        let mut state = stream(&codec, &textures);
        let mut gate = SingleProcessGate::new();
        let display = ScreenRegion::new(WALL);

        state.set_new_frame(raw_grid_frame("s", 1, 1, 1, 4));
        state.set_new_frame(raw_grid_frame("s", 2, 1, 1, 4));
        state.set_new_frame(raw_grid_frame("s", 3, 1, 1, 4));
        state.pre_render_update(WALL, &mut gate, &display);

        assert_eq!(state.front_version(), 3);
        assert_eq!(state.dropped_frames(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_loop_has_constant_collective_call_count() {
        let codec = HeldCodec::released();
        let textures = RecordingTextureFactory::new();
        let mut state = stream(&codec, &textures);
        let mut gate = SingleProcessGate::new();
        let display = ScreenRegion::new(WALL);

        let mut previous = gate.collective_calls();
        for version in 1..=4 {
            if version % 2 == 0 {
                state.set_new_frame(raw_grid_frame("s", version, 2, 1, 4));
            }
            state.pre_render_update(WALL, &mut gate, &display);
            assert_eq!(gate.collective_calls() - previous, 3);
            previous = gate.collective_calls();
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn frames_for_other_streams_are_ignored() {
        let codec = HeldCodec::released();
        let textures = RecordingTextureFactory::new();
        let mut state = stream(&codec, &textures);
        state.set_new_frame(raw_grid_frame("other", 1, 1, 1, 4));
        let report =
            state.pre_render_update(WALL, &mut SingleProcessGate::new(), &ScreenRegion::new(WALL));
        assert!(!report.new_frame);
    }

    #[test]
    fn scene_rect_maps_stream_pixels_into_window() {
        let dims = FrameDimensions { width: 200, height: 100 };
        let window = Rect::new(100.0, 50.0, 400.0, 200.0);

        let scene = scene_rect(&Rect::new(100.0, 50.0, 100.0, 50.0), dims, &window).unwrap();
        assert_eq!(scene, Rect::new(300.0, 150.0, 200.0, 100.0));

        assert!(scene_rect(&Rect::new(0.0, 0.0, 1.0, 1.0), FrameDimensions::default(), &window).is_none());
    }
}
