//! Driver spawns and manages the frame source task

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::Result;
use crate::config::SourceConfig;
use crate::source::{FrameSource, SourceEvent};
use crate::types::StreamId;

/// Result of spawning the driver task
#[derive(Debug)]
pub struct DriverChannels {
    /// Events from the source, in arrival order
    pub events: mpsc::UnboundedReceiver<SourceEvent>,
    /// Frame requests relayed to the source
    pub requests: mpsc::UnboundedSender<StreamId>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

enum Step {
    Cancelled,
    Request(Option<StreamId>),
    Event(Result<Option<SourceEvent>>),
}

/// Driver owns a [`FrameSource`] on a tokio task.
///
/// The render thread never awaits the network: it drains
/// [`DriverChannels::events`] once per cycle and pushes frame requests back.
pub struct Driver;

impl Driver {
    /// Spawn the source task. Must be called from within a tokio runtime.
    pub fn spawn<S>(source: S, config: SourceConfig) -> DriverChannels
    where
        S: FrameSource,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            Self::source_task(source, event_tx, request_rx, config, cancel_task).await;
        });

        DriverChannels { events: event_rx, requests: request_tx, cancel }
    }

    async fn source_task<S>(
        mut source: S,
        event_tx: mpsc::UnboundedSender<SourceEvent>,
        mut request_rx: mpsc::UnboundedReceiver<StreamId>,
        config: SourceConfig,
        cancel: CancellationToken,
    ) where
        S: FrameSource,
    {
        info!("Frame source task started");
        let mut event_count = 0u64;
        let mut error_count = 0u32;
        let mut requests_open = true;

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                request = request_rx.recv(), if requests_open => Step::Request(request),
                result = source.next_event() => Step::Event(result),
            };

            match step {
                Step::Cancelled => {
                    info!("Frame source task cancelled");
                    break;
                }
                Step::Request(Some(stream)) => {
                    trace!(stream = %stream, "relaying frame request");
                    if let Err(e) = source.request_frame(&stream).await {
                        warn!(stream = %stream, error = %e, "frame request failed");
                    }
                }
                Step::Request(None) => {
                    debug!("Frame request sender dropped");
                    requests_open = false;
                }
                Step::Event(Ok(Some(event))) => {
                    event_count += 1;
                    error_count = 0;
                    trace!(stream = %event.stream(), events = event_count, "source event");

                    if event_tx.send(event).is_err() {
                        debug!("Event receiver dropped, shutting down");
                        break;
                    }
                }
                Step::Event(Ok(None)) => {
                    info!("Frame source ended after {} events", event_count);
                    break;
                }
                Step::Event(Err(e)) => {
                    error_count += 1;
                    error!("Frame source error ({}/{}): {}", error_count, config.max_errors, e);

                    if !e.is_retryable() || error_count >= config.max_errors {
                        error!("Giving up on frame source");
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ... capped at 3.2s
                    let backoff = std::time::Duration::from_millis(50 * (1 << error_count.min(6)));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!("Frame source task ended (forwarded {} events)", event_count);
    }
}
