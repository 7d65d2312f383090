// THEORY:
// The frame driver is the bridge between a capture loop that produces frames at
// its own pace and a pipeline that must see them one at a time. A worker task
// owns the `VisionPipeline` outright, so the tracker state is never shared and
// needs no lock.
//
// Frames enter through a single-slot `watch` channel. If a newer frame arrives
// before the worker has picked up the previous one, the older frame is simply
// overwritten: a slow pipeline drops stale frames instead of queueing them.
// Reports leave through an mpsc channel, tagged with the sequence number of the
// frame they came from, so a consumer can see which frames were skipped.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::core_modules::frame::Frame;
use crate::core_modules::tracker::TrackerState;
use crate::error::DriverError;
use crate::pipeline::{FrameReport, VisionPipeline};

type Slot = Option<(u64, Arc<Frame>)>;

/// A report together with the sequence number of its frame (starting at 1).
#[derive(Debug, Clone)]
pub struct DrivenReport {
    pub sequence: u64,
    pub report: FrameReport,
}

pub struct FrameDriver {
    frame_tx: watch::Sender<Slot>,
    submitted: u64,
    worker: JoinHandle<TrackerState>,
}

impl FrameDriver {
    /// Moves `pipeline` onto a worker task. Must be called inside a tokio runtime.
    pub fn spawn(pipeline: VisionPipeline) -> (Self, mpsc::UnboundedReceiver<DrivenReport>) {
        let (frame_tx, frame_rx) = watch::channel::<Slot>(None);
        let (report_tx, report_rx) = mpsc::unbounded_channel::<DrivenReport>();
        let worker = tokio::spawn(Self::run(pipeline, frame_rx, report_tx));
        (
            Self {
                frame_tx,
                submitted: 0,
                worker,
            },
            report_rx,
        )
    }

    async fn run(
        mut pipeline: VisionPipeline,
        mut frame_rx: watch::Receiver<Slot>,
        report_tx: mpsc::UnboundedSender<DrivenReport>,
    ) -> TrackerState {
        let mut last_sequence = 0u64;
        // An unseen frame is still delivered after the sender is dropped.
        while frame_rx.changed().await.is_ok() {
            let Some((sequence, frame)) = frame_rx.borrow_and_update().clone() else {
                continue;
            };
            let skipped = sequence - last_sequence - 1;
            if skipped > 0 {
                trace!(sequence, skipped, "Dropped stale frames");
            }
            last_sequence = sequence;

            let report = pipeline.process(&frame);
            if report_tx.send(DrivenReport { sequence, report }).is_err() {
                debug!("Report receiver dropped, stopping frame driver");
                break;
            }
        }
        pipeline.into_state()
    }

    /// Offers a frame to the worker, replacing any frame it has not started on.
    pub fn submit(&mut self, frame: Frame) -> Result<u64, DriverError> {
        self.submitted += 1;
        let sequence = self.submitted;
        self.frame_tx
            .send(Some((sequence, Arc::new(frame))))
            .map_err(|_| DriverError::Stopped)?;
        Ok(sequence)
    }

    /// Number of frames submitted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Stops accepting frames, lets the worker finish the pending one and
    /// returns the tracker state it ended with.
    pub async fn shutdown(self) -> Result<TrackerState, DriverError> {
        drop(self.frame_tx);
        Ok(self.worker.await?)
    }
}
