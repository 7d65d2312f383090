// THEORY:
// The `pipeline` module is the top-level API for the whole engine. It wires the
// four stages into one per-frame call: regions are extracted from the frame,
// summarized as descriptors, given persistent identities by the tracker, and
// finally drawn onto a copy of the frame.
//
// Only the tracker carries anything from one frame to the next. Everything else
// is a pure function of the frame and the configuration, so a `VisionPipeline`
// is exactly "a configuration plus a tracker state", and the state can be taken
// out, serialized and restored to continue a session.
//
// The pipeline never fails a frame once it is running. A buffer that does not
// describe a valid image is answered with the bytes unchanged and no objects,
// so a capture loop is not halted by a single bad frame.

use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::core_modules::descriptor;
use crate::core_modules::overlay::{self, OverlayStyle};
use crate::core_modules::region_extractor::{self, ExtractionSettings};
use crate::core_modules::tracker::{IdentityTracker, TrackerState};
use crate::error::ConfigError;

// Re-export key data structures for the public API.
pub use crate::core_modules::descriptor::ObjectDescriptor;
pub use crate::core_modules::frame::{ChannelLayout, Frame};
pub use crate::core_modules::tracker::TrackedObject;

/// The output of the pipeline for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// A copy of the input with every contour drawn on it.
    pub annotated: Frame,
    /// One record per surviving region, in extraction order.
    pub descriptors: Vec<ObjectDescriptor>,
    /// Contours dropped for degenerate geometry.
    pub discarded: usize,
}

/// The output of [`VisionPipeline::process_raw`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrameReport {
    /// Annotated bytes in the input layout, or the input bytes unchanged.
    pub annotated: Vec<u8>,
    pub descriptors: Vec<ObjectDescriptor>,
    pub discarded: usize,
}

/// The main, top-level struct for the vision engine.
#[derive(Debug, Clone)]
pub struct VisionPipeline {
    config: PipelineConfig,
    extraction: ExtractionSettings,
    style: OverlayStyle,
    tracker: IdentityTracker,
    frames_processed: u64,
}

impl VisionPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        Self::with_state(config, TrackerState::default())
    }

    /// Continues a session from previously saved tracker state.
    pub fn with_state(config: PipelineConfig, state: TrackerState) -> Result<Self, ConfigError> {
        config.validate()?;
        let tracker = IdentityTracker::with_state(config.tracker_config(), state)?;
        Ok(Self {
            extraction: config.extraction(),
            style: config.overlay_style(),
            tracker,
            config,
            frames_processed: 0,
        })
    }

    pub fn process(&mut self, frame: &Frame) -> FrameReport {
        // Stage 1: Region Extraction
        let contours = region_extractor::extract(frame, &self.extraction);

        // Stage 2: Description
        let (descriptors, discarded) = descriptor::describe_all(frame, &contours);

        // Stage 2.5: Largest-N Filtering
        let descriptors = match self.config.max_objects {
            Some(limit) => descriptor::keep_largest(descriptors, limit),
            None => descriptors,
        };

        // Stage 3: Identity Tracking
        let descriptors = self.tracker.assign(descriptors);

        // Stage 4: Overlay
        let annotated = overlay::render(frame, &descriptors, &self.style);

        self.frames_processed += 1;
        debug!(
            frame = self.frames_processed,
            contours = contours.len(),
            objects = descriptors.len(),
            discarded,
            tracked = self.tracker.state().objects().len(),
            "Processed frame"
        );

        FrameReport {
            annotated,
            descriptors,
            discarded,
        }
    }

    /// Processes an unvalidated buffer. An invalid buffer is returned unchanged
    /// with no objects, and the tracker state is left untouched.
    pub fn process_raw(
        &mut self,
        width: u32,
        height: u32,
        layout: ChannelLayout,
        bytes: Vec<u8>,
    ) -> RawFrameReport {
        let frame = match Frame::try_from_raw(width, height, layout, bytes) {
            Ok(frame) => frame,
            Err((error, bytes)) => {
                warn!(%error, "Skipping invalid frame");
                return RawFrameReport {
                    annotated: bytes,
                    descriptors: Vec::new(),
                    discarded: 0,
                };
            }
        };
        let report = self.process(&frame);
        RawFrameReport {
            annotated: report.annotated.into_bytes(),
            descriptors: report.descriptors,
            discarded: report.discarded,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tracker_state(&self) -> &TrackerState {
        self.tracker.state()
    }

    pub fn into_state(self) -> TrackerState {
        self.tracker.into_state()
    }

    /// Forgets every tracked object; identifiers already issued stay retired.
    pub fn reset_tracking(&mut self) {
        self.tracker.clear();
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}
