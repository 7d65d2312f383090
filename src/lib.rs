// THEORY:
// This file is the main entry point for the `contour_tracker` library crate.
//
// The public face of the engine is `VisionPipeline` (one call per frame, returning
// a `FrameReport`) and its `PipelineConfig`. The stages it is built from live in
// `core_modules` and stay usable on their own: region extraction, description,
// identity tracking and overlay rendering are each a plain function, and only the
// tracker keeps state between frames. `driver` runs a pipeline on a tokio task
// for callers that receive frames asynchronously.

pub mod config;
pub mod core_modules;
pub mod driver;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pipeline::{FrameReport, VisionPipeline};
