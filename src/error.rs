//! Error types for the contour tracking engine.
//!
//! Only configuration and malformed input are errors. Degenerate geometry is
//! filtered and counted by the pipeline instead of being raised.

use thiserror::Error;

use crate::core_modules::frame::ChannelLayout;

/// A frame buffer that cannot be interpreted with its declared dimensions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error(
        "Invalid image {width}x{height} ({layout:?}): expected {expected} bytes, got {actual}"
    )]
    InvalidImage {
        width: u32,
        height: u32,
        layout: ChannelLayout,
        expected: usize,
        actual: usize,
    },
}

/// Rejected pipeline configuration. Never coerced to a default.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold_level must be within 0..=255, got {0}")]
    ThresholdOutOfRange(f64),

    #[error("min_contour_area must be a finite value >= 0, got {0}")]
    NegativeMinArea(f64),

    #[error("max_match_distance must be a finite value > 0, got {0}")]
    NonPositiveMatchDistance(f64),

    #[error("stroke_width must be at least 1")]
    ZeroStrokeWidth,

    #[error("palette must contain at least one color")]
    EmptyPalette,

    #[error("max_objects must be at least 1 when set")]
    ZeroMaxObjects,

    #[error("Canny thresholds must satisfy 0 <= low <= high, got low={low} high={high}")]
    InvalidCanny { low: f32, high: f32 },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serialized tracker state that cannot be restored.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to (de)serialize tracker state: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Identifier {0} appears more than once in tracker state")]
    DuplicateIdentifier(u64),

    #[error("next_identifier must be at least 1")]
    ZeroNextIdentifier,

    #[error("next_identifier has reached the largest representable identifier")]
    IdentifiersExhausted,

    #[error("Identifier {identifier} is not below next_identifier {next_identifier}")]
    IdentifierNotBelowNext { identifier: u64, next_identifier: u64 },
}

/// Errors raised by reference color assignment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ColorMatchError {
    #[error("At most {max} reference colors are supported, got {actual}")]
    TooManyReferences { max: usize, actual: usize },
}

/// The frame driver's worker is gone.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Frame driver has stopped")]
    Stopped,

    #[error("Frame driver worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    ColorMatch(#[from] ColorMatchError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image I/O failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
