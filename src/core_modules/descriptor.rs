// THEORY:
// The descriptor stage summarizes one contour as a numeric record: how large the
// region is, where its center lies, and what color it is. Like a `Chunk`
// summarizing its pixels with an average, an `ObjectDescriptor` replaces a
// boundary polygon and the pixels it encloses with a handful of numbers the
// tracker can compare across frames.
//
// - Area is the shoelace magnitude of the polygon.
// - The centroid is the area-weighted polygon centroid.
// - The average color is taken over every pixel whose center lies strictly
//   inside the polygon (even-odd rule). Nested contours are sampled
//   independently: an outer contour's interior includes its holes' pixels.
//
// Contours that enclose nothing measurable are discarded here rather than
// reported as errors.

use serde::Serialize;
use tracing::trace;

use crate::core_modules::color::Rgb;
use crate::core_modules::contour::Contour;
use crate::core_modules::frame::Frame;

/// Numeric summary of one region in one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDescriptor {
    /// Boundary the numbers were computed from; used for drawing.
    #[serde(skip_serializing)]
    pub contour: Contour,
    pub area: f64,
    pub centroid: (f64, f64),
    pub average_color: Rgb,
    /// Persistent identity, `None` until the tracker has assigned one.
    pub identifier: Option<u64>,
}

/// Describes one contour, or returns `None` when its geometry is degenerate.
pub fn describe(frame: &Frame, contour: &Contour) -> Option<ObjectDescriptor> {
    let area = contour.area();
    let Some(centroid) = contour.centroid().filter(|_| area > 0.0) else {
        trace!(points = contour.len(), "Discarding zero-area contour");
        return None;
    };
    let Some(average_color) = average_interior_color(frame, contour) else {
        trace!(area, "Discarding contour with no sampleable interior");
        return None;
    };
    Some(ObjectDescriptor {
        contour: contour.clone(),
        area,
        centroid,
        average_color,
        identifier: None,
    })
}

/// Describes every contour in order, returning the survivors and how many were
/// discarded as degenerate.
pub fn describe_all(frame: &Frame, contours: &[Contour]) -> (Vec<ObjectDescriptor>, usize) {
    let descriptors: Vec<ObjectDescriptor> = contours
        .iter()
        .filter_map(|contour| describe(frame, contour))
        .collect();
    let discarded = contours.len() - descriptors.len();
    (descriptors, discarded)
}

/// Rounded mean color of the pixels inside `contour`, clipped to the frame.
fn average_interior_color(frame: &Frame, contour: &Contour) -> Option<Rgb> {
    let width = frame.width() as i32;
    let height = frame.height() as i32;
    let mut sums = [0u64; 3];
    let mut count = 0u64;

    for span in contour.interior_spans() {
        if span.y < 0 || span.y >= height {
            continue;
        }
        let x_start = span.x_start.max(0);
        let x_end = span.x_end.min(width - 1);
        for x in x_start..=x_end {
            let rgb = frame.rgb_at(x as u32, span.y as u32);
            for (sum, channel) in sums.iter_mut().zip(rgb) {
                *sum += channel as u64;
            }
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }
    Some(sums.map(|sum| ((sum + count / 2) / count) as u8))
}

/// Keeps the `limit` largest descriptors, preserving their original order.
///
/// Equal areas favor the earlier descriptor.
pub fn keep_largest(descriptors: Vec<ObjectDescriptor>, limit: usize) -> Vec<ObjectDescriptor> {
    if descriptors.len() <= limit {
        return descriptors;
    }
    let mut ranked: Vec<usize> = (0..descriptors.len()).collect();
    ranked.sort_by(|&a, &b| {
        descriptors[b]
            .area
            .total_cmp(&descriptors[a].area)
            .then(a.cmp(&b))
    });
    let mut keep = vec![false; descriptors.len()];
    for &index in ranked.iter().take(limit) {
        keep[index] = true;
    }
    descriptors
        .into_iter()
        .zip(keep)
        .filter_map(|(descriptor, kept)| kept.then_some(descriptor))
        .collect()
}
