// THEORY:
// The region extractor is the first analysis stage. It turns one color frame
// into the closed boundaries of every distinct bright region in it.
//
// Algorithm steps:
// 1.  **Intensity plane**: the frame is reduced to Rec. 601 luma.
// 2.  **Foreground mask**: a pixel is foreground when its luma is strictly above
//     the threshold (fixed, or picked per frame with Otsu's method), or when
//     the Canny detector marks it as an edge.
// 3.  **Component labeling**: foreground and background are labeled separately
//     with dual connectivity (4/8 for solid regions, 8/4 for edge maps), so the
//     boundary of every hole belongs to exactly one foreground component.
//     Background components that do not touch the frame border are holes.
// 4.  **Nesting**: components are visited in raster order of their first pixel.
//     The pixel directly above a component's first pixel always belongs to the
//     component that encloses it, and has already been visited, so depths are
//     assigned in a single pass.
// 5.  **Crack following**: each component's boundary is walked along pixel
//     edges from the top-left corner of its first pixel, keeping the region on
//     the right, and only turning vertices are kept.
// 6.  **Noise floor**: contours whose shoelace area is below the minimum are
//     dropped.
//
// The extractor is stateless. The same frame and settings always produce the
// same contours in the same order.

use std::collections::{HashMap, HashSet};

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core_modules::contour::{Contour, ContourKind, Point};
use crate::core_modules::frame::Frame;

type LabelMap = ImageBuffer<Luma<u32>, Vec<u32>>;

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

/// How the intensity plane is split into foreground and background.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Segmentation {
    /// Luma strictly above `threshold_level` is foreground.
    #[default]
    Threshold,
    /// Like `Threshold`, with the level chosen per frame by Otsu's method.
    Otsu,
    /// Canny edge pixels are foreground.
    Canny {
        low_threshold: f32,
        high_threshold: f32,
    },
}

impl Segmentation {
    fn foreground_connectivity(self) -> Connectivity {
        match self {
            Segmentation::Threshold | Segmentation::Otsu => Connectivity::Four,
            Segmentation::Canny { .. } => Connectivity::Eight,
        }
    }
}

/// Settings for [`extract`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionSettings {
    pub segmentation: Segmentation,
    pub threshold_level: f64,
    pub min_contour_area: f64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            segmentation: Segmentation::Threshold,
            threshold_level: 127.0,
            min_contour_area: 16.0,
        }
    }
}

/// Extracts every region boundary from `frame`, outer contours and holes alike.
///
/// An empty frame yields an empty list.
pub fn extract(frame: &Frame, settings: &ExtractionSettings) -> Vec<Contour> {
    if frame.is_empty() {
        return Vec::new();
    }

    let mask = foreground_mask(&frame.luminance_plane(), settings);
    let fg_connectivity = settings.segmentation.foreground_connectivity();
    let bg_connectivity = match fg_connectivity {
        Connectivity::Four => Connectivity::Eight,
        Connectivity::Eight => Connectivity::Four,
    };

    let fg_labels = connected_components(&mask, fg_connectivity, Luma([BACKGROUND]));
    let inverted = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        if mask.get_pixel(x, y).0[0] == FOREGROUND {
            Luma([BACKGROUND])
        } else {
            Luma([FOREGROUND])
        }
    });
    let bg_labels = connected_components(&inverted, bg_connectivity, Luma([BACKGROUND]));
    let outer_background = border_labels(&bg_labels);

    let mut fg_depth: HashMap<u32, u32> = HashMap::new();
    let mut hole_depth: HashMap<u32, u32> = HashMap::new();
    let mut contours = Vec::new();
    let mut discarded = 0usize;

    for (x, y, pixel) in fg_labels.enumerate_pixels() {
        let fg = pixel.0[0];
        if fg != 0 {
            if fg_depth.contains_key(&fg) {
                continue;
            }
            let depth = if y == 0 {
                0
            } else {
                let above = bg_labels.get_pixel(x, y - 1).0[0];
                hole_depth.get(&above).map_or(0, |d| d + 1)
            };
            fg_depth.insert(fg, depth);
            let points = trace_boundary(&fg_labels, fg, (x, y), fg_connectivity);
            keep_if_large(
                Contour::new(points, depth, ContourKind::Outer),
                settings.min_contour_area,
                &mut contours,
                &mut discarded,
            );
            continue;
        }

        let bg = bg_labels.get_pixel(x, y).0[0];
        if bg == 0 || outer_background.contains(&bg) || hole_depth.contains_key(&bg) {
            continue;
        }
        // A hole never touches the border, so y > 0 and the pixel above is
        // foreground belonging to the enclosing component.
        let above = fg_labels.get_pixel(x, y - 1).0[0];
        let depth = fg_depth.get(&above).map_or(1, |d| d + 1);
        hole_depth.insert(bg, depth);
        let points = trace_boundary(&bg_labels, bg, (x, y), bg_connectivity);
        keep_if_large(
            Contour::new(points, depth, ContourKind::Hole),
            settings.min_contour_area,
            &mut contours,
            &mut discarded,
        );
    }

    debug!(
        contours = contours.len(),
        below_min_area = discarded,
        "Extracted contours"
    );
    contours
}

fn keep_if_large(
    contour: Contour,
    min_area: f64,
    contours: &mut Vec<Contour>,
    discarded: &mut usize,
) {
    let area = contour.area();
    if area < min_area {
        trace!(area, depth = contour.depth, "Dropping contour below minimum area");
        *discarded += 1;
    } else {
        contours.push(contour);
    }
}

/// Binary mask: 255 for foreground, 0 for background.
pub fn foreground_mask(plane: &GrayImage, settings: &ExtractionSettings) -> GrayImage {
    let level = match settings.segmentation {
        Segmentation::Canny {
            low_threshold,
            high_threshold,
        } => return imageproc::edges::canny(plane, low_threshold, high_threshold),
        Segmentation::Otsu => imageproc::contrast::otsu_level(plane) as f64,
        Segmentation::Threshold => settings.threshold_level,
    };
    GrayImage::from_fn(plane.width(), plane.height(), |x, y| {
        if plane.get_pixel(x, y).0[0] as f64 > level {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    })
}

/// Background labels that touch the frame border (the outside, not holes).
fn border_labels(labels: &LabelMap) -> HashSet<u32> {
    let (width, height) = labels.dimensions();
    let mut outside = HashSet::new();
    let mut mark = |x: u32, y: u32| {
        let label = labels.get_pixel(x, y).0[0];
        if label != 0 {
            outside.insert(label);
        }
    };
    for x in 0..width {
        mark(x, 0);
        mark(x, height - 1);
    }
    for y in 0..height {
        mark(0, y);
        mark(width - 1, y);
    }
    outside
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    East,
    South,
    West,
    North,
}

impl Direction {
    fn delta(self) -> (i32, i32) {
        match self {
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::North => (0, -1),
        }
    }

    /// Clockwise on screen (y grows downward).
    fn turn_right(self) -> Self {
        match self {
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            Direction::North => Direction::East,
        }
    }

    fn turn_left(self) -> Self {
        match self {
            Direction::East => Direction::North,
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
        }
    }

    /// The (ahead-left, ahead-right) pixels when standing on corner `v`.
    fn ahead(self, v: Point) -> ((i32, i32), (i32, i32)) {
        let (x, y) = (v.x, v.y);
        match self {
            Direction::East => ((x, y - 1), (x, y)),
            Direction::South => ((x, y), (x - 1, y)),
            Direction::West => ((x - 1, y), (x - 1, y - 1)),
            Direction::North => ((x - 1, y - 1), (x, y - 1)),
        }
    }
}

/// Walks the crack boundary of the component `label` whose first raster pixel
/// is `start`, returning its corner vertices.
fn trace_boundary(
    labels: &LabelMap,
    label: u32,
    start: (u32, u32),
    connectivity: Connectivity,
) -> Vec<Point> {
    let (width, height) = labels.dimensions();
    let inside = |(x, y): (i32, i32)| {
        x >= 0
            && y >= 0
            && (x as u32) < width
            && (y as u32) < height
            && labels.get_pixel(x as u32, y as u32).0[0] == label
    };

    let origin = Point::new(start.0 as i32, start.1 as i32);
    let mut points = vec![origin];
    let mut vertex = origin;
    let mut direction = Direction::East;
    // Every pixel edge is walked at most once.
    let max_steps = 4 * (width as usize + 1) * (height as usize + 1);

    for _ in 0..max_steps {
        let (dx, dy) = direction.delta();
        vertex = Point::new(vertex.x + dx, vertex.y + dy);
        if vertex == origin {
            break;
        }
        let (ahead_left, ahead_right) = direction.ahead(vertex);
        let next = match connectivity {
            Connectivity::Four => {
                if !inside(ahead_right) {
                    direction.turn_right()
                } else if inside(ahead_left) {
                    direction.turn_left()
                } else {
                    direction
                }
            }
            Connectivity::Eight => {
                if inside(ahead_left) {
                    direction.turn_left()
                } else if inside(ahead_right) {
                    direction
                } else {
                    direction.turn_right()
                }
            }
        };
        if next != direction {
            points.push(vertex);
        }
        direction = next;
    }
    points
}
