// THEORY:
// A `Contour` is a closed polygon on the integer pixel-corner lattice. The region
// extractor emits crack boundaries (polygons that run along pixel edges), so a
// filled w x h block of pixels becomes a rectangle whose shoelace area is exactly
// w * h and whose centroid is the geometric center of the block.
//
// All geometry used downstream lives here:
// - signed area via the shoelace formula, accumulated in integers so that
//   rotating or reversing the point sequence cannot change its magnitude,
// - the area-weighted polygon centroid (not a vertex average),
// - even-odd point containment, and a scanline form of the same rule that
//   yields interior pixel spans row by row for color sampling.

use serde::{Deserialize, Serialize};

/// A vertex on the pixel-corner lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Whether a contour bounds a foreground region or a hole inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContourKind {
    Outer,
    Hole,
}

/// A closed boundary. The last point connects back to the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<Point>,
    /// Nesting depth; 0 is an outermost region.
    pub depth: u32,
    pub kind: ContourKind,
}

/// A horizontal run of interior pixels `x_start..=x_end` on row `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub y: i32,
    pub x_start: i32,
    pub x_end: i32,
}

impl Contour {
    pub fn new(points: Vec<Point>, depth: u32, kind: ContourKind) -> Self {
        Self {
            points,
            depth,
            kind,
        }
    }

    /// An outermost contour from bare points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self::new(points, 0, ContourKind::Outer)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates the closed polygon's edges, including the closing one.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Twice the signed area; exact.
    fn doubled_signed_area(&self) -> i64 {
        self.edges()
            .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
            .sum()
    }

    /// Shoelace signed area. The sign follows the winding direction.
    pub fn signed_area(&self) -> f64 {
        self.doubled_signed_area() as f64 / 2.0
    }

    /// Shoelace area magnitude.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Area-weighted polygon centroid, or `None` for a zero-area polygon.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let doubled = self.doubled_signed_area();
        if doubled == 0 {
            return None;
        }
        let (mut sum_x, mut sum_y) = (0.0f64, 0.0f64);
        for (a, b) in self.edges() {
            let cross = (a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64) as f64;
            sum_x += (a.x + b.x) as f64 * cross;
            sum_y += (a.y + b.y) as f64 * cross;
        }
        let scale = 3.0 * doubled as f64;
        Some((sum_x / scale, sum_y / scale))
    }

    /// Bounding box as (top-left, bottom-right) corners.
    pub fn bounding_box(&self) -> Option<(Point, Point)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(min, max), p| {
            (
                Point::new(min.x.min(p.x), min.y.min(p.y)),
                Point::new(max.x.max(p.x), max.y.max(p.y)),
            )
        }))
    }

    /// Even-odd containment of a real point.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);
            if (ay > y) != (by > y) {
                let crossing = ax + (y - ay) * (bx - ax) / (by - ay);
                if x < crossing {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Sorted x coordinates where the horizontal line at `y` crosses an edge.
    fn crossings(&self, y: f64) -> Vec<f64> {
        let mut xs: Vec<f64> = self
            .edges()
            .filter_map(|(a, b)| {
                let (ay, by) = (a.y as f64, b.y as f64);
                ((ay > y) != (by > y))
                    .then(|| a.x as f64 + (y - ay) * (b.x - a.x) as f64 / (by - ay))
            })
            .collect();
        xs.sort_by(f64::total_cmp);
        xs
    }

    /// Runs of pixels whose centers lie inside the polygon (even-odd rule).
    ///
    /// Equivalent to testing `contains(x + 0.5, y + 0.5)` for every pixel in the
    /// bounding box, but linear in the number of edges per row.
    pub fn interior_spans(&self) -> Vec<Span> {
        let Some((min, max)) = self.bounding_box() else {
            return Vec::new();
        };
        let mut spans = Vec::new();
        for y in min.y..max.y {
            let xs = self.crossings(y as f64 + 0.5);
            for pair in xs.chunks_exact(2) {
                let mut x_start = (pair[0] - 0.5).ceil() as i32;
                if x_start as f64 + 0.5 <= pair[0] {
                    x_start += 1;
                }
                let mut x_end = (pair[1] - 0.5).floor() as i32;
                if x_end as f64 + 0.5 >= pair[1] {
                    x_end -= 1;
                }
                if x_start <= x_end {
                    spans.push(Span { y, x_start, x_end });
                }
            }
        }
        spans
    }
}
