// THEORY:
// The overlay renderer is the visual feedback stage. It copies the input frame
// and strokes every descriptor's contour onto the copy, in the frame's own
// channel layout, so the annotated output can be displayed wherever the input
// came from.
//
// The stroke color is picked from a fixed palette by identifier, so one object
// keeps one color for as long as it is tracked. Rendering cannot fail: if the
// buffer cannot be viewed as an image, the unmodified copy is returned.

use image::{ImageBuffer, Luma, Pixel, Rgb as RgbPixel, Rgba};
use imageproc::drawing::{Canvas, draw_filled_rect_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::core_modules::color::{self, Rgb};
use crate::core_modules::contour::{Contour, Point};
use crate::core_modules::descriptor::ObjectDescriptor;
use crate::core_modules::frame::{ChannelLayout, Frame};

pub const DEFAULT_PALETTE: [Rgb; 8] = [
    [230, 25, 75],
    [60, 180, 75],
    [255, 225, 25],
    [0, 130, 200],
    [245, 130, 48],
    [145, 30, 180],
    [70, 240, 240],
    [240, 50, 230],
];

/// Stroke settings for [`render`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub stroke_width: u32,
    pub palette: Vec<Rgb>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke_width: 2,
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }
}

impl OverlayStyle {
    /// Palette entry for `identifier`; unassigned descriptors use the first color.
    pub fn color_for(&self, identifier: Option<u64>) -> Rgb {
        if self.palette.is_empty() {
            return [255, 255, 255];
        }
        let index = identifier.map_or(0, |id| (id % self.palette.len() as u64) as usize);
        self.palette[index]
    }
}

/// Returns a copy of `frame` with each descriptor's contour drawn on it.
pub fn render(frame: &Frame, descriptors: &[ObjectDescriptor], style: &OverlayStyle) -> Frame {
    if descriptors.is_empty() || frame.is_empty() {
        return frame.clone();
    }
    let drawn = match frame.layout() {
        ChannelLayout::Luma8 => draw_on(frame, descriptors, style, |[r, g, b]| {
            Luma([color::luma(r, g, b).round().clamp(0.0, 255.0) as u8])
        }),
        ChannelLayout::Rgb8 => draw_on(frame, descriptors, style, RgbPixel),
        ChannelLayout::Rgba8 => draw_on(frame, descriptors, style, |[r, g, b]| Rgba([r, g, b, 255])),
        ChannelLayout::Bgra8 => draw_on(frame, descriptors, style, |[r, g, b]| Rgba([b, g, r, 255])),
    };
    drawn
        .and_then(|bytes| frame.with_data(bytes).ok())
        .unwrap_or_else(|| frame.clone())
}

fn draw_on<P>(
    frame: &Frame,
    descriptors: &[ObjectDescriptor],
    style: &OverlayStyle,
    paint: impl Fn(Rgb) -> P,
) -> Option<Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let mut canvas: ImageBuffer<P, Vec<u8>> =
        ImageBuffer::from_raw(frame.width(), frame.height(), frame.as_bytes().to_vec())?;
    for descriptor in descriptors {
        let ink = paint(style.color_for(descriptor.identifier));
        stroke_contour(&mut canvas, &descriptor.contour, style.stroke_width, ink);
    }
    Some(canvas.into_raw())
}

/// Stamps a square brush of side `width` along every edge of `contour`.
pub fn stroke_contour<C>(canvas: &mut C, contour: &Contour, width: u32, ink: C::Pixel)
where
    C: Canvas,
{
    let width = width.max(1);
    let offset = (width as i32 - 1) / 2;
    for (from, to) in contour.edges() {
        for point in segment_points(from, to) {
            let brush = Rect::at(point.x - offset, point.y - offset).of_size(width, width);
            draw_filled_rect_mut(canvas, brush, ink);
        }
    }
}

/// Integer points from `from` to `to`, both ends included.
fn segment_points(from: Point, to: Point) -> impl Iterator<Item = Point> {
    let dx = (to.x - from.x) as f64;
    let dy = (to.y - from.y) as f64;
    let steps = (to.x - from.x).abs().max((to.y - from.y).abs());
    (0..=steps).map(move |step| {
        if steps == 0 {
            return from;
        }
        let t = step as f64 / steps as f64;
        Point::new(
            (from.x as f64 + dx * t).round() as i32,
            (from.y as f64 + dy * t).round() as i32,
        )
    })
}
