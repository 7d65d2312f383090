// THEORY:
// `Frame` is the engine's view of one camera image: a "dumb" data container that
// owns a flat byte buffer together with the dimensions and channel layout needed
// to interpret it. It performs the bridging work every later stage relies on:
// validating the buffer once, producing the single-channel intensity plane for
// segmentation, and answering per-pixel RGB lookups for color sampling.
//
// A frame is immutable once built. The overlay stage clones the buffer and draws
// on the clone, so the caller's input is never touched.

use image::{GrayImage, Luma};

use crate::core_modules::color::{self, Rgb};
use crate::error::FrameError;

/// Byte order and channel count of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// One intensity byte per pixel.
    Luma8,
    Rgb8,
    Rgba8,
    /// Camera-native order (blue, green, red, alpha).
    Bgra8,
}

impl ChannelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ChannelLayout::Luma8 => 1,
            ChannelLayout::Rgb8 => 3,
            ChannelLayout::Rgba8 | ChannelLayout::Bgra8 => 4,
        }
    }
}

/// An owned, validated image buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    layout: ChannelLayout,
    data: Vec<u8>,
}

impl Frame {
    /// Wraps `data` after checking that its length matches the dimensions.
    ///
    /// A zero-sized frame with an empty buffer is accepted; it simply contains
    /// no regions.
    pub fn new(
        width: u32,
        height: u32,
        layout: ChannelLayout,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        Self::try_from_raw(width, height, layout, data).map_err(|(error, _)| error)
    }

    /// Like [`Frame::new`], but hands the buffer back when it is rejected.
    pub fn try_from_raw(
        width: u32,
        height: u32,
        layout: ChannelLayout,
        data: Vec<u8>,
    ) -> Result<Self, (FrameError, Vec<u8>)> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(layout.bytes_per_pixel()))
            .unwrap_or(usize::MAX);
        if data.len() != expected {
            let error = FrameError::InvalidImage {
                width,
                height,
                layout,
                expected,
                actual: data.len(),
            };
            return Err((error, data));
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    /// A frame of the given size filled with one color.
    pub fn filled(width: u32, height: u32, layout: ChannelLayout, rgb: Rgb) -> Self {
        let pixel = encode(layout, rgb);
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * layout.bytes_per_pixel())
            .collect();
        Self {
            width,
            height,
            layout,
            data,
        }
    }

    /// A frame with the same dimensions and layout over a new buffer.
    pub fn with_data(&self, data: Vec<u8>) -> Result<Self, FrameError> {
        Self::new(self.width, self.height, self.layout, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.layout.bytes_per_pixel()
    }

    /// RGB value at `(x, y)`. Callers stay within bounds.
    pub fn rgb_at(&self, x: u32, y: u32) -> Rgb {
        let start = self.offset(x, y);
        let bytes = &self.data[start..start + self.layout.bytes_per_pixel()];
        match self.layout {
            ChannelLayout::Luma8 => [bytes[0], bytes[0], bytes[0]],
            ChannelLayout::Rgb8 | ChannelLayout::Rgba8 => [bytes[0], bytes[1], bytes[2]],
            ChannelLayout::Bgra8 => [bytes[2], bytes[1], bytes[0]],
        }
    }

    /// Overwrites the pixel at `(x, y)`, keeping any alpha byte.
    pub fn set_rgb(&mut self, x: u32, y: u32, rgb: Rgb) {
        let start = self.offset(x, y);
        let bpp = self.layout.bytes_per_pixel();
        let encoded = encode(self.layout, rgb);
        let channels = match self.layout {
            ChannelLayout::Rgba8 | ChannelLayout::Bgra8 => 3,
            _ => bpp,
        };
        self.data[start..start + channels].copy_from_slice(&encoded[..channels]);
    }

    /// Single-channel intensity plane (Rec. 601 luma, rounded).
    pub fn luminance_plane(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.layout == ChannelLayout::Luma8 {
                return Luma([self.data[self.offset(x, y)]]);
            }
            let [red, green, blue] = self.rgb_at(x, y);
            Luma([color::luma(red, green, blue).round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// Encodes an RGB triple into the byte order of `layout` (alpha opaque).
pub fn encode(layout: ChannelLayout, rgb: Rgb) -> Vec<u8> {
    let [red, green, blue] = rgb;
    match layout {
        ChannelLayout::Luma8 => {
            vec![color::luma(red, green, blue).round().clamp(0.0, 255.0) as u8]
        }
        ChannelLayout::Rgb8 => vec![red, green, blue],
        ChannelLayout::Rgba8 => vec![red, green, blue, 255],
        ChannelLayout::Bgra8 => vec![blue, green, red, 255],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        let error = Frame::new(4, 4, ChannelLayout::Rgba8, vec![0u8; 10]).unwrap_err();
        assert_eq!(
            error,
            FrameError::InvalidImage {
                width: 4,
                height: 4,
                layout: ChannelLayout::Rgba8,
                expected: 64,
                actual: 10,
            }
        );
    }

    #[test]
    fn rejected_buffer_is_handed_back() {
        let (error, data) =
            Frame::try_from_raw(2, 2, ChannelLayout::Rgb8, vec![1, 2, 3]).unwrap_err();
        assert_eq!(data, vec![1, 2, 3]);
        assert!(matches!(error, FrameError::InvalidImage { expected: 12, actual: 3, .. }));
    }

    #[test]
    fn accepts_zero_sized_frame() {
        let frame = Frame::new(0, 10, ChannelLayout::Rgb8, Vec::new()).expect("empty frame");
        assert!(frame.is_empty());
        assert_eq!(frame.luminance_plane().len(), 0);
    }

    #[test]
    fn bgra_is_read_as_rgb() {
        let frame = Frame::new(1, 1, ChannelLayout::Bgra8, vec![10, 20, 30, 255]).unwrap();
        assert_eq!(frame.rgb_at(0, 0), [30, 20, 10]);
    }

    #[test]
    fn set_rgb_preserves_alpha() {
        let mut frame = Frame::new(1, 1, ChannelLayout::Rgba8, vec![0, 0, 0, 17]).unwrap();
        frame.set_rgb(0, 0, [1, 2, 3]);
        assert_eq!(frame.as_bytes(), &[1, 2, 3, 17]);
    }

    #[test]
    fn luminance_plane_uses_luma_weights() {
        let frame = Frame::filled(2, 2, ChannelLayout::Rgb8, [0, 255, 0]);
        let plane = frame.luminance_plane();
        assert!(plane.pixels().all(|p| p.0[0] == 150));
    }
}
