// Image file I/O used by the runner. The engine itself never touches files.

use std::path::Path;

use image::ImageEncoder;
use image::codecs::png::PngEncoder;

use crate::core_modules::frame::{ChannelLayout, Frame};
use crate::error::Result;

/// Loads an image file as an `Rgba8` frame.
pub fn load(path: impl AsRef<Path>) -> Result<Frame> {
    let image = image::open(path)?.to_rgba8();
    let (width, height) = image.dimensions();
    Ok(Frame::new(width, height, ChannelLayout::Rgba8, image.into_raw())?)
}

/// Writes `frame` as a PNG. `Bgra8` frames are reordered to RGBA first.
pub fn save(path: impl AsRef<Path>, frame: &Frame) -> Result<()> {
    let output = std::fs::File::create(path)?;
    let encoder = PngEncoder::new(output);

    match frame.layout() {
        ChannelLayout::Luma8 => encoder.write_image(
            frame.as_bytes(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::L8,
        )?,
        ChannelLayout::Rgb8 => encoder.write_image(
            frame.as_bytes(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgb8,
        )?,
        ChannelLayout::Rgba8 => encoder.write_image(
            frame.as_bytes(),
            frame.width(),
            frame.height(),
            image::ExtendedColorType::Rgba8,
        )?,
        ChannelLayout::Bgra8 => {
            let mut buffer = frame.as_bytes().to_vec();
            for pixel in buffer.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
            encoder.write_image(
                &buffer,
                frame.width(),
                frame.height(),
                image::ExtendedColorType::Rgba8,
            )?
        }
    }

    Ok(())
}
