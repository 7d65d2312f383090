// THEORY (single-pixel color heuristics):
// The `color` module is the smallest unit of the engine. It holds one RGB sample
// and the handful of metrics that can be computed from that sample alone: the
// Rec. 601 luminance used to classify foreground pixels, and the HSL triple used
// to compare an object's average color against registered reference colors.
//
// Nothing here reads neighbors or history. Region-level color (an object's
// average over its interior) is computed by the descriptor stage and handed
// back to this module only as another `Pixel`.
//
// All HSL math runs on normalized sRGB (0..1) without linearization. The engine
// compares colors sampled by the same camera under the same exposure, so the
// fast variant is the only one kept.

pub type Channel = u8;
pub type NormalizedChannel = f32;
pub type Luminance = f64;
pub type Hue = f32;
pub type SaturationHSL = f32;
pub type LightnessHSL = f32;
pub type Chroma = f32;

/// An RGB triple, 0..=255 per channel.
pub type Rgb = [Channel; 3];

/// Weight applied to the circular hue difference in [`hsl_distance`].
pub const HUE_WEIGHT: f32 = 10.0;

/// A single color sample with its normalized channels precomputed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pixel {
    pub red: Channel,
    pub green: Channel,
    pub blue: Channel,
    red_normalized: NormalizedChannel,
    green_normalized: NormalizedChannel,
    blue_normalized: NormalizedChannel,
}

/// Hue, saturation and lightness, each normalized to 0..=1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsl {
    pub hue: f32,
    pub saturation: SaturationHSL,
    pub lightness: LightnessHSL,
}

impl Pixel {
    pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
        Pixel {
            red,
            green,
            blue,
            red_normalized: red as NormalizedChannel / 255.0,
            green_normalized: green as NormalizedChannel / 255.0,
            blue_normalized: blue as NormalizedChannel / 255.0,
        }
    }

    pub fn rgb(&self) -> Rgb {
        [self.red, self.green, self.blue]
    }

    /// Luminance estimate (Rec. 601 luma) on the 0..255 scale.
    ///
    /// This is the single intensity used for foreground classification.
    pub fn luminance(&self) -> Luminance {
        luma(self.red, self.green, self.blue)
    }

    fn max_channel(&self) -> NormalizedChannel {
        self.red_normalized
            .max(self.green_normalized.max(self.blue_normalized))
    }

    fn min_channel(&self) -> NormalizedChannel {
        self.red_normalized
            .min(self.green_normalized.min(self.blue_normalized))
    }

    /// Chroma: max(R,G,B) - min(R,G,B) on normalized channels.
    pub fn chroma(&self) -> Chroma {
        self.max_channel() - self.min_channel()
    }

    /// Hue angle in degrees [0, 360). Grays report 0.
    pub fn hue(&self) -> Hue {
        let maximum_channel = self.max_channel();
        let chroma = self.chroma();
        if chroma <= 1e-6 {
            return 0.0;
        }

        let (base_difference, sector_offset) = if maximum_channel == self.red_normalized {
            (self.green_normalized - self.blue_normalized, 0.0)
        } else if maximum_channel == self.green_normalized {
            (self.blue_normalized - self.red_normalized, 2.0)
        } else {
            (self.red_normalized - self.green_normalized, 4.0)
        };

        let mut hue_degrees = (base_difference / chroma + sector_offset) * 60.0;
        if hue_degrees < 0.0 {
            hue_degrees += 360.0;
        }
        hue_degrees
    }

    /// HSL lightness: midpoint of the max and min channels.
    pub fn lightness_hsl(&self) -> LightnessHSL {
        (self.max_channel() + self.min_channel()) * 0.5
    }

    /// HSL saturation: chroma / (1 - |2L - 1|).
    pub fn saturation_hsl(&self) -> SaturationHSL {
        let denominator = 1.0 - (2.0 * self.lightness_hsl() - 1.0).abs();
        if denominator <= 1e-6 {
            return 0.0;
        }
        (self.chroma() / denominator).min(1.0)
    }

    pub fn to_hsl(&self) -> Hsl {
        Hsl {
            hue: self.hue() / 360.0,
            saturation: self.saturation_hsl(),
            lightness: self.lightness_hsl(),
        }
    }
}

impl From<Rgb> for Pixel {
    fn from(rgb: Rgb) -> Self {
        Pixel::new(rgb[0], rgb[1], rgb[2])
    }
}

impl From<Pixel> for Rgb {
    fn from(pixel: Pixel) -> Self {
        pixel.rgb()
    }
}

/// Rec. 601 luma of raw channel values.
#[inline]
pub fn luma(red: Channel, green: Channel, blue: Channel) -> Luminance {
    0.299_f64 * red as f64 + 0.587_f64 * green as f64 + 0.114_f64 * blue as f64
}

/// Distance between two HSL colors.
///
/// Hue is compared around the wheel (0.9 and 0.1 are 0.2 apart) and weighted by
/// [`HUE_WEIGHT`] so that a hue shift dominates a change in shading.
pub fn hsl_distance(a: &Hsl, b: &Hsl) -> f32 {
    let raw_hue = (a.hue - b.hue).abs();
    let delta_hue = raw_hue.min(1.0 - raw_hue) * HUE_WEIGHT;
    let delta_saturation = (a.saturation - b.saturation).abs();
    let delta_lightness = (a.lightness - b.lightness).abs();
    (delta_hue * delta_hue + delta_saturation * delta_saturation + delta_lightness * delta_lightness)
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn luminance_of_primaries() {
        assert!((Pixel::new(255, 255, 255).luminance() - 255.0).abs() < 1e-9);
        assert!((Pixel::new(255, 0, 0).luminance() - 76.245).abs() < 1e-9);
        assert_eq!(Pixel::new(0, 0, 0).luminance(), 0.0);
    }

    #[test]
    fn hue_of_primaries() {
        assert!(close(Pixel::new(255, 0, 0).hue(), 0.0));
        assert!(close(Pixel::new(0, 255, 0).hue(), 120.0));
        assert!(close(Pixel::new(0, 0, 255).hue(), 240.0));
        assert!(close(Pixel::new(255, 0, 255).hue(), 300.0));
        assert!(close(Pixel::new(128, 128, 128).hue(), 0.0));
    }

    #[test]
    fn hsl_of_pure_red() {
        let hsl = Pixel::new(255, 0, 0).to_hsl();
        assert!(close(hsl.hue, 0.0));
        assert!(close(hsl.saturation, 1.0));
        assert!(close(hsl.lightness, 0.5));
    }

    #[test]
    fn grays_have_no_saturation() {
        for value in [0u8, 1, 77, 200, 255] {
            assert_eq!(Pixel::new(value, value, value).saturation_hsl(), 0.0);
        }
    }

    #[test]
    fn hue_distance_wraps_around_the_wheel() {
        let near_red_low = Hsl { hue: 0.02, saturation: 1.0, lightness: 0.5 };
        let near_red_high = Hsl { hue: 0.98, saturation: 1.0, lightness: 0.5 };
        let green = Hsl { hue: 1.0 / 3.0, saturation: 1.0, lightness: 0.5 };
        assert!(close(hsl_distance(&near_red_low, &near_red_high), 0.04 * HUE_WEIGHT));
        assert!(hsl_distance(&near_red_low, &green) > hsl_distance(&near_red_low, &near_red_high));
    }

    #[test]
    fn lightness_contributes_to_distance() {
        let dark = Pixel::new(80, 0, 0).to_hsl();
        let light = Pixel::new(255, 120, 120).to_hsl();
        assert!(hsl_distance(&dark, &light) > 0.0);
        assert_eq!(hsl_distance(&dark, &dark), 0.0);
    }
}
