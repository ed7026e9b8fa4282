//! CPU rendition of the per-pixel transform baked into the emitted shader.
//!
//! The operation order mirrors the GLSL in [`crate::ShaderTemplate::builtin`]:
//! BT.709 luma, `mix(gray, color, level)`, channel-wise clamp to `[0, 1]`, then
//! the opacity multiply over all four channels. The profile generator samples
//! this function to describe the same transform to the ICC toolchain.
use crate::SaturationLevel;

/// ITU-R BT.709 luma weights for linear-light-agnostic RGB.
pub const LUMA_COEFFICIENTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

pub fn luma(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA_COEFFICIENTS[0] + rgb[1] * LUMA_COEFFICIENTS[1] + rgb[2] * LUMA_COEFFICIENTS[2]
}

/// Applies the saturation transform to one RGBA sample.
pub fn saturate_pixel(rgba: [f32; 4], level: SaturationLevel, opacity: f32) -> [f32; 4] {
    let factor = level.value() as f32;
    let gray = luma([rgba[0], rgba[1], rgba[2]]);

    let mut out = [0.0f32; 4];
    for channel in 0..3 {
        // Same formulation as GLSL `mix`, exact at factor 0 and 1.
        let mixed = gray * (1.0 - factor) + rgba[channel] * factor;
        out[channel] = mixed.clamp(0.0, 1.0) * opacity;
    }
    out[3] = rgba[3] * opacity;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [[f32; 4]; 5] = [
        [0.9, 0.1, 0.2, 1.0],
        [0.0, 0.5, 1.0, 1.0],
        [0.25, 0.25, 0.25, 0.5],
        [1.0, 1.0, 0.0, 1.0],
        [0.05, 0.8, 0.4, 0.75],
    ];

    #[test]
    fn identity_level_preserves_color() {
        for sample in SAMPLES {
            let out = saturate_pixel(sample, SaturationLevel::IDENTITY, 1.0);
            assert_eq!(out, sample);
        }
    }

    #[test]
    fn zero_level_yields_luma_gray() {
        for sample in SAMPLES {
            let out = saturate_pixel(sample, SaturationLevel::GRAYSCALE, 1.0);
            let gray = luma([sample[0], sample[1], sample[2]]);
            assert_eq!(out[0], gray);
            assert_eq!(out[1], gray);
            assert_eq!(out[2], gray);
            assert_eq!(out[3], sample[3]);
        }
    }

    #[test]
    fn boosted_level_clamps_before_opacity() {
        let level = SaturationLevel::new(2.0).unwrap();
        let out = saturate_pixel([1.0, 0.0, 0.0, 1.0], level, 0.5);
        // Red extrapolates past 1.0 and green below 0.0; both clamp, then halve.
        assert_eq!(out[0], 0.5);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[3], 0.5);
    }

    #[test]
    fn opacity_scales_alpha_too() {
        let out = saturate_pixel([0.2, 0.4, 0.6, 0.8], SaturationLevel::IDENTITY, 0.5);
        assert!((out[3] - 0.4).abs() < 1e-6);
        assert!((out[0] - 0.1).abs() < 1e-6);
    }
}
