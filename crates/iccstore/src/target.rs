//! Synthetic measurement data describing the saturation transform to the
//! Argyll profiler.
//!
//! Each patch pairs a device RGB value with the CIE XYZ the display shows once
//! the screen shader has run, assuming sRGB primaries and a D65 white with
//! Y = 100.
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use shaderfx::{saturate_pixel, SaturationLevel};

/// Device values per axis; the grid holds `steps³` patches.
pub const DEFAULT_GRID_STEPS: usize = 5;

const SRGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Patch {
    /// Device RGB on the 0-100 scale Argyll expects.
    pub rgb: [f64; 3],
    pub xyz: [f64; 3],
}

pub(crate) fn measurement_patches(level: SaturationLevel, steps: usize) -> Vec<Patch> {
    let steps = steps.max(2);
    let scale = (steps - 1) as f64;
    let mut patches = Vec::with_capacity(steps * steps * steps);

    for r in 0..steps {
        for g in 0..steps {
            for b in 0..steps {
                let device = [r as f64 / scale, g as f64 / scale, b as f64 / scale];
                let shaded = saturate_pixel(
                    [device[0] as f32, device[1] as f32, device[2] as f32, 1.0],
                    level,
                    1.0,
                );
                let linear = [
                    srgb_to_linear(shaded[0] as f64),
                    srgb_to_linear(shaded[1] as f64),
                    srgb_to_linear(shaded[2] as f64),
                ];
                patches.push(Patch {
                    rgb: device.map(|value| value * 100.0),
                    xyz: linear_to_xyz(linear),
                });
            }
        }
    }

    patches
}

/// Renders the patches as an Argyll CGATS `.ti3` file.
pub(crate) fn render_ti3(level: SaturationLevel, patches: &[Patch], created: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("CTI3\n\n");
    out.push_str("DESCRIPTOR \"Argyll Calibration Target chart information 3\"\n");
    let _ = writeln!(out, "ORIGINATOR \"satshade saturation {level}\"");
    let _ = writeln!(out, "CREATED \"{}\"", created.format("%a %b %e %H:%M:%S %Y"));
    out.push_str("DEVICE_CLASS \"DISPLAY\"\n");
    out.push_str("COLOR_REP \"RGB_XYZ\"\n\n");
    out.push_str("NUMBER_OF_FIELDS 7\n");
    out.push_str("BEGIN_DATA_FORMAT\n");
    out.push_str("SAMPLE_ID RGB_R RGB_G RGB_B XYZ_X XYZ_Y XYZ_Z\n");
    out.push_str("END_DATA_FORMAT\n\n");
    let _ = writeln!(out, "NUMBER_OF_SETS {}", patches.len());
    out.push_str("BEGIN_DATA\n");
    for (index, patch) in patches.iter().enumerate() {
        let _ = writeln!(
            out,
            "{} {:.5} {:.5} {:.5} {:.6} {:.6} {:.6}",
            index + 1,
            patch.rgb[0],
            patch.rgb[1],
            patch.rgb[2],
            patch.xyz[0],
            patch.xyz[1],
            patch.xyz[2],
        );
    }
    out.push_str("END_DATA\n");
    out
}

fn srgb_to_linear(value: f64) -> f64 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_xyz(rgb: [f64; 3]) -> [f64; 3] {
    let mut xyz = [0.0; 3];
    for (row, out) in SRGB_TO_XYZ.iter().zip(xyz.iter_mut()) {
        *out = (row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2]) * 100.0;
    }
    xyz
}
