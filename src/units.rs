//! Physical length <-> pixel conversion.
//!
//! Every size in the pipeline is specified in centimeters and converted at a
//! resolution given in dots per inch. Bucket directory names are produced by
//! [`format_cm`], so its rounding rule is part of the output contract.

use serde::{Deserialize, Serialize};

pub const CM_PER_INCH: f64 = 2.54;
pub const MM_PER_INCH: f64 = 25.4;

/// Convert a length in centimeters to a pixel count.
pub fn to_pixels(length_cm: f64, resolution: f64) -> u32 {
    (length_cm * resolution / CM_PER_INCH).round().max(0.0) as u32
}

/// Convert a pixel count back to centimeters.
pub fn to_length(pixels: u32, resolution: f64) -> f64 {
    pixels as f64 * CM_PER_INCH / resolution
}

/// Convert a line thickness in millimeters to pixels, rounding half up.
///
/// A positive thickness never collapses to zero pixels.
pub fn mm_to_pixels(mm: f64, resolution: f64) -> u32 {
    if mm <= 0.0 {
        return 0;
    }
    let px = (mm * resolution / MM_PER_INCH + 0.5).floor() as u32;
    px.max(1)
}

/// Format a centimeter value for labels: one decimal place, dropped when zero.
///
/// `60.0` -> `"60"`, `59.96` -> `"60"`, `182.54` -> `"182.5"`.
pub fn format_cm(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{:.1}", rounded)
    }
}

/// Thickness of a drawn line, either absolute or physical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "unit", content = "value")]
pub enum LineWidth {
    Pixels(u32),
    Millimeters(f64),
}

impl LineWidth {
    pub fn to_pixels(self, resolution: f64) -> u32 {
        match self {
            LineWidth::Pixels(px) => px,
            LineWidth::Millimeters(mm) => mm_to_pixels(mm, resolution),
        }
    }

    pub fn is_positive(self) -> bool {
        match self {
            LineWidth::Pixels(px) => px > 0,
            LineWidth::Millimeters(mm) => mm > 0.0,
        }
    }
}

impl Default for LineWidth {
    fn default() -> Self {
        LineWidth::Pixels(2)
    }
}
