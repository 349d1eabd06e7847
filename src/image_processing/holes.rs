use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::units::{to_length, to_pixels};

/// Punch-hole markers drawn along the top and bottom edge of a print.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoleOptions {
    /// Total number of holes, split evenly between the two rows. 6 or 8.
    pub count: u32,
    pub diameter_cm: f64,
    /// Distance from the edges to the hole row and to the outer holes.
    pub margin_cm: f64,
    pub color: [u8; 3],
}

impl Default for HoleOptions {
    fn default() -> Self {
        Self {
            count: 6,
            diameter_cm: 1.0,
            margin_cm: 2.0,
            color: [255, 0, 0],
        }
    }
}

impl HoleOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count != 6 && self.count != 8 {
            return Err(ConfigError::HoleCount(self.count));
        }
        if !(self.diameter_cm > 0.0 && self.margin_cm > 0.0) {
            return Err(ConfigError::HoleGeometry);
        }
        Ok(())
    }

    pub fn per_row(&self) -> u32 {
        self.count / 2
    }

    /// Hole centers in pixels for a canvas of the given size.
    pub fn centers(&self, width: u32, height: u32, resolution: f64) -> Vec<(u32, u32)> {
        let per_row = self.per_row();
        if per_row == 0 {
            return Vec::new();
        }

        let width_cm = to_length(width, resolution);
        let radius_cm = self.diameter_cm / 2.0;
        let first_cm = self.margin_cm + radius_cm;
        let last_cm = width_cm - self.margin_cm - radius_cm;
        let spacing_cm = if per_row > 1 {
            (last_cm - first_cm) / (per_row - 1) as f64
        } else {
            0.0
        };

        let margin_px = to_pixels(self.margin_cm, resolution);
        let rows = [margin_px, height.saturating_sub(margin_px)];

        rows.iter()
            .flat_map(|&y| {
                (0..per_row).map(move |i| {
                    let x_cm = (first_cm + i as f64 * spacing_cm).max(0.0);
                    (to_pixels(x_cm, resolution), y)
                })
            })
            .collect()
    }
}

/// Draw filled hole markers onto the canvas.
pub fn draw_holes(canvas: &mut RgbImage, options: &HoleOptions, resolution: f64) {
    let (width, height) = canvas.dimensions();
    let radius = to_pixels(options.diameter_cm / 2.0, resolution) as i32;
    let color = Rgb(options.color);

    for (x, y) in options.centers(width, height, resolution) {
        draw_filled_circle_mut(canvas, (x as i32, y as i32), radius, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(HoleOptions::default().validate().is_ok());
        let options = HoleOptions {
            count: 7,
            ..Default::default()
        };
        assert_eq!(options.validate(), Err(ConfigError::HoleCount(7)));
        let options = HoleOptions {
            diameter_cm: 0.0,
            ..Default::default()
        };
        assert_eq!(options.validate(), Err(ConfigError::HoleGeometry));
    }

    #[test]
    fn test_six_holes_evenly_spaced() {
        // 25.4 cm x 25.4 cm at 100 dpi; margin 2.54 cm and diameter 2.54 cm
        let options = HoleOptions {
            count: 6,
            diameter_cm: 2.54,
            margin_cm: 2.54,
            color: [255, 0, 0],
        };
        let centers = options.centers(1000, 1000, 100.0);
        assert_eq!(
            centers,
            vec![
                (150, 100),
                (500, 100),
                (850, 100),
                (150, 900),
                (500, 900),
                (850, 900),
            ]
        );
    }

    #[test]
    fn test_eight_holes() {
        let options = HoleOptions {
            count: 8,
            ..Default::default()
        };
        let centers = options.centers(3543, 4724, 300.0);
        assert_eq!(centers.len(), 8);
        // symmetric about the vertical center
        let (first, last) = (centers[0].0, centers[3].0);
        assert!((first as i64 + last as i64 - 3543).abs() <= 1);
    }

    #[test]
    fn test_draw_holes_marks_canvas() {
        let mut canvas = RgbImage::from_pixel(1000, 1000, Rgb([255, 255, 255]));
        let options = HoleOptions {
            count: 6,
            diameter_cm: 2.54,
            margin_cm: 2.54,
            color: [255, 0, 0],
        };
        draw_holes(&mut canvas, &options, 100.0);
        assert_eq!(*canvas.get_pixel(500, 100), Rgb([255, 0, 0]));
        assert_eq!(*canvas.get_pixel(850, 900), Rgb([255, 0, 0]));
        assert_eq!(*canvas.get_pixel(500, 500), Rgb([255, 255, 255]));
    }
}
