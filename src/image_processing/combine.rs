use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use super::resize::stretch_resize;
use super::{GuideOptions, GuideStyle};
use crate::bucket::BucketLabel;
use crate::error::Result;
use crate::units::to_pixels;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Share of the canvas height covered by each end of a segmented guide.
const SEGMENT_FRACTION: f64 = 0.2;

/// Physical geometry of a composited canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    /// Printed width of one half.
    pub width_cm: f64,
    pub height_cm: f64,
    /// Blank band above the artwork, also where the horizontal guide sits.
    pub top_margin_cm: f64,
    pub resolution: f64,
    pub guides: GuideOptions,
}

impl Layout {
    /// Pixel size every half is stretched to.
    pub fn half_size(&self) -> (u32, u32) {
        (
            to_pixels(self.width_cm, self.resolution),
            to_pixels(self.height_cm, self.resolution),
        )
    }

    pub fn top_margin_px(&self) -> u32 {
        to_pixels(self.top_margin_cm, self.resolution)
    }

    pub fn pair_canvas_size(&self) -> (u32, u32) {
        (
            to_pixels(self.width_cm * 2.0, self.resolution),
            to_pixels(self.height_cm + self.top_margin_cm, self.resolution),
        )
    }

    pub fn single_canvas_size(&self) -> (u32, u32) {
        (
            to_pixels(self.width_cm, self.resolution),
            to_pixels(self.height_cm + self.top_margin_cm, self.resolution),
        )
    }
}

/// A finished canvas together with what is needed to label it.
#[derive(Debug, Clone)]
pub struct CompositeImage {
    pub image: RgbImage,
    pub resolution: f64,
    pub top_margin_cm: f64,
}

impl CompositeImage {
    /// Bucket label computed from the pixels actually produced.
    pub fn label(&self) -> BucketLabel {
        let (width, height) = self.image.dimensions();
        BucketLabel::from_canvas(width, height, self.resolution, self.top_margin_cm)
    }
}

/// Stretch both halves to the target size and place them side by side below
/// the top margin.
pub fn compose_pair(left: &RgbImage, right: &RgbImage, layout: &Layout) -> Result<CompositeImage> {
    let (half_width, half_height) = layout.half_size();
    let (left, right) = rayon::join(
        || stretch_resize(left, half_width, half_height),
        || stretch_resize(right, half_width, half_height),
    );
    let (left, right) = (left?, right?);

    let (canvas_width, canvas_height) = layout.pair_canvas_size();
    let top = layout.top_margin_px() as i64;
    let mut canvas = RgbImage::from_pixel(canvas_width, canvas_height, WHITE);
    imageops::replace(&mut canvas, &left, 0, top);
    imageops::replace(&mut canvas, &right, left.width() as i64, top);

    draw_guides(&mut canvas, layout);
    log::debug!(
        "composited pair onto {}x{} canvas",
        canvas_width,
        canvas_height
    );

    Ok(CompositeImage {
        image: canvas,
        resolution: layout.resolution,
        top_margin_cm: layout.top_margin_cm,
    })
}

/// Single-image variant of [`compose_pair`].
pub fn compose_single(img: &RgbImage, layout: &Layout) -> Result<CompositeImage> {
    let (width, height) = layout.half_size();
    let resized = stretch_resize(img, width, height)?;

    let (canvas_width, canvas_height) = layout.single_canvas_size();
    let mut canvas = RgbImage::from_pixel(canvas_width, canvas_height, WHITE);
    imageops::replace(&mut canvas, &resized, 0, layout.top_margin_px() as i64);

    draw_guides(&mut canvas, layout);

    Ok(CompositeImage {
        image: canvas,
        resolution: layout.resolution,
        top_margin_cm: layout.top_margin_cm,
    })
}

/// Draw the calibration lines: a horizontal line along the top margin and a
/// vertical line through the horizontal center.
pub fn draw_guides(canvas: &mut RgbImage, layout: &Layout) {
    let guides = &layout.guides;
    if guides.style == GuideStyle::None {
        return;
    }

    let (width, height) = canvas.dimensions();
    let thickness = guides.width.to_pixels(layout.resolution);
    if width == 0 || height == 0 || thickness == 0 {
        return;
    }
    let color = Rgb(guides.color);

    let h_thickness = thickness.min(height);
    let y = layout
        .top_margin_px()
        .saturating_sub(thickness / 2)
        .min(height - h_thickness);
    fill(canvas, 0, y, width, h_thickness, color);

    let v_thickness = thickness.min(width);
    let x = (width / 2)
        .saturating_sub(thickness / 2)
        .min(width - v_thickness);
    match guides.style {
        GuideStyle::Full => fill(canvas, x, 0, v_thickness, height, color),
        GuideStyle::Segmented => {
            let segment = ((height as f64 * SEGMENT_FRACTION).round() as u32).max(1);
            fill(canvas, x, 0, v_thickness, segment, color);
            fill(canvas, x, height - segment, v_thickness, segment, color);
        }
        GuideStyle::None => {}
    }
}

fn fill(canvas: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    if width == 0 || height == 0 {
        return;
    }
    draw_filled_rect_mut(
        canvas,
        Rect::at(x as i32, y as i32).of_size(width, height),
        color,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::LineWidth;
    use image::ImageBuffer;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
    const GREY: Rgb<u8> = Rgb([0x80, 0x80, 0x80]);

    fn layout(style: GuideStyle) -> Layout {
        // 2.54 cm at 10 dpi is 10 px, keeps test canvases tiny
        Layout {
            width_cm: 2.54,
            height_cm: 5.08,
            top_margin_cm: 1.27,
            resolution: 10.0,
            guides: GuideOptions {
                style,
                width: LineWidth::Pixels(2),
                color: GREY.0,
            },
        }
    }

    #[test]
    fn test_print_size_canvas_dimensions() {
        let layout = Layout {
            width_cm: 30.0,
            height_cm: 180.0,
            top_margin_cm: 2.5,
            resolution: 300.0,
            guides: GuideOptions::default(),
        };
        assert_eq!(layout.pair_canvas_size(), (7087, 21555));
        assert_eq!(layout.half_size(), (3543, 21260));
        assert_eq!(layout.top_margin_px(), 295);
        assert_eq!(layout.single_canvas_size(), (3543, 21555));
    }

    #[test]
    fn test_compose_pair_places_halves_below_margin() {
        let left = ImageBuffer::from_pixel(10, 20, RED);
        let right = ImageBuffer::from_pixel(10, 20, GREEN);
        let composite = compose_pair(&left, &right, &layout(GuideStyle::None)).unwrap();

        assert_eq!(composite.image.dimensions(), (20, 25));
        // margin band stays white
        assert_eq!(*composite.image.get_pixel(3, 2), WHITE);
        assert_eq!(*composite.image.get_pixel(3, 10), RED);
        assert_eq!(*composite.image.get_pixel(15, 20), GREEN);
    }

    #[test]
    fn test_full_guides() {
        let left = ImageBuffer::from_pixel(10, 20, RED);
        let right = ImageBuffer::from_pixel(10, 20, GREEN);
        let composite = compose_pair(&left, &right, &layout(GuideStyle::Full)).unwrap();
        let img = &composite.image;

        // horizontal line centered on y = 5
        assert_eq!(*img.get_pixel(2, 4), GREY);
        assert_eq!(*img.get_pixel(2, 5), GREY);
        assert_eq!(*img.get_pixel(2, 6), RED);
        assert_eq!(*img.get_pixel(2, 3), WHITE);
        // vertical line centered on x = 10, full height
        for y in [0, 12, 24] {
            assert_eq!(*img.get_pixel(9, y), GREY);
            assert_eq!(*img.get_pixel(10, y), GREY);
        }
        assert_eq!(*img.get_pixel(8, 12), RED);
        assert_eq!(*img.get_pixel(11, 12), GREEN);
    }

    #[test]
    fn test_segmented_guides_leave_middle_clear() {
        let left = ImageBuffer::from_pixel(10, 20, RED);
        let right = ImageBuffer::from_pixel(10, 20, GREEN);
        let composite = compose_pair(&left, &right, &layout(GuideStyle::Segmented)).unwrap();
        let img = &composite.image;

        // segments are the top and bottom 5 rows of a 25 px canvas
        assert_eq!(*img.get_pixel(10, 0), GREY);
        assert_eq!(*img.get_pixel(10, 24), GREY);
        assert_eq!(*img.get_pixel(10, 12), GREEN);
        assert_eq!(*img.get_pixel(9, 12), RED);
    }

    #[test]
    fn test_horizontal_guide_is_clamped_into_canvas() {
        let mut canvas = RgbImage::from_pixel(10, 10, WHITE);
        let mut layout = layout(GuideStyle::Full);
        layout.top_margin_cm = 100.0;
        draw_guides(&mut canvas, &layout);
        assert_eq!(*canvas.get_pixel(0, 9), GREY);
        assert_eq!(*canvas.get_pixel(0, 8), GREY);
        assert_eq!(*canvas.get_pixel(0, 7), WHITE);
    }

    #[test]
    fn test_millimeter_guide_width() {
        let mut canvas = RgbImage::from_pixel(40, 40, WHITE);
        let mut layout = layout(GuideStyle::Full);
        // 7.62 mm at 10 dpi is 3 px
        layout.guides.width = LineWidth::Millimeters(7.62);
        layout.top_margin_cm = 0.0;
        draw_guides(&mut canvas, &layout);
        let vertical: Vec<u32> = (0..40).filter(|&x| *canvas.get_pixel(x, 20) == GREY).collect();
        assert_eq!(vertical, vec![19, 20, 21]);
    }

    #[test]
    fn test_compose_single() {
        let img = ImageBuffer::from_pixel(10, 20, RED);
        let composite = compose_single(&img, &layout(GuideStyle::None)).unwrap();
        assert_eq!(composite.image.dimensions(), (10, 25));
        assert_eq!(*composite.image.get_pixel(5, 0), WHITE);
        assert_eq!(*composite.image.get_pixel(5, 24), RED);
    }

    #[test]
    fn test_label_from_actual_pixels() {
        let composite = CompositeImage {
            image: RgbImage::new(7087, 1),
            resolution: 300.0,
            top_margin_cm: 0.0,
        };
        assert_eq!(composite.label().width, "60");
    }
}
