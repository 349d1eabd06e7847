use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::RgbImage;

use crate::error::{PipelineError, Result};

/// Resize to exact dimensions, ignoring the source aspect ratio.
///
/// Scroll halves are scanned with arbitrary borders and always printed at a
/// fixed physical size, so the image is stretched rather than cropped.
pub fn stretch_resize(img: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    let (src_width, src_height) = img.dimensions();
    let fail = |reason: String| PipelineError::Resize {
        width,
        height,
        reason,
    };

    if width == 0 || height == 0 {
        return Err(fail("target dimension is zero".to_string()));
    }
    if src_width == 0 || src_height == 0 {
        return Err(fail("source image is empty".to_string()));
    }
    if src_width == width && src_height == height {
        return Ok(img.clone());
    }

    let src_image = Image::from_vec_u8(src_width, src_height, img.as_raw().clone(), PixelType::U8x3)
        .map_err(|e| fail(e.to_string()))?;
    let mut dst_image = Image::new(width, height, PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));
    let mut resizer = Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| fail(e.to_string()))?;

    RgbImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| fail("resized buffer has unexpected length".to_string()))
}
