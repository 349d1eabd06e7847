//! Output tree layout: one directory per physical print size.

use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{PipelineError, Result};
use crate::image_processing::OutputFormat;
use crate::units::{format_cm, to_length};

static FOLDER_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*[x*×]\s*(\d+(?:\.\d+)?)\s*(?:cm)?")
        .expect("valid folder size pattern")
});

/// Printed size of an artifact, formatted for directory names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BucketLabel {
    pub width: String,
    pub height: String,
}

impl BucketLabel {
    /// Label from the real canvas size. The top margin is not part of the
    /// printed artwork and is subtracted from the height.
    pub fn from_canvas(width_px: u32, height_px: u32, resolution: f64, top_margin_cm: f64) -> Self {
        Self {
            width: format_cm(to_length(width_px, resolution)),
            height: format_cm(to_length(height_px, resolution) - top_margin_cm),
        }
    }

    pub fn cmyk_dir_name(&self) -> String {
        format!("{}_cmyk", self)
    }
}

impl fmt::Display for BucketLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}cm", self.width, self.height)
    }
}

fn create_dir(dir: PathBuf) -> Result<PathBuf> {
    fs::create_dir_all(&dir).map_err(|source| PipelineError::Write {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}

/// `<root>/<W>x<H>cm`, created if missing.
pub fn ensure_bucket_dir(root: &Path, label: &BucketLabel) -> Result<PathBuf> {
    create_dir(root.join(label.to_string()))
}

/// `<root>/<W>x<H>cm_cmyk`, created if missing.
pub fn ensure_cmyk_dir(root: &Path, label: &BucketLabel) -> Result<PathBuf> {
    create_dir(root.join(label.cmyk_dir_name()))
}

/// Encoding parameters for an artifact file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeOptions {
    pub format: OutputFormat,
    pub resolution: f64,
    /// JPEG quality, ignored for lossless formats.
    pub quality: u8,
}

/// Encode `image` to `<dir>/<name>.<ext>`.
///
/// The data goes to a hidden temporary file in the same directory first and
/// is renamed into place once fully written, so the final path either holds
/// a complete artifact or does not exist.
pub fn write_artifact(
    image: &RgbImage,
    dir: &Path,
    name: &str,
    options: &EncodeOptions,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", name, options.format.extension()));
    let io_err = |source: std::io::Error| PipelineError::Write {
        path: path.clone(),
        source,
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(io_err)?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        encode(image, &mut writer, options).map_err(|source| PipelineError::Encode {
            path: path.clone(),
            source,
        })?;
        writer.flush().map_err(io_err)?;
    }

    tmp.persist(&path).map_err(|e| io_err(e.error))?;
    log::debug!("wrote {}", path.display());
    Ok(path)
}

fn encode<W: Write + std::io::Seek>(
    image: &RgbImage,
    writer: &mut W,
    options: &EncodeOptions,
) -> image::ImageResult<()> {
    let (width, height) = image.dimensions();
    match options.format {
        OutputFormat::Jpg => {
            let mut encoder = JpegEncoder::new_with_quality(writer, options.quality);
            encoder.set_pixel_density(PixelDensity::dpi(dpi_value(options.resolution)));
            encoder.write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)
        }
        OutputFormat::Png => PngEncoder::new(writer).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
        ),
        OutputFormat::Tiff => TiffEncoder::new(writer).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
        ),
    }
}

fn dpi_value(resolution: f64) -> u16 {
    resolution.round().clamp(1.0, u16::MAX as f64) as u16
}

/// Physical size encoded in a folder name such as `30x40cm`, `30X40`,
/// `50*70.5` or `30×40`.
pub fn parse_dimensions(folder_name: &str) -> Option<(f64, f64)> {
    let caps = FOLDER_SIZE.captures(folder_name)?;
    let width: f64 = caps.get(1)?.as_str().parse().ok()?;
    let height: f64 = caps.get(2)?.as_str().parse().ok()?;
    if width > 0.0 && height > 0.0 {
        Some((width, height))
    } else {
        None
    }
}
