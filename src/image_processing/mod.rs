pub mod combine;
pub mod holes;
pub mod resize;

use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumIter, EnumString};
use walkdir::WalkDir;

use crate::bucket::parse_dimensions;
use crate::error::{ConfigError, PipelineError};
use crate::pairing::RoleInference;
use crate::units::LineWidth;
use crate::utils::has_valid_extension;

pub use combine::{compose_pair, compose_single, draw_guides, CompositeImage, Layout};
pub use holes::{draw_holes, HoleOptions};
pub use resize::stretch_resize;

pub const DEFAULT_RESOLUTION: f64 = 300.0;
pub const DEFAULT_TOP_MARGIN_CM: f64 = 2.5;
pub const DEFAULT_WIDTH_CM: f64 = 30.0;
pub const DEFAULT_HEIGHT_CM: f64 = 180.0;
pub const DEFAULT_QUALITY: u8 = 95;
pub const DEFAULT_GUIDE_COLOR: [u8; 3] = [0x80, 0x80, 0x80];
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// What a batch produces from the input directory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum BatchMode {
    /// Pair left/right files and composite each pair side by side.
    #[default]
    #[strum(to_string = "merge")]
    #[serde(rename = "merge")]
    MergePairs,
    /// Resize every file on its own onto a canvas with a top margin.
    #[strum(to_string = "single")]
    #[serde(rename = "single")]
    SingleImage,
    /// Stretch images in sub-folders named after a size, e.g. `30x40cm`.
    FolderSize,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GuideStyle {
    /// Vertical guide across the whole height.
    #[default]
    Full,
    /// Vertical guide only in the top and bottom fifth.
    Segmented,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuideOptions {
    pub style: GuideStyle,
    pub width: LineWidth,
    pub color: [u8; 3],
}

impl Default for GuideOptions {
    fn default() -> Self {
        Self {
            style: GuideStyle::Full,
            width: LineWidth::default(),
            color: DEFAULT_GUIDE_COLOR,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[strum(to_string = "jpg", serialize = "jpeg")]
    #[serde(alias = "jpeg")]
    Jpg,
    Png,
    #[strum(to_string = "tiff", serialize = "tif")]
    #[serde(alias = "tif")]
    Tiff,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Tiff => "tiff",
        }
    }
}

/// Everything a batch needs, fixed before the worker starts.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mode: BatchMode,
    pub width_cm: f64,
    pub height_cm: f64,
    pub resolution: f64,
    pub top_margin_cm: f64,
    pub guides: GuideOptions,
    pub holes: Option<HoleOptions>,
    pub role_inference: RoleInference,
    pub format: OutputFormat,
    pub quality: u8,
    /// Convert every produced artifact to CMYK through the external tool.
    pub cmyk: bool,
    pub cmyk_quality: u8,
    pub extensions: Vec<String>,
    /// Pair and report without writing anything.
    pub dry_run: bool,
}

impl ProcessingConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            mode: BatchMode::default(),
            width_cm: DEFAULT_WIDTH_CM,
            height_cm: DEFAULT_HEIGHT_CM,
            resolution: DEFAULT_RESOLUTION,
            top_margin_cm: DEFAULT_TOP_MARGIN_CM,
            guides: GuideOptions::default(),
            holes: None,
            role_inference: RoleInference::default(),
            format: OutputFormat::default(),
            quality: DEFAULT_QUALITY,
            cmyk: false,
            cmyk_quality: DEFAULT_QUALITY,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            dry_run: false,
        }
    }

    /// Reject values that would produce empty canvases or unreadable output.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(ConfigError::Resolution(self.resolution));
        }
        if self.mode != BatchMode::FolderSize
            && !(self.width_cm > 0.0 && self.height_cm > 0.0)
        {
            return Err(ConfigError::TargetSize {
                width: self.width_cm,
                height: self.height_cm,
            });
        }
        if !self.top_margin_cm.is_finite() || self.top_margin_cm < 0.0 {
            return Err(ConfigError::TopMargin(self.top_margin_cm));
        }
        if self.guides.style != GuideStyle::None && !self.guides.width.is_positive() {
            return Err(ConfigError::GuideWidth);
        }
        for quality in [self.quality, self.cmyk_quality] {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::Quality(quality));
            }
        }
        if let Some(holes) = &self.holes {
            holes.validate()?;
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        Ok(())
    }

    /// Canvas geometry for the merge and single-image modes.
    pub fn layout(&self) -> Layout {
        Layout {
            width_cm: self.width_cm,
            height_cm: self.height_cm,
            top_margin_cm: self.top_margin_cm,
            resolution: self.resolution,
            guides: self.guides,
        }
    }
}

/// Decode an image file into 8-bit RGB.
pub fn load_rgb(path: &Path) -> crate::error::Result<RgbImage> {
    let img = image::open(path).map_err(|source| PipelineError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgb8())
}

/// List the image files directly inside `dir`, sorted by path.
pub fn discover_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    log::debug!("Scanning directory: {}", dir.display());

    let mut image_files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && has_valid_extension(path, extensions) {
            image_files.push(path.to_path_buf());
        }
    }

    image_files.sort();
    log::debug!("Found {} image files", image_files.len());
    Ok(image_files)
}

/// A sub-folder whose name encodes the physical size of its images.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeFolder {
    pub path: PathBuf,
    pub width_cm: f64,
    pub height_cm: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SizeFolders {
    pub sized: Vec<SizeFolder>,
    /// Sub-folders whose name does not parse as a size.
    pub skipped: Vec<PathBuf>,
}

/// Classify the immediate sub-folders of `root` by the size in their name.
pub fn discover_size_folders(root: &Path) -> Result<SizeFolders> {
    let mut folders = SizeFolders::default();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to read {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        match parse_dimensions(&name) {
            Some((width_cm, height_cm)) => folders.sized.push(SizeFolder {
                path: entry.path().to_path_buf(),
                width_cm,
                height_cm,
            }),
            None => {
                log::warn!("Skipping folder without a size in its name: {}", name);
                folders.skipped.push(entry.path().to_path_buf());
            }
        }
    }

    Ok(folders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::str::FromStr;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProcessingConfig::new("in", "out");
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.extensions.len(), 7);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ProcessingConfig::new("in", "out");
        config.resolution = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::Resolution(0.0)));

        let mut config = ProcessingConfig::new("in", "out");
        config.top_margin_cm = -1.0;
        assert_eq!(config.validate(), Err(ConfigError::TopMargin(-1.0)));

        let mut config = ProcessingConfig::new("in", "out");
        config.guides.width = LineWidth::Pixels(0);
        assert_eq!(config.validate(), Err(ConfigError::GuideWidth));
        config.guides.style = GuideStyle::None;
        assert_eq!(config.validate(), Ok(()));

        let mut config = ProcessingConfig::new("in", "out");
        config.quality = 0;
        assert_eq!(config.validate(), Err(ConfigError::Quality(0)));

        let mut config = ProcessingConfig::new("in", "out");
        config.extensions.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoExtensions));
    }

    #[test]
    fn test_folder_size_mode_ignores_target_size() {
        let mut config = ProcessingConfig::new("in", "out");
        config.width_cm = 0.0;
        assert!(config.validate().is_err());
        config.mode = BatchMode::FolderSize;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_enum_names() {
        assert_eq!(BatchMode::from_str("merge").unwrap(), BatchMode::MergePairs);
        assert_eq!(BatchMode::from_str("folder-size").unwrap(), BatchMode::FolderSize);
        assert_eq!(BatchMode::SingleImage.to_string(), "single");
        assert_eq!(OutputFormat::from_str("jpeg").unwrap(), OutputFormat::Jpg);
        assert_eq!(OutputFormat::Tiff.extension(), "tiff");
        assert_eq!(GuideStyle::from_str("segmented").unwrap(), GuideStyle::Segmented);
    }

    #[test]
    fn test_discover_images_is_flat_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.JPG"), b"").unwrap();
        fs::write(dir.path().join("a.png"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.jpg"), b"").unwrap();

        let extensions: Vec<String> = DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        let found = discover_images(dir.path(), &extensions).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG"]);
    }

    #[test]
    fn test_discover_size_folders() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("30x40cm")).unwrap();
        fs::create_dir(dir.path().join("misc")).unwrap();
        fs::create_dir(dir.path().join("50*70.5")).unwrap();
        fs::write(dir.path().join("20x20cm.jpg"), b"").unwrap();

        let folders = discover_size_folders(dir.path()).unwrap();
        assert_eq!(folders.sized.len(), 2);
        assert_eq!(folders.sized[0].width_cm, 30.0);
        assert_eq!(folders.sized[0].height_cm, 40.0);
        assert_eq!(folders.sized[1].height_cm, 70.5);
        assert_eq!(folders.skipped.len(), 1);
    }
}
