use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::config_file::ConfigFile;
use crate::image_processing::{BatchMode, GuideStyle, OutputFormat};
use crate::pairing::RoleInference;

/// Physical print size in centimeters, parsed from `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintSize {
    pub width_cm: f64,
    pub height_cm: f64,
}

/// Parse `30x180`, `30X180`, `30*180` or `30x180cm`.
pub fn parse_size(s: &str) -> Result<PrintSize, String> {
    let invalid = || format!("Invalid size '{}'. Expected WIDTHxHEIGHT in cm, e.g. 30x180", s);
    let trimmed = s.trim().trim_end_matches("cm").trim_end_matches("CM");
    let (w, h) = trimmed
        .split_once(|c| matches!(c, 'x' | 'X' | '*'))
        .ok_or_else(invalid)?;
    let width_cm: f64 = w.trim().parse().map_err(|_| invalid())?;
    let height_cm: f64 = h.trim().parse().map_err(|_| invalid())?;
    if !(width_cm > 0.0 && height_cm > 0.0) {
        return Err(invalid());
    }
    Ok(PrintSize {
        width_cm,
        height_cm,
    })
}

#[derive(Parser, Debug, Default)]
#[command(
    name = "couplet-processor",
    version,
    about = "Pair, composite and bucket two-part scroll artworks for print",
    long_about = "
Couplet Processor

Pairs the left and right halves of two-part scroll artworks by file name,
composites each pair side by side at physical print size with calibration
guides, and writes the result into a folder named after its actual size
(e.g. 60x180cm). Optionally converts every artifact to CMYK through
ImageMagick.

Recognized file names (role 1 = left, 2 = right):
  Mountain(1).jpg / Mountain(2).jpg
  Mountain(1)_3.jpg / Mountain(2)_3.jpg
  Mountain_1_3.jpg / Mountain_2_3.jpg
  Mountain-1.jpg / Mountain-2.jpg
  Mountain-1--3--1.jpg / Mountain-2--3--1.jpg

Example Usage:
  # Merge pairs at 30x180 cm per half, 300 dpi
  couplet-processor -i ~/scans -o ~/print

  # Custom size, thinner segmented guides and CMYK copies
  couplet-processor -i ~/scans -o ~/print -s 40x120 --guide-style segmented \\
    --guide-width-mm 0.5 --cmyk

  # Resize every image on its own
  couplet-processor -i ~/scans -o ~/print --mode single

  # Stretch images in sub-folders named after a size, with hole marks
  couplet-processor -i ~/orders -o ~/print --mode folder-size --holes 6

  # Show what would be paired without writing anything
  couplet-processor -i ~/scans -o ~/print --dry-run --verbose"
)]
pub struct Args {
    /// Input directory with the image files
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Output root; artifacts land in <size>cm sub-folders
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Size of one half in centimeters (default 30x180)
    #[arg(short = 's', long = "size", value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<PrintSize>,

    /// Batch mode: merge, single or folder-size (default merge)
    #[arg(long = "mode", value_name = "MODE")]
    pub mode: Option<BatchMode>,

    /// Output resolution in DPI (default 300)
    #[arg(long = "resolution", value_name = "DPI")]
    pub resolution: Option<f64>,

    /// Blank margin above the artwork in centimeters (default 2.5)
    #[arg(long = "top-margin", value_name = "CM")]
    pub top_margin: Option<f64>,

    /// Guide line width in pixels (default 2)
    #[arg(long = "guide-width", value_name = "PX", conflicts_with = "guide_width_mm")]
    pub guide_width: Option<u32>,

    /// Guide line width in millimeters at the output resolution
    #[arg(long = "guide-width-mm", value_name = "MM")]
    pub guide_width_mm: Option<f64>,

    /// Guide style: full, segmented or none (default full)
    #[arg(long = "guide-style", value_name = "STYLE")]
    pub guide_style: Option<GuideStyle>,

    /// Guide color as hex RGB (default #808080)
    #[arg(long = "guide-color", value_name = "#RRGGBB")]
    pub guide_color: Option<String>,

    /// Role for files named Key(n)_k: complement, prefer-left or prefer-right
    #[arg(long = "role-inference", value_name = "POLICY")]
    pub role_inference: Option<RoleInference>,

    /// Also write a CMYK JPEG of every artifact (requires ImageMagick)
    #[arg(long = "cmyk")]
    pub cmyk: bool,

    /// JPEG quality of the CMYK copies, 1-100 (default 95)
    #[arg(long = "cmyk-quality", value_name = "Q")]
    pub cmyk_quality: Option<u8>,

    /// Artifact format: jpg, png or tiff (default jpg)
    #[arg(long = "format", value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// JPEG quality, 1-100 (default 95)
    #[arg(long = "quality", value_name = "Q")]
    pub quality: Option<u8>,

    /// Draw punch-hole marks (6 or 8) in folder-size mode
    #[arg(long = "holes", value_name = "COUNT")]
    pub holes: Option<u32>,

    /// Hole diameter in centimeters (default 1.0)
    #[arg(long = "hole-diameter", value_name = "CM")]
    pub hole_diameter: Option<f64>,

    /// Hole distance from the edges in centimeters (default 2.0)
    #[arg(long = "hole-margin", value_name = "CM")]
    pub hole_margin: Option<f64>,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", value_name = "LIST")]
    pub extensions: Option<String>,

    /// JSON configuration file; command-line flags take precedence
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit progress as JSON lines on stdout
    #[arg(long = "json-progress")]
    pub json_progress: bool,

    /// Pair and report without writing files
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    pub fn parse_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|list| {
            list.split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect()
        })
    }

    /// Command-line values as a config layer, unset flags left empty.
    pub fn to_config_file(&self) -> ConfigFile {
        ConfigFile {
            input_path: self.input.clone(),
            output_path: self.output.clone(),
            mode: self.mode,
            width_cm: self.size.map(|s| s.width_cm),
            height_cm: self.size.map(|s| s.height_cm),
            resolution: self.resolution,
            top_margin_cm: self.top_margin,
            guide_style: self.guide_style,
            guide_width_px: self.guide_width,
            guide_width_mm: self.guide_width_mm,
            guide_color: self.guide_color.clone(),
            role_inference: self.role_inference,
            cmyk: self.cmyk.then_some(true),
            cmyk_quality: self.cmyk_quality,
            format: self.format,
            quality: self.quality,
            holes: self.holes,
            hole_diameter_cm: self.hole_diameter,
            hole_margin_cm: self.hole_margin,
            hole_color: None,
            extensions: self.parse_extensions(),
            dry_run: self.dry_run.then_some(true),
        }
    }

    /// Effective settings: command line over `--config` file over defaults.
    pub fn resolve_settings(&self) -> Result<ConfigFile> {
        let cli = self.to_config_file();
        match &self.config {
            Some(path) => {
                let file = ConfigFile::load(path)?;
                log::debug!("Loaded configuration from {}", path.display());
                Ok(cli.merged_over(file))
            }
            None => Ok(cli),
        }
    }

    /// Input and output directories, required from either layer.
    pub fn directories(settings: &ConfigFile) -> Result<(PathBuf, PathBuf)> {
        let input = settings
            .input_path
            .clone()
            .ok_or_else(|| anyhow!("No input directory given (use -i or the config file)"))?;
        let output = settings
            .output_path
            .clone()
            .ok_or_else(|| anyhow!("No output directory given (use -o or the config file)"))?;
        Ok((input, output))
    }

    pub fn to_processing_config(&self) -> Result<crate::image_processing::ProcessingConfig> {
        let settings = self.resolve_settings()?;
        let (input, output) = Self::directories(&settings)?;
        settings
            .to_processing_config(input, output)
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(
            parse_size("30x180"),
            Ok(PrintSize {
                width_cm: 30.0,
                height_cm: 180.0
            })
        );
        assert_eq!(parse_size("40.5X120cm").map(|s| s.width_cm), Ok(40.5));
        assert_eq!(parse_size("30*60").map(|s| s.height_cm), Ok(60.0));
        assert!(parse_size("30").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("axb").is_err());
    }

    #[test]
    fn test_flags_parse() {
        let args = Args::try_parse_from([
            "couplet-processor",
            "-i",
            "in",
            "-o",
            "out",
            "--mode",
            "folder-size",
            "--guide-style",
            "segmented",
            "--role-inference",
            "prefer-left",
            "--format",
            "png",
            "--extensions",
            "JPG, .png",
        ])
        .unwrap();
        assert_eq!(args.mode, Some(BatchMode::FolderSize));
        assert_eq!(args.guide_style, Some(GuideStyle::Segmented));
        assert_eq!(args.role_inference, Some(RoleInference::PreferLeft));
        assert_eq!(args.format, Some(OutputFormat::Png));
        assert_eq!(
            args.parse_extensions(),
            Some(vec!["jpg".to_string(), "png".to_string()])
        );
    }

    #[test]
    fn test_guide_width_flags_conflict() {
        let result = Args::try_parse_from([
            "couplet-processor",
            "--guide-width",
            "3",
            "--guide-width-mm",
            "0.5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_without_flags() {
        let args = Args::try_parse_from(["couplet-processor", "-i", "in", "-o", "out"]).unwrap();
        let config = args.to_processing_config().unwrap();
        assert_eq!(config.mode, BatchMode::MergePairs);
        assert_eq!(config.resolution, 300.0);
        assert_eq!(config.width_cm, 30.0);
        assert_eq!(config.height_cm, 180.0);
        assert!(!config.cmyk);
    }

    #[test]
    fn test_missing_directories() {
        let args = Args::try_parse_from(["couplet-processor", "-i", "in"]).unwrap();
        assert!(args.to_processing_config().is_err());
    }

    #[test]
    fn test_config_file_is_overridden_by_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"inputPath":"scans","outputPath":"print","resolution":150,"mode":"single","cmyk":true}"#,
        )
        .unwrap();

        let args = Args::try_parse_from([
            "couplet-processor",
            "--config",
            path.to_str().unwrap(),
            "--resolution",
            "200",
        ])
        .unwrap();
        let config = args.to_processing_config().unwrap();
        assert_eq!(config.resolution, 200.0);
        assert_eq!(config.mode, BatchMode::SingleImage);
        assert!(config.cmyk);
        assert_eq!(config.input_dir, PathBuf::from("scans"));
    }
}
