use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::image_processing::{
    BatchMode, GuideOptions, GuideStyle, HoleOptions, OutputFormat, ProcessingConfig,
};
use crate::pairing::RoleInference;
use crate::units::LineWidth;
use crate::utils::parse_hex_color;

/// Settings file shared by `--config` and the GUI.
///
/// Every field is optional so that a file can set only what it cares about;
/// unset fields fall back to the next layer and finally to the defaults of
/// [`ProcessingConfig::new`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BatchMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_margin_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide_style: Option<GuideStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide_width_px: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide_width_mm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_inference: Option<RoleInference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmyk: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmyk_quality: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    /// Number of hole marks; unset means no holes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole_diameter_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole_margin_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Layer `self` on top of `base`: every value set here wins.
    pub fn merged_over(self, base: ConfigFile) -> ConfigFile {
        // the two guide width units replace each other as one setting
        let (guide_width_px, guide_width_mm) =
            if self.guide_width_px.is_some() || self.guide_width_mm.is_some() {
                (self.guide_width_px, self.guide_width_mm)
            } else {
                (base.guide_width_px, base.guide_width_mm)
            };

        ConfigFile {
            input_path: self.input_path.or(base.input_path),
            output_path: self.output_path.or(base.output_path),
            mode: self.mode.or(base.mode),
            width_cm: self.width_cm.or(base.width_cm),
            height_cm: self.height_cm.or(base.height_cm),
            resolution: self.resolution.or(base.resolution),
            top_margin_cm: self.top_margin_cm.or(base.top_margin_cm),
            guide_style: self.guide_style.or(base.guide_style),
            guide_width_px,
            guide_width_mm,
            guide_color: self.guide_color.or(base.guide_color),
            role_inference: self.role_inference.or(base.role_inference),
            cmyk: self.cmyk.or(base.cmyk),
            cmyk_quality: self.cmyk_quality.or(base.cmyk_quality),
            format: self.format.or(base.format),
            quality: self.quality.or(base.quality),
            holes: self.holes.or(base.holes),
            hole_diameter_cm: self.hole_diameter_cm.or(base.hole_diameter_cm),
            hole_margin_cm: self.hole_margin_cm.or(base.hole_margin_cm),
            hole_color: self.hole_color.or(base.hole_color),
            extensions: self.extensions.or(base.extensions),
            dry_run: self.dry_run.or(base.dry_run),
        }
    }

    fn guides(&self) -> Result<GuideOptions, ConfigError> {
        let mut guides = GuideOptions::default();
        if let Some(style) = self.guide_style {
            guides.style = style;
        }
        if let Some(mm) = self.guide_width_mm {
            guides.width = LineWidth::Millimeters(mm);
        } else if let Some(px) = self.guide_width_px {
            guides.width = LineWidth::Pixels(px);
        }
        if let Some(color) = &self.guide_color {
            guides.color = parse_hex_color(color)?;
        }
        Ok(guides)
    }

    fn hole_options(&self) -> Result<Option<HoleOptions>, ConfigError> {
        let Some(count) = self.holes else {
            return Ok(None);
        };
        let mut holes = HoleOptions {
            count,
            ..HoleOptions::default()
        };
        if let Some(diameter) = self.hole_diameter_cm {
            holes.diameter_cm = diameter;
        }
        if let Some(margin) = self.hole_margin_cm {
            holes.margin_cm = margin;
        }
        if let Some(color) = &self.hole_color {
            holes.color = parse_hex_color(color)?;
        }
        Ok(Some(holes))
    }

    /// Build a validated [`ProcessingConfig`] from the set values.
    pub fn to_processing_config(
        &self,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<ProcessingConfig, ConfigError> {
        let mut config = ProcessingConfig::new(input_dir, output_dir);
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(width) = self.width_cm {
            config.width_cm = width;
        }
        if let Some(height) = self.height_cm {
            config.height_cm = height;
        }
        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
        if let Some(top) = self.top_margin_cm {
            config.top_margin_cm = top;
        }
        config.guides = self.guides()?;
        config.holes = self.hole_options()?;
        if let Some(policy) = self.role_inference {
            config.role_inference = policy;
        }
        config.cmyk = self.cmyk.unwrap_or(false);
        if let Some(q) = self.cmyk_quality {
            config.cmyk_quality = q;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(q) = self.quality {
            config.quality = q;
        }
        if let Some(extensions) = &self.extensions {
            config.extensions = extensions.clone();
        }
        config.dry_run = self.dry_run.unwrap_or(false);

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let cfg: ConfigFile =
            serde_json::from_str(r#"{"widthCm": 40, "guideStyle": "segmented"}"#).unwrap();
        assert_eq!(cfg.width_cm, Some(40.0));
        assert_eq!(cfg.guide_style, Some(GuideStyle::Segmented));
        assert_eq!(cfg.height_cm, None);
    }

    #[test]
    fn test_merge_prefers_top_layer() {
        let top = ConfigFile {
            resolution: Some(150.0),
            ..Default::default()
        };
        let base = ConfigFile {
            resolution: Some(300.0),
            quality: Some(80),
            ..Default::default()
        };
        let merged = top.merged_over(base);
        assert_eq!(merged.resolution, Some(150.0));
        assert_eq!(merged.quality, Some(80));
    }

    #[test]
    fn test_guide_width_units_replace_each_other() {
        let top = ConfigFile {
            guide_width_px: Some(4),
            ..Default::default()
        };
        let base = ConfigFile {
            guide_width_mm: Some(0.5),
            ..Default::default()
        };
        let merged = top.merged_over(base);
        let config = merged.to_processing_config("in", "out").unwrap();
        assert_eq!(config.guides.width, LineWidth::Pixels(4));
    }

    #[test]
    fn test_holes_and_colors() {
        let cfg = ConfigFile {
            holes: Some(8),
            hole_diameter_cm: Some(0.6),
            guide_color: Some("#000000".into()),
            ..Default::default()
        };
        let config = cfg.to_processing_config("in", "out").unwrap();
        let holes = config.holes.unwrap();
        assert_eq!(holes.count, 8);
        assert_eq!(holes.diameter_cm, 0.6);
        assert_eq!(holes.margin_cm, 2.0);
        assert_eq!(config.guides.color, [0, 0, 0]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_color = ConfigFile {
            guide_color: Some("grey".into()),
            ..Default::default()
        };
        assert!(matches!(
            bad_color.to_processing_config("in", "out"),
            Err(ConfigError::Color(_))
        ));

        let bad_holes = ConfigFile {
            holes: Some(7),
            ..Default::default()
        };
        assert_eq!(
            bad_holes.to_processing_config("in", "out").unwrap_err(),
            ConfigError::HoleCount(7)
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let cfg = ConfigFile {
            input_path: Some(PathBuf::from("scans")),
            mode: Some(BatchMode::FolderSize),
            role_inference: Some(RoleInference::PreferRight),
            ..Default::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(ConfigFile::load(&path).unwrap(), cfg);
    }
}
