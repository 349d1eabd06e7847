use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{ColorMode, ColorTool, DocumentHandle, ToolFactory};
use crate::error::ToolError;

/// Command lines for the installed ImageMagick major version.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Commands {
    convert: Vec<&'static str>,
    identify: Vec<&'static str>,
}

impl Commands {
    /// `magick` for v7, `convert`/`identify` for v6.
    fn detect() -> Option<Self> {
        if probe("magick") {
            Some(Self {
                convert: vec!["magick"],
                identify: vec!["magick", "identify"],
            })
        } else if probe("convert") {
            Some(Self {
                convert: vec!["convert"],
                identify: vec!["identify"],
            })
        } else {
            None
        }
    }

    fn command(parts: &[&'static str]) -> Command {
        let mut cmd = Command::new(parts[0]);
        cmd.args(&parts[1..]);
        cmd
    }
}

fn probe(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub(crate) fn parse_colorspace(name: &str) -> ColorMode {
    match name.trim() {
        "CMYK" | "CMYKA" => ColorMode::Cmyk,
        "sRGB" | "RGB" | "scRGB" => ColorMode::Rgb,
        "Gray" | "LinearGray" => ColorMode::Grayscale,
        other => ColorMode::Other(other.to_string()),
    }
}

#[derive(Debug)]
struct Document {
    source: PathBuf,
    target: Option<ColorMode>,
    /// Last file written by `save_as`; the reported mode is read from here.
    saved: Option<PathBuf>,
}

/// [`ColorTool`] backed by the ImageMagick command line.
///
/// ImageMagick has no open documents, so a document is the source path plus
/// the requested mode. The mode change is applied when the document is
/// saved, and [`ColorTool::color_mode`] reads the colorspace of the last
/// saved file.
pub struct ImageMagickTool {
    commands: Commands,
    documents: HashMap<u64, Document>,
    next_handle: u64,
}

impl ImageMagickTool {
    pub fn launch() -> Result<Self, ToolError> {
        let commands = Commands::detect().ok_or_else(|| {
            ToolError::Unavailable(
                "ImageMagick not found (tried 'magick' and 'convert')".to_string(),
            )
        })?;
        log::debug!("Using ImageMagick command: {}", commands.convert.join(" "));
        Ok(Self {
            commands,
            documents: HashMap::new(),
            next_handle: 0,
        })
    }

    fn document(&self, handle: DocumentHandle) -> Result<&Document, ToolError> {
        self.documents
            .get(&handle.0)
            .ok_or(ToolError::UnknownHandle(handle.0))
    }

    fn identify(&self, path: &Path) -> Result<ColorMode, ToolError> {
        let output = Commands::command(&self.commands.identify)
            .arg("-format")
            .arg("%[colorspace]")
            .arg(format!("{}[0]", path.display()))
            .output()?;
        if !output.status.success() {
            return Err(ToolError::operation(
                "color_mode",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_colorspace(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl ColorTool for ImageMagickTool {
    fn open(&mut self, path: &Path) -> Result<DocumentHandle, ToolError> {
        if !path.is_file() {
            return Err(ToolError::operation(
                "open",
                format!("{} does not exist", path.display()),
            ));
        }
        self.next_handle += 1;
        self.documents.insert(
            self.next_handle,
            Document {
                source: path.to_path_buf(),
                target: None,
                saved: None,
            },
        );
        Ok(DocumentHandle(self.next_handle))
    }

    fn color_mode(&mut self, handle: DocumentHandle) -> Result<ColorMode, ToolError> {
        let doc = self.document(handle)?;
        let path = doc.saved.as_ref().unwrap_or(&doc.source).clone();
        self.identify(&path)
    }

    fn set_color_mode(&mut self, handle: DocumentHandle, mode: ColorMode) -> Result<(), ToolError> {
        let doc = self
            .documents
            .get_mut(&handle.0)
            .ok_or(ToolError::UnknownHandle(handle.0))?;
        doc.target = Some(mode);
        Ok(())
    }

    fn save_as(&mut self, handle: DocumentHandle, path: &Path, quality: u8) -> Result<(), ToolError> {
        let doc = self.document(handle)?;
        let mut cmd = Commands::command(&self.commands.convert);
        cmd.arg(&doc.source);
        match &doc.target {
            Some(ColorMode::Cmyk) => {
                cmd.args(["-colorspace", "CMYK"]);
            }
            Some(ColorMode::Rgb) => {
                cmd.args(["-colorspace", "sRGB"]);
            }
            Some(ColorMode::Grayscale) => {
                cmd.args(["-colorspace", "Gray"]);
            }
            Some(ColorMode::Other(name)) => {
                cmd.args(["-colorspace", name.as_str()]);
            }
            None => {}
        }
        cmd.arg("-quality")
            .arg(quality.to_string())
            .arg(format!("jpg:{}", path.display()));

        let output = cmd.output()?;
        if !output.status.success() {
            return Err(ToolError::operation(
                "save_as",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        if let Some(doc) = self.documents.get_mut(&handle.0) {
            doc.saved = Some(path.to_path_buf());
        }
        Ok(())
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), ToolError> {
        self.documents
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(ToolError::UnknownHandle(handle.0))
    }
}

/// Launches [`ImageMagickTool`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageMagickFactory;

impl ToolFactory for ImageMagickFactory {
    fn name(&self) -> &str {
        "ImageMagick"
    }

    fn launch(&self) -> Result<Box<dyn ColorTool>, ToolError> {
        Ok(Box::new(ImageMagickTool::launch()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colorspace() {
        assert_eq!(parse_colorspace("CMYK\n"), ColorMode::Cmyk);
        assert_eq!(parse_colorspace("sRGB"), ColorMode::Rgb);
        assert_eq!(parse_colorspace("Gray"), ColorMode::Grayscale);
        assert_eq!(parse_colorspace("Lab"), ColorMode::Other("Lab".into()));
    }

    fn tool() -> ImageMagickTool {
        ImageMagickTool {
            commands: Commands {
                convert: vec!["convert"],
                identify: vec!["identify"],
            },
            documents: HashMap::new(),
            next_handle: 0,
        }
    }

    #[test]
    fn test_handles_are_tracked() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut tool = tool();
        let a = tool.open(file.path()).unwrap();
        let b = tool.open(file.path()).unwrap();
        assert_ne!(a, b);
        tool.set_color_mode(a, ColorMode::Cmyk).unwrap();
        tool.close(a).unwrap();
        assert!(matches!(tool.close(a), Err(ToolError::UnknownHandle(_))));
        assert!(matches!(
            tool.set_color_mode(a, ColorMode::Cmyk),
            Err(ToolError::UnknownHandle(_))
        ));
        tool.close(b).unwrap();
    }

    #[test]
    fn test_open_missing_file() {
        let mut tool = tool();
        let err = tool.open(Path::new("/nonexistent/file.tif")).unwrap_err();
        assert!(matches!(err, ToolError::Operation { operation: "open", .. }));
    }
}
