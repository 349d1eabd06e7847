//! CMYK conversion through an external, stateful color tool.
//!
//! The tool is driven through the narrow [`ColorTool`] contract: open a
//! document, inspect and change its color mode, save a copy, close. A tool
//! instance is created by a [`ToolFactory`] on the worker thread that uses it
//! and never leaves that thread.
//!
//! Each artifact goes through
//! `intermediate written -> opened -> mode checked/changed -> saved ->
//! closed -> intermediate deleted`, tracked by [`ConversionJob`].

pub mod imagemagick;

use image::codecs::tiff::TiffEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use serde::Serialize;
use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::ToolError;

pub use imagemagick::{ImageMagickFactory, ImageMagickTool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ColorMode {
    Rgb,
    Cmyk,
    Grayscale,
    Other(String),
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Rgb => f.write_str("RGB"),
            ColorMode::Cmyk => f.write_str("CMYK"),
            ColorMode::Grayscale => f.write_str("Grayscale"),
            ColorMode::Other(name) => f.write_str(name),
        }
    }
}

/// Opaque reference to a document open in a [`ColorTool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(pub u64);

/// Operations the pipeline needs from a color-conversion application.
///
/// Implementations may hold process handles or thread-affine resources and
/// are not required to be `Send`.
pub trait ColorTool {
    fn open(&mut self, path: &Path) -> Result<DocumentHandle, ToolError>;

    /// Mode as currently reported by the tool. A pending change made with
    /// [`ColorTool::set_color_mode`] may only show up after `save_as`.
    fn color_mode(&mut self, handle: DocumentHandle) -> Result<ColorMode, ToolError>;

    fn set_color_mode(&mut self, handle: DocumentHandle, mode: ColorMode) -> Result<(), ToolError>;

    /// Save a JPEG copy of the document at `path`.
    fn save_as(&mut self, handle: DocumentHandle, path: &Path, quality: u8) -> Result<(), ToolError>;

    fn close(&mut self, handle: DocumentHandle) -> Result<(), ToolError>;
}

/// Creates tool instances. Shared across threads, the instances are not.
pub trait ToolFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Start or attach to the tool. Failure here is
    /// [`ToolError::Unavailable`] and ends the conversion stage.
    fn launch(&self) -> Result<Box<dyn ColorTool>, ToolError>;
}

/// Keeps a document open for the duration of a scope.
///
/// [`DocumentGuard::close`] reports the close result; a guard dropped on an
/// error path closes the document and only logs a failure.
pub struct DocumentGuard<'t> {
    tool: &'t mut dyn ColorTool,
    handle: Option<DocumentHandle>,
}

impl<'t> DocumentGuard<'t> {
    pub fn open(tool: &'t mut dyn ColorTool, path: &Path) -> Result<Self, ToolError> {
        let handle = tool.open(path)?;
        Ok(Self {
            tool,
            handle: Some(handle),
        })
    }

    fn handle(&self) -> Result<DocumentHandle, ToolError> {
        self.handle
            .ok_or_else(|| ToolError::operation("document", "already closed"))
    }

    pub fn color_mode(&mut self) -> Result<ColorMode, ToolError> {
        let handle = self.handle()?;
        self.tool.color_mode(handle)
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) -> Result<(), ToolError> {
        let handle = self.handle()?;
        self.tool.set_color_mode(handle, mode)
    }

    pub fn save_as(&mut self, path: &Path, quality: u8) -> Result<(), ToolError> {
        let handle = self.handle()?;
        self.tool.save_as(handle, path, quality)
    }

    pub fn close(mut self) -> Result<(), ToolError> {
        match self.handle.take() {
            Some(handle) => self.tool.close(handle),
            None => Ok(()),
        }
    }
}

impl Drop for DocumentGuard<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.tool.close(handle) {
                log::warn!("failed to close document {:?}: {}", handle, e);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConversionStatus {
    Pending,
    Converted,
    Failed(String),
}

/// One artifact queued for CMYK conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionJob {
    /// The primary artifact this conversion derives from.
    pub source: PathBuf,
    /// Lossless copy handed to the tool; only set while it exists on disk.
    pub intermediate: Option<PathBuf>,
    pub destination: PathBuf,
    pub status: ConversionStatus,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            intermediate: None,
            destination: destination.into(),
            status: ConversionStatus::Pending,
        }
    }
}

enum ToolState {
    NotLaunched,
    Ready(Box<dyn ColorTool>),
    Unavailable(String),
}

/// Drives conversions for one batch.
///
/// The tool is launched on the first conversion and dropped by
/// [`ConversionStage::release`] or when the stage is dropped. After a launch
/// failure every further call returns [`ToolError::Unavailable`] without
/// touching the job.
pub struct ConversionStage<'f> {
    factory: &'f dyn ToolFactory,
    state: ToolState,
    quality: u8,
}

impl<'f> ConversionStage<'f> {
    pub fn new(factory: &'f dyn ToolFactory, quality: u8) -> Self {
        Self {
            factory,
            state: ToolState::NotLaunched,
            quality,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.state, ToolState::Unavailable(_))
    }

    fn tool(&mut self) -> Result<&mut dyn ColorTool, ToolError> {
        if let ToolState::NotLaunched = self.state {
            log::info!("Launching conversion tool: {}", self.factory.name());
            self.state = match self.factory.launch() {
                Ok(tool) => ToolState::Ready(tool),
                Err(e) => {
                    log::error!("Conversion tool unavailable: {}", e);
                    ToolState::Unavailable(e.to_string())
                }
            };
        }
        match &mut self.state {
            ToolState::Ready(tool) => Ok(tool.as_mut()),
            ToolState::Unavailable(reason) => Err(ToolError::Unavailable(reason.clone())),
            ToolState::NotLaunched => Err(ToolError::Unavailable("tool not launched".into())),
        }
    }

    /// Convert `image` (the pixels of `job.source`) and store the result at
    /// `job.destination`.
    ///
    /// On [`ToolError::Unavailable`] the job stays `Pending`; any other error
    /// marks it `Failed`. Temporary files are removed on every path.
    pub fn convert(&mut self, job: &mut ConversionJob, image: &RgbImage) -> Result<(), ToolError> {
        let quality = self.quality;
        let tool = self.tool()?;

        let result = run_conversion(tool, job, image, quality);
        job.intermediate = None;
        match &result {
            Ok(()) => job.status = ConversionStatus::Converted,
            Err(e) => job.status = ConversionStatus::Failed(e.to_string()),
        }
        result
    }

    /// Drop the tool instance.
    pub fn release(&mut self) {
        if let ToolState::Ready(_) = self.state {
            log::debug!("Releasing conversion tool");
            self.state = ToolState::NotLaunched;
        }
    }
}

fn run_conversion(
    tool: &mut dyn ColorTool,
    job: &mut ConversionJob,
    image: &RgbImage,
    quality: u8,
) -> Result<(), ToolError> {
    let intermediate = write_intermediate(image)?;
    job.intermediate = Some(intermediate.to_path_buf());

    let dest_dir = job
        .destination
        .parent()
        .ok_or_else(|| ToolError::operation("save", "destination has no parent directory"))?;
    let staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(".jpg")
        .tempfile_in(dest_dir)?
        .into_temp_path();

    let mut document = DocumentGuard::open(tool, &intermediate)?;
    if document.color_mode()? != ColorMode::Cmyk {
        document.set_color_mode(ColorMode::Cmyk)?;
    }
    document.save_as(&staged, quality)?;

    let mode = document.color_mode()?;
    if mode != ColorMode::Cmyk {
        return Err(ToolError::operation(
            "verify",
            format!("document reports {} after save", mode),
        ));
    }
    document.close()?;

    staged
        .persist(&job.destination)
        .map_err(|e| ToolError::Io(e.error))?;
    log::debug!("converted {}", job.destination.display());
    Ok(())
}

/// Write a lossless TIFF copy to the system temp directory. The file is
/// deleted when the returned path is dropped.
fn write_intermediate(image: &RgbImage) -> Result<tempfile::TempPath, ToolError> {
    let mut file = tempfile::Builder::new()
        .prefix("couplet-")
        .suffix(".tif")
        .tempfile()?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        let (width, height) = image.dimensions();
        TiffEncoder::new(&mut writer)
            .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)
            .map_err(|e| ToolError::operation("write intermediate", e.to_string()))?;
        writer.flush()?;
    }
    Ok(file.into_temp_path())
}


#[cfg(test)]
mod tests {
    use super::testing::FakeFactory;
    use super::*;
    use image::Rgb;
    use std::fs;

    fn job_in(dir: &Path) -> ConversionJob {
        ConversionJob::new(dir.join("a.jpg"), dir.join("a_cmyk.jpg"))
    }

    fn image() -> RgbImage {
        RgbImage::from_pixel(4, 4, Rgb([200, 100, 50]))
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_successful_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory::default();
        let mut stage = ConversionStage::new(&factory, 95);
        let mut job = job_in(dir.path());

        stage.convert(&mut job, &image()).unwrap();

        assert_eq!(job.status, ConversionStatus::Converted);
        assert_eq!(job.intermediate, None);
        assert_eq!(entries(dir.path()), vec!["a_cmyk.jpg"]);
        let log = factory.log.lock().unwrap();
        assert_eq!(
            log.calls,
            vec!["open", "color_mode", "set_color_mode", "save_as", "color_mode", "close"]
        );
        assert_eq!(log.open_documents, 0);
    }

    #[test]
    fn test_tool_is_launched_once_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory::default();
        let mut stage = ConversionStage::new(&factory, 95);
        for name in ["a", "b", "c"] {
            let mut job = ConversionJob::new(
                dir.path().join(format!("{name}.jpg")),
                dir.path().join(format!("{name}_cmyk.jpg")),
            );
            stage.convert(&mut job, &image()).unwrap();
        }
        assert_eq!(factory.log.lock().unwrap().launches, 1);

        stage.release();
        let mut job = job_in(dir.path());
        stage.convert(&mut job, &image()).unwrap();
        assert_eq!(factory.log.lock().unwrap().launches, 2);
    }

    #[test]
    fn test_unavailable_tool_aborts_stage() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory {
            unavailable: true,
            ..Default::default()
        };
        let mut stage = ConversionStage::new(&factory, 95);
        let mut job = job_in(dir.path());

        let err = stage.convert(&mut job, &image()).unwrap_err();
        assert!(matches!(err, ToolError::Unavailable(_)));
        assert_eq!(job.status, ConversionStatus::Pending);
        assert!(stage.is_aborted());

        // no second launch attempt
        assert!(stage.convert(&mut job, &image()).is_err());
        assert_eq!(factory.log.lock().unwrap().launches, 1);
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_operation_failure_closes_document_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory {
            fail_on: Some("save_as"),
            ..Default::default()
        };
        let mut stage = ConversionStage::new(&factory, 95);
        let mut job = job_in(dir.path());

        let err = stage.convert(&mut job, &image()).unwrap_err();
        assert!(matches!(err, ToolError::Operation { operation: "save_as", .. }));
        assert!(matches!(job.status, ConversionStatus::Failed(_)));
        assert!(!stage.is_aborted());
        assert!(entries(dir.path()).is_empty());
        let log = factory.log.lock().unwrap();
        assert_eq!(log.open_documents, 0);
        assert_eq!(log.calls.last().map(String::as_str), Some("close"));
    }

    #[test]
    fn test_mode_not_cmyk_after_save_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory {
            never_cmyk: true,
            ..Default::default()
        };
        let mut stage = ConversionStage::new(&factory, 95);
        let mut job = job_in(dir.path());

        let err = stage.convert(&mut job, &image()).unwrap_err();
        assert!(matches!(err, ToolError::Operation { operation: "verify", .. }));
        assert!(entries(dir.path()).is_empty());
    }
}
