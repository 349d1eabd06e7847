//! Batch execution on a dedicated worker thread.
//!
//! The controlling surface (CLI or GUI) only ever touches three things: the
//! [`CancellationToken`], the progress counter and the ordered stream of
//! [`JobEvent`]s. Everything else, including the conversion tool instance,
//! lives on the worker.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::bucket::{ensure_bucket_dir, ensure_cmyk_dir, write_artifact, BucketLabel, EncodeOptions};
use crate::conversion::{ConversionJob, ConversionStage, ToolFactory};
use crate::error::{PipelineError, ToolError};
use crate::image_processing::{
    compose_pair, compose_single, discover_images, discover_size_folders, draw_holes, load_rgb,
    stretch_resize, BatchMode, CompositeImage, ProcessingConfig, SizeFolder,
};
use crate::naming::{resolve_all, SourceFile};
use crate::pairing::{group, CompletePair, UnpairedGroup};
use crate::units::to_pixels;
use crate::utils::sanitize_artifact_name;

/// Shared stop flag, checked once per artifact.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactRecord {
    pub name: String,
    pub path: PathBuf,
    pub label: BucketLabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub item: String,
    pub error: String,
}

/// Everything a worker reports, in the order it happened.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Started { mode: BatchMode, total: usize },
    Log { level: LogLevel, message: String },
    Progress { processed: usize, total: usize, percent: u8, current: String },
    Artifact(ArtifactRecord),
    Failed(FailedItem),
    Unpaired(UnpairedGroup),
    Converted { source: PathBuf, destination: PathBuf },
    ConversionFailed(FailedItem),
    /// A whole stage stopped, e.g. the conversion tool could not be launched.
    StageFailed { stage: String, error: String },
    Finished(BatchSummary),
}

/// End-of-batch totals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub artifacts: Vec<ArtifactRecord>,
    pub failed: Vec<FailedItem>,
    pub unpaired: Vec<UnpairedGroup>,
    pub skipped_folders: Vec<PathBuf>,
    pub conversions: Vec<ConversionJob>,
    /// Set when the conversion stage stopped early.
    pub conversion_aborted: Option<String>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn converted_count(&self) -> usize {
        self.conversions
            .iter()
            .filter(|j| j.status == crate::conversion::ConversionStatus::Converted)
            .count()
    }
}

/// Progress counter readable from any thread.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    processed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl Progress {
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// 0 to 100.
    pub fn percent(&self) -> u8 {
        percent(self.processed(), self.total())
    }
}

fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        100
    } else {
        (processed.min(total) * 100 / total) as u8
    }
}

/// Sending side of the event stream, owned by the worker.
pub struct JobReporter {
    sender: Option<Sender<JobEvent>>,
    progress: Progress,
}

impl JobReporter {
    pub fn new(sender: Sender<JobEvent>) -> Self {
        Self {
            sender: Some(sender),
            progress: Progress::default(),
        }
    }

    /// Reporter that drops every event; progress is still counted.
    pub fn detached() -> Self {
        Self {
            sender: None,
            progress: Progress::default(),
        }
    }

    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    pub fn send(&self, event: JobEvent) {
        if let Some(sender) = &self.sender {
            // the receiver going away must not stop the batch
            let _ = sender.send(event);
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message.into());
    }

    fn log(&self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => log::debug!("{}", message),
            LogLevel::Warn => log::warn!("{}", message),
            LogLevel::Error => log::error!("{}", message),
        }
        self.send(JobEvent::Log { level, message });
    }

    fn start(&self, mode: BatchMode, total: usize) {
        self.progress.total.store(total, Ordering::Relaxed);
        self.progress.processed.store(0, Ordering::Relaxed);
        self.send(JobEvent::Started { mode, total });
    }

    /// Count one finished item, successful or not.
    fn advance(&self, current: &str) {
        let processed = self.progress.processed.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.progress.total();
        self.send(JobEvent::Progress {
            processed,
            total,
            percent: percent(processed, total),
            current: current.to_string(),
        });
    }
}

/// A running batch.
pub struct JobHandle {
    cancel: CancellationToken,
    events: Receiver<JobEvent>,
    progress: Progress,
    thread: JoinHandle<Result<BatchSummary>>,
}

impl JobHandle {
    /// Ask the worker to stop after the current artifact.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn events(&self) -> &Receiver<JobEvent> {
        &self.events
    }

    pub fn progress(&self) -> u8 {
        self.progress.percent()
    }

    pub fn join(self) -> Result<BatchSummary> {
        self.thread
            .join()
            .map_err(|_| anyhow::anyhow!("batch worker panicked"))?
    }
}

/// Validate `config` and start the batch on its own thread.
pub fn spawn(config: ProcessingConfig, factory: Arc<dyn ToolFactory>) -> Result<JobHandle> {
    config.validate().context("Invalid configuration")?;

    let (tx, rx) = channel();
    let reporter = JobReporter::new(tx);
    let progress = reporter.progress();
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();

    let thread = std::thread::Builder::new()
        .name("couplet-batch".to_string())
        .spawn(move || {
            let result = run_batch(&config, &reporter, &worker_cancel, factory.as_ref());
            if let Err(e) = &result {
                reporter.error(format!("Batch failed: {:#}", e));
            }
            result
        })
        .context("Failed to start batch worker")?;

    Ok(JobHandle {
        cancel,
        events: rx,
        progress,
        thread,
    })
}

enum WorkItem {
    Pair(CompletePair),
    Single(SourceFile),
    Sized { file: SourceFile, folder: SizeFolder },
}

impl WorkItem {
    fn display_name(&self) -> String {
        match self {
            WorkItem::Pair(pair) => pair.id.artifact_name(),
            WorkItem::Single(file) | WorkItem::Sized { file, .. } => file.file_name.clone(),
        }
    }

    fn artifact_name(&self) -> String {
        match self {
            WorkItem::Pair(pair) => pair.artifact_name(),
            WorkItem::Single(file) => sanitize_artifact_name(&format!("{}_scaled", file.stem())),
            WorkItem::Sized { file, .. } => sanitize_artifact_name(&file.stem()),
        }
    }
}

fn source_files(paths: Vec<PathBuf>) -> Vec<SourceFile> {
    paths.into_iter().map(SourceFile::new).collect()
}

/// Collect the work for the configured mode; unpaired groups and skipped
/// folders go straight into the summary.
fn plan(
    config: &ProcessingConfig,
    reporter: &JobReporter,
    summary: &mut BatchSummary,
) -> Result<Vec<WorkItem>> {
    match config.mode {
        BatchMode::MergePairs => {
            let files = source_files(discover_images(&config.input_dir, &config.extensions)?);
            reporter.info(format!("Found {} image files", files.len()));
            let report = group(&resolve_all(&files), config.role_inference);
            for unpaired in &report.unpaired {
                let names: Vec<&str> = unpaired.files.iter().map(|f| f.file_name.as_str()).collect();
                let ambiguity = PipelineError::ParseAmbiguity {
                    name: unpaired.id.to_string(),
                    reason: format!("{} [{}]", unpaired.reason, names.join(", ")),
                };
                reporter.warn(ambiguity.to_string());
                reporter.send(JobEvent::Unpaired(unpaired.clone()));
            }
            summary.unpaired = report.unpaired;
            Ok(report.complete.into_iter().map(WorkItem::Pair).collect())
        }
        BatchMode::SingleImage => {
            let files = source_files(discover_images(&config.input_dir, &config.extensions)?);
            reporter.info(format!("Found {} image files", files.len()));
            Ok(files.into_iter().map(WorkItem::Single).collect())
        }
        BatchMode::FolderSize => {
            let folders = discover_size_folders(&config.input_dir)?;
            for skipped in &folders.skipped {
                reporter.warn(format!(
                    "Cannot read a size from folder name: {}",
                    skipped.display()
                ));
            }
            summary.skipped_folders = folders.skipped;

            let mut items = Vec::new();
            for folder in folders.sized {
                let files = match discover_images(&folder.path, &config.extensions) {
                    Ok(paths) => source_files(paths),
                    Err(e) => {
                        reporter.warn(format!(
                            "Cannot list size folder {}: {:#}",
                            folder.path.display(),
                            e
                        ));
                        summary.skipped_folders.push(folder.path.clone());
                        continue;
                    }
                };
                reporter.info(format!(
                    "Folder {}: {}x{} cm, {} images",
                    folder.path.display(),
                    folder.width_cm,
                    folder.height_cm,
                    files.len()
                ));
                items.extend(files.into_iter().map(|file| WorkItem::Sized {
                    file,
                    folder: folder.clone(),
                }));
            }
            Ok(items)
        }
    }
}

fn compose(item: &WorkItem, config: &ProcessingConfig) -> crate::error::Result<CompositeImage> {
    match item {
        WorkItem::Pair(pair) => {
            let left = load_rgb(&pair.left.path)?;
            let right = load_rgb(&pair.right.path)?;
            compose_pair(&left, &right, &config.layout())
        }
        WorkItem::Single(file) => compose_single(&load_rgb(&file.path)?, &config.layout()),
        WorkItem::Sized { file, folder } => {
            let img = load_rgb(&file.path)?;
            let mut image = stretch_resize(
                &img,
                to_pixels(folder.width_cm, config.resolution),
                to_pixels(folder.height_cm, config.resolution),
            )?;
            if let Some(holes) = &config.holes {
                draw_holes(&mut image, holes, config.resolution);
            }
            Ok(CompositeImage {
                image,
                resolution: config.resolution,
                top_margin_cm: 0.0,
            })
        }
    }
}

/// Reserve an output path in `dir`, appending `_2`, `_3`, ... to `base`
/// until the path is one this batch has not written yet.
fn unique_name(written: &mut HashSet<PathBuf>, dir: &Path, base: &str, extension: &str) -> String {
    let mut name = base.to_string();
    let mut n = 2;
    while !written.insert(dir.join(format!("{}.{}", name, extension))) {
        name = format!("{}_{}", base, n);
        n += 1;
    }
    name
}

fn store(
    composite: &CompositeImage,
    base: &str,
    config: &ProcessingConfig,
    written: &mut HashSet<PathBuf>,
) -> crate::error::Result<ArtifactRecord> {
    let label = composite.label();
    let dir = ensure_bucket_dir(&config.output_dir, &label)?;
    let name = unique_name(written, &dir, base, config.format.extension());
    if name != base {
        log::warn!("{} already written in {}, saving as {}", base, label, name);
    }
    let options = EncodeOptions {
        format: config.format,
        resolution: config.resolution,
        quality: config.quality,
    };
    let path = write_artifact(&composite.image, &dir, &name, &options)?;
    Ok(ArtifactRecord { name, path, label })
}

fn convert(
    stage: &mut ConversionStage<'_>,
    artifact: &ArtifactRecord,
    composite: &CompositeImage,
    config: &ProcessingConfig,
    reporter: &JobReporter,
    summary: &mut BatchSummary,
) {
    let destination = cmyk_destination(&config.output_dir, artifact);
    let mut job = ConversionJob::new(&artifact.path, destination);

    if stage.is_aborted() {
        summary.conversions.push(job);
        return;
    }

    if let Err(e) = ensure_cmyk_dir(&config.output_dir, &artifact.label) {
        reporter.error(format!("{}", e));
        job.status = crate::conversion::ConversionStatus::Failed(e.to_string());
        summary.conversions.push(job);
        return;
    }

    match stage.convert(&mut job, &composite.image) {
        Ok(()) => {
            reporter.info(format!("CMYK {} -> {}", artifact.name, job.destination.display()));
            reporter.send(JobEvent::Converted {
                source: job.source.clone(),
                destination: job.destination.clone(),
            });
        }
        Err(ToolError::Unavailable(reason)) => {
            reporter.error(format!("Conversion stage stopped: {}", reason));
            reporter.send(JobEvent::StageFailed {
                stage: "conversion".to_string(),
                error: reason.clone(),
            });
            summary.conversion_aborted = Some(reason);
        }
        Err(e) => {
            let failed = FailedItem {
                item: artifact.name.clone(),
                error: e.to_string(),
            };
            reporter.error(format!("CMYK conversion of {} failed: {}", artifact.name, e));
            reporter.send(JobEvent::ConversionFailed(failed));
        }
    }
    summary.conversions.push(job);
}

fn cmyk_destination(root: &Path, artifact: &ArtifactRecord) -> PathBuf {
    root.join(artifact.label.cmyk_dir_name())
        .join(format!("{}.jpg", artifact.name))
}

/// Run a whole batch on the calling thread.
///
/// Per-item failures are reported and skipped; only failing to list the
/// input or to create the output directory ends the batch with an error.
pub fn run_batch(
    config: &ProcessingConfig,
    reporter: &JobReporter,
    cancel: &CancellationToken,
    factory: &dyn ToolFactory,
) -> Result<BatchSummary> {
    let start = Instant::now();
    config.validate().context("Invalid configuration")?;

    let mut summary = BatchSummary::default();
    let items = plan(config, reporter, &mut summary)?;
    reporter.start(config.mode, items.len());

    if !config.dry_run {
        std::fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("Failed to create output directory {}", config.output_dir.display())
        })?;
    }

    let mut stage = ConversionStage::new(factory, config.cmyk_quality);
    let mut written = HashSet::new();

    for item in &items {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        let display = item.display_name();
        let name = item.artifact_name();

        if config.dry_run {
            reporter.info(format!("[dry-run] {} -> {}", display, name));
            reporter.advance(&display);
            continue;
        }

        let composite = match compose(item, config) {
            Ok(composite) => composite,
            Err(e) => {
                record_failure(&display, e, reporter, &mut summary);
                reporter.advance(&display);
                continue;
            }
        };

        // a canvas finished after the stop request is discarded, not saved
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        match store(&composite, &name, config, &mut written) {
            Ok(artifact) => {
                reporter.info(format!("{} -> {}", display, artifact.path.display()));
                reporter.send(JobEvent::Artifact(artifact.clone()));
                if config.cmyk {
                    convert(&mut stage, &artifact, &composite, config, reporter, &mut summary);
                }
                summary.artifacts.push(artifact);
            }
            Err(e) => record_failure(&display, e, reporter, &mut summary),
        }
        reporter.advance(&display);
    }

    stage.release();
    if summary.cancelled {
        reporter.warn("Batch cancelled");
    }

    summary.elapsed = start.elapsed();
    reporter.info(format!(
        "Done: {} artifacts, {} failed, {} unpaired",
        summary.artifacts.len(),
        summary.failed.len(),
        summary.unpaired.len()
    ));
    reporter.send(JobEvent::Finished(summary.clone()));
    Ok(summary)
}

fn record_failure(
    item: &str,
    error: PipelineError,
    reporter: &JobReporter,
    summary: &mut BatchSummary,
) {
    let failed = FailedItem {
        item: item.to_string(),
        error: error.to_string(),
    };
    reporter.error(format!("{} failed: {}", item, error));
    reporter.send(JobEvent::Failed(failed.clone()));
    summary.failed.push(failed);
}
