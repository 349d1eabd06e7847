// Batch control for the GUI
// The batch itself runs on the worker thread started by job::spawn; this
// module turns the form into a config, starts and stops the job, and drains
// its events once per frame.

use super::CoupletApp;
use couplet_processor::config_file::ConfigFile;
use couplet_processor::conversion::ImageMagickFactory;
use couplet_processor::job::{self, JobEvent, LogLevel};
use couplet_processor::utils::{format_duration, validate_inputs};
use std::path::PathBuf;
use std::sync::mpsc::TryRecvError;
use std::sync::Arc;

fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("couplet-processor").join("settings.json"))
}

impl CoupletApp {
    /// Current form values as a settings file.
    fn to_settings(&self) -> ConfigFile {
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| PathBuf::from(s.trim()));
        ConfigFile {
            input_path: non_empty(&self.input_path),
            output_path: non_empty(&self.output_path),
            mode: Some(self.mode),
            width_cm: Some(self.width_cm),
            height_cm: Some(self.height_cm),
            resolution: Some(self.resolution),
            top_margin_cm: Some(self.top_margin_cm),
            guide_style: Some(self.guide_style),
            guide_width_px: (!self.guide_width_in_mm).then_some(self.guide_width_px),
            guide_width_mm: self.guide_width_in_mm.then_some(self.guide_width_mm),
            guide_color: Some(self.guide_color.trim().to_string()),
            role_inference: Some(self.role_inference),
            cmyk: Some(self.cmyk),
            cmyk_quality: Some(self.cmyk_quality),
            format: Some(self.format),
            quality: Some(self.quality),
            holes: self.holes_enabled.then_some(self.hole_count),
            hole_diameter_cm: Some(self.hole_diameter_cm),
            hole_margin_cm: Some(self.hole_margin_cm),
            hole_color: None,
            extensions: Some(
                self.extensions
                    .split(',')
                    .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect(),
            ),
            dry_run: Some(self.dry_run),
        }
    }

    fn apply_settings(&mut self, settings: ConfigFile) {
        if let Some(path) = settings.input_path {
            self.input_path = path.display().to_string();
        }
        if let Some(path) = settings.output_path {
            self.output_path = path.display().to_string();
        }
        self.mode = settings.mode.unwrap_or(self.mode);
        self.width_cm = settings.width_cm.unwrap_or(self.width_cm);
        self.height_cm = settings.height_cm.unwrap_or(self.height_cm);
        self.resolution = settings.resolution.unwrap_or(self.resolution);
        self.top_margin_cm = settings.top_margin_cm.unwrap_or(self.top_margin_cm);
        self.guide_style = settings.guide_style.unwrap_or(self.guide_style);
        if let Some(mm) = settings.guide_width_mm {
            self.guide_width_in_mm = true;
            self.guide_width_mm = mm;
        } else if let Some(px) = settings.guide_width_px {
            self.guide_width_in_mm = false;
            self.guide_width_px = px;
        }
        if let Some(color) = settings.guide_color {
            self.guide_color = color;
        }
        self.role_inference = settings.role_inference.unwrap_or(self.role_inference);
        self.cmyk = settings.cmyk.unwrap_or(self.cmyk);
        self.cmyk_quality = settings.cmyk_quality.unwrap_or(self.cmyk_quality);
        self.format = settings.format.unwrap_or(self.format);
        self.quality = settings.quality.unwrap_or(self.quality);
        self.holes_enabled = settings.holes.is_some();
        self.hole_count = settings.holes.unwrap_or(self.hole_count);
        self.hole_diameter_cm = settings.hole_diameter_cm.unwrap_or(self.hole_diameter_cm);
        self.hole_margin_cm = settings.hole_margin_cm.unwrap_or(self.hole_margin_cm);
        if let Some(extensions) = settings.extensions {
            self.extensions = extensions.join(",");
        }
        self.dry_run = settings.dry_run.unwrap_or(self.dry_run);
    }

    pub fn load_settings(&mut self) {
        let Some(path) = settings_path() else { return };
        if !path.is_file() {
            return;
        }
        match ConfigFile::load(&path) {
            Ok(settings) => self.apply_settings(settings),
            Err(e) => log::warn!("Ignoring saved settings: {:#}", e),
        }
    }

    pub fn save_settings(&self) -> anyhow::Result<()> {
        match settings_path() {
            Some(path) => self.to_settings().save(&path),
            None => Ok(()),
        }
    }

    pub fn start_processing(&mut self) {
        if self.input_path.trim().is_empty() || self.output_path.trim().is_empty() {
            self.error_message = "Please select input and output folders".to_string();
            return;
        }

        let input = PathBuf::from(self.input_path.trim());
        let output = PathBuf::from(self.output_path.trim());
        if let Err(e) = validate_inputs(&input, &output) {
            self.error_message = e.to_string();
            return;
        }

        let config = match self.to_settings().to_processing_config(input, output) {
            Ok(config) => config,
            Err(e) => {
                self.error_message = format!("Invalid settings: {}", e);
                return;
            }
        };

        // Save configuration before starting
        if let Err(e) = self.save_settings() {
            log::warn!("Could not save settings: {:#}", e);
        }

        // Clear previous state
        self.progress = 0.0;
        self.processed_count = 0;
        self.total_count = 0;
        self.current_file.clear();
        self.error_message.clear();
        self.results_message.clear();

        match job::spawn(config, Arc::new(ImageMagickFactory)) {
            Ok(handle) => self.job = Some(handle),
            Err(e) => self.error_message = format!("{:#}", e),
        }
    }

    pub fn stop_processing(&mut self) {
        if let Some(job) = &self.job {
            job.cancel();
            self.push_log(
                LogLevel::Warn,
                "Stop requested, finishing the current item...".to_string(),
            );
        }
    }

    /// Drain pending events from the worker; joins it once the stream ends.
    pub fn check_progress(&mut self) {
        let Some(job) = &self.job else { return };

        let mut events = Vec::new();
        let mut disconnected = false;
        loop {
            match job.events().try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        for event in events {
            self.handle_event(event);
        }

        if disconnected {
            if let Some(job) = self.job.take() {
                if let Err(e) = job.join() {
                    self.error_message = format!("{:#}", e);
                }
            }
        }
    }

    fn handle_event(&mut self, event: JobEvent) {
        match event {
            JobEvent::Started { mode, total } => {
                self.total_count = total;
                self.push_log(LogLevel::Info, format!("Started {} batch: {} items", mode, total));
            }
            JobEvent::Log { level, message } => self.push_log(level, message),
            JobEvent::Progress {
                processed,
                total,
                percent,
                current,
            } => {
                self.processed_count = processed;
                self.total_count = total;
                self.current_file = current;
                self.progress = percent as f32 / 100.0; // 0.0 to 1.0 for egui
            }
            JobEvent::StageFailed { stage, error } => {
                self.error_message = format!("{} stage stopped: {}", stage, error);
            }
            JobEvent::Finished(summary) => {
                let mut message = format!(
                    "✓ {} artifacts, {} failed, {} unpaired in {}",
                    summary.artifacts.len(),
                    summary.failed.len(),
                    summary.unpaired.len(),
                    format_duration(summary.elapsed)
                );
                if !summary.conversions.is_empty() {
                    message.push_str(&format!(
                        ", {}/{} CMYK copies",
                        summary.converted_count(),
                        summary.conversions.len()
                    ));
                }
                if summary.cancelled {
                    message.push_str(" (stopped)");
                }
                self.results_message = message;
            }
            // these are also reported as log lines
            JobEvent::Artifact(_)
            | JobEvent::Failed(_)
            | JobEvent::Unpaired(_)
            | JobEvent::Converted { .. }
            | JobEvent::ConversionFailed(_) => {}
        }
    }
}
