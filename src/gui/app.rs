use couplet_processor::image_processing::{
    BatchMode, GuideStyle, OutputFormat, DEFAULT_EXTENSIONS, DEFAULT_HEIGHT_CM,
    DEFAULT_QUALITY, DEFAULT_RESOLUTION, DEFAULT_TOP_MARGIN_CM, DEFAULT_WIDTH_CM,
};
use couplet_processor::job::{JobHandle, LogLevel};
use couplet_processor::pairing::RoleInference;
use eframe::egui;
use strum::IntoEnumIterator;

#[path = "app_processing.rs"]
mod app_processing;

/// Lines kept in the log panel.
const MAX_LOG_LINES: usize = 2000;

pub struct CoupletApp {
    // Input/Output paths
    input_path: String,
    output_path: String,

    // Layout
    mode: BatchMode,
    width_cm: f64,
    height_cm: f64,
    resolution: f64,
    top_margin_cm: f64,

    // Guides
    guide_style: GuideStyle,
    guide_width_in_mm: bool,
    guide_width_px: u32,
    guide_width_mm: f64,
    guide_color: String,

    // Pairing
    role_inference: RoleInference,

    // Holes (folder-size mode)
    holes_enabled: bool,
    hole_count: u32,
    hole_diameter_cm: f64,
    hole_margin_cm: f64,

    // Output
    format: OutputFormat,
    quality: u8,
    cmyk: bool,
    cmyk_quality: u8,
    extensions: String,
    dry_run: bool,

    // Processing state
    job: Option<JobHandle>,
    progress: f32,
    current_file: String,
    processed_count: usize,
    total_count: usize,
    log: Vec<(LogLevel, String)>,

    // Results
    results_message: String,
    error_message: String,
}

impl Default for CoupletApp {
    fn default() -> Self {
        Self {
            input_path: String::new(),
            output_path: String::new(),
            mode: BatchMode::default(),
            width_cm: DEFAULT_WIDTH_CM,
            height_cm: DEFAULT_HEIGHT_CM,
            resolution: DEFAULT_RESOLUTION,
            top_margin_cm: DEFAULT_TOP_MARGIN_CM,
            guide_style: GuideStyle::default(),
            guide_width_in_mm: false,
            guide_width_px: 2,
            guide_width_mm: 0.2,
            guide_color: "#808080".to_string(),
            role_inference: RoleInference::default(),
            holes_enabled: false,
            hole_count: 6,
            hole_diameter_cm: 1.0,
            hole_margin_cm: 2.0,
            format: OutputFormat::default(),
            quality: DEFAULT_QUALITY,
            cmyk: false,
            cmyk_quality: DEFAULT_QUALITY,
            extensions: DEFAULT_EXTENSIONS.join(","),
            dry_run: false,
            job: None,
            progress: 0.0,
            current_file: String::new(),
            processed_count: 0,
            total_count: 0,
            log: Vec::new(),
            results_message: String::new(),
            error_message: String::new(),
        }
    }
}

impl CoupletApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let mut app = Self::default();
        app.load_settings();
        app
    }

    fn is_processing(&self) -> bool {
        self.job.is_some()
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        self.log.push((level, message));
        if self.log.len() > MAX_LOG_LINES {
            let excess = self.log.len() - MAX_LOG_LINES;
            self.log.drain(..excess);
        }
    }

    fn render_file_selection(&mut self, ui: &mut egui::Ui) {
        ui.heading("Folders");
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Input:");
            ui.text_edit_singleline(&mut self.input_path);
            if ui.button("Browse...").clicked() {
                if let Some(path) = rfd::FileDialog::new().pick_folder() {
                    self.input_path = path.display().to_string();
                }
            }
        });

        ui.horizontal(|ui| {
            ui.label("Output:");
            ui.text_edit_singleline(&mut self.output_path);
            if ui.button("Browse...").clicked() {
                if let Some(path) = rfd::FileDialog::new().pick_folder() {
                    self.output_path = path.display().to_string();
                }
            }
        });

        ui.add_space(10.0);
    }

    fn render_layout_settings(&mut self, ui: &mut egui::Ui) {
        ui.heading("Layout");
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Mode:");
            egui::ComboBox::from_id_salt("mode")
                .selected_text(mode_name(self.mode))
                .show_ui(ui, |ui| {
                    for mode in BatchMode::iter() {
                        ui.selectable_value(&mut self.mode, mode, mode_name(mode));
                    }
                });
        });

        if self.mode == BatchMode::FolderSize {
            ui.label("ℹ Size is read from each sub-folder name, e.g. 30x40cm");
        } else {
            ui.horizontal(|ui| {
                ui.label("Half size (cm):");
                ui.add(egui::DragValue::new(&mut self.width_cm).speed(0.5).range(1.0..=500.0));
                ui.label("x");
                ui.add(egui::DragValue::new(&mut self.height_cm).speed(0.5).range(1.0..=500.0));
            });
            ui.horizontal(|ui| {
                ui.label("Top margin (cm):");
                ui.add(egui::DragValue::new(&mut self.top_margin_cm).speed(0.1).range(0.0..=50.0));
            });
        }

        ui.horizontal(|ui| {
            ui.label("Resolution (DPI):");
            ui.add(egui::DragValue::new(&mut self.resolution).speed(1).range(10.0..=1200.0));
        });

        if self.mode == BatchMode::MergePairs {
            ui.horizontal(|ui| {
                ui.label("Unlabeled halves:");
                egui::ComboBox::from_id_salt("role_inference")
                    .selected_text(role_inference_name(self.role_inference))
                    .show_ui(ui, |ui| {
                        for policy in RoleInference::iter() {
                            ui.selectable_value(
                                &mut self.role_inference,
                                policy,
                                role_inference_name(policy),
                            );
                        }
                    });
            });
        }

        ui.add_space(10.0);
    }

    fn render_guide_settings(&mut self, ui: &mut egui::Ui) {
        ui.heading("Guides");
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Style:");
            for style in GuideStyle::iter() {
                ui.radio_value(&mut self.guide_style, style, style.to_string());
            }
        });

        if self.guide_style != GuideStyle::None {
            ui.horizontal(|ui| {
                ui.label("Width:");
                ui.checkbox(&mut self.guide_width_in_mm, "in millimeters");
                if self.guide_width_in_mm {
                    ui.add(
                        egui::DragValue::new(&mut self.guide_width_mm)
                            .speed(0.05)
                            .range(0.05..=10.0)
                            .suffix(" mm"),
                    );
                } else {
                    ui.add(
                        egui::DragValue::new(&mut self.guide_width_px)
                            .speed(1)
                            .range(1..=50)
                            .suffix(" px"),
                    );
                }
            });

            ui.horizontal(|ui| {
                ui.label("Color:");
                ui.text_edit_singleline(&mut self.guide_color);
            });
            ui.label("(Hex RGB, e.g., #808080)");
        }

        ui.add_space(10.0);
    }

    fn render_hole_settings(&mut self, ui: &mut egui::Ui) {
        if self.mode != BatchMode::FolderSize {
            return;
        }
        ui.heading("Hole Marks");
        ui.separator();

        ui.checkbox(&mut self.holes_enabled, "Draw punch-hole marks");
        if self.holes_enabled {
            ui.horizontal(|ui| {
                ui.label("Count:");
                ui.radio_value(&mut self.hole_count, 6, "6");
                ui.radio_value(&mut self.hole_count, 8, "8");
            });
            ui.horizontal(|ui| {
                ui.label("Diameter (cm):");
                ui.add(egui::DragValue::new(&mut self.hole_diameter_cm).speed(0.1).range(0.1..=10.0));
                ui.label("Margin (cm):");
                ui.add(egui::DragValue::new(&mut self.hole_margin_cm).speed(0.1).range(0.1..=50.0));
            });
        }

        ui.add_space(10.0);
    }

    fn render_output_settings(&mut self, ui: &mut egui::Ui) {
        ui.heading("Output");
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Format:");
            for format in OutputFormat::iter() {
                ui.radio_value(&mut self.format, format, format.to_string().to_uppercase());
            }
        });

        if self.format == OutputFormat::Jpg {
            ui.horizontal(|ui| {
                ui.label("JPEG quality:");
                ui.add(egui::Slider::new(&mut self.quality, 1..=100));
            });
        }

        ui.checkbox(&mut self.cmyk, "Also write CMYK copies (requires ImageMagick)");
        if self.cmyk {
            ui.horizontal(|ui| {
                ui.label("CMYK quality:");
                ui.add(egui::Slider::new(&mut self.cmyk_quality, 1..=100));
            });
        }

        ui.horizontal(|ui| {
            ui.label("File extensions:");
            ui.text_edit_singleline(&mut self.extensions);
        });

        ui.checkbox(&mut self.dry_run, "Dry run (pair and report only)");

        ui.add_space(10.0);
    }

    fn render_process_buttons(&mut self, ui: &mut egui::Ui) {
        ui.separator();

        ui.horizontal(|ui| {
            let start = egui::Button::new(if self.is_processing() {
                "Processing..."
            } else {
                "Start"
            })
            .min_size(egui::vec2(160.0, 36.0));
            if ui.add_enabled(!self.is_processing(), start).clicked() {
                self.start_processing();
            }

            let stop = egui::Button::new("Stop").min_size(egui::vec2(100.0, 36.0));
            if ui.add_enabled(self.is_processing(), stop).clicked() {
                self.stop_processing();
            }
        });

        ui.add_space(10.0);
    }

    fn render_progress(&mut self, ui: &mut egui::Ui) {
        if self.is_processing() {
            ui.label(format!("Processing: {}/{}", self.processed_count, self.total_count));
            ui.label(&self.current_file);
            ui.add(egui::ProgressBar::new(self.progress).show_percentage().animate(true));
        }

        if !self.results_message.is_empty() {
            ui.label(&self.results_message);
        }

        if !self.error_message.is_empty() {
            ui.colored_label(egui::Color32::RED, &self.error_message);
        }
    }

    fn render_log(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Log");
            if ui.small_button("Clear").clicked() {
                self.log.clear();
            }
        });
        egui::ScrollArea::vertical()
            .id_salt("log")
            .max_height(180.0)
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for (level, line) in &self.log {
                    match level {
                        LogLevel::Info => {
                            ui.label(line);
                        }
                        LogLevel::Warn => {
                            ui.colored_label(egui::Color32::from_rgb(200, 150, 0), line);
                        }
                        LogLevel::Error => {
                            ui.colored_label(egui::Color32::RED, line);
                        }
                    }
                }
            });
    }
}

fn mode_name(mode: BatchMode) -> &'static str {
    match mode {
        BatchMode::MergePairs => "Merge pairs",
        BatchMode::SingleImage => "Single images",
        BatchMode::FolderSize => "Size from folder name",
    }
}

fn role_inference_name(policy: RoleInference) -> &'static str {
    match policy {
        RoleInference::Complement => "Complete the present half",
        RoleInference::PreferLeft => "Left first",
        RoleInference::PreferRight => "Right first",
    }
}

impl eframe::App for CoupletApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Drain events from the batch worker
        self.check_progress();

        egui::TopBottomPanel::bottom("log_panel")
            .resizable(true)
            .show(ctx, |ui| {
                self.render_log(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Couplet Processor");
                ui.label("Pair, composite and bucket two-part scroll artworks for print");
                ui.add_space(20.0);

                ui.add_enabled_ui(!self.is_processing(), |ui| {
                    self.render_file_selection(ui);
                    self.render_layout_settings(ui);
                    self.render_guide_settings(ui);
                    self.render_hole_settings(ui);
                    self.render_output_settings(ui);
                });
                self.render_process_buttons(ui);
                self.render_progress(ui);
            });
        });

        // Request repaint if processing
        if self.is_processing() {
            ctx.request_repaint_after(std::time::Duration::from_millis(50));
        }
    }
}
