// GUI entry point for couplet-processor
// This binary provides a graphical interface for the batch processor

use eframe::egui;

mod app;
use app::CoupletApp;

fn main() -> Result<(), eframe::Error> {
    let _ = couplet_processor::logging::ConsoleLogger::new(false).init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([820.0, 720.0])
            .with_min_inner_size([600.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Couplet Processor",
        options,
        Box::new(|cc| Ok(Box::new(CoupletApp::new(cc)))),
    )
}
