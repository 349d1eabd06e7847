use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::sync::Arc;

use couplet_processor::cli::Args;
use couplet_processor::conversion::ImageMagickFactory;
use couplet_processor::job::{self, BatchSummary, JobEvent};
use couplet_processor::json_output::JsonMessage;
use couplet_processor::logging::ConsoleLogger;
use couplet_processor::report::{failures_table, unpaired_table};
use couplet_processor::utils::{
    create_progress_bar, error_println, format_duration, validate_inputs, warn_println,
};
use couplet_processor::ProcessingConfig;

fn print_configuration(config: &ProcessingConfig) {
    println!("{}", style("Configuration:").bold());
    println!("  Mode: {}", config.mode);
    println!(
        "  Half size: {}x{} cm at {} DPI",
        config.width_cm, config.height_cm, config.resolution
    );
    println!("  Top margin: {} cm", config.top_margin_cm);
    println!(
        "  Guides: {} ({:?})",
        config.guides.style, config.guides.width
    );
    println!("  Role inference: {}", config.role_inference);
    println!("  Format: {} (quality {})", config.format, config.quality);
    if let Some(holes) = &config.holes {
        println!(
            "  Holes: {} x {} cm, {} cm from the edges",
            holes.count, holes.diameter_cm, holes.margin_cm
        );
    }
    if config.cmyk {
        println!("  CMYK copies: enabled (quality {})", config.cmyk_quality);
    }
    println!("  Extensions: {:?}", config.extensions);
    if config.dry_run {
        println!("  Dry run mode: enabled (nothing will be written)");
    }
    println!();
}

fn print_summary(summary: &BatchSummary, planned: usize, config: &ProcessingConfig) {
    println!();
    let header = if config.dry_run {
        style("Dry Run Results Summary:").bold().cyan()
    } else {
        style("Results Summary:").bold().green()
    };
    println!("{}", header);

    if config.dry_run {
        println!("  Would be written: {}", style(planned).bold().green());
    } else {
        println!("  Artifacts written: {}", style(summary.artifacts.len()).bold().green());
    }
    if !summary.failed.is_empty() {
        println!("  Failed: {}", style(summary.failed.len()).bold().red());
    }
    if !summary.unpaired.is_empty() {
        println!("  Unpaired groups: {}", style(summary.unpaired.len()).bold().yellow());
    }
    if !summary.skipped_folders.is_empty() {
        println!(
            "  Skipped folders: {}",
            style(summary.skipped_folders.len()).bold().yellow()
        );
    }
    if config.cmyk && !config.dry_run {
        println!(
            "  CMYK copies: {}/{}",
            style(summary.converted_count()).bold().green(),
            summary.conversions.len()
        );
    }
    if let Some(reason) = &summary.conversion_aborted {
        println!("  CMYK stage stopped: {}", style(reason).red());
    }
    println!("  Time: {}", format_duration(summary.elapsed));

    if !summary.unpaired.is_empty() {
        println!();
        println!("{}", style("Unpaired files:").bold().yellow());
        unpaired_table(&summary.unpaired).printstd();
    }

    let failures = failures_table(summary);
    if !failures.is_empty() {
        println!();
        println!("{}", style("Errors encountered:").bold().red());
        failures.printstd();
    }

    println!();
    println!("{}", style("Output:").bold().blue());
    println!("  {}", config.output_dir.display());
}

fn run(args: &Args) -> Result<()> {
    let config = args.to_processing_config()?;
    validate_inputs(&config.input_dir, &config.output_dir)?;

    if !args.json_progress {
        println!("{}", style("Couplet Processor").bold().blue());
        println!();
        if args.verbose {
            print_configuration(&config);
        }
    }

    let handle = job::spawn(config.clone(), Arc::new(ImageMagickFactory))?;

    let mut planned = 0;
    let pb = if args.json_progress {
        None
    } else {
        Some(create_progress_bar(0))
    };

    for event in handle.events().iter() {
        if args.json_progress {
            JsonMessage::emit_event(&event);
            continue;
        }
        let Some(pb) = &pb else { continue };
        match &event {
            JobEvent::Started { total, .. } => {
                planned = *total;
                pb.set_length(*total as u64);
            }
            JobEvent::Progress {
                processed, current, ..
            } => {
                pb.set_position(*processed as u64);
                pb.set_message(current.clone());
            }
            JobEvent::StageFailed { stage, error } => {
                pb.suspend(|| warn_println(&format!("{} stage stopped: {}", stage, error)));
            }
            JobEvent::Finished(_) => pb.finish_and_clear(),
            // log lines already went through the logger
            _ => {}
        }
    }

    let summary = handle.join().context("Batch failed")?;
    if summary.cancelled {
        warn_println("Batch was cancelled before all items were written");
    }
    if !args.json_progress {
        print_summary(&summary, planned, &config);
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = ConsoleLogger::new(args.verbose && !args.json_progress).init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(&args) {
        if args.json_progress {
            JsonMessage::StageFailed {
                stage: "batch".to_string(),
                error: format!("{:#}", e),
            }
            .emit();
        } else {
            error_println(&format!("{:#}", e));
        }
        std::process::exit(1);
    }
}
