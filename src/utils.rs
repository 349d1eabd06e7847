use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Check the input and output locations before a batch is spawned.
pub fn validate_inputs(input: &Path, output: &Path) -> Result<()> {
    if !input.exists() {
        return Err(anyhow::anyhow!(
            "Input directory does not exist: {}",
            input.display()
        ));
    }
    if !input.is_dir() {
        return Err(anyhow::anyhow!(
            "Input path is not a directory: {}",
            input.display()
        ));
    }
    if output.is_file() {
        return Err(anyhow::anyhow!(
            "Output path is an existing file: {}",
            output.display()
        ));
    }
    Ok(())
}

/// Parse `#RGB` or `#RRGGBB` into RGB bytes. The leading `#` is optional.
pub fn parse_hex_color(color: &str) -> std::result::Result<[u8; 3], ConfigError> {
    let invalid = || ConfigError::Color(color.to_string());
    let hex = color.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16).ok_or_else(invalid)? as u8;
                rgb[i] = v * 17;
            }
            Ok(rgb)
        }
        6 => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
            Ok([channel(0)?, channel(2)?, channel(4)?])
        }
        _ => Err(invalid()),
    }
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = get_file_extension(path) {
        extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    } else {
        false
    }
}

/// Make an artifact name safe for Windows and FAT32 volumes.
///
/// Reserved characters and control characters become underscores, runs of
/// underscores collapse, and trailing dots and spaces are dropped. Non-ASCII
/// letters are kept since keys are often CJK titles.
pub fn sanitize_artifact_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut prev_was_underscore = false;

    for ch in name.chars() {
        let replacement = match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        };
        if replacement == '_' {
            if prev_was_underscore {
                continue;
            }
            prev_was_underscore = true;
        } else {
            prev_was_underscore = false;
        }
        result.push(replacement);
    }

    let trimmed = result
        .trim_matches('_')
        .trim_end_matches(&['.', ' '][..])
        .trim_start();

    // Cap by characters, not bytes, so multi-byte names are never split
    const MAX_NAME_CHARS: usize = 120;
    let capped: String = trimmed.chars().take(MAX_NAME_CHARS).collect();

    if capped.is_empty() {
        "untitled".to_string()
    } else {
        capped
    }
}

/// Print warning message
pub fn warn_println(message: &str) {
    eprintln!("{} {}", style("[WARNING]").yellow().bold(), message);
}

/// Print error message
pub fn error_println(message: &str) {
    eprintln!("{} {}", style("[ERROR]").red().bold(), message);
}
