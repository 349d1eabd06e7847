use console::style;
use log::{Level, LevelFilter, Metadata, Record};

/// `log` backend writing colored lines to stderr.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleLogger {
    level: LevelFilter,
}

impl ConsoleLogger {
    pub fn new(verbose: bool) -> Self {
        Self {
            level: if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Warn
            },
        }
    }

    pub fn init(self) -> Result<(), log::SetLoggerError> {
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(self.level);
        Ok(())
    }
}

fn format_record(level: Level, message: &str) -> String {
    match level {
        Level::Error => format!("{} {}", style("✗").red().bold(), style(message).red()),
        Level::Warn => format!("{} {}", style("⚠").yellow().bold(), style(message).yellow()),
        Level::Info => message.to_string(),
        Level::Debug | Level::Trace => format!("{}", style(message).dim()),
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
            && metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", format_record(record.level(), &record.args().to_string()));
        }
    }

    fn flush(&self) {}
}
