// Library exports for reuse by the CLI, the GUI and integration tests
pub mod bucket;
pub mod cli;
pub mod config_file;
pub mod conversion;
pub mod error;
pub mod image_processing;
pub mod job;
pub mod json_output;
pub mod logging;
pub mod naming;
pub mod pairing;
pub mod report;
pub mod units;
pub mod utils;

// Re-export commonly used types
pub use bucket::BucketLabel;
pub use config_file::ConfigFile;
pub use conversion::{ColorTool, ImageMagickFactory, ToolFactory};
pub use error::{ConfigError, PipelineError, ToolError};
pub use image_processing::{BatchMode, GuideStyle, OutputFormat, ProcessingConfig};
pub use job::{spawn, BatchSummary, CancellationToken, JobEvent, JobHandle};
pub use json_output::JsonMessage;
pub use naming::{resolve, resolve_all, GroupId, ParsedName, Role, SourceFile};
pub use pairing::{group, CompletePair, PairingReport, RoleInference, UnpairedGroup};
