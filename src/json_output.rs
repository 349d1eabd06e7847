//! JSON output for GUI integration
//!
//! When --json-progress flag is enabled, job events are re-emitted as JSON
//! lines on stdout and all other output is suppressed.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::job::{BatchSummary, JobEvent};

/// Last progress emission timestamp (milliseconds since epoch)
/// Used for throttling progress updates to ~25 FPS (40ms between updates)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Progress {
        current: usize,
        total: usize,
        percent: u8,
        message: String,
    },
    Artifact {
        name: String,
        path: String,
        bucket: String,
    },
    Failed {
        item: String,
        error: String,
    },
    Unpaired {
        group: String,
        roles: Vec<u8>,
        files: Vec<String>,
        reason: String,
    },
    /// A pipeline stage stopped for the rest of the batch.
    StageFailed {
        stage: String,
        error: String,
    },
    Summary {
        artifacts: usize,
        failed: usize,
        unpaired: usize,
        converted: usize,
        cancelled: bool,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Translate a job event. Log lines and start markers have no JSON form.
    pub fn from_event(event: &JobEvent) -> Option<Self> {
        match event {
            JobEvent::Progress {
                processed,
                total,
                percent,
                current,
            } => Some(Self::Progress {
                current: *processed,
                total: *total,
                percent: *percent,
                message: current.clone(),
            }),
            JobEvent::Artifact(artifact) => Some(Self::Artifact {
                name: artifact.name.clone(),
                path: artifact.path.display().to_string(),
                bucket: artifact.label.to_string(),
            }),
            JobEvent::Failed(failed) | JobEvent::ConversionFailed(failed) => Some(Self::Failed {
                item: failed.item.clone(),
                error: failed.error.clone(),
            }),
            JobEvent::Unpaired(group) => Some(Self::Unpaired {
                group: group.id.to_string(),
                roles: group.roles.iter().map(|r| r.number()).collect(),
                files: group.files.iter().map(|f| f.file_name.clone()).collect(),
                reason: group.reason.to_string(),
            }),
            JobEvent::StageFailed { stage, error } => Some(Self::StageFailed {
                stage: stage.clone(),
                error: error.clone(),
            }),
            JobEvent::Finished(summary) => Some(Self::summary(summary)),
            JobEvent::Started { .. } | JobEvent::Log { .. } | JobEvent::Converted { .. } => None,
        }
    }

    pub fn summary(summary: &BatchSummary) -> Self {
        Self::Summary {
            artifacts: summary.artifacts.len(),
            failed: summary.failed.len(),
            unpaired: summary.unpaired.len(),
            converted: summary.converted_count(),
            cancelled: summary.cancelled,
            duration_secs: summary.elapsed.as_secs_f64(),
        }
    }

    /// Emit a job event, throttling progress to ~25 FPS.
    ///
    /// The final progress (current == total) is always emitted to ensure 100% completion.
    pub fn emit_event(event: &JobEvent) {
        let Some(message) = Self::from_event(event) else {
            return;
        };
        if let Self::Progress { current, total, .. } = &message {
            let now_ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            let last_ms = LAST_PROGRESS_MS.load(Ordering::Relaxed);
            if now_ms.saturating_sub(last_ms) < 40 && current != total {
                return;
            }
            LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
        }
        message.emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FailedItem;

    #[test]
    fn test_tagged_serialization() {
        let msg = JsonMessage::StageFailed {
            stage: "conversion".into(),
            error: "not installed".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.starts_with(r#"{"type":"stage_failed""#));
        let back: JsonMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_from_event() {
        let event = JobEvent::Failed(FailedItem {
            item: "A".into(),
            error: "boom".into(),
        });
        assert_eq!(
            JsonMessage::from_event(&event),
            Some(JsonMessage::Failed {
                item: "A".into(),
                error: "boom".into()
            })
        );

        let log = JobEvent::Log {
            level: crate::job::LogLevel::Info,
            message: "hello".into(),
        };
        assert_eq!(JsonMessage::from_event(&log), None);
    }

    #[test]
    fn test_summary_counts() {
        let summary = BatchSummary {
            cancelled: true,
            ..Default::default()
        };
        match JsonMessage::summary(&summary) {
            JsonMessage::Summary {
                artifacts,
                cancelled,
                ..
            } => {
                assert_eq!(artifacts, 0);
                assert!(cancelled);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}
