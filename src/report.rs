//! End-of-run tables for the command line.

use prettytable::{format, Cell, Row, Table};

use crate::conversion::ConversionStatus;
use crate::job::BatchSummary;
use crate::pairing::UnpairedGroup;

/// Truncate string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn titled(titles: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(Row::new(titles.iter().map(|t| Cell::new(t)).collect()));
    table
}

/// One row per group that did not become a pair.
pub fn unpaired_table(groups: &[UnpairedGroup]) -> Table {
    let mut table = titled(&["Group", "Roles", "Reason", "Files"]);
    for group in groups {
        let roles: Vec<String> = group.roles.iter().map(|r| r.number().to_string()).collect();
        let files: Vec<&str> = group.files.iter().map(|f| f.file_name.as_str()).collect();
        table.add_row(Row::new(vec![
            Cell::new(&truncate(&group.id.to_string(), 40)),
            Cell::new(&format!("{{{}}}", roles.join(","))),
            Cell::new(&group.reason.to_string()),
            Cell::new(&truncate(&files.join(", "), 60)),
        ]));
    }
    table
}

/// Failed artifacts followed by failed conversions.
pub fn failures_table(summary: &BatchSummary) -> Table {
    let mut table = titled(&["Item", "Stage", "Error"]);
    for failed in &summary.failed {
        table.add_row(Row::new(vec![
            Cell::new(&truncate(&failed.item, 40)),
            Cell::new("artifact"),
            Cell::new(&truncate(&failed.error, 80)),
        ]));
    }
    for job in &summary.conversions {
        if let ConversionStatus::Failed(error) = &job.status {
            let item = job
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            table.add_row(Row::new(vec![
                Cell::new(&truncate(&item, 40)),
                Cell::new("cmyk"),
                Cell::new(&truncate(error, 80)),
            ]));
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::ConversionJob;
    use crate::job::FailedItem;
    use crate::naming::{GroupId, Role, SourceFile};
    use crate::pairing::UnpairedReason;
    use std::collections::BTreeSet;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long file name", 10), "a long ...");
        assert_eq!(truncate("山水山水山水", 5), "山水...");
    }

    #[test]
    fn test_unpaired_rows() {
        let group = UnpairedGroup {
            id: GroupId {
                key: "Lone".into(),
                sequence: None,
                sub_index: 0,
            },
            roles: BTreeSet::from([Role::Left]),
            files: vec![SourceFile::new("Lone(1).jpg")],
            reason: UnpairedReason::MissingRole,
        };
        let table = unpaired_table(&[group]);
        assert_eq!(table.len(), 1);
        let rendered = table.to_string();
        assert!(rendered.contains("Lone(1).jpg"));
        assert!(rendered.contains("{1}"));
    }

    #[test]
    fn test_failures_include_conversions() {
        let mut failed_job = ConversionJob::new("out/A.jpg", "out_cmyk/A.jpg");
        failed_job.status = ConversionStatus::Failed("save_as failed".into());
        let summary = BatchSummary {
            failed: vec![FailedItem {
                item: "B".into(),
                error: "decode".into(),
            }],
            conversions: vec![failed_job, ConversionJob::new("out/C.jpg", "out_cmyk/C.jpg")],
            ..Default::default()
        };
        let table = failures_table(&summary);
        assert_eq!(table.len(), 2);
        assert!(table.to_string().contains("cmyk"));
    }
}
