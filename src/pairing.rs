//! Grouping of resolved files into left/right pairs.

use crate::naming::{GroupId, NameRule, ResolvedFile, Role, SourceFile};
use crate::utils::sanitize_artifact_name;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum_macros::{Display, EnumIter, EnumString};

/// How a file whose name carries a sub-index but no role gets its role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum RoleInference {
    /// Take the free role when exactly one role is already present.
    #[default]
    Complement,
    /// Like `Complement`, but an empty group starts with the left role.
    PreferLeft,
    /// Like `Complement`, but an empty group starts with the right role.
    PreferRight,
}

impl RoleInference {
    fn seed(self) -> Option<Role> {
        match self {
            RoleInference::Complement => None,
            RoleInference::PreferLeft => Some(Role::Left),
            RoleInference::PreferRight => Some(Role::Right),
        }
    }
}

/// Two files that together form one artwork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletePair {
    pub id: GroupId,
    pub left: SourceFile,
    pub right: SourceFile,
}

impl CompletePair {
    /// Filesystem-safe stem for the composited output.
    pub fn artifact_name(&self) -> String {
        sanitize_artifact_name(&self.id.artifact_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum UnpairedReason {
    /// Only one of the two roles was found.
    MissingRole,
    /// A role was claimed by more than one file; the extras are listed here.
    DuplicateRole,
    /// No file of the group carries a role.
    NoRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnpairedGroup {
    pub id: GroupId,
    pub roles: BTreeSet<Role>,
    pub files: Vec<SourceFile>,
    pub reason: UnpairedReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PairingReport {
    pub complete: Vec<CompletePair>,
    pub unpaired: Vec<UnpairedGroup>,
}

impl PairingReport {
    /// Number of input files that did not end up in a complete pair.
    pub fn unpaired_file_count(&self) -> usize {
        self.unpaired.iter().map(|g| g.files.len()).sum()
    }
}

#[derive(Default)]
struct Slots {
    left: Option<SourceFile>,
    right: Option<SourceFile>,
    duplicates: Vec<(Role, SourceFile)>,
    roleless: Vec<SourceFile>,
}

impl Slots {
    fn slot(&mut self, role: Role) -> &mut Option<SourceFile> {
        match role {
            Role::Left => &mut self.left,
            Role::Right => &mut self.right,
        }
    }

    fn place(&mut self, role: Role, file: SourceFile) {
        let slot = self.slot(role);
        if slot.is_none() {
            *slot = Some(file);
        } else {
            self.duplicates.push((role, file));
        }
    }

    fn occupied(&self) -> BTreeSet<Role> {
        let mut roles = BTreeSet::new();
        if self.left.is_some() {
            roles.insert(Role::Left);
        }
        if self.right.is_some() {
            roles.insert(Role::Right);
        }
        roles
    }

    fn infer(&mut self, file: SourceFile, policy: RoleInference) {
        let occupied = self.occupied();
        let role = match occupied.len() {
            0 => policy.seed(),
            1 => occupied.iter().next().map(|r| r.other()),
            _ => None,
        };
        match role {
            Some(role) => self.place(role, file),
            None => self.roleless.push(file),
        }
    }
}

/// Partition resolved files into complete pairs and unpaired groups.
///
/// Files are visited in file-name order, so the result does not depend on
/// the order the directory listing returned them in. Within a group, files
/// with an explicit role are placed before sub-index-only files get their
/// role inferred.
pub fn group(resolved: &[ResolvedFile], policy: RoleInference) -> PairingReport {
    let mut sorted: Vec<&ResolvedFile> = resolved.iter().collect();
    sorted.sort_by(|a, b| {
        a.source
            .file_name
            .cmp(&b.source.file_name)
            .then_with(|| a.source.path.cmp(&b.source.path))
    });

    let mut groups: BTreeMap<GroupId, Vec<&ResolvedFile>> = BTreeMap::new();
    for file in sorted {
        groups.entry(file.parsed.group_id()).or_default().push(file);
    }

    let mut report = PairingReport::default();

    for (id, members) in groups {
        let mut slots = Slots::default();

        for file in members.iter().filter(|f| f.parsed.role.is_some()) {
            if let Some(role) = file.parsed.role {
                slots.place(role, file.source.clone());
            }
        }
        for file in members.iter().filter(|f| f.parsed.role.is_none()) {
            if file.parsed.rule == NameRule::SubIndexOnly {
                slots.infer(file.source.clone(), policy);
            } else {
                slots.roleless.push(file.source.clone());
            }
        }

        let roles = slots.occupied();
        let Slots {
            left,
            right,
            duplicates,
            roleless,
        } = slots;

        match (left, right) {
            (Some(left), Some(right)) => {
                report.complete.push(CompletePair {
                    id: id.clone(),
                    left,
                    right,
                });
                if !duplicates.is_empty() || !roleless.is_empty() {
                    log::warn!("group {} has extra files beyond one pair", id);
                    report.unpaired.push(UnpairedGroup {
                        id,
                        roles: duplicates.iter().map(|(r, _)| *r).collect(),
                        files: duplicates
                            .into_iter()
                            .map(|(_, f)| f)
                            .chain(roleless)
                            .collect(),
                        reason: UnpairedReason::DuplicateRole,
                    });
                }
            }
            (left, right) => {
                let reason = if roles.is_empty() {
                    UnpairedReason::NoRole
                } else if duplicates.is_empty() {
                    UnpairedReason::MissingRole
                } else {
                    UnpairedReason::DuplicateRole
                };
                let mut files: Vec<SourceFile> = left
                    .into_iter()
                    .chain(right)
                    .chain(duplicates.into_iter().map(|(_, f)| f))
                    .chain(roleless)
                    .collect();
                files.sort();
                log::debug!("group {} unpaired ({})", id, reason);
                report.unpaired.push(UnpairedGroup {
                    id,
                    roles,
                    files,
                    reason,
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::resolve_all;

    fn report_for(names: &[&str], policy: RoleInference) -> PairingReport {
        let files: Vec<SourceFile> = names.iter().map(|n| SourceFile::new(*n)).collect();
        group(&resolve_all(&files), policy)
    }

    fn pair_names(report: &PairingReport) -> Vec<(String, String, String)> {
        report
            .complete
            .iter()
            .map(|p| {
                (
                    p.artifact_name(),
                    p.left.file_name.clone(),
                    p.right.file_name.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn test_triplet_pair() {
        let report = report_for(&["A-1--3--1.jpg", "A-2--3--1.jpg"], RoleInference::Complement);
        assert_eq!(report.complete.len(), 1);
        let pair = &report.complete[0];
        assert_eq!(pair.id.key, "A");
        assert_eq!(pair.left.file_name, "A-1--3--1.jpg");
        assert_eq!(pair.right.file_name, "A-2--3--1.jpg");
        assert!(report.unpaired.is_empty());
    }

    #[test]
    fn test_bracketed_pair() {
        let report = report_for(&["A(2)_1.jpg", "A(1)_1.jpg"], RoleInference::Complement);
        assert_eq!(
            pair_names(&report),
            vec![("A_1".into(), "A(1)_1.jpg".into(), "A(2)_1.jpg".into())]
        );
    }

    #[test]
    fn test_single_role_is_unpaired() {
        let report = report_for(&["Solo(1).jpg"], RoleInference::Complement);
        assert!(report.complete.is_empty());
        assert_eq!(report.unpaired.len(), 1);
        let group = &report.unpaired[0];
        assert_eq!(group.roles, BTreeSet::from([Role::Left]));
        assert_eq!(group.reason, UnpairedReason::MissingRole);
    }

    #[test]
    fn test_sub_index_only_complements_known_role() {
        let report = report_for(&["Hall(1)_5.jpg", "Hall_5.jpg"], RoleInference::Complement);
        assert_eq!(
            pair_names(&report),
            vec![("Hall_5".into(), "Hall(1)_5.jpg".into(), "Hall_5.jpg".into())]
        );
    }

    #[test]
    fn test_sub_index_only_policies() {
        let names = ["Hall_5.jpg", "Hall_5.png"];

        let complement = report_for(&names, RoleInference::Complement);
        assert!(complement.complete.is_empty());
        assert_eq!(complement.unpaired[0].reason, UnpairedReason::NoRole);

        let left = report_for(&names, RoleInference::PreferLeft);
        assert_eq!(
            pair_names(&left),
            vec![("Hall_5".into(), "Hall_5.jpg".into(), "Hall_5.png".into())]
        );

        let right = report_for(&names, RoleInference::PreferRight);
        assert_eq!(
            pair_names(&right),
            vec![("Hall_5".into(), "Hall_5.png".into(), "Hall_5.jpg".into())]
        );
    }

    #[test]
    fn test_duplicate_role_is_reported() {
        let report = report_for(
            &["Gate(1).jpg", "Gate(1).png", "Gate(2).jpg"],
            RoleInference::Complement,
        );
        assert_eq!(report.complete.len(), 1);
        assert_eq!(report.complete[0].left.file_name, "Gate(1).jpg");
        assert_eq!(report.unpaired.len(), 1);
        assert_eq!(report.unpaired[0].reason, UnpairedReason::DuplicateRole);
        assert_eq!(report.unpaired[0].files[0].file_name, "Gate(1).png");
    }

    #[test]
    fn test_fallback_is_unpaired_without_role() {
        let report = report_for(&["cover.jpg"], RoleInference::PreferLeft);
        assert!(report.complete.is_empty());
        assert_eq!(report.unpaired[0].reason, UnpairedReason::NoRole);
        assert!(report.unpaired[0].roles.is_empty());
    }

    #[test]
    fn test_grouping_is_permutation_invariant() {
        let names = [
            "A-1--3--1.jpg",
            "A-2--3--1.jpg",
            "A-1--3--2.jpg",
            "B(1)_1.jpg",
            "B(2)_1.jpg",
            "C-1.jpg",
            "C_1.jpg",
            "D_4.jpg",
            "cover.jpg",
        ];
        let baseline = report_for(&names, RoleInference::Complement);

        // rotate and reverse, which covers every position for each name
        for shift in 0..names.len() {
            let mut rotated = names.to_vec();
            rotated.rotate_left(shift);
            assert_eq!(report_for(&rotated, RoleInference::Complement), baseline);
            rotated.reverse();
            assert_eq!(report_for(&rotated, RoleInference::Complement), baseline);
        }
    }
}
