//! Filename parsing for left/right scroll pairs.
//!
//! A stem is run through an ordered list of [`NameRule`]s and the first rule
//! that matches wins. Rule order matters: several rules accept the same
//! ambiguous stem and the more specific ones must be tried first.
//!
//! | Rule | Shape | Example |
//! |------|-------|---------|
//! | [`NameRule::Triplet`] | `key-a--b--c` | `Spring-1--3--1` |
//! | [`NameRule::BracketedRoleSub`] | `key(role)_sub` | `Spring(1)_2` |
//! | [`NameRule::DelimitedRoleSub`] | `key-role_sub` | `Spring-2_1`, `Spring-21` |
//! | [`NameRule::BracketedRole`] | `key(role)` | `Spring（2）` |
//! | [`NameRule::TrailingRole`] | `key-role` | `Spring 1` |
//! | [`NameRule::SubIndexOnly`] | `key_sub` | `Spring_3` |
//! | [`NameRule::Fallback`] | anything | `cover` |
//!
//! Triplet names need the whole directory to be interpreted correctly, see
//! [`resolve_all`] and the `triplet` module.

mod triplet;

use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use strum_macros::Display;

pub use triplet::TripletVariant;

/// Which half of the artwork a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Role {
    Left = 1,
    Right = 2,
}

impl Role {
    pub fn from_number(n: u32) -> Option<Role> {
        match n {
            1 => Some(Role::Left),
            2 => Some(Role::Right),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn other(self) -> Role {
        match self {
            Role::Left => Role::Right,
            Role::Right => Role::Left,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Identifies which rule produced a [`ParsedName`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
pub enum NameRule {
    Triplet,
    BracketedRoleSub,
    DelimitedRoleSub,
    BracketedRole,
    TrailingRole,
    SubIndexOnly,
    Fallback,
}

/// Rules in the order they are tried.
pub const RULE_ORDER: [NameRule; 7] = [
    NameRule::Triplet,
    NameRule::BracketedRoleSub,
    NameRule::DelimitedRoleSub,
    NameRule::BracketedRole,
    NameRule::TrailingRole,
    NameRule::SubIndexOnly,
    NameRule::Fallback,
];

static BRACKETED_ROLE_SUB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<key>.+?)\s*[(（]\s*(?P<role>[12])\s*[)）]\s*[_-]?\s*(?P<sub>\d+)$")
        .expect("valid bracketed role/sub pattern")
});

static DELIMITED_ROLE_SUB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<key>.+?)[-_ ](?P<role>[12])[_-]?(?P<sub>\d+)$")
        .expect("valid delimited role/sub pattern")
});

static BRACKETED_ROLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<key>.+?)\s*[(（]\s*(?P<role>[12])\s*[)）]$")
        .expect("valid bracketed role pattern")
});

static TRAILING_ROLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<key>.+?)[-_ ](?P<role>[12])$").expect("valid trailing role pattern")
});

static SUB_INDEX_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<key>.+?)_(?P<sub>\d+)$").expect("valid sub-index pattern")
});

/// Result of parsing one filename stem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedName {
    pub key: String,
    pub role: Option<Role>,
    /// Middle segment of a triplet name; `None` for every other rule.
    pub sequence: Option<u32>,
    pub sub_index: u32,
    pub rule: NameRule,
}

impl ParsedName {
    pub fn fallback(stem: &str) -> Self {
        Self {
            key: stem.to_string(),
            role: None,
            sequence: None,
            sub_index: 0,
            rule: NameRule::Fallback,
        }
    }

    pub fn group_id(&self) -> GroupId {
        GroupId {
            key: self.key.clone(),
            sequence: self.sequence,
            sub_index: self.sub_index,
        }
    }
}

/// Pairing identity shared by exactly the two files of one artwork.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupId {
    pub key: String,
    pub sequence: Option<u32>,
    pub sub_index: u32,
}

impl GroupId {
    /// Stem used for the produced artifact.
    pub fn artifact_name(&self) -> String {
        match (self.sequence, self.sub_index) {
            (Some(seq), sub) => format!("{}-{}--{}", self.key, seq, sub),
            (None, 0) => self.key.clone(),
            (None, sub) => format!("{}_{}", self.key, sub),
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.artifact_name())
    }
}

/// An input image discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub file_name: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, file_name }
    }

    /// File name without its extension, whitespace trimmed.
    pub fn stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().trim().to_string())
            .unwrap_or_default()
    }
}

/// A source file together with its parsed name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFile {
    pub source: SourceFile,
    pub parsed: ParsedName,
}

impl NameRule {
    /// Try this rule against a trimmed stem.
    pub fn apply(self, stem: &str) -> Option<ParsedName> {
        match self {
            NameRule::Triplet => triplet::parse(stem).and_then(|t| t.default_interpretation()),
            NameRule::BracketedRoleSub => {
                capture_role_sub(&BRACKETED_ROLE_SUB, stem, self)
            }
            NameRule::DelimitedRoleSub => {
                capture_role_sub(&DELIMITED_ROLE_SUB, stem, self)
            }
            NameRule::BracketedRole => capture_role_sub(&BRACKETED_ROLE, stem, self),
            NameRule::TrailingRole => capture_role_sub(&TRAILING_ROLE, stem, self),
            NameRule::SubIndexOnly => capture_role_sub(&SUB_INDEX_ONLY, stem, self),
            NameRule::Fallback => {
                if stem.is_empty() {
                    None
                } else {
                    Some(ParsedName::fallback(stem))
                }
            }
        }
    }
}

fn capture_role_sub(pattern: &Regex, stem: &str, rule: NameRule) -> Option<ParsedName> {
    let caps: Captures = pattern.captures(stem)?;
    let key = caps.name("key")?.as_str().trim();
    if key.is_empty() {
        return None;
    }

    let role = match caps.name("role") {
        Some(m) => Some(Role::from_number(m.as_str().parse().ok()?)?),
        None => None,
    };
    let sub_index = match caps.name("sub") {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };

    Some(ParsedName {
        key: key.to_string(),
        role,
        sequence: None,
        sub_index,
        rule,
    })
}

/// Parse one stem through the rule cascade. Always succeeds for a
/// non-empty stem because [`NameRule::Fallback`] accepts anything.
pub fn resolve(stem: &str) -> ParsedName {
    let stem = stem.trim();
    RULE_ORDER
        .iter()
        .find_map(|rule| rule.apply(stem))
        .unwrap_or_else(|| ParsedName::fallback(stem))
}

/// Resolve every file of a directory listing.
///
/// Triplet-shaped names are re-interpreted against the whole set so that the
/// role digit can sit in either end slot; everything else is resolved stem by
/// stem. Output order follows the input order.
pub fn resolve_all(files: &[SourceFile]) -> Vec<ResolvedFile> {
    let stems: Vec<String> = files.iter().map(SourceFile::stem).collect();

    let triplets: Vec<(usize, triplet::TripletParts)> = stems
        .iter()
        .enumerate()
        .filter_map(|(idx, stem)| triplet::parse(stem).map(|t| (idx, t)))
        .collect();
    let mut overrides: HashMap<usize, ParsedName> = triplet::disambiguate(&triplets);

    files
        .iter()
        .zip(stems.iter())
        .enumerate()
        .map(|(idx, (source, stem))| {
            let parsed = overrides.remove(&idx).unwrap_or_else(|| resolve(stem));
            log::debug!(
                "{} -> key '{}' role {:?} sub {} ({})",
                source.file_name,
                parsed.key,
                parsed.role.map(Role::number),
                parsed.sub_index,
                parsed.rule
            );
            ResolvedFile {
                source: source.clone(),
                parsed,
            }
        })
        .collect()
}
