//! Triplet names: `key-a--b--c`.
//!
//! The role digit sits either in slot `a` (the first slot varies across the
//! pair, `c` stays constant) or in slot `c` (the last slot varies, `a` stays
//! constant). A single stem like `A-1--3--1` fits both readings, so the
//! choice is made over the whole file set: a reading is kept only when it
//! yields exactly two files that agree on every other position and whose
//! varying slot holds exactly {1, 2}.

use super::{NameRule, ParsedName, Role};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

static TRIPLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<key>.+?)-(?P<a>\d+)--(?P<b>\d+)--(?P<c>\d+)$")
        .expect("valid triplet pattern")
});

/// Which end slot of the triplet carries the role digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TripletVariant {
    FirstVaries,
    LastVaries,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TripletParts {
    pub key: String,
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

pub(crate) fn parse(stem: &str) -> Option<TripletParts> {
    let caps = TRIPLET.captures(stem)?;
    let key = caps.name("key")?.as_str().trim();
    if key.is_empty() {
        return None;
    }
    Some(TripletParts {
        key: key.to_string(),
        a: caps.name("a")?.as_str().parse().ok()?,
        b: caps.name("b")?.as_str().parse().ok()?,
        c: caps.name("c")?.as_str().parse().ok()?,
    })
}

impl TripletParts {
    fn varying(&self, variant: TripletVariant) -> u32 {
        match variant {
            TripletVariant::FirstVaries => self.a,
            TripletVariant::LastVaries => self.c,
        }
    }

    fn constant_end(&self, variant: TripletVariant) -> u32 {
        match variant {
            TripletVariant::FirstVaries => self.c,
            TripletVariant::LastVaries => self.a,
        }
    }

    /// Read the stem with the role digit in the given slot.
    pub fn interpret(&self, variant: TripletVariant) -> Option<ParsedName> {
        let role = Role::from_number(self.varying(variant))?;
        Some(ParsedName {
            key: self.key.clone(),
            role: Some(role),
            sequence: Some(self.b),
            sub_index: self.constant_end(variant),
            rule: NameRule::Triplet,
        })
    }

    /// Reading used when the rest of the directory gives no hint.
    pub fn default_interpretation(&self) -> Option<ParsedName> {
        self.interpret(TripletVariant::FirstVaries)
            .or_else(|| self.interpret(TripletVariant::LastVaries))
    }
}

/// Positions that must match for two files to share a candidate grouping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct CandidateKey {
    /// 0 when the constant end slot is 1, so those candidates sort first.
    rank: u8,
    variant: TripletVariant,
    key: String,
    middle: u32,
    constant_end: u32,
}

/// Pick one reading per triplet file so that the resulting partition is the
/// same whatever order the files were listed in.
///
/// Returns the chosen [`ParsedName`] for every input index that ended up in
/// a valid pair. Indices without a valid candidate are left out and keep
/// their per-stem reading.
pub(crate) fn disambiguate(triplets: &[(usize, TripletParts)]) -> HashMap<usize, ParsedName> {
    let mut candidates: BTreeMap<CandidateKey, Vec<usize>> = BTreeMap::new();

    for (pos, (_, parts)) in triplets.iter().enumerate() {
        for variant in [TripletVariant::FirstVaries, TripletVariant::LastVaries] {
            if Role::from_number(parts.varying(variant)).is_none() {
                continue;
            }
            let constant_end = parts.constant_end(variant);
            let key = CandidateKey {
                rank: if constant_end == 1 { 0 } else { 1 },
                variant,
                key: parts.key.clone(),
                middle: parts.b,
                constant_end,
            };
            candidates.entry(key).or_default().push(pos);
        }
    }

    let mut claimed: HashSet<usize> = HashSet::new();
    let mut chosen = HashMap::new();

    for (candidate, members) in &candidates {
        if members.len() != 2 {
            continue;
        }
        let (first, second) = (&triplets[members[0]].1, &triplets[members[1]].1);
        let mut roles = [
            first.varying(candidate.variant),
            second.varying(candidate.variant),
        ];
        roles.sort_unstable();
        if roles != [1, 2] {
            continue;
        }
        if members.iter().any(|m| claimed.contains(m)) {
            continue;
        }

        for &member in members {
            let (idx, parts) = &triplets[member];
            if let Some(parsed) = parts.interpret(candidate.variant) {
                claimed.insert(member);
                chosen.insert(*idx, parsed);
            }
        }
    }

    chosen
}
