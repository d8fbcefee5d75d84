use md5::{Digest, Md5};
use serde::Serialize;
use std::fmt;

use crate::stages;

/// One of the three iXhash normalizers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    First,
    Second,
    Third,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::First, Stage::Second, Stage::Third];

    /// 1-based position, as used in list-hit reports.
    pub fn number(self) -> usize {
        self.index() + 1
    }

    fn index(self) -> usize {
        match self {
            Stage::First => 0,
            Stage::Second => 1,
            Stage::Third => 2,
        }
    }

    /// Digest of `msg` for this stage, or `""` when its gate fails.
    pub fn hash(self, msg: &[u8]) -> String {
        let normalized = match self {
            Stage::First => stages::first(msg),
            Stage::Second => stages::second(msg),
            Stage::Third => stages::third(msg),
        };
        normalized.map(|bytes| md5_hex(&bytes)).unwrap_or_default()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Lowercase hex MD5 of `bytes`.
pub fn md5_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Computes the first iXhash digest.
///
/// Requires at least 20 spaces/tabs and two newlines in the body.
pub fn first_hash(msg: &[u8]) -> String {
    Stage::First.hash(msg)
}

/// Computes the second iXhash digest.
///
/// Requires three markers (`<>()|@*'!?,` or `:/`) on a single line.
pub fn second_hash(msg: &[u8]) -> String {
    Stage::Second.hash(msg)
}

/// Computes the third iXhash digest.
///
/// Requires at least eight consecutive non-space bytes.
pub fn third_hash(msg: &[u8]) -> String {
    Stage::Third.hash(msg)
}

/// Computes all three digests of `msg`, which should be an e-mail body
/// without headers. A digest that could not be computed is empty.
pub fn all(msg: &[u8]) -> DigestTriple {
    DigestTriple {
        digests: Stage::ALL.map(|stage| stage.hash(msg)),
    }
}

/// Like [`all`], but an absent body short-circuits to three empty digests.
pub fn all_optional(msg: Option<&[u8]>) -> DigestTriple {
    match msg {
        Some(msg) => all(msg),
        None => DigestTriple::default(),
    }
}

/// The three stage digests of one body, in stage order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DigestTriple {
    digests: [String; 3],
}

impl DigestTriple {
    pub fn get(&self, stage: Stage) -> &str {
        &self.digests[stage.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, &str)> + '_ {
        Stage::ALL
            .into_iter()
            .zip(self.digests.iter().map(String::as_str))
    }

    /// Only the stages that produced a digest.
    pub fn computed(&self) -> impl Iterator<Item = (Stage, &str)> + '_ {
        self.iter().filter(|(_, digest)| !digest.is_empty())
    }

    /// True when no stage produced a digest.
    pub fn is_empty(&self) -> bool {
        self.digests.iter().all(String::is_empty)
    }

    pub fn into_array(self) -> [String; 3] {
        self.digests
    }
}

impl fmt::Display for DigestTriple {
    /// Space separated, with `-` for stages that have no digest.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .digests
            .iter()
            .map(|d| if d.is_empty() { "-" } else { d.as_str() })
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}
