// src/version/mod.rs

//! Debian version handling and relation matching
//!
//! Versions follow the dpkg format `[epoch:]upstream[-revision]`. Comparison
//! uses the dpkg algorithm: non-digit runs are compared character by character
//! (letters before non-letters, `~` before everything including the end of the
//! string), digit runs are compared numerically.
//!
//! Parsing never fails. A version with a non-numeric epoch keeps the whole
//! string as its upstream part, so malformed input still orders
//! deterministically instead of raising an error.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed Debian version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebVersion {
    pub epoch: u64,
    pub upstream: String,
    pub revision: String,
}

impl DebVersion {
    /// Parse a Debian version string
    ///
    /// Format: [epoch:]upstream[-revision]
    /// Examples:
    /// - "1.2.3" → epoch=0, upstream="1.2.3", revision=""
    /// - "2:1.2.3" → epoch=2, upstream="1.2.3", revision=""
    /// - "1.2.3-4ubuntu1" → epoch=0, upstream="1.2.3", revision="4ubuntu1"
    /// - "1:2.3-4-5" → epoch=1, upstream="2.3-4", revision="5"
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        let (epoch, rest) = match s.split_once(':') {
            Some((e, r)) => match e.parse::<u64>() {
                Ok(epoch) => (epoch, r),
                Err(_) => (0, s),
            },
            None => (0, s),
        };

        let (upstream, revision) = match rest.rsplit_once('-') {
            Some((u, r)) => (u.to_string(), r.to_string()),
            None => (rest.to_string(), String::new()),
        };

        Self {
            epoch,
            upstream,
            revision,
        }
    }

    /// Compare two Debian versions
    pub fn compare(&self, other: &DebVersion) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| verrevcmp(self.upstream.as_bytes(), other.upstream.as_bytes()))
            .then_with(|| verrevcmp(self.revision.as_bytes(), other.revision.as_bytes()))
    }
}

impl fmt::Display for DebVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.upstream)?;
        if !self.revision.is_empty() {
            write!(f, "-{}", self.revision)?;
        }
        Ok(())
    }
}

impl Ord for DebVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for DebVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort weight of a single character in a non-digit run
fn order(c: Option<u8>) -> i32 {
    match c {
        None => 0,
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => c as i32,
        Some(b'~') => -1,
        Some(c) => c as i32 + 256,
    }
}

fn is_digit(c: Option<&u8>) -> bool {
    c.is_some_and(|c| c.is_ascii_digit())
}

/// dpkg's upstream/revision comparison
fn verrevcmp(a: &[u8], b: &[u8]) -> Ordering {
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        let mut first_diff = 0i32;

        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let ac = order(a.get(i).copied());
            let bc = order(b.get(j).copied());
            if ac != bc {
                return ac.cmp(&bc);
            }
            i += 1;
            j += 1;
        }

        while a.get(i) == Some(&b'0') {
            i += 1;
        }
        while b.get(j) == Some(&b'0') {
            j += 1;
        }

        while is_digit(a.get(i)) && is_digit(b.get(j)) {
            if first_diff == 0 {
                first_diff = a[i] as i32 - b[j] as i32;
            }
            i += 1;
            j += 1;
        }

        if is_digit(a.get(i)) {
            return Ordering::Greater;
        }
        if is_digit(b.get(j)) {
            return Ordering::Less;
        }
        if first_diff != 0 {
            return first_diff.cmp(&0);
        }
    }

    Ordering::Equal
}

/// Compare two version strings with Debian ordering
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    DebVersion::parse(a).compare(&DebVersion::parse(b))
}

/// Relational operator of a dependency constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// No version constraint
    #[default]
    NoOperation,
    LessOrEqual,
    GreaterOrEqual,
    LessThan,
    GreaterThan,
    Equals,
    NotEqual,
}

impl RelationType {
    /// Debian control-file spelling of the operator
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::NoOperation => "",
            RelationType::LessOrEqual => "<=",
            RelationType::GreaterOrEqual => ">=",
            RelationType::LessThan => "<<",
            RelationType::GreaterThan => ">>",
            RelationType::Equals => "=",
            RelationType::NotEqual => "!=",
        }
    }
}

impl FromStr for RelationType {
    type Err = String;

    /// Parse an operator as written in control files
    ///
    /// The obsolete single `<` and `>` mean `<=` and `>=` respectively, as in dpkg.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "" => Ok(RelationType::NoOperation),
            "<=" | "<" => Ok(RelationType::LessOrEqual),
            ">=" | ">" => Ok(RelationType::GreaterOrEqual),
            "<<" => Ok(RelationType::LessThan),
            ">>" => Ok(RelationType::GreaterThan),
            "=" => Ok(RelationType::Equals),
            "!=" => Ok(RelationType::NotEqual),
            other => Err(format!("Invalid relation operator: {}", other)),
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a comparison result satisfies a relation
///
/// `result` is the ordering of the present version relative to the required one.
pub fn dependency_version_match(result: Ordering, relation: RelationType) -> bool {
    match relation {
        RelationType::LessOrEqual => result != Ordering::Greater,
        RelationType::GreaterOrEqual => result != Ordering::Less,
        RelationType::LessThan => result == Ordering::Less,
        RelationType::GreaterThan => result == Ordering::Greater,
        RelationType::Equals => result == Ordering::Equal,
        RelationType::NotEqual => result != Ordering::Equal,
        RelationType::NoOperation => true,
    }
}

/// Check whether `present` satisfies `relation required`
pub fn version_satisfies(present: &str, relation: RelationType, required: &str) -> bool {
    if relation == RelationType::NoOperation {
        return true;
    }
    dependency_version_match(compare_versions(present, required), relation)
}
