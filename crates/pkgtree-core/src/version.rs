//! Package versions and their ordering.
//!
//! Grammar: `N(.N)*[a-z]?(_(alpha|beta|pre|rc|p)N?)*(-scm)?(-rN)?`, plus a
//! bare `scm`. Numeric components are compared numerically; components
//! after the first that start with `0` compare as decimal fractions.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Serialize, Serializer};

use crate::error::{RepositoryError, Result};

/// A version suffix keyword. Ordered by precedence; a version without a
/// suffix sits between `Rc` and `P`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SuffixKind {
    Alpha,
    Beta,
    Pre,
    Rc,
    P,
}

impl SuffixKind {
    fn parse_prefix(s: &str) -> Option<(Self, &str)> {
        // Longest keywords first so `pre` is not read as `p` + "re".
        const KEYWORDS: [(&str, SuffixKind); 5] = [
            ("alpha", SuffixKind::Alpha),
            ("beta", SuffixKind::Beta),
            ("pre", SuffixKind::Pre),
            ("rc", SuffixKind::Rc),
            ("p", SuffixKind::P),
        ];
        KEYWORDS
            .iter()
            .find_map(|(kw, kind)| s.strip_prefix(kw).map(|rest| (*kind, rest)))
    }

    fn as_str(self) -> &'static str {
        match self {
            SuffixKind::Alpha => "alpha",
            SuffixKind::Beta => "beta",
            SuffixKind::Pre => "pre",
            SuffixKind::Rc => "rc",
            SuffixKind::P => "p",
        }
    }
}

#[derive(Debug, Clone)]
struct Suffix {
    kind: SuffixKind,
    number: String,
}

/// A parsed package version.
///
/// Equality follows the ordering, so `1.0-r0 == 1.0`.
#[derive(Debug, Clone)]
pub struct VersionSpec {
    text: String,
    components: Vec<String>,
    letter: Option<char>,
    suffixes: Vec<Suffix>,
    scm: bool,
    revision: String,
}

impl VersionSpec {
    pub fn parse(text: &str) -> Result<Self> {
        let fail = |reason: &str| RepositoryError::malformed_version(text, reason);

        if text.is_empty() {
            return Err(fail("empty version"));
        }

        if text == "scm" {
            return Ok(Self {
                text: text.to_string(),
                components: Vec::new(),
                letter: None,
                suffixes: Vec::new(),
                scm: true,
                revision: String::new(),
            });
        }

        let mut rest = text;

        let mut components = Vec::new();
        loop {
            let digits = leading_digits(rest);
            if digits.is_empty() {
                return Err(fail("expected a numeric component"));
            }
            components.push(digits.to_string());
            rest = &rest[digits.len()..];
            match rest.strip_prefix('.') {
                Some(after) => rest = after,
                None => break,
            }
        }

        let mut letter = None;
        if let Some(c) = rest.chars().next() {
            if c.is_ascii_lowercase() {
                letter = Some(c);
                rest = &rest[1..];
            }
        }

        let mut suffixes = Vec::new();
        while let Some(after) = rest.strip_prefix('_') {
            let (kind, after) =
                SuffixKind::parse_prefix(after).ok_or_else(|| fail("unknown suffix"))?;
            let number = leading_digits(after);
            suffixes.push(Suffix {
                kind,
                number: number.to_string(),
            });
            rest = &after[number.len()..];
        }

        let mut scm = false;
        if let Some(after) = rest.strip_prefix("-scm") {
            scm = true;
            rest = after;
        }

        let mut revision = String::new();
        if let Some(after) = rest.strip_prefix("-r") {
            let digits = leading_digits(after);
            if digits.is_empty() {
                return Err(fail("revision needs a number"));
            }
            revision = digits.to_string();
            rest = &after[digits.len()..];
        }

        if !rest.is_empty() {
            return Err(fail("unexpected trailing characters"));
        }

        Ok(Self {
            text: text.to_string(),
            components,
            letter,
            suffixes,
            scm,
            revision,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The revision number as written, or `"0"` when there is none.
    pub fn revision(&self) -> &str {
        let trimmed = self.revision.trim_start_matches('0');
        if trimmed.is_empty() {
            "0"
        } else {
            trimmed
        }
    }

    pub fn has_revision(&self) -> bool {
        !self.revision.is_empty()
    }

    /// The same version with any `-rN` part removed.
    pub fn remove_revision(&self) -> VersionSpec {
        let mut version = self.clone();
        if version.has_revision() {
            let cut = version.text.len() - version.revision.len() - "-r".len();
            version.text.truncate(cut);
            version.revision.clear();
        }
        version
    }

    /// True for live versions: `scm`, `-scm`, or a leading `9999`-style
    /// component.
    pub fn is_scm(&self) -> bool {
        self.scm
            || self
                .components
                .first()
                .is_some_and(|c| c.len() >= 4 && c.chars().all(|d| d == '9'))
    }

    /// Equal when ignoring revisions, as used by `~cat/pkg-1.0` matches.
    pub fn tilde_eq(&self, other: &VersionSpec) -> bool {
        self.compare(other, false) == Ordering::Equal
    }

    fn compare(&self, other: &VersionSpec, with_revision: bool) -> Ordering {
        self.scm_bare_cmp(other)
            .then_with(|| compare_components(&self.components, &other.components))
            .then_with(|| self.letter.cmp(&other.letter))
            .then_with(|| compare_suffixes(&self.suffixes, &other.suffixes))
            .then_with(|| self.scm.cmp(&other.scm))
            .then_with(|| {
                if with_revision {
                    compare_numbers(&self.revision, &other.revision)
                } else {
                    Ordering::Equal
                }
            })
    }

    // A bare `scm` has no components and is newer than anything numeric.
    fn scm_bare_cmp(&self, other: &VersionSpec) -> Ordering {
        let a = self.components.is_empty();
        let b = other.components.is_empty();
        a.cmp(&b)
    }
}

fn leading_digits(s: &str) -> &str {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    &s[..end]
}

/// Numeric comparison of arbitrarily long digit strings. Empty is zero.
fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_components(a: &[String], b: &[String]) -> Ordering {
    let (Some(first_a), Some(first_b)) = (a.first(), b.first()) else {
        return a.len().cmp(&b.len());
    };

    let ordering = compare_numbers(first_a, first_b);
    if ordering != Ordering::Equal {
        return ordering;
    }

    for (x, y) in a.iter().zip(b.iter()).skip(1) {
        let ordering = if x.starts_with('0') || y.starts_with('0') {
            x.trim_end_matches('0').cmp(y.trim_end_matches('0'))
        } else {
            compare_numbers(x, y)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    a.len().cmp(&b.len())
}

fn compare_suffixes(a: &[Suffix], b: &[Suffix]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ordering = x
            .kind
            .cmp(&y.kind)
            .then_with(|| compare_numbers(&x.number, &y.number));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    // An extra `_p` makes a version newer; any other extra suffix older.
    match a.len().cmp(&b.len()) {
        Ordering::Greater => extra_suffix_order(&a[b.len()]),
        Ordering::Less => extra_suffix_order(&b[a.len()]).reverse(),
        Ordering::Equal => Ordering::Equal,
    }
}

fn extra_suffix_order(extra: &Suffix) -> Ordering {
    if extra.kind == SuffixKind::P {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

impl PartialEq for VersionSpec {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionSpec {}

impl PartialOrd for VersionSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other, true)
    }
}

impl FromStr for VersionSpec {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for VersionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl fmt::Display for SuffixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
