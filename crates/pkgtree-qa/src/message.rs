use std::{collections::BTreeSet, fmt, path::PathBuf};

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Severity of a QA finding. Ordered from least to most severe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum QaMessageLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Traits a check may carry, used to include or exclude it from a run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum QaCheckProperty {
    /// Noticeably slower than the rest, e.g. reads every package file.
    Slow,
    /// Not known to produce reliable results yet.
    Untested,
    /// Only meaningful on a version-controlled checkout.
    NeedsVcs,
}

/// A set of [`QaCheckProperty`] values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QaCheckProperties(BTreeSet<QaCheckProperty>);

impl QaCheckProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, property: QaCheckProperty) -> Self {
        self.0.insert(property);
        self
    }

    pub fn insert(&mut self, property: QaCheckProperty) -> bool {
        self.0.insert(property)
    }

    pub fn contains(&self, property: QaCheckProperty) -> bool {
        self.0.contains(&property)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = QaCheckProperty> + '_ {
        self.0.iter().copied()
    }

    /// True when every property of `other` is also held here.
    pub fn is_superset(&self, other: &QaCheckProperties) -> bool {
        self.0.is_superset(&other.0)
    }

    /// True when no property is held by both sets.
    pub fn is_disjoint(&self, other: &QaCheckProperties) -> bool {
        self.0.is_disjoint(&other.0)
    }
}

impl FromIterator<QaCheckProperty> for QaCheckProperties {
    fn from_iter<I: IntoIterator<Item = QaCheckProperty>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One finding produced by a QA check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaMessage {
    /// File or directory the finding is about.
    pub entry: PathBuf,
    pub level: QaMessageLevel,
    /// Name of the check that produced the finding.
    pub check: String,
    pub text: String,
}

impl QaMessage {
    pub fn new(
        entry: impl Into<PathBuf>,
        level: QaMessageLevel,
        check: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            entry: entry.into(),
            level,
            check: check.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for QaMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: [{}] {}: {}",
            self.entry.display(),
            self.level,
            self.check,
            self.text
        )
    }
}
