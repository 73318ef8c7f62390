//! Package dependency-style matchers, e.g. `foo/bar` or `>=foo/bar-2.0`.

use std::{cmp::Ordering, fmt, str::FromStr};

use crate::{
    error::{RepositoryError, Result},
    names::{split_name_version, QualifiedPackageName},
    package_id::PackageId,
    version::VersionSpec,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOperator {
    Equal,
    /// Equal ignoring revision.
    Tilde,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl VersionOperator {
    fn as_str(self) -> &'static str {
        match self {
            VersionOperator::Equal => "=",
            VersionOperator::Tilde => "~",
            VersionOperator::Less => "<",
            VersionOperator::LessOrEqual => "<=",
            VersionOperator::Greater => ">",
            VersionOperator::GreaterOrEqual => ">=",
        }
    }

    fn split(value: &str) -> Option<(Self, &str)> {
        const OPERATORS: [(&str, VersionOperator); 6] = [
            (">=", VersionOperator::GreaterOrEqual),
            ("<=", VersionOperator::LessOrEqual),
            ("=", VersionOperator::Equal),
            ("~", VersionOperator::Tilde),
            (">", VersionOperator::Greater),
            ("<", VersionOperator::Less),
        ];
        OPERATORS
            .iter()
            .find_map(|(prefix, op)| value.strip_prefix(prefix).map(|rest| (*op, rest)))
    }

    fn accepts(self, candidate: &VersionSpec, wanted: &VersionSpec) -> bool {
        let ordering = candidate.cmp(wanted);
        match self {
            VersionOperator::Equal => ordering == Ordering::Equal,
            VersionOperator::Tilde => candidate.tilde_eq(wanted),
            VersionOperator::Less => ordering == Ordering::Less,
            VersionOperator::LessOrEqual => ordering != Ordering::Greater,
            VersionOperator::Greater => ordering == Ordering::Greater,
            VersionOperator::GreaterOrEqual => ordering != Ordering::Less,
        }
    }
}

/// Selects ids by qualified name and, optionally, version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMatcher {
    name: QualifiedPackageName,
    version: Option<(VersionOperator, VersionSpec)>,
}

impl PackageMatcher {
    pub fn for_name(name: QualifiedPackageName) -> Self {
        Self {
            name,
            version: None,
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let Some((op, rest)) = VersionOperator::split(value) else {
            return Ok(Self::for_name(QualifiedPackageName::parse(value)?));
        };

        let (name, version) = split_name_version(rest).ok_or_else(|| {
            RepositoryError::malformed_version(value, "versioned matcher needs name-version")
        })?;

        Ok(Self {
            name: QualifiedPackageName::parse(name)?,
            version: Some((op, version)),
        })
    }

    pub fn package_name(&self) -> &QualifiedPackageName {
        &self.name
    }

    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }

    pub fn matches(&self, id: &PackageId) -> bool {
        if id.name() != &self.name {
            return false;
        }
        match &self.version {
            None => true,
            Some((op, wanted)) => op.accepts(id.version(), wanted),
        }
    }
}

impl FromStr for PackageMatcher {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            None => write!(f, "{}", self.name),
            Some((op, version)) => write!(f, "{}{}-{}", op.as_str(), self.name, version),
        }
    }
}
