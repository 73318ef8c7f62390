//! Validated name types.

use std::{borrow::Borrow, fmt, str::FromStr};

use serde::{Serialize, Serializer};

use crate::{
    error::{RepositoryError, Result},
    version::VersionSpec,
};

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $validate:path) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                match $validate(&value) {
                    Ok(()) => Ok(Self(value)),
                    Err(reason) => Err(RepositoryError::malformed_name($kind, value, reason)),
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = RepositoryError;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = RepositoryError;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

fn check_chars(value: &str, extra: &[char]) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".into());
    }
    match value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || extra.contains(c)))
    {
        Some(c) => Err(format!("invalid character '{c}'")),
        None => Ok(()),
    }
}

fn validate_category(value: &str) -> std::result::Result<(), String> {
    check_chars(value, &['+', '_', '.', '-'])?;
    if value.starts_with(['-', '.', '+']) {
        return Err("must not start with '-', '.' or '+'".into());
    }
    Ok(())
}

fn validate_package(value: &str) -> std::result::Result<(), String> {
    check_chars(value, &['+', '_', '-'])?;
    if value.starts_with(['-', '+']) {
        return Err("must not start with '-' or '+'".into());
    }
    if let Some((_, tail)) = value.rsplit_once('-') {
        if VersionSpec::parse(tail).is_ok() {
            return Err("must not end in something that looks like a version".into());
        }
    }
    Ok(())
}

fn validate_repository(value: &str) -> std::result::Result<(), String> {
    check_chars(value, &['_', '-'])?;
    if value.starts_with('-') {
        return Err("must not start with '-'".into());
    }
    Ok(())
}

fn validate_use_flag(value: &str) -> std::result::Result<(), String> {
    check_chars(value, &['+', '_', '@', '-'])?;
    if !value.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err("must start with a letter or digit".into());
    }
    Ok(())
}

fn validate_set(value: &str) -> std::result::Result<(), String> {
    check_chars(value, &['+', '_', '.', '-'])?;
    if value.starts_with(['-', '.']) {
        return Err("must not start with '-' or '.'".into());
    }
    Ok(())
}

name_type!(
    /// The category half of a qualified package name, e.g. `sys-apps`.
    CategoryNamePart,
    "category name",
    validate_category
);

name_type!(
    /// The package half of a qualified package name, e.g. `portage`.
    PackageNamePart,
    "package name",
    validate_package
);

name_type!(
    /// Name of a repository, unique within a database.
    RepositoryName,
    "repository name",
    validate_repository
);

name_type!(UseFlagName, "use flag name", validate_use_flag);

name_type!(SetName, "set name", validate_set);

impl SetName {
    /// Names of the sets backends generate themselves.
    pub(crate) fn builtin(name: &'static str) -> Self {
        debug_assert!(validate_set(name).is_ok());
        Self(name.to_string())
    }
}

/// A `category/package` pair.
///
/// Ordered by category, then package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedPackageName {
    pub category: CategoryNamePart,
    pub package: PackageNamePart,
}

impl QualifiedPackageName {
    pub fn new(category: CategoryNamePart, package: PackageNamePart) -> Self {
        Self {
            category,
            package,
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let malformed =
            |reason: &str| RepositoryError::malformed_name("qualified package name", value, reason);

        let mut parts = value.split('/');
        let (Some(category), Some(package), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("expected exactly one '/'"));
        };
        if category.is_empty() || package.is_empty() {
            return Err(malformed("both halves must be non-empty"));
        }

        Ok(Self {
            category: CategoryNamePart::new(category)?,
            package: PackageNamePart::new(package)?,
        })
    }
}

impl FromStr for QualifiedPackageName {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for QualifiedPackageName {
    type Error = RepositoryError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl fmt::Display for QualifiedPackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.package)
    }
}

impl Serialize for QualifiedPackageName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Splits a `name-version` string such as `bar-2.0-r1` into its name and
/// version.
///
/// The leftmost hyphen whose remainder parses as a version wins, so names
/// containing hyphens (`foo-bar-1.0`) split correctly.
pub fn split_name_version(value: &str) -> Option<(&str, VersionSpec)> {
    value
        .match_indices('-')
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .find_map(|i| {
            VersionSpec::parse(&value[i + 1..])
                .ok()
                .map(|version| (&value[..i], version))
        })
}
