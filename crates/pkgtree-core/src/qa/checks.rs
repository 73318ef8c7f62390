//! Stock QA checks.

use std::collections::BTreeSet;

use pkgtree_qa::{QaCheckProperties, QaCheckProperty, QaMessage, QaMessageLevel};
use pkgtree_utils::{
    fs::{read_optional, sorted_entries},
    text::config_lines,
};
use regex::Regex;

use super::{QaCheck, QaScope, QaSubject};
use crate::{
    error::Result,
    names::{split_name_version, RepositoryName},
};

/// Top-level directories that are never categories.
pub(crate) const NON_CATEGORY_DIRS: [&str; 7] = [
    "profiles",
    "metadata",
    "eclass",
    "licenses",
    "sets",
    "distfiles",
    "scripts",
];

pub fn default_checks() -> Result<Vec<Box<dyn QaCheck>>> {
    Ok(vec![
        Box::new(RepoNameCheck),
        Box::new(CategoriesCheck),
        Box::new(MetadataXmlCheck),
        Box::new(ManifestCheck),
        Box::new(EbuildNameCheck),
        Box::new(WhitespaceCheck),
        Box::new(DeprecatedFunctionsCheck::new()?),
    ])
}

/// `profiles/repo_name` must exist and hold a valid name.
pub struct RepoNameCheck;

impl QaCheck for RepoNameCheck {
    fn name(&self) -> &'static str {
        "repo_name"
    }

    fn scope(&self) -> QaScope {
        QaScope::Tree
    }

    fn run(&self, subject: &QaSubject<'_>, findings: &mut Vec<QaMessage>) -> Result<()> {
        let QaSubject::Tree { location, .. } = subject else {
            return Ok(());
        };
        let path = location.join("profiles/repo_name");

        match read_optional(&path)? {
            None => {
                findings.push(QaMessage::new(
                    path,
                    QaMessageLevel::Error,
                    self.name(),
                    "profiles/repo_name is missing",
                ))
            }
            Some(content) => {
                let name = content.trim();
                if let Err(err) = RepositoryName::new(name) {
                    findings.push(QaMessage::new(
                        path,
                        QaMessageLevel::Error,
                        self.name(),
                        err.to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// `profiles/categories` and the category directories must agree.
pub struct CategoriesCheck;

impl QaCheck for CategoriesCheck {
    fn name(&self) -> &'static str {
        "categories"
    }

    fn scope(&self) -> QaScope {
        QaScope::Tree
    }

    fn run(&self, subject: &QaSubject<'_>, findings: &mut Vec<QaMessage>) -> Result<()> {
        let QaSubject::Tree { location, .. } = subject else {
            return Ok(());
        };
        let path = location.join("profiles/categories");
        let Some(content) = read_optional(&path)? else {
            findings.push(QaMessage::new(
                path,
                QaMessageLevel::Warning,
                self.name(),
                "profiles/categories is missing",
            ));
            return Ok(());
        };

        let listed: BTreeSet<&str> = config_lines(&content).collect();
        for category in &listed {
            if !location.join(category).is_dir() {
                findings.push(QaMessage::new(
                    &path,
                    QaMessageLevel::Warning,
                    self.name(),
                    format!("category '{}' has no directory", category),
                ));
            }
        }

        for dir in sorted_entries(location)? {
            if !dir.is_dir() {
                continue;
            }
            let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if name.starts_with('.') || NON_CATEGORY_DIRS.contains(&name.as_str()) {
                continue;
            }
            if !listed.contains(name.as_str()) {
                findings.push(QaMessage::new(
                    dir,
                    QaMessageLevel::Warning,
                    self.name(),
                    format!("directory '{}' is not listed in profiles/categories", name),
                ));
            }
        }
        Ok(())
    }
}

pub struct MetadataXmlCheck;

impl QaCheck for MetadataXmlCheck {
    fn name(&self) -> &'static str {
        "metadata_xml"
    }

    fn scope(&self) -> QaScope {
        QaScope::Package
    }

    fn run(&self, subject: &QaSubject<'_>, findings: &mut Vec<QaMessage>) -> Result<()> {
        let QaSubject::Package { location, .. } = subject else {
            return Ok(());
        };
        if !location.join("metadata.xml").is_file() {
            findings.push(QaMessage::new(
                *location,
                QaMessageLevel::Error,
                self.name(),
                "metadata.xml is missing",
            ));
        }
        Ok(())
    }
}

pub struct ManifestCheck;

impl QaCheck for ManifestCheck {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn scope(&self) -> QaScope {
        QaScope::Package
    }

    fn run(&self, subject: &QaSubject<'_>, findings: &mut Vec<QaMessage>) -> Result<()> {
        let QaSubject::Package { location, .. } = subject else {
            return Ok(());
        };
        if !location.join("Manifest").is_file() {
            findings.push(QaMessage::new(
                *location,
                QaMessageLevel::Warning,
                self.name(),
                "Manifest is missing",
            ));
        }
        Ok(())
    }
}

/// Every `.ebuild` must be named `<package>-<version>.ebuild`.
pub struct EbuildNameCheck;

impl QaCheck for EbuildNameCheck {
    fn name(&self) -> &'static str {
        "ebuild_name"
    }

    fn scope(&self) -> QaScope {
        QaScope::Package
    }

    fn run(&self, subject: &QaSubject<'_>, findings: &mut Vec<QaMessage>) -> Result<()> {
        let QaSubject::Package {
            location, package, ..
        } = subject
        else {
            return Ok(());
        };

        let mut ebuilds = 0;
        for path in sorted_entries(location)? {
            let Some(stem) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(".ebuild"))
            else {
                continue;
            };
            ebuilds += 1;
            match split_name_version(stem) {
                Some((name, _)) if name == *package => {}
                Some((name, _)) => {
                    findings.push(QaMessage::new(
                        &path,
                        QaMessageLevel::Error,
                        self.name(),
                        format!("ebuild is named for '{}', not '{}'", name, package),
                    ))
                }
                None => {
                    findings.push(QaMessage::new(
                        &path,
                        QaMessageLevel::Error,
                        self.name(),
                        "file name has no valid version",
                    ))
                }
            }
        }

        if ebuilds == 0 {
            findings.push(QaMessage::new(
                *location,
                QaMessageLevel::Warning,
                self.name(),
                "package directory has no ebuilds",
            ));
        }
        Ok(())
    }
}

/// Trailing whitespace, and indentation with spaces instead of tabs.
pub struct WhitespaceCheck;

impl QaCheck for WhitespaceCheck {
    fn name(&self) -> &'static str {
        "whitespace"
    }

    fn scope(&self) -> QaScope {
        QaScope::Ebuild
    }

    fn run(&self, subject: &QaSubject<'_>, findings: &mut Vec<QaMessage>) -> Result<()> {
        let QaSubject::Ebuild { location, content } = subject else {
            return Ok(());
        };
        for (number, line) in content.lines().enumerate() {
            let number = number + 1;
            if line.ends_with([' ', '\t']) {
                findings.push(QaMessage::new(
                    *location,
                    QaMessageLevel::Warning,
                    self.name(),
                    format!("line {}: trailing whitespace", number),
                ));
            }
            if line.starts_with(' ') && !line.trim().is_empty() {
                findings.push(QaMessage::new(
                    *location,
                    QaMessageLevel::Info,
                    self.name(),
                    format!("line {}: indented with spaces", number),
                ));
            }
        }
        Ok(())
    }
}

/// Calls to functions removed from current EAPIs.
pub struct DeprecatedFunctionsCheck {
    pattern: Regex,
}

impl DeprecatedFunctionsCheck {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(r"\b(dosed|dohard|einstall|hasq|useq|epause|ebeep)\b")?,
        })
    }
}

impl QaCheck for DeprecatedFunctionsCheck {
    fn name(&self) -> &'static str {
        "deprecated_functions"
    }

    fn properties(&self) -> QaCheckProperties {
        QaCheckProperties::new().with(QaCheckProperty::Slow)
    }

    fn scope(&self) -> QaScope {
        QaScope::Ebuild
    }

    fn run(&self, subject: &QaSubject<'_>, findings: &mut Vec<QaMessage>) -> Result<()> {
        let QaSubject::Ebuild { location, content } = subject else {
            return Ok(());
        };
        for (number, line) in content.lines().enumerate() {
            let code = line.split_once('#').map_or(line, |(code, _)| code);
            for found in self.pattern.find_iter(code) {
                findings.push(QaMessage::new(
                    *location,
                    QaMessageLevel::Warning,
                    self.name(),
                    format!("line {}: deprecated function '{}'", number + 1, found.as_str()),
                ));
            }
        }
        Ok(())
    }
}
