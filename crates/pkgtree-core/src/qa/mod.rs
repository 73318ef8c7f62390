//! QA check dispatch over an on-disk tree.
//!
//! Checks come in three scopes: the whole tree, one package directory, and
//! one ebuild file. Package directories are checked in parallel; findings
//! are gathered per package and handed to the reporter afterwards, in
//! tree order, from the calling thread.

pub mod checks;

use std::path::{Component, Path};

use pkgtree_qa::{QaCheckProperties, QaMessage, QaMessageLevel, QaReporter};
use pkgtree_utils::{
    fs::{read_optional, sorted_entries},
    path::absolute,
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::debug;

use crate::{
    error::{RepositoryError, Result},
    index::PackageIndex,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QaScope {
    Tree,
    Package,
    Ebuild,
}

/// What a check is looking at.
pub enum QaSubject<'a> {
    Tree {
        location: &'a Path,
    },
    Package {
        location: &'a Path,
        category: &'a str,
        package: &'a str,
    },
    Ebuild {
        location: &'a Path,
        content: &'a str,
    },
}

impl QaSubject<'_> {
    pub fn location(&self) -> &Path {
        match self {
            QaSubject::Tree { location, .. }
            | QaSubject::Package { location, .. }
            | QaSubject::Ebuild { location, .. } => location,
        }
    }
}

pub trait QaCheck: Send + Sync {
    fn name(&self) -> &'static str;

    fn properties(&self) -> QaCheckProperties {
        QaCheckProperties::new()
    }

    fn scope(&self) -> QaScope;

    /// Appends findings about `subject`, which always matches
    /// [`scope`](QaCheck::scope).
    fn run(&self, subject: &QaSubject<'_>, findings: &mut Vec<QaMessage>) -> Result<()>;
}

/// The part of a tree a run is narrowed to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum QaTarget {
    Tree,
    Category(String),
    Package(String, String),
    Ebuild(String, String, String),
}

fn target_of(location: &Path, target: &Path) -> Result<QaTarget> {
    let location = absolute(location)?;
    let target = absolute(target)?;
    let relative = target.strip_prefix(&location).map_err(|_| {
        RepositoryError::InvalidArgument(format!(
            "{} is not inside {}",
            target.display(),
            location.display()
        ))
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(RepositoryError::InvalidArgument(format!(
                    "{} is not inside {}",
                    target.display(),
                    location.display()
                )))
            }
        }
    }

    match parts.as_slice() {
        [] => Ok(QaTarget::Tree),
        [category] => Ok(QaTarget::Category(category.clone())),
        [category, package] => Ok(QaTarget::Package(category.clone(), package.clone())),
        [category, package, file] => {
            Ok(QaTarget::Ebuild(
                category.clone(),
                package.clone(),
                file.clone(),
            ))
        }
        _ => {
            Err(RepositoryError::InvalidArgument(format!(
                "{} is not a tree, category, package or ebuild",
                target.display()
            )))
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

/// Package directories of `category`, by name.
fn package_dirs(location: &Path, category: &str) -> Result<Vec<String>> {
    Ok(sorted_entries(location.join(category))?
        .into_iter()
        .filter(|path| path.is_dir() && !is_hidden(path))
        .filter_map(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .collect())
}

fn deliver(
    reporter: &mut dyn QaReporter,
    findings: Vec<QaMessage>,
    minimum_level: QaMessageLevel,
) {
    for finding in findings {
        if finding.level >= minimum_level {
            reporter.message(finding);
        }
    }
}

pub struct QaEngine {
    checks: Vec<Box<dyn QaCheck>>,
}

impl QaEngine {
    pub fn new() -> Self {
        Self {
            checks: Vec::new(),
        }
    }

    /// An engine with every stock check registered.
    pub fn with_default_checks() -> Result<Self> {
        let mut engine = Self::new();
        for check in checks::default_checks()? {
            engine.register(check);
        }
        Ok(engine)
    }

    pub fn register(&mut self, check: Box<dyn QaCheck>) {
        self.checks.push(check);
    }

    pub fn check_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.checks.iter().map(|check| check.name())
    }

    fn selected(
        &self,
        scope: QaScope,
        include: &QaCheckProperties,
        exclude: &QaCheckProperties,
    ) -> Vec<&dyn QaCheck> {
        self.checks
            .iter()
            .filter(|check| check.scope() == scope)
            .filter(|check| {
                let properties = check.properties();
                properties.is_superset(include) && properties.is_disjoint(exclude)
            })
            .map(|check| check.as_ref())
            .collect()
    }

    fn check_package(
        location: &Path,
        category: &str,
        package: &str,
        only_file: Option<&str>,
        package_checks: &[&dyn QaCheck],
        ebuild_checks: &[&dyn QaCheck],
    ) -> Result<Vec<QaMessage>> {
        let dir = location.join(category).join(package);
        let mut findings = Vec::new();
        if !dir.is_dir() {
            return Ok(findings);
        }

        let subject = QaSubject::Package {
            location: &dir,
            category,
            package,
        };
        for check in package_checks {
            check.run(&subject, &mut findings)?;
        }

        if ebuild_checks.is_empty() {
            return Ok(findings);
        }
        for path in sorted_entries(&dir)? {
            let Some(file_name) = path.file_name().map(|name| name.to_string_lossy()) else {
                continue;
            };
            if !file_name.ends_with(".ebuild") {
                continue;
            }
            if only_file.is_some_and(|only| only != file_name) {
                continue;
            }
            let Some(content) = read_optional(&path)? else {
                continue;
            };
            let subject = QaSubject::Ebuild {
                location: &path,
                content: &content,
            };
            for check in ebuild_checks {
                check.run(&subject, &mut findings)?;
            }
        }

        Ok(findings)
    }

    /// Runs the selected checks against `target` inside the tree at
    /// `location`.
    ///
    /// `target` may be the tree itself, a category, a package directory or
    /// an ebuild file. A relative `target` is taken from the current
    /// directory. Anything outside the tree is an `InvalidArgument`.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        location: &Path,
        index: &PackageIndex,
        reporter: &mut dyn QaReporter,
        include: &QaCheckProperties,
        exclude: &QaCheckProperties,
        minimum_level: QaMessageLevel,
        target: &Path,
    ) -> Result<()> {
        let target = target_of(location, target)?;
        debug!("running QA checks on {:?} in {}", target, location.display());

        if target == QaTarget::Tree {
            reporter.status("Checking tree");
            let subject = QaSubject::Tree { location };
            let mut findings = Vec::new();
            for check in self.selected(QaScope::Tree, include, exclude) {
                check.run(&subject, &mut findings)?;
            }
            deliver(reporter, findings, minimum_level);
        }

        let (packages, only_file): (Vec<(String, String)>, Option<String>) = match target {
            QaTarget::Tree => {
                let mut packages = Vec::new();
                for category in index.category_names() {
                    for package in package_dirs(location, category.as_str())? {
                        packages.push((category.to_string(), package));
                    }
                }
                (packages, None)
            }
            QaTarget::Category(category) => {
                let packages = package_dirs(location, &category)?
                    .into_iter()
                    .map(|package| (category.clone(), package))
                    .collect();
                (packages, None)
            }
            QaTarget::Package(category, package) => (vec![(category, package)], None),
            QaTarget::Ebuild(category, package, file) => {
                (vec![(category, package)], Some(file))
            }
        };

        let package_checks = self.selected(QaScope::Package, include, exclude);
        let ebuild_checks = self.selected(QaScope::Ebuild, include, exclude);
        debug!(
            "{} packages, {} package checks, {} ebuild checks",
            packages.len(),
            package_checks.len(),
            ebuild_checks.len()
        );

        let results: Vec<Vec<QaMessage>> = packages
            .par_iter()
            .map(|(category, package)| {
                Self::check_package(
                    location,
                    category,
                    package,
                    only_file.as_deref(),
                    &package_checks,
                    &ebuild_checks,
                )
            })
            .collect::<Result<_>>()?;

        for ((category, package), findings) in packages.iter().zip(results) {
            reporter.status(&format!("Checking {}/{}", category, package));
            deliver(reporter, findings, minimum_level);
        }

        reporter.status("Done");
        Ok(())
    }
}

impl Default for QaEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pkgtree_qa::{CollectorReporter, QaCheckProperty};

    use super::*;
    use crate::test_utils::{create_test_tree, write};

    fn index_for(categories: &[&str]) -> PackageIndex {
        let mut index = PackageIndex::new();
        for category in categories {
            index.insert_category(crate::names::CategoryNamePart::new(*category).unwrap());
        }
        index
    }

    fn run(
        location: &Path,
        index: &PackageIndex,
        include: QaCheckProperties,
        exclude: QaCheckProperties,
        level: QaMessageLevel,
        target: &Path,
    ) -> CollectorReporter {
        let engine = QaEngine::with_default_checks().unwrap();
        let mut reporter = CollectorReporter::default();
        engine
            .run(location, index, &mut reporter, &include, &exclude, level, target)
            .unwrap();
        reporter
    }

    /// `path` spelled relative to the current directory, climbing to `/`
    /// first.
    fn from_cwd(path: &Path) -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        let up: PathBuf = cwd.components().skip(1).map(|_| "..").collect();
        up.join(path.strip_prefix("/").unwrap())
    }

    #[test]
    fn test_target_of() {
        let root = Path::new("/repo");
        assert_eq!(target_of(root, root).unwrap(), QaTarget::Tree);
        assert_eq!(
            target_of(root, Path::new("/repo/foo/bar")).unwrap(),
            QaTarget::Package("foo".into(), "bar".into())
        );
        assert_eq!(
            target_of(root, Path::new("/repo/foo/../baz/./qux")).unwrap(),
            QaTarget::Package("baz".into(), "qux".into())
        );
        assert_eq!(
            target_of(Path::new("/repo/./x/.."), Path::new("/repo/foo")).unwrap(),
            QaTarget::Category("foo".into())
        );
        assert!(matches!(
            target_of(root, Path::new("/elsewhere")),
            Err(RepositoryError::InvalidArgument(_))
        ));
        assert!(target_of(root, Path::new("/repo/../x")).is_err());
    }

    #[test]
    fn test_target_of_relative_to_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let root = cwd.join("repo");
        assert_eq!(
            target_of(&root, Path::new("repo/foo")).unwrap(),
            QaTarget::Category("foo".into())
        );
        assert_eq!(
            target_of(&root, Path::new("repo/foo/../bar/baz")).unwrap(),
            QaTarget::Package("bar".into(), "baz".into())
        );
        assert_eq!(
            target_of(&root, &from_cwd(&root.join("cat/pkg/pkg-1.ebuild"))).unwrap(),
            QaTarget::Ebuild("cat".into(), "pkg".into(), "pkg-1.ebuild".into())
        );
        assert!(target_of(&root, Path::new("foo")).is_err());
        assert!(target_of(&root, Path::new("repo/..")).is_err());
    }

    #[test]
    fn test_findings_on_fixture() {
        let tree = create_test_tree();
        let index = index_for(&["foo", "foo1", "foo2", "foo3", "foo4"]);
        let reporter = run(
            &tree.repo,
            &index,
            QaCheckProperties::new(),
            QaCheckProperties::new(),
            QaMessageLevel::Debug,
            &tree.repo,
        );

        assert!(!reporter.is_empty());
        let missing_metadata = reporter
            .messages()
            .iter()
            .filter(|m| m.check == "metadata_xml")
            .count();
        assert_eq!(missing_metadata, 4);
        assert!(reporter
            .messages()
            .iter()
            .any(|m| m.check == "deprecated_functions"));
        assert_eq!(reporter.statuses().first().map(String::as_str), Some("Checking tree"));
        assert_eq!(reporter.statuses().last().map(String::as_str), Some("Done"));
    }

    #[test]
    fn test_level_gating_and_properties() {
        let tree = create_test_tree();
        let index = index_for(&["foo", "foo1", "foo2", "foo3", "foo4"]);

        let errors = run(
            &tree.repo,
            &index,
            QaCheckProperties::new(),
            QaCheckProperties::new(),
            QaMessageLevel::Error,
            &tree.repo,
        );
        assert!(!errors.is_empty());
        assert!(errors
            .messages()
            .iter()
            .all(|m| m.level == QaMessageLevel::Error));

        let fast = run(
            &tree.repo,
            &index,
            QaCheckProperties::new(),
            QaCheckProperties::new().with(QaCheckProperty::Slow),
            QaMessageLevel::Debug,
            &tree.repo,
        );
        assert!(fast.messages().iter().all(|m| m.check != "deprecated_functions"));

        let slow_only = run(
            &tree.repo,
            &index,
            QaCheckProperties::new().with(QaCheckProperty::Slow),
            QaCheckProperties::new(),
            QaMessageLevel::Debug,
            &tree.repo,
        );
        assert!(!slow_only.is_empty());
        assert!(slow_only
            .messages()
            .iter()
            .all(|m| m.check == "deprecated_functions"));
    }

    #[test]
    fn test_narrowed_target() {
        let tree = create_test_tree();
        let index = index_for(&["foo", "foo1", "foo2", "foo3", "foo4"]);

        let clean = run(
            &tree.repo,
            &index,
            QaCheckProperties::new(),
            QaCheckProperties::new(),
            QaMessageLevel::Warning,
            &tree.repo.join("foo/bar"),
        );
        assert!(clean.is_empty());
        assert!(!clean.statuses().iter().any(|s| s == "Checking tree"));

        let one = run(
            &tree.repo,
            &index,
            QaCheckProperties::new(),
            QaCheckProperties::new(),
            QaMessageLevel::Debug,
            &from_cwd(&tree.repo.join("foo1")),
        );
        assert!(one
            .messages()
            .iter()
            .all(|m| m.entry.starts_with(tree.repo.join("foo1"))));
        assert!(!one.is_empty());
    }

    #[test]
    fn test_clean_tree_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path();
        write(repo, "profiles/repo_name", "clean\n");
        write(repo, "profiles/categories", "cat\n");
        write(repo, "cat/pkg/pkg-1.ebuild", "EAPI=8\n");
        write(repo, "cat/pkg/metadata.xml", "<pkgmetadata/>\n");
        write(repo, "cat/pkg/Manifest", "\n");

        let reporter = run(
            repo,
            &index_for(&["cat"]),
            QaCheckProperties::new(),
            QaCheckProperties::new(),
            QaMessageLevel::Debug,
            repo,
        );
        assert!(reporter.is_empty(), "{:?}", reporter.messages());
    }

    #[test]
    fn test_non_utf8_ebuild_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path();
        write(repo, "profiles/repo_name", "clean\n");
        write(repo, "profiles/categories", "cat\n");
        write(repo, "cat/pkg/metadata.xml", "<pkgmetadata/>\n");
        write(repo, "cat/pkg/Manifest", "\n");
        std::fs::write(
            repo.join("cat/pkg/pkg-1.ebuild"),
            b"EAPI=8\nDESCRIPTION=\"caf\xe9\" \n",
        )
        .unwrap();

        let reporter = run(
            repo,
            &index_for(&["cat"]),
            QaCheckProperties::new(),
            QaCheckProperties::new(),
            QaMessageLevel::Debug,
            repo,
        );
        assert_eq!(reporter.statuses().last().map(String::as_str), Some("Done"));
        let texts: Vec<_> = reporter.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["line 2: trailing whitespace"]);
    }
}
