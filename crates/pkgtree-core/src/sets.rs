use pkgtree_utils::text::config_lines;
use tracing::warn;

use crate::{
    matcher::PackageMatcher,
    names::{QualifiedPackageName, SetName},
    package_id::PackageId,
};

/// A named list of package matchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSet {
    name: SetName,
    entries: Vec<PackageMatcher>,
}

impl PackageSet {
    pub fn new(name: SetName, entries: Vec<PackageMatcher>) -> Self {
        Self { name, entries }
    }

    /// Reads one matcher per line. A leading `*` (as in profile `packages`
    /// files) is ignored; malformed lines are skipped.
    pub fn parse(name: SetName, content: &str) -> Self {
        let entries = config_lines(content)
            .map(|line| line.trim_start_matches('*'))
            .filter_map(|line| {
                match PackageMatcher::parse(line) {
                    Ok(matcher) => Some(matcher),
                    Err(err) => {
                        warn!("set {}: skipping '{}': {}", name, line, err);
                        None
                    }
                }
            })
            .collect();
        Self { name, entries }
    }

    pub fn name(&self) -> &SetName {
        &self.name
    }

    pub fn entries(&self) -> &[PackageMatcher] {
        &self.entries
    }

    pub fn contains(&self, id: &PackageId) -> bool {
        self.entries.iter().any(|entry| entry.matches(id))
    }

    pub fn names_package(&self, name: &QualifiedPackageName) -> bool {
        self.entries.iter().any(|entry| entry.package_name() == name)
    }
}
