use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::{
    error::{RepositoryError, Result},
    matcher::PackageMatcher,
    names::RepositoryName,
    package_id::PackageId,
    repository::Repository,
};

/// The repositories known to one environment, keyed by name.
#[derive(Default)]
pub struct PackageDatabase {
    repositories: Vec<Arc<dyn Repository>>,
    by_name: HashMap<RepositoryName, usize>,
}

impl PackageDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a repository. Fails with `DuplicateRepositoryName` if one
    /// of the same name is already present.
    pub fn add_repository(&mut self, repository: Arc<dyn Repository>) -> Result<()> {
        let name = repository.name().clone();
        if self.by_name.contains_key(&name) {
            return Err(RepositoryError::DuplicateRepositoryName(name.to_string()));
        }
        debug!("adding repository {} ({})", name, repository.format());
        self.by_name.insert(name, self.repositories.len());
        self.repositories.push(repository);
        Ok(())
    }

    pub fn fetch_repository(&self, name: &str) -> Option<Arc<dyn Repository>> {
        self.by_name
            .get(name)
            .map(|&i| Arc::clone(&self.repositories[i]))
    }

    pub fn has_repository_named(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Repositories in the order they were added.
    pub fn repositories(&self) -> impl Iterator<Item = &Arc<dyn Repository>> {
        self.repositories.iter()
    }

    /// The first repository that is not an installed ledger.
    pub fn favourite_repository(&self) -> Option<Arc<dyn Repository>> {
        self.repositories
            .iter()
            .find(|repo| !repo.is_installed())
            .cloned()
    }

    pub fn installed_repositories(&self) -> impl Iterator<Item = &Arc<dyn Repository>> {
        self.repositories.iter().filter(|repo| repo.is_installed())
    }

    /// Ids matching `matcher`, by repository order, then version.
    pub fn query(&self, matcher: &PackageMatcher) -> Vec<Arc<PackageId>> {
        self.repositories
            .iter()
            .flat_map(|repo| {
                repo.package_ids(matcher.package_name())
                    .filter(|id| matcher.matches(id))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{FakeInstalledRepository, FakeRepository};

    fn database() -> PackageDatabase {
        let mut tree = FakeRepository::new("tree").unwrap();
        tree.add_version("cat/pkg", "1").unwrap();
        tree.add_version("cat/pkg", "2").unwrap();
        let mut installed = FakeInstalledRepository::new("installed").unwrap();
        installed.add_version("cat/pkg", "1").unwrap();

        let mut db = PackageDatabase::new();
        db.add_repository(Arc::new(installed)).unwrap();
        db.add_repository(Arc::new(tree)).unwrap();
        db
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut db = database();
        let err = db
            .add_repository(Arc::new(FakeRepository::new("tree").unwrap()))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateRepositoryName(name) if name == "tree"));
        assert_eq!(db.repositories().count(), 2);
    }

    #[test]
    fn test_lookup() {
        let db = database();
        assert!(db.has_repository_named("tree"));
        assert!(!db.has_repository_named("gentoo"));
        assert_eq!(db.fetch_repository("tree").unwrap().name(), "tree");
        assert!(db.fetch_repository("gentoo").is_none());

        let order: Vec<_> = db.repositories().map(|r| r.name().to_string()).collect();
        assert_eq!(order, vec!["installed", "tree"]);
        assert_eq!(db.favourite_repository().unwrap().name(), "tree");
        assert_eq!(db.installed_repositories().count(), 1);
    }

    #[test]
    fn test_query() {
        let db = database();
        let ids: Vec<_> = db
            .query(&PackageMatcher::parse("cat/pkg").unwrap())
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(ids, vec!["cat/pkg-1::installed", "cat/pkg-1::tree", "cat/pkg-2::tree"]);

        assert_eq!(db.query(&PackageMatcher::parse(">cat/pkg-1").unwrap()).len(), 1);
        assert!(db.query(&PackageMatcher::parse("cat/other").unwrap()).is_empty());
    }
}
