//! Builds a [`PackageDatabase`] from configuration.

use std::{path::Path, sync::Arc};

use pkgtree_config::{
    config::{Config, INSTALLED_REPOSITORY_NAME},
    repository::RepositoryFormat,
};
use tracing::debug;

use crate::{
    database::PackageDatabase,
    error::Result,
    repositories::{
        EbuildRepository, EbuildRepositoryParams, InstalledRepository, InstalledRepositoryParams,
    },
    repository::Repository,
};

pub struct Environment {
    database: PackageDatabase,
}

impl Environment {
    /// Opens every enabled repository in `config`, plus the installed
    /// ledger unless a repository named `installed` is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut database = PackageDatabase::new();
        let description_tree = config
            .enabled_repositories()
            .find(|repo| repo.format == RepositoryFormat::Ebuild)
            .map(|repo| repo.get_location())
            .transpose()?;

        for repo in config.enabled_repositories() {
            let repository: Arc<dyn Repository> = match repo.format {
                RepositoryFormat::Ebuild => {
                    Arc::new(EbuildRepository::open(EbuildRepositoryParams {
                        location: repo.get_location()?,
                        name: Some(repo.name.clone()),
                        profile: repo.get_profile_path()?,
                        sync_uri: repo.sync_uri.clone(),
                    })?)
                }
                RepositoryFormat::Installed => {
                    Arc::new(InstalledRepository::open(InstalledRepositoryParams {
                        location: repo.get_location()?,
                        name: Some(repo.name.clone()),
                        world_file: Some(config.get_world_file()?),
                        description_tree: description_tree.clone(),
                    })?)
                }
            };
            database.add_repository(repository)?;
        }

        if !config.has_explicit_installed_repository() {
            debug!("adding implicit {} repository", INSTALLED_REPOSITORY_NAME);
            database.add_repository(Arc::new(InstalledRepository::open(
                InstalledRepositoryParams {
                    location: config.get_installed_path()?,
                    name: None,
                    world_file: Some(config.get_world_file()?),
                    description_tree,
                },
            )?))?;
        }

        Ok(Self { database })
    }

    /// A single tree, optionally with an installed ledger next to it.
    pub fn for_tree(location: &Path, installed: Option<&Path>) -> Result<Self> {
        let mut database = PackageDatabase::new();
        database.add_repository(Arc::new(EbuildRepository::open(
            EbuildRepositoryParams::new(location),
        )?))?;
        if let Some(installed) = installed {
            database.add_repository(Arc::new(InstalledRepository::open(
                InstalledRepositoryParams {
                    description_tree: Some(location.to_path_buf()),
                    ..InstalledRepositoryParams::new(installed)
                },
            )?))?;
        }
        Ok(Self { database })
    }

    pub fn database(&self) -> &PackageDatabase {
        &self.database
    }

    pub fn database_mut(&mut self) -> &mut PackageDatabase {
        &mut self.database
    }

    /// The favourite repository, or the one named `name`.
    pub fn main_repository(&self, name: Option<&str>) -> Option<Arc<dyn Repository>> {
        match name {
            Some(name) => self.database.fetch_repository(name),
            None => self.database.favourite_repository(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pkgtree_config::repository::RepositoryConfig;

    use super::*;
    use crate::{error::RepositoryError, test_utils::create_test_tree};

    fn config_for(tree: &crate::test_utils::TestTree) -> Config {
        let mut repo = RepositoryConfig::ebuild("testrepo", tree.repo.to_string_lossy());
        repo.profile = Some("testprofile".into());
        Config {
            root: Some("/".into()),
            installed_path: Some(tree.installed.to_string_lossy().into_owned()),
            world_file: Some(tree.world.to_string_lossy().into_owned()),
            repositories: vec![repo],
        }
    }

    #[test]
    fn test_from_config() {
        let tree = create_test_tree();
        let env = Environment::from_config(&config_for(&tree)).unwrap();

        let names: Vec<_> = env
            .database()
            .repositories()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["testrepo", "installed"]);

        let main = env.main_repository(None).unwrap();
        assert_eq!(main.name(), "testrepo");
        assert_eq!(
            main.profile_config_interface().unwrap().profile_variable("ARCH"),
            "test"
        );

        let installed = env.main_repository(Some("installed")).unwrap();
        assert!(installed.is_installed());
        assert!(env.main_repository(Some("gentoo")).is_none());
    }

    #[test]
    fn test_explicit_installed_repository() {
        let tree = create_test_tree();
        let mut config = config_for(&tree);
        let mut ledger = RepositoryConfig::ebuild(INSTALLED_REPOSITORY_NAME, tree.installed.to_string_lossy());
        ledger.format = RepositoryFormat::Installed;
        config.repositories.insert(0, ledger);

        let env = Environment::from_config(&config).unwrap();
        assert_eq!(env.database().repositories().count(), 2);
        assert_eq!(env.database().installed_repositories().count(), 1);
        assert_eq!(env.main_repository(None).unwrap().name(), "testrepo");
    }

    #[test]
    fn test_disabled_and_duplicate() {
        let tree = create_test_tree();
        let mut config = config_for(&tree);
        let mut disabled = RepositoryConfig::ebuild("other", "/does/not/exist");
        disabled.enabled = Some(false);
        config.repositories.push(disabled);
        assert!(Environment::from_config(&config).is_ok());

        let mut env = Environment::for_tree(&tree.repo, Some(&tree.installed)).unwrap();
        let again = EbuildRepository::open(EbuildRepositoryParams::new(&tree.repo)).unwrap();
        assert!(matches!(
            env.database_mut().add_repository(Arc::new(again)),
            Err(RepositoryError::DuplicateRepositoryName(_))
        ));
    }
}
