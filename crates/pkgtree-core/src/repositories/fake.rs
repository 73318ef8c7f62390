//! In-memory repositories for building fixtures.
//!
//! Both fakes are filled through `&mut self` builder methods and then
//! frozen by sharing them (`Arc<dyn Repository>`). Every builder method is
//! idempotent and rejects malformed input with
//! [`RepositoryError::InvalidArgument`].

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, PoisonError},
};

use tracing::trace;

use crate::{
    capability::{Capability, Interface, RepositoryCapabilities},
    error::{RepositoryError, Result},
    index::PackageIndex,
    interfaces::{
        DestinationInterface, MergeParams, ProvidedPackage, ProvidesInterface, SetsInterface,
        UseInterface, VirtualPackage, VirtualsInterface,
    },
    names::{CategoryNamePart, QualifiedPackageName, RepositoryName, SetName, UseFlagName},
    package_id::{ActionKind, PackageId, SupportedActions},
    repositories::{everything_set, provided_by, EVERYTHING_SET},
    repository::Repository,
    sets::PackageSet,
    use_flags::{UseDescriptions, UseFlagConfig, UseFlagState, UseResolution},
    version::VersionSpec,
};

#[derive(Debug)]
struct FakeBase {
    name: RepositoryName,
    index: PackageIndex,
    actions: SupportedActions,
    use_config: UseFlagConfig,
    use_descriptions: UseDescriptions,
}

impl FakeBase {
    fn new(name: &str, actions: SupportedActions) -> Result<Self> {
        Ok(Self {
            name: RepositoryName::new(name).map_err(RepositoryError::into_invalid_argument)?,
            index: PackageIndex::new(),
            actions,
            use_config: UseFlagConfig::new(),
            use_descriptions: UseDescriptions::default(),
        })
    }

    fn add_category(&mut self, category: &str) -> Result<bool> {
        let category =
            CategoryNamePart::new(category).map_err(RepositoryError::into_invalid_argument)?;
        Ok(self.index.insert_category(category))
    }

    fn add_package(&mut self, name: &str) -> Result<QualifiedPackageName> {
        let name =
            QualifiedPackageName::parse(name).map_err(RepositoryError::into_invalid_argument)?;
        self.index.insert_package(&name);
        Ok(name)
    }

    fn add_version(
        &mut self,
        name: &str,
        version: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<Arc<PackageId>> {
        let name =
            QualifiedPackageName::parse(name).map_err(RepositoryError::into_invalid_argument)?;
        let version = VersionSpec::parse(version).map_err(RepositoryError::into_invalid_argument)?;
        trace!("{}: adding {}-{}", self.name, name, version);
        let id = PackageId::new(name, version, self.name.clone(), self.actions)
            .with_metadata(metadata);
        Ok(self.index.insert_id(id))
    }

    fn sets(&self) -> Vec<SetName> {
        vec![SetName::builtin(EVERYTHING_SET)]
    }

    fn package_set(&self, name: &SetName) -> Option<PackageSet> {
        (name == EVERYTHING_SET).then(|| everything_set(&self.index))
    }
}

macro_rules! fake_builder {
    ($ty:ident) => {
        impl $ty {
            /// Adds a category. Returns false if it already existed.
            pub fn add_category(&mut self, category: &str) -> Result<bool> {
                self.base.add_category(category)
            }

            /// Adds a package with no versions, creating its category.
            pub fn add_package(&mut self, name: &str) -> Result<QualifiedPackageName> {
                self.base.add_package(name)
            }

            /// Adds an id, creating its category and package. Adding an
            /// existing version returns the existing id.
            pub fn add_version(&mut self, name: &str, version: &str) -> Result<Arc<PackageId>> {
                self.base.add_version(name, version, BTreeMap::new())
            }

            pub fn add_version_with_metadata(
                &mut self,
                name: &str,
                version: &str,
                metadata: BTreeMap<String, String>,
            ) -> Result<Arc<PackageId>> {
                self.base.add_version(name, version, metadata)
            }

            /// Replaces the repository's USE configuration.
            pub fn set_use_flags(&mut self, config: UseFlagConfig) {
                self.base.use_config = config;
            }

            pub fn set_use_description(&mut self, flag: &str, text: &str) {
                self.base.use_descriptions.insert_global(flag, text);
            }
        }
    };
}

/// A fake definition tree. Ids support fetching, installing and
/// pretending.
#[derive(Debug)]
pub struct FakeRepository {
    base: FakeBase,
    virtuals: Vec<VirtualPackage>,
    capabilities: RepositoryCapabilities,
}

impl FakeRepository {
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            base: FakeBase::new(name, SupportedActions::INSTALLABLE)?,
            virtuals: Vec::new(),
            capabilities: RepositoryCapabilities::from([
                Capability::Sets,
                Capability::Use,
                Capability::Virtuals,
            ]),
        })
    }

    pub fn add_virtual_package(&mut self, virtual_name: &str, target: &str) -> Result<()> {
        let virtual_package = VirtualPackage {
            virtual_name: QualifiedPackageName::parse(virtual_name)
                .map_err(RepositoryError::into_invalid_argument)?,
            target: QualifiedPackageName::parse(target)
                .map_err(RepositoryError::into_invalid_argument)?,
        };
        if !self.virtuals.contains(&virtual_package) {
            self.virtuals.push(virtual_package);
        }
        Ok(())
    }
}

fake_builder!(FakeRepository);

impl Repository for FakeRepository {
    fn name(&self) -> &RepositoryName {
        &self.base.name
    }

    fn format(&self) -> &'static str {
        "fake"
    }

    fn index(&self) -> &PackageIndex {
        &self.base.index
    }

    fn capabilities(&self) -> &RepositoryCapabilities {
        &self.capabilities
    }

    fn interface_of(&self, capability: Capability) -> Option<Interface<'_>> {
        match capability {
            Capability::Sets => Some(Interface::Sets(self)),
            Capability::Use => Some(Interface::Use(self)),
            Capability::Virtuals => Some(Interface::Virtuals(self)),
            _ => None,
        }
    }
}

impl SetsInterface for FakeRepository {
    fn set_names(&self) -> Vec<SetName> {
        self.base.sets()
    }

    fn package_set(&self, name: &SetName) -> Option<PackageSet> {
        self.base.package_set(name)
    }
}

impl UseInterface for FakeRepository {
    fn resolve_use(&self, flag: &UseFlagName, id: &PackageId) -> UseResolution {
        self.base.use_config.resolve(flag.as_str(), id)
    }

    fn describe_use_flag(&self, flag: &UseFlagName, id: &PackageId) -> String {
        self.base.use_descriptions.describe(flag.as_str(), id)
    }

    fn enabled_use_flags(&self, id: &PackageId) -> Vec<String> {
        self.base.use_config.enabled_flags(id)
    }
}

impl VirtualsInterface for FakeRepository {
    fn virtual_packages(&self) -> Vec<VirtualPackage> {
        self.virtuals.clone()
    }
}

/// A fake installed-package ledger. Merges are recorded in memory.
#[derive(Debug)]
pub struct FakeInstalledRepository {
    base: FakeBase,
    merged: Mutex<Vec<Arc<PackageId>>>,
    capabilities: RepositoryCapabilities,
}

impl FakeInstalledRepository {
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            base: FakeBase::new(name, SupportedActions::INSTALLED)?,
            merged: Mutex::new(Vec::new()),
            capabilities: RepositoryCapabilities::from([
                Capability::Sets,
                Capability::Use,
                Capability::Provides,
                Capability::Destination,
            ]),
        })
    }

    /// Ids passed to [`DestinationInterface::merge`], in order.
    pub fn merged(&self) -> Vec<Arc<PackageId>> {
        self.merged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fake_builder!(FakeInstalledRepository);

impl Repository for FakeInstalledRepository {
    fn name(&self) -> &RepositoryName {
        &self.base.name
    }

    fn format(&self) -> &'static str {
        "fake_installed"
    }

    fn index(&self) -> &PackageIndex {
        &self.base.index
    }

    fn capabilities(&self) -> &RepositoryCapabilities {
        &self.capabilities
    }

    fn interface_of(&self, capability: Capability) -> Option<Interface<'_>> {
        match capability {
            Capability::Sets => Some(Interface::Sets(self)),
            Capability::Use => Some(Interface::Use(self)),
            Capability::Provides => Some(Interface::Provides(self)),
            Capability::Destination => Some(Interface::Destination(self)),
            _ => None,
        }
    }

    fn is_installed(&self) -> bool {
        true
    }
}

impl SetsInterface for FakeInstalledRepository {
    fn set_names(&self) -> Vec<SetName> {
        self.base.sets()
    }

    fn package_set(&self, name: &SetName) -> Option<PackageSet> {
        self.base.package_set(name)
    }
}

impl UseInterface for FakeInstalledRepository {
    /// Recorded `USE`/`IUSE` metadata wins; flags it does not mention fall
    /// back to the repository configuration.
    fn resolve_use(&self, flag: &UseFlagName, id: &PackageId) -> UseResolution {
        let recorded = UseFlagConfig::from_recorded(id).resolve(flag.as_str(), id);
        if recorded.state == UseFlagState::Unspecified {
            self.base.use_config.resolve(flag.as_str(), id)
        } else {
            recorded
        }
    }

    fn describe_use_flag(&self, flag: &UseFlagName, id: &PackageId) -> String {
        self.base.use_descriptions.describe(flag.as_str(), id)
    }

    fn enabled_use_flags(&self, id: &PackageId) -> Vec<String> {
        let recorded = UseFlagConfig::from_recorded(id);
        let candidates: BTreeSet<&str> = recorded
            .mentioned_flags()
            .into_iter()
            .chain(self.base.use_config.mentioned_flags())
            .collect();
        candidates
            .into_iter()
            .filter_map(|flag| UseFlagName::new(flag).ok())
            .filter(|flag| self.resolve_use(flag, id).state == UseFlagState::Enabled)
            .map(|flag| flag.to_string())
            .collect()
    }
}

impl ProvidesInterface for FakeInstalledRepository {
    fn provided_packages(&self) -> Vec<ProvidedPackage> {
        provided_by(self.base.index.all_ids())
            .into_iter()
            .map(|(virtual_name, provided_by)| {
                ProvidedPackage {
                    virtual_name,
                    provided_by,
                }
            })
            .collect()
    }
}

impl DestinationInterface for FakeInstalledRepository {
    fn is_suitable_destination_for(&self, id: &PackageId) -> bool {
        id.supports_action(ActionKind::Install)
    }

    fn is_default_destination(&self) -> bool {
        true
    }

    fn want_pre_post_phases(&self) -> bool {
        false
    }

    fn merge(&self, params: &MergeParams) -> Result<()> {
        if !self.is_suitable_destination_for(&params.package_id) {
            return Err(RepositoryError::Merge(format!(
                "{} cannot be installed",
                params.package_id
            )));
        }
        self.merged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&params.package_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::PackageMatcher;

    fn categories(repo: &dyn Repository) -> Vec<String> {
        repo.category_names().map(ToString::to_string).collect()
    }

    #[test]
    fn test_add_category_idempotent_and_sorted() {
        let mut repo = FakeRepository::new("fake").unwrap();
        assert!(repo.add_category("cat-foo").unwrap());
        assert!(!repo.add_category("cat-foo").unwrap());
        assert_eq!(categories(&repo), vec!["cat-foo"]);

        let mut repo = FakeRepository::new("fake").unwrap();
        repo.add_category("cat-foo").unwrap();
        repo.add_category("cat-bar").unwrap();
        assert_eq!(categories(&repo), vec!["cat-bar", "cat-foo"]);
    }

    #[test]
    fn test_add_package() {
        let mut repo = FakeRepository::new("fake").unwrap();
        let name = repo.add_package("cat-foo/pkg").unwrap();
        assert_eq!(repo.add_package("cat-foo/pkg").unwrap(), name);

        assert!(repo.has_category_named("cat-foo"));
        assert!(repo.has_package_named(&name));
        assert_eq!(repo.package_ids(&name).count(), 0);
        let names: Vec<_> = repo.package_names("cat-foo").collect();
        assert_eq!(names, vec![name]);
    }

    #[test]
    fn test_add_version_sorted() {
        let mut repo = FakeRepository::new("fake").unwrap();
        repo.add_version("cat-foo/pkg", "2").unwrap();
        let first = repo.add_version("cat-foo/pkg", "1").unwrap();
        let again = repo.add_version("cat-foo/pkg", "1").unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let name = QualifiedPackageName::parse("cat-foo/pkg").unwrap();
        let versions: Vec<_> = repo
            .package_ids(&name)
            .map(|id| id.version().to_string())
            .collect();
        assert_eq!(versions, vec!["1", "2"]);
        assert_eq!(first.repository_name(), "fake");
    }

    #[test]
    fn test_malformed_input_is_invalid_argument() {
        let mut repo = FakeRepository::new("fake").unwrap();
        for result in [
            repo.add_category("-bad").map(|_| ()),
            repo.add_category("").map(|_| ()),
            repo.add_package("no-slash").map(|_| ()),
            repo.add_package("a/b/c").map(|_| ()),
            repo.add_version("cat/pkg", "1.x").map(|_| ()),
            repo.add_version("cat", "1").map(|_| ()),
        ] {
            assert!(matches!(result, Err(RepositoryError::InvalidArgument(_))));
        }
        assert_eq!(repo.category_names().count(), 0);
        assert!(matches!(
            FakeRepository::new("bad name"),
            Err(RepositoryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_action_support() {
        let mut repo = FakeRepository::new("fake").unwrap();
        assert!(!repo.some_ids_might_support_action(ActionKind::Install));
        repo.add_version("cat/pkg", "1").unwrap();
        assert!(repo.some_ids_might_support_action(ActionKind::Install));
        assert!(!repo.some_ids_might_support_action(ActionKind::Installed));

        let mut installed = FakeInstalledRepository::new("installed").unwrap();
        installed.add_version("cat/pkg", "1").unwrap();
        assert!(installed.some_ids_might_support_action(ActionKind::Installed));
        assert!(!installed.some_ids_might_support_action(ActionKind::Install));
    }

    #[test]
    fn test_use_and_sets() {
        let mut repo = FakeRepository::new("fake").unwrap();
        let id = repo.add_version("cat/pkg", "1").unwrap();
        let mut config = UseFlagConfig::new();
        config.add_use_tokens(&["ssl", "-gtk"]);
        repo.set_use_flags(config);
        repo.set_use_description("ssl", "Enable TLS support");

        let use_interface = repo.use_interface().unwrap();
        let ssl = UseFlagName::new("ssl").unwrap();
        assert_eq!(use_interface.query_use(&ssl, &id), UseFlagState::Enabled);
        assert_eq!(
            use_interface.query_use(&UseFlagName::new("gtk").unwrap(), &id),
            UseFlagState::Disabled
        );
        assert_eq!(use_interface.describe_use_flag(&ssl, &id), "Enable TLS support");
        assert_eq!(use_interface.enabled_use_flags(&id), vec!["ssl"]);

        let sets = repo.sets_interface().unwrap();
        let everything = sets.package_set(&sets.set_names()[0]).unwrap();
        assert!(everything.contains(&id));
        assert!(sets.package_set(&SetName::new("world").unwrap()).is_none());
    }

    #[test]
    fn test_virtuals() {
        let mut repo = FakeRepository::new("fake").unwrap();
        repo.add_virtual_package("virtual/bar", "foo/bar").unwrap();
        repo.add_virtual_package("virtual/bar", "foo/bar").unwrap();
        let virtuals = repo.virtuals_interface().unwrap().virtual_packages();
        assert_eq!(virtuals.len(), 1);
        assert_eq!(virtuals[0].target.to_string(), "foo/bar");
        assert!(repo.add_virtual_package("virtual", "foo/bar").is_err());
    }

    #[test]
    fn test_installed_use_provides_and_merge() {
        let mut installed = FakeInstalledRepository::new("installed").unwrap();
        let id = installed
            .add_version_with_metadata(
                "foo/bar",
                "1.0",
                BTreeMap::from([
                    ("USE".to_string(), "test1".to_string()),
                    ("IUSE".to_string(), "test1 test2".to_string()),
                    ("PROVIDE".to_string(), "virtual/bar".to_string()),
                ]),
            )
            .unwrap();

        let use_interface = installed.use_interface().unwrap();
        let flag = |f: &str| UseFlagName::new(f).unwrap();
        assert_eq!(use_interface.query_use(&flag("test1"), &id), UseFlagState::Enabled);
        assert_eq!(use_interface.query_use(&flag("test2"), &id), UseFlagState::Disabled);
        assert_eq!(
            use_interface.query_use(&flag("test3"), &id),
            UseFlagState::Unspecified
        );

        let provided = installed.provides_interface().unwrap().provided_packages();
        assert_eq!(provided.len(), 1);
        assert_eq!(provided[0].virtual_name.to_string(), "virtual/bar");

        let mut tree = FakeRepository::new("tree").unwrap();
        let candidate = tree.add_version("foo/bar", "2.0").unwrap();
        let destination = installed.destination_interface().unwrap();
        assert!(destination.is_default_destination());
        assert!(destination.is_suitable_destination_for(&candidate));
        assert!(!destination.is_suitable_destination_for(&id));
        destination
            .merge(&MergeParams {
                package_id: Arc::clone(&candidate),
                use_flags: Vec::new(),
            })
            .unwrap();
        assert!(destination
            .merge(&MergeParams {
                package_id: id,
                use_flags: Vec::new(),
            })
            .is_err());
        assert_eq!(installed.merged().len(), 1);
        assert!(PackageMatcher::parse("=foo/bar-2.0")
            .unwrap()
            .matches(&installed.merged()[0]));
    }

    #[test]
    fn test_installed_enabled_flags_agree_with_resolution() {
        let mut installed = FakeInstalledRepository::new("installed").unwrap();
        let id = installed
            .add_version_with_metadata(
                "foo/bar",
                "1.0",
                BTreeMap::from([
                    ("USE".to_string(), "test1".to_string()),
                    ("IUSE".to_string(), "test1 test2".to_string()),
                ]),
            )
            .unwrap();
        let mut config = UseFlagConfig::new();
        config.add_use_tokens(&["test2", "extra"]);
        installed.set_use_flags(config);

        let use_interface = installed.use_interface().unwrap();
        let test2 = UseFlagName::new("test2").unwrap();
        assert_eq!(use_interface.query_use(&test2, &id), UseFlagState::Disabled);
        assert_eq!(use_interface.enabled_use_flags(&id), vec!["extra", "test1"]);
    }
}
