//! Ebuild definition trees on disk.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use pkgtree_qa::{QaCheckProperties, QaMessageLevel, QaReporter};
use pkgtree_utils::{
    fs::{read_optional, sorted_entries},
    text::{config_lines, flat_entries, tokens},
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, warn};

use crate::{
    capability::{Capability, Interface, RepositoryCapabilities},
    error::{RepositoryError, Result},
    index::PackageIndex,
    interfaces::{
        EnvironmentVariableInterface, MirrorsInterface, ProfileConfigInterface, QaInterface,
        SetsInterface, SyncableInterface, Syncer, UseInterface, VirtualPackage, VirtualsInterface,
    },
    names::{
        split_name_version, CategoryNamePart, PackageNamePart, QualifiedPackageName,
        RepositoryName, SetName, UseFlagName,
    },
    package_id::{PackageId, SupportedActions},
    profile::{Profile, ProfileChain},
    qa::{checks::NON_CATEGORY_DIRS, QaEngine},
    repository::Repository,
    sets::PackageSet,
    use_flags::{UseDescriptions, UseFlagConfig, UseResolution},
};

const SYSTEM_SET: &str = "system";

/// How to open an [`EbuildRepository`].
#[derive(Debug, Clone, Default)]
pub struct EbuildRepositoryParams {
    pub location: PathBuf,
    /// Overrides `profiles/repo_name`.
    pub name: Option<String>,
    /// Active profile, relative to `profiles/` or absolute. Defaults to the
    /// first profile in `profiles.desc`.
    pub profile: Option<PathBuf>,
    pub sync_uri: Option<String>,
}

impl EbuildRepositoryParams {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }
}

/// A tree laid out as `<category>/<package>/<package>-<version>.ebuild`.
///
/// Ebuilds are not parsed; id metadata comes from the flat cache in
/// `metadata/md5-cache`.
pub struct EbuildRepository {
    name: RepositoryName,
    location: PathBuf,
    index: PackageIndex,
    profiles: ProfileChain,
    use_descriptions: UseDescriptions,
    mirrors: BTreeMap<String, Vec<String>>,
    sets: BTreeMap<SetName, PackageSet>,
    sync_uri: Option<String>,
    qa: QaEngine,
    capabilities: RepositoryCapabilities,
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn dir_names(path: &Path) -> Result<Vec<String>> {
    Ok(sorted_entries(path)?
        .into_iter()
        .filter(|entry| entry.is_dir())
        .filter_map(|entry| {
            entry
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .filter(|name| !is_hidden(name))
        .collect())
}

fn read_categories(location: &Path) -> Result<Vec<CategoryNamePart>> {
    let names = match read_optional(location.join("profiles/categories"))? {
        Some(content) => config_lines(&content).map(str::to_string).collect(),
        None => {
            dir_names(location)?
                .into_iter()
                .filter(|name| !NON_CATEGORY_DIRS.contains(&name.as_str()))
                .collect::<Vec<_>>()
        }
    };

    Ok(names
        .into_iter()
        .filter_map(|name| {
            match CategoryNamePart::new(name) {
                Ok(category) => Some(category),
                Err(err) => {
                    warn!("{}: skipping category: {}", location.display(), err);
                    None
                }
            }
        })
        .collect())
}

/// Reads the ids of one category.
fn scan_category(
    location: &Path,
    repository: &RepositoryName,
    category: &CategoryNamePart,
) -> Result<Vec<(QualifiedPackageName, Vec<PackageId>)>> {
    let mut packages = Vec::new();

    for package in dir_names(&location.join(category.as_str()))? {
        let package = match PackageNamePart::new(package) {
            Ok(package) => package,
            Err(err) => {
                warn!("{}/{}: skipping package: {}", location.display(), category, err);
                continue;
            }
        };
        let name = QualifiedPackageName::new(category.clone(), package);
        let dir = location.join(category.as_str()).join(name.package.as_str());

        let mut ids = Vec::new();
        for entry in sorted_entries(&dir)? {
            let Some(stem) = entry
                .file_name()
                .and_then(|file| file.to_str())
                .and_then(|file| file.strip_suffix(".ebuild"))
            else {
                continue;
            };
            let version = match split_name_version(stem) {
                Some((pkg, version)) if name.package == pkg => version,
                _ => {
                    warn!("{}: not a valid ebuild name", entry.display());
                    continue;
                }
            };

            let id = PackageId::new(
                name.clone(),
                version,
                repository.clone(),
                SupportedActions::INSTALLABLE,
            );
            let cache = location
                .join("metadata/md5-cache")
                .join(category.as_str())
                .join(id.pf());
            let metadata = read_optional(cache)?
                .map(|content| flat_entries(&content).into_iter().collect())
                .unwrap_or_default();
            ids.push(id.with_metadata(metadata));
        }
        packages.push((name, ids));
    }

    Ok(packages)
}

fn read_mirrors(location: &Path) -> Result<BTreeMap<String, Vec<String>>> {
    let mut mirrors = BTreeMap::new();
    if let Some(content) = read_optional(location.join("profiles/thirdpartymirrors"))? {
        for line in config_lines(&content) {
            let mut parts = tokens(line);
            if let Some(name) = parts.next() {
                mirrors
                    .entry(name.to_string())
                    .or_insert_with(Vec::new)
                    .extend(parts.map(str::to_string));
            }
        }
    }
    Ok(mirrors)
}

fn read_sets(location: &Path) -> Result<BTreeMap<SetName, PackageSet>> {
    let mut sets = BTreeMap::new();
    for path in sorted_entries(location.join("sets"))? {
        let Some(stem) = path
            .file_name()
            .and_then(|file| file.to_str())
            .and_then(|file| file.strip_suffix(".conf"))
        else {
            continue;
        };
        let name = match SetName::new(stem) {
            Ok(name) => name,
            Err(err) => {
                warn!("{}: skipping set: {}", path.display(), err);
                continue;
            }
        };
        if let Some(content) = read_optional(&path)? {
            sets.insert(name.clone(), PackageSet::parse(name, &content));
        }
    }
    Ok(sets)
}

impl EbuildRepository {
    pub fn open(params: EbuildRepositoryParams) -> Result<Self> {
        let location = params.location;
        if !location.is_dir() {
            return Err(RepositoryError::InvalidArgument(format!(
                "{} is not a directory",
                location.display()
            )));
        }

        let name = match params.name {
            Some(name) => name,
            None => {
                read_optional(location.join("profiles/repo_name"))?
                    .map(|content| content.trim().to_string())
                    .ok_or_else(|| {
                        RepositoryError::InvalidArgument(format!(
                            "{} has no profiles/repo_name and no name was given",
                            location.display()
                        ))
                    })?
            }
        };
        let name = RepositoryName::new(name)?;

        let mut index = PackageIndex::new();
        let categories = read_categories(&location)?;
        let scanned = categories
            .par_iter()
            .map(|category| scan_category(&location, &name, category))
            .collect::<Result<Vec<_>>>()?;
        for (category, packages) in categories.into_iter().zip(scanned) {
            index.insert_category(category);
            for (package, ids) in packages {
                index.insert_package(&package);
                for id in ids {
                    index.insert_id(id);
                }
            }
        }

        let mut profiles = ProfileChain::load(&location.join("profiles"))?;
        let active = match &params.profile {
            Some(path) => {
                let known = profiles.find_profile(path).cloned();
                let profile = match known {
                    Some(profile) => Some(profile),
                    None => profiles.add_custom_profile(&location.join("profiles").join(path))?,
                };
                Some(profile.ok_or_else(|| {
                    RepositoryError::InvalidArgument(format!(
                        "profile {} does not exist in {}",
                        path.display(),
                        name
                    ))
                })?)
            }
            None => profiles.profiles().first().cloned(),
        };
        match &active {
            Some(profile) => profiles.set_profile(profile)?,
            None => warn!("{}: no usable profile", name),
        }

        let use_descriptions = UseDescriptions::load(&location)?;

        let repository = Self {
            mirrors: read_mirrors(&location)?,
            sets: read_sets(&location)?,
            name,
            location,
            index,
            profiles,
            use_descriptions,
            sync_uri: params.sync_uri,
            qa: QaEngine::with_default_checks()?,
            capabilities: RepositoryCapabilities::from([
                Capability::Sets,
                Capability::Syncable,
                Capability::Use,
                Capability::EnvironmentVariable,
                Capability::Mirrors,
                Capability::Virtuals,
                Capability::ProfileConfig,
                Capability::Qa,
            ]),
        };

        debug!(
            "opened {} at {}: {} categories, {} ids, profile {:?}",
            repository.name,
            repository.location.display(),
            repository.index.category_names().count(),
            repository.index.id_count(),
            active.map(|p| p.path)
        );
        Ok(repository)
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    fn system_set(&self) -> Option<PackageSet> {
        let active = self.profiles.active()?;
        Some(PackageSet::new(
            SetName::builtin(SYSTEM_SET),
            active.system().to_vec(),
        ))
    }
}

impl Repository for EbuildRepository {
    fn name(&self) -> &RepositoryName {
        &self.name
    }

    fn format(&self) -> &'static str {
        "ebuild"
    }

    fn index(&self) -> &PackageIndex {
        &self.index
    }

    fn capabilities(&self) -> &RepositoryCapabilities {
        &self.capabilities
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.location)
    }

    fn interface_of(&self, capability: Capability) -> Option<Interface<'_>> {
        match capability {
            Capability::Sets => Some(Interface::Sets(self)),
            Capability::Syncable => Some(Interface::Syncable(self)),
            Capability::Use => Some(Interface::Use(self)),
            Capability::EnvironmentVariable => Some(Interface::EnvironmentVariable(self)),
            Capability::Mirrors => Some(Interface::Mirrors(self)),
            Capability::Virtuals => Some(Interface::Virtuals(self)),
            Capability::ProfileConfig => Some(Interface::ProfileConfig(self)),
            Capability::Qa => Some(Interface::Qa(self)),
            Capability::World | Capability::Provides | Capability::Destination => None,
        }
    }
}

impl SetsInterface for EbuildRepository {
    fn set_names(&self) -> Vec<SetName> {
        let mut names: Vec<_> = self.sets.keys().cloned().collect();
        if self.profiles.active().is_some() {
            names.push(SetName::builtin(SYSTEM_SET));
        }
        names.sort();
        names.dedup();
        names
    }

    fn package_set(&self, name: &SetName) -> Option<PackageSet> {
        if name == SYSTEM_SET {
            return self.system_set();
        }
        self.sets.get(name).cloned()
    }
}

impl SyncableInterface for EbuildRepository {
    fn sync_uri(&self) -> Option<&str> {
        self.sync_uri.as_deref()
    }

    fn sync(&self, syncer: &dyn Syncer) -> Result<bool> {
        let Some(uri) = &self.sync_uri else {
            debug!("{}: no sync_uri, nothing to sync", self.name);
            return Ok(false);
        };
        info!("Syncing {} from {}", self.name, uri);
        syncer
            .sync(uri, &self.location)
            .map_err(|err| {
                RepositoryError::Sync {
                    repository: self.name.to_string(),
                    source: Box::new(err),
                }
            })?;
        Ok(true)
    }
}

impl UseInterface for EbuildRepository {
    fn resolve_use(&self, flag: &UseFlagName, id: &PackageId) -> UseResolution {
        match self.profiles.active() {
            Some(profile) => profile.use_config().resolve(flag.as_str(), id),
            None => UseFlagConfig::new().resolve(flag.as_str(), id),
        }
    }

    fn describe_use_flag(&self, flag: &UseFlagName, id: &PackageId) -> String {
        self.use_descriptions.describe(flag.as_str(), id)
    }

    fn enabled_use_flags(&self, id: &PackageId) -> Vec<String> {
        self.profiles
            .active()
            .map(|profile| profile.use_config().enabled_flags(id))
            .unwrap_or_default()
    }
}

impl EnvironmentVariableInterface for EbuildRepository {
    fn environment_variable(&self, id: &PackageId, name: &str) -> String {
        match id.metadata_value(name) {
            Some(value) => value.to_string(),
            None => self.profiles.profile_variable(name),
        }
    }
}

impl MirrorsInterface for EbuildRepository {
    fn mirror_names(&self) -> Vec<String> {
        self.mirrors.keys().cloned().collect()
    }

    fn mirrors(&self, name: &str) -> Vec<String> {
        self.mirrors.get(name).cloned().unwrap_or_default()
    }
}

impl VirtualsInterface for EbuildRepository {
    fn virtual_packages(&self) -> Vec<VirtualPackage> {
        self.profiles
            .active()
            .map(|profile| {
                profile
                    .virtuals()
                    .iter()
                    .map(|(virtual_name, target)| {
                        VirtualPackage {
                            virtual_name: virtual_name.clone(),
                            target: target.clone(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl ProfileConfigInterface for EbuildRepository {
    fn profiles(&self) -> &[Profile] {
        self.profiles.profiles()
    }

    fn find_profile(&self, path: &Path) -> Option<Profile> {
        self.profiles.find_profile(path).cloned()
    }

    fn set_profile(&self, profile: &Profile) -> Result<()> {
        self.profiles.set_profile(profile)
    }

    fn profile(&self) -> Option<Profile> {
        self.profiles.profile()
    }

    fn profile_variable(&self, name: &str) -> String {
        self.profiles.profile_variable(name)
    }
}

impl QaInterface for EbuildRepository {
    fn check_qa(
        &self,
        reporter: &mut dyn QaReporter,
        include: &QaCheckProperties,
        exclude: &QaCheckProperties,
        minimum_level: QaMessageLevel,
        target: &Path,
    ) -> Result<()> {
        self.qa.run(
            &self.location,
            &self.index,
            reporter,
            include,
            exclude,
            minimum_level,
            target,
        )
    }
}
