//! The installed-package ledger, laid out as `<category>/<name>-<version>/`
//! with one file per recorded key.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use pkgtree_config::config::INSTALLED_REPOSITORY_NAME;
use pkgtree_utils::fs::{read_optional, replace_file, sorted_entries};
use tracing::{debug, info, warn};

use crate::{
    capability::{Capability, Interface, RepositoryCapabilities},
    error::{ErrorContext, RepositoryError, Result},
    index::PackageIndex,
    interfaces::{
        DestinationInterface, MergeParams, ProvidedPackage, ProvidesInterface, SetsInterface,
        UseInterface, WorldInterface,
    },
    matcher::PackageMatcher,
    names::{
        split_name_version, CategoryNamePart, PackageNamePart, QualifiedPackageName,
        RepositoryName, SetName, UseFlagName,
    },
    package_id::{ActionKind, PackageId, SupportedActions},
    repositories::{everything_set, provided_by, EVERYTHING_SET},
    repository::Repository,
    sets::PackageSet,
    use_flags::{UseDescriptions, UseFlagConfig, UseResolution},
};

const WORLD_SET: &str = "world";

/// How to open an [`InstalledRepository`].
#[derive(Debug, Clone, Default)]
pub struct InstalledRepositoryParams {
    pub location: PathBuf,
    /// Defaults to `installed`.
    pub name: Option<String>,
    pub world_file: Option<PathBuf>,
    /// A definition tree whose `use.desc` files describe recorded flags.
    pub description_tree: Option<PathBuf>,
}

impl InstalledRepositoryParams {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }
}

pub struct InstalledRepository {
    name: RepositoryName,
    location: PathBuf,
    world_file: Option<PathBuf>,
    world_lock: Mutex<()>,
    index: PackageIndex,
    use_descriptions: UseDescriptions,
    capabilities: RepositoryCapabilities,
}

/// Ledger files holding metadata are named in upper case, e.g. `SLOT`.
fn is_metadata_file(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn read_entry(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    for path in sorted_entries(dir)? {
        let Some(key) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !is_metadata_file(key) || !path.is_file() {
            continue;
        }
        if let Some(value) = read_optional(&path)? {
            metadata.insert(key.to_string(), value.trim().to_string());
        }
    }
    Ok(metadata)
}

impl InstalledRepository {
    /// Reads the ledger at `params.location`. A missing ledger is an empty
    /// repository.
    pub fn open(params: InstalledRepositoryParams) -> Result<Self> {
        let name = RepositoryName::new(
            params
                .name
                .unwrap_or_else(|| INSTALLED_REPOSITORY_NAME.to_string()),
        )?;
        let location = params.location;

        let mut index = PackageIndex::new();
        for category_dir in sorted_entries(&location)? {
            if !category_dir.is_dir() {
                continue;
            }
            let Some(category) = category_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let category = match CategoryNamePart::new(category) {
                Ok(category) => category,
                Err(err) => {
                    warn!("{}: skipping: {}", category_dir.display(), err);
                    continue;
                }
            };

            for entry_dir in sorted_entries(&category_dir)? {
                let Some(pf) = entry_dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if pf.starts_with('.') || !entry_dir.is_dir() {
                    continue;
                }
                let Some((package, version)) = split_name_version(pf) else {
                    warn!("{}: not a name-version directory", entry_dir.display());
                    continue;
                };
                let package = match PackageNamePart::new(package) {
                    Ok(package) => package,
                    Err(err) => {
                        warn!("{}: skipping: {}", entry_dir.display(), err);
                        continue;
                    }
                };
                let id = PackageId::new(
                    QualifiedPackageName::new(category.clone(), package),
                    version,
                    name.clone(),
                    SupportedActions::INSTALLED,
                )
                .with_metadata(read_entry(&entry_dir)?);
                index.insert_id(id);
            }
        }

        let use_descriptions = match &params.description_tree {
            Some(tree) => UseDescriptions::load(tree)?,
            None => UseDescriptions::default(),
        };

        debug!(
            "opened {} at {}: {} ids",
            name,
            location.display(),
            index.id_count()
        );

        Ok(Self {
            name,
            location,
            world_file: params.world_file,
            world_lock: Mutex::new(()),
            index,
            use_descriptions,
            capabilities: RepositoryCapabilities::from([
                Capability::Sets,
                Capability::Use,
                Capability::World,
                Capability::Provides,
                Capability::Destination,
            ]),
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    fn world_file(&self) -> Result<&Path> {
        self.world_file.as_deref().ok_or_else(|| {
            RepositoryError::InvalidArgument(format!("{} has no world file", self.name))
        })
    }

    fn read_world(&self) -> Result<Vec<QualifiedPackageName>> {
        let Some(path) = &self.world_file else {
            return Ok(Vec::new());
        };
        let Some(content) = read_optional(path)? else {
            return Ok(Vec::new());
        };
        Ok(pkgtree_utils::text::config_lines(&content)
            .filter_map(|line| {
                match QualifiedPackageName::parse(line) {
                    Ok(name) => Some(name),
                    Err(err) => {
                        warn!("{}: skipping world entry: {}", path.display(), err);
                        None
                    }
                }
            })
            .collect())
    }

    fn write_world(&self, entries: &[QualifiedPackageName]) -> Result<()> {
        let mut content = String::new();
        for entry in entries {
            content.push_str(&entry.to_string());
            content.push('\n');
        }
        replace_file(self.world_file()?, &content)?;
        Ok(())
    }
}

impl Repository for InstalledRepository {
    fn name(&self) -> &RepositoryName {
        &self.name
    }

    fn format(&self) -> &'static str {
        "installed"
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
            Capability::Use => Some(Interface::Use(self)),
            Capability::World => Some(Interface::World(self)),
            Capability::Provides => Some(Interface::Provides(self)),
            Capability::Destination => Some(Interface::Destination(self)),
            Capability::Syncable
            | Capability::EnvironmentVariable
            | Capability::Mirrors
            | Capability::Virtuals
            | Capability::ProfileConfig
            | Capability::Qa => None,
        }
    }

    fn is_installed(&self) -> bool {
        true
    }
}

impl SetsInterface for InstalledRepository {
    fn set_names(&self) -> Vec<SetName> {
        vec![SetName::builtin(EVERYTHING_SET), SetName::builtin(WORLD_SET)]
    }

    fn package_set(&self, name: &SetName) -> Option<PackageSet> {
        if name == EVERYTHING_SET {
            return Some(everything_set(&self.index));
        }
        if name == WORLD_SET {
            let entries = match self.read_world() {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("{}: cannot read world: {}", self.name, err);
                    Vec::new()
                }
            };
            return Some(PackageSet::new(
                SetName::builtin(WORLD_SET),
                entries.into_iter().map(PackageMatcher::for_name).collect(),
            ));
        }
        None
    }
}

impl UseInterface for InstalledRepository {
    fn resolve_use(&self, flag: &UseFlagName, id: &PackageId) -> UseResolution {
        UseFlagConfig::from_recorded(id).resolve(flag.as_str(), id)
    }

    fn describe_use_flag(&self, flag: &UseFlagName, id: &PackageId) -> String {
        self.use_descriptions.describe(flag.as_str(), id)
    }

    fn enabled_use_flags(&self, id: &PackageId) -> Vec<String> {
        UseFlagConfig::from_recorded(id).enabled_flags(id)
    }
}

impl WorldInterface for InstalledRepository {
    fn world_entries(&self) -> Result<Vec<QualifiedPackageName>> {
        self.read_world()
    }

    fn add_to_world(&self, name: &QualifiedPackageName) -> Result<bool> {
        let _guard = self.world_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_world()?;
        if entries.contains(name) {
            return Ok(false);
        }
        entries.push(name.clone());
        self.write_world(&entries)?;
        debug!("added {} to world", name);
        Ok(true)
    }

    fn remove_from_world(&self, name: &QualifiedPackageName) -> Result<bool> {
        let _guard = self.world_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_world()?;
        let before = entries.len();
        entries.retain(|entry| entry != name);
        if entries.len() == before {
            return Ok(false);
        }
        self.write_world(&entries)?;
        debug!("removed {} from world", name);
        Ok(true)
    }
}

impl ProvidesInterface for InstalledRepository {
    fn provided_packages(&self) -> Vec<ProvidedPackage> {
        provided_by(self.index.all_ids())
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

impl DestinationInterface for InstalledRepository {
    fn is_suitable_destination_for(&self, id: &PackageId) -> bool {
        id.supports_action(ActionKind::Install)
    }

    fn is_default_destination(&self) -> bool {
        true
    }

    fn want_pre_post_phases(&self) -> bool {
        true
    }

    /// Writes a ledger entry for the id. The in-memory index is not
    /// updated; open the ledger again to see the new entry.
    fn merge(&self, params: &MergeParams) -> Result<()> {
        let id = &params.package_id;
        if !self.is_suitable_destination_for(id) {
            return Err(RepositoryError::Merge(format!(
                "{} cannot be installed into {}",
                id, self.name
            )));
        }

        let dir = self
            .location
            .join(id.name().category.as_str())
            .join(id.pf());
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let mut files = vec![
            ("REPOSITORY", id.repository_name().to_string()),
            ("USE", params.use_flags.join(" ")),
        ];
        for key in ["SLOT", "IUSE", "DESCRIPTION", "PROVIDE"] {
            if let Some(value) = id.metadata_value(key) {
                files.push((key, value.to_string()));
            }
        }
        for (key, value) in files {
            replace_file(dir.join(key), &format!("{}\n", value))?;
        }

        info!("Merged {} into {}", id, self.name);
        Ok(())
    }
}
