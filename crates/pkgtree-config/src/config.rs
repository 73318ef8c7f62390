use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, PoisonError, RwLock},
};

use documented::{Documented, DocumentedFields};
use pkgtree_utils::path::{resolve_path, rooted, xdg_config_home};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};

use crate::{
    annotations::{annotate_toml_array_of_tables, annotate_toml_table},
    error::{ConfigError, Result},
    repository::{is_valid_repository_name, RepositoryConfig, RepositoryFormat},
};

/// Name under which the installed-package ledger is registered.
pub const INSTALLED_REPOSITORY_NAME: &str = "installed";

/// pkgtree configuration
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Root of the filesystem packages are installed into.
    /// Default: "/"
    pub root: Option<String>,

    /// Directory holding the installed-package ledger.
    /// Default: $ROOT/var/db/pkg
    pub installed_path: Option<String>,

    /// File listing the packages explicitly requested by the user.
    /// Default: $ROOT/var/lib/portage/world
    pub world_file: Option<String>,

    /// List of configured repositories. The first enabled ebuild
    /// repository is the favourite one.
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("PKGTREE_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("pkgtree").join("config.toml"),
    })
});

/// Current location of the configuration file.
pub fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Points subsequent loads and saves at `path`.
pub fn set_config_path(path: impl Into<PathBuf>) {
    let mut guard = CONFIG_PATH.write().unwrap_or_else(PoisonError::into_inner);
    *guard = path.into();
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn default_config() -> Self {
        let mut gentoo = RepositoryConfig::ebuild("gentoo", "/var/db/repos/gentoo");
        gentoo.sync_uri = Some("https://github.com/gentoo-mirror/gentoo.git".to_string());

        Self {
            root: Some("/".to_string()),
            installed_path: None,
            world_file: None,
            repositories: vec![gentoo],
        }
    }

    /// Loads the configuration file, falling back to the default
    /// configuration when it does not exist.
    pub fn new() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = match fs::read_to_string(path) {
            Ok(content) => {
                debug!("loading configuration from {}", path.display());
                toml::from_str(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not found, using defaults", path.display());
                Self::default_config()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;
        Ok(config)
    }

    pub fn resolve(&mut self) -> Result<()> {
        self.root.get_or_insert_with(|| "/".to_string());

        let mut seen_repos = HashSet::new();
        for repo in &mut self.repositories {
            if !is_valid_repository_name(&repo.name) {
                return Err(ConfigError::InvalidRepository(repo.name.clone()));
            }
            if repo.name == INSTALLED_REPOSITORY_NAME && repo.format != RepositoryFormat::Installed
            {
                return Err(ConfigError::ReservedRepositoryName(repo.name.clone()));
            }
            if !seen_repos.insert(repo.name.clone()) {
                return Err(ConfigError::DuplicateRepositoryName(repo.name.clone()));
            }
            if repo.location.trim().is_empty() {
                return Err(ConfigError::MissingLocation(repo.name.clone()));
            }

            repo.enabled.get_or_insert(true);
        }

        Ok(())
    }

    pub fn get_root(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("PKGTREE_ROOT") {
            return Ok(resolve_path(&env_path)?);
        }
        Ok(resolve_path(self.root.as_deref().unwrap_or("/"))?)
    }

    pub fn get_installed_path(&self) -> Result<PathBuf> {
        if let Some(installed_path) = &self.installed_path {
            return Ok(resolve_path(installed_path)?);
        }
        Ok(rooted(&self.get_root()?, Path::new("/var/db/pkg")))
    }

    pub fn get_world_file(&self) -> Result<PathBuf> {
        if let Some(world_file) = &self.world_file {
            return Ok(resolve_path(world_file)?);
        }
        Ok(rooted(&self.get_root()?, Path::new("/var/lib/portage/world")))
    }

    pub fn get_repository(&self, repo_name: &str) -> Option<&RepositoryConfig> {
        self.repositories
            .iter()
            .find(|repo| repo.name == repo_name && repo.is_enabled())
    }

    pub fn enabled_repositories(&self) -> impl Iterator<Item = &RepositoryConfig> {
        self.repositories.iter().filter(|repo| repo.is_enabled())
    }

    /// Whether any configured repository claims the ledger name itself.
    pub fn has_explicit_installed_repository(&self) -> bool {
        self.enabled_repositories()
            .any(|repo| repo.name == INSTALLED_REPOSITORY_NAME)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = config_path();
        let serialized = toml::to_string_pretty(self)?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&config_path, serialized)?;
        info!("Configuration saved to {}", config_path.display());
        Ok(())
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        if let Some(repositories_item) = doc.get_mut("repositories") {
            if let Some(repositories_array) = repositories_item.as_array_of_tables_mut() {
                annotate_toml_array_of_tables::<RepositoryConfig>(repositories_array)?;
            }
        }

        Ok(doc)
    }
}

pub fn generate_default_config() -> Result<PathBuf> {
    let config_path = config_path();

    if config_path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    let annotated_doc = Config::default_config().to_annotated_document()?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, annotated_doc.to_string())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        config_path.display()
    );
    Ok(config_path)
}
