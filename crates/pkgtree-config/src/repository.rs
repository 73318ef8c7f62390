use std::path::PathBuf;

use documented::{Documented, DocumentedFields};
use pkgtree_utils::path::resolve_path;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Defines a repository that provides packages.
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct RepositoryConfig {
    /// Unique name of the repository.
    /// For ebuild trees this should match `profiles/repo_name`.
    pub name: String,

    /// Kind of repository: "ebuild" for a package definition tree,
    /// "installed" for an installed-package ledger.
    /// Default: "ebuild"
    #[serde(default)]
    pub format: RepositoryFormat,

    /// Directory holding the repository.
    pub location: String,

    /// Active profile, relative to `<location>/profiles` or absolute.
    /// Only meaningful for ebuild trees.
    pub profile: Option<String>,

    /// Where the tree is synchronised from.
    pub sync_uri: Option<String>,

    /// Whether the repository is enabled.
    /// Default: true
    pub enabled: Option<bool>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryFormat {
    #[default]
    Ebuild,
    Installed,
}

impl RepositoryConfig {
    pub fn ebuild(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: RepositoryFormat::Ebuild,
            location: location.into(),
            profile: None,
            sync_uri: None,
            enabled: Some(true),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn get_location(&self) -> Result<PathBuf> {
        if self.location.trim().is_empty() {
            return Err(ConfigError::MissingLocation(self.name.clone()));
        }
        Ok(resolve_path(&self.location)?)
    }

    /// Resolves the configured profile against `<location>/profiles`.
    pub fn get_profile_path(&self) -> Result<Option<PathBuf>> {
        let Some(profile) = self.profile.as_deref() else {
            return Ok(None);
        };
        let profile = profile.trim();
        if profile.starts_with('/') || profile.starts_with('~') || profile.starts_with('$') {
            return Ok(Some(resolve_path(profile)?));
        }
        Ok(Some(self.get_location()?.join("profiles").join(profile)))
    }
}

/// Checks that a repository name is usable as a directory and set name.
pub fn is_valid_repository_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_name_validation() {
        assert!(is_valid_repository_name("gentoo"));
        assert!(is_valid_repository_name("my_overlay-2"));
        assert!(!is_valid_repository_name(""));
        assert!(!is_valid_repository_name("-bad"));
        assert!(!is_valid_repository_name("with space"));
        assert!(!is_valid_repository_name("a/b"));
    }

    #[test]
    fn test_profile_path_relative_and_absolute() {
        let mut repo = RepositoryConfig::ebuild("gentoo", "/var/db/repos/gentoo");
        assert!(repo.get_profile_path().unwrap().is_none());

        repo.profile = Some("default/linux/amd64".into());
        assert_eq!(
            repo.get_profile_path().unwrap(),
            Some(PathBuf::from("/var/db/repos/gentoo/profiles/default/linux/amd64"))
        );

        repo.profile = Some("/etc/portage/profile".into());
        assert_eq!(
            repo.get_profile_path().unwrap(),
            Some(PathBuf::from("/etc/portage/profile"))
        );
    }

    #[test]
    fn test_missing_location() {
        let repo = RepositoryConfig::ebuild("gentoo", "  ");
        assert!(matches!(
            repo.get_location(),
            Err(ConfigError::MissingLocation(_))
        ));
    }

    #[test]
    fn test_format_default_is_ebuild() {
        let repo: RepositoryConfig =
            toml::from_str("name = \"gentoo\"\nlocation = \"/var/db/repos/gentoo\"\n").unwrap();
        assert_eq!(repo.format, RepositoryFormat::Ebuild);
        assert!(repo.is_enabled());
    }
}
