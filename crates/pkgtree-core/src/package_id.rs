//! Package ids: one version of one package in one repository.
//!
//! An id is immutable once built and is shared as `Arc<PackageId>` by the
//! index that owns it. It displays as `cat/pkg-1.0::repo`.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

use crate::{
    names::{QualifiedPackageName, RepositoryName},
    version::VersionSpec,
};

/// Things that can be done with a package id.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Fetch,
    Install,
    Uninstall,
    Installed,
    Pretend,
    Config,
}

/// The set of actions one id supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupportedActions(u8);

impl SupportedActions {
    /// Actions for ids that can be built from a definition tree.
    pub const INSTALLABLE: SupportedActions = SupportedActions::empty()
        .with(ActionKind::Fetch)
        .with(ActionKind::Install)
        .with(ActionKind::Pretend);

    /// Actions for ids recorded as installed.
    pub const INSTALLED: SupportedActions = SupportedActions::empty()
        .with(ActionKind::Installed)
        .with(ActionKind::Uninstall)
        .with(ActionKind::Config);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, action: ActionKind) -> Self {
        Self(self.0 | Self::bit(action))
    }

    pub const fn contains(self, action: ActionKind) -> bool {
        self.0 & Self::bit(action) != 0
    }

    pub fn iter(self) -> impl Iterator<Item = ActionKind> {
        <ActionKind as strum::IntoEnumIterator>::iter().filter(move |a| self.contains(*a))
    }

    const fn bit(action: ActionKind) -> u8 {
        1 << action as u8
    }
}

impl FromIterator<ActionKind> for SupportedActions {
    fn from_iter<I: IntoIterator<Item = ActionKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// One version of one package, owned by exactly one repository.
///
/// The owning repository is referenced by name; ids are shared through
/// `Arc` and never mutated after they are indexed.
#[derive(Debug, Clone, Serialize)]
pub struct PackageId {
    name: QualifiedPackageName,
    version: VersionSpec,
    repository: RepositoryName,
    #[serde(skip)]
    actions: SupportedActions,
    metadata: BTreeMap<String, String>,
}

impl PackageId {
    pub fn new(
        name: QualifiedPackageName,
        version: VersionSpec,
        repository: RepositoryName,
        actions: SupportedActions,
    ) -> Self {
        Self {
            name,
            version,
            repository,
            actions,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn name(&self) -> &QualifiedPackageName {
        &self.name
    }

    pub fn version(&self) -> &VersionSpec {
        &self.version
    }

    pub fn repository_name(&self) -> &RepositoryName {
        &self.repository
    }

    pub fn supports_action(&self, action: ActionKind) -> bool {
        self.actions.contains(action)
    }

    pub fn supported_actions(&self) -> SupportedActions {
        self.actions
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Whitespace-separated tokens of a metadata value, e.g. `IUSE`.
    pub fn metadata_tokens<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.metadata
            .get(key)
            .map(String::as_str)
            .unwrap_or_default()
            .split_whitespace()
    }

    /// `name-version`, as used for file and directory names.
    pub fn pf(&self) -> String {
        format!("{}-{}", self.name.package, self.version)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}-{}::{}",
            self.name.category, self.name.package, self.version, self.repository
        )
    }
}
