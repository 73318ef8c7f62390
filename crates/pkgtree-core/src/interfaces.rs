//! Optional interfaces a repository may expose through
//! [`Repository::interface_of`](crate::repository::Repository::interface_of).

use std::{path::Path, sync::Arc};

use pkgtree_qa::{QaCheckProperties, QaMessageLevel, QaReporter};
use serde::Serialize;

use crate::{
    error::Result,
    names::{QualifiedPackageName, SetName, UseFlagName},
    package_id::PackageId,
    profile::Profile,
    sets::PackageSet,
    use_flags::{UseFlagState, UseResolution},
};

/// Named package sets, e.g. `system` or `world`.
pub trait SetsInterface {
    fn set_names(&self) -> Vec<SetName>;

    fn package_set(&self, name: &SetName) -> Option<PackageSet>;
}

/// Transport used to bring a repository up to date.
pub trait Syncer {
    fn sync(&self, uri: &str, location: &Path) -> Result<()>;
}

pub trait SyncableInterface {
    fn sync_uri(&self) -> Option<&str>;

    /// Syncs through `syncer`. Returns `Ok(false)` when there is nothing to
    /// sync from.
    ///
    /// The repository's index is not refreshed; open it again to see the
    /// new contents.
    fn sync(&self, syncer: &dyn Syncer) -> Result<bool>;
}

/// Per-id USE flag state.
pub trait UseInterface {
    fn resolve_use(&self, flag: &UseFlagName, id: &PackageId) -> UseResolution;

    /// Description from `use.local.desc`, falling back to `use.desc`, or
    /// empty.
    fn describe_use_flag(&self, flag: &UseFlagName, id: &PackageId) -> String;

    /// Every flag that resolves to enabled for `id`.
    fn enabled_use_flags(&self, id: &PackageId) -> Vec<String>;

    fn query_use(&self, flag: &UseFlagName, id: &PackageId) -> UseFlagState {
        self.resolve_use(flag, id).state
    }

    fn query_use_mask(&self, flag: &UseFlagName, id: &PackageId) -> bool {
        self.resolve_use(flag, id).masked
    }

    fn query_use_force(&self, flag: &UseFlagName, id: &PackageId) -> bool {
        self.resolve_use(flag, id).forced
    }
}

/// The user's explicitly requested packages.
pub trait WorldInterface {
    fn world_entries(&self) -> Result<Vec<QualifiedPackageName>>;

    /// Returns false if the entry was already present.
    fn add_to_world(&self, name: &QualifiedPackageName) -> Result<bool>;

    /// Returns false if the entry was not present.
    fn remove_from_world(&self, name: &QualifiedPackageName) -> Result<bool>;
}

pub trait EnvironmentVariableInterface {
    /// The id's own metadata value for `name`, else the active profile's,
    /// else empty.
    fn environment_variable(&self, id: &PackageId, name: &str) -> String;
}

/// `mirror://` name resolution.
pub trait MirrorsInterface {
    fn mirror_names(&self) -> Vec<String>;

    fn mirrors(&self, name: &str) -> Vec<String>;

    fn is_mirror(&self, name: &str) -> bool {
        !self.mirrors(name).is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvidedPackage {
    pub virtual_name: QualifiedPackageName,
    pub provided_by: Arc<PackageId>,
}

/// Virtuals provided by installed ids.
pub trait ProvidesInterface {
    fn provided_packages(&self) -> Vec<ProvidedPackage>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualPackage {
    pub virtual_name: QualifiedPackageName,
    pub target: QualifiedPackageName,
}

/// Default providers for virtuals.
pub trait VirtualsInterface {
    fn virtual_packages(&self) -> Vec<VirtualPackage>;
}

#[derive(Debug, Clone)]
pub struct MergeParams {
    pub package_id: Arc<PackageId>,
    pub use_flags: Vec<String>,
}

/// A repository that installed ids can be merged into.
pub trait DestinationInterface {
    fn is_suitable_destination_for(&self, id: &PackageId) -> bool;

    fn is_default_destination(&self) -> bool;

    fn want_pre_post_phases(&self) -> bool;

    /// Records `params.package_id` as installed.
    fn merge(&self, params: &MergeParams) -> Result<()>;
}

pub trait ProfileConfigInterface {
    fn profiles(&self) -> &[Profile];

    /// The profile at `path`, or `None` if no descriptor names it.
    fn find_profile(&self, path: &Path) -> Option<Profile>;

    /// Fails with `InvalidArgument` if `profile` does not belong to this
    /// repository.
    fn set_profile(&self, profile: &Profile) -> Result<()>;

    fn profile(&self) -> Option<Profile>;

    /// Nearest definition along the active profile's lineage, or empty.
    fn profile_variable(&self, name: &str) -> String;
}

pub trait QaInterface {
    /// Runs every applicable check against `target` and hands findings at
    /// or above `minimum_level` to `reporter`.
    ///
    /// A check runs only if it has every property in `include` and none in
    /// `exclude`.
    fn check_qa(
        &self,
        reporter: &mut dyn QaReporter,
        include: &QaCheckProperties,
        exclude: &QaCheckProperties,
        minimum_level: QaMessageLevel,
        target: &Path,
    ) -> Result<()>;
}
