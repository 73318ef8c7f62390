//! The repository abstraction shared by every backend.

use std::path::Path;

use crate::{
    capability::{Capability, Interface, RepositoryCapabilities},
    index::{CategoriesContaining, CategoryNames, PackageIds, PackageIndex, PackageNames},
    interfaces::{
        DestinationInterface, EnvironmentVariableInterface, MirrorsInterface,
        ProfileConfigInterface, ProvidesInterface, QaInterface, SetsInterface, SyncableInterface,
        UseInterface, VirtualsInterface, WorldInterface,
    },
    names::{QualifiedPackageName, RepositoryName},
    package_id::ActionKind,
};

/// A named, indexed collection of package ids.
///
/// Index queries never fail: unknown names give `false` or an empty
/// iterator. Optional features are looked up with
/// [`interface_of`](Repository::interface_of), which returns `None` for
/// anything outside [`capabilities`](Repository::capabilities).
pub trait Repository: Send + Sync {
    fn name(&self) -> &RepositoryName;

    /// Short backend name, e.g. `ebuild`.
    fn format(&self) -> &'static str;

    fn index(&self) -> &PackageIndex;

    fn capabilities(&self) -> &RepositoryCapabilities;

    fn interface_of(&self, capability: Capability) -> Option<Interface<'_>>;

    /// Whether this repository records installed packages.
    fn is_installed(&self) -> bool {
        false
    }

    /// Directory backing the repository, if it lives on disk.
    fn location(&self) -> Option<&Path> {
        None
    }

    fn has_category_named(&self, category: &str) -> bool {
        self.index().has_category_named(category)
    }

    fn has_package_named(&self, name: &QualifiedPackageName) -> bool {
        self.index().has_package_named(name)
    }

    fn category_names(&self) -> CategoryNames<'_> {
        self.index().category_names()
    }

    fn category_names_containing_package(&self, package: &str) -> CategoriesContaining<'_> {
        self.index().category_names_containing_package(package)
    }

    fn package_names(&self, category: &str) -> PackageNames<'_> {
        self.index().package_names(category)
    }

    fn package_ids(&self, name: &QualifiedPackageName) -> PackageIds<'_> {
        self.index().package_ids(name)
    }

    fn some_ids_might_support_action(&self, action: ActionKind) -> bool {
        self.index().some_ids_might_support_action(action)
    }

    fn sets_interface(&self) -> Option<&dyn SetsInterface> {
        match self.interface_of(Capability::Sets)? {
            Interface::Sets(interface) => Some(interface),
            _ => None,
        }
    }

    fn syncable_interface(&self) -> Option<&dyn SyncableInterface> {
        match self.interface_of(Capability::Syncable)? {
            Interface::Syncable(interface) => Some(interface),
            _ => None,
        }
    }

    fn use_interface(&self) -> Option<&dyn UseInterface> {
        match self.interface_of(Capability::Use)? {
            Interface::Use(interface) => Some(interface),
            _ => None,
        }
    }

    fn world_interface(&self) -> Option<&dyn WorldInterface> {
        match self.interface_of(Capability::World)? {
            Interface::World(interface) => Some(interface),
            _ => None,
        }
    }

    fn environment_variable_interface(&self) -> Option<&dyn EnvironmentVariableInterface> {
        match self.interface_of(Capability::EnvironmentVariable)? {
            Interface::EnvironmentVariable(interface) => Some(interface),
            _ => None,
        }
    }

    fn mirrors_interface(&self) -> Option<&dyn MirrorsInterface> {
        match self.interface_of(Capability::Mirrors)? {
            Interface::Mirrors(interface) => Some(interface),
            _ => None,
        }
    }

    fn provides_interface(&self) -> Option<&dyn ProvidesInterface> {
        match self.interface_of(Capability::Provides)? {
            Interface::Provides(interface) => Some(interface),
            _ => None,
        }
    }

    fn virtuals_interface(&self) -> Option<&dyn VirtualsInterface> {
        match self.interface_of(Capability::Virtuals)? {
            Interface::Virtuals(interface) => Some(interface),
            _ => None,
        }
    }

    fn destination_interface(&self) -> Option<&dyn DestinationInterface> {
        match self.interface_of(Capability::Destination)? {
            Interface::Destination(interface) => Some(interface),
            _ => None,
        }
    }

    fn profile_config_interface(&self) -> Option<&dyn ProfileConfigInterface> {
        match self.interface_of(Capability::ProfileConfig)? {
            Interface::ProfileConfig(interface) => Some(interface),
            _ => None,
        }
    }

    fn qa_interface(&self) -> Option<&dyn QaInterface> {
        match self.interface_of(Capability::Qa)? {
            Interface::Qa(interface) => Some(interface),
            _ => None,
        }
    }
}
