//! The closed set of optional repository features.

use std::collections::BTreeSet;

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::interfaces::{
    DestinationInterface, EnvironmentVariableInterface, MirrorsInterface, ProfileConfigInterface,
    ProvidesInterface, QaInterface, SetsInterface, SyncableInterface, UseInterface,
    VirtualsInterface, WorldInterface,
};

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
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Sets,
    Syncable,
    Use,
    World,
    EnvironmentVariable,
    Mirrors,
    Provides,
    Virtuals,
    Destination,
    ProfileConfig,
    Qa,
}

/// The capabilities a backend implements, fixed when it is constructed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryCapabilities(BTreeSet<Capability>);

impl RepositoryCapabilities {
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[Capability; N]> for RepositoryCapabilities {
    fn from(capabilities: [Capability; N]) -> Self {
        Self(capabilities.into_iter().collect())
    }
}

impl FromIterator<Capability> for RepositoryCapabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A live interface borrowed from a repository.
#[derive(Clone, Copy)]
pub enum Interface<'a> {
    Sets(&'a dyn SetsInterface),
    Syncable(&'a dyn SyncableInterface),
    Use(&'a dyn UseInterface),
    World(&'a dyn WorldInterface),
    EnvironmentVariable(&'a dyn EnvironmentVariableInterface),
    Mirrors(&'a dyn MirrorsInterface),
    Provides(&'a dyn ProvidesInterface),
    Virtuals(&'a dyn VirtualsInterface),
    Destination(&'a dyn DestinationInterface),
    ProfileConfig(&'a dyn ProfileConfigInterface),
    Qa(&'a dyn QaInterface),
}

impl Interface<'_> {
    pub fn capability(&self) -> Capability {
        match self {
            Interface::Sets(_) => Capability::Sets,
            Interface::Syncable(_) => Capability::Syncable,
            Interface::Use(_) => Capability::Use,
            Interface::World(_) => Capability::World,
            Interface::EnvironmentVariable(_) => Capability::EnvironmentVariable,
            Interface::Mirrors(_) => Capability::Mirrors,
            Interface::Provides(_) => Capability::Provides,
            Interface::Virtuals(_) => Capability::Virtuals,
            Interface::Destination(_) => Capability::Destination,
            Interface::ProfileConfig(_) => Capability::ProfileConfig,
            Interface::Qa(_) => Capability::Qa,
        }
    }
}

impl std::fmt::Debug for Interface<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interface({})", self.capability())
    }
}
