//! Repository model for a Gentoo-style package manager.
//!
//! A [`repository::Repository`] is a named collection of package
//! definitions, indexed by category, package name and version. Backends
//! expose optional features through the capability registry in
//! [`capability`]; callers look them up by [`capability::Capability`] and
//! get `None` when a backend does not provide one.

pub mod capability;
pub mod database;
pub mod environment;
pub mod error;
pub mod index;
pub mod interfaces;
pub mod matcher;
pub mod names;
pub mod package_id;
pub mod profile;
pub mod qa;
pub mod repositories;
pub mod repository;
pub mod sets;
pub mod use_flags;
pub mod version;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{RepositoryError, Result};
