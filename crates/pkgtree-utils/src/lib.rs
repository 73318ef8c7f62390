//! Shared helpers for the pkgtree crates.
//!
//! Nothing in here knows about repositories: these are the leaf error types,
//! path expansion for configuration values, and readers for the line-based
//! and `KEY=VALUE` files that package trees are made of.

pub mod error;
pub mod fs;
pub mod path;
pub mod text;
