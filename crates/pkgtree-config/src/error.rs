use miette::Diagnostic;
use pkgtree_utils::error::{FileSystemError, PathError};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(pkgtree_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(pkgtree_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(pkgtree_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists,

    #[error("Invalid repository name: {0}")]
    #[diagnostic(
        code(pkgtree_config::invalid_repository),
        help("Repository names may contain letters, digits, `_` and `-`, and must not start with `-`")
    )]
    InvalidRepository(String),

    #[error("Reserved repository name '{0}' cannot be used")]
    #[diagnostic(
        code(pkgtree_config::reserved_repo_name),
        help("The installed-package ledger is registered under this name; choose a different one")
    )]
    ReservedRepositoryName(String),

    #[error("Duplicate repository name: {0}")]
    #[diagnostic(
        code(pkgtree_config::duplicate_repo),
        help("Each repository must have a unique name")
    )]
    DuplicateRepositoryName(String),

    #[error("Repository '{0}' has no location")]
    #[diagnostic(
        code(pkgtree_config::missing_location),
        help("Set `location` to the directory holding the repository")
    )]
    MissingLocation(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(pkgtree_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(pkgtree_config::path))]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(code(pkgtree_config::fs))]
    FileSystem(#[from] FileSystemError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(pkgtree_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(pkgtree_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),

    #[error("Failed to annotate first table in array: {0}")]
    #[diagnostic(code(pkgtree_config::annotate_first_table))]
    AnnotateFirstTable(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
