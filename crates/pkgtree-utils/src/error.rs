use std::{error::Error, fmt, path::PathBuf};

/// Failure to expand a configured path.
#[derive(Debug)]
pub enum PathError {
    Empty,

    CurrentDir { source: std::io::Error },

    MissingEnvVar { var: String, input: String },

    UnclosedVariable { input: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Empty => f.write_str("path is empty"),
            PathError::CurrentDir { source } => {
                write!(f, "cannot anchor relative path at the current directory: {source}")
            }
            PathError::MissingEnvVar { var, input } => {
                write!(f, "`{input}` references unset variable `{var}`")
            }
            PathError::UnclosedVariable { input } => {
                write!(f, "missing `}}` after `{input}`")
            }
        }
    }
}

impl Error for PathError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PathError::CurrentDir { source } => Some(source),
            _ => None,
        }
    }
}

/// Failure to read or write part of a package tree on disk.
#[derive(Debug)]
pub enum FileSystemError {
    File {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    Directory {
        path: PathBuf,
        action: &'static str,
        source: std::io::Error,
    },

    NotADirectory { path: PathBuf },
}

impl FileSystemError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            FileSystemError::File { path, .. }
            | FileSystemError::Directory { path, .. }
            | FileSystemError::NotADirectory { path } => path,
        }
    }
}

impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemError::File {
                path,
                action,
                source,
            } => write!(f, "cannot {action} {}: {source}", path.display()),
            FileSystemError::Directory {
                path,
                action,
                source,
            } => write!(f, "cannot {action} directory {}: {source}", path.display()),
            FileSystemError::NotADirectory { path } => {
                write!(f, "{} exists but is not a directory", path.display())
            }
        }
    }
}

impl Error for FileSystemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FileSystemError::File { source, .. } | FileSystemError::Directory { source, .. } => {
                Some(source)
            }
            FileSystemError::NotADirectory { .. } => None,
        }
    }
}

pub type FileSystemResult<T> = std::result::Result<T, FileSystemError>;
pub type PathResult<T> = std::result::Result<T, PathError>;
