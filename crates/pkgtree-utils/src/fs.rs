use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::error::{FileSystemError, FileSystemResult};

pub trait FileSystemProvider {
    /// Reads a file into a string, treating a missing file as absent.
    ///
    /// Package trees are full of optional files (`use.mask`, `parent`,
    /// `metadata.xml`, ...). A file that does not exist yields `Ok(None)`;
    /// any other failure is reported. Invalid UTF-8 is replaced with
    /// U+FFFD rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns a [`FileSystemError::File`] if the file exists but cannot be read.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pkgtree_utils::error::FileSystemResult;
    /// use pkgtree_utils::fs::{FileSystemProvider, StandardFileSystemProvider};
    ///
    /// fn main() -> FileSystemResult<()> {
    ///     let fs = StandardFileSystemProvider;
    ///     if let Some(name) = fs.read_optional("/var/db/repos/gentoo/profiles/repo_name")? {
    ///         println!("{}", name.trim());
    ///     }
    ///     Ok(())
    /// }
    /// ```
    fn read_optional<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<Option<String>>;

    /// Lists the entries of a directory, sorted by file name.
    ///
    /// A missing directory yields an empty list.
    ///
    /// # Errors
    ///
    /// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
    /// * [`FileSystemError::Directory`] if the directory cannot be read.
    fn sorted_entries<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<Vec<PathBuf>>;

    /// Creates a directory structure if it doesn't exist.
    ///
    /// If the directory already exists, this function does nothing. If the directory structure
    /// exists but is not a directory, this function returns an error.
    ///
    /// # Errors
    ///
    /// * [`FileSystemError::Directory`] if the directory could not be created.
    /// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()>;

    /// Replaces the contents of a file, creating parent directories as needed.
    ///
    /// The new contents are written to a sibling temporary file which is then
    /// renamed over the target, so readers never observe a half-written file.
    fn replace_file<P: AsRef<Path>>(&self, path: P, contents: &str) -> FileSystemResult<()>;
}

#[derive(Default, Clone)]
pub struct StandardFileSystemProvider;

impl FileSystemProvider for StandardFileSystemProvider {
    fn read_optional<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<Option<String>> {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(FileSystemError::File {
                    path: path.to_path_buf(),
                    action: "read",
                    source: err,
                })
            }
        }
    }

    fn sorted_entries<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<Vec<PathBuf>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        if !path.is_dir() {
            return Err(FileSystemError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        let map_err = |err| FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "read",
            source: err,
        };

        let mut entries = fs::read_dir(path)
            .map_err(map_err)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_err)?;
        entries.sort();
        Ok(entries)
    }

    fn ensure_dir_exists<P: AsRef<Path>>(&self, path: P) -> FileSystemResult<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path).map_err(|err| FileSystemError::Directory {
                path: path.to_path_buf(),
                action: "create",
                source: err,
            })?;
        } else if !path.is_dir() {
            return Err(FileSystemError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        Ok(())
    }

    fn replace_file<P: AsRef<Path>>(&self, path: P, contents: &str) -> FileSystemResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.ensure_dir_exists(parent)?;
        }

        let mut staging = path.as_os_str().to_owned();
        staging.push(".new");
        let staging = PathBuf::from(staging);

        fs::write(&staging, contents).map_err(|err| FileSystemError::File {
            path: staging.clone(),
            action: "write",
            source: err,
        })?;
        fs::rename(&staging, path).map_err(|err| FileSystemError::File {
            path: path.to_path_buf(),
            action: "replace",
            source: err,
        })
    }
}

/// Reads a file, treating a missing file as absent.
///
/// See [`FileSystemProvider::read_optional`] for detailed documentation.
pub fn read_optional<P: AsRef<Path>>(path: P) -> FileSystemResult<Option<String>> {
    StandardFileSystemProvider.read_optional(path)
}

/// Lists directory entries sorted by name.
///
/// See [`FileSystemProvider::sorted_entries`] for detailed documentation.
pub fn sorted_entries<P: AsRef<Path>>(path: P) -> FileSystemResult<Vec<PathBuf>> {
    StandardFileSystemProvider.sorted_entries(path)
}

/// Creates a directory structure if it doesn't exist.
///
/// See [`FileSystemProvider::ensure_dir_exists`] for detailed documentation.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    StandardFileSystemProvider.ensure_dir_exists(path)
}

/// Replaces the contents of a file.
///
/// See [`FileSystemProvider::replace_file`] for detailed documentation.
pub fn replace_file<P: AsRef<Path>>(path: P, contents: &str) -> FileSystemResult<()> {
    StandardFileSystemProvider.replace_file(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_optional_missing() {
        let dir = tempdir().unwrap();
        let result = read_optional(dir.path().join("use.mask")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_read_optional_present() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("repo_name");
        fs::write(&file_path, "testrepo\n").unwrap();
        assert_eq!(read_optional(&file_path).unwrap().as_deref(), Some("testrepo\n"));
    }

    #[test]
    fn test_read_optional_invalid_utf8() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("foo-1.ebuild");
        fs::write(&file_path, b"DESCRIPTION=\"caf\xe9\"\n").unwrap();
        let content = read_optional(&file_path).unwrap().unwrap();
        assert_eq!(content, "DESCRIPTION=\"caf\u{fffd}\"\n");
    }

    #[test]
    fn test_read_optional_directory_is_error() {
        let dir = tempdir().unwrap();
        assert!(read_optional(dir.path()).is_err());
    }

    #[test]
    fn test_sorted_entries() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("foo2")).unwrap();
        fs::create_dir(dir.path().join("foo1")).unwrap();
        fs::write(dir.path().join("bar"), "").unwrap();

        let names: Vec<_> = sorted_entries(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["bar", "foo1", "foo2"]);
    }

    #[test]
    fn test_sorted_entries_missing_and_file() {
        let dir = tempdir().unwrap();
        assert!(sorted_entries(dir.path().join("nope")).unwrap().is_empty());

        let file_path = dir.path().join("file");
        fs::write(&file_path, "").unwrap();
        assert!(matches!(
            sorted_entries(&file_path),
            Err(FileSystemError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let new_dir = dir.path().join("var/db/pkg");
        ensure_dir_exists(&new_dir).unwrap();
        assert!(new_dir.is_dir());
        ensure_dir_exists(&new_dir).unwrap();
    }

    #[test]
    fn test_ensure_dir_exists_file_collision() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "hello").unwrap();
        assert!(ensure_dir_exists(&file_path).is_err());
    }

    #[test]
    fn test_replace_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("var/lib/portage/world");
        replace_file(&target, "cat/one\n").unwrap();
        replace_file(&target, "cat/two\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "cat/two\n");
        assert!(!dir.path().join("var/lib/portage/world.new").exists());
    }
}
