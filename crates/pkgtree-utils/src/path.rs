//! Expansion of path values found in configuration files.
//!
//! Values may start with `~`, and may reference environment variables as
//! `$VAR` or `${VAR}`. Relative results are anchored at the current
//! directory.

use std::{
    env,
    iter::Peekable,
    path::{Component, Path, PathBuf},
    str::Chars,
};

use crate::error::{PathError, PathResult};

/// Expands `path` and makes it absolute.
///
/// # Errors
///
/// * [`PathError::Empty`] if `path` is blank
/// * [`PathError::MissingEnvVar`] if a referenced variable is unset
/// * [`PathError::UnclosedVariable`] for `${` without a closing brace
/// * [`PathError::CurrentDir`] if a relative result cannot be anchored
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    absolute(Path::new(&expand(path)?))
}

/// Anchors a relative `path` at the current directory and normalizes the
/// result.
pub fn absolute(path: &Path) -> PathResult<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    env::current_dir()
        .map(|cwd| normalize(&cwd.join(path)))
        .map_err(|source| PathError::CurrentDir { source })
}

/// Drops `.` components and folds `..` into its parent, without touching
/// the file system.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// `$HOME`, falling back to `/home/$USER` and then `/root`.
pub fn home_dir() -> PathBuf {
    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home);
    }
    match env::var("USER") {
        Ok(user) => PathBuf::from(format!("/home/{user}")),
        Err(_) => PathBuf::from("/root"),
    }
}

/// `$XDG_CONFIG_HOME`, or `~/.config`.
pub fn xdg_config_home() -> PathBuf {
    env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Joins `path` onto `root` even when `path` is absolute.
///
/// `/var/db/pkg` under root `/mnt/gentoo` becomes `/mnt/gentoo/var/db/pkg`.
pub fn rooted(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix("/") {
        Ok(relative) => root.join(relative),
        Err(_) => root.join(path),
    }
}

fn expand(input: &str) -> PathResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    if chars.peek() == Some(&'~') {
        chars.next();
        out.push_str(&home_dir().to_string_lossy());
    }

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let name = if chars.peek() == Some(&'{') {
            chars.next();
            braced_name(&mut chars)?
        } else {
            bare_name(&mut chars)
        };
        if name.is_empty() {
            out.push('$');
            continue;
        }
        out.push_str(&lookup(&name, input)?);
    }

    Ok(out)
}

fn braced_name(chars: &mut Peekable<Chars<'_>>) -> PathResult<String> {
    let mut name = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            return Ok(name);
        }
        name.push(c);
    }
    Err(PathError::UnclosedVariable {
        input: format!("${{{name}"),
    })
}

fn bare_name(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(&c) = chars.peek() {
        if !(c.is_alphanumeric() || c == '_') {
            break;
        }
        name.push(c);
        chars.next();
    }
    name
}

fn lookup(name: &str, input: &str) -> PathResult<String> {
    match name {
        "HOME" => Ok(home_dir().to_string_lossy().into_owned()),
        "XDG_CONFIG_HOME" => Ok(xdg_config_home().to_string_lossy().into_owned()),
        _ => {
            env::var(name).map_err(|_| {
                PathError::MissingEnvVar {
                    var: name.into(),
                    input: input.into(),
                }
            })
        }
    }
}
