//! Profile discovery and inheritance.
//!
//! Profiles live under `<repo>/profiles`; `profiles.desc` lists the known
//! ones as `arch path status` lines. Each profile directory may name parent
//! directories in its `parent` file, forming a graph that can share
//! ancestors and, in broken trees, contain cycles. Nodes are held in an
//! arena and addressed by [`ProfileId`]; every walk carries a visited set.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use once_cell::sync::OnceCell;
use pkgtree_utils::{
    fs::read_optional,
    path::normalize,
    text::{config_lines, key_values, tokens},
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    error::{RepositoryError, Result},
    matcher::PackageMatcher,
    names::QualifiedPackageName,
    use_flags::UseFlagConfig,
};

/// Variables whose values accumulate down the chain instead of being
/// replaced.
const INCREMENTAL_VARIABLES: [&str; 1] = ["USE"];

/// A profile as described by `profiles.desc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    /// Absolute location of the profile directory.
    pub path: PathBuf,
    pub arch: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileId(usize);

#[derive(Debug, Default)]
struct ProfileNode {
    location: PathBuf,
    parent_locations: Vec<PathBuf>,
    parents: Vec<ProfileId>,
    make_defaults: Vec<(String, String)>,
    use_mask: Vec<String>,
    use_force: Vec<String>,
    package_use: Vec<(PackageMatcher, Vec<String>)>,
    package_use_mask: Vec<(PackageMatcher, Vec<String>)>,
    package_use_force: Vec<(PackageMatcher, Vec<String>)>,
    packages: Vec<String>,
    virtuals: Vec<(QualifiedPackageName, QualifiedPackageName)>,
}

/// Everything a profile contributes once its ancestors are folded in.
#[derive(Debug, Default)]
pub struct ResolvedProfile {
    variables: BTreeMap<String, String>,
    use_config: UseFlagConfig,
    system: Vec<PackageMatcher>,
    virtuals: BTreeMap<QualifiedPackageName, QualifiedPackageName>,
}

impl ResolvedProfile {
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn use_config(&self) -> &UseFlagConfig {
        &self.use_config
    }

    /// Entries of the `system` set (`*atom` lines in `packages`).
    pub fn system(&self) -> &[PackageMatcher] {
        &self.system
    }

    /// Virtual name to default provider.
    pub fn virtuals(&self) -> &BTreeMap<QualifiedPackageName, QualifiedPackageName> {
        &self.virtuals
    }
}

/// The profiles of one repository.
#[derive(Debug)]
pub struct ProfileChain {
    profiles_dir: PathBuf,
    nodes: Vec<ProfileNode>,
    resolved: Vec<OnceCell<ResolvedProfile>>,
    by_location: HashMap<PathBuf, ProfileId>,
    profiles: Vec<Profile>,
    profile_nodes: Vec<ProfileId>,
    active: RwLock<Option<ProfileId>>,
}

/// Expands `$VAR` and `${VAR}` against `vars`. Unknown variables expand to
/// nothing.
fn expand(value: &str, vars: &BTreeMap<String, String>) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    result.push(escaped);
                }
            }
            '$' => {
                let mut name = String::new();
                if chars.peek() == Some(&'{') {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                        name.push(c);
                    }
                } else {
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                if name.is_empty() {
                    result.push('$');
                } else if let Some(value) = vars.get(&name) {
                    result.push_str(value);
                }
            }
            _ => result.push(c),
        }
    }

    result
}

fn read_lines(location: &Path, file: &str) -> Result<Vec<String>> {
    Ok(read_optional(location.join(file))?
        .map(|content| config_lines(&content).map(str::to_string).collect())
        .unwrap_or_default())
}

fn read_tokens(location: &Path, file: &str) -> Result<Vec<String>> {
    Ok(read_lines(location, file)?
        .iter()
        .flat_map(|line| tokens(line).map(str::to_string).collect::<Vec<_>>())
        .collect())
}

fn read_package_flags(location: &Path, file: &str) -> Result<Vec<(PackageMatcher, Vec<String>)>> {
    let mut entries = Vec::new();
    for line in read_lines(location, file)? {
        let mut parts = tokens(&line);
        let Some(atom) = parts.next() else {
            continue;
        };
        match PackageMatcher::parse(atom) {
            Ok(matcher) => entries.push((matcher, parts.map(str::to_string).collect())),
            Err(err) => {
                warn!(
                    "{}: skipping entry '{}': {}",
                    location.join(file).display(),
                    line,
                    err
                )
            }
        }
    }
    Ok(entries)
}

impl ProfileNode {
    fn read(location: &Path) -> Result<Self> {
        let parent_locations = read_lines(location, "parent")?
            .iter()
            .map(|parent| normalize(&location.join(parent)))
            .collect();

        let make_defaults = read_optional(location.join("make.defaults"))?
            .map(|content| key_values(&content))
            .unwrap_or_default();

        let mut virtuals = Vec::new();
        for line in read_lines(location, "virtuals")? {
            let parts: Vec<_> = tokens(&line).collect();
            let [virtual_name, provider] = parts[..] else {
                warn!("{}: malformed virtuals line '{}'", location.display(), line);
                continue;
            };
            match (
                QualifiedPackageName::parse(virtual_name),
                QualifiedPackageName::parse(provider),
            ) {
                (Ok(virtual_name), Ok(provider)) => virtuals.push((virtual_name, provider)),
                _ => warn!("{}: malformed virtuals line '{}'", location.display(), line),
            }
        }

        Ok(Self {
            location: location.to_path_buf(),
            parent_locations,
            parents: Vec::new(),
            make_defaults,
            use_mask: read_tokens(location, "use.mask")?,
            use_force: read_tokens(location, "use.force")?,
            package_use: read_package_flags(location, "package.use")?,
            package_use_mask: read_package_flags(location, "package.use.mask")?,
            package_use_force: read_package_flags(location, "package.use.force")?,
            packages: read_lines(location, "packages")?,
            virtuals,
        })
    }
}

fn as_strs(tokens: &[String]) -> Vec<&str> {
    tokens.iter().map(String::as_str).collect()
}

impl ProfileChain {
    /// Reads `profiles.desc` under `profiles_dir` and every profile it
    /// names, along with their ancestors.
    ///
    /// Entries pointing at missing directories are skipped with a warning.
    pub fn load(profiles_dir: &Path) -> Result<Self> {
        let profiles_dir = normalize(profiles_dir);
        let mut chain = Self {
            profiles_dir: profiles_dir.clone(),
            nodes: Vec::new(),
            resolved: Vec::new(),
            by_location: HashMap::new(),
            profiles: Vec::new(),
            profile_nodes: Vec::new(),
            active: RwLock::new(None),
        };

        for line in read_lines(&profiles_dir, "profiles.desc")? {
            let parts: Vec<_> = tokens(&line).collect();
            let [arch, path, status] = parts[..] else {
                warn!("profiles.desc: malformed line '{}'", line);
                continue;
            };
            let location = normalize(&profiles_dir.join(path));
            if !location.is_dir() {
                warn!("profiles.desc: profile '{}' does not exist", path);
                continue;
            }
            chain.add_profile(Profile {
                path: location,
                arch: arch.to_string(),
                status: status.to_string(),
            })?;
        }

        debug!(
            "loaded {} profiles ({} nodes) from {}",
            chain.profiles.len(),
            chain.nodes.len(),
            profiles_dir.display()
        );
        Ok(chain)
    }

    /// Registers a profile directory that `profiles.desc` does not list,
    /// such as a user-supplied one. Its arch is taken from its `ARCH`
    /// variable.
    pub fn add_custom_profile(&mut self, location: &Path) -> Result<Option<Profile>> {
        let location = normalize(location);
        if let Some(existing) = self.profiles.iter().find(|p| p.path == location) {
            return Ok(Some(existing.clone()));
        }
        if !location.is_dir() {
            return Ok(None);
        }

        let id = self.load_graph(&location)?;
        let arch = self
            .resolved(id)
            .variable("ARCH")
            .unwrap_or_default()
            .to_string();
        let profile = Profile {
            path: location,
            arch,
            status: "custom".to_string(),
        };
        self.profiles.push(profile.clone());
        self.profile_nodes.push(id);
        Ok(Some(profile))
    }

    fn add_profile(&mut self, profile: Profile) -> Result<()> {
        let id = self.load_graph(&profile.path)?;
        self.profiles.push(profile);
        self.profile_nodes.push(id);
        Ok(())
    }

    /// Loads `root` and everything reachable through `parent` files.
    fn load_graph(&mut self, root: &Path) -> Result<ProfileId> {
        let first_new = self.nodes.len();
        let mut pending = vec![root.to_path_buf()];

        while let Some(location) = pending.pop() {
            if self.by_location.contains_key(&location) {
                continue;
            }
            if !location.is_dir() {
                warn!("parent profile {} does not exist", location.display());
                continue;
            }
            let node = ProfileNode::read(&location)?;
            pending.extend(node.parent_locations.iter().cloned());
            self.by_location
                .insert(location, ProfileId(self.nodes.len()));
            self.nodes.push(node);
            self.resolved.push(OnceCell::new());
        }

        for node in &mut self.nodes[first_new..] {
            node.parents = node
                .parent_locations
                .iter()
                .filter_map(|parent| self.by_location.get(parent).copied())
                .collect();
        }

        self.by_location
            .get(root)
            .copied()
            .ok_or_else(|| RepositoryError::InvalidArgument(format!("{} is not a profile", root.display())))
    }

    /// Ancestors of `id` followed by `id` itself, each once, parents in
    /// the order their `parent` file lists them.
    pub fn lineage(&self, id: ProfileId) -> Vec<ProfileId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut finished = HashSet::new();
        let mut stack = vec![(id, false)];

        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                finished.insert(current);
                order.push(current);
                continue;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.push((current, true));
            for parent in self.nodes[current.0].parents.iter().rev() {
                if !visited.contains(parent) {
                    stack.push((*parent, false));
                } else if !finished.contains(parent) {
                    warn!(
                        "profile {} inherits from itself through {}",
                        self.nodes[parent.0].location.display(),
                        self.nodes[current.0].location.display()
                    );
                }
            }
        }

        order
    }

    fn resolve_node(&self, id: ProfileId) -> ResolvedProfile {
        let mut resolved = ResolvedProfile::default();
        let mut use_tokens: Vec<String> = Vec::new();
        let mut system = BTreeSet::new();

        for ancestor in self.lineage(id) {
            let node = &self.nodes[ancestor.0];

            for (key, raw) in &node.make_defaults {
                let value = expand(raw, &resolved.variables);
                if INCREMENTAL_VARIABLES.contains(&key.as_str()) {
                    let layer: Vec<_> = tokens(&value).map(str::to_string).collect();
                    resolved.use_config.add_use_tokens(&as_strs(&layer));
                    if layer.iter().any(|t| t == "-*") {
                        use_tokens.clear();
                    }
                    for token in layer.into_iter().filter(|t| t != "-*") {
                        let flag = token.trim_start_matches('-').to_string();
                        use_tokens.retain(|t| t.trim_start_matches('-') != flag);
                        use_tokens.push(token);
                    }
                    resolved.variables.insert(key.clone(), use_tokens.join(" "));
                } else {
                    resolved.variables.insert(key.clone(), value);
                }
            }

            for (matcher, flags) in &node.package_use {
                resolved.use_config.add_package_use(matcher, &as_strs(flags));
            }
            resolved.use_config.add_force_tokens(&as_strs(&node.use_force));
            resolved.use_config.add_mask_tokens(&as_strs(&node.use_mask));
            for (matcher, flags) in &node.package_use_force {
                resolved.use_config.add_package_force(matcher, &as_strs(flags));
            }
            for (matcher, flags) in &node.package_use_mask {
                resolved.use_config.add_package_mask(matcher, &as_strs(flags));
            }

            for line in &node.packages {
                if let Some(atom) = line.strip_prefix("-*") {
                    system.retain(|entry: &String| entry != atom);
                } else if let Some(atom) = line.strip_prefix('*') {
                    system.insert(atom.to_string());
                }
            }

            for (virtual_name, provider) in &node.virtuals {
                resolved
                    .virtuals
                    .insert(virtual_name.clone(), provider.clone());
            }
        }

        resolved.system = system
            .iter()
            .filter_map(|atom| match PackageMatcher::parse(atom) {
                Ok(matcher) => Some(matcher),
                Err(err) => {
                    warn!("packages: skipping '{}': {}", atom, err);
                    None
                }
            })
            .collect();

        resolved
    }

    /// The folded view of a profile, computed on first use.
    pub fn resolved(&self, id: ProfileId) -> &ResolvedProfile {
        self.resolved[id.0].get_or_init(|| self.resolve_node(id))
    }

    pub fn profiles_dir(&self) -> &Path {
        &self.profiles_dir
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Looks a profile up by location, absolute or relative to the
    /// `profiles` directory.
    pub fn find_profile(&self, path: &Path) -> Option<&Profile> {
        let location = normalize(&self.profiles_dir.join(path));
        self.profiles.iter().find(|p| p.path == location)
    }

    fn node_of(&self, profile: &Profile) -> Option<ProfileId> {
        self.profiles
            .iter()
            .position(|p| p == profile)
            .map(|i| self.profile_nodes[i])
    }

    pub fn set_profile(&self, profile: &Profile) -> Result<()> {
        let id = self.node_of(profile).ok_or_else(|| {
            RepositoryError::InvalidArgument(format!(
                "{} is not a known profile",
                profile.path.display()
            ))
        })?;
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(id);
        debug!("active profile is now {}", profile.path.display());
        Ok(())
    }

    pub fn profile(&self) -> Option<Profile> {
        let active = (*self.active.read().unwrap_or_else(PoisonError::into_inner))?;
        self.profile_nodes
            .iter()
            .position(|id| *id == active)
            .map(|i| self.profiles[i].clone())
    }

    /// The folded view of the active profile.
    pub fn active(&self) -> Option<&ResolvedProfile> {
        let active = (*self.active.read().unwrap_or_else(PoisonError::into_inner))?;
        Some(self.resolved(active))
    }

    /// Nearest definition of `name` along the active profile's lineage, or
    /// empty.
    pub fn profile_variable(&self, name: &str) -> String {
        self.active()
            .and_then(|resolved| resolved.variable(name))
            .unwrap_or_default()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::{
        names::RepositoryName, package_id::PackageId, package_id::SupportedActions,
        use_flags::UseFlagState, version::VersionSpec,
    };

    fn write(root: &Path, file: &str, content: &str) {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_expand() {
        let vars = BTreeMap::from([("ARCH".to_string(), "amd64".to_string())]);
        assert_eq!(expand("${ARCH}-linux", &vars), "amd64-linux");
        assert_eq!(expand("$ARCH $MISSING.", &vars), "amd64 .");
        assert_eq!(expand("cost \\$5 $", &vars), "cost $5 $");
    }

    #[test]
    fn test_child_shadows_parent() {
        let dir = tempdir().unwrap();
        let profiles = dir.path().join("profiles");
        write(&profiles, "profiles.desc", "amd64 child stable\n");
        write(
            &profiles,
            "base/make.defaults",
            "ARCH=\"base\"\nCHOST=\"x86_64-pc-linux-gnu\"\nUSE=\"a\n    b\"\n",
        );
        write(&profiles, "child/parent", "../base\n");
        write(&profiles, "child/make.defaults", "ARCH=\"amd64\"\nDESC=\"${ARCH} on ${CHOST}\"\nUSE=\"-a c\"\n");

        let chain = ProfileChain::load(&profiles).unwrap();
        assert_eq!(chain.profiles().len(), 1);
        assert_eq!(chain.profile_variable("ARCH"), "");

        let profile = chain.profiles()[0].clone();
        chain.set_profile(&profile).unwrap();
        assert_eq!(chain.profile(), Some(profile));
        assert_eq!(chain.profile_variable("ARCH"), "amd64");
        assert_eq!(chain.profile_variable("CHOST"), "x86_64-pc-linux-gnu");
        assert_eq!(chain.profile_variable("DESC"), "amd64 on x86_64-pc-linux-gnu");
        assert_eq!(chain.profile_variable("USE"), "b -a c");
        assert_eq!(chain.profile_variable("UNDEFINED"), "");
    }

    #[test]
    fn test_diamond_visits_shared_parent_once() {
        let dir = tempdir().unwrap();
        let profiles = dir.path().join("profiles");
        write(&profiles, "profiles.desc", "x86 leaf stable\n");
        write(&profiles, "base/make.defaults", "USE=\"shared\"\n");
        write(&profiles, "left/parent", "../base\n");
        write(&profiles, "right/parent", "../base\n");
        write(&profiles, "right/make.defaults", "USE=\"-shared\"\n");
        write(&profiles, "leaf/parent", "../left\n../right\n");

        let chain = ProfileChain::load(&profiles).unwrap();
        let leaf = chain.by_location[&normalize(&profiles.join("leaf"))];
        let names: Vec<_> = chain
            .lineage(leaf)
            .iter()
            .map(|id| {
                chain.nodes[id.0]
                    .location
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(names, vec!["base", "left", "right", "leaf"]);

        let pid = PackageId::new(
            QualifiedPackageName::parse("foo/bar").unwrap(),
            VersionSpec::parse("1").unwrap(),
            RepositoryName::new("r").unwrap(),
            SupportedActions::INSTALLABLE,
        );
        assert_eq!(
            chain.resolved(leaf).use_config().resolve("shared", &pid).state,
            UseFlagState::Disabled
        );
    }

    #[test]
    fn test_child_use_mask_shadows_parent_package_unmask() {
        let dir = tempdir().unwrap();
        let profiles = dir.path().join("profiles");
        write(&profiles, "profiles.desc", "x86 child stable\n");
        write(&profiles, "base/use.mask", "flag\n");
        write(&profiles, "base/package.use.mask", "foo/bar -flag\n");
        write(&profiles, "child/parent", "../base\n");
        write(&profiles, "child/use.mask", "flag\n");
        write(&profiles, "base/package.use.force", "foo/bar forced\n");
        write(&profiles, "child/use.force", "-forced\n");

        let chain = ProfileChain::load(&profiles).unwrap();
        let pid = |name: &str| {
            PackageId::new(
                QualifiedPackageName::parse(name).unwrap(),
                VersionSpec::parse("1.0").unwrap(),
                RepositoryName::new("r").unwrap(),
                SupportedActions::INSTALLABLE,
            )
        };

        let base = chain.resolved(chain.by_location[&normalize(&profiles.join("base"))]);
        assert!(!base.use_config().resolve("flag", &pid("foo/bar")).masked);
        assert!(base.use_config().resolve("forced", &pid("foo/bar")).forced);

        let child = chain.resolved(chain.by_location[&normalize(&profiles.join("child"))]);
        let resolution = child.use_config().resolve("flag", &pid("foo/bar"));
        assert!(resolution.masked);
        assert_eq!(resolution.state, UseFlagState::Disabled);
        assert!(!child.use_config().resolve("forced", &pid("foo/bar")).forced);
    }

    #[test]
    fn test_cycle_terminates() {
        let dir = tempdir().unwrap();
        let profiles = dir.path().join("profiles");
        write(&profiles, "profiles.desc", "x86 a stable\n");
        write(&profiles, "a/parent", "../b\n");
        write(&profiles, "a/make.defaults", "ARCH=\"a\"\n");
        write(&profiles, "b/parent", "../a\n");
        write(&profiles, "b/make.defaults", "ARCH=\"b\"\nONLY_B=\"yes\"\n");

        let chain = ProfileChain::load(&profiles).unwrap();
        let profile = chain.profiles()[0].clone();
        chain.set_profile(&profile).unwrap();
        assert_eq!(chain.profile_variable("ARCH"), "a");
        assert_eq!(chain.profile_variable("ONLY_B"), "yes");
    }

    #[test]
    fn test_find_profile() {
        let dir = tempdir().unwrap();
        let profiles = dir.path().join("profiles");
        write(
            &profiles,
            "profiles.desc",
            "x86 testprofile stable\namd64 missing dev\nbroken line\n",
        );
        write(&profiles, "testprofile/make.defaults", "ARCH=\"test\"\n");

        let chain = ProfileChain::load(&profiles).unwrap();
        assert_eq!(chain.profiles().len(), 1);

        let absolute = profiles.join("testprofile");
        let profile = chain.find_profile(&absolute).unwrap();
        assert_eq!(profile.path, absolute);
        assert_eq!(profile.arch, "x86");
        assert_eq!(profile.status, "stable");
        assert_eq!(chain.find_profile(Path::new("testprofile")), Some(profile));

        assert!(chain.find_profile(Path::new("broken")).is_none());
        assert!(chain.find_profile(Path::new("missing")).is_none());
    }

    #[test]
    fn test_set_unknown_profile_fails() {
        let dir = tempdir().unwrap();
        let profiles = dir.path().join("profiles");
        write(&profiles, "profiles.desc", "");
        let chain = ProfileChain::load(&profiles).unwrap();

        let stranger = Profile {
            path: profiles.join("nowhere"),
            arch: "x86".into(),
            status: "stable".into(),
        };
        assert!(matches!(
            chain.set_profile(&stranger),
            Err(RepositoryError::InvalidArgument(_))
        ));
        assert!(chain.profile().is_none());
    }

    #[test]
    fn test_custom_profile_and_system_set() {
        let dir = tempdir().unwrap();
        let profiles = dir.path().join("profiles");
        write(&profiles, "base/packages", "*foo/bar\n*foo/baz\nfoo/other\n");
        write(&profiles, "base/virtuals", "virtual/bar foo/bar\n");
        let custom = dir.path().join("custom");
        write(&custom, "parent", "../profiles/base\n");
        write(&custom, "make.defaults", "ARCH=\"riscv\"\n");
        write(&custom, "packages", "-*foo/baz\n");

        let mut chain = ProfileChain::load(&profiles).unwrap();
        let profile = chain.add_custom_profile(&custom).unwrap().unwrap();
        assert_eq!(profile.arch, "riscv");
        assert_eq!(profile.status, "custom");
        assert!(chain.add_custom_profile(&dir.path().join("nope")).unwrap().is_none());

        chain.set_profile(&profile).unwrap();
        let active = chain.active().unwrap();
        let system: Vec<_> = active.system().iter().map(ToString::to_string).collect();
        assert_eq!(system, vec!["foo/bar"]);
        assert_eq!(active.virtuals().len(), 1);
    }
}
