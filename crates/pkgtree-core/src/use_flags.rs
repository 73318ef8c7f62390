//! USE flag resolution.
//!
//! A [`UseFlagConfig`] stacks four layers, lowest precedence first:
//!
//! 1. defaults (`USE` from `make.defaults`),
//! 2. per-package settings (`package.use`),
//! 3. force (`use.force`, `package.use.force`),
//! 4. mask (`use.mask`, `package.use.mask`).
//!
//! Forcing pins a flag to enabled and masking pins it to disabled; a flag
//! that is both reports both facts and ends up disabled.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use pkgtree_utils::fs::read_optional;
use serde::Serialize;
use strum::Display;
use tracing::warn;

use crate::{
    error::Result,
    matcher::PackageMatcher,
    names::{QualifiedPackageName, UseFlagName},
    package_id::PackageId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UseFlagState {
    Enabled,
    Disabled,
    Unspecified,
}

impl From<bool> for UseFlagState {
    fn from(enabled: bool) -> Self {
        if enabled {
            UseFlagState::Enabled
        } else {
            UseFlagState::Disabled
        }
    }
}

/// The outcome of resolving one flag for one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UseResolution {
    pub state: UseFlagState,
    pub masked: bool,
    pub forced: bool,
}

/// One entry of a force, mask or `package.use` layer. Global entries carry
/// no matcher.
#[derive(Debug, Clone)]
enum FlagRule {
    Clear,
    Set {
        matcher: Option<PackageMatcher>,
        flag: String,
        enabled: bool,
    },
}

impl FlagRule {
    fn flag(&self) -> Option<&str> {
        match self {
            FlagRule::Clear => None,
            FlagRule::Set { flag, .. } => Some(flag),
        }
    }
}

/// Stacked USE configuration.
///
/// Layers are applied in the order their `add_*` methods are called, so
/// callers add parent profiles before children. Within the force and mask
/// layers, global and per-package entries form one sequence and the last
/// entry that applies wins.
#[derive(Debug, Clone, Default)]
pub struct UseFlagConfig {
    defaults: BTreeMap<String, bool>,
    package_use: Vec<FlagRule>,
    force: Vec<FlagRule>,
    mask: Vec<FlagRule>,
}

/// Splits a token into its flag and whether it enables (`flag`) or
/// disables (`-flag`).
fn parse_token(token: &str) -> Option<(&str, bool)> {
    let (flag, enabled) = match token.strip_prefix('-') {
        Some(flag) => (flag, false),
        None => (token.strip_prefix('+').unwrap_or(token), true),
    };
    if UseFlagName::new(flag).is_err() {
        warn!("ignoring malformed use flag token '{}'", token);
        return None;
    }
    Some((flag, enabled))
}

fn rules(matcher: Option<&PackageMatcher>, tokens: &[&str]) -> Vec<FlagRule> {
    tokens
        .iter()
        .filter_map(|token| {
            if *token == "-*" && matcher.is_none() {
                return Some(FlagRule::Clear);
            }
            parse_token(token).map(|(flag, enabled)| {
                FlagRule::Set {
                    matcher: matcher.cloned(),
                    flag: flag.to_string(),
                    enabled,
                }
            })
        })
        .collect()
}

/// The setting of the last entry in `rules` that applies to `flag` on `id`.
/// A `-*` entry counts as disabling every flag.
fn last_matching(rules: &[FlagRule], flag: &str, id: &PackageId) -> Option<bool> {
    rules.iter().rev().find_map(|rule| {
        match rule {
            FlagRule::Clear => Some(false),
            FlagRule::Set {
                matcher,
                flag: rule_flag,
                enabled,
            } => {
                let applies = rule_flag == flag
                    && matcher.as_ref().map_or(true, |matcher| matcher.matches(id));
                applies.then_some(*enabled)
            }
        }
    })
}

impl UseFlagConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a `USE` value. `flag` enables, `-flag` disables, `-*` drops
    /// everything set so far.
    pub fn add_use_tokens(&mut self, tokens: &[&str]) {
        for token in tokens {
            if *token == "-*" {
                self.defaults.clear();
                continue;
            }
            if let Some((flag, enabled)) = parse_token(token) {
                self.defaults.insert(flag.to_string(), enabled);
            }
        }
    }

    pub fn add_package_use(&mut self, matcher: &PackageMatcher, tokens: &[&str]) {
        self.package_use.extend(rules(Some(matcher), tokens));
    }

    pub fn add_force_tokens(&mut self, tokens: &[&str]) {
        self.force.extend(rules(None, tokens));
    }

    pub fn add_mask_tokens(&mut self, tokens: &[&str]) {
        self.mask.extend(rules(None, tokens));
    }

    pub fn add_package_force(&mut self, matcher: &PackageMatcher, tokens: &[&str]) {
        self.force.extend(rules(Some(matcher), tokens));
    }

    pub fn add_package_mask(&mut self, matcher: &PackageMatcher, tokens: &[&str]) {
        self.mask.extend(rules(Some(matcher), tokens));
    }

    /// Builds the configuration recorded for an installed id: flags in
    /// `IUSE` start disabled and those in `USE` are enabled.
    pub fn from_recorded(id: &PackageId) -> Self {
        let mut config = Self::new();
        let iuse: Vec<_> = id
            .metadata_tokens("IUSE")
            .map(|flag| flag.trim_start_matches(['+', '-']))
            .map(|flag| format!("-{flag}"))
            .collect();
        config.add_use_tokens(&iuse.iter().map(String::as_str).collect::<Vec<_>>());
        config.add_use_tokens(&id.metadata_tokens("USE").collect::<Vec<_>>());
        config
    }

    pub fn resolve(&self, flag: &str, id: &PackageId) -> UseResolution {
        let forced = last_matching(&self.force, flag, id).unwrap_or(false);
        let masked = last_matching(&self.mask, flag, id).unwrap_or(false);

        let mut state = self
            .defaults
            .get(flag)
            .map_or(UseFlagState::Unspecified, |enabled| (*enabled).into());
        if let Some(enabled) = last_matching(&self.package_use, flag, id) {
            state = enabled.into();
        }
        if forced {
            state = UseFlagState::Enabled;
        }
        if masked {
            state = UseFlagState::Disabled;
        }

        UseResolution {
            state,
            masked,
            forced,
        }
    }

    /// Flags that end up enabled for `id`, considering every flag any layer
    /// mentions.
    pub fn enabled_flags(&self, id: &PackageId) -> Vec<String> {
        self.mentioned_flags()
            .into_iter()
            .filter(|flag| self.resolve(flag, id).state == UseFlagState::Enabled)
            .map(str::to_string)
            .collect()
    }

    /// Every flag some layer names, sorted.
    pub fn mentioned_flags(&self) -> BTreeSet<&str> {
        self.defaults
            .keys()
            .map(String::as_str)
            .chain(
                self.package_use
                    .iter()
                    .chain(&self.force)
                    .chain(&self.mask)
                    .filter_map(FlagRule::flag),
            )
            .collect()
    }
}

/// Descriptions from `use.desc` and `use.local.desc`.
#[derive(Debug, Clone, Default)]
pub struct UseDescriptions {
    global: BTreeMap<String, String>,
    local: BTreeMap<(QualifiedPackageName, String), String>,
}

impl UseDescriptions {
    /// Reads `profiles/use.desc` and `profiles/use.local.desc` under `tree`.
    /// Missing files contribute nothing.
    pub fn load(tree: &Path) -> Result<Self> {
        let mut descriptions = Self::default();
        if let Some(content) = read_optional(tree.join("profiles/use.desc"))? {
            descriptions.add_global(&content);
        }
        if let Some(content) = read_optional(tree.join("profiles/use.local.desc"))? {
            descriptions.add_local(&content);
        }
        Ok(descriptions)
    }

    /// Parses `flag - description` lines.
    pub fn add_global(&mut self, content: &str) {
        for line in pkgtree_utils::text::config_lines(content) {
            if let Some((flag, text)) = line.split_once(" - ") {
                self.global
                    .insert(flag.trim().to_string(), text.trim().to_string());
            }
        }
    }

    /// Parses `cat/pkg:flag - description` lines.
    pub fn add_local(&mut self, content: &str) {
        for line in pkgtree_utils::text::config_lines(content) {
            let Some((key, text)) = line.split_once(" - ") else {
                continue;
            };
            let Some((name, flag)) = key.trim().split_once(':') else {
                continue;
            };
            match QualifiedPackageName::parse(name) {
                Ok(name) => {
                    self.local
                        .insert((name, flag.to_string()), text.trim().to_string());
                }
                Err(err) => warn!("skipping use.local.desc entry: {}", err),
            }
        }
    }

    pub fn insert_global(&mut self, flag: &str, text: &str) {
        self.global.insert(flag.to_string(), text.to_string());
    }

    /// The package-local description if there is one, else the global one,
    /// else empty.
    pub fn describe(&self, flag: &str, id: &PackageId) -> String {
        self.local
            .get(&(id.name().clone(), flag.to_string()))
            .or_else(|| self.global.get(flag))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        names::RepositoryName,
        package_id::SupportedActions,
        version::VersionSpec,
    };

    fn id(name: &str, version: &str) -> PackageId {
        PackageId::new(
            QualifiedPackageName::parse(name).unwrap(),
            VersionSpec::parse(version).unwrap(),
            RepositoryName::new("testrepo").unwrap(),
            SupportedActions::INSTALLABLE,
        )
    }

    fn m(s: &str) -> PackageMatcher {
        PackageMatcher::parse(s).unwrap()
    }

    /// The layers of the `testprofile` fixture, parent first.
    fn fixture_config() -> UseFlagConfig {
        let mut config = UseFlagConfig::new();
        config.add_use_tokens(&["test2"]);
        config.add_use_tokens(&["test1", "-test2"]);
        config.add_package_use(&m("foo/bar"), &["test3"]);
        config.add_mask_tokens(&["test5"]);
        config.add_force_tokens(&["test6"]);
        config.add_package_force(&m("=foo/bar-2.0"), &["test7"]);
        config
    }

    #[test]
    fn test_fixture_table() {
        let config = fixture_config();
        let pid = id("foo/bar", "2.0");

        let expected = [
            ("test1", UseFlagState::Enabled, false, false),
            ("test2", UseFlagState::Disabled, false, false),
            ("test3", UseFlagState::Enabled, false, false),
            ("test4", UseFlagState::Unspecified, false, false),
            ("test5", UseFlagState::Disabled, true, false),
            ("test6", UseFlagState::Enabled, false, true),
            ("test7", UseFlagState::Enabled, false, true),
        ];
        for (flag, state, masked, forced) in expected {
            assert_eq!(
                config.resolve(flag, &pid),
                UseResolution {
                    state,
                    masked,
                    forced
                },
                "{flag}"
            );
        }
    }

    #[test]
    fn test_package_force_is_version_specific() {
        let config = fixture_config();
        let older = id("foo/bar", "1.0");
        let resolution = config.resolve("test7", &older);
        assert_eq!(resolution.state, UseFlagState::Unspecified);
        assert!(!resolution.forced);
    }

    #[test]
    fn test_mask_beats_force() {
        let mut config = UseFlagConfig::new();
        config.add_force_tokens(&["both"]);
        config.add_mask_tokens(&["both"]);
        let resolution = config.resolve("both", &id("foo/bar", "1.0"));
        assert_eq!(resolution.state, UseFlagState::Disabled);
        assert!(resolution.masked);
        assert!(resolution.forced);
    }

    #[test]
    fn test_force_beats_package_use() {
        let mut config = UseFlagConfig::new();
        config.add_package_use(&m("foo/bar"), &["-flag"]);
        config.add_force_tokens(&["flag"]);
        assert_eq!(
            config.resolve("flag", &id("foo/bar", "1.0")).state,
            UseFlagState::Enabled
        );
    }

    #[test]
    fn test_incremental_sets_and_clear() {
        let mut config = UseFlagConfig::new();
        config.add_use_tokens(&["a", "b"]);
        config.add_use_tokens(&["-*", "c"]);
        let pid = id("foo/bar", "1.0");
        assert_eq!(config.resolve("a", &pid).state, UseFlagState::Unspecified);
        assert_eq!(config.resolve("c", &pid).state, UseFlagState::Enabled);

        config.add_mask_tokens(&["m"]);
        config.add_mask_tokens(&["-m"]);
        assert!(!config.resolve("m", &pid).masked);
    }

    #[test]
    fn test_package_unmask_overrides_global_mask() {
        let mut config = UseFlagConfig::new();
        config.add_mask_tokens(&["flag"]);
        config.add_package_mask(&m("foo/bar"), &["-flag"]);
        assert!(!config.resolve("flag", &id("foo/bar", "1.0")).masked);
        assert!(config.resolve("flag", &id("foo/baz", "1.0")).masked);
    }

    #[test]
    fn test_child_global_mask_beats_parent_package_unmask() {
        let mut config = UseFlagConfig::new();
        config.add_package_mask(&m("foo/bar"), &["-flag"]);
        config.add_mask_tokens(&["flag"]);
        let resolution = config.resolve("flag", &id("foo/bar", "1.0"));
        assert!(resolution.masked);
        assert_eq!(resolution.state, UseFlagState::Disabled);

        config.add_force_tokens(&["other"]);
        config.add_force_tokens(&["-*"]);
        config.add_package_force(&m("foo/bar"), &["other"]);
        assert!(config.resolve("other", &id("foo/bar", "1.0")).forced);
        assert!(!config.resolve("other", &id("foo/baz", "1.0")).forced);
    }

    #[test]
    fn test_from_recorded() {
        let pid = id("foo/bar", "1.0").with_metadata(BTreeMap::from([
            ("IUSE".to_string(), "+test1 test2".to_string()),
            ("USE".to_string(), "test1 x86".to_string()),
        ]));
        let config = UseFlagConfig::from_recorded(&pid);
        assert_eq!(config.resolve("test1", &pid).state, UseFlagState::Enabled);
        assert_eq!(config.resolve("test2", &pid).state, UseFlagState::Disabled);
        assert_eq!(config.resolve("test4", &pid).state, UseFlagState::Unspecified);
        assert_eq!(config.enabled_flags(&pid), vec!["test1", "x86"]);
    }

    #[test]
    fn test_descriptions() {
        let mut descriptions = UseDescriptions::default();
        descriptions.add_global("# comment\ntest1 - A test use flag\ntest3 - global text\n");
        descriptions.add_local("foo/bar:test3 - local text\nbroken line\n");

        let pid = id("foo/bar", "2.0");
        assert_eq!(descriptions.describe("test1", &pid), "A test use flag");
        assert_eq!(descriptions.describe("test3", &pid), "local text");
        assert_eq!(
            descriptions.describe("test3", &id("foo1/bar", "1.0")),
            "global text"
        );
        assert_eq!(descriptions.describe("test4", &pid), "");
    }
}
