use nu_ansi_term::Color::{Blue, Green, LightRed, Red, Yellow};
use pkgtree_core::{
    error::RepositoryError,
    matcher::PackageMatcher,
    names::UseFlagName,
    repository::Repository,
    use_flags::{UseFlagState, UseResolution},
    Result,
};
use tracing::{info, warn};

use crate::utils::Colored;

fn state_label(resolution: &UseResolution) -> String {
    let state = match resolution.state {
        UseFlagState::Enabled => Colored(Green, "+").to_string(),
        UseFlagState::Disabled => Colored(Red, "-").to_string(),
        UseFlagState::Unspecified => Colored(Yellow, "?").to_string(),
    };
    let mut extra = Vec::new();
    if resolution.masked {
        extra.push("masked");
    }
    if resolution.forced {
        extra.push("forced");
    }
    if extra.is_empty() {
        state
    } else {
        format!("{} ({})", state, extra.join(", "))
    }
}

/// Resolves `flags` for every id in `repo` matching `atom`. With no flags,
/// lists the enabled ones instead.
pub fn show_use(repo: &dyn Repository, atom: &str, flags: &[String]) -> Result<()> {
    let Some(use_interface) = repo.use_interface() else {
        return Err(RepositoryError::InvalidArgument(format!(
            "{} does not provide USE flags",
            repo.name()
        )));
    };
    let matcher = PackageMatcher::parse(atom).map_err(RepositoryError::into_invalid_argument)?;
    let flags = flags
        .iter()
        .map(|flag| UseFlagName::new(flag.as_str()))
        .collect::<Result<Vec<_>>>()
        .map_err(RepositoryError::into_invalid_argument)?;

    let mut found = false;
    for id in repo
        .package_ids(matcher.package_name())
        .filter(|id| matcher.matches(id))
    {
        found = true;
        info!(id = %id, "{}", Colored(Blue, id));

        if flags.is_empty() {
            let enabled = use_interface.enabled_use_flags(id);
            info!(id = %id, enabled = ?enabled, "  {}", enabled.join(" "));
            continue;
        }

        for flag in &flags {
            let resolution = use_interface.resolve_use(flag, id);
            let description = use_interface.describe_use_flag(flag, id);
            info!(
                id = %id,
                flag = %flag,
                state = %resolution.state,
                masked = resolution.masked,
                forced = resolution.forced,
                description = description,
                "  {} {} {}",
                state_label(&resolution),
                Colored(LightRed, flag),
                description
            );
        }
    }

    if !found {
        warn!("no ids in {} match {}", repo.name(), atom);
    }
    Ok(())
}
