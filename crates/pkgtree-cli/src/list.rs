use nu_ansi_term::Color::{Blue, Cyan, Green, LightRed, Magenta, Yellow};
use pkgtree_core::{
    database::PackageDatabase, error::RepositoryError, names::QualifiedPackageName,
    repository::Repository, Result,
};
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::{info, warn};

use crate::utils::Colored;

pub fn list_categories(repo: &dyn Repository) {
    let mut count = 0;
    for category in repo.category_names() {
        info!(category = %category, "{}", Colored(Blue, &category));
        count += 1;
    }
    if count == 0 {
        warn!("{} has no categories", repo.name());
    }
}

pub fn list_packages(repo: &dyn Repository, category: &str) {
    if !repo.has_category_named(category) {
        warn!("{} has no category named {}", repo.name(), category);
        return;
    }
    for package in repo.package_names(category) {
        info!(
            category = category,
            package = %package,
            "{}/{}",
            Colored(Blue, category),
            Colored(Cyan, &package)
        );
    }
}

pub fn list_ids(repo: &dyn Repository, package: &str) -> Result<()> {
    let name = QualifiedPackageName::parse(package).map_err(RepositoryError::into_invalid_argument)?;
    if !repo.has_package_named(&name) {
        warn!("{} has no package named {}", repo.name(), name);
        return Ok(());
    }

    for id in repo.package_ids(&name) {
        let slot = id.metadata_value("SLOT").unwrap_or("0");
        let description = id.metadata_value("DESCRIPTION").unwrap_or_default();
        let actions: Vec<String> = id
            .supported_actions()
            .iter()
            .map(|action| action.to_string())
            .collect();
        info!(
            id = %id,
            version = %id.version(),
            slot = slot,
            repository = %id.repository_name(),
            actions = ?actions,
            "{}-{}:{}::{} {}",
            Colored(Blue, id.name()),
            Colored(LightRed, id.version()),
            Colored(Magenta, slot),
            Colored(Green, id.repository_name()),
            description
        );
    }
    Ok(())
}

pub fn list_repositories(database: &PackageDatabase) {
    for repo in database.repositories() {
        let kind = if repo.is_installed() { "installed" } else { "tree" };
        let capabilities: Vec<String> = repo
            .capabilities()
            .iter()
            .map(|capability| capability.to_string())
            .collect();
        info!(
            repository = %repo.name(),
            format = repo.format(),
            kind = kind,
            capabilities = ?capabilities,
            "{} ({}) [{}]",
            Colored(Green, repo.name()),
            Colored(Yellow, repo.format()),
            capabilities.join(", ")
        );
    }
}

pub fn list_profiles(repo: &dyn Repository, json: bool) -> Result<()> {
    let Some(profiles) = repo.profile_config_interface() else {
        return Err(RepositoryError::InvalidArgument(format!(
            "{} has no profiles",
            repo.name()
        )));
    };
    let active = profiles.profile();

    if json {
        for profile in profiles.profiles() {
            info!(
                path = %profile.path.display(),
                arch = profile.arch,
                status = profile.status,
                active = active.as_ref() == Some(profile),
                "{}",
                profile.path.display()
            );
        }
        return Ok(());
    }

    let mut builder = Builder::new();
    builder.push_record(["", "Profile", "Arch", "Status"]);
    for profile in profiles.profiles() {
        let marker = if active.as_ref() == Some(profile) { "*" } else { "" };
        builder.push_record([
            marker.to_string(),
            profile.path.display().to_string(),
            profile.arch.clone(),
            profile.status.clone(),
        ]);
    }

    let table = builder
        .build()
        .with(Panel::header(format!("Profiles in {}", repo.name())))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string();
    info!("\n{table}");
    Ok(())
}

pub fn show_variable(repo: &dyn Repository, name: &str) -> Result<()> {
    let Some(profiles) = repo.profile_config_interface() else {
        return Err(RepositoryError::InvalidArgument(format!(
            "{} has no profiles",
            repo.name()
        )));
    };
    let value = profiles.profile_variable(name);
    info!(name = name, value = value, "{}={}", name, value);
    Ok(())
}
