use std::{env, fs, path::Path, sync::Arc};

use clap::Parser;
use cli::{Args, Commands};
use logging::setup_logging;
use pkgtree_config::config::{config_path, generate_default_config, set_config_path, Config};
use pkgtree_core::{
    environment::Environment,
    error::{ErrorContext, RepositoryError},
    repository::Repository,
    Result,
};
use pkgtree_utils::path::resolve_path;
use qa::QaOptions;
use tracing::{debug, info, warn};

mod cli;
mod list;
mod logging;
mod qa;
mod use_flags;
mod utils;

fn open_environment(args: &Args) -> Result<Environment> {
    match &args.tree {
        Some(tree) => {
            debug!("opening {} without configuration", tree);
            Environment::for_tree(&resolve_path(tree)?, None)
        }
        None => Environment::from_config(&Config::new()?),
    }
}

fn select_repository(env: &Environment, args: &Args) -> Result<Arc<dyn Repository>> {
    let repo = env.main_repository(args.repo.as_deref()).ok_or_else(|| {
        RepositoryError::InvalidArgument(match &args.repo {
            Some(name) => format!("no repository named {}", name),
            None => "no package tree is configured".to_string(),
        })
    })?;

    if let Some(profile) = &args.profile {
        let profiles = repo.profile_config_interface().ok_or_else(|| {
            RepositoryError::InvalidArgument(format!("{} has no profiles", repo.name()))
        })?;
        let found = profiles.find_profile(Path::new(profile)).ok_or_else(|| {
            RepositoryError::InvalidArgument(format!(
                "{} has no profile {}",
                repo.name(),
                profile
            ))
        })?;
        profiles.set_profile(&found)?;
    }

    Ok(repo)
}

fn print_config() -> Result<()> {
    let path = config_path();
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("Config file {} not found", path.display());
            Config::default_config().to_annotated_document()?.to_string()
        }
        Err(err) => {
            return Err(RepositoryError::IoError {
                action: "reading config".to_string(),
                source: err,
            })
        }
    };
    info!("{}", content);
    Ok(())
}

/// Returns `false` when the command ran but found problems.
fn handle_cli() -> Result<bool> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        utils::set_color(false);
    }

    if let Some(ref c) = args.config {
        let path = resolve_path(c)?;
        let path = if path.is_absolute() {
            path
        } else {
            env::current_dir()
                .with_context(|| "retrieving current directory".into())?
                .join(path)
        };
        set_config_path(path);
    }

    match args.command {
        Commands::DefConfig => {
            generate_default_config()?;
            return Ok(true);
        }
        Commands::Config => {
            print_config()?;
            return Ok(true);
        }
        _ => {}
    }

    let env = open_environment(&args)?;
    if let Commands::Repositories = args.command {
        list::list_repositories(env.database());
        return Ok(true);
    }

    let repo = select_repository(&env, &args)?;
    let repo = repo.as_ref();

    match &args.command {
        Commands::Categories => list::list_categories(repo),
        Commands::Packages {
            category,
        } => list::list_packages(repo, category),
        Commands::Ids {
            package,
        } => list::list_ids(repo, package)?,
        Commands::Use {
            atom,
            flags,
        } => use_flags::show_use(repo, atom, flags)?,
        Commands::Profiles => list::list_profiles(repo, args.json)?,
        Commands::Var {
            name,
        } => list::show_variable(repo, name)?,
        Commands::Qa {
            target,
            level,
            include,
            exclude,
        } => {
            let options = QaOptions {
                target: target.as_deref(),
                level,
                include,
                exclude,
            };
            return qa::run_qa(repo, options, args.json);
        }
        Commands::Repositories | Commands::Config | Commands::DefConfig => unreachable!(),
    }

    Ok(true)
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    match handle_cli() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            std::process::exit(1);
        }
    }
}
