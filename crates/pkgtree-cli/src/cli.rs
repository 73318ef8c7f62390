use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Repository to operate on (default: the first configured tree)
    #[arg(short, long, global = true)]
    pub repo: Option<String>,

    /// Open this tree directly instead of reading the configuration
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub tree: Option<String>,

    /// Profile to activate, relative to the tree's profiles directory
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List categories
    #[clap(name = "categories", visible_alias = "cats")]
    Categories,

    /// List packages in a category
    #[command(arg_required_else_help = true)]
    Packages {
        /// Category to list
        #[arg(required = true)]
        category: String,
    },

    /// List versions of a package
    #[command(arg_required_else_help = true)]
    Ids {
        /// Qualified package name, e.g. app-misc/foo
        #[arg(required = true)]
        package: String,
    },

    /// Show the state of USE flags for matching ids
    #[command(arg_required_else_help = true)]
    Use {
        /// Package atom, e.g. =app-misc/foo-1.0
        #[arg(required = true)]
        atom: String,

        /// Flags to resolve; all enabled flags when omitted
        flags: Vec<String>,
    },

    /// List profiles known to the repository
    Profiles,

    /// Show a profile variable for the active profile
    #[command(arg_required_else_help = true)]
    Var {
        /// Variable name, e.g. ARCH
        #[arg(required = true)]
        name: String,
    },

    /// Run QA checks
    #[clap(name = "qa", visible_alias = "check")]
    Qa {
        /// Directory to check (default: the whole repository)
        #[arg(value_hint = ValueHint::DirPath)]
        target: Option<String>,

        /// Lowest level to report (debug, info, warning, error)
        #[arg(short, long, default_value = "info")]
        level: String,

        /// Only run checks having all of these properties
        #[arg(short, long, value_delimiter = ',')]
        include: Vec<String>,

        /// Skip checks having any of these properties
        #[arg(short, long, value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// List repositories
    #[clap(name = "repos")]
    Repositories,

    /// Print the configuration file to stdout
    Config,

    /// Generate default config
    #[clap(name = "defconfig")]
    DefConfig,
}
