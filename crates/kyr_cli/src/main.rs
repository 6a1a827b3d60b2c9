//! kyr CLI - keeps a local record of GitHub organizations, their
//! repositories and the dependencies pinned in their lockfiles.

mod commands;
mod config;
mod progress;
mod shutdown;

use clap::{Parser, Subcommand, ValueEnum};
use console::Term;
use kyr::GitHostKind;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kyr")]
#[command(version)]
#[command(about = "Track a GitHub organization's repositories and their dependencies")]
#[command(
    long_about = "kyr pulls an organization's repositories from GitHub together with their \
lockfiles, and keeps a local database of repositories and the dependency versions they pin. \
Repositories are only re-fetched when they were pushed since the last pull."
)]
#[command(after_long_help = r#"EXAMPLES
    Pull organization metadata (required once before pulling repos):
        $ kyr pull org acme

    Pull every repository of the organization:
        $ kyr pull repos -o acme

    Pull selected repositories, or those starting with a prefix:
        $ kyr pull repos -o acme api web
        $ kyr pull repos -o acme --prefix svc-

    Find repositories pinning a dependency version:
        $ kyr show deps "requests >= 2.0 & urllib3 < 2"

CONFIGURATION
    kyr reads configuration from:
      1. ~/.config/kyr/config.toml (or $XDG_CONFIG_HOME/kyr/config.toml)
      2. ./kyr.toml
      3. Environment variables (KYR_ prefix, `__` between section and key)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    KYR_DATABASE__URL         Database connection string (default: ~/.local/state/kyr/kyr.db)
    KYR_GITHUB__TOKENS        Comma-separated GitHub personal access tokens
    KYR_GITHUB__API_URL       GitHub API root (default: https://api.github.com)
    KYR_PULL__FILE_PATHS      Comma-separated lockfile paths (default: poetry.lock)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Pull data from a git host
    Pull {
        /// Git host to pull from
        #[arg(short = 'g', long, value_enum, default_value_t = HostArg::Github)]
        git_host: HostArg,

        #[command(flatten)]
        opts: PullOptions,

        #[command(subcommand)]
        action: PullAction,
    },
    /// Query pulled data
    Show {
        #[command(subcommand)]
        action: ShowAction,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HostArg {
    Github,
}

impl From<HostArg> for GitHostKind {
    fn from(arg: HostArg) -> Self {
        match arg {
            HostArg::Github => GitHostKind::GitHub,
        }
    }
}

/// Options shared by every pull.
#[derive(Debug, Clone, clap::Args)]
struct PullOptions {
    /// File to fetch from new and updated repositories (repeatable, default from config)
    #[arg(short = 'f', long = "file", global = true)]
    file_paths: Vec<String>,

    /// Repositories per listing page (default from config or 100)
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Per-request timeout in seconds (default from config or 30)
    #[arg(long = "timeout", global = true)]
    request_timeout_secs: Option<u64>,

    /// Disable proactive rate limiting (may cause API throttling)
    #[arg(short = 'R', long, global = true)]
    no_rate_limit: bool,
}

#[derive(Subcommand)]
enum PullAction {
    /// Pull organization metadata
    Org {
        /// Organization name
        org_name: String,
    },
    /// Pull repositories and their lockfiles
    ///
    /// Without names or a prefix every repository is pulled, and stored
    /// repositories no longer listed are removed.
    Repos {
        /// Organization name
        #[arg(short = 'o', long = "org")]
        org_name: String,

        /// Repository names - can specify multiple
        repo_names: Vec<String>,

        /// Only pull repositories whose name starts with this prefix
        #[arg(short = 'p', long, conflicts_with = "repo_names")]
        prefix: Option<String>,
    },
}

#[derive(Subcommand)]
enum ShowAction {
    /// List repositories whose dependencies satisfy a query
    ///
    /// The query is `name op version` clauses joined by `&`, with op one of
    /// == != >= > <= <, and `*` for any version.
    Deps {
        /// e.g. "requests >= 2.0 & urllib3 < 2"
        query: String,

        /// Dependency language the clauses refer to
        #[arg(short, long, default_value = kyr::query::DEFAULT_LANGUAGE)]
        language: String,
    },
    /// List an organization's stored repositories with their dependencies
    Repos {
        /// Organization name
        #[arg(short = 'o', long = "org")]
        org_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing for non-TTY mode (structured logging)
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("kyr=info,kyr_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    let database_url = config
        .database_url()
        .ok_or("Failed to determine database URL; set database.url or KYR_DATABASE__URL")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        // Strip query parameters (e.g., ?mode=rwc) before path operations
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Pull {
            git_host,
            opts,
            action,
        } => {
            commands::pull::handle_pull(git_host.into(), action, opts, &config, &database_url)
                .await?;
        }
        Commands::Show { action } => {
            commands::show::handle_show(action, &database_url).await?;
        }
    }

    Ok(())
}
