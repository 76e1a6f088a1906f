//! Registrar CLI - operator tooling for the access-control store.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use registrar_core::{LogFormat, UserStatus};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "registrar")]
#[command(about = "Registrar - role-based access control for school administration")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.registrar/registrar.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed permissions and roles, and make sure the fallback admin exists
    Seed {
        /// Catalog file (defaults to auth.catalogPath, then the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Name recorded as the initiator of this run
        #[arg(long, default_value = "cli")]
        initiator: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Bearer token operations
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },

    /// User management
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Check whether a user may perform an action
    Check {
        /// Account email
        #[arg(long)]
        email: String,

        /// Resource, e.g. grades
        #[arg(long)]
        resource: String,

        /// Action, e.g. edit
        #[arg(long)]
        action: String,
    },

    /// Sign in and print a bearer token
    Login {
        /// Account email
        #[arg(long)]
        email: String,

        /// Password (prompted if omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Generate student or employee identifiers
    Ids {
        #[command(subcommand)]
        kind: IdCommands,

        /// Use a timestamp suffix instead of a store sequence
        #[arg(long, global = true)]
        timestamp: bool,
    },

    /// Inspect the persisted catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogCommands,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Issue a token for an existing user
    Issue {
        /// Account email
        #[arg(long)]
        email: String,
    },

    /// Verify a token and print its claims
    Verify {
        /// The token
        token: String,
    },

    /// Generate a new signing secret
    Secret,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        /// Account email
        #[arg(long)]
        email: String,

        /// Role name
        #[arg(long)]
        role: String,

        /// Given name
        #[arg(long, default_value = "")]
        first_name: String,

        /// Family name
        #[arg(long, default_value = "")]
        last_name: String,

        /// Password (or use --generate-password)
        #[arg(long, conflicts_with = "generate_password")]
        password: Option<String>,

        /// Generate a random password that must be changed at first sign-in
        #[arg(long)]
        generate_password: bool,
    },

    /// List all users
    List,

    /// Change a user's status
    Status {
        /// Account email
        #[arg(long)]
        email: String,

        /// New status: active, inactive, or suspended
        #[arg(long)]
        status: UserStatus,
    },

    /// Set a user's password
    Passwd {
        /// Account email
        #[arg(long)]
        email: String,

        /// Generate a temporary password instead of prompting
        #[arg(long)]
        generate: bool,
    },
}

#[derive(Subcommand)]
enum IdCommands {
    /// Student identifier
    Student {
        /// Enrolment year
        #[arg(long)]
        year: i32,

        /// Department name
        #[arg(long)]
        department: String,
    },

    /// Employee identifier
    Employee {
        /// Department name
        #[arg(long)]
        department: String,

        /// Role name
        #[arg(long)]
        role: String,
    },
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// List persisted permissions and roles
    Show,
}

fn init_logging(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let ctx = commands::Context::load(cli.config.as_deref())?;
    init_logging(
        cli.verbose || ctx.config.settings.debug,
        ctx.config.settings.log_format,
    );

    match cli.command {
        Commands::Seed {
            catalog,
            initiator,
            json,
        } => {
            let args = commands::seed::SeedArgs {
                catalog,
                initiator,
                json,
            };
            commands::run_seed(&ctx, args).await?;
        }

        Commands::Token { action } => {
            let action = match action {
                TokenCommands::Issue { email } => commands::token::TokenAction::Issue { email },
                TokenCommands::Verify { token } => commands::token::TokenAction::Verify { token },
                TokenCommands::Secret => commands::token::TokenAction::Secret,
            };
            commands::run_token(&ctx, action).await?;
        }

        Commands::User { action } => {
            let action = match action {
                UserCommands::Create {
                    email,
                    role,
                    first_name,
                    last_name,
                    password,
                    generate_password,
                } => commands::user::UserAction::Create {
                    email,
                    role,
                    first_name,
                    last_name,
                    password,
                    generate_password,
                },
                UserCommands::List => commands::user::UserAction::List,
                UserCommands::Status { email, status } => {
                    commands::user::UserAction::Status { email, status }
                }
                UserCommands::Passwd { email, generate } => {
                    commands::user::UserAction::Passwd { email, generate }
                }
            };
            commands::run_user(&ctx, action).await?;
        }

        Commands::Check {
            email,
            resource,
            action,
        } => {
            let args = commands::check::CheckArgs {
                email,
                resource,
                action,
            };
            commands::run_check(&ctx, args).await?;
        }

        Commands::Login { email, password } => {
            let args = commands::login::LoginArgs { email, password };
            commands::run_login(&ctx, args).await?;
        }

        Commands::Ids { kind, timestamp } => {
            let kind = match kind {
                IdCommands::Student { year, department } => {
                    commands::ids::IdKind::Student { year, department }
                }
                IdCommands::Employee { department, role } => {
                    commands::ids::IdKind::Employee { department, role }
                }
            };
            commands::run_ids(&ctx, commands::ids::IdsArgs { kind, timestamp }).await?;
        }

        Commands::Catalog { action } => match action {
            CatalogCommands::Show => commands::run_catalog_show(&ctx).await?,
        },
    }

    Ok(())
}
