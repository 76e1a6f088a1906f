//! Catalog seeding.

use std::path::PathBuf;

use anyhow::Context as _;
use registrar_auth::bootstrap::{PermissionFailure, RoleFailure, SectionReport};
use registrar_auth::{AdminOutcome, BootstrapReport, FallbackAdmin, initialize_rbac};

use super::Context;
use crate::ui;

/// Arguments for the seed command.
pub struct SeedArgs {
    /// Catalog file override.
    pub catalog: Option<PathBuf>,
    /// Initiator recorded in the report.
    pub initiator: String,
    /// Emit JSON instead of formatted output.
    pub json: bool,
}

/// Run the seed command.
///
/// # Errors
///
/// Returns error if the catalog is rejected, the store is unreachable, or
/// any entry failed.
pub async fn run_seed(ctx: &Context, args: SeedArgs) -> anyhow::Result<()> {
    let catalog = ctx.catalog(args.catalog.as_deref())?;
    let store = ctx.open_store()?;
    let credentials = ctx.credentials()?;
    let admin = FallbackAdmin::from_config(&ctx.config.auth);

    let report = initialize_rbac(&store, &catalog, &credentials, &admin, &args.initiator)
        .context("Bootstrap aborted")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.has_errors() {
        anyhow::bail!("Bootstrap finished with errors");
    }

    Ok(())
}

fn print_section<F>(title: &str, section: &SectionReport<F>, describe: impl Fn(&F) -> String) {
    ui::header(title);
    ui::kv("created", &section.created.to_string());
    ui::kv("updated", &section.updated.to_string());
    for failure in &section.errors {
        ui::error(&describe(failure));
    }
}

fn print_report(report: &BootstrapReport) {
    ui::info(&format!("Bootstrap initiated by '{}'", report.initiated_by));

    print_section("Permissions", &report.permissions, |f: &PermissionFailure| {
        format!("{}: {}", f.permission, f.error)
    });
    print_section("Roles", &report.roles, |f: &RoleFailure| {
        format!("{}: {}", f.role, f.error)
    });

    ui::header("Fallback admin");
    match &report.admin {
        AdminOutcome::Created {
            email,
            temporary_password,
            ..
        } => {
            ui::success(&format!("Created '{email}'"));
            ui::secret("Temporary password", temporary_password);
            ui::warning("The password must be changed at first sign-in.");
        }
        AdminOutcome::AlreadyPresent { email } => {
            ui::info(&format!("'{email}' already exists, left untouched"));
        }
        AdminOutcome::Failed { email, error } => {
            ui::error(&format!("Could not create '{email}': {error}"));
        }
    }
}
