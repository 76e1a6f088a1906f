//! Access check command.

use registrar_auth::AccessGate;

use super::{Context, find_user};
use crate::ui;

/// Arguments for the check command.
pub struct CheckArgs {
    /// Account email.
    pub email: String,
    /// Resource name.
    pub resource: String,
    /// Action name.
    pub action: String,
}

/// Run the check command.
///
/// # Errors
///
/// Returns error if the user is unknown or the action is denied.
pub async fn run_check(ctx: &Context, args: CheckArgs) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let user = find_user(&store, &args.email)?;
    let gate = AccessGate::new(&store);

    ui::kv("user", &user.email);
    ui::kv("role", &user.role);
    ui::kv("status", &user.status.to_string());

    let allowed = gate.can(&user, &args.resource, &args.action);
    ui::decision(allowed, &args.resource, &args.action);

    if allowed {
        Ok(())
    } else {
        anyhow::bail!("Access denied")
    }
}
