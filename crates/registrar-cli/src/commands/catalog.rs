//! Catalog inspection.

use anyhow::Context as _;
use registrar_auth::{AccessGate, RbacStore};

use super::Context;
use crate::ui;

/// Print the persisted permissions and roles.
///
/// # Errors
///
/// Returns error if the store cannot be read.
pub async fn run_catalog_show(ctx: &Context) -> anyhow::Result<()> {
    let store = ctx.open_store()?;

    let mut permissions = store
        .list_permissions()
        .context("Failed to list permissions")?;
    let mut roles = store.list_roles().context("Failed to list roles")?;

    if permissions.is_empty() && roles.is_empty() {
        ui::info("The catalog is empty. Run 'registrar seed' first.");
        return Ok(());
    }

    permissions.sort_by(|a, b| a.key.cmp(&b.key));
    roles.sort_by(|a, b| a.name.cmp(&b.name));

    ui::header(&format!("Permissions ({})", permissions.len()));
    for permission in &permissions {
        println!("  {:<28} {}", permission.key.to_string(), permission.description);
    }

    let gate = AccessGate::new(&store);
    ui::header(&format!("Roles ({})", roles.len()));
    for role in &roles {
        let system = if role.is_system_role { " [system]" } else { "" };
        println!();
        ui::kv(&role.name, &format!("{}{system}", role.description));

        let keys: Vec<String> = gate
            .permissions_for(&role.name)
            .with_context(|| format!("Failed to resolve role '{}'", role.name))?
            .iter()
            .map(|p| p.key.to_string())
            .collect();
        println!("    {}", keys.join(", "));
    }

    Ok(())
}
