//! User management commands.

use anyhow::Context as _;
use registrar_auth::{NewUser, PersonalInfo, RbacStore, SledStore, User, generate_password};
use registrar_core::UserStatus;

use super::{Context, find_user};
use crate::ui;

/// Length of generated passwords.
const GENERATED_PASSWORD_LENGTH: usize = 16;

/// User actions.
pub enum UserAction {
    /// Create a new user.
    Create {
        email: String,
        role: String,
        first_name: String,
        last_name: String,
        password: Option<String>,
        generate_password: bool,
    },
    /// List all users.
    List,
    /// Change a user's status.
    Status { email: String, status: UserStatus },
    /// Set a user's password.
    Passwd { email: String, generate: bool },
}

/// Run a user command.
///
/// # Errors
///
/// Returns error if the operation fails.
pub async fn run_user(ctx: &Context, action: UserAction) -> anyhow::Result<()> {
    let store = ctx.open_store()?;

    match action {
        UserAction::Create {
            email,
            role,
            first_name,
            last_name,
            password,
            generate_password,
        } => create_user(
            ctx,
            &store,
            NewUser::new(email, role, PersonalInfo::new(first_name, last_name)),
            password,
            generate_password,
        ),
        UserAction::List => list_users(&store),
        UserAction::Status { email, status } => set_status(&store, &email, status),
        UserAction::Passwd { email, generate } => set_password(ctx, &store, &email, generate),
    }
}

fn create_user(
    ctx: &Context,
    store: &SledStore,
    mut new: NewUser,
    password: Option<String>,
    gen_pwd: bool,
) -> anyhow::Result<()> {
    let password = if gen_pwd {
        new = new.with_rotation_required();
        generate_password(GENERATED_PASSWORD_LENGTH)
    } else if let Some(password) = password {
        password
    } else {
        ui::prompts::new_password("Password")?
    };

    let credentials = ctx.credentials()?;
    let user = User::create(new, &password, &credentials).context("Failed to create user")?;

    if store.find_role(&user.role)?.is_none() {
        ui::warning(&format!(
            "Role '{}' does not exist; this user will be denied everything until it is seeded",
            user.role
        ));
    }

    store.insert_user(&user).context("Failed to save user")?;

    ui::success(&format!(
        "Created user '{}' with role '{}'",
        user.email, user.role
    ));
    if gen_pwd {
        ui::secret("Generated password", &password);
    }

    Ok(())
}

fn list_users(store: &SledStore) -> anyhow::Result<()> {
    let mut users = store.list_users().context("Failed to list users")?;

    if users.is_empty() {
        ui::info("No users configured.");
        ui::info("Run 'registrar seed' to create the fallback admin.");
        return Ok(());
    }

    users.sort_by(|a, b| a.email.cmp(&b.email));

    ui::info(&format!("Users ({}):", users.len()));
    println!();
    println!(
        "{:<32} {:<14} {:<10} {:<20}",
        "EMAIL", "ROLE", "STATUS", "LAST LOGIN"
    );
    println!("{}", "-".repeat(78));

    for user in users {
        let last_login = user.last_login.map_or_else(
            || "never".to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        let rotate = if user.must_rotate_password { " *" } else { "" };
        println!(
            "{:<32} {:<14} {:<10} {:<20}{rotate}",
            user.email,
            user.role,
            user.status.to_string(),
            last_login
        );
    }

    Ok(())
}

fn set_status(store: &SledStore, email: &str, status: UserStatus) -> anyhow::Result<()> {
    let mut user = find_user(store, email)?;
    user.status = status;
    store.update_user(&user).context("Failed to update user")?;

    ui::success(&format!("User '{}' is now {status}", user.email));
    Ok(())
}

fn set_password(ctx: &Context, store: &SledStore, email: &str, generate: bool) -> anyhow::Result<()> {
    let mut user = find_user(store, email)?;
    let credentials = ctx.credentials()?;

    if generate {
        let password = generate_password(GENERATED_PASSWORD_LENGTH);
        user.set_password(&password, &credentials)
            .context("Failed to set password")?;
        user.must_rotate_password = true;
        store.update_user(&user).context("Failed to update user")?;

        ui::success(&format!("Password reset for '{}'", user.email));
        ui::secret("Temporary password", &password);
    } else {
        let password = ui::prompts::new_password("New password")?;
        user.set_password(&password, &credentials)
            .context("Failed to set password")?;
        store.update_user(&user).context("Failed to update user")?;

        ui::success(&format!("Password changed for '{}'", user.email));
    }

    Ok(())
}
