//! Interactive sign-in.

use anyhow::Context as _;
use registrar_auth::Authenticator;

use super::Context;
use crate::ui;

/// Arguments for the login command.
pub struct LoginArgs {
    /// Account email.
    pub email: String,
    /// Password; prompted if absent.
    pub password: Option<String>,
}

/// Run the login command.
///
/// When the account still has a temporary password and the session is
/// interactive, a new password is requested straight away.
///
/// # Errors
///
/// Returns error if sign-in fails.
pub async fn run_login(ctx: &Context, args: LoginArgs) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let hashing = ctx.hashing_pool()?;
    let tokens = ctx.tokens()?;
    let auth = Authenticator::new(&store, &hashing, &tokens);

    let interactive = args.password.is_none();
    let password = match args.password {
        Some(password) => password,
        None => ui::prompts::password("Password")?,
    };

    let outcome = auth
        .login(&args.email, &password)
        .await
        .context("Login failed")?;

    ui::success(&format!(
        "Signed in as '{}' ({})",
        outcome.user.email, outcome.user.role
    ));

    if outcome.must_rotate_password {
        ui::warning("This account has a temporary password that must be changed.");

        if interactive {
            let new_password = ui::prompts::new_password("New password")?;
            auth.change_password(&outcome.user.id, &password, &new_password)
                .await
                .context("Failed to change password")?;
            ui::success("Password changed");
        }
    }

    ui::kv("expires", &outcome.token.expires_at.to_rfc3339());
    println!("{}", outcome.token.token);

    Ok(())
}
