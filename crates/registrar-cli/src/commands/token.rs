//! Token commands.

use anyhow::Context as _;
use registrar_auth::{Identity, TokenService};

use super::{Context, find_user};
use crate::ui;

/// Token actions.
pub enum TokenAction {
    /// Issue a token for an existing user.
    Issue { email: String },
    /// Verify a token.
    Verify { token: String },
    /// Mint a signing secret.
    Secret,
}

/// Run a token command.
///
/// # Errors
///
/// Returns error if the user is unknown or inactive, or the token is invalid.
pub async fn run_token(ctx: &Context, action: TokenAction) -> anyhow::Result<()> {
    match action {
        TokenAction::Issue { email } => issue(ctx, &email),
        TokenAction::Verify { token } => verify(ctx, &token),
        TokenAction::Secret => {
            println!("{}", TokenService::generate_hex_secret());
            Ok(())
        }
    }
}

fn issue(ctx: &Context, email: &str) -> anyhow::Result<()> {
    let tokens = ctx.tokens()?;
    let store = ctx.open_store()?;
    let user = find_user(&store, email)?;

    if !user.is_active() {
        anyhow::bail!("User '{}' is {}", user.email, user.status);
    }

    let issued = tokens
        .issue(&Identity::from(&user))
        .context("Failed to issue token")?;

    ui::success(&format!("Token for '{}' ({})", user.email, user.role));
    ui::kv("expires", &issued.expires_at.to_rfc3339());
    println!("{}", issued.token);

    Ok(())
}

fn verify(ctx: &Context, token: &str) -> anyhow::Result<()> {
    let tokens = ctx.tokens()?;
    let token = TokenService::extract_from_header(token).unwrap_or(token);
    let claims = tokens.verify(token).context("Token rejected")?;

    ui::success("Token is valid");
    ui::kv("sub", claims.sub.as_str());
    ui::kv("email", &claims.email);
    ui::kv("role", &claims.role);
    ui::kv("iat", &claims.iat.to_string());
    ui::kv("exp", &claims.exp.to_string());

    Ok(())
}
