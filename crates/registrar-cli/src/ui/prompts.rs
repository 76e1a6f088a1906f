//! Interactive prompt utilities.

use dialoguer::{Password, theme::ColorfulTheme};
use registrar_core::validation::validate_new_password;

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

/// Prompt for a password (hidden input).
pub fn password(prompt: &str) -> Result<String, dialoguer::Error> {
    Password::with_theme(&theme())
        .with_prompt(prompt)
        .interact()
}

/// Prompt for a new password, twice, re-asking until it is acceptable.
pub fn new_password(prompt: &str) -> Result<String, dialoguer::Error> {
    Password::with_theme(&theme())
        .with_prompt(prompt)
        .with_confirmation("Confirm password", "Passwords do not match")
        .validate_with(|input: &String| validate_new_password(input).map_err(|e| e.to_string()))
        .interact()
}
