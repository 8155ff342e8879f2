//! Password input for encrypted archives

use crate::crypto::{PasswordStrength, SecureString};
use crate::error::{MineralogError, MineralogResult};

/// Environment variable consulted before prompting
pub const PASSWORD_ENV: &str = "MINERALOG_PASSWORD";

/// Minimum length accepted for a new archive password
pub const MIN_PASSWORD_LEN: usize = 8;

fn password_from_env() -> Option<SecureString> {
    std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecureString::new)
}

fn prompt(label: &str) -> MineralogResult<SecureString> {
    rpassword::prompt_password(label)
        .map(SecureString::new)
        .map_err(|e| MineralogError::Io(format!("Failed to read password: {}", e)))
}

/// Password for opening an existing archive
pub fn read_password() -> MineralogResult<SecureString> {
    if let Some(password) = password_from_env() {
        return Ok(password);
    }

    let password = prompt("Archive password: ")?;
    if password.is_empty() {
        return Err(MineralogError::InvalidInput("Password cannot be empty".into()));
    }
    Ok(password)
}

/// Password for a new encrypted archive
///
/// From the environment it is taken as is; at the prompt it must be entered
/// twice and be at least [`MIN_PASSWORD_LEN`] characters.
pub fn read_new_password() -> MineralogResult<SecureString> {
    if let Some(password) = password_from_env() {
        hint_strength(&password);
        return Ok(password);
    }

    loop {
        let password = prompt("New archive password: ")?;
        if password.len() < MIN_PASSWORD_LEN {
            eprintln!(
                "Password must be at least {} characters. Please try again.",
                MIN_PASSWORD_LEN
            );
            continue;
        }

        let confirm = prompt("Confirm password: ")?;
        if password.as_str() != confirm.as_str() {
            eprintln!("Passwords do not match. Please try again.");
            continue;
        }

        hint_strength(&password);
        return Ok(password);
    }
}

fn hint_strength(password: &SecureString) {
    let strength = PasswordStrength::assess(password.as_str());
    if strength <= PasswordStrength::Fair {
        eprintln!(
            "Warning: password strength is {}. Longer passwords mixing letters, digits and symbols are harder to guess.",
            strength
        );
    }
}
