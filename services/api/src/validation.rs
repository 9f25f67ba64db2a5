//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

use crate::messages;

/// Longest accepted name, username or email
pub const MAX_FIELD_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Validate email format
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.chars().count() > MAX_FIELD_LEN {
        return Err(format!("Email must be at most {} characters long", MAX_FIELD_LEN));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err(messages::INVALID_EMAIL.to_string());
    }

    Ok(())
}

/// Validate password length
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        ));
    }

    if len > MAX_PASSWORD_LEN {
        return Err(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LEN
        ));
    }

    Ok(())
}

/// Validate a required free-text field such as a name
pub fn validate_name(field: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} is required", field));
    }

    if value.chars().count() > MAX_FIELD_LEN {
        return Err(format!(
            "{} must be at most {} characters long",
            field, MAX_FIELD_LEN
        ));
    }

    Ok(())
}

/// Validate a complete registration
pub fn validate_registration(
    email: &str,
    password: &str,
    username: &str,
    firstname: &str,
    lastname: &str,
) -> Result<(), String> {
    if email.is_empty() || password.is_empty() {
        return Err(messages::REQUIRED_FIELDS.to_string());
    }

    validate_email(email)?;
    validate_password(password)?;
    validate_name("username", username)?;
    validate_name("firstname", firstname)?;
    validate_name("lastname", lastname)?;

    Ok(())
}
