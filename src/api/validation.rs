//! Input validation for form submissions.
//!
//! Each validator returns `Ok(())` or a message suitable for showing next to
//! the field. Collect several of them with
//! [`ValidationErrors`](crate::error::ValidationErrors) to reject a form
//! before anything is sent.

use lazy_static::lazy_static;
use regex::Regex;

/// Shortest password the backend accepts
pub const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    /// Something@something, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+$").unwrap();

    /// Phone numbers: optional leading +, digits with common separators
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9(][0-9 ().-]{5,}$").unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a password (length only; content is the backend's business)
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }

    Ok(())
}

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }

    Ok(())
}

/// Validate an organization name
pub fn validate_org_name(name: &str) -> Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Organization name is required".to_string());
    }

    if name.len() > 100 {
        return Err("Organization name is too long (max 100 characters)".to_string());
    }

    Ok(())
}

/// Validate a message recipient (phone number)
pub fn validate_recipient(recipient: &str) -> Result<(), String> {
    let recipient = recipient.trim();
    if recipient.is_empty() {
        return Err("Recipient is required".to_string());
    }

    if !PHONE_REGEX.is_match(recipient) {
        return Err("Recipient must be a phone number".to_string());
    }

    Ok(())
}

/// Validate message text
pub fn validate_message_text(text: &str) -> Result<(), String> {
    if text.trim().is_empty() {
        return Err("Message is required".to_string());
    }

    if text.chars().count() > 4096 {
        return Err("Message is too long (max 4096 characters)".to_string());
    }

    Ok(())
}

/// Validate an invite token
pub fn validate_invite_token(token: &str) -> Result<(), String> {
    let token = token.trim();
    if token.is_empty() {
        return Err("Invite token is required".to_string());
    }

    if token.chars().any(char::is_whitespace) {
        return Err("Invite token must not contain whitespace".to_string());
    }

    Ok(())
}
