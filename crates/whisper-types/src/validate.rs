//! Input checks shared by the server handlers and the client, so a bad
//! draft is rejected before it ever leaves the caller.

use thiserror::Error;

/// Maximum whisper length, counted in characters rather than bytes.
pub const MAX_WHISPER_CHARS: usize = 1000;

pub const MAX_COMMENT_CHARS: usize = 1000;

pub const MIN_PASSWORD_LEN: usize = 8;

pub const MAX_FULL_NAME_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is {len} characters, the limit is {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    PasswordTooShort,

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
}

fn check_text(field: &'static str, text: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }

    let len = trimmed.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, len, max });
    }

    Ok(trimmed.to_string())
}

/// Returns the trimmed content if it is a postable whisper.
pub fn whisper_content(content: &str) -> Result<String, ValidationError> {
    check_text("content", content, MAX_WHISPER_CHARS)
}

pub fn comment_content(content: &str) -> Result<String, ValidationError> {
    check_text("comment", content, MAX_COMMENT_CHARS)
}

/// Search terms are stored trimmed; whitespace-only terms are never stored.
pub fn search_term(term: &str) -> Result<String, ValidationError> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field: "search_term" });
    }
    Ok(trimmed.to_string())
}

pub fn full_name(name: &str) -> Result<String, ValidationError> {
    check_text("full_name", name, MAX_FULL_NAME_CHARS)
}

pub fn email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(ValidationError::InvalidEmail(email))
    }
}

pub fn password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}
