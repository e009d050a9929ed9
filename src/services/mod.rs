pub mod account_service;
pub mod auth_service;
pub mod blog_service;
pub mod cart_service;
pub mod catalog_service;
pub mod order_service;

use crate::error::{AppError, AppResult};

/// Trim a submitted form field, rejecting blanks and overlong values.
pub(crate) fn required_field(name: &str, value: &str, max_len: usize) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::validation(format!("{name} is required")));
    }
    if value.chars().count() > max_len {
        return Err(AppError::validation(format!(
            "{name} must be at most {max_len} characters"
        )));
    }
    Ok(value.to_string())
}

/// Like [`required_field`] but blank values are allowed and kept empty.
pub(crate) fn optional_field(name: &str, value: &str, max_len: usize) -> AppResult<String> {
    let value = value.trim();
    if value.chars().count() > max_len {
        return Err(AppError::validation(format!(
            "{name} must be at most {max_len} characters"
        )));
    }
    Ok(value.to_string())
}
