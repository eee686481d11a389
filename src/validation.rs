//! Validation of inbound values before they reach the backend.
//!
//! The wildcard part of a proxied route is appended to a backend endpoint
//! prefix, so it must not be able to escape that prefix or smuggle
//! characters the backend would interpret differently.

use crate::error::{AppError, AppResult};

// =============================================================================
// Validation Constants
// =============================================================================

/// Maximum length of the forwarded path remainder, in bytes.
pub const MAX_FORWARD_PATH_LENGTH: usize = 1024;

/// Maximum number of query parameters forwarded on a GET.
pub const MAX_QUERY_PARAMS: usize = 64;

/// Validate the path remainder captured by a proxied route.
///
/// `rest` is what follows the route prefix, without its leading `/`
/// (e.g. `users/me/vehicles/42`). Rules:
/// - At most [`MAX_FORWARD_PATH_LENGTH`] bytes
/// - No empty segments (`a//b`) and no trailing slash
/// - No `.` or `..` segments
/// - No backslashes, control characters, `?` or `#`
pub fn validate_forward_path(rest: &str) -> AppResult<()> {
    if rest.len() > MAX_FORWARD_PATH_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Path cannot exceed {MAX_FORWARD_PATH_LENGTH} characters (got {})",
            rest.len()
        )));
    }

    if let Some(pos) = rest
        .chars()
        .position(|c| c.is_control() || matches!(c, '\\' | '?' | '#'))
    {
        return Err(AppError::BadRequest(format!(
            "Path contains invalid character at position {pos}"
        )));
    }

    for segment in rest.split('/') {
        match segment {
            "" => {
                return Err(AppError::BadRequest(
                    "Path cannot contain empty segments".to_string(),
                ));
            }
            "." | ".." => {
                return Err(AppError::BadRequest(
                    "Path cannot contain relative segments".to_string(),
                ));
            }
            _ => {}
        }
    }

    Ok(())
}

/// Validate the number of forwarded query parameters.
pub fn validate_query_len(count: usize) -> AppResult<()> {
    if count > MAX_QUERY_PARAMS {
        return Err(AppError::BadRequest(format!(
            "Too many query parameters (max {MAX_QUERY_PARAMS}, got {count})"
        )));
    }
    Ok(())
}
