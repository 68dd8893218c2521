use axum::http::HeaderMap;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

const INTERNAL_KEY_HEADER: &str = "x-internal-api-key";

/// Guard for the admin surface: compares the `x-internal-api-key` header
/// against the configured shared secret.
pub fn require_internal_key(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let Some(expected) = state.config.internal_api_key.as_deref() else {
        return Err(AppError::Dependency(
            "Admin endpoints are disabled. Set INTERNAL_API_KEY to enable them.".to_string(),
        ));
    };

    let presented = headers
        .get(INTERNAL_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    if presented.is_empty() {
        return Err(AppError::Unauthorized(
            "Missing x-internal-api-key header.".to_string(),
        ));
    }
    if presented != expected {
        return Err(AppError::Forbidden("Invalid internal API key.".to_string()));
    }
    Ok(())
}
