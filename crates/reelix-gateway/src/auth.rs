//! Caller identity resolution for the SSE endpoint layer (§4.L, §6, §7).
//!
//! Real upstream authentication and user-identity resolution are out of
//! scope (§1 Non-goals) — by the time a request reaches the core the
//! `user_id` is already trusted. This module is the narrow stand-in that
//! plays that role for this deployment: it checks the configured bearer
//! token (when `AuthMode::Token`) and then reads the caller's resolved
//! identity off an `X-User-Id` header, which a real upstream gateway would
//! set after its own auth step.

use axum::http::HeaderMap;
use reelix_core::config::{AuthConfig, AuthMode};
use reelix_core::{ReelixError, UserId};

const USER_ID_HEADER: &str = "x-user-id";

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Validates the bearer token (when configured) and resolves the caller's
/// `UserId`. Returns `AuthMissing` for an absent credential and
/// `AuthInvalid` for a credential that doesn't match (§7).
pub fn resolve_caller(auth: &AuthConfig, headers: &HeaderMap) -> Result<UserId, ReelixError> {
    if auth.mode == AuthMode::Token {
        let token = extract_bearer(headers).ok_or(ReelixError::AuthMissing)?;
        let expected = auth.token.as_deref().ok_or(ReelixError::AuthInvalid)?;
        if token != expected {
            return Err(ReelixError::AuthInvalid);
        }
    }

    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ReelixError::AuthMissing)?;

    Ok(UserId::from(user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn token_config() -> AuthConfig {
        AuthConfig {
            mode: AuthMode::Token,
            token: Some("secret".to_string()),
        }
    }

    fn headers_with(auth: Option<&str>, user: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(auth) = auth {
            headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        }
        if let Some(user) = user {
            headers.insert("x-user-id", HeaderValue::from_str(user).unwrap());
        }
        headers
    }

    #[test]
    fn missing_bearer_is_auth_missing() {
        let headers = headers_with(None, Some("alice"));
        let err = resolve_caller(&token_config(), &headers).unwrap_err();
        assert_eq!(err.code(), "AUTH_MISSING");
    }

    #[test]
    fn wrong_bearer_is_auth_invalid() {
        let headers = headers_with(Some("Bearer wrong"), Some("alice"));
        let err = resolve_caller(&token_config(), &headers).unwrap_err();
        assert_eq!(err.code(), "AUTH_INVALID");
    }

    #[test]
    fn missing_user_id_is_auth_missing() {
        let headers = headers_with(Some("Bearer secret"), None);
        let err = resolve_caller(&token_config(), &headers).unwrap_err();
        assert_eq!(err.code(), "AUTH_MISSING");
    }

    #[test]
    fn valid_token_and_user_resolves() {
        let headers = headers_with(Some("Bearer secret"), Some("alice"));
        let user = resolve_caller(&token_config(), &headers).unwrap();
        assert_eq!(user, UserId::from("alice"));
    }

    #[test]
    fn none_mode_skips_token_check() {
        let config = AuthConfig {
            mode: AuthMode::None,
            token: None,
        };
        let headers = headers_with(None, Some("alice"));
        let user = resolve_caller(&config, &headers).unwrap();
        assert_eq!(user, UserId::from("alice"));
    }
}
