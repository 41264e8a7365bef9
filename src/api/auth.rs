//! HTTP Basic authentication for the `/api/v1` routes.
//!
//! Applies to WebSocket upgrades too: a rejected request is answered with
//! 401 before the upgrade, so it never reaches the subscriber registry.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use base64::prelude::*;

use crate::app_state::AppState;
use crate::config::BasicAuth;
use crate::error::GatewayError;

/// Checks the `Authorization` header against the configured credentials.
///
/// Passes every request through when no credentials are configured.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] when the header is missing,
/// malformed or carries the wrong credentials.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    if let Some(expected) = state.config.basic_auth.as_ref() {
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        verify(header, expected)?;
    }
    Ok(next.run(request).await)
}

/// Validates a raw `Authorization` header value.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] with the reason for rejection.
pub fn verify(header: Option<&str>, expected: &BasicAuth) -> Result<(), GatewayError> {
    let header = header.ok_or_else(|| unauthorized("no auth given"))?;
    let (username, password) = parse_basic_auth_header(header)?;
    if username == expected.username && password == expected.password {
        Ok(())
    } else {
        Err(unauthorized("invalid username/password"))
    }
}

/// Splits `Basic <base64(user:pass)>` into user name and password.
///
/// Everything after the first `:` is the password.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] for other schemes or an
/// undecodable token.
pub fn parse_basic_auth_header(header: &str) -> Result<(String, String), GatewayError> {
    let (scheme, token) = header.trim().split_once(' ').unwrap_or((header.trim(), ""));
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(unauthorized("invalid authentication method"));
    }

    let decoded = BASE64_STANDARD
        .decode(token.trim().as_bytes())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| unauthorized("invalid token"))?;
    // A token without a colon is a user name with an empty password.
    let (username, password) = decoded.split_once(':').unwrap_or((decoded.as_str(), ""));

    Ok((username.to_string(), password.to_string()))
}

fn unauthorized(reason: &str) -> GatewayError {
    GatewayError::Unauthorized(reason.to_string())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn credentials() -> BasicAuth {
        BasicAuth {
            username: "admin".to_string(),
            password: "s3cret:with:colons".to_string(),
        }
    }

    fn header(user_pass: &str) -> String {
        format!("Basic {}", BASE64_STANDARD.encode(user_pass))
    }

    fn reason(result: Result<(), GatewayError>) -> String {
        let Err(GatewayError::Unauthorized(reason)) = result else {
            panic!("expected unauthorized");
        };
        reason
    }

    #[test]
    fn accepts_matching_credentials() {
        let value = header("admin:s3cret:with:colons");
        assert!(verify(Some(&value), &credentials()).is_ok());
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let value = header("admin:s3cret:with:colons").replacen("Basic", "basic", 1);
        assert!(verify(Some(&value), &credentials()).is_ok());
    }

    #[test]
    fn missing_header() {
        assert_eq!(reason(verify(None, &credentials())), "no auth given");
    }

    #[test]
    fn wrong_scheme() {
        assert_eq!(
            reason(verify(Some("Bearer abc"), &credentials())),
            "invalid authentication method"
        );
    }

    #[test]
    fn undecodable_token() {
        assert_eq!(
            reason(verify(Some("Basic !!!not-base64"), &credentials())),
            "invalid token"
        );
    }

    #[test]
    fn token_without_colon_is_user_with_empty_password() {
        let Ok((username, password)) = parse_basic_auth_header(&header("admin")) else {
            panic!("token should parse");
        };
        assert_eq!(username, "admin");
        assert_eq!(password, "");

        let no_colon = header("admin");
        assert_eq!(
            reason(verify(Some(&no_colon), &credentials())),
            "invalid username/password"
        );
        let open = BasicAuth {
            username: "admin".to_string(),
            password: String::new(),
        };
        assert!(verify(Some(&no_colon), &open).is_ok());
    }

    #[test]
    fn wrong_password() {
        let value = header("admin:guess");
        assert_eq!(
            reason(verify(Some(&value), &credentials())),
            "invalid username/password"
        );
    }
}
