//! Bearer token extraction.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};

use super::verify_token;
use crate::AppState;

/// Caller that passed the bearer check.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The presented token, or "anonymous" when no secret is configured
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                let token = header.trim_start_matches("Bearer ").to_string();

                if token.is_empty() {
                    return Err((StatusCode::UNAUTHORIZED, "Empty bearer token"));
                }
                if !verify_token(&state.config, Some(&token)) {
                    return Err((StatusCode::UNAUTHORIZED, "Invalid bearer token"));
                }

                Ok(AuthUser { token })
            }
            Some(_) => Err((
                StatusCode::UNAUTHORIZED,
                "Invalid authorization header format",
            )),
            None => {
                if state.config.auth_secret.is_none() {
                    Ok(AuthUser {
                        token: "anonymous".to_string(),
                    })
                } else {
                    Err((StatusCode::UNAUTHORIZED, "Missing authorization header"))
                }
            }
        }
    }
}
