//! Shared-secret authentication for HTTP and WebSocket clients.

mod middleware;

pub use middleware::AuthUser;

use crate::config::Config;

/// Check a presented token against the configured secret.
///
/// Without a secret every client is accepted.
pub fn verify_token(config: &Config, token: Option<&str>) -> bool {
    match config.auth_secret.as_deref() {
        None => true,
        Some(secret) => token.is_some_and(|token| constant_time_eq(token.as_bytes(), secret.as_bytes())),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
