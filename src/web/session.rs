//! Cookie-based session ids
//!
//! Each browser gets a `gondola_session` cookie holding a UUIDv4. The
//! cookie is the only session state; every handler partitions the
//! conversation log by its value.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "gondola_session";

/// A request's session id, minted fresh when the cookie is absent.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    minted: bool,
}

impl Session {
    /// Read the session cookie, or mint a new id.
    pub fn extract(headers: &HeaderMap) -> Self {
        if let Some(id) = cookie_value(headers, SESSION_COOKIE) {
            return Self { id, minted: false };
        }
        Self {
            id: Uuid::new_v4().to_string(),
            minted: true,
        }
    }

    /// Set the cookie on a response that minted a new id. Responses for
    /// requests that already carried the cookie are left untouched.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if !self.minted {
            return;
        }
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, self.id
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            headers.append(SET_COOKIE, value);
        }
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}
