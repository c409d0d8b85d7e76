//! services/api/src/web/middleware.rs
//!
//! Session middleware. Resolves the session cookie into a `CurrentSession`
//! for every request; it never rejects; the core decides what needs an identity.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chapterhouse_core::domain::{SessionContext, WebSession};
use chrono::Duration;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

const SESSION_COOKIE: &str = "session";

/// The identity slots attached to the current request.
#[derive(Clone, Debug, Default)]
pub struct CurrentSession {
    /// Session row id, if the browser already has one.
    pub id: Option<String>,
    pub context: SessionContext,
}

impl CurrentSession {
    /// The signed-in account, if any.
    pub fn actor(&self) -> Option<Uuid> {
        self.context.authenticated_account_id
    }
}

/// Middleware that loads the browser session named by the cookie and inserts
/// it into request extensions for handlers to use.
pub async fn load_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut current = CurrentSession::default();

    if let Some(session_id) = session_cookie(req.headers()) {
        match state.db.load_web_session(&session_id).await {
            Ok(Some(stored)) => {
                current.context = stored.context_at(state.clock.now());
                current.id = Some(stored.id);
            }
            Ok(None) => {}
            Err(e) => error!("Failed to load session: {:?}", e),
        }
    }

    req.extensions_mut().insert(current);
    next.run(req).await
}

/// Parses the session id out of the `Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Writes the session's slots back to the store and returns the `Set-Cookie` value.
pub async fn persist_session(state: &AppState, session: &CurrentSession) -> Result<String, ApiError> {
    let now = state.clock.now();
    let ttl = Duration::days(state.config.session_ttl_days);
    let pending_ttl = Duration::minutes(state.config.pending_session_ttl_minutes);

    let stored = WebSession {
        id: session
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        pending_account_id: session.context.pending_account_id,
        pending_expires_at: session.context.pending_account_id.map(|_| now + pending_ttl),
        authenticated_account_id: session.context.authenticated_account_id,
        expires_at: now + ttl,
    };
    state.db.save_web_session(&stored).await?;

    Ok(format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        stored.id,
        ttl.num_seconds()
    ))
}

/// Deletes the stored row and forgets its id, so the next `persist_session`
/// issues a fresh one. Called when a session gains an identity.
pub async fn renew_session_id(state: &AppState, session: &mut CurrentSession) -> Result<(), ApiError> {
    if let Some(id) = session.id.take() {
        state.db.delete_web_session(&id).await?;
    }
    Ok(())
}

/// Drops the stored session and returns a cookie that clears it in the browser.
pub async fn discard_session(state: &AppState, session: &CurrentSession) -> Result<String, ApiError> {
    if let Some(id) = &session.id {
        state.db.delete_web_session(id).await?;
    }
    Ok(format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; lang=en"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn empty_or_missing_cookie_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_cookie(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(session_cookie(&headers), None);
    }
}
