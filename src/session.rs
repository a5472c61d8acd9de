use crate::db::member::MemberRepository;
use crate::db::session::SessionRepository;
use crate::error::{AppError, AppResult};
use crate::models::{Member, Permissions};
use crate::AppState;
use axum::{extract::FromRequestParts, http::header::COOKIE, http::request::Parts, http::HeaderMap};
use cookie::{Cookie, SameSite};
use rand::{distributions::Alphanumeric, thread_rng, Rng as _};
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "k1000_session";
pub const OAUTH_STATE_COOKIE: &str = "k1000_oauth_state";

const OAUTH_STATE_MAX_AGE_SECS: i64 = 10 * 60;

/// Random alphanumeric session token.
pub fn new_token(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Value of the named cookie from the request's Cookie headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .into_iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value.to_owned()))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
}

fn build_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(max_age_secs))
        .build()
}

pub fn session_cookie(token: String, ttl: chrono::Duration, secure: bool) -> Cookie<'static> {
    build_cookie(SESSION_COOKIE, token, ttl.num_seconds(), secure)
}

pub fn oauth_state_cookie(state: String, secure: bool) -> Cookie<'static> {
    build_cookie(OAUTH_STATE_COOKIE, state, OAUTH_STATE_MAX_AGE_SECS, secure)
}

pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, "")).path("/").build();
    cookie.make_removal();
    cookie
}

/// The member behind the request's session cookie.
pub struct CurrentMember(pub Member);

impl CurrentMember {
    pub fn require(&self, needed: Permissions) -> AppResult<()> {
        if self.0.permissions().contains(needed) {
            Ok(())
        } else {
            tracing::warn!("{} denied: needs {:?}", self.0.email, needed);
            Err(AppError::Forbidden(needed.describe()))
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentMember {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = read_cookie(&parts.headers, SESSION_COOKIE).ok_or(AppError::Unauthorized)?;

        // Expired or revoked sessions resolve to nothing
        let session_repo = SessionRepository::new(state.db_pool.clone());
        let member_id = session_repo
            .member_id(&token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let member_repo = MemberRepository::new(state.db_pool.clone());
        let member = member_repo
            .get_by_id(member_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentMember(member))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use axum::http::HeaderValue;

    #[test]
    fn test_read_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; k1000_oauth_state=xyz"));
        headers.append(COOKIE, HeaderValue::from_static("k1000_session=abc123"));

        assert_eq!(read_cookie(&headers, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(read_cookie(&headers, OAUTH_STATE_COOKIE).as_deref(), Some("xyz"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok".into(), chrono::Duration::days(7), true).to_string();
        assert!(cookie.starts_with("k1000_session=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=604800"));
    }

    #[test]
    fn test_removal_cookie_expires() {
        let cookie = removal_cookie(SESSION_COOKIE).to_string();
        assert!(cookie.starts_with("k1000_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_new_token_shape() {
        let a = new_token(48);
        let b = new_token(48);
        assert_eq!(a.len(), 48);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_require_checks_role_permissions() {
        let mut member = Member::from_sign_in("Asha".into(), "asha@kiit.ac.in".into(), None);
        let current = CurrentMember(member.clone());
        assert!(current.require(Permissions::EDIT_PROFILE).is_ok());
        assert!(matches!(
            current.require(Permissions::MANAGE_MEMBERS),
            Err(AppError::Forbidden(_))
        ));

        member.role = Role::Admin;
        assert!(CurrentMember(member).require(Permissions::MANAGE_MEMBERS).is_ok());
    }
}
