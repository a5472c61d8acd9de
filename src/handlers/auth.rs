use crate::db::member::MemberRepository;
use crate::db::session::SessionRepository;
use crate::error::AppResult;
use crate::extract::Json;
use crate::google::{AuthSession, CallbackParams};
use crate::models::Role;
use crate::session::{self, OAUTH_STATE_COOKIE, SESSION_COOKIE};
use crate::AppState;
use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

const SIGNED_IN_REDIRECT: &str = "/sign-in?callback=authenticated";
const UNAUTHORIZED_REDIRECT: &str = "/sign-in?callback=unauthorized";
const ERROR_REDIRECT: &str = "/sign-in?callback=error";

const SESSION_TOKEN_LEN: usize = 48;

/// Start Google sign-in
pub async fn google_sign_in(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    // State, PKCE verifier and nonce ride along in a short-lived cookie
    let (url, auth_session) = state.google.begin_authentication().await?;
    let cookie = session::oauth_state_cookie(auth_session.to_cookie_value(), state.config.secure_cookies);

    Ok((AppendHeaders([(SET_COOKIE, cookie.to_string())]), Redirect::to(url.as_str())).into_response())
}

enum SignIn {
    Accepted(String),
    Rejected(&'static str),
}

/// Finish Google sign-in and issue a session
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    let clear_state = session::removal_cookie(OAUTH_STATE_COOKIE).to_string();

    match complete_sign_in(&state, params, &headers).await {
        Ok(SignIn::Accepted(token)) => {
            let cookie = session::session_cookie(token, state.config.session_ttl, state.config.secure_cookies);
            (
                AppendHeaders([(SET_COOKIE, clear_state), (SET_COOKIE, cookie.to_string())]),
                Redirect::to(SIGNED_IN_REDIRECT),
            )
                .into_response()
        }
        Ok(SignIn::Rejected(reason)) => {
            tracing::warn!("Sign-in rejected: {}", reason);
            (AppendHeaders([(SET_COOKIE, clear_state)]), Redirect::to(UNAUTHORIZED_REDIRECT)).into_response()
        }
        Err(e) => {
            tracing::error!("Sign-in failed: {:#}", e);
            (AppendHeaders([(SET_COOKIE, clear_state)]), Redirect::to(ERROR_REDIRECT)).into_response()
        }
    }
}

async fn complete_sign_in(state: &AppState, params: CallbackParams, headers: &HeaderMap) -> anyhow::Result<SignIn> {
    if let Some(error) = params.error {
        tracing::info!("Google returned an error: {}", error);
        return Ok(SignIn::Rejected("provider error"));
    }

    // The callback must come back to the browser that started it
    let Some(auth_session) = session::read_cookie(headers, OAUTH_STATE_COOKIE)
        .as_deref()
        .and_then(AuthSession::from_cookie_value)
    else {
        return Ok(SignIn::Rejected("missing sign-in state"));
    };
    if !auth_session.matches_state(params.state.as_deref()) {
        return Ok(SignIn::Rejected("state mismatch"));
    }
    let Some(code) = params.code else {
        return Ok(SignIn::Rejected("missing code"));
    };

    // Code exchange plus ID token verification
    let profile = state.google.finish_authentication(code, auth_session).await?;

    // Domain restriction
    if !profile.is_allowed(&state.config.allowed_email_domain) {
        tracing::info!("Refusing sign-in for {}", profile.email);
        return Ok(SignIn::Rejected("email outside the allowed domain"));
    }

    // First sign-in creates the member
    let member_repo = MemberRepository::new(state.db_pool.clone());
    let (member, created) = member_repo
        .get_or_create(profile.display_name(), profile.email.clone(), profile.picture.clone())
        .await
        .context("Failed to load member")?;

    if created {
        tracing::info!("Created member {} on first sign-in", member.email);
        state.directory.invalidate().await;
    }

    // Bootstrap admins are promoted whenever they sign in
    if member.role != Role::Admin && state.admins.contains(&member.email) {
        member_repo
            .set_role(&member.email, Role::Admin)
            .await
            .context("Failed to promote admin")?;
        state.directory.invalidate().await;
        tracing::info!("Promoted {} to admin", member.email);
    }

    let session_token = session::new_token(SESSION_TOKEN_LEN);
    SessionRepository::new(state.db_pool.clone())
        .create(&session_token, member.id, Utc::now() + state.config.session_ttl)
        .await
        .context("Failed to store session")?;

    tracing::info!("{} signed in", member.email);
    Ok(SignIn::Accepted(session_token))
}

/// End the current session
pub async fn sign_out(State(state): State<Arc<AppState>>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = session::read_cookie(&headers, SESSION_COOKIE) {
        SessionRepository::new(state.db_pool.clone()).delete(&token).await?;
    }
    let cookie = session::removal_cookie(SESSION_COOKIE);

    Ok((
        AppendHeaders([(SET_COOKIE, cookie.to_string())]),
        Json(json!({ "success": true })),
    )
        .into_response())
}
