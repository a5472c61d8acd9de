use openidconnect::{CsrfToken, Nonce, PkceCodeVerifier};
use serde::Deserialize;

/// Query string Google sends back to the redirect URL
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Secrets of one sign-in attempt, kept in the browser between the redirect
/// to Google and the callback.
pub struct AuthSession {
    pub csrf_token: CsrfToken,
    pub verifier: PkceCodeVerifier,
    pub nonce: Nonce,
}

impl AuthSession {
    /// `csrf.verifier.nonce`. All three are base64url, which never contains '.'.
    pub fn to_cookie_value(&self) -> String {
        format!(
            "{}.{}.{}",
            self.csrf_token.secret(),
            self.verifier.secret(),
            self.nonce.secret()
        )
    }

    pub fn from_cookie_value(value: &str) -> Option<Self> {
        let mut parts = value.split('.');
        let (csrf, verifier, nonce) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || [csrf, verifier, nonce].iter().any(|p| p.is_empty()) {
            return None;
        }

        Some(Self {
            csrf_token: CsrfToken::new(csrf.to_string()),
            verifier: PkceCodeVerifier::new(verifier.to_string()),
            nonce: Nonce::new(nonce.to_string()),
        })
    }

    /// Whether the callback's `state` belongs to this attempt.
    pub fn matches_state(&self, state: Option<&str>) -> bool {
        state == Some(self.csrf_token.secret().as_str())
    }
}

/// Identity claims taken from a verified ID token
#[derive(Debug, Clone)]
pub struct GoogleProfile {
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl GoogleProfile {
    /// Only verified addresses on the institutional domain may sign in.
    pub fn is_allowed(&self, domain: &str) -> bool {
        let email = self.email.to_lowercase();
        self.email_verified && email.ends_with(&format!("@{}", domain.to_lowercase()))
    }

    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.email.split('@').next().unwrap_or_default().to_string(),
        }
    }
}
