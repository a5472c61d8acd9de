use super::types::{AuthSession, GoogleProfile};
use anyhow::{Context, Result};
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::reqwest::async_http_client;
use openidconnect::{
    AccessTokenHash, AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce,
    OAuth2TokenResponse as _, PkceCodeChallenge, RedirectUrl, Scope, TokenResponse as _,
};
use reqwest::Url;
use tokio::sync::OnceCell;

const GOOGLE_ISSUER: &str = "https://accounts.google.com";

/// Google sign-in over OpenID Connect. The provider metadata and signing
/// keys are discovered on first use.
pub struct GoogleClient {
    oidc: OnceCell<CoreClient>,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    hosted_domain: String,
}

impl GoogleClient {
    pub fn new(client_id: String, client_secret: String, redirect_url: String, hosted_domain: String) -> Self {
        Self {
            oidc: OnceCell::new(),
            client_id,
            client_secret,
            redirect_url,
            hosted_domain,
        }
    }

    async fn oidc(&self) -> Result<&CoreClient> {
        self.oidc
            .get_or_try_init(|| async {
                let issuer = IssuerUrl::new(GOOGLE_ISSUER.to_string())?;
                let metadata = CoreProviderMetadata::discover_async(issuer, async_http_client)
                    .await
                    .context("Failed to discover Google OpenID configuration")?;
                tracing::info!("Loaded Google OpenID configuration");

                let client = CoreClient::from_provider_metadata(
                    metadata,
                    ClientId::new(self.client_id.clone()),
                    Some(ClientSecret::new(self.client_secret.clone())),
                )
                .set_redirect_uri(
                    RedirectUrl::new(self.redirect_url.clone()).context("Invalid OAuth redirect URL")?,
                );
                Ok::<_, anyhow::Error>(client)
            })
            .await
    }

    /// URL to send the browser to, and the secrets the callback must present
    pub async fn begin_authentication(&self) -> Result<(Url, AuthSession)> {
        let client = self.oidc().await?;
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();

        let (url, csrf_token, nonce) = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .add_extra_param("hd", self.hosted_domain.as_str())
            .add_extra_param("prompt", "select_account")
            .set_pkce_challenge(challenge)
            .url();

        Ok((url, AuthSession { csrf_token, verifier, nonce }))
    }

    /// Redeem the authorization code and read the verified ID token's claims.
    /// The caller has already matched the callback state against `session`.
    pub async fn finish_authentication(&self, code: String, session: AuthSession) -> Result<GoogleProfile> {
        let client = self.oidc().await?;

        let token_response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(session.verifier)
            .request_async(async_http_client)
            .await
            .context("Failed to exchange authorization code")?;

        // Signature, audience, expiry and nonce
        let id_token = token_response
            .id_token()
            .context("Google returned no ID token")?;
        let claims = id_token
            .claims(&client.id_token_verifier(), &session.nonce)
            .context("ID token failed verification")?;

        // The access token must be the one this ID token was issued with
        if let Some(expected) = claims.access_token_hash() {
            let algorithm = id_token.signing_alg().context("Unsupported ID token algorithm")?;
            let actual = AccessTokenHash::from_token(token_response.access_token(), &algorithm)
                .context("Failed to hash access token")?;
            if actual != *expected {
                anyhow::bail!("Access token does not match the ID token");
            }
        }

        let email = claims.email().context("ID token has no email claim")?;
        Ok(GoogleProfile {
            email: email.as_str().to_string(),
            email_verified: claims.email_verified().unwrap_or(false),
            name: claims.name().and_then(|n| n.get(None)).map(|n| n.as_str().to_string()),
            picture: claims.picture().and_then(|p| p.get(None)).map(|p| p.as_str().to_string()),
        })
    }
}
