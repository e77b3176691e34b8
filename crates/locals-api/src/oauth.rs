//! OAuth identity verification.
//!
//! Token exchange happens in the browser; the backend only verifies the token
//! it is handed and reads the email address out of it.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use locals_types::models::AuthProvider;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const META_ME_URL: &str = "https://graph.facebook.com/me";
const APPLE_KEYS_URL: &str = "https://appleid.apple.com/auth/keys";
const APPLE_ISSUER: &str = "https://appleid.apple.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("{0}")]
    Rejected(String),

    #[error("{0} sign-in is not supported here")]
    Unsupported(AuthProvider),

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[async_trait]
pub trait OAuthVerifier: Send + Sync {
    async fn verify(&self, provider: AuthProvider, token: &str) -> Result<VerifiedIdentity, OAuthError>;
}

/// Verifies tokens against the providers' public endpoints.
pub struct HttpOAuthVerifier {
    client: reqwest::Client,
    google_client_id: Option<String>,
    apple_client_id: Option<String>,
}

impl HttpOAuthVerifier {
    pub fn new(google_client_id: Option<String>, apple_client_id: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            google_client_id,
            apple_client_id,
        }
    }

    async fn verify_google(&self, id_token: &str) -> Result<VerifiedIdentity, OAuthError> {
        #[derive(Deserialize)]
        struct TokenInfo {
            aud: String,
            email: Option<String>,
            email_verified: Option<String>,
            given_name: Option<String>,
            family_name: Option<String>,
        }

        let resp = self
            .client
            .get(GOOGLE_TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(OAuthError::Rejected(format!("Google returned {}", resp.status())));
        }
        let info: TokenInfo = resp.json().await?;

        if let Some(expected) = &self.google_client_id {
            if &info.aud != expected {
                return Err(OAuthError::Rejected("Google token issued for another client".into()));
            }
        }
        if info.email_verified.as_deref() != Some("true") {
            return Err(OAuthError::Rejected("Google email is not verified".into()));
        }

        Ok(VerifiedIdentity {
            email: info.email.ok_or_else(|| OAuthError::Rejected("Google token has no email".into()))?,
            first_name: info.given_name,
            last_name: info.family_name,
        })
    }

    async fn verify_meta(&self, access_token: &str) -> Result<VerifiedIdentity, OAuthError> {
        #[derive(Deserialize)]
        struct Me {
            email: Option<String>,
            first_name: Option<String>,
            last_name: Option<String>,
        }

        let resp = self
            .client
            .get(META_ME_URL)
            .query(&[("fields", "email,first_name,last_name"), ("access_token", access_token)])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(OAuthError::Rejected(format!("Meta returned {}", resp.status())));
        }
        let me: Me = resp.json().await?;

        Ok(VerifiedIdentity {
            email: me
                .email
                .ok_or_else(|| OAuthError::Rejected("Meta account did not share an email".into()))?,
            first_name: me.first_name,
            last_name: me.last_name,
        })
    }

    async fn verify_apple(&self, id_token: &str) -> Result<VerifiedIdentity, OAuthError> {
        #[derive(Deserialize)]
        struct AppleClaims {
            email: Option<String>,
        }

        let header = decode_header(id_token)?;
        let kid = header
            .kid
            .ok_or_else(|| OAuthError::Rejected("Apple token has no key id".into()))?;

        let keys: JwkSet = self.client.get(APPLE_KEYS_URL).send().await?.error_for_status()?.json().await?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| OAuthError::Rejected(format!("Unknown Apple signing key {kid}")))?;
        let key = DecodingKey::from_jwk(jwk)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[APPLE_ISSUER]);
        match &self.apple_client_id {
            Some(client_id) => validation.set_audience(&[client_id]),
            None => validation.validate_aud = false,
        }

        let claims = decode::<AppleClaims>(id_token, &key, &validation)?.claims;
        Ok(VerifiedIdentity {
            email: claims
                .email
                .ok_or_else(|| OAuthError::Rejected("Apple token has no email".into()))?,
            first_name: None,
            last_name: None,
        })
    }
}

#[async_trait]
impl OAuthVerifier for HttpOAuthVerifier {
    async fn verify(&self, provider: AuthProvider, token: &str) -> Result<VerifiedIdentity, OAuthError> {
        debug!("Verifying {} token", provider);
        match provider {
            AuthProvider::Google => self.verify_google(token).await,
            AuthProvider::Meta => self.verify_meta(token).await,
            AuthProvider::Apple => self.verify_apple(token).await,
            AuthProvider::Local => Err(OAuthError::Unsupported(provider)),
        }
    }
}
