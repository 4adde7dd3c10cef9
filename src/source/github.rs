// ABOUTME: GitHub App authentication: RS256 app JWTs and installation access tokens.
// ABOUTME: Tokens are used as the x-access-token clone credential.

use super::SourceError;
use crate::model::GithubApp;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// App JWTs are valid for this long.
pub const APP_JWT_TTL_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Sign a short-lived JWT identifying the app.
pub fn app_jwt(app: &GithubApp, now: i64) -> Result<String, SourceError> {
    let claims = AppClaims {
        iat: now,
        exp: now + APP_JWT_TTL_SECS,
        iss: app.app_id.clone(),
    };
    let key = EncodingKey::from_rsa_pem(app.private_key.as_bytes())?;
    Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    token: String,
}

/// Exchanges app JWTs for installation tokens.
#[derive(Clone)]
pub struct InstallationTokens {
    client: Client,
}

impl InstallationTokens {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("deckhand/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub async fn token(&self, app: &GithubApp, api_url: &str) -> Result<String, SourceError> {
        let jwt = app_jwt(app, Utc::now().timestamp())?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            api_url.trim_end_matches('/'),
            app.installation_id
        );
        tracing::debug!(%url, "Requesting installation token");

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", jwt))
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::TokenRejected { status, body });
        }

        let token: AccessToken = response.json().await?;
        Ok(token.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_private_key_is_rejected() {
        let app = GithubApp {
            app_id: "123".into(),
            installation_id: 1,
            private_key: "not a key".into(),
        };
        assert!(matches!(app_jwt(&app, 0), Err(SourceError::InvalidKey(_))));
    }

    #[test]
    fn claims_expire_after_sixty_seconds() {
        let claims = AppClaims {
            iat: 1_000,
            exp: 1_000 + APP_JWT_TTL_SECS,
            iss: "123".into(),
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["exp"], 1_060);
        assert_eq!(json["iss"], "123");
    }
}
