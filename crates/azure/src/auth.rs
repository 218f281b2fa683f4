use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Credentials;
use crate::error::{AzureError, Result};

const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
/// Tokens are refreshed this long before they expire.
const EXPIRY_SLACK: Duration = Duration::from_secs(120);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

/// Hands out bearer tokens, fetching and caching them for service principals.
pub struct TokenProvider {
    credentials: Credentials,
    authority: String,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials, authority: impl Into<String>) -> Self {
        Self { credentials, authority: authority.into(), cache: Mutex::new(None) }
    }

    pub async fn token(&self, http: &reqwest::Client) -> Result<SecretString> {
        let (tenant, client_id, secret) = match &self.credentials {
            Credentials::AccessToken(t) => return Ok(t.clone()),
            Credentials::ServicePrincipal { tenant, client_id, secret } => (tenant, client_id, secret),
        };
        let mut cache = self.cache.lock().await;
        if let Some(c) = cache.as_ref() {
            if c.expires_at > Instant::now() + EXPIRY_SLACK {
                return Ok(c.token.clone());
            }
        }
        let url = format!("{}/{}/oauth2/v2.0/token", self.authority, tenant);
        debug!(%url, client_id = %client_id, "requesting management token");
        let resp = http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", secret.expose_secret().as_str()),
                ("scope", MANAGEMENT_SCOPE),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AzureError::Auth(format!("token endpoint returned {}: {}", status, body.trim())));
        }
        let parsed: TokenResponse = resp.json().await.map_err(|e| AzureError::Auth(e.to_string()))?;
        let token = SecretString::new(parsed.access_token);
        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in.unwrap_or(3600)),
        });
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn principal() -> Credentials {
        Credentials::ServicePrincipal {
            tenant: "tenant-1".into(),
            client_id: "app".into(),
            secret: SecretString::new("s3cret".into()),
        }
    }

    #[tokio::test]
    async fn service_principal_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "abc", "expires_in": 3599})))
            .expect(1)
            .mount(&server)
            .await;
        let provider = TokenProvider::new(principal(), server.uri());
        let http = reqwest::Client::new();
        assert_eq!(provider.token(&http).await.unwrap().expose_secret(), "abc");
        assert_eq!(provider.token(&http).await.unwrap().expose_secret(), "abc");
    }

    #[tokio::test]
    async fn rejected_credentials_are_auth_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;
        let provider = TokenProvider::new(principal(), server.uri());
        match provider.token(&reqwest::Client::new()).await {
            Err(AzureError::Auth(m)) => assert!(m.contains("invalid_client")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
