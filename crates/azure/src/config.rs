//! Azure credentials and endpoints.

use azrec_core::PollPolicy;
use secrecy::SecretString;
use std::time::Duration;

use crate::error::{AzureError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

#[derive(Debug, Clone)]
pub enum Credentials {
    /// Pre-issued bearer token.
    AccessToken(SecretString),
    /// Service principal with client secret.
    ServicePrincipal {
        tenant: String,
        client_id: String,
        secret: SecretString,
    },
}

#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub subscription_id: String,
    pub credentials: Credentials,
    pub endpoint: String,
    pub authority: String,
    /// Polling applied to long-running operations and delete confirmation.
    pub poll: PollPolicy,
}

impl AzureConfig {
    pub fn builder() -> AzureConfigBuilder {
        AzureConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> AzureConfigBuilder {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.is_empty());
        AzureConfigBuilder {
            subscription_id: var("AZURE_SUBSCRIPTION_ID"),
            access_token: var("AZURE_ACCESS_TOKEN"),
            tenant: var("AZURE_TENANT"),
            client_id: var("AZURE_CLIENT_ID"),
            secret: var("AZURE_SECRET"),
            endpoint: var("AZURE_RESOURCE_MANAGER_ENDPOINT"),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AzureConfigBuilder {
    subscription_id: Option<String>,
    access_token: Option<String>,
    tenant: Option<String>,
    client_id: Option<String>,
    secret: Option<String>,
    endpoint: Option<String>,
    authority: Option<String>,
    poll_interval: Option<Duration>,
    poll_attempts: Option<u32>,
}

impl AzureConfigBuilder {
    pub fn subscription_id(mut self, v: impl Into<String>) -> Self {
        self.subscription_id = Some(v.into());
        self
    }

    pub fn access_token(mut self, v: impl Into<String>) -> Self {
        self.access_token = Some(v.into());
        self
    }

    pub fn service_principal(mut self, tenant: impl Into<String>, client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self.client_id = Some(client_id.into());
        self.secret = Some(secret.into());
        self
    }

    pub fn endpoint(mut self, v: impl Into<String>) -> Self {
        self.endpoint = Some(v.into());
        self
    }

    pub fn authority(mut self, v: impl Into<String>) -> Self {
        self.authority = Some(v.into());
        self
    }

    pub fn poll_interval(mut self, v: Duration) -> Self {
        self.poll_interval = Some(v);
        self
    }

    pub fn poll_attempts(mut self, v: u32) -> Self {
        self.poll_attempts = Some(v);
        self
    }

    pub fn build(self) -> Result<AzureConfig> {
        let subscription_id = self
            .subscription_id
            .ok_or_else(|| AzureError::Config("subscription id not set (AZURE_SUBSCRIPTION_ID)".into()))?;
        let credentials = match (self.access_token, self.tenant, self.client_id, self.secret) {
            (Some(token), ..) => Credentials::AccessToken(SecretString::new(token)),
            (None, Some(tenant), Some(client_id), Some(secret)) => Credentials::ServicePrincipal {
                tenant,
                client_id,
                secret: SecretString::new(secret),
            },
            _ => {
                return Err(AzureError::Config(
                    "no credentials: set AZURE_ACCESS_TOKEN or AZURE_TENANT, AZURE_CLIENT_ID and AZURE_SECRET".into(),
                ))
            }
        };
        let defaults = PollPolicy::default();
        Ok(AzureConfig {
            subscription_id,
            credentials,
            endpoint: self.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()).trim_end_matches('/').to_string(),
            authority: self.authority.unwrap_or_else(|| DEFAULT_AUTHORITY.to_string()).trim_end_matches('/').to_string(),
            poll: PollPolicy::new(
                self.poll_interval.unwrap_or(defaults.interval),
                self.poll_attempts.unwrap_or(defaults.max_attempts),
            ),
        })
    }
}
