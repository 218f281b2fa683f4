//! Thin Azure Resource Manager REST client.
//!
//! Only the three calls every module needs: GET (404 maps to `None`), PUT and
//! DELETE. Both mutating calls block until the long-running operation behind
//! them reaches a terminal state.

use azrec_core::PollPolicy;
use reqwest::header::{HeaderMap, AUTHORIZATION, LOCATION, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use secrecy::ExposeSecret;
use serde_json::Value as Json;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::TokenProvider;
use crate::config::AzureConfig;
use crate::error::{AzureError, Result};

const ASYNC_OPERATION: &str = "azure-asyncoperation";

pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    tokens: TokenProvider,
    poll: PollPolicy,
}

/// Where to watch an in-flight operation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Tracking {
    /// `Azure-AsyncOperation`: poll until the body's `status` is terminal.
    AsyncOperation(String),
    /// `Location`: poll until the response stops being 202.
    Location(String),
}

impl ArmClient {
    pub fn new(cfg: &AzureConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("azrec/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            subscription_id: cfg.subscription_id.clone(),
            tokens: TokenProvider::new(cfg.credentials.clone(), cfg.authority.clone()),
            poll: cfg.poll,
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, api_version)
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Json>) -> Result<Response> {
        let token = self.tokens.token(&self.http).await?;
        let mut req = self
            .http
            .request(method.clone(), url)
            .header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        if let Some(b) = body {
            req = req.json(b);
        }
        debug!(%method, %url, "arm request");
        Ok(req.send().await?)
    }

    async fn fail(resp: Response) -> AzureError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        AzureError::from_body(status, &body)
    }

    pub async fn get(&self, path: &str, api_version: &str) -> Result<Option<Json>> {
        let resp = self.send(Method::GET, &self.url(path, api_version), None).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(resp.json().await?)),
            _ => Err(Self::fail(resp).await),
        }
    }

    pub async fn put(&self, path: &str, api_version: &str, body: &Json) -> Result<Json> {
        let resp = self.send(Method::PUT, &self.url(path, api_version), Some(body)).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::fail(resp).await);
        }
        let track = tracking(status, resp.headers());
        let first = retry_after(resp.headers());
        let immediate: Option<Json> = match status {
            StatusCode::ACCEPTED => None,
            _ => resp.json().await.ok(),
        };
        let body = match (track, immediate) {
            (Some(t), _) => {
                self.wait(t, first).await?;
                self.read_back(path, api_version).await?
            }
            (None, Some(body)) => body,
            (None, None) => self.read_back(path, api_version).await?,
        };
        self.settle(path, api_version, body).await
    }

    async fn read_back(&self, path: &str, api_version: &str) -> Result<Json> {
        self.get(path, api_version).await?.ok_or_else(|| AzureError::Operation {
            status: "Succeeded".into(),
            message: format!("{} not found after create", path),
        })
    }

    /// Re-reads the resource until its `provisioningState` is terminal.
    async fn settle(&self, path: &str, api_version: &str, mut body: Json) -> Result<Json> {
        for attempt in 1..=self.poll.max_attempts {
            match provisioning_state(&body).as_deref() {
                None | Some("Succeeded") => return Ok(body),
                Some(status @ ("Failed" | "Canceled")) => {
                    return Err(AzureError::Operation {
                        status: status.to_string(),
                        message: format!("{} ended in provisioning state {}", path, status),
                    })
                }
                Some(status) => debug!(attempt, status, "waiting for provisioning state"),
            }
            tokio::time::sleep(self.poll.interval).await;
            body = self.read_back(path, api_version).await?;
        }
        match provisioning_state(&body).as_deref() {
            None | Some("Succeeded") => Ok(body),
            Some(status @ ("Failed" | "Canceled")) => Err(AzureError::Operation {
                status: status.to_string(),
                message: format!("{} ended in provisioning state {}", path, status),
            }),
            Some(_) => {
                info!(attempts = self.poll.max_attempts, "giving up on provisioning state");
                Err(AzureError::Timeout { attempts: self.poll.max_attempts })
            }
        }
    }

    pub async fn delete(&self, path: &str, api_version: &str) -> Result<()> {
        let resp = self.send(Method::DELETE, &self.url(path, api_version), None).await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !status.is_success() {
            return Err(Self::fail(resp).await);
        }
        if let Some(t) = tracking(status, resp.headers()) {
            let first = retry_after(resp.headers());
            self.wait(t, first).await?;
        }
        Ok(())
    }

    async fn wait(&self, tracking: Tracking, mut delay: Option<Duration>) -> Result<()> {
        for attempt in 1..=self.poll.max_attempts {
            tokio::time::sleep(delay.unwrap_or(self.poll.interval)).await;
            match &tracking {
                Tracking::AsyncOperation(url) => {
                    let resp = self.send(Method::GET, url, None).await?;
                    if !resp.status().is_success() {
                        return Err(Self::fail(resp).await);
                    }
                    delay = retry_after(resp.headers());
                    let body: Json = resp.json().await?;
                    let status = body.get("status").and_then(Json::as_str).unwrap_or("InProgress");
                    debug!(attempt, status, "operation status");
                    match status {
                        "Succeeded" => return Ok(()),
                        "Failed" | "Canceled" => {
                            let message = body
                                .pointer("/error/message")
                                .and_then(Json::as_str)
                                .unwrap_or("no detail")
                                .to_string();
                            return Err(AzureError::Operation { status: status.to_string(), message });
                        }
                        _ => {}
                    }
                }
                Tracking::Location(url) => {
                    let resp = self.send(Method::GET, url, None).await?;
                    match resp.status() {
                        StatusCode::ACCEPTED => delay = retry_after(resp.headers()),
                        s if s.is_success() || s == StatusCode::NOT_FOUND => return Ok(()),
                        _ => return Err(Self::fail(resp).await),
                    }
                }
            }
        }
        info!(attempts = self.poll.max_attempts, "giving up on long-running operation");
        Err(AzureError::Timeout { attempts: self.poll.max_attempts })
    }
}

fn provisioning_state(body: &Json) -> Option<String> {
    body.pointer("/properties/provisioningState")
        .or_else(|| body.get("provisioningState"))
        .and_then(Json::as_str)
        .map(str::to_string)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn tracking(status: StatusCode, headers: &HeaderMap) -> Option<Tracking> {
    if let Some(url) = header(headers, ASYNC_OPERATION) {
        return Some(Tracking::AsyncOperation(url));
    }
    if status == StatusCode::ACCEPTED {
        return header(headers, LOCATION.as_str()).map(Tracking::Location);
    }
    None
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header(headers, RETRY_AFTER.as_str())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
