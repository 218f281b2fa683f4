//! The two GitHub REST calls the mirror needs.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::Repo;

const USER_AGENT: &str = concat!("azrec-mirror/", env!("CARGO_PKG_VERSION"));

pub struct GitHub {
    http: reqwest::Client,
    api_url: String,
    token: SecretString,
}

#[derive(Debug, Deserialize)]
struct Commit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    html_url: String,
}

impl GitHub {
    pub fn new(api_url: impl Into<String>, token: SecretString) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http, api_url: api_url.into().trim_end_matches('/').to_string(), token })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_url, path))
            .header("Authorization", format!("token {}", self.token.expose_secret()))
            .header("Accept", "application/vnd.github+json")
    }

    /// SHA of the newest commit on `repo.branch` touching `path`, if any.
    pub async fn latest_sha(&self, repo: &Repo, path: &str) -> Result<Option<String>> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/repos/{}/commits", repo.slug()))
            .query(&[("path", path), ("sha", repo.branch.as_str()), ("per_page", "1")])
            .send()
            .await
            .with_context(|| format!("list commits for {}", path))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitHub returned {} listing commits for {}: {}", status, path, body);
        }
        let commits: Vec<Commit> = resp.json().await?;
        debug!(path, found = commits.len(), "latest commit");
        Ok(commits.into_iter().next().map(|c| c.sha))
    }

    /// Opens a pull request and returns its URL.
    pub async fn open_pull_request(&self, repo: &Repo, head: &str, title: &str, body: &str) -> Result<String> {
        let resp = self
            .request(reqwest::Method::POST, &format!("/repos/{}/pulls", repo.slug()))
            .json(&json!({ "title": title, "head": head, "base": repo.branch, "body": body }))
            .send()
            .await
            .context("create pull request")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitHub returned {} creating pull request: {}", status, body);
        }
        let pr: PullRequest = resp.json().await?;
        Ok(pr.html_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo() -> Repo {
        Repo { owner: "Azure".into(), repo: "specs".into(), branch: "master".into() }
    }

    fn client(server: &MockServer) -> GitHub {
        GitHub::new(server.uri(), SecretString::new("ghp_test".into())).unwrap()
    }

    #[tokio::test]
    async fn latest_sha_takes_first_commit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/Azure/specs/commits"))
            .and(query_param("path", "specification/sql"))
            .and(query_param("sha", "master"))
            .and(query_param("per_page", "1"))
            .and(header("authorization", "token ghp_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"sha": "abc123"}, {"sha": "older"}])))
            .mount(&server)
            .await;
        let sha = client(&server).latest_sha(&repo(), "specification/sql").await.unwrap();
        assert_eq!(sha.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn untouched_path_has_no_sha() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/Azure/specs/commits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        assert_eq!(client(&server).latest_sha(&repo(), "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn pull_request_targets_base_branch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/Azure/specs/pulls"))
            .and(body_partial_json(json!({"head": "sync-20240101000000", "base": "master"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"html_url": "https://github.com/Azure/specs/pull/7"})))
            .mount(&server)
            .await;
        let url = client(&server)
            .open_pull_request(&repo(), "sync-20240101000000", "Sync", "- a")
            .await
            .unwrap();
        assert_eq!(url, "https://github.com/Azure/specs/pull/7");
    }

    #[tokio::test]
    async fn api_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("rate limited"))
            .mount(&server)
            .await;
        let err = client(&server).latest_sha(&repo(), "x").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
