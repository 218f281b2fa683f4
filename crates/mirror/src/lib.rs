//! One-shot mirroring of upstream repository paths into a downstream
//! repository through a pull request.
//!
//! Each mapped upstream path is checked against the commit SHA recorded the
//! last time it was mirrored. Changed paths are copied into a fresh branch of
//! the downstream repository, pushed, and proposed as a pull request. The SHA
//! history is only rewritten once the pull request exists.

pub mod config;
pub mod copy;
pub mod git;
pub mod github;
pub mod history;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, warn};

pub use config::{Mapping, MirrorConfig, Repo, Strategy};
use git::Git;
use github::GitHub;
use history::ShaHistory;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub source: String,
    pub target: String,
    pub sha: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub changed: Vec<Change>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<String>,
}

pub fn branch_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", prefix, now.format("%Y%m%d%H%M%S"))
}

pub fn pr_body(changes: &[Change]) -> String {
    let mut body = String::from("Upstream paths changed since the last sync:\n\n");
    for c in changes {
        body.push_str(&format!("- `{}` -> `{}` ({})\n", c.source, c.target, c.sha));
    }
    body
}

pub struct Mirror {
    cfg: MirrorConfig,
    github: GitHub,
    token: SecretString,
}

impl Mirror {
    /// Reads the token from the configured environment variable.
    pub fn new(cfg: MirrorConfig) -> Result<Self> {
        let token = std::env::var(&cfg.token_env)
            .ok()
            .filter(|t| !t.is_empty())
            .with_context(|| format!("{} is not set", cfg.token_env))?;
        let token = SecretString::new(token);
        let github = GitHub::new(cfg.api_url.clone(), token.clone())?;
        Ok(Self { cfg, github, token })
    }

    /// Mapped paths whose latest upstream commit differs from the history.
    pub async fn changed(&self, history: &ShaHistory) -> Result<Vec<Change>> {
        let mut out = Vec::new();
        for m in &self.cfg.mapping {
            let Some(sha) = self.github.latest_sha(&self.cfg.upstream, &m.source).await? else {
                warn!(source = %m.source, "no upstream commits touch this path");
                continue;
            };
            if history.is_current(&m.source, &sha) {
                info!(source = %m.source, %sha, "up to date");
                continue;
            }
            info!(source = %m.source, %sha, previous = ?history.get(&m.source), "changed");
            out.push(Change { source: m.source.clone(), target: m.target.clone(), sha });
        }
        Ok(out)
    }

    pub async fn run(&self, dry_run: bool) -> Result<Report> {
        let mut history = ShaHistory::load(&self.cfg.history_file)?;
        let changed = self.changed(&history).await?;
        if changed.is_empty() {
            info!("nothing to mirror");
            return Ok(Report::default());
        }
        if dry_run {
            info!(count = changed.len(), "dry run, stopping before clone");
            return Ok(Report { changed, ..Default::default() });
        }

        let git = Git::locate()?;
        let up_dir = self.cfg.work_dir.join("upstream");
        let down_dir = self.cfg.work_dir.join("downstream");
        for d in [&up_dir, &down_dir] {
            if d.exists() {
                std::fs::remove_dir_all(d).with_context(|| format!("clean {}", d.display()))?;
            }
        }
        std::fs::create_dir_all(&self.cfg.work_dir)?;
        let up = &self.cfg.upstream;
        let down = &self.cfg.downstream;
        git.clone_branch(&git::remote_url(&self.cfg.git_url, up, &self.token), &up.branch, &up_dir)?;
        git.clone_branch(&git::remote_url(&self.cfg.git_url, down, &self.token), &down.branch, &down_dir)?;

        let branch = branch_name(&self.cfg.branch_prefix, Utc::now());
        git.checkout_new_branch(&down_dir, &branch)?;
        for c in &changed {
            let mapping = self
                .cfg
                .mapping
                .iter()
                .find(|m| m.source == c.source && m.target == c.target)
                .context("mapping vanished")?;
            copy::apply(mapping, &up_dir, &down_dir)?;
        }
        if !git.stage_all(&down_dir)? {
            info!("upstream changes produce no downstream diff");
            return Ok(Report { changed, ..Default::default() });
        }
        git.commit(&down_dir, &self.cfg.commit_message)?;
        git.push(&down_dir, &branch)?;

        let url = self
            .github
            .open_pull_request(down, &branch, &self.cfg.pr_title, &pr_body(&changed))
            .await?;
        info!(%url, "pull request opened");
        history.save(changed.iter().map(|c| (c.source.clone(), c.sha.clone())))?;
        Ok(Report { changed, branch: Some(branch), pull_request: Some(url) })
    }
}

#[cfg(test)]
impl Mirror {
    fn with_api(mut cfg: MirrorConfig, api_url: String) -> Self {
        cfg.api_url = api_url;
        let token = SecretString::new("ghp_test".into());
        let github = GitHub::new(cfg.api_url.clone(), token.clone()).unwrap();
        Self { cfg, github, token }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cfg(dir: &std::path::Path) -> MirrorConfig {
        serde_json::from_value(json!({
            "upstream": {"owner": "up", "repo": "specs", "branch": "master"},
            "downstream": {"owner": "down", "repo": "coll"},
            "history_file": dir.join("shas.json"),
            "work_dir": dir.join("work"),
            "mapping": [
                {"source": "a", "target": "x/a"},
                {"source": "b", "target": "x/b", "strategy": "merge"}
            ]
        }))
        .unwrap()
    }

    async fn upstream(shas: &[(&str, &str)]) -> MockServer {
        let server = MockServer::start().await;
        for (p, sha) in shas {
            Mock::given(method("GET"))
                .and(path("/repos/up/specs/commits"))
                .and(query_param("path", *p))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"sha": sha}])))
                .mount(&server)
                .await;
        }
        server
    }

    #[test]
    fn branch_name_uses_utc_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(branch_name("sync", at), "sync-20240305070809");
    }

    #[tokio::test]
    async fn only_paths_with_new_shas_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shas.json"), r#"{"a": "1111", "b": "2222"}"#).unwrap();
        let server = upstream(&[("a", "1111"), ("b", "3333")]).await;
        let m = Mirror::with_api(cfg(dir.path()), server.uri());

        let history = ShaHistory::load(&dir.path().join("shas.json")).unwrap();
        let changed = m.changed(&history).await.unwrap();
        assert_eq!(changed, vec![Change { source: "b".into(), target: "x/b".into(), sha: "3333".into() }]);
    }

    #[tokio::test]
    async fn dry_run_leaves_history_and_work_dir_alone() {
        let dir = tempfile::tempdir().unwrap();
        let server = upstream(&[("a", "1111"), ("b", "2222")]).await;
        let m = Mirror::with_api(cfg(dir.path()), server.uri());

        let report = m.run(true).await.unwrap();
        assert_eq!(report.changed.len(), 2);
        assert_eq!(report.pull_request, None);
        assert!(!dir.path().join("shas.json").exists());
        assert!(!dir.path().join("work").exists());
    }

    #[tokio::test]
    async fn nothing_changed_is_a_quiet_success() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shas.json"), r#"{"a": "1111", "b": "2222"}"#).unwrap();
        let server = upstream(&[("a", "1111"), ("b", "2222")]).await;
        let m = Mirror::with_api(cfg(dir.path()), server.uri());

        let report = m.run(false).await.unwrap();
        assert!(report.changed.is_empty());
        assert!(!dir.path().join("work").exists());
    }

    #[test]
    fn pr_body_lists_changes() {
        let body = pr_body(&[Change { source: "a".into(), target: "x/a".into(), sha: "1111".into() }]);
        assert!(body.contains("- `a` -> `x/a` (1111)"));
    }
}
