use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Repo {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl Repo {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Replace the target with the source.
    Overwrite,
    /// Copy every file over, keeping files only present in the target.
    Merge,
    /// Overwrite only the source subfolders whose name starts with `test_prefix`.
    TestSubfolders,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Mapping {
    /// Path in the upstream repository; also the key in the SHA history.
    pub source: String,
    pub target: String,
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
    #[serde(default)]
    pub test_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    pub upstream: Repo,
    pub downstream: Repo,
    pub history_file: PathBuf,
    pub work_dir: PathBuf,
    pub mapping: Vec<Mapping>,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    #[serde(default = "default_pr_title")]
    pub pr_title: String,
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    /// Environment variable holding the GitHub token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_git_url")]
    pub git_url: String,
}

fn default_branch() -> String { "main".into() }
fn default_strategy() -> Strategy { Strategy::Overwrite }
fn default_commit_message() -> String { "Sync from upstream".into() }
fn default_pr_title() -> String { "Sync from upstream".into() }
fn default_branch_prefix() -> String { "sync".into() }
fn default_token_env() -> String { "GITHUB_TOKEN".into() }
fn default_api_url() -> String { "https://api.github.com".into() }
fn default_git_url() -> String { "https://github.com".into() }

impl MirrorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Self = serde_json::from_slice(&raw).with_context(|| format!("parse {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.mapping.is_empty() {
            anyhow::bail!("mapping is empty");
        }
        for m in &self.mapping {
            if m.strategy == Strategy::TestSubfolders && m.test_prefix.as_deref().unwrap_or("").is_empty() {
                anyhow::bail!("mapping '{}' uses test_subfolders without test_prefix", m.source);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let p = dir.path().join("mirror.json");
        std::fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn defaults_are_filled() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(
            &dir,
            r#"{
                "upstream": {"owner": "Azure", "repo": "azure-rest-api-specs", "branch": "master"},
                "downstream": {"owner": "me", "repo": "collection"},
                "history_file": "shas.json",
                "work_dir": "/tmp/mirror",
                "mapping": [{"source": "specification/sql", "target": "specs/sql"}]
            }"#,
        );
        let cfg = MirrorConfig::load(&p).unwrap();
        assert_eq!(cfg.downstream.branch, "main");
        assert_eq!(cfg.branch_prefix, "sync");
        assert_eq!(cfg.token_env, "GITHUB_TOKEN");
        assert_eq!(cfg.mapping[0].strategy, Strategy::Overwrite);
        assert_eq!(cfg.upstream.slug(), "Azure/azure-rest-api-specs");
    }

    #[test]
    fn test_subfolders_needs_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(
            &dir,
            r#"{
                "upstream": {"owner": "a", "repo": "b"},
                "downstream": {"owner": "c", "repo": "d"},
                "history_file": "h.json",
                "work_dir": "w",
                "mapping": [{"source": "tests", "target": "tests", "strategy": "test_subfolders"}]
            }"#,
        );
        let err = MirrorConfig::load(&p).unwrap_err();
        assert!(err.to_string().contains("test_prefix"));
    }
}
