//! Last-mirrored commit per upstream path.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaHistory {
    path: PathBuf,
    shas: BTreeMap<String, String>,
}

impl ShaHistory {
    /// A missing file is an empty history.
    pub fn load(path: &Path) -> Result<Self> {
        let shas = match std::fs::read(path) {
            Ok(raw) => serde_json::from_slice(&raw).with_context(|| format!("parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        Ok(Self { path: path.to_path_buf(), shas })
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.shas.get(source).map(String::as_str)
    }

    pub fn is_current(&self, source: &str, sha: &str) -> bool {
        self.get(source) == Some(sha)
    }

    /// Merges `updates` in and rewrites the whole file.
    pub fn save(&mut self, updates: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        self.shas.extend(updates);
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&self.shas)?)
            .with_context(|| format!("write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_is_empty_and_save_merges() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("state").join("shas.json");
        let mut h = ShaHistory::load(&p).unwrap();
        assert_eq!(h.get("a"), None);

        h.save([("a".to_string(), "111".to_string()), ("b".to_string(), "222".to_string())]).unwrap();
        let mut h = ShaHistory::load(&p).unwrap();
        h.save([("b".to_string(), "333".to_string())]).unwrap();

        let h = ShaHistory::load(&p).unwrap();
        assert!(h.is_current("a", "111"));
        assert!(h.is_current("b", "333"));
        assert!(!h.is_current("b", "222"));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("shas.json");
        std::fs::write(&p, "not json").unwrap();
        assert!(ShaHistory::load(&p).is_err());
    }
}
