//! Copy strategies from an upstream checkout into a downstream checkout.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{Mapping, Strategy};

/// Applies one mapping; paths are relative to the two checkout roots.
pub fn apply(mapping: &Mapping, upstream: &Path, downstream: &Path) -> Result<()> {
    let src = upstream.join(&mapping.source);
    let dst = downstream.join(&mapping.target);
    if !src.exists() {
        anyhow::bail!("{} does not exist upstream", mapping.source);
    }
    debug!(source = %mapping.source, target = %mapping.target, strategy = ?mapping.strategy, "copy");
    match mapping.strategy {
        Strategy::Overwrite => overwrite(&src, &dst),
        Strategy::Merge => merge(&src, &dst),
        Strategy::TestSubfolders => {
            let prefix = mapping.test_prefix.as_deref().unwrap_or_default();
            for entry in std::fs::read_dir(&src).with_context(|| format!("read {}", src.display()))? {
                let entry = entry?;
                let name = entry.file_name();
                if entry.file_type()?.is_dir() && name.to_string_lossy().starts_with(prefix) {
                    overwrite(&entry.path(), &dst.join(&name))?;
                }
            }
            Ok(())
        }
    }
}

/// Removes `dst` and copies `src` in its place.
pub fn overwrite(src: &Path, dst: &Path) -> Result<()> {
    if dst.is_dir() {
        std::fs::remove_dir_all(dst).with_context(|| format!("remove {}", dst.display()))?;
    } else if dst.exists() {
        std::fs::remove_file(dst).with_context(|| format!("remove {}", dst.display()))?;
    }
    merge(src, dst)
}

/// Copies every file of `src` into `dst`, replacing same-named files.
pub fn merge(src: &Path, dst: &Path) -> Result<()> {
    if src.is_file() {
        return copy_file(src, dst);
    }
    let walker = WalkDir::new(src).into_iter().filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src)?;
        let to = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&to).with_context(|| format!("create {}", to.display()))?;
        } else {
            copy_file(entry.path(), &to)?;
        }
    }
    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(from, to).with_context(|| format!("copy {} to {}", from.display(), to.display()))?;
    Ok(())
}
