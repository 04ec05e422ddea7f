//! Persistence for validated parsers (`<parsers_dir>/<target>_parser.py`).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::io::config::write_atomic;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, target: &str) -> PathBuf {
        self.dir.join(format!("{target}_parser.py"))
    }

    /// Write `code` for `target`, replacing any earlier parser.
    pub fn save(&self, target: &str, code: &str) -> Result<PathBuf> {
        let path = self.path_for(target);
        let mut contents = code.trim_end().to_string();
        contents.push('\n');
        write_atomic(&path, &contents)
            .with_context(|| format!("save parser for {target}"))?;
        info!(target, path = %path.display(), "parser saved");
        Ok(path)
    }

    pub fn load(&self, target: &str) -> Result<String> {
        let path = self.path_for(target);
        fs::read_to_string(&path).with_context(|| format!("read parser {}", path.display()))
    }
}
