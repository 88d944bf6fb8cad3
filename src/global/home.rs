use anyhow::{Context, Result};
use std::path::PathBuf;

/// Per-user state directory (`~/.snapshare`).
#[derive(Debug, Clone)]
pub struct SnapshareHome {
    pub root: PathBuf,
    pub session_path: PathBuf,
}

impl SnapshareHome {
    pub fn get_home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".snapshare"))
    }

    pub fn init() -> Result<Self> {
        Self::at(Self::get_home_dir()?)
    }

    pub fn at(root: PathBuf) -> Result<Self> {
        let session_path = root.join("session.json");

        if !root.exists() {
            std::fs::create_dir_all(&root).with_context(|| {
                format!("Failed to create snapshare home at {}", root.display())
            })?;
            tracing::info!("Created snapshare home directory: {}", root.display());
        }

        Ok(Self { root, session_path })
    }
}
