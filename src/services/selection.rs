//! Where selected files come from.
//!
//! A browser hands over a flat file list with folder-relative paths; here the
//! same shape is produced from explicit paths or by walking a directory.

use crate::error::{Error, Result};
use crate::models::SelectedFile;
use std::path::{Path, PathBuf};

pub trait FileSelectionProvider {
    fn select(&self) -> Result<Vec<SelectedFile>>;
}

/// Individual files; each relative path is the bare file name.
#[derive(Debug, Clone, Default)]
pub struct PathSelection {
    paths: Vec<PathBuf>,
}

impl PathSelection {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl FileSelectionProvider for PathSelection {
    fn select(&self) -> Result<Vec<SelectedFile>> {
        self.paths
            .iter()
            .map(|path| {
                if !path.is_file() {
                    return Err(Error::invalid(format!(
                        "{} is not a file",
                        path.display()
                    )));
                }
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .ok_or_else(|| Error::invalid(format!("{} has no file name", path.display())))?;
                Ok(SelectedFile::from_disk(name, path.clone()))
            })
            .collect()
    }
}

/// Every file under a directory, as `dirname/sub/file`, sorted by path.
#[derive(Debug, Clone)]
pub struct DirectorySelection {
    root: PathBuf,
}

impl DirectorySelection {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileSelectionProvider for DirectorySelection {
    fn select(&self) -> Result<Vec<SelectedFile>> {
        if !self.root.is_dir() {
            return Err(Error::invalid(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        let folder = self
            .root
            .canonicalize()?
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::invalid("cannot upload the filesystem root"))?;

        let mut paths = Vec::new();
        walk(&self.root, &mut paths)?;
        paths.sort();

        let files = paths
            .into_iter()
            .filter_map(|path| {
                let rel = path.strip_prefix(&self.root).ok()?;
                let rel = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join("/");
                Some(SelectedFile::from_disk(format!("{}/{}", folder, rel), path))
            })
            .collect();
        Ok(files)
    }
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(&path, out)?;
        } else if file_type.is_file() {
            let hidden = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(false);
            if !hidden {
                out.push(path);
            }
        }
    }
    Ok(())
}
