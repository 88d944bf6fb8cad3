use crate::error::Result;
use crate::models::MediaItem;
use std::path::{Path, PathBuf};

/// Client-side "save as" for downloaded bytes.
pub trait SaveTarget {
    /// Returns where the bytes ended up.
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// `<title>.<ext>`, with `download` standing in for a missing title.
pub fn download_filename(item: &MediaItem) -> String {
    let title = item
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("download");
    format!("{}.{}", title, item.media_type.download_extension())
}

/// Writes into a directory, never replacing an existing file.
#[derive(Debug, Clone)]
pub struct DirectorySaveTarget {
    dir: PathBuf,
}

impl DirectorySaveTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn free_path(&self, filename: &str) -> PathBuf {
        let candidate = self.dir.join(filename);
        if !candidate.exists() {
            return candidate;
        }

        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| filename.to_string());
        let ext = path.extension().map(|e| e.to_string_lossy().to_string());

        let mut n = 1;
        loop {
            let name = match ext {
                Some(ref ext) => format!("{} ({}).{}", stem, n, ext),
                None => format!("{} ({})", stem, n),
            };
            let candidate = self.dir.join(name);
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

impl SaveTarget for DirectorySaveTarget {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.free_path(&sanitize_filename(filename));
        std::fs::write(&path, bytes)?;
        tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned.to_string()
    }
}
