use crate::models::MediaType;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftKind {
    #[default]
    Image,
    Video,
    Folder,
}

impl DraftKind {
    /// The media type sent for single-file drafts.
    pub fn media_type(self) -> Option<MediaType> {
        match self {
            Self::Image => Some(MediaType::Image),
            Self::Video => Some(MediaType::Video),
            Self::Folder => None,
        }
    }
}

impl FromStr for DraftKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "folder" => Ok(Self::Folder),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for DraftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Folder => write!(f, "folder"),
        }
    }
}

/// Where the bytes of a selected file live until submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Blob {
    Disk(PathBuf),
    Memory(Vec<u8>),
}

impl Blob {
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Disk(path) => tokio::fs::read(path).await,
            Self::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    /// Flat name for single files, `folder/sub/name` for folder selections.
    pub relative_path: String,
    pub blob: Blob,
}

impl SelectedFile {
    pub fn from_bytes(relative_path: impl Into<String>, bytes: Vec<u8>) -> Self {
        let relative_path = relative_path.into();
        let name = file_name_of(&relative_path).to_string();
        Self {
            name,
            relative_path,
            blob: Blob::Memory(bytes),
        }
    }

    pub fn from_disk(relative_path: impl Into<String>, path: PathBuf) -> Self {
        let relative_path = relative_path.into();
        let name = file_name_of(&relative_path).to_string();
        Self {
            name,
            relative_path,
            blob: Blob::Disk(path),
        }
    }

    pub fn mime_type(&self) -> mime_guess::Mime {
        mime_guess::from_path(&self.name).first_or_octet_stream()
    }

    /// Path segments of the relative path, ignoring empty ones.
    pub fn segments(&self) -> Vec<&str> {
        self.relative_path
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn file_name_of(relative_path: &str) -> &str {
    relative_path
        .rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or(relative_path)
}

/// In-progress upload form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadDraft {
    pub kind: DraftKind,
    pub title: String,
    pub category: String,
    pub is_private: bool,
    pub files: Vec<SelectedFile>,
}

impl UploadDraft {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Folder name shared by every file of a folder selection.
    pub fn folder_name(&self) -> Option<&str> {
        if self.kind != DraftKind::Folder {
            return None;
        }
        self.files
            .first()
            .and_then(|f| f.segments().first().copied())
    }
}

/// One settable draft field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftField {
    Title(String),
    Kind(DraftKind),
    Category(String),
    Private(bool),
}
