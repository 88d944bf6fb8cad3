//! Upload form state and multipart submission.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{DraftField, DraftKind, MediaType, SelectedFile, UploadDraft};
use crate::services::backend::{with_deadline, MediaBackend, UploadReceipt};
use crate::services::selection::FileSelectionProvider;
use std::time::Duration;

/// Multipart field every file is attached under.
pub const FILE_FIELD: &str = "media";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEndpoint {
    Single,
    Multi,
}

impl UploadEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Single => "/media",
            Self::Multi => "/media/multi",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    pub name: String,
    pub relative_path: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// A fully assembled create request, independent of the wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub endpoint: UploadEndpoint,
    pub fields: Vec<(&'static str, String)>,
    pub files: Vec<UploadPart>,
}

impl UploadRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Reads every selected file and lays out the text fields.
    pub async fn from_draft(draft: &UploadDraft) -> Result<Self> {
        let mut files = Vec::with_capacity(draft.files.len());
        for file in &draft.files {
            files.push(UploadPart {
                name: file.name.clone(),
                relative_path: file.relative_path.clone(),
                mime: file.mime_type().to_string(),
                bytes: file.blob.read().await?,
            });
        }

        let (endpoint, media_type) = match draft.kind.media_type() {
            Some(media_type) => (UploadEndpoint::Single, media_type),
            None => (UploadEndpoint::Multi, folder_media_type(&draft.files)),
        };

        let mut fields = vec![
            ("title", draft.title.trim().to_string()),
            ("type", media_type.to_string()),
            ("isPrivate", draft.is_private.to_string()),
        ];
        let category = draft.category.trim();
        if !category.is_empty() {
            fields.push(("category", category.to_string()));
        }
        if endpoint == UploadEndpoint::Multi {
            if let Some(folder) = draft.folder_name() {
                fields.push(("folder", folder.to_string()));
            }
            let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
            fields.push((
                "relativePaths",
                serde_json::to_string(&paths).map_err(|e| Error::Decode(e.to_string()))?,
            ));
        }

        Ok(Self {
            endpoint,
            fields,
            files,
        })
    }
}

/// A folder is a video upload only when every file looks like a video.
fn folder_media_type(files: &[SelectedFile]) -> MediaType {
    let all_video = !files.is_empty()
        && files
            .iter()
            .all(|f| f.mime_type().type_() == mime_guess::mime::VIDEO);
    if all_video {
        MediaType::Video
    } else {
        MediaType::Image
    }
}

pub fn validate_draft(draft: &UploadDraft, require_category: bool) -> Result<()> {
    if draft.files.is_empty() {
        return Err(Error::NoFileSelected);
    }
    if require_category && draft.category.trim().is_empty() {
        return Err(Error::MissingField("category"));
    }
    Ok(())
}

pub struct UploadComposer {
    draft: UploadDraft,
    require_category: bool,
    timeout: Duration,
}

impl UploadComposer {
    pub fn new(require_category: bool, timeout: Duration) -> Self {
        Self {
            draft: UploadDraft::default(),
            require_category,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.upload.require_category,
            config.backend.request_timeout(),
        )
    }

    pub fn draft(&self) -> &UploadDraft {
        &self.draft
    }

    pub fn set_field(&mut self, field: DraftField) {
        match field {
            DraftField::Title(title) => self.draft.title = title,
            DraftField::Category(category) => self.draft.category = category,
            DraftField::Private(is_private) => self.draft.is_private = is_private,
            DraftField::Kind(kind) => {
                if self.draft.kind != kind {
                    self.draft.files.clear();
                }
                self.draft.kind = kind;
            }
        }
    }

    /// Normalizes a selection for the current kind. An invalid selection
    /// leaves the previous one in place.
    pub fn select_files(&mut self, files: Vec<SelectedFile>) -> Result<()> {
        if files.is_empty() {
            self.draft.files.clear();
            return Ok(());
        }

        let normalized = match self.draft.kind {
            DraftKind::Folder => normalize_folder(files)?,
            DraftKind::Image | DraftKind::Video => {
                if files.len() > 1 {
                    return Err(Error::invalid(format!(
                        "select exactly one file for an {} upload",
                        self.draft.kind
                    )));
                }
                files
                    .into_iter()
                    .map(|f| SelectedFile {
                        relative_path: f.name.clone(),
                        ..f
                    })
                    .collect()
            }
        };
        self.draft.files = normalized;
        Ok(())
    }

    pub fn select_from(&mut self, provider: &impl FileSelectionProvider) -> Result<()> {
        let files = provider.select()?;
        self.select_files(files)
    }

    /// Consumes the draft on success; on any failure the draft is kept so the
    /// user can resubmit without selecting files again.
    pub async fn submit<B: MediaBackend>(&mut self, backend: &B) -> Result<UploadReceipt> {
        validate_draft(&self.draft, self.require_category)?;

        let request = UploadRequest::from_draft(&self.draft).await?;
        tracing::debug!(
            "Submitting {} upload with {} file(s)",
            self.draft.kind,
            request.files.len()
        );

        match with_deadline(self.timeout, backend.create_media(request)).await {
            Ok(receipt) => {
                tracing::info!("Upload accepted ({} item(s) created)", receipt.items.len());
                self.reset();
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!("Upload failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn reset(&mut self) {
        self.draft = UploadDraft::default();
    }
}

fn normalize_folder(files: Vec<SelectedFile>) -> Result<Vec<SelectedFile>> {
    let mut folder: Option<String> = None;
    let mut out = Vec::with_capacity(files.len());

    for file in files {
        let segments: Vec<String> = file.segments().iter().map(|s| s.to_string()).collect();
        if segments.len() < 2 {
            return Err(Error::invalid(format!(
                "{} is not inside a folder",
                file.relative_path
            )));
        }
        match folder {
            None => folder = Some(segments[0].clone()),
            Some(ref name) if *name != segments[0] => {
                return Err(Error::invalid("all files must come from a single folder"));
            }
            Some(_) => {}
        }
        let name = segments[segments.len() - 1].clone();
        out.push(SelectedFile {
            name,
            relative_path: segments.join("/"),
            blob: file.blob,
        });
    }
    Ok(out)
}
