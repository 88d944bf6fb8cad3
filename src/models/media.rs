use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Backends hand out ids as strings (`"64f0..."`) or plain integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl<'de> Deserialize<'de> for MediaId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => Self(id),
            RawId::Signed(id) => Self(id.to_string()),
            RawId::Unsigned(id) => Self(id.to_string()),
        })
    }
}

/// `null` reads as the field's default, like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl MediaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    /// Extension used for client-side downloads.
    pub fn download_extension(self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video => "mp4",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl FromStr for MediaType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    #[serde(rename = "_id", alias = "id")]
    pub id: MediaId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_private: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub download_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl MediaItem {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    /// Applies an acknowledged partial update.
    pub fn apply(&mut self, patch: &MediaPatch) {
        if let Some(ref title) = patch.title {
            self.title = Some(title.clone());
        }
        if let Some(media_type) = patch.media_type {
            self.media_type = media_type;
        }
        if let Some(is_private) = patch.is_private {
            self.is_private = is_private;
        }
    }
}

/// Partial update body for `PATCH /media/:id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

impl MediaPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn media_type(media_type: MediaType) -> Self {
        Self {
            media_type: Some(media_type),
            ..Self::default()
        }
    }

    pub fn privacy(is_private: bool) -> Self {
        Self {
            is_private: Some(is_private),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.media_type.is_none() && self.is_private.is_none()
    }

    /// Fields set in `other` win.
    pub fn merge(&mut self, other: MediaPatch) {
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.media_type.is_some() {
            self.media_type = other.media_type;
        }
        if other.is_private.is_some() {
            self.is_private = other.is_private;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaScope {
    #[default]
    Public,
    Mine,
}

impl MediaScope {
    pub fn path(self) -> &'static str {
        match self {
            Self::Public => "/media",
            Self::Mine => "/my-uploads",
        }
    }
}

impl std::fmt::Display for MediaScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Mine => write!(f, "mine"),
        }
    }
}
