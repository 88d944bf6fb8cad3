use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// When `id_token` stops being accepted.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CurrentUser {
    /// Tokens within a minute of expiry (or of unknown age) count as stale.
    pub fn token_is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + chrono::Duration::seconds(60) >= expires_at,
            None => true,
        }
    }
}

/// Fields written through the identity provider's profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl ProfileUpdate {
    pub fn display_name(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
            photo_url: None,
        }
    }

    pub fn photo_url(url: impl Into<String>) -> Self {
        Self {
            display_name: None,
            photo_url: Some(url.into()),
        }
    }
}

/// Token handed over by a federated sign-in flow (e.g. `google.com`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedCredential {
    pub provider_id: String,
    pub id_token: String,
}

/// What the profile screen shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSummary {
    pub display_name: Option<String>,
    pub email: String,
    pub photo_url: Option<String>,
    pub joined: Option<DateTime<Utc>>,
    /// `None` when the count could not be fetched.
    pub upload_count: Option<usize>,
}
