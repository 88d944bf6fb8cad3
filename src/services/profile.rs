use crate::error::{Error, Result};
use crate::models::{CurrentUser, MediaScope, ProfileSummary, ProfileUpdate, SelectedFile};
use crate::services::backend::{server_message, MediaBackend};
use crate::services::identity::{AuthService, IdentityProvider};
use crate::services::media_list::MediaListStore;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Somewhere to keep profile photo bytes. Returns the photo's public URL.
pub trait PhotoStore {
    async fn store_photo(&self, file: SelectedFile) -> Result<String>;
}

/// Keeps profile photos in an object-storage bucket under
/// `profile_photos/<uid>/`, apart from the user's media uploads.
#[derive(Clone, Debug)]
pub struct StoragePhotoStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    uid: String,
    id_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredObject {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

impl StoragePhotoStore {
    pub fn new(endpoint: &str, bucket: &str, user: &CurrentUser, timeout: Duration) -> Result<Self> {
        if bucket.is_empty() {
            return Err(Error::MissingField("storage.bucket"));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
            bucket: bucket.to_string(),
            uid: user.uid.clone(),
            id_token: user.id_token.clone(),
        })
    }

    /// `{endpoint}/v0/b/{bucket}/o[/{object}]`, each part percent-encoded.
    fn object_url(&self, object: Option<&str>) -> Result<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::invalid("storage.endpoint cannot be a base URL"))?;
            segments.pop_if_empty().extend(["v0", "b", self.bucket.as_str(), "o"]);
            if let Some(object) = object {
                segments.push(object);
            }
        }
        Ok(url)
    }
}

impl PhotoStore for StoragePhotoStore {
    async fn store_photo(&self, file: SelectedFile) -> Result<String> {
        let mime = file.mime_type();
        if mime.type_() != mime_guess::mime::IMAGE {
            return Err(Error::invalid("Profile photo must be an image"));
        }
        let bytes = file.blob.read().await?;
        let object = format!("profile_photos/{}/{}", self.uid, file.name);

        let mut url = self.object_url(None)?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &object);
        tracing::debug!("POST {}", url);

        let mut req = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, mime.essence_str())
            .body(bytes);
        if !self.id_token.is_empty() {
            req = req.bearer_auth(&self.id_token);
        }
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Server {
                status: status.as_u16(),
                message: server_message(&body),
            });
        }
        let stored: StoredObject = response.json().await?;

        let mut public = self.object_url(Some(&stored.name))?;
        {
            let mut query = public.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(ref token) = stored.download_tokens {
                query.append_pair("token", token);
            }
        }
        Ok(public.to_string())
    }
}

pub struct ProfilePanel<'a, P, B> {
    auth: &'a AuthService<P>,
    uploads: MediaListStore<B>,
}

impl<'a, P: IdentityProvider, B: MediaBackend> ProfilePanel<'a, P, B> {
    pub fn new(auth: &'a AuthService<P>, uploads: MediaListStore<B>) -> Self {
        Self { auth, uploads }
    }

    /// Profile fields plus the number of the user's uploads. A failed count
    /// fetch only leaves the count unknown.
    pub async fn load(&self) -> Result<ProfileSummary> {
        let user = self.auth.require_user()?;

        let upload_count = match self.uploads.refresh(MediaScope::Mine).await {
            Ok(()) => Some(self.uploads.len()),
            Err(e) => {
                tracing::error!("Failed to fetch upload count: {}", e);
                None
            }
        };

        Ok(ProfileSummary {
            display_name: user.display_name,
            email: user.email,
            photo_url: user.photo_url,
            joined: user.created_at,
            upload_count,
        })
    }

    pub async fn rename(&self, name: &str) -> Result<CurrentUser> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid("Name cannot be empty"));
        }
        let user = self
            .auth
            .update_profile(&ProfileUpdate::display_name(name))
            .await?;
        tracing::info!("Display name changed to {}", name);
        Ok(user)
    }

    pub async fn replace_photo(
        &self,
        file: SelectedFile,
        store: &impl PhotoStore,
    ) -> Result<CurrentUser> {
        self.auth.require_user()?;
        let url = store.store_photo(file).await?;
        let user = self
            .auth
            .update_profile(&ProfileUpdate::photo_url(url))
            .await?;
        tracing::info!("Profile photo updated");
        Ok(user)
    }
}
