//! REST media backend seam.
//!
//! [`MediaBackend`] is the contract the stores talk to; [`HttpBackend`] speaks
//! the HTTP surface of the media server with `reqwest`.

use crate::error::{Error, Result};
use crate::models::{MediaId, MediaItem, MediaPatch, MediaScope};
use crate::services::upload::UploadRequest;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// What the backend answered to a create call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReceipt {
    pub items: Vec<MediaItem>,
}

pub trait MediaBackend {
    async fn list_media(&self, scope: MediaScope) -> Result<Vec<MediaItem>>;
    async fn create_media(&self, request: UploadRequest) -> Result<UploadReceipt>;
    async fn update_media(&self, id: &MediaId, patch: &MediaPatch) -> Result<()>;
    async fn delete_media(&self, id: &MediaId) -> Result<()>;
    async fn notify_download(&self, id: &MediaId) -> Result<()>;
    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>>;
    /// Absolute location of a stored asset.
    fn asset_url(&self, url: &str) -> String;
}

impl<B: MediaBackend> MediaBackend for &B {
    async fn list_media(&self, scope: MediaScope) -> Result<Vec<MediaItem>> {
        (**self).list_media(scope).await
    }

    async fn create_media(&self, request: UploadRequest) -> Result<UploadReceipt> {
        (**self).create_media(request).await
    }

    async fn update_media(&self, id: &MediaId, patch: &MediaPatch) -> Result<()> {
        (**self).update_media(id, patch).await
    }

    async fn delete_media(&self, id: &MediaId) -> Result<()> {
        (**self).delete_media(id).await
    }

    async fn notify_download(&self, id: &MediaId) -> Result<()> {
        (**self).notify_download(id).await
    }

    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch_file(url).await
    }

    fn asset_url(&self, url: &str) -> String {
        (**self).asset_url(url)
    }
}

/// Bounds a backend call; an expired call fails with [`Error::Timeout`].
pub async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(timeout)),
    }
}

/// Pulls a human-readable message out of an error body: `{"message": ..}`,
/// `{"error": ..}`, or a short plain-text body.
pub fn server_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed
            .message
            .or(parsed.error)
            .filter(|m| !m.trim().is_empty());
    }
    if body.starts_with('{') || body.starts_with('<') || body.len() > 200 {
        return None;
    }
    Some(body.to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CreatedBody {
    One(MediaItem),
    Many(Vec<MediaItem>),
    #[allow(dead_code)]
    Other(serde_json::Value),
}

#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snapshare/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            access_token: None,
        })
    }

    /// Requests carry `Authorization: Bearer <token>` from now on.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = (!token.is_empty()).then_some(token);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }

    /// The access token only goes to the backend's own origin.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let same_origin = url.origin() == self.base_url.origin();
        let req = self.client.request(method, url);
        match self.access_token {
            Some(ref token) if same_origin => req.bearer_auth(token),
            _ => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("Backend rejected request with HTTP {}", status.as_u16());
        Err(Error::Server {
            status: status.as_u16(),
            message: server_message(&body),
        })
    }
}

impl MediaBackend for HttpBackend {
    async fn list_media(&self, scope: MediaScope) -> Result<Vec<MediaItem>> {
        let url = self.endpoint(scope.path())?;
        tracing::debug!("GET {}", url);
        let response = self.send(self.request(Method::GET, url)).await?;
        Ok(response.json::<Vec<MediaItem>>().await?)
    }

    async fn create_media(&self, request: UploadRequest) -> Result<UploadReceipt> {
        let url = self.endpoint(request.endpoint.path())?;
        tracing::debug!("POST {} ({} file(s))", url, request.files.len());

        let mut form = Form::new();
        for file in request.files {
            let part = Part::bytes(file.bytes)
                .file_name(file.name)
                .mime_str(&file.mime)?;
            form = form.part(crate::services::upload::FILE_FIELD, part);
        }
        for (name, value) in request.fields {
            form = form.text(name, value);
        }

        let response = self
            .send(self.request(Method::POST, url).multipart(form))
            .await?;
        let body = response.text().await?;
        let items = match serde_json::from_str::<CreatedBody>(&body) {
            Ok(CreatedBody::One(item)) => vec![item],
            Ok(CreatedBody::Many(items)) => items,
            Ok(CreatedBody::Other(_)) | Err(_) => Vec::new(),
        };
        Ok(UploadReceipt { items })
    }

    async fn update_media(&self, id: &MediaId, patch: &MediaPatch) -> Result<()> {
        let url = self.endpoint(&format!("/media/{}", id))?;
        tracing::debug!("PATCH {}", url);
        self.send(self.request(Method::PATCH, url).json(patch))
            .await?;
        Ok(())
    }

    async fn delete_media(&self, id: &MediaId) -> Result<()> {
        let url = self.endpoint(&format!("/media/{}", id))?;
        tracing::debug!("DELETE {}", url);
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn notify_download(&self, id: &MediaId) -> Result<()> {
        let url = self.endpoint("/media/download")?;
        tracing::debug!("POST {} for {}", url, id);
        self.send(
            self.request(Method::POST, url)
                .json(&serde_json::json!({ "mediaId": id })),
        )
        .await?;
        Ok(())
    }

    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
        let url = Url::parse(&self.asset_url(url))?;
        tracing::debug!("GET {}", url);
        let response = self.send(self.request(Method::GET, url)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    fn asset_url(&self, url: &str) -> String {
        if Url::parse(url).is_ok() {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}
