//! Identity provider seam and the observable current-user session.

use crate::error::{Error, Result};
use crate::models::{CurrentUser, FederatedCredential, ProfileUpdate};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub trait IdentityProvider {
    async fn create_account(&self, email: &str, password: &str) -> Result<CurrentUser>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<CurrentUser>;
    async fn sign_in_with_provider(&self, credential: &FederatedCredential) -> Result<CurrentUser>;
    async fn sign_out(&self, user: &CurrentUser) -> Result<()>;
    async fn update_profile(&self, user: &CurrentUser, update: &ProfileUpdate) -> Result<CurrentUser>;
    /// Re-reads the provider's view of the account (e.g. creation time).
    async fn lookup(&self, user: &CurrentUser) -> Result<CurrentUser>;
    /// Trades the user's refresh token for a new id token.
    async fn refresh(&self, user: &CurrentUser) -> Result<CurrentUser>;
}

/// Current user, observable. Subscribing is "mount", dropping the
/// [`Subscription`] is "unmount".
#[derive(Clone, Debug)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Option<CurrentUser>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<CurrentUser> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish(&self, user: CurrentUser) {
        tracing::debug!("Session user is now {}", user.email);
        self.tx.send_replace(Some(user));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

pub struct Subscription {
    rx: watch::Receiver<Option<CurrentUser>>,
}

impl Subscription {
    pub fn current(&self) -> Option<CurrentUser> {
        self.rx.borrow().clone()
    }

    /// Waits for the next authentication change. `None` once the store is
    /// gone.
    pub async fn changed(&mut self) -> Option<Option<CurrentUser>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn unsubscribe(self) {}
}

/// Couples a provider with the session it feeds.
pub struct AuthService<P> {
    provider: P,
    session: SessionStore,
    session_file: Option<PathBuf>,
}

impl<P: IdentityProvider> AuthService<P> {
    pub fn new(provider: P, session: SessionStore) -> Self {
        Self {
            provider,
            session,
            session_file: None,
        }
    }

    /// Keeps the signed-in user in `path` between runs.
    pub fn persist_to(mut self, path: PathBuf) -> Self {
        self.session_file = Some(path);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn current(&self) -> Option<CurrentUser> {
        self.session.current()
    }

    pub fn require_user(&self) -> Result<CurrentUser> {
        self.current().ok_or(Error::NotSignedIn)
    }

    /// Publishes a previously persisted session, if any. A stale id token is
    /// refreshed first; if that fails the saved user is published as is.
    pub async fn restore(&self) -> Result<Option<CurrentUser>> {
        let Some(ref path) = self.session_file else {
            return Ok(None);
        };
        let Some(user) = load_session(path)? else {
            return Ok(None);
        };
        if user.refresh_token.is_empty() || !user.token_is_stale(Utc::now()) {
            self.session.publish(user.clone());
            return Ok(Some(user));
        }

        match self.provider.refresh(&user).await {
            Ok(fresh) => {
                tracing::debug!("Refreshed id token for {}", fresh.email);
                self.store(fresh.clone())?;
                Ok(Some(fresh))
            }
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                self.session.publish(user.clone());
                Ok(Some(user))
            }
        }
    }

    pub async fn create_account(&self, email: &str, password: &str) -> Result<CurrentUser> {
        let user = self.provider.create_account(email, password).await?;
        tracing::info!("Created account {}", user.email);
        self.signed_in(user).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<CurrentUser> {
        let user = self.provider.sign_in(email, password).await?;
        tracing::info!("Signed in as {}", user.email);
        self.signed_in(user).await
    }

    pub async fn sign_in_with_provider(&self, credential: &FederatedCredential) -> Result<CurrentUser> {
        let user = self.provider.sign_in_with_provider(credential).await?;
        tracing::info!("Signed in as {} via {}", user.email, credential.provider_id);
        self.signed_in(user).await
    }

    pub async fn sign_out(&self) -> Result<()> {
        if let Some(user) = self.current() {
            self.provider.sign_out(&user).await?;
        }
        self.session.clear();
        if let Some(ref path) = self.session_file {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        tracing::info!("Signed out");
        Ok(())
    }

    /// On failure the published user is left as it was.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<CurrentUser> {
        let user = self.require_user()?;
        let updated = self.provider.update_profile(&user, update).await?;
        self.store(updated.clone())?;
        Ok(updated)
    }

    async fn signed_in(&self, user: CurrentUser) -> Result<CurrentUser> {
        let user = match self.provider.lookup(&user).await {
            Ok(full) => full,
            Err(e) => {
                tracing::warn!("Account lookup failed: {}", e);
                user
            }
        };
        self.store(user.clone())?;
        Ok(user)
    }

    fn store(&self, user: CurrentUser) -> Result<()> {
        if let Some(ref path) = self.session_file {
            let content =
                serde_json::to_string_pretty(&user).map_err(|e| Error::Decode(e.to_string()))?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        self.session.publish(user);
        Ok(())
    }
}

/// Reads a session written by [`AuthService::persist_to`]. A missing file is
/// no session.
pub fn load_session(path: &Path) -> Result<Option<CurrentUser>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let user = serde_json::from_str(&content)
        .map_err(|e| Error::Decode(format!("session file {}: {}", path.display(), e)))?;
    Ok(Some(user))
}

/// Identity-Toolkit-style REST provider (`/v1/accounts:*?key=...`).
#[derive(Clone, Debug)]
pub struct IdentityToolkitProvider {
    client: Client,
    endpoint: String,
    token_endpoint: String,
    api_key: String,
}

pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Seconds, as a string.
    #[serde(default)]
    expires_in: Option<String>,
}

/// Secure-token responses are snake_case.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    /// Milliseconds since the epoch, as a string.
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<&'a str>,
    return_secure_token: bool,
}

impl IdentityToolkitProvider {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::MissingField("identity.api_key"));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Where refresh tokens are exchanged (`{endpoint}/v1/token`).
    pub fn with_token_endpoint(mut self, endpoint: &str) -> Self {
        self.token_endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/v1/accounts:{}", self.endpoint, method);
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn read<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ProviderErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("identity provider returned HTTP {}", status.as_u16()));
            return Err(Error::Identity(message));
        }
        serde_json::from_str(&text).map_err(|e| Error::Decode(e.to_string()))
    }

    fn to_user(resp: AccountResponse, fallback: Option<&CurrentUser>) -> CurrentUser {
        CurrentUser {
            uid: resp.local_id,
            email: resp
                .email
                .or_else(|| fallback.map(|u| u.email.clone()))
                .unwrap_or_default(),
            display_name: resp
                .display_name
                .or_else(|| fallback.and_then(|u| u.display_name.clone())),
            photo_url: resp
                .photo_url
                .or_else(|| fallback.and_then(|u| u.photo_url.clone())),
            created_at: fallback.and_then(|u| u.created_at),
            id_token: resp
                .id_token
                .or_else(|| fallback.map(|u| u.id_token.clone()))
                .unwrap_or_default(),
            refresh_token: resp
                .refresh_token
                .or_else(|| fallback.map(|u| u.refresh_token.clone()))
                .unwrap_or_default(),
            expires_at: expiry(resp.expires_in.as_deref())
                .or_else(|| fallback.and_then(|u| u.expires_at)),
        }
    }
}

fn expiry(expires_in: Option<&str>) -> Option<DateTime<Utc>> {
    let secs: i64 = expires_in?.trim().parse().ok()?;
    Some(Utc::now() + chrono::Duration::seconds(secs))
}

pub fn parse_millis(value: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = value.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

impl IdentityProvider for IdentityToolkitProvider {
    async fn create_account(&self, email: &str, password: &str) -> Result<CurrentUser> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let resp: AccountResponse = self.call("signUp", &body).await?;
        Ok(Self::to_user(resp, None))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<CurrentUser> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let resp: AccountResponse = self.call("signInWithPassword", &body).await?;
        Ok(Self::to_user(resp, None))
    }

    async fn sign_in_with_provider(&self, credential: &FederatedCredential) -> Result<CurrentUser> {
        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", &credential.id_token)
            .append_pair("providerId", &credential.provider_id)
            .finish();
        let body = json!({
            "postBody": post_body,
            "requestUri": "http://localhost",
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });
        let resp: AccountResponse = self.call("signInWithIdp", &body).await?;
        Ok(Self::to_user(resp, None))
    }

    async fn sign_out(&self, _user: &CurrentUser) -> Result<()> {
        // Tokens are bearer tokens; forgetting them locally is the sign-out.
        Ok(())
    }

    async fn update_profile(&self, user: &CurrentUser, update: &ProfileUpdate) -> Result<CurrentUser> {
        let request = UpdateRequest {
            id_token: &user.id_token,
            display_name: update.display_name.as_deref(),
            photo_url: update.photo_url.as_deref(),
            return_secure_token: true,
        };
        let body = serde_json::to_value(&request).map_err(|e| Error::Decode(e.to_string()))?;
        let resp: AccountResponse = self.call("update", &body).await?;
        Ok(Self::to_user(resp, Some(user)))
    }

    async fn lookup(&self, user: &CurrentUser) -> Result<CurrentUser> {
        let body = json!({ "idToken": user.id_token });
        let resp: LookupResponse = self.call("lookup", &body).await?;
        let found = resp
            .users
            .into_iter()
            .next()
            .ok_or_else(|| Error::Identity("account not found".to_string()))?;

        Ok(CurrentUser {
            email: found.email.unwrap_or_else(|| user.email.clone()),
            display_name: found.display_name.or_else(|| user.display_name.clone()),
            photo_url: found.photo_url.or_else(|| user.photo_url.clone()),
            created_at: found
                .created_at
                .as_deref()
                .and_then(parse_millis)
                .or(user.created_at),
            ..user.clone()
        })
    }

    async fn refresh(&self, user: &CurrentUser) -> Result<CurrentUser> {
        let url = format!("{}/v1/token", self.token_endpoint);
        tracing::debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", user.refresh_token.as_str()),
            ])
            .send()
            .await?;
        let resp: TokenResponse = Self::read(response).await?;
        if resp.user_id.as_deref().is_some_and(|id| id != user.uid) {
            return Err(Error::Identity("refreshed token belongs to another account".to_string()));
        }

        Ok(CurrentUser {
            expires_at: expiry(resp.expires_in.as_deref()),
            id_token: resp.id_token,
            refresh_token: resp.refresh_token.unwrap_or_else(|| user.refresh_token.clone()),
            ..user.clone()
        })
    }
}
