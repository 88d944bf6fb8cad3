use crate::cli::Cli;
use crate::global::SnapshareHome;
use crate::models::CurrentUser;
use crate::services::backend::HttpBackend;
use crate::services::identity::{load_session, AuthService, IdentityToolkitProvider, SessionStore};
use crate::Config;
use anyhow::{Context as _, Result};

/// Configuration and per-user state shared by every command.
pub struct Context {
    pub config: Config,
    pub home: SnapshareHome,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = Config::load(&cli.config)?;
        if let Some(ref url) = cli.backend_url {
            config.backend.base_url = url.clone();
        }
        if let Some(ref key) = cli.api_key {
            config.identity.api_key = key.clone();
        }
        config.validate()?;

        let home = SnapshareHome::init()?;
        Ok(Self { config, home })
    }

    pub async fn auth(&self) -> Result<AuthService<IdentityToolkitProvider>> {
        let provider = IdentityToolkitProvider::new(
            &self.config.identity.endpoint,
            &self.config.identity.api_key,
            self.config.backend.request_timeout(),
        )
        .context("Identity provider is not configured (set identity.api_key or SNAPSHARE_API_KEY)")?
        .with_token_endpoint(&self.config.identity.token_endpoint);

        let mut auth = AuthService::new(provider, SessionStore::new());
        if self.config.identity.persist_session {
            auth = auth.persist_to(self.home.session_path.clone());
        }
        auth.restore().await?;
        Ok(auth)
    }

    /// Signed-in user from the last run, if sessions are kept. With an
    /// identity provider configured a stale token is refreshed on the way.
    pub async fn saved_user(&self) -> Result<Option<CurrentUser>> {
        if !self.config.identity.persist_session {
            return Ok(None);
        }
        if self.config.identity.api_key.is_empty() {
            return Ok(load_session(&self.home.session_path)?);
        }
        Ok(self.auth().await?.current())
    }

    pub async fn require_user(&self) -> Result<CurrentUser> {
        self.saved_user()
            .await?
            .context("Not signed in. Run `snapshare login` first.")
    }

    pub fn backend(&self, user: Option<&CurrentUser>) -> Result<HttpBackend> {
        let backend = HttpBackend::new(
            &self.config.backend.base_url,
            self.config.backend.request_timeout(),
        )?;
        Ok(match user {
            Some(user) => backend.with_access_token(user.id_token.clone()),
            None => backend,
        })
    }
}
