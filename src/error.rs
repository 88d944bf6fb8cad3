use crate::models::MediaId;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No file selected")]
    NoFileSelected,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0}")]
    Invalid(String),

    #[error("could not reach the server: {0}")]
    Network(String),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("server rejected the request (HTTP {status}){}", .message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    Server { status: u16, message: Option<String> },

    #[error("{0}")]
    Identity(String),

    #[error("media {0} is already being updated")]
    Busy(MediaId),

    #[error("media {0} not found")]
    NotFound(MediaId),

    #[error("not signed in")]
    NotSignedIn,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Local validation failures never reach the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NoFileSelected | Self::MissingField(_) | Self::Invalid(_)
        )
    }

    /// Text for a transient user notification. Transport and server errors
    /// without a server-provided message fall back to `generic`.
    pub fn notification(&self, generic: &str) -> String {
        match self {
            Self::Server {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Server { message: None, .. }
            | Self::Network(_)
            | Self::Timeout(_)
            | Self::Decode(_) => generic.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Invalid(format!("invalid URL: {err}"))
    }
}
