pub mod auth;
pub mod context;
pub mod gallery;
pub mod profile;
pub mod upload;
pub mod uploads;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snapshare")]
#[command(version)]
#[command(about = "Share images and videos from the command line", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "snapshare.toml", env = "SNAPSHARE_CONFIG")]
    pub config: PathBuf,

    /// Overrides `backend.base_url`.
    #[arg(long, env = "SNAPSHARE_BACKEND_URL", global = true)]
    pub backend_url: Option<String>,

    /// Overrides `identity.api_key`.
    #[arg(long, env = "SNAPSHARE_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    Login {
        #[arg(long)]
        email: String,
    },
    /// Sign in with a token from a federated provider
    LoginProvider {
        #[arg(long, default_value = "google.com")]
        provider_id: String,
        #[arg(long)]
        id_token: String,
    },
    Logout,
    Whoami,
    Gallery {
        #[arg(long, default_value = "category")]
        group_by: String,
        /// Show your own uploads instead of the public gallery
        #[arg(long)]
        mine: bool,
    },
    Download {
        id: String,
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long)]
        mine: bool,
    },
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, default_value = "image")]
        kind: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long)]
        private: bool,
    },
    Uploads {
        #[command(subcommand)]
        command: UploadsCommand,
    },
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
}

#[derive(Subcommand)]
pub enum UploadsCommand {
    List,
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "type")]
        media_type: Option<String>,
    },
    /// Set visibility; toggles when neither flag is given
    Privacy {
        id: String,
        #[arg(long, conflicts_with = "public")]
        private: bool,
        #[arg(long)]
        public: bool,
    },
    Delete {
        id: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommand {
    Show,
    Rename { name: String },
    Photo { path: PathBuf },
}
