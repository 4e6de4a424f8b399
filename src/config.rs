//! Command-line and environment configuration.

use std::fmt;
use std::net::SocketAddr;

use clap::Parser;

use crate::sync::SyncOptions;

/// Keeps pull requests of stacked `@changes` branches pointed at the right base.
#[derive(Clone, Parser)]
#[command(name = "stack-sync", version, about)]
pub struct Config {
    /// Address the webhook server listens on.
    #[arg(long, env = "STACK_SYNC_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Secret GitHub signs webhook deliveries with.
    #[arg(long, env = "GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: String,

    /// Token used for GitHub API calls.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// API root for GitHub Enterprise, e.g. `https://ghe.example.com/api/v3`.
    #[arg(long, env = "GITHUB_API_URL")]
    pub github_api_url: Option<String>,

    /// Owner used in `owner:branch` PR head filters. Defaults to the pushed
    /// repository's owner.
    #[arg(long, env = "STACK_SYNC_HEAD_OWNER")]
    pub head_owner: Option<String>,

    /// Branch each PR is briefly retargeted to before its real base, forcing
    /// GitHub to recompute the diff. Also used when the base ref moves under
    /// an unchanged base name.
    #[arg(long, env = "STACK_SYNC_REFRESH_BASE_VIA")]
    pub refresh_base_via: Option<String>,
}

impl Config {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            refresh_base_via: self.refresh_base_via.clone(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen", &self.listen)
            .field("github_api_url", &self.github_api_url)
            .field("head_owner", &self.head_owner)
            .field("refresh_base_via", &self.refresh_base_via)
            .finish_non_exhaustive()
    }
}
