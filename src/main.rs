//! git-events - change data capture for git repositories
//!
//! Entry point for the git-events server.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use git_events::dispatch::SubscriptionRegistry;
use git_events::events::{FilterConfig, FilterPipeline, Topic};
use git_events::repository::{Credentials, GitRepository, DEFAULT_GIT_USER, DEFAULT_REMOTE};
use git_events::server::{init_tracing, App, AppState, ServerConfig, TracingConfig};
use git_events::sync::Poller;
use git_events::{Config, Result};

/// git-events - stream file changes of a git branch to subscribers
#[derive(Parser, Debug)]
#[command(name = "git-events")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Git URL to clone when the working directory holds no repository
    #[arg(long, env = "GIT_EVENTS_GIT_URL")]
    git_url: Option<String>,

    /// Git branch to run syncing on
    #[arg(long, env = "GIT_EVENTS_GIT_BRANCH", default_value = "master")]
    git_branch: String,

    /// Directory to pull to
    #[arg(long, env = "GIT_EVENTS_GIT_DIR", default_value = "/var/gitevents/data")]
    git_dir: PathBuf,

    /// Remote to fetch from
    #[arg(long, env = "GIT_EVENTS_GIT_REMOTE", default_value = DEFAULT_REMOTE)]
    git_remote: String,

    /// Git user for SSH
    #[arg(long, env = "GIT_EVENTS_GIT_USER", default_value = DEFAULT_GIT_USER)]
    git_user: String,

    /// SSH private key; the SSH agent is used when unset
    #[arg(long, env = "GIT_EVENTS_SSH_PRIVATE_KEY")]
    ssh_private_key: Option<PathBuf>,

    /// SSH public key matching the private key
    #[arg(long, env = "GIT_EVENTS_SSH_PUBLIC_KEY")]
    ssh_public_key: Option<PathBuf>,

    /// Passphrase for the SSH private key
    #[arg(long, env = "GIT_EVENTS_SSH_PASSPHRASE", hide_env_values = true)]
    ssh_passphrase: Option<String>,

    /// Poll interval in seconds
    #[arg(long, env = "GIT_EVENTS_INTERVAL", default_value = "300")]
    interval: u64,

    /// Host address to bind to
    #[arg(long, env = "GIT_EVENTS_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "GIT_EVENTS_PORT", default_value = "9000")]
    port: u16,

    /// Seconds a single send to a subscriber may block
    #[arg(long, env = "GIT_EVENTS_SEND_TIMEOUT", default_value = "5")]
    send_timeout: u64,

    /// Events buffered per subscriber
    #[arg(long, env = "GIT_EVENTS_SUBSCRIBER_BUFFER", default_value = "64")]
    subscriber_buffer: usize,

    /// Paths never reported
    #[arg(long, env = "GIT_EVENTS_IGNORE_PATHS", value_delimiter = ',')]
    ignore_path: Vec<String>,

    /// Gitignore-style patterns never reported
    #[arg(long, env = "GIT_EVENTS_IGNORE_PATTERNS", value_delimiter = ',')]
    ignore_pattern: Vec<String>,

    /// Topics never reported (Added, Deleted, Modified, Renamed, Copied)
    #[arg(long, env = "GIT_EVENTS_EXCLUDE_TOPICS", value_delimiter = ',')]
    exclude_topic: Vec<Topic>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GIT_EVENTS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "GIT_EVENTS_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            repo_url: self.git_url,
            branch: self.git_branch,
            repo_dir: self.git_dir,
            remote: self.git_remote,
            interval_secs: self.interval,
            host: self.host,
            port: self.port,
            log_level: self.log_level,
            log_json: self.log_json,
            send_timeout_secs: self.send_timeout,
            subscriber_buffer: self.subscriber_buffer,
            filter: FilterConfig {
                ignored_paths: self.ignore_path,
                ignore_patterns: self.ignore_pattern,
                excluded_topics: self.exclude_topic,
            },
            credentials: Credentials {
                user: self.git_user,
                private_key: self.ssh_private_key,
                public_key: self.ssh_public_key,
                passphrase: self.ssh_passphrase,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse().into_config();

    init_tracing(&TracingConfig {
        level: config.log_level.clone(),
        json: config.log_json,
    });

    tracing::info!("git-events v{} starting...", env!("CARGO_PKG_VERSION"));
    tracing::debug!(?config, "Configuration loaded");

    config.validate()?;
    let filters = FilterPipeline::from_config(&config.filter)?;

    let repo_dir = config.repo_dir.clone();
    let repo_url = config.repo_url.clone();
    let branch = config.branch.clone();
    let remote = config.remote.clone();
    let credentials = config.credentials.clone();
    let repository = tokio::task::spawn_blocking(move || {
        GitRepository::open_or_clone(&repo_dir, repo_url.as_deref(), &branch, &credentials)
            .map(|repo| repo.with_remote(remote).with_credentials(credentials))
    })
    .await
    .map_err(|e| git_events::Error::internal(format!("repository setup panicked: {e}")))??;

    tracing::info!(
        path = %config.repo_dir.display(),
        branch = %config.branch,
        filters = filters.len(),
        "Working copy ready"
    );

    let registry = Arc::new(SubscriptionRegistry::new(config.subscriber_buffer));
    let poller = Poller::new(
        repository,
        Arc::clone(&registry),
        filters,
        config.poller_config(),
    );
    let state = AppState::new(registry, poller.status());

    let server_config = ServerConfig {
        host: config.host,
        port: config.port,
        ..Default::default()
    };

    App::new(server_config, state).run(poller).await
}
