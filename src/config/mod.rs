//! Configuration management for git-events.
//!
//! The bootstrap layer fills a `Config` from:
//! - Command-line arguments (highest priority)
//! - Environment variables
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::Config;
