//! git-events
//!
//! Change data capture for git repositories: polls a branch, turns new
//! history into typed file change events and streams them to subscribers.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod repository;
pub mod server;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
