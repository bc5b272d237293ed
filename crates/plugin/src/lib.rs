//! Command plugin support for Sysl view tooling.
//!
//! A command plugin is an executable that reads one [`Request`] as JSON on
//! stdin and writes one [`Response`] on stdout. This crate provides:
//! * `protocol`: the request/response payload types
//! * `config`: TOML plugin descriptors
//! * `client`: a client that runs plugins as tracked tasks of a shared executor

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;

pub use client::CommandClient;
pub use config::{ClientOptions, CommandConfig, PluginConfig, RunOptions};
pub use error::{ClientError, ConfigError, Result};
pub use protocol::{Request, Response};
