//! Error types for plugin configuration and calls.

use std::path::PathBuf;

use sysl_worker::SpawnError;
use thiserror::Error;

use crate::protocol::ErrorObject;

/// Errors that can occur when loading a plugin descriptor.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a descriptor file.
	#[error("I/O error reading {path}: {source}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		source: std::io::Error,
	},

	/// Error parsing TOML syntax or shape.
	#[error("invalid plugin config{}: {source}", path.as_ref().map(|p| format!(" {}", p.display())).unwrap_or_default())]
	Parse {
		/// Path to the file, when loaded from disk.
		path: Option<PathBuf>,
		/// The underlying TOML error.
		source: toml::de::Error,
	},
}

/// Errors from calling a command plugin.
#[derive(Debug, Error)]
pub enum ClientError {
	/// The plugin has no `[command]` section.
	#[error("plugin {plugin} is not a command plugin")]
	NotCommandPlugin {
		/// Plugin id.
		plugin: String,
	},

	/// The request could not be serialized.
	#[error("failed to encode request for plugin {plugin}: {source}")]
	Encode {
		/// Plugin id.
		plugin: String,
		/// The underlying JSON error.
		source: serde_json::Error,
	},

	/// The plugin process failed.
	#[error("plugin {plugin}: {source}")]
	Spawn {
		/// Plugin id.
		plugin: String,
		/// The underlying process error.
		source: SpawnError,
	},

	/// The plugin exited successfully without writing a response.
	#[error("plugin {plugin} returned no response")]
	EmptyResponse {
		/// Plugin id.
		plugin: String,
	},

	/// The plugin wrote something that is not a response.
	#[error("failed to decode response from plugin {plugin}: {source}")]
	Decode {
		/// Plugin id.
		plugin: String,
		/// The underlying JSON error.
		source: serde_json::Error,
	},

	/// The plugin answered with an `error` response.
	#[error("plugin {plugin} responded with error: {error}")]
	Plugin {
		/// Plugin id.
		plugin: String,
		/// Error reported by the plugin.
		error: ErrorObject,
	},

	/// The plugin answered a request with a response of another kind.
	#[error("plugin {plugin} answered {expected} with {actual}")]
	UnexpectedResponse {
		/// Plugin id.
		plugin: String,
		/// Kind of the request.
		expected: &'static str,
		/// Kind of the response received.
		actual: &'static str,
	},
}

/// Result type for plugin calls.
pub type Result<T> = std::result::Result<T, ClientError>;
