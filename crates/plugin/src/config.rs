//! TOML plugin descriptors.
//!
//! ```toml
//! id = "erd"
//! name = "Entity relationship diagrams"
//!
//! [command]
//! command = "sysl-erd"
//! args = ["--stdio"]
//! throttle_delay_ms = 250
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_THROTTLE_MS: u64 = 500;

/// Descriptor of one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginConfig {
	/// Globally unique plugin id; becomes the `pluginId` of its views.
	pub id: String,
	/// Human readable name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Present for plugins run as a command per request.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub command: Option<CommandConfig>,
}

/// How to run a command plugin and how the client should drive it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
	/// Process to run.
	#[serde(flatten)]
	pub run: RunOptions,
	/// Client-side behaviour.
	#[serde(flatten)]
	pub client: ClientOptions,
}

/// Details about how to invoke the plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
	/// Program to run.
	pub command: String,
	/// Arguments passed on every call.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub args: Vec<String>,
	/// Working directory of the plugin process.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cwd: Option<PathBuf>,
}

/// Client-side behaviour for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOptions {
	/// Minimum delay between change notifications sent to the plugin.
	#[serde(default = "default_throttle_ms")]
	pub throttle_delay_ms: u64,
	/// Root folder reported to the plugin as `syslRoot`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub workspace_folder: Option<PathBuf>,
}

fn default_throttle_ms() -> u64 {
	DEFAULT_THROTTLE_MS
}

impl Default for ClientOptions {
	fn default() -> Self {
		Self {
			throttle_delay_ms: DEFAULT_THROTTLE_MS,
			workspace_folder: None,
		}
	}
}

impl ClientOptions {
	/// Returns the throttle delay.
	pub fn throttle_delay(&self) -> Duration {
		Duration::from_millis(self.throttle_delay_ms)
	}
}

impl RunOptions {
	/// Runs `command` with `args`.
	pub fn new<I, S>(command: impl Into<String>, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			command: command.into(),
			args: args.into_iter().map(Into::into).collect(),
			cwd: None,
		}
	}
}

impl PluginConfig {
	/// Parses a descriptor from TOML text.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		toml::from_str(input).map_err(|source| ConfigError::Parse { path: None, source })
	}

	/// Reads and parses a descriptor file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		let config: Self = toml::from_str(&input).map_err(|source| ConfigError::Parse {
			path: Some(path.to_path_buf()),
			source,
		})?;
		tracing::debug!(plugin = %config.id, path = %path.display(), command = config.command.is_some(), "plugin config loaded");
		Ok(config)
	}
}
