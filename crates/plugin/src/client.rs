//! Client for command plugins.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sysl_model::ViewKey;
use sysl_worker::{Executor, SpawnOptions};
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::config::{ClientOptions, PluginConfig, RunOptions};
use crate::error::{ClientError, Result};
use crate::protocol::{Context, Diagram, InitializeResponse, OnChangeRequest, OnChangeResponse, Request, Response};

/// Runs a command plugin once per request.
///
/// Every call is a tracked task of the shared [`Executor`], so callers can
/// wait for all outstanding plugin work with [`Executor::all_settled`].
/// Change notifications are spaced by [`ClientOptions::throttle_delay`];
/// clones share that spacing.
#[derive(Debug, Clone)]
pub struct CommandClient {
	id: String,
	run: RunOptions,
	options: ClientOptions,
	executor: Executor,
	throttle: Throttle,
}

/// Spaces successive calls by a fixed delay.
#[derive(Debug, Clone)]
struct Throttle {
	delay: Duration,
	/// Time the most recent call was allowed through.
	last: Arc<Mutex<Option<Instant>>>,
}

impl Throttle {
	fn new(delay: Duration) -> Self {
		Self {
			delay,
			last: Arc::new(Mutex::new(None)),
		}
	}

	/// Waits until a call may go out and reserves that slot.
	async fn ready(&self) {
		let now = Instant::now();
		let deadline = {
			let mut last = self.last.lock();
			let slot = last.map_or(now, |prev| (prev + self.delay).max(now));
			*last = Some(slot);
			slot
		};
		if deadline > now {
			trace!(delay = ?(deadline - now), "plugin.throttled");
		}
		tokio::time::sleep_until(deadline).await;
	}
}

impl CommandClient {
	/// Creates a client for plugin `id`.
	pub fn new(id: impl Into<String>, run: RunOptions, options: ClientOptions, executor: Executor) -> Self {
		let throttle = Throttle::new(options.throttle_delay());
		Self {
			id: id.into(),
			run,
			options,
			executor,
			throttle,
		}
	}

	/// Creates a client from a descriptor with a `[command]` section.
	pub fn from_config(config: &PluginConfig, executor: Executor) -> Result<Self> {
		let Some(command) = &config.command else {
			return Err(ClientError::NotCommandPlugin { plugin: config.id.clone() });
		};
		Ok(Self::new(config.id.clone(), command.run.clone(), command.client.clone(), executor))
	}

	/// Returns the plugin id.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Returns the client options.
	pub fn options(&self) -> &ClientOptions {
		&self.options
	}

	/// Sends an initialize request.
	pub async fn initialize(&self) -> Result<InitializeResponse> {
		match self.call(&Request::initialize()).await? {
			Response::Initialize(res) => Ok(res),
			other => Err(self.unexpected("initialize", &other)),
		}
	}

	/// Notifies the plugin of a change and returns what it wants rendered.
	///
	/// Waits first if the previous notification went out less than the
	/// throttle delay ago.
	pub async fn on_change(&self, req: OnChangeRequest) -> Result<OnChangeResponse> {
		self.throttle.ready().await;
		match self.call(&Request::OnChange(req)).await? {
			Response::OnChange(res) => Ok(res),
			other => Err(self.unexpected("onchange", &other)),
		}
	}

	/// Sends a request to the plugin and returns its response.
	///
	/// An `error` response is returned as [`ClientError::Plugin`].
	pub async fn call(&self, request: &Request) -> Result<Response> {
		let input = serde_json::to_vec(request).map_err(|source| ClientError::Encode {
			plugin: self.id.clone(),
			source,
		})?;
		info!(
			plugin = %self.id,
			request = %serde_json::to_string(&request.truncated()).unwrap_or_default(),
			"calling plugin"
		);

		let mut options = SpawnOptions::default().input(input);
		options.cwd = self.run.cwd.clone();
		let stdout = self
			.executor
			.spawn_buffer(self.run.command.as_str(), self.run.args.iter().map(String::as_str), options)
			.await
			.map_err(|source| ClientError::Spawn {
				plugin: self.id.clone(),
				source,
			})?;

		if stdout.iter().all(u8::is_ascii_whitespace) {
			return Err(ClientError::EmptyResponse { plugin: self.id.clone() });
		}
		let response: Response = serde_json::from_slice(&stdout).map_err(|source| ClientError::Decode {
			plugin: self.id.clone(),
			source,
		})?;

		match response {
			Response::Error(error) => Err(ClientError::Plugin {
				plugin: self.id.clone(),
				error,
			}),
			response => {
				debug!(plugin = %self.id, response = response.kind(), "plugin call successful");
				Ok(response)
			}
		}
	}

	/// Builds the context for a change to `file_path`.
	pub fn context(&self, file_path: impl Into<String>, file_content: impl Into<String>) -> Context {
		Context {
			file_path: Some(file_path.into()),
			file_content: Some(file_content.into()),
			sysl_root: self.options.workspace_folder.as_ref().map(|p| p.display().to_string()),
			..Context::default()
		}
	}

	/// Addresses each diagram of `response` as a view of `doc_uri`.
	///
	/// The view id is the diagram type id, falling back to the diagram label,
	/// then the plugin id, then the diagram's position.
	pub fn view_keys<'a>(&self, doc_uri: &str, response: &'a OnChangeResponse) -> Vec<(ViewKey, &'a Diagram)> {
		response
			.render_diagram
			.iter()
			.enumerate()
			.map(|(i, diagram)| {
				let view_id = diagram
					.kind
					.as_ref()
					.and_then(|kind| kind.id.as_deref())
					.filter(|id| !id.is_empty())
					.or_else(|| diagram.label().filter(|label| !label.is_empty()))
					.map(str::to_string)
					.or_else(|| (!self.id.is_empty()).then(|| self.id.clone()))
					.unwrap_or_else(|| i.to_string());
				(ViewKey::new(doc_uri, self.id.as_str(), view_id), diagram)
			})
			.collect()
	}

	fn unexpected(&self, expected: &'static str, actual: &Response) -> ClientError {
		ClientError::UnexpectedResponse {
			plugin: self.id.clone(),
			expected,
			actual: actual.kind(),
		}
	}
}

#[cfg(test)]
mod tests;
