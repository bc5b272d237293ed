//! Payloads exchanged with command plugins.
//!
//! Requests and responses are externally tagged: each JSON document holds
//! exactly one key naming the message kind (`initialize`, `onchange`, or
//! `error` for responses).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// General wrapper for all requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Request {
	/// Sent once before any other request.
	Initialize(InitializeRequest),
	/// Notifies the plugin of a change it may react to.
	OnChange(OnChangeRequest),
}

/// General wrapper for all responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
	/// Reply to [`Request::Initialize`].
	Initialize(InitializeResponse),
	/// Reply to [`Request::OnChange`].
	OnChange(OnChangeResponse),
	/// The plugin failed to handle the request.
	Error(ErrorObject),
}

/// Capabilities announced by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitializeRequest {
	/// Free-form client capabilities.
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub capabilities: Map<String, Value>,
}

/// Capabilities announced by the plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitializeResponse {
	/// Omitted by plugins with nothing to announce.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub capabilities: Option<ServerCapabilities>,
}

/// What the plugin can do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
	/// Diagram rendering support.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub diagrams: Option<DiagramCapabilities>,
}

/// Diagram types the plugin knows about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramCapabilities {
	/// One entry per diagram type.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub availabilities: Vec<DiagramAvailability>,
}

/// Whether one diagram type can be produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramAvailability {
	/// The diagram type.
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub kind: Option<DiagramDescriptor>,
	/// Whether the type can be produced now.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub available: Option<bool>,
	/// If not available, the reason why.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

/// Body of an `onchange` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnChangeRequest {
	/// What changed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub change: Option<Change>,
	/// Client state at the time of the change.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub context: Option<Context>,
}

/// A single change to a single file that the plugin may react to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
	/// The action that caused the change.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub action: Option<Action>,
	/// The surface in the client where the change originated.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<Source>,
	/// The path to the file that changed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file_path: Option<String>,
	/// Action specific details, passed through untouched.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub detail: Option<Value>,
}

/// Kind of edit behind a [`Change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
	/// Not reported by the client.
	UnspecifiedAction,
	/// An element was added.
	Add,
	/// An element was modified.
	Modify,
	/// An element was removed.
	Remove,
	/// A file was created.
	CreateFile,
	/// A file was saved.
	SaveFile,
	/// A file was deleted.
	DeleteFile,
}

/// Client surface a [`Change`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
	/// Not reported by the client.
	UnspecifiedSource,
	/// The text editor.
	Text,
	/// A rendered diagram.
	Diagram,
	/// A plugin-defined surface.
	Custom,
}

/// State of the client when a change happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
	/// The path to the client's currently focused file.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file_path: Option<String>,
	/// The content of the focused file.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub file_content: Option<String>,
	/// The path to the Sysl root.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sysl_root: Option<String>,
	/// The compiled module of the focused file, base64 encoded.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub module: Option<String>,
	/// The view where the change occurred.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub view_id: Option<String>,
	/// The position the client is focused on.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub focus: Option<Value>,
	/// Plugin settings from the client configuration.
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub settings: Map<String, Value>,
}

/// Body of an `onchange` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnChangeResponse {
	/// Diagrams to show, in display order.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub render_diagram: Vec<Diagram>,
}

/// One diagram to render. The content is passed through to the renderer untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
	/// The diagram type.
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub kind: Option<DiagramDescriptor>,
	/// Renderer input.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub content: Option<Value>,
}

impl Diagram {
	/// Returns the `templates.diagramLabel` of the content, if set.
	pub fn label(&self) -> Option<&str> {
		self.content.as_ref()?.pointer("/templates/diagramLabel")?.as_str()
	}
}

/// Identity and presentation of a diagram type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramDescriptor {
	/// Stable id; used as the `viewId` of rendered views.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Longer description for menus.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Icon name or path.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub icon: Option<String>,
}

/// Error reported by a plugin instead of a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
	/// Plugin-defined error code.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code: Option<i64>,
	/// Human readable description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Extra detail, passed through untouched.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl fmt::Display for ErrorObject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.message.as_deref().unwrap_or("unknown error"))?;
		if let Some(code) = self.code {
			write!(f, " (code {code})")?;
		}
		Ok(())
	}
}

impl Request {
	/// An initialize request without client capabilities.
	pub fn initialize() -> Self {
		Self::Initialize(InitializeRequest::default())
	}

	/// An onchange request for `change` in `context`.
	pub fn on_change(change: Change, context: Context) -> Self {
		Self::OnChange(OnChangeRequest {
			change: Some(change),
			context: Some(context),
		})
	}

	/// Returns the message kind as it appears on the wire.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Initialize(_) => "initialize",
			Self::OnChange(_) => "onchange",
		}
	}

	/// Returns a copy with the large context payloads replaced by their size.
	pub fn truncated(&self) -> Self {
		let Self::OnChange(req) = self else {
			return self.clone();
		};
		let context = req.context.as_ref().map(|ctx| Context {
			file_content: Some(size_placeholder(ctx.file_content.as_deref())),
			module: Some(size_placeholder(ctx.module.as_deref())),
			..ctx.clone()
		});
		Self::OnChange(OnChangeRequest {
			change: req.change.clone(),
			context,
		})
	}
}

impl Response {
	/// Returns the message kind as it appears on the wire.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Initialize(_) => "initialize",
			Self::OnChange(_) => "onchange",
			Self::Error(_) => "error",
		}
	}
}

fn size_placeholder(value: Option<&str>) -> String {
	format!("<{} B>", value.map_or(0, str::len))
}
