//! Composite keys identifying a rendered view, and their URI form.
//!
//! A [`ViewKey`] travels between the editor, the plugin host and the plugins
//! as a single URI-shaped string:
//!
//! ```text
//! view[+<doc scheme>]:<doc authority and path>[?pluginId=<id>][&viewId=<id>]
//! ```
//!
//! Consumers must treat the string as opaque and go through
//! [`view_key_to_string`] and [`uri_to_view_key`] rather than parsing it by
//! hand. Ids are recovered by matching word characters only, so keys whose ids
//! contain anything else do not survive a round trip.

use std::str::FromStr;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Position, Url};

/// Scheme of every view URI, and prefix of schemes derived from a document.
pub const VIEW_SCHEME: &str = "view";

/// URI standing in for the empty string, which [`Url`] cannot parse.
const EMPTY_URI: &str = "file:///";

static PLUGIN_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"pluginId=([[:word:]]+)").expect("valid pluginId pattern"));
static VIEW_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"viewId=([[:word:]]+)").expect("valid viewId pattern"));

/// A composite key identifying a particular view.
///
/// Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewKey {
	/// Location of the document that the view represents.
	pub doc_uri: String,
	/// ID that is globally unique among plugins.
	pub plugin_id: String,
	/// ID that is unique among the views belonging to the plugin.
	pub view_id: String,
}

/// Errors from converting between [`ViewKey`] and its URI form.
#[derive(Debug, Error)]
pub enum ViewKeyError {
	/// The key's `doc_uri` is not a URI.
	#[error("invalid document URI {uri:?}: {source}")]
	InvalidDocUri {
		/// The offending document URI.
		uri: String,
		/// Why it failed to parse.
		source: url::ParseError,
	},

	/// A view key string is not a URI.
	#[error("invalid view URI {uri:?}: {source}")]
	InvalidUri {
		/// The offending input.
		uri: String,
		/// Why it failed to parse.
		source: url::ParseError,
	},
}

impl ViewKey {
	/// Creates a key from its three parts.
	pub fn new(doc_uri: impl Into<String>, plugin_id: impl Into<String>, view_id: impl Into<String>) -> Self {
		Self {
			doc_uri: doc_uri.into(),
			plugin_id: plugin_id.into(),
			view_id: view_id.into(),
		}
	}

	/// Serializes this key; see [`view_key_to_string`].
	pub fn to_uri_string(&self) -> Result<String, ViewKeyError> {
		view_key_to_string(self)
	}

	/// Deserializes a parsed view URI; see [`uri_to_view_key`].
	pub fn from_uri(uri: &Url) -> Self {
		uri_to_view_key(uri)
	}
}

impl FromStr for ViewKey {
	type Err = ViewKeyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		parse_view_key(s)
	}
}

/// Serializes a view key to a URI-compatible string.
///
/// The base of the URI is the source document with its scheme replaced by
/// `view+<doc scheme>`, or `view:/` without a document. A non-empty
/// `pluginId` and/or `viewId` replace the query. The result is percent-decoded
/// once, so it is meant for display and for [`parse_view_key`], not as a
/// strictly escaped URI.
pub fn view_key_to_string(key: &ViewKey) -> Result<String, ViewKeyError> {
	let params: Vec<String> = [("pluginId", &key.plugin_id), ("viewId", &key.view_id)]
		.into_iter()
		.filter(|(_, value)| !value.is_empty())
		.map(|(name, value)| format!("{name}={value}"))
		.collect();
	let query = (!params.is_empty()).then(|| params.join("&"));

	let encoded = if key.doc_uri.is_empty() {
		let mut out = format!("{VIEW_SCHEME}:/");
		if let Some(query) = &query {
			out.push('?');
			out.push_str(query);
		}
		out
	} else {
		let doc = Url::parse(&key.doc_uri).map_err(|source| ViewKeyError::InvalidDocUri {
			uri: key.doc_uri.clone(),
			source,
		})?;
		let scheme = format!("{VIEW_SCHEME}+{}", doc.scheme());
		compose(&scheme, &doc, query.as_deref().or(doc.query()), doc.fragment())
	};

	Ok(decode(&encoded))
}

/// Deserializes a view URI into a [`ViewKey`].
///
/// Strips a leading `view+` from the scheme and drops query and fragment to
/// recover the document URI. Ids are taken from the first `pluginId=` and
/// `viewId=` matches in the decoded query; missing ids decode as empty.
pub fn uri_to_view_key(uri: &Url) -> ViewKey {
	let scheme = uri.scheme();
	let doc_scheme = scheme.strip_prefix("view+").unwrap_or(scheme);
	let doc = compose(doc_scheme, uri, None, None);
	// Re-parse under the document's own scheme so e.g. `file:/a` comes out as `file:///a`.
	let doc = Url::parse(&doc).map(String::from).unwrap_or(doc);

	let query = uri.query().map(decode).unwrap_or_default();
	ViewKey {
		doc_uri: decode(&doc),
		plugin_id: capture(&PLUGIN_ID, &query),
		view_id: capture(&VIEW_ID, &query),
	}
}

/// Parses `input` as a URI and deserializes it with [`uri_to_view_key`].
///
/// The empty string stands for the empty URI and decodes to a `file:///`
/// document with no ids.
pub fn parse_view_key(input: &str) -> Result<ViewKey, ViewKeyError> {
	let uri = if input.is_empty() { EMPTY_URI } else { input };
	let uri = Url::parse(uri).map_err(|source| ViewKeyError::InvalidUri {
		uri: input.to_string(),
		source,
	})?;
	Ok(uri_to_view_key(&uri))
}

/// Serializes the authority and path of `uri` under `scheme`.
///
/// [`Url::set_scheme`] refuses to move between special and non-special
/// schemes, so the string is assembled by hand. An empty authority is omitted.
fn compose(scheme: &str, uri: &Url, query: Option<&str>, fragment: Option<&str>) -> String {
	let authority = &uri[Position::BeforeUsername..Position::AfterPort];
	let mut out = String::with_capacity(scheme.len() + uri.as_str().len() + 8);
	out.push_str(scheme);
	out.push(':');
	if !authority.is_empty() {
		out.push_str("//");
		out.push_str(authority);
	}
	out.push_str(uri.path());
	if let Some(query) = query {
		out.push('?');
		out.push_str(query);
	}
	if let Some(fragment) = fragment {
		out.push('#');
		out.push_str(fragment);
	}
	out
}

fn decode(s: &str) -> String {
	percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn capture(pattern: &Regex, haystack: &str) -> String {
	pattern
		.captures(haystack)
		.and_then(|caps| caps.get(1))
		.map(|m| m.as_str().to_string())
		.unwrap_or_default()
}
