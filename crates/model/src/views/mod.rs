//! Addressing of views rendered from Sysl documents.

pub mod key;

pub use key::{ViewKey, ViewKeyError, parse_view_key, uri_to_view_key, view_key_to_string};
