//! Shared model types for Sysl view tooling.

pub mod views;

pub use views::{ViewKey, ViewKeyError};
