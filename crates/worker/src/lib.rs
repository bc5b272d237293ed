//! Completion tracking for spawned async work.
//!
//! This crate provides the shared coordination point used by editor-side
//! tooling that shells out to external commands:
//! * `Executor`: tracks in-flight tasks, exposes a live count and drain notifications
//! * `Tracked`: handle yielding exactly what a tracked task produced
//! * `spawn_buffer`: runs a child process as a tracked task and collects its stdout

#![warn(missing_docs)]

use std::any::Any;

mod error;
mod executor;
mod process;
mod spawn;

pub use error::{Result, SpawnError};
pub use executor::{AllSettled, Executor, ExecutorSnapshot, Subscription, Tracked};
pub use process::SpawnOptions;

/// Extracts a readable message from a panic payload.
///
/// Returns `None` for payloads that are neither `&str` nor `String`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return Some((*msg).to_string());
	}
	payload.downcast_ref::<String>().cloned()
}

#[cfg(test)]
mod panic_tests;
