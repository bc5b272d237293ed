//! Error types for child process execution.

use std::process::ExitStatus;

use thiserror::Error;

/// Errors produced by [`Executor::spawn_buffer`](crate::Executor::spawn_buffer).
#[derive(Debug, Error)]
pub enum SpawnError {
	/// The process could not be started.
	#[error("failed to spawn {command}: {source}")]
	Spawn {
		/// Program that was invoked.
		command: String,
		/// The underlying I/O error.
		source: std::io::Error,
	},

	/// Waiting for the process or reading its output failed.
	#[error("failed to collect output of {command}: {source}")]
	Wait {
		/// Program that was invoked.
		command: String,
		/// The underlying I/O error.
		source: std::io::Error,
	},

	/// The process ran but did not exit successfully.
	#[error("{command} exited unsuccessfully ({status})")]
	Exit {
		/// Program that was invoked.
		command: String,
		/// Final status reported by the OS.
		status: ExitStatus,
	},
}

impl SpawnError {
	/// Returns the exit code when the process terminated on its own.
	pub fn exit_code(&self) -> Option<i32> {
		match self {
			Self::Exit { status, .. } => status.code(),
			_ => None,
		}
	}
}

/// Result type for child process execution.
pub type Result<T> = std::result::Result<T, SpawnError>;
