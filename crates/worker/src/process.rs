//! Child processes run as tracked tasks.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, SpawnError};
use crate::executor::{Executor, Tracked};

/// Options for [`Executor::spawn_buffer`].
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
	/// Bytes written to the child's stdin before it is closed.
	pub input: Option<Vec<u8>>,
	/// Working directory for the child.
	pub cwd: Option<PathBuf>,
	/// Extra environment variables.
	pub env: Vec<(String, String)>,
}

impl SpawnOptions {
	/// Sets the bytes fed to stdin.
	pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
		self.input = Some(input.into());
		self
	}

	/// Sets the working directory.
	pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
		self.cwd = Some(cwd.into());
		self
	}

	/// Adds one environment variable.
	pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.push((key.into(), value.into()));
		self
	}
}

impl Executor {
	/// Spawns `command` as a tracked task and resolves to its stdout.
	///
	/// Stdin receives [`SpawnOptions::input`] and is then closed. Stderr is
	/// forwarded to the log. A non-success exit status is an error even when
	/// the child wrote output.
	pub fn spawn_buffer<I, S>(&self, command: impl Into<String>, args: I, options: SpawnOptions) -> Tracked<Result<Vec<u8>>>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let command = command.into();
		let args: Vec<String> = args.into_iter().map(Into::into).collect();
		self.start(move || run_buffered(command, args, options))
	}
}

async fn run_buffered(command: String, args: Vec<String>, options: SpawnOptions) -> Result<Vec<u8>> {
	debug!(command = %command, args = ?args, stdin = options.input.is_some(), "spawn");

	let mut cmd = Command::new(&command);
	cmd.args(&args)
		.envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true);
	if let Some(cwd) = &options.cwd {
		cmd.current_dir(cwd);
	}

	let mut child = cmd.spawn().map_err(|source| SpawnError::Spawn {
		command: command.clone(),
		source,
	})?;

	let stdin = child.stdin.take();
	let input = options.input.unwrap_or_default();
	let feed = async move {
		let Some(mut stdin) = stdin else {
			return;
		};
		if !input.is_empty()
			&& let Err(error) = stdin.write_all(&input).await
		{
			// The child may exit without reading its input.
			debug!(%error, "spawn.stdin");
		}
	};

	let ((), output) = tokio::join!(feed, child.wait_with_output());
	let output = output.map_err(|source| SpawnError::Wait {
		command: command.clone(),
		source,
	})?;

	for line in String::from_utf8_lossy(&output.stderr).lines().filter(|l| !l.trim().is_empty()) {
		warn!(command = %command, "spawn stderr: {line}");
	}

	if !output.status.success() {
		return Err(SpawnError::Exit {
			command,
			status: output.status,
		});
	}
	debug!(command = %command, bytes = output.stdout.len(), "spawn.exit");
	Ok(output.stdout)
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;

	#[tokio::test]
	async fn collects_stdout_from_stdin() {
		let executor = Executor::new();
		let out = executor
			.spawn_buffer("cat", Vec::<String>::new(), SpawnOptions::default().input("hello"))
			.await
			.expect("cat should succeed");
		assert_eq!(out, b"hello");
		assert_eq!(executor.count(), 0);
	}

	#[tokio::test]
	async fn counts_process_while_running() {
		let executor = Executor::new();
		let task = executor.spawn_buffer("sh", ["-c", "sleep 0.05; printf done"], SpawnOptions::default());
		assert_eq!(executor.count(), 1);
		assert_eq!(task.await.expect("sh should succeed"), b"done");
		assert_eq!(executor.count(), 0);
	}

	#[tokio::test]
	async fn reports_nonzero_exit() {
		let executor = Executor::new();
		let err = executor
			.spawn_buffer("sh", ["-c", "echo oops >&2; exit 3"], SpawnOptions::default())
			.await
			.unwrap_err();
		assert!(matches!(err, SpawnError::Exit { .. }), "unexpected error: {err}");
		assert_eq!(err.exit_code(), Some(3));
		assert_eq!(executor.count(), 0);
	}

	#[tokio::test]
	async fn reports_missing_program() {
		let executor = Executor::new();
		let err = executor
			.spawn_buffer("sysl-worker-no-such-program", Vec::<String>::new(), SpawnOptions::default())
			.await
			.unwrap_err();
		assert!(matches!(err, SpawnError::Spawn { .. }), "unexpected error: {err}");
	}

	#[tokio::test]
	async fn applies_cwd_and_env() {
		let dir = std::env::temp_dir();
		let executor = Executor::new();
		let out = executor
			.spawn_buffer(
				"sh",
				["-c", "printf '%s' \"$SYSL_WORKER_TEST\""],
				SpawnOptions::default().cwd(&dir).env("SYSL_WORKER_TEST", "value"),
			)
			.await
			.expect("sh should succeed");
		assert_eq!(out, b"value");
	}
}
