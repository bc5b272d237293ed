//! Completion tracking for independently started async tasks.
//!
//! The [`Executor`] does not own the results of the work it tracks. It only
//! observes when each task settles, keeps an exact count of what is still in
//! flight, and wakes listeners when that count drains to zero.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Instant;

use parking_lot::Mutex;
use slab::Slab;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::panic_message;
use crate::spawn::runtime_handle;

type Listener = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct State {
	/// Start instants of tasks that have not settled yet.
	pending: Slab<Instant>,
	/// Listeners waiting for the next drain, in registration order.
	listeners: Vec<(u64, Listener)>,
	next_listener: u64,
	started: u64,
	settled: u64,
}

/// Point-in-time counters of an [`Executor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorSnapshot {
	/// Tasks started but not yet settled.
	pub pending: usize,
	/// Listeners waiting for the pending set to drain.
	pub listeners: usize,
	/// Tasks started over the executor's lifetime.
	pub started: u64,
	/// Tasks settled over the executor's lifetime.
	pub settled: u64,
}

/// Shared coordination point for asynchronous tasks started by independent callers.
///
/// Cloning yields another handle to the same pending set. Construct one per
/// owner and pass it explicitly to the components that spawn work.
#[derive(Clone, Default)]
pub struct Executor {
	inner: Arc<Mutex<State>>,
}

impl fmt::Debug for Executor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Executor").field("snapshot", &self.snapshot()).finish()
	}
}

impl Executor {
	/// Creates an executor with nothing in flight.
	pub fn new() -> Self {
		Self::default()
	}

	/// Invokes `f` and tracks the future it returns until it settles.
	///
	/// The task is counted before this returns. It runs on the ambient tokio
	/// runtime regardless of whether the returned [`Tracked`] is awaited, and
	/// it is removed from the pending set before its output reaches the
	/// handle. Panics count as settling and are resumed in whoever awaits the
	/// handle.
	pub fn start<F, Fut>(&self, f: F) -> Tracked<Fut::Output>
	where
		F: FnOnce() -> Fut,
		Fut: Future + Send + 'static,
		Fut::Output: Send + 'static,
	{
		let task = {
			let mut state = self.inner.lock();
			state.started = state.started.wrapping_add(1);
			let task = state.pending.insert(Instant::now());
			tracing::trace!(task, pending = state.pending.len(), "executor.start");
			task
		};

		// Armed before `f` runs so a panicking constructor still settles.
		let guard = SettleGuard {
			inner: Arc::clone(&self.inner),
			task,
		};
		let fut = f();
		let handle = runtime_handle().spawn(async move {
			let _guard = guard;
			fut.await
		});
		Tracked { handle }
	}

	/// Returns the number of tasks that have started and not yet settled.
	pub fn count(&self) -> usize {
		self.inner.lock().pending.len()
	}

	/// Registers a one-shot callback for the next time nothing is in flight.
	///
	/// With no pending tasks the callback runs before this returns. Otherwise
	/// it runs exactly once, on the first transition of the pending count to
	/// zero. Tasks started in the meantime keep the count above zero and
	/// therefore delay it.
	pub fn on_settled<F>(&self, listener: F) -> Subscription
	where
		F: FnOnce() + Send + 'static,
	{
		let mut state = self.inner.lock();
		if state.pending.is_empty() {
			drop(state);
			listener();
			return Subscription::fired();
		}

		let id = state.next_listener;
		state.next_listener = state.next_listener.wrapping_add(1);
		state.listeners.push((id, Box::new(listener)));
		tracing::trace!(listener = id, pending = state.pending.len(), "executor.on_settled");
		Subscription {
			inner: Arc::downgrade(&self.inner),
			id: Some(id),
		}
	}

	/// Returns a future that completes once nothing is in flight.
	///
	/// Ready without waiting when the pending set is already empty.
	pub fn all_settled(&self) -> AllSettled {
		let (tx, rx) = oneshot::channel();
		self.on_settled(move || {
			let _ = tx.send(());
		});
		AllSettled { rx }
	}

	/// Returns the current counters.
	pub fn snapshot(&self) -> ExecutorSnapshot {
		let state = self.inner.lock();
		ExecutorSnapshot {
			pending: state.pending.len(),
			listeners: state.listeners.len(),
			started: state.started,
			settled: state.settled,
		}
	}
}

/// Removes its task from the pending set when dropped.
///
/// Dropped on completion, on panic, and when the runtime discards the task.
struct SettleGuard {
	inner: Arc<Mutex<State>>,
	task: usize,
}

impl Drop for SettleGuard {
	fn drop(&mut self) {
		let listeners = {
			let mut state = self.inner.lock();
			let Some(started_at) = state.pending.try_remove(self.task) else {
				return;
			};
			state.settled = state.settled.wrapping_add(1);
			tracing::trace!(
				task = self.task,
				elapsed = ?started_at.elapsed(),
				pending = state.pending.len(),
				"executor.settle"
			);
			if state.pending.is_empty() {
				std::mem::take(&mut state.listeners)
			} else {
				Vec::new()
			}
		};

		if !listeners.is_empty() {
			tracing::trace!(listeners = listeners.len(), "executor.drained");
		}
		for (id, listener) in listeners {
			if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(listener)) {
				tracing::error!(
					listener = id,
					panic = panic_message(&*payload).as_deref().unwrap_or("<non-string payload>"),
					"executor.listener_panicked"
				);
			}
		}
	}
}

/// Handle to a task started with [`Executor::start`].
///
/// Resolves to the task's own output. Dropping the handle detaches from the
/// task without stopping or untracking it.
#[derive(Debug)]
#[must_use = "dropping a Tracked handle detaches from the task's result"]
pub struct Tracked<T> {
	handle: JoinHandle<T>,
}

impl<T> Tracked<T> {
	/// Returns `true` once the task has produced its output.
	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}
}

impl<T> Future for Tracked<T> {
	type Output = T;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
		match Pin::new(&mut self.handle).poll(cx) {
			Poll::Pending => Poll::Pending,
			Poll::Ready(Ok(output)) => Poll::Ready(output),
			Poll::Ready(Err(err)) => match err.try_into_panic() {
				Ok(payload) => std::panic::resume_unwind(payload),
				// Tasks are never aborted; this is the runtime shutting down underneath them.
				Err(err) => std::panic::resume_unwind(Box::new(format!("tracked task did not complete: {err}"))),
			},
		}
	}
}

/// Future returned by [`Executor::all_settled`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct AllSettled {
	rx: oneshot::Receiver<()>,
}

impl Future for AllSettled {
	type Output = ();

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
		Pin::new(&mut self.rx).poll(cx).map(|_| ())
	}
}

/// Registration returned by [`Executor::on_settled`].
///
/// Dropping it keeps the listener registered.
#[derive(Debug)]
pub struct Subscription {
	inner: Weak<Mutex<State>>,
	id: Option<u64>,
}

impl Subscription {
	fn fired() -> Self {
		Self { inner: Weak::new(), id: None }
	}

	/// Removes the listener if it has not fired yet.
	///
	/// Returns `true` when a pending listener was removed.
	pub fn dispose(self) -> bool {
		let (Some(id), Some(inner)) = (self.id, self.inner.upgrade()) else {
			return false;
		};
		let mut state = inner.lock();
		let before = state.listeners.len();
		state.listeners.retain(|(listener, _)| *listener != id);
		before != state.listeners.len()
	}
}
