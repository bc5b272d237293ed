use std::sync::OnceLock;

/// Returns the ambient tokio runtime, or a shared fallback runtime when called
/// outside of one.
pub(crate) fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("sysl-worker-global")
			.build()
			.expect("failed to build sysl-worker global tokio runtime")
	});
	runtime.handle().clone()
}
