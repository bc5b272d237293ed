use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::Instant;

use super::*;
use crate::protocol::{DiagramDescriptor, ErrorObject};

/// A plugin that discards its input and prints `response`.
fn scripted(id: &str, response: &str) -> CommandClient {
	let script = format!("cat >/dev/null; printf '%s' '{response}'");
	CommandClient::new(id, RunOptions::new("sh", ["-c", script.as_str()]), ClientOptions::default(), Executor::new())
}

fn diagram(id: Option<&str>, label: Option<&str>) -> Diagram {
	Diagram {
		kind: id.map(|id| DiagramDescriptor {
			id: Some(id.to_string()),
			..DiagramDescriptor::default()
		}),
		content: label.map(|label| json!({ "templates": { "diagramLabel": label } })),
	}
}

#[cfg(unix)]
#[tokio::test]
async fn initialize_round_trips_through_echo_plugin() {
	let executor = Executor::new();
	let client = CommandClient::new("echo", RunOptions::new("cat", Vec::<String>::new()), ClientOptions::default(), executor.clone());

	let res = client.initialize().await.unwrap();
	assert_eq!(res, InitializeResponse::default());
	assert_eq!(executor.count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn on_change_returns_rendered_diagrams() {
	let client = scripted("erd", r#"{"onchange":{"renderDiagram":[{"type":{"id":"erd"},"content":{}}]}}"#);
	let context = client.context("/ws/a.sysl", "App:\n  ...");
	let res = client
		.on_change(OnChangeRequest {
			change: None,
			context: Some(context),
		})
		.await
		.unwrap();

	assert_eq!(res.render_diagram.len(), 1);
	let keys = client.view_keys("file:///ws/a.sysl", &res);
	assert_eq!(keys[0].0, ViewKey::new("file:///ws/a.sysl", "erd", "erd"));
}

#[tokio::test(start_paused = true)]
async fn throttle_spaces_successive_calls() {
	let delay = Duration::from_millis(100);
	let throttle = Throttle::new(delay);
	let start = Instant::now();

	throttle.ready().await;
	assert!(start.elapsed() < delay);
	throttle.ready().await;
	assert!(start.elapsed() >= delay);

	tokio::time::sleep(delay * 3).await;
	let idle = Instant::now();
	throttle.ready().await;
	assert!(idle.elapsed() < delay, "a quiet period resets the spacing");
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_get_separate_slots() {
	let delay = Duration::from_millis(50);
	let throttle = Throttle::new(delay);
	let start = Instant::now();

	let handles: Vec<_> = (0..3)
		.map(|_| {
			let throttle = throttle.clone();
			tokio::spawn(async move {
				throttle.ready().await;
				start.elapsed()
			})
		})
		.collect();
	let mut elapsed = Vec::new();
	for handle in handles {
		elapsed.push(handle.await.unwrap());
	}
	elapsed.sort();

	assert!(elapsed[0] < delay);
	assert!(elapsed[1] >= delay);
	assert!(elapsed[2] >= delay * 2);
}

#[cfg(unix)]
#[tokio::test(start_paused = true)]
async fn on_change_calls_are_throttled() {
	let options = ClientOptions {
		throttle_delay_ms: 200,
		..ClientOptions::default()
	};
	let script = r#"cat >/dev/null; printf '{"onchange":{}}'"#;
	let client = CommandClient::new("slowed", RunOptions::new("sh", ["-c", script]), options, Executor::new());

	let start = Instant::now();
	client.on_change(OnChangeRequest::default()).await.unwrap();
	client.on_change(OnChangeRequest::default()).await.unwrap();
	assert!(start.elapsed() >= client.options().throttle_delay(), "elapsed {:?}", start.elapsed());

	// Initialize is not a change notification.
	let before = Instant::now();
	client.initialize().await.unwrap_err();
	assert!(before.elapsed() < client.options().throttle_delay());
}

#[cfg(unix)]
#[tokio::test]
async fn error_response_is_an_error() {
	let client = scripted("bad", r#"{"error":{"code":1,"message":"boom"}}"#);
	let err = client.call(&Request::initialize()).await.unwrap_err();
	match err {
		ClientError::Plugin { plugin, error } => {
			assert_eq!(plugin, "bad");
			assert_eq!(
				error,
				ErrorObject {
					code: Some(1),
					message: Some("boom".into()),
					data: None,
				}
			);
		}
		other => panic!("unexpected error: {other}"),
	}
}

#[cfg(unix)]
#[tokio::test]
async fn empty_output_is_an_error() {
	let client = scripted("quiet", "");
	let err = client.call(&Request::initialize()).await.unwrap_err();
	assert!(matches!(err, ClientError::EmptyResponse { .. }), "unexpected error: {err}");
}

#[cfg(unix)]
#[tokio::test]
async fn garbage_output_is_a_decode_error() {
	let client = scripted("noisy", "not json");
	let err = client.call(&Request::initialize()).await.unwrap_err();
	assert!(matches!(err, ClientError::Decode { .. }), "unexpected error: {err}");
}

#[cfg(unix)]
#[tokio::test]
async fn mismatched_response_kind_is_an_error() {
	let client = scripted("confused", r#"{"onchange":{}}"#);
	let err = client.initialize().await.unwrap_err();
	assert!(
		matches!(err, ClientError::UnexpectedResponse { expected: "initialize", actual: "onchange", .. }),
		"unexpected error: {err}"
	);
}

#[cfg(unix)]
#[tokio::test]
async fn failing_process_is_a_spawn_error() {
	let client = CommandClient::new("exit", RunOptions::new("sh", ["-c", "exit 4"]), ClientOptions::default(), Executor::new());
	let err = client.call(&Request::initialize()).await.unwrap_err();
	assert!(matches!(err, ClientError::Spawn { .. }), "unexpected error: {err}");
}

#[cfg(unix)]
#[tokio::test]
async fn calls_are_tracked_by_the_executor() {
	let executor = Executor::new();
	let client = CommandClient::new(
		"slow",
		RunOptions::new("sh", ["-c", "sleep 0.05; printf '{\"initialize\":{}}'"]),
		ClientOptions::default(),
		executor.clone(),
	);

	let call = tokio::spawn({
		let client = client.clone();
		async move { client.initialize().await }
	});
	tokio::time::sleep(std::time::Duration::from_millis(10)).await;
	assert_eq!(executor.count(), 1);

	executor.all_settled().await;
	assert!(call.await.unwrap().is_ok());
}

#[test]
fn from_config_requires_command_section() {
	let config = PluginConfig {
		id: "lsp".into(),
		name: None,
		command: None,
	};
	let err = CommandClient::from_config(&config, Executor::new()).unwrap_err();
	assert!(matches!(err, ClientError::NotCommandPlugin { ref plugin } if plugin == "lsp"));
}

#[test]
fn context_reports_workspace_folder() {
	let options = ClientOptions {
		workspace_folder: Some("/ws".into()),
		..ClientOptions::default()
	};
	let client = CommandClient::new("p", RunOptions::new("true", Vec::<String>::new()), options, Executor::new());
	let context = client.context("/ws/a.sysl", "");
	assert_eq!(context.sysl_root.as_deref(), Some("/ws"));
	assert_eq!(context.file_path.as_deref(), Some("/ws/a.sysl"));
}

#[test]
fn view_id_fallbacks() {
	let client = CommandClient::new("plug", RunOptions::new("true", Vec::<String>::new()), ClientOptions::default(), Executor::new());
	let res = OnChangeResponse {
		render_diagram: vec![
			diagram(Some("typed"), Some("Label")),
			diagram(None, Some("Label")),
			diagram(None, None),
		],
	};
	let ids: Vec<String> = client.view_keys("file:///a.sysl", &res).into_iter().map(|(key, _)| key.view_id).collect();
	assert_eq!(ids, ["typed", "Label", "plug"]);

	let anonymous = CommandClient::new("", RunOptions::new("true", Vec::<String>::new()), ClientOptions::default(), Executor::new());
	let ids: Vec<String> = anonymous.view_keys("file:///a.sysl", &res).into_iter().map(|(key, _)| key.view_id).collect();
	assert_eq!(ids, ["typed", "Label", "2"]);
}
