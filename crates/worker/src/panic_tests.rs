use super::panic_message;

#[tokio::test]
async fn extracts_static_str_payload() {
	let handle = tokio::spawn(async { panic!("boom-str") });
	let payload = handle.await.unwrap_err().into_panic();
	let msg = panic_message(&*payload).expect("should carry a message");
	assert!(msg.contains("boom-str"), "expected 'boom-str', got: {msg}");
}

#[tokio::test]
async fn extracts_string_payload() {
	let handle = tokio::spawn(async { panic!("{}", String::from("boom-string")) });
	let payload = handle.await.unwrap_err().into_panic();
	let msg = panic_message(&*payload).expect("should carry a message");
	assert!(msg.contains("boom-string"), "expected 'boom-string', got: {msg}");
}

#[test]
fn returns_none_for_opaque_payload() {
	let payload = std::panic::catch_unwind(|| std::panic::panic_any(42_u32)).unwrap_err();
	assert!(panic_message(&*payload).is_none(), "non-string payload should return None");
}
