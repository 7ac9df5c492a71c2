use digiclick_telemetry::{EventQueue, QueueConfig, QueuedEvent, SendError, Transport};
use digiclick_telemetry_jsonl::JsonlTransport;

#[tokio::test]
async fn writes_json_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("analytics.jsonl");
    let transport = JsonlTransport::new(&path);

    let batch = vec![
        QueuedEvent::builder("page_view").experiment("hero-copy", "b").build().unwrap(),
        QueuedEvent::builder("cta_click").build().unwrap(),
    ];
    transport.send(&batch).await.unwrap();
    transport.send(&batch[..1]).await.unwrap();

    let contents = std::fs::read_to_string(&path).expect("file");
    let lines: Vec<serde_json::Value> =
        contents.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["event"], "page_view");
    assert_eq!(lines[0]["testId"], "hero-copy");
    assert_eq!(lines[1]["event"], "cta_click");
    assert_eq!(lines[2]["event"], "page_view");
}

#[tokio::test]
async fn unwritable_path_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let transport = JsonlTransport::new(dir.path().join("missing").join("analytics.jsonl"));

    let err = transport.send(&[QueuedEvent::builder("x").build().unwrap()]).await.unwrap_err();
    assert!(matches!(err, SendError::Io(_)));
}

#[tokio::test]
async fn queue_flushes_into_the_file_on_shutdown() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("analytics.jsonl");
    let config = QueueConfig::builder().build().unwrap();
    let queue = EventQueue::builder(config).transport(JsonlTransport::new(&path)).start().unwrap();

    for name in ["page_view", "scroll", "signup"] {
        queue.enqueue(QueuedEvent::builder(name).build().unwrap());
    }
    queue.shutdown().await;

    let contents = std::fs::read_to_string(&path).expect("file");
    assert_eq!(contents.lines().count(), 3);
    assert_eq!(queue.stats().delivered, 3);
}
