use std::time::{Duration, Instant};

use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use submgr_rs::config::{OptMap, Subscription};
use submgr_rs::converter::{BatchEvent, Converter, FailureKind};

fn subscription(name: &str, sub_urls: &[&str], dst_path: &str, enable: bool) -> Subscription {
  Subscription {
    name: name.to_string(),
    sub_urls: sub_urls.iter().map(|s| s.to_string()).collect(),
    dst_path: dst_path.to_string(),
    enable,
    opts: None,
    append_opts: None,
  }
}

fn converter_for(server: &MockServer) -> Converter {
  Converter::new(
    format!("{}/sub", server.uri()),
    "https://rules.example.com/cfg.ini".to_string(),
    OptMap::default(),
  )
  .unwrap()
}

#[tokio::test]
async fn batch_converts_enabled_entries_and_skips_disabled() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/sub"))
    .respond_with(ResponseTemplate::new(200).set_body_string("proxies: []\n"))
    .mount(&server)
    .await;

  let out_dir = tempdir().unwrap();
  let subs = vec![
    subscription("main", &["https://a.example.com/t"], "main.yaml", true),
    subscription("extra", &["https://b.example.com/t"], "nested/extra.yaml", true),
    subscription("backup", &["https://c.example.com/t"], "backup.yaml", false),
  ];

  let t0 = Instant::now();
  let report = converter_for(&server).batch_convert(&subs, out_dir.path()).await;
  let elapsed = t0.elapsed();

  assert_eq!(report.total, 3);
  let results = report.results();
  assert_eq!(results.len(), 2);
  assert!(results.iter().all(|(_, ok)| *ok));
  assert!(!results.iter().any(|(p, _)| p.ends_with("backup.yaml")));
  assert_eq!(report.success_count(), 2);

  // One inter-item pause between the two processed entries.
  assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");

  let main = std::fs::read(out_dir.path().join("main.yaml")).unwrap();
  assert_eq!(main, b"proxies: []\n");
  // Parent directories of relative destinations are created on demand.
  assert!(out_dir.path().join("nested/extra.yaml").exists());
  assert!(!out_dir.path().join("backup.yaml").exists());
}

#[tokio::test]
async fn failed_entry_does_not_stop_the_batch() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/sub"))
    .and(query_param("url", "https://bad.example.com/t"))
    .respond_with(ResponseTemplate::new(502))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/sub"))
    .and(query_param("url", "https://good.example.com/t"))
    .respond_with(ResponseTemplate::new(200).set_body_string("ok\n"))
    .mount(&server)
    .await;

  let out_dir = tempdir().unwrap();
  let subs = vec![
    subscription("bad", &["https://bad.example.com/t"], "bad.yaml", true),
    subscription("good", &["https://good.example.com/t"], "good.yaml", true),
  ];

  let report = converter_for(&server).batch_convert(&subs, out_dir.path()).await;

  let results = report.results();
  assert_eq!(results.len(), 2);
  assert!(!results[0].1);
  assert!(results[1].1);

  match &report.events[0] {
    BatchEvent::Converted { outcome, .. } => {
      let failure = outcome.error.as_ref().unwrap();
      assert_eq!(failure.kind, FailureKind::HttpStatus);
      assert!(failure.message.contains("502"));
    }
    other => panic!("expected converted event, got {other:?}"),
  }
  assert!(!out_dir.path().join("bad.yaml").exists());
  assert!(out_dir.path().join("good.yaml").exists());
}

#[tokio::test]
async fn empty_body_counts_as_failure() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/sub"))
    .respond_with(ResponseTemplate::new(200))
    .mount(&server)
    .await;

  let out_dir = tempdir().unwrap();
  let subs = vec![subscription("empty", &["https://a.example.com/t"], "empty.yaml", true)];

  let report = converter_for(&server).batch_convert(&subs, out_dir.path()).await;

  assert_eq!(report.success_count(), 0);
  match &report.events[0] {
    BatchEvent::Converted { outcome, .. } => {
      assert_eq!(outcome.error.as_ref().unwrap().kind, FailureKind::EmptyBody);
    }
    other => panic!("expected converted event, got {other:?}"),
  }
  assert!(!out_dir.path().join("empty.yaml").exists());
}

#[tokio::test]
async fn incomplete_entries_are_skipped_without_requests() {
  let server = MockServer::start().await;
  // No mocks mounted: any request would 404 and show up as a failure event.

  let out_dir = tempdir().unwrap();
  let subs = vec![
    subscription("no-urls", &[], "no-urls.yaml", true),
    subscription("no-dst", &["https://a.example.com/t"], "", true),
  ];

  let report = converter_for(&server).batch_convert(&subs, out_dir.path()).await;

  assert_eq!(report.total, 2);
  assert!(report.results().is_empty());
  assert!(report
    .events
    .iter()
    .all(|e| matches!(e, BatchEvent::Skipped { .. })));
  assert_eq!(server.received_requests().await.unwrap().len(), 0);
}
