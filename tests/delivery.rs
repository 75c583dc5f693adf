//! Delivery-level scenarios: queue acknowledgment, quarantine, and the
//! push-event handler contract.

mod common;

use std::sync::Arc;

use common::{STEP_SOURCE, TestEnv, event_body};
use meshport_core::config::queue::QueueConfig;
use meshport_core::config::worker::WorkerConfig;
use meshport_core::types::{KeyLayout, StageKind};
use meshport_worker::queue::InMemoryQueue;
use meshport_worker::report::ResponseBody;
use meshport_worker::{JobRunner, PushEventSource, QueueEventSource};

const DLQ: &str = "http://localhost/000000000000/file-converter-dlq";

async fn runner(env: &TestEnv) -> JobRunner {
    let config = env.config(&[StageKind::StepToStl], KeyLayout::OwnerFile);
    JobRunner::new(env.pipeline(&config).await, WorkerConfig::default())
}

fn queue_source(queue: &InMemoryQueue) -> QueueEventSource {
    let config = QueueConfig {
        url: "http://localhost/000000000000/file-converter-queue".into(),
        dead_letter_queue_url: Some(DLQ.into()),
        wait_time_seconds: 0,
        ..QueueConfig::default()
    };
    QueueEventSource::new(Arc::new(queue.clone()), config, common::BUCKET, KeyLayout::OwnerFile)
}

#[tokio::test]
async fn poll_batch_isolates_failures() {
    let env = TestEnv::new();
    env.upload("user1/a.step", STEP_SOURCE.as_bytes()).await;
    env.upload("user2/b.step", STEP_SOURCE.as_bytes()).await;
    let queue = InMemoryQueue::new();
    let good_a = queue.enqueue(event_body("user1/a.step")).await;
    let bad = queue.enqueue(event_body("user3/drawing.dwg")).await;
    let good_b = queue.enqueue(event_body("user2/b.step")).await;
    let mut source = queue_source(&queue);

    let report = runner(&env).await.run_once(&mut source).await.expect("batch");

    assert_eq!(report.processed(), 3);
    assert_eq!(report.succeeded(), 2);
    assert!(env.read_output("parts/web_ready/user1/a.stl").is_some());
    assert!(env.read_output("parts/web_ready/user2/b.stl").is_some());

    let mut deleted = queue.deleted().await;
    deleted.sort();
    let mut expected = vec![good_a, bad, good_b];
    expected.sort();
    assert_eq!(deleted, expected);
    assert_eq!(queue.sent_to(DLQ).await, vec![event_body("user3/drawing.dwg")]);
}

#[tokio::test]
async fn message_is_acknowledged_only_after_upload() {
    let env = TestEnv::new();
    let queue = InMemoryQueue::new();
    let id = queue.enqueue(event_body("user1/late.step")).await;
    let runner = runner(&env).await;
    let mut source = queue_source(&queue);

    // Source object not there yet: transient failure, message stays.
    let report = runner.run_once(&mut source).await.expect("batch");
    assert_eq!(report.failed(), 1);
    assert!(queue.deleted().await.is_empty());
    assert!(queue.sent_to(DLQ).await.is_empty());

    // Visibility timeout expires after the object lands.
    env.upload("user1/late.step", STEP_SOURCE.as_bytes()).await;
    queue.requeue_in_flight().await;
    let report = runner.run_once(&mut source).await.expect("batch");

    assert!(report.all_succeeded());
    assert_eq!(queue.deleted().await, vec![id]);
    assert_eq!(queue.in_flight_len().await, 0);
    assert_eq!(queue.visible_len().await, 0);
}

#[tokio::test]
async fn malformed_body_is_quarantined() {
    let env = TestEnv::new();
    let queue = InMemoryQueue::new();
    queue.enqueue(r#"{"Service":"Amazon S3","Event":"s3:TestEvent"}"#).await;
    let mut source = queue_source(&queue);

    let report = runner(&env).await.run_once(&mut source).await.expect("batch");

    assert_eq!(report.failed(), 1);
    assert_eq!(queue.deleted().await.len(), 1);
    assert_eq!(queue.sent_to(DLQ).await.len(), 1);
}

#[tokio::test]
async fn push_handler_reports_per_record_outcomes() {
    let env = TestEnv::new();
    env.upload("user123/part1.step", STEP_SOURCE.as_bytes()).await;
    let payload = format!(
        r#"{{"Records":[
            {{"s3":{{"bucket":{{"name":"{bucket}"}},"object":{{"key":"user123/part1.step"}}}}}},
            {{"s3":{{"bucket":{{"name":"{bucket}"}},"object":{{"key":"part1.step"}}}}}}
        ]}}"#,
        bucket = common::BUCKET
    );
    let mut source = PushEventSource::from_json(&payload, "", KeyLayout::OwnerFile);

    let report = runner(&env).await.run_once(&mut source).await.expect("batch");
    let response = report.to_response();

    assert_eq!(response.status_code, 500);
    let body: ResponseBody = serde_json::from_str(&response.body).expect("body");
    assert_eq!((body.processed, body.succeeded, body.failed), (2, 1, 1));
    assert_eq!(body.failures[0].index, 1);
    assert!(body.failures[0].permanent);
    assert!(env.read_output("parts/web_ready/user123/part1.stl").is_some());
}

#[tokio::test]
async fn push_handler_all_success_is_200() {
    let env = TestEnv::new();
    env.upload("user123/part1.step", STEP_SOURCE.as_bytes()).await;
    let mut source = PushEventSource::from_json(&event_body("user123/part1.step"), "", KeyLayout::OwnerFile);

    let report = runner(&env).await.run_once(&mut source).await.expect("batch");

    assert_eq!(report.to_response().status_code, 200);
}

#[cfg(unix)]
mod with_tool {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use super::*;
    use common::assert_valid_glb;
    use meshport_converter::StageRegistry;

    /// Stand-in for `freecadcmd`: reads OUTPUT from the generated script
    /// and writes STL or OBJ depending on its extension.
    fn fake_freecad(dir: &Path) -> PathBuf {
        let path = dir.join("freecadcmd");
        let script = "#!/bin/sh\n\
out=$(sed -n 's/^OUTPUT = \"\\(.*\\)\"$/\\1/p' \"$1\")\n\
case \"$out\" in\n\
  *.stl) printf 'solid s\\nfacet normal 0 0 1\\nouter loop\\nvertex 0 0 0\\nvertex 1 0 0\\nvertex 0 1 0\\nendloop\\nendfacet\\nendsolid s\\n' > \"$out\" ;;\n\
  *) printf 'v 0 0 0\\nv 1 0 0\\nv 0 1 0\\nf 1 2 3\\n' > \"$out\" ;;\n\
esac\n";
        std::fs::write(&path, script).expect("write tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    #[tokio::test]
    async fn default_chain_through_external_tool() {
        let env = TestEnv::new();
        let mut config = env.config(&[StageKind::StepToObj, StageKind::ObjToGlb], KeyLayout::OwnerFile);
        config.converter.freecad_path = fake_freecad(env.path());
        config.converter.stage_timeout_seconds = 30;
        let stages = StageRegistry::with_defaults(&config.converter);
        let runner = JobRunner::new(env.pipeline_with(&config, &stages).await, WorkerConfig::default());
        env.upload("user123/part1.step", STEP_SOURCE.as_bytes()).await;

        let mut source = PushEventSource::from_json(&event_body("user123/part1.step"), "", KeyLayout::OwnerFile);
        let report = runner.run_once(&mut source).await.expect("batch");

        assert!(report.all_succeeded(), "{report:?}");
        assert_valid_glb(&env.read_output("parts/web_ready/user123/part1.glb").expect("glb"));
        assert!(env.scratch_is_empty());
    }
}
