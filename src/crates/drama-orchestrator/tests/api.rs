mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use common::{episodes_reply, fast_executor, ScriptedGenerator};
use drama_orchestrator::api::{create_router, AppState};
use drama_orchestrator::config::StorageConfig;
use drama_orchestrator::db::{DatabaseConnection, DramaStore, SqliteDramaStore};
use drama_orchestrator::document::FileParser;
use drama_orchestrator::pipelines::{build_engine, PipelineDeps, PromptSettings};
use drama_orchestrator::{SchedulerConfig, TaskController, TaskScheduler};

const BOUNDARY: &str = "drama-test-boundary";

struct TestApp {
    router: Router,
    store: Arc<dyn DramaStore>,
    _uploads: tempfile::TempDir,
}

async fn app(generator: ScriptedGenerator, max_upload_bytes: usize) -> TestApp {
    let db = DatabaseConnection::in_memory().await.unwrap();
    let controller = Arc::new(TaskController::new(db.clone()));
    let store: Arc<dyn DramaStore> = Arc::new(SqliteDramaStore::new(db.clone()));
    let engine = build_engine(
        controller.clone(),
        PipelineDeps {
            generator: Arc::new(generator),
            parser: Arc::new(FileParser::new()),
            store: store.clone(),
            executor: fast_executor(),
            prompts: PromptSettings::default(),
        },
    );
    let scheduler = Arc::new(TaskScheduler::start(
        Arc::new(engine),
        SchedulerConfig::default(),
    ));

    let uploads = tempfile::tempdir().unwrap();
    let state = AppState {
        db,
        controller,
        scheduler,
        store: store.clone(),
        storage: StorageConfig {
            upload_dir: uploads.path().to_path_buf(),
            max_upload_bytes,
        },
        server_name: "drama-test".to_string(),
    };

    TestApp {
        router: create_router(state),
        store,
        _uploads: uploads,
    }
}

fn multipart_body(file_name: &str, content: &[u8], fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            BOUNDARY, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::post(uri).body(Body::empty()).unwrap()).await
}

async fn upload(router: &Router, file_name: &str, content: &[u8], fields: &[(&str, &str)]) -> (StatusCode, Value) {
    let request = Request::post("/api/v1/novel-parse/tasks")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(file_name, content, fields)))
        .unwrap();
    send(router, request).await
}

async fn wait_for_novel_status(router: &Router, task_id: &str, status: &str) -> Value {
    let uri = format!("/api/v1/novel-parse/tasks/{}", task_id);
    for _ in 0..200 {
        let (code, body) = get(router, &uri).await;
        assert_eq!(code, StatusCode::OK);
        if body["data"]["status"] == status {
            return body["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} never reached {}", task_id, status);
}

#[tokio::test]
async fn test_health() {
    let app = app(ScriptedGenerator::replies(&[]), 1024).await;
    let (status, body) = get(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["name"], "drama-test");
    assert_eq!(body["tasks"].as_object().unwrap().len(), 5);
    assert_eq!(body["tasks"]["pending"], 0);
    assert_eq!(body["tasks"]["running"], 0);
}

#[tokio::test]
async fn test_upload_start_and_poll_novel_parse() {
    let reply = episodes_reply(1, 2, false);
    let app = app(ScriptedGenerator::replies(&[reply.as_str()]), 1024).await;

    let (status, body) = upload(
        &app.router,
        "River Town.txt",
        "The flood came at night.".as_bytes(),
        &[("title", "Flood Season")],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["progress"], 0);
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

    let (status, _) = post(
        &app.router,
        &format!("/api/v1/novel-parse/tasks/{}/start", task_id),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let data = wait_for_novel_status(&app.router, &task_id, "completed").await;
    assert_eq!(data["progress"], 100);
    assert_eq!(data["total_episodes"], 2);
    assert_eq!(data["created_episodes"], 2);
    let drama_id = data["drama_id"].as_i64().unwrap();

    let drama = app.store.get_drama(drama_id).await.unwrap().unwrap();
    assert_eq!(drama.title, "Flood Season");

    let (status, body) = get(&app.router, &format!("/api/v1/tasks/{}", task_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["kind"], "novel_parse");
    assert_eq!(body["data"]["result"]["episodes"].as_array().unwrap().len(), 2);

    let (status, body) = get(
        &app.router,
        &format!("/api/v1/tasks?resource_id=drama:{}", drama_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // finished tasks can be neither restarted nor cancelled
    let (status, _) = post(
        &app.router,
        &format!("/api/v1/novel-parse/tasks/{}/start", task_id),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, body) = post(&app.router, &format!("/api/v1/tasks/{}/cancel", task_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_unsupported_upload_is_rejected() {
    let app = app(ScriptedGenerator::replies(&[]), 1024).await;
    let (status, body) = upload(&app.router, "novel.epub", b"PK", &[]).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = app(ScriptedGenerator::replies(&[]), 16).await;
    let (status, body) = upload(&app.router, "novel.txt", &[b'a'; 64], &[]).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_upload_without_file_is_bad_request() {
    let app = app(ScriptedGenerator::replies(&[]), 1024).await;
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nx\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let request = Request::post("/api/v1/novel-parse/tasks")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_pending_novel_task() {
    let app = app(ScriptedGenerator::replies(&[]), 1024).await;
    let (_, body) = upload(&app.router, "novel.txt", b"text", &[]).await;
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/novel-parse/tasks/{}/cancel", task_id);
    let (status, body) = post(&app.router, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");

    let (status, _) = post(&app.router, &uri).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post(
        &app.router,
        &format!("/api/v1/novel-parse/tasks/{}/start", task_id),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_and_malformed_task_ids() {
    let app = app(ScriptedGenerator::replies(&[]), 1024).await;

    let (status, body) = get(
        &app.router,
        "/api/v1/tasks/550e8400-e29b-41d4-a716-446655440000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = get(&app.router, "/api/v1/tasks/not-a-task").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = get(&app.router, "/api/v1/tasks?status=sleeping").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_background_extraction_endpoint() {
    let scenes = r#"[{"location": "harbor", "time": "night", "prompt": "empty harbor, no people"}]"#;
    let app = app(ScriptedGenerator::replies(&[scenes]), 1024).await;

    let (status, _) = post(&app.router, "/api/v1/episodes/42/backgrounds/extract").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let drama = app.store.create_drama("River Town", None).await.unwrap();
    let episode = app
        .store
        .add_episodes(
            drama.id,
            vec![drama_orchestrator::db::NewEpisode {
                episode_number: 1,
                title: "Arrival".to_string(),
                script_content: "INT. HARBOR - NIGHT".to_string(),
            }],
        )
        .await
        .unwrap()
        .remove(0);

    let (status, body) = post(
        &app.router,
        &format!("/api/v1/episodes/{}/backgrounds/extract", episode.id),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

    let mut last = Value::Null;
    for _ in 0..200 {
        let (_, body) = get(&app.router, &format!("/api/v1/tasks/{}", task_id)).await;
        last = body["data"].clone();
        if last["status"] == "completed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(last["status"], "completed");
    assert_eq!(last["result"]["scene_count"], 1);
    assert_eq!(last["resource_ref"], format!("episode:{}", episode.id));

    // novel-parse routes do not serve other kinds
    let (status, _) = get(&app.router, &format!("/api/v1/novel-parse/tasks/{}", task_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
