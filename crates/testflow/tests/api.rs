// tests/api.rs
mod common;

use axum::{body::Body, http::Request, http::StatusCode};
use serde_json::json;
use uuid::Uuid;

use common::{build_app, get, memory_state, post_json, send};
use testflow::jobs::{JobStatus, QueueOptions, TransitionPolicy, FULL_SUITE};

#[tokio::test]
async fn queue_claim_update_round() {
    let state = memory_state(QueueOptions::default());
    let app = build_app(state.clone());

    let (status, body) = send(
        &app,
        post_json("/api/queue-job", json!({"type": "LoginTest", "testFilter": "test_login"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": "Job queued successfully"}));

    let (status, body) = send(&app, get("/api/jobs/next")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["type"], "LoginTest");
    assert_eq!(body["data"]["status"], "Processing");
    assert_eq!(body["data"]["testFilter"], "test_login");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        post_json("/api/jobs/update-status", json!({"id": id, "status": "Completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "Job status updated");

    let job = state
        .queue
        .get_job(Uuid::parse_str(&id).unwrap())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn next_job_on_empty_queue_is_204() {
    let app = build_app(memory_state(QueueOptions::default()));
    let (status, _) = send(&app, get("/api/jobs/next")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn claims_come_back_in_submission_order() {
    let app = build_app(memory_state(QueueOptions::default()));

    for t in ["A", "B", "C"] {
        let (status, _) = send(&app, post_json("/api/queue-job", json!({"type": t}))).await;
        assert_eq!(status, StatusCode::OK);
    }

    for t in ["A", "B", "C"] {
        let (status, body) = send(&app, get("/api/jobs/next")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["type"], t);
    }

    let (status, _) = send(&app, get("/api/jobs/next")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn empty_body_and_bad_project_are_accepted() {
    let state = memory_state(QueueOptions::default());
    let app = build_app(state.clone());

    // legacy route, no body at all
    let req = Request::post("/api/run-test").body(Body::empty()).unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post_json("/api/queue-job", json!({"projectId": "definitely-not-an-id", "type": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let jobs = state.queue.list_jobs(None, 10).await.unwrap();
    assert_eq!(jobs.len(), 2);
    for job in jobs {
        assert_eq!(job.job_type, FULL_SUITE);
        assert_eq!(job.project_id, None);
    }
}

#[tokio::test]
async fn valid_project_id_is_kept() {
    let state = memory_state(QueueOptions::default());
    let app = build_app(state.clone());
    let project = Uuid::new_v4();

    send(
        &app,
        post_json("/api/queue-job", json!({"projectId": project.to_string()})),
    )
    .await;

    let (_, body) = send(&app, get("/api/jobs/next")).await;
    assert_eq!(body["data"]["projectId"], project.to_string());
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let app = build_app(memory_state(QueueOptions::default()));

    let req = Request::post("/api/queue-job")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "message": "Invalid request body"}));

    let req = Request::post("/api/jobs/update-status")
        .header("content-type", "application/json")
        .body(Body::from("[]"))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "message": "Invalid request body"}));
}

#[tokio::test]
async fn update_status_for_unknown_id_still_succeeds() {
    let state = memory_state(QueueOptions::default());
    let app = build_app(state.clone());
    state.queue.enqueue(None, None, None).await.unwrap();

    let (status, body) = send(
        &app,
        post_json(
            "/api/jobs/update-status",
            json!({"id": Uuid::new_v4().to_string(), "status": "Failed"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let counts = state.queue.counts().await.unwrap();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.failed, 0);
}

#[tokio::test]
async fn update_status_validates_id_and_status() {
    let app = build_app(memory_state(QueueOptions::default()));

    let (status, body) = send(
        &app,
        post_json("/api/jobs/update-status", json!({"id": "xyz", "status": "Completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        post_json(
            "/api/jobs/update-status",
            json!({"id": Uuid::new_v4().to_string(), "status": "Done"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn strict_mode_reports_conflict_and_not_found() {
    let state = memory_state(QueueOptions {
        transitions: TransitionPolicy::Strict,
        lease: None,
    });
    let app = build_app(state.clone());
    let job = state.queue.enqueue(None, None, None).await.unwrap();

    let (status, body) = send(
        &app,
        post_json(
            "/api/jobs/update-status",
            json!({"id": job.id.to_string(), "status": "Completed"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        post_json(
            "/api/jobs/update-status",
            json!({"id": Uuid::new_v4().to_string(), "status": "Completed"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clear_queue_reports_count_and_empties() {
    let state = memory_state(QueueOptions::default());
    let app = build_app(state.clone());

    for _ in 0..3 {
        state.queue.enqueue(None, None, None).await.unwrap();
    }
    let claimed = state.queue.claim_next().await.unwrap().unwrap();
    state
        .queue
        .update_status(claimed.id, JobStatus::Completed, None)
        .await
        .unwrap();
    state.queue.claim_next().await.unwrap().unwrap();

    let req = Request::delete("/api/jobs/queue").body(Body::empty()).unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], 3);

    let (status, _) = send(&app, get("/api/jobs/next")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn job_lookup_list_and_counts() {
    let state = memory_state(QueueOptions::default());
    let app = build_app(state.clone());
    let a = state.queue.enqueue(Some("A"), None, None).await.unwrap();
    state.queue.enqueue(Some("B"), None, None).await.unwrap();
    state.queue.claim_next().await.unwrap();

    let (status, body) = send(&app, get(&format!("/api/jobs/{}", a.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Processing");

    let (status, _) = send(&app, get(&format!("/api/jobs/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/api/jobs/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get("/api/jobs?status=Pending")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["type"], "B");

    let (status, _) = send(&app, get("/api/jobs?status=bogus")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get("/api/jobs?limit=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "message": "Invalid query string"}));

    let (status, body) = send(&app, get("/api/jobs/counts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"pending": 1, "processing": 1, "completed": 0, "failed": 0})
    );
}

#[tokio::test]
async fn heartbeat_flips_worker_status() {
    let app = build_app(memory_state(QueueOptions::default()));

    let (status, body) = send(&app, get("/api/worker-status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"online": false, "lastSeen": null}));

    let req = Request::post("/api/worker-heartbeat").body(Body::empty()).unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "message": "Heartbeat acknowledged"}));

    let (_, body) = send(&app, get("/api/worker-status")).await;
    assert_eq!(body["online"], true);
    assert!(body["lastSeen"].is_string());
}

#[tokio::test]
async fn health_is_outside_api_prefix() {
    let app = build_app(memory_state(QueueOptions::default()));
    let res = tower::ServiceExt::oneshot(app, get("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
