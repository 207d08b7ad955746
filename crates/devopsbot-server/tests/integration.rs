use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use devopsbot_codereview::github::SourceControl;
use devopsbot_codereview::handler::CodeReview;
use devopsbot_codereview::signature::{sign, SIGNATURE_HEADER};
use devopsbot_core::{BotError, PullRequestRef};
use devopsbot_flow::RecordingStarter;
use devopsbot_incident::alarms::{AlarmHistory, HistoryItem};
use devopsbot_incident::ingest::StartIngestion;
use devopsbot_incident::query::PreviousIncidents;
use devopsbot_incident::trigger::IncidentTrigger;
use devopsbot_kanban::trigger::KanbanTrigger;
use devopsbot_model::knowledge::KnowledgeBase;
use devopsbot_model::scripted::ScriptedModel;
use devopsbot_server::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "hook-secret";

#[derive(Default)]
struct FakeSource {
    comments: Mutex<Vec<(PullRequestRef, String)>>,
}

#[async_trait]
impl SourceControl for FakeSource {
    async fn fetch_diff(&self, _pr: &PullRequestRef) -> Result<String, BotError> {
        Ok("diff --git a/main.rs b/main.rs\n+fn main() {}\n".into())
    }

    async fn post_comment(&self, pr: &PullRequestRef, body: &str) -> Result<(), BotError> {
        self.comments
            .lock()
            .unwrap()
            .push((pr.clone(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct FakeKnowledgeBase {
    tokens: Mutex<Vec<String>>,
}

#[async_trait]
impl KnowledgeBase for FakeKnowledgeBase {
    async fn start_ingestion(&self, client_token: &str) -> Result<(), BotError> {
        self.tokens.lock().unwrap().push(client_token.to_string());
        Ok(())
    }

    async fn retrieve_and_generate(&self, _prompt: &str) -> Result<String, BotError> {
        Ok("Restart the worker pool.".into())
    }
}

struct EmptyHistory;

#[async_trait]
impl AlarmHistory for EmptyHistory {
    async fn state_updates(&self, _alarm_name: &str) -> Result<Vec<HistoryItem>, BotError> {
        Ok(Vec::new())
    }
}

fn review_state(source: Arc<FakeSource>) -> AppState {
    let model = Arc::new(ScriptedModel::new(["Looks fine."]));
    AppState::new().with_review(CodeReview::new(source, model, SECRET))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn post_json(state: AppState, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = build_router(state).oneshot(req).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

fn pr_event() -> String {
    json!({
        "action": "opened",
        "pull_request": {"number": 42},
        "repository": {"full_name": "acme/api"}
    })
    .to_string()
}

#[tokio::test]
async fn health_lists_wired_automations() {
    let state = review_state(Arc::new(FakeSource::default()));
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = build_router(state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["automations"]["review"], true);
    assert_eq!(body["automations"]["kanban"], false);
}

#[tokio::test]
async fn signed_pull_request_is_reviewed() {
    let source = Arc::new(FakeSource::default());
    let body = pr_event();
    let req = Request::builder()
        .method("POST")
        .uri("/review")
        .header(SIGNATURE_HEADER, sign(SECRET.as_bytes(), body.as_bytes()))
        .body(Body::from(body))
        .unwrap();

    let response = build_router(review_state(source.clone()))
        .oneshot(req)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["body"], "Successfully Completed");

    let comments = source.comments.lock().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].0.repository, "acme/api");
    assert_eq!(comments[0].0.number, 42);
}

#[tokio::test]
async fn tampered_body_is_forbidden() {
    let source = Arc::new(FakeSource::default());
    let signature = sign(SECRET.as_bytes(), pr_event().as_bytes());
    let req = Request::builder()
        .method("POST")
        .uri("/review")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(pr_event().replace("42", "43")))
        .unwrap();

    let response = build_router(review_state(source.clone()))
        .oneshot(req)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["body"], "Signature mismatch");
    assert!(source.comments.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unsigned_delivery_is_forbidden() {
    let req = Request::builder()
        .method("POST")
        .uri("/review")
        .body(Body::from(pr_event()))
        .unwrap();
    let response = build_router(review_state(Arc::new(FakeSource::default())))
        .oneshot(req)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unwired_route_is_unavailable() {
    let (status, body) = post_json(AppState::new(), "/kanban/events", json!({})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("kanban"));
}

#[tokio::test]
async fn kanban_event_starts_workflow() {
    let starter = Arc::new(RecordingStarter::new());
    let state = AppState::new().with_kanban(Arc::new(KanbanTrigger::new(starter.clone())));
    let envelope = json!({
        "Records": [{"Sns": {"Message": "{\"automationData\":{\"taskKey\":\"OPS-7\"}}"}}]
    });

    let (status, body) = post_json(state, "/kanban/events", envelope).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"]["message"], "Successfully started workflow");
    assert_eq!(starter.started(), vec![json!({"taskKey": "OPS-7"})]);
}

#[tokio::test]
async fn malformed_kanban_event_is_bad_request() {
    let starter = Arc::new(RecordingStarter::new());
    let state = AppState::new().with_kanban(Arc::new(KanbanTrigger::new(starter.clone())));

    let (status, body) = post_json(state, "/kanban/events", json!({"Records": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no records"));
    assert!(starter.started().is_empty());
}

#[tokio::test]
async fn alarm_without_transitions_reports_failure() {
    let starter = Arc::new(RecordingStarter::new());
    let trigger = IncidentTrigger::new(Arc::new(EmptyHistory), starter.clone());
    let state = AppState::new().with_alarms(Arc::new(trigger));

    let (status, body) = post_json(
        state,
        "/incident/alarms",
        json!({"metricAlarmName": "HighCPU"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["body"], "Report generation failed");
    assert!(starter.started().is_empty());
}

#[tokio::test]
async fn report_notification_starts_ingestion() {
    let kb = Arc::new(FakeKnowledgeBase::default());
    let state = AppState::new().with_ingest(Arc::new(StartIngestion::new(kb.clone())));
    let notification = json!({
        "Records": [{"s3": {
            "bucket": {"name": "reports"},
            "object": {"key": "HighCPU-2024.md", "sequencer": "0055AED6DCD90281E5"}
        }}]
    });

    let (status, body) = post_json(state, "/incident/reports/notify", notification).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Success");
    assert_eq!(kb.tokens.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn playbook_query_answers_with_banner() {
    let kb = Arc::new(FakeKnowledgeBase::default());
    let state = AppState::new().with_query(Arc::new(PreviousIncidents::new(kb)));

    let (status, body) = post_json(
        state,
        "/incident/query",
        json!({"metricAlarmName": "HighCPU", "namespace": "AWS/EC2", "metric": "CPUUtilization"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let answer = body["body"].as_str().unwrap();
    assert!(answer.starts_with("*Guidance provided by DevOpsBot*"));
    assert!(answer.contains("Restart the worker pool."));
}
