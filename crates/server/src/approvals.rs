use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use signoff_core::actions::{ApproveCommand, CommentCommand, ReasonCode, RejectCommand};
use signoff_core::audit::{AuditContext, AuditSink};
use signoff_core::domain::chain::StepStatus;
use signoff_core::domain::request::{
    ApprovalRequest, Comment, CommentVisibility, Priority, RequestId, RequestStatus, RequestType,
};
use signoff_core::engine::{Decision, EngineError, WorkflowEngine};
use signoff_core::sla::{self, SlaAssessment};
use signoff_core::store::{RequestQuery, RequestStore};
use signoff_db::repositories::{RepositoryError, RequestRepository};

const LIST_LIMIT: u32 = 200;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn RequestRepository>,
    pub audit: Arc<dyn AuditSink>,
    pub engine: WorkflowEngine,
    pub warning_window: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/approvals", get(list_approvals))
        .route("/approvals/{id}", get(get_approval))
        .route("/approvals/{id}/approve", post(approve))
        .route("/approvals/{id}/reject", post(reject))
        .route("/approvals/{id}/comments", post(add_comment))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub request_type: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalSummary {
    pub id: String,
    pub document_number: String,
    pub request_type: RequestType,
    pub priority: Priority,
    pub status: RequestStatus,
    pub value: String,
    pub customer_name: String,
    pub requested_by: String,
    pub due_date: DateTime<Utc>,
    pub sla: SlaAssessment,
    pub active_level: Option<u32>,
    pub active_approver: Option<String>,
    pub comment_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ApprovalDetail {
    #[serde(flatten)]
    pub request: ApprovalRequest,
    pub status: RequestStatus,
    pub sla: SlaAssessment,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub level: u32,
    pub step_status: StepStatus,
    pub request_status: RequestStatus,
    pub request: ApprovalDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApproveBody {
    pub actor: String,
    pub comments: String,
    #[serde(default)]
    pub conditions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub actor: String,
    #[serde(default)]
    pub reason_code: Option<ReasonCode>,
    pub comments: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub author: String,
    pub body: String,
    pub visibility: CommentVisibility,
}

/// JSON error envelope shared by every handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    correlation_id: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>, correlation_id: &str) -> Self {
        Self { status, message: message.into(), correlation_id: correlation_id.to_string() }
    }

    fn not_found(id: &str, correlation_id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("request `{id}` not found"), correlation_id)
    }

    fn validation(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, correlation_id)
    }

    fn engine(error: EngineError, correlation_id: &str) -> Self {
        let status = match error {
            EngineError::InvalidStepTransition { .. } => StatusCode::CONFLICT,
            EngineError::ApproverMismatch { .. } => StatusCode::FORBIDDEN,
        };
        Self::new(status, error.to_string(), correlation_id)
    }

    fn repository(error: RepositoryError, correlation_id: &str) -> Self {
        tracing::error!(
            event_name = "approvals.repository_error",
            correlation_id = %correlation_id,
            error = %error,
            "repository operation failed"
        );
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "the service is temporarily unavailable",
            correlation_id,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
            "correlation_id": self.correlation_id,
        });
        (self.status, Json(body)).into_response()
    }
}

pub async fn list_approvals(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ApprovalSummary>>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();

    let query = parse_query(&params, &correlation_id)?;
    let requests = state
        .repository
        .list(query.status, LIST_LIMIT)
        .await
        .map_err(|error| ApiError::repository(error, &correlation_id))?;

    let store = RequestStore::from_requests(requests).map_err(|error| {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string(), &correlation_id)
    })?;

    let now = Utc::now();
    let needle = params.search.as_deref().unwrap_or("");
    let summaries = store
        .search(&query, needle)
        .into_iter()
        .map(|request| summarize(request, now, state.warning_window))
        .collect();

    Ok(Json(summaries))
}

pub async fn get_approval(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApprovalDetail>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();

    let request = load_request(&state, &id, &correlation_id).await?;
    Ok(Json(detail(request, Utc::now(), state.warning_window)))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();

    let command = ApproveCommand { comments: body.comments, conditions: body.conditions };
    let comments =
        command.validate().map_err(|error| ApiError::validation(error.to_string(), &correlation_id))?;

    decide(&state, &id, &body.actor, Decision::Approve, comments, &correlation_id).await
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RejectBody>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();

    let command = RejectCommand { reason_code: body.reason_code, comments: body.comments };
    let (_reason, comments) =
        command.validate().map_err(|error| ApiError::validation(error.to_string(), &correlation_id))?;

    decide(&state, &id, &body.actor, Decision::Reject, comments, &correlation_id).await
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CommentBody>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let correlation_id = Uuid::new_v4().to_string();

    let command = CommentCommand { body: body.body, visibility: body.visibility };
    let text =
        command.validate().map_err(|error| ApiError::validation(error.to_string(), &correlation_id))?;

    let mut request = load_request(&state, &id, &correlation_id).await?;

    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        author: body.author,
        body: text,
        visibility: body.visibility,
        posted_at: now,
    };
    request.comments.push(comment.clone());
    request.updated_at = now;

    state
        .repository
        .save(request)
        .await
        .map_err(|error| ApiError::repository(error, &correlation_id))?;

    tracing::info!(
        event_name = "approvals.comment_added",
        correlation_id = %correlation_id,
        request_id = %id,
        author = %comment.author,
        "comment recorded"
    );

    Ok((StatusCode::CREATED, Json(comment)))
}

async fn decide(
    state: &AppState,
    id: &str,
    actor: &str,
    decision: Decision,
    comments: String,
    correlation_id: &str,
) -> Result<Json<DecisionResponse>, ApiError> {
    let mut request = load_request(state, id, correlation_id).await?;

    let context = AuditContext::new(Some(RequestId(id.to_string())), correlation_id, actor);
    let now = Utc::now();
    let outcome = state
        .engine
        .decide_with_audit(&mut request, decision, comments, now, state.audit.as_ref(), &context)
        .map_err(|error| ApiError::engine(error, correlation_id))?;

    state
        .repository
        .save(request.clone())
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?;

    tracing::info!(
        event_name = "approvals.decision_applied",
        correlation_id = %correlation_id,
        request_id = %id,
        actor = %actor,
        decision = decision.as_str(),
        level = outcome.level,
        request_status = outcome.request_status.as_str(),
        "decision committed"
    );

    Ok(Json(DecisionResponse {
        level: outcome.level,
        step_status: outcome.step_status,
        request_status: outcome.request_status,
        request: detail(request, now, state.warning_window),
    }))
}

async fn load_request(
    state: &AppState,
    id: &str,
    correlation_id: &str,
) -> Result<ApprovalRequest, ApiError> {
    state
        .repository
        .find_by_id(&RequestId(id.to_string()))
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?
        .ok_or_else(|| ApiError::not_found(id, correlation_id))
}

fn parse_query(params: &ListParams, correlation_id: &str) -> Result<RequestQuery, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<RequestStatus>)
        .transpose()
        .map_err(|error| ApiError::validation(error.to_string(), correlation_id))?;
    let request_type = params
        .request_type
        .as_deref()
        .map(str::parse::<RequestType>)
        .transpose()
        .map_err(|error| ApiError::validation(error.to_string(), correlation_id))?;
    let priority = params
        .priority
        .as_deref()
        .map(str::parse::<Priority>)
        .transpose()
        .map_err(|error| ApiError::validation(error.to_string(), correlation_id))?;

    Ok(RequestQuery { status, request_type, priority })
}

fn summarize(
    request: &ApprovalRequest,
    now: DateTime<Utc>,
    warning_window: Duration,
) -> ApprovalSummary {
    let active = request.chain.active_step();
    ApprovalSummary {
        id: request.id.0.clone(),
        document_number: request.document_number.clone(),
        request_type: request.request_type,
        priority: request.priority,
        status: request.status(),
        value: request.value.to_string(),
        customer_name: request.customer_name.clone(),
        requested_by: request.requested_by.clone(),
        due_date: request.due_date,
        sla: sla::evaluate(request.due_date, now, warning_window),
        active_level: active.map(|step| step.level),
        active_approver: active.map(|step| step.approver.clone()),
        comment_count: request.comments.len(),
    }
}

fn detail(request: ApprovalRequest, now: DateTime<Utc>, warning_window: Duration) -> ApprovalDetail {
    let status = request.status();
    let sla = sla::evaluate(request.due_date, now, warning_window);
    ApprovalDetail { request, status, sla }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use signoff_core::audit::InMemoryAuditSink;
    use signoff_core::domain::chain::{ApprovalChain, Reviewer};
    use signoff_core::domain::request::{ApprovalRequest, Priority, RequestId, RequestType};
    use signoff_core::engine::WorkflowEngine;
    use signoff_db::repositories::{InMemoryRequestRepository, RequestRepository};

    use super::{router, AppState};

    async fn state_with_seed() -> (AppState, Arc<InMemoryRequestRepository>) {
        let repository = Arc::new(InMemoryRequestRepository::default());

        repository
            .save(request_fixture("WF-001", RequestType::Quote, Priority::Medium))
            .await
            .expect("seed WF-001");
        repository
            .save(request_fixture("WF-002", RequestType::Discount, Priority::High))
            .await
            .expect("seed WF-002");

        let state = AppState {
            repository: repository.clone(),
            audit: Arc::new(InMemoryAuditSink::default()),
            engine: WorkflowEngine::new(),
            warning_window: Duration::hours(24),
        };
        (state, repository)
    }

    fn request_fixture(id: &str, request_type: RequestType, priority: Priority) -> ApprovalRequest {
        let now = Utc::now();
        ApprovalRequest {
            id: RequestId(id.to_string()),
            document_number: format!("DOC-2026-{id}"),
            request_type,
            priority,
            value: Decimal::new(2_850_000, 0),
            customer_name: "Coastal Builders".to_string(),
            requested_by: "Suresh Rao".to_string(),
            request_date: now,
            due_date: now + Duration::days(2),
            escalated_at: None,
            expired_at: None,
            chain: ApprovalChain::open(vec![
                Reviewer::new("Priya Sharma", "Sales Manager"),
                Reviewer::new("Amit Patel", "Finance Head"),
            ])
            .expect("chain opens"),
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn list_filters_by_type_and_search() {
        let (state, _) = state_with_seed().await;
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/approvals?type=discount")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload.as_array().map(Vec::len), Some(1));
        assert_eq!(payload[0]["id"], "WF-002");
        assert_eq!(payload[0]["active_approver"], "Priya Sharma");
        assert_eq!(payload[0]["sla"]["status"], "on-time");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/approvals?search=nonexistent-customer")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let payload = body_json(response).await;
        assert_eq!(payload.as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn unknown_status_filter_is_unprocessable() {
        let (state, _) = state_with_seed().await;
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/approvals?status=bogus")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn approve_applies_decision_and_persists() {
        let (state, repository) = state_with_seed().await;
        let app = router(state);

        let body = json!({"actor": "Priya Sharma", "comments": "margin verified"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/approvals/WF-002/approve")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["level"], 1);
        assert_eq!(payload["step_status"], "approved");
        assert_eq!(payload["request_status"], "pending");

        let stored = repository
            .find_by_id(&RequestId("WF-002".to_string()))
            .await
            .expect("load")
            .expect("present");
        assert_eq!(stored.chain.active_step().map(|step| step.level), Some(2));
    }

    #[tokio::test]
    async fn wrong_actor_is_forbidden_and_nothing_is_saved() {
        let (state, repository) = state_with_seed().await;
        let app = router(state);

        let body = json!({"actor": "Amit Patel", "comments": "premature"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/approvals/WF-002/approve")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let stored = repository
            .find_by_id(&RequestId("WF-002".to_string()))
            .await
            .expect("load")
            .expect("present");
        assert_eq!(stored.chain.active_step().map(|step| step.level), Some(1));
    }

    #[tokio::test]
    async fn deciding_on_a_settled_request_conflicts() {
        let (state, _) = state_with_seed().await;
        let app = router(state);

        let reject = json!({
            "actor": "Priya Sharma",
            "reason_code": "margin_too_low",
            "comments": "below floor"
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/approvals/WF-001/reject")
                    .header("content-type", "application/json")
                    .body(Body::from(reject.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["request_status"], "rejected");

        let approve = json!({"actor": "Amit Patel", "comments": "too late"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/approvals/WF-001/approve")
                    .header("content-type", "application/json")
                    .body(Body::from(approve.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn reject_without_reason_code_is_unprocessable() {
        let (state, _) = state_with_seed().await;
        let app = router(state);

        let body = json!({"actor": "Priya Sharma", "comments": "no reason given"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/approvals/WF-002/reject")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn comments_are_created_on_open_requests() {
        let (state, repository) = state_with_seed().await;
        let app = router(state);

        let body = json!({
            "author": "Suresh Rao",
            "body": "customer confirmed volumes",
            "visibility": "shared"
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/approvals/WF-002/comments")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = body_json(response).await;
        assert_eq!(payload["author"], "Suresh Rao");

        let stored = repository
            .find_by_id(&RequestId("WF-002".to_string()))
            .await
            .expect("load")
            .expect("present");
        assert_eq!(stored.comments.len(), 1);
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let (state, _) = state_with_seed().await;
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder().uri("/approvals/WF-999").body(Body::empty()).expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
