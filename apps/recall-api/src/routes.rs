use axum::{
	Json, Router,
	extract::{
		Path, Query, State,
		rejection::{JsonRejection, PathRejection, QueryRejection},
	},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::state::AppState;
use recall_service::{
	BackfillReport, BackfillRequest, CreateRequest, CreateResponse, DeleteRequest,
	DeleteResponse, Error, GetRequest, GetResponse, ListRequest, ListResponse, ReconcileReport,
	ReconcileRequest, SearchRequest, SearchResponse,
};

#[derive(Debug, Deserialize)]
struct OptionalOwner {
	#[serde(default)]
	user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Owner {
	user_id: i64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	success: bool,
	error_code: &'static str,
	error: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}
impl ApiError {
	fn invalid(message: impl Into<String>) -> Self {
		Self {
			status: StatusCode::BAD_REQUEST,
			error_code: "invalid_request",
			message: message.into(),
		}
	}
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let (status, error_code) = match &err {
			Error::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
			Error::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
			Error::EmbeddingUnavailable { .. } =>
				(StatusCode::SERVICE_UNAVAILABLE, "embedding_unavailable"),
			Error::IndexUnavailable { .. } =>
				(StatusCode::SERVICE_UNAVAILABLE, "index_unavailable"),
			Error::Storage { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
		};

		if status.is_server_error() {
			tracing::error!(error = %err, error_code, "Request failed.");
		}

		Self { status, error_code, message: err.to_string() }
	}
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		Self::invalid(rejection.body_text())
	}
}

impl From<QueryRejection> for ApiError {
	fn from(rejection: QueryRejection) -> Self {
		Self::invalid(rejection.body_text())
	}
}

impl From<PathRejection> for ApiError {
	fn from(rejection: PathRejection) -> Self {
		Self::invalid(rejection.body_text())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { success: false, error_code: self.error_code, error: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/memory/create", post(create))
		.route("/v1/memory/search", get(search))
		.route("/v1/memory/list", get(list))
		.route("/v1/memory/{memory_id}", get(get_memory).delete(delete_memory))
		.with_state(state)
}

/// Served on the loopback admin bind only.
pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/reconcile_vectors", post(reconcile_vectors))
		.route("/v1/admin/backfill_embeddings", post(backfill_embeddings))
		.with_state(state)
}

async fn health() -> Json<Value> {
	Json(json!({ "status": "ok", "version": recall_cli::VERSION }))
}

async fn create(
	State(state): State<AppState>,
	payload: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<Json<CreateResponse>, ApiError> {
	let Json(payload) = payload?;

	Ok(Json(state.service.create(payload).await?))
}

async fn search(
	State(state): State<AppState>,
	params: Result<Query<SearchRequest>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
	let Query(params) = params?;

	Ok(Json(state.service.search(params).await?))
}

async fn list(
	State(state): State<AppState>,
	params: Result<Query<ListRequest>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
	let Query(params) = params?;

	Ok(Json(state.service.list(params).await?))
}

async fn get_memory(
	State(state): State<AppState>,
	memory_id: Result<Path<i64>, PathRejection>,
	owner: Result<Query<OptionalOwner>, QueryRejection>,
) -> Result<Json<GetResponse>, ApiError> {
	let Path(memory_id) = memory_id?;
	let Query(owner) = owner?;
	let response = state.service.get(GetRequest { memory_id, user_id: owner.user_id }).await?;

	Ok(Json(response))
}

async fn delete_memory(
	State(state): State<AppState>,
	memory_id: Result<Path<i64>, PathRejection>,
	owner: Result<Query<Owner>, QueryRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
	let Path(memory_id) = memory_id?;
	let Query(owner) = owner?;
	let response =
		state.service.delete(DeleteRequest { memory_id, user_id: owner.user_id }).await?;

	Ok(Json(response))
}

async fn reconcile_vectors(
	State(state): State<AppState>,
	payload: Result<Json<ReconcileRequest>, JsonRejection>,
) -> Result<Json<ReconcileReport>, ApiError> {
	let Json(payload) = payload?;
	let report = state.service.reconcile_vectors(payload).await?;

	tracing::info!(
		checked = report.checked_count,
		cleared = report.cleared_count,
		"Vector reconciliation finished."
	);

	Ok(Json(report))
}

async fn backfill_embeddings(
	State(state): State<AppState>,
	payload: Result<Json<BackfillRequest>, JsonRejection>,
) -> Result<Json<BackfillReport>, ApiError> {
	let Json(payload) = payload?;
	let report = state.service.backfill_embeddings(payload).await?;

	tracing::info!(
		embedded = report.embedded_count,
		skipped = report.skipped_count,
		errors = report.error_count,
		"Embedding backfill finished."
	);

	Ok(Json(report))
}
