//! Resource API handlers.
//!
//! Handlers only adapt HTTP to [`ResourceService`](crate::service::ResourceService)
//! calls and shape success bodies. All failure rendering goes through the
//! service's classifier.

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use eventboard_core::{Resource, ValidationFailure, ValidationIssue};
use serde::Serialize;
use tracing::debug;

use super::{AppState, Authenticated};
use crate::auth::AuthError;
use crate::service::{ApiError, Failure, OperationKind, RawListParams, SaveReply};

const MALFORMED_QUERY_MESSAGE: &str = "Query string is malformed";

/// Routes under `/resources`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/resources", get(list_resources).post(create_resource))
        .route("/resources/categories", get(list_categories))
        .route("/resources/tags", get(list_tags))
        .route("/resources/batch-get", post(batch_get_resources))
        .route(
            "/resources/{id}",
            get(get_resource).patch(update_resource).delete(delete_resource),
        )
        .route(
            "/resources/{id}/save",
            post(save_resource).delete(unsave_resource),
        )
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub events: Vec<Resource>,
    pub total_events: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub resources: Vec<Resource>,
}

fn body_or_reject(
    state: &AppState,
    kind: OperationKind,
    body: Result<Bytes, BytesRejection>,
) -> Result<Bytes, ApiError> {
    body.map_err(|rejection| {
        let failure = Failure::status(rejection.status(), rejection.body_text());
        state.service.reject(kind, failure)
    })
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

pub async fn list_resources(
    State(state): State<AppState>,
    params: Result<Query<RawListParams>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(params) = params.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "query string rejected");
        let failure = ValidationFailure {
            issues: vec![ValidationIssue::general(MALFORMED_QUERY_MESSAGE)],
        };
        state.service.reject(OperationKind::List, failure.into())
    })?;
    let page = state.service.list(&params).await?;
    Ok(Json(ListResponse {
        events: page.items,
        total_events: page.total_count,
        total_pages: page.total_pages,
        current_page: page.current_page,
        limit: page.limit,
    }))
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Resource>, ApiError> {
    Ok(Json(state.service.get(&id).await?))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    let categories = state.service.categories().await?;
    Ok(Json(CategoriesResponse { categories }))
}

pub async fn list_tags(State(state): State<AppState>) -> Result<Json<TagsResponse>, ApiError> {
    let tags = state.service.tags().await?;
    Ok(Json(TagsResponse { tags }))
}

pub async fn batch_get_resources(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let body = body_or_reject(&state, OperationKind::BatchGet, body)?;
    let resources = state.service.batch_get(&body).await?;
    Ok(Json(BatchResponse { resources }))
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

pub async fn create_resource(
    State(state): State<AppState>,
    auth: Result<Authenticated, AuthError>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    let body = body_or_reject(&state, OperationKind::Create, body)?;
    let created = state
        .service
        .create(Authenticated::credential(auth), &body)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_resource(
    State(state): State<AppState>,
    auth: Result<Authenticated, AuthError>,
    Path(id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Resource>, ApiError> {
    let body = body_or_reject(&state, OperationKind::Update, body)?;
    let updated = state
        .service
        .update(Authenticated::credential(auth), &id, &body)
        .await?;
    Ok(Json(updated))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    auth: Result<Authenticated, AuthError>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete(Authenticated::credential(auth), &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn save_resource(
    State(state): State<AppState>,
    auth: Result<Authenticated, AuthError>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let reply = state
        .service
        .save(Authenticated::credential(auth), &id)
        .await?;
    let response = match reply {
        SaveReply::Created(relation) => (
            StatusCode::CREATED,
            Json(SaveResponse {
                message: "Event saved",
                saved_at: Some(relation.saved_at),
            }),
        ),
        SaveReply::AlreadySaved => (
            StatusCode::OK,
            Json(SaveResponse {
                message: "Event already saved",
                saved_at: None,
            }),
        ),
    };
    Ok(response.into_response())
}

pub async fn unsave_resource(
    State(state): State<AppState>,
    auth: Result<Authenticated, AuthError>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .unsave(Authenticated::credential(auth), &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
