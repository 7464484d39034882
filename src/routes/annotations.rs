//! Annotation record API routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::annotations::{AnnotationRecord, NewAnnotation, RecordPatch};
use crate::container::ContainerKey;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the annotations router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:document_id/:sub_document_key", get(list_annotations))
        .route(
            "/:document_id/:sub_document_key/:category",
            post(create_annotation),
        )
        .route(
            "/:document_id/:sub_document_key/:category/:id",
            patch(update_annotation).delete(delete_annotation),
        )
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    category: Option<String>,
}

/// List records of one sub-document
async fn list_annotations(
    State(state): State<AppState>,
    Path((document_id, sub_document_key)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<AnnotationRecord>>> {
    let records = state.session().store().list(
        &document_id,
        &sub_document_key,
        query.category.as_deref(),
    );
    Ok(Json(records))
}

/// Create a record
async fn create_annotation(
    State(state): State<AppState>,
    Path((document_id, sub_document_key, category)): Path<(String, String, String)>,
    Json(draft): Json<NewAnnotation>,
) -> Result<(StatusCode, Json<AnnotationRecord>)> {
    match (draft.range_start, draft.range_end) {
        (Some(start), Some(end)) if start >= end => {
            return Err(AppError::BadRequest(format!(
                "rangeStart ({}) must be less than rangeEnd ({})",
                start, end
            )));
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(AppError::BadRequest(
                "rangeStart and rangeEnd must be given together".to_string(),
            ));
        }
        _ => {}
    }

    let key = ContainerKey::new(document_id, sub_document_key);
    let record = state
        .mutate(move |session| session.insert(&key, &category, draft))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Update a record's comment, sub-label or extra fields
async fn update_annotation(
    State(state): State<AppState>,
    Path((document_id, sub_document_key, category, id)): Path<(String, String, String, String)>,
    Json(patch): Json<RecordPatch>,
) -> Result<Json<AnnotationRecord>> {
    let key = ContainerKey::new(document_id, sub_document_key);
    let lookup = id.clone();
    let record = state
        .mutate(move |session| session.update(&key, &category, &lookup, patch))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Annotation not found: {}", id)))?;
    Ok(Json(record))
}

/// Delete a record
async fn delete_annotation(
    State(state): State<AppState>,
    Path((document_id, sub_document_key, category, id)): Path<(String, String, String, String)>,
) -> Result<StatusCode> {
    let key = ContainerKey::new(document_id, sub_document_key);
    let lookup = id.clone();
    let deleted = state
        .mutate(move |session| session.remove(&key, &category, &lookup))
        .await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Annotation not found: {}", id)))
    }
}
