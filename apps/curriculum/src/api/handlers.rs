//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        ErrorResponse, ExportResponse, HealthResponse, ImportRequest, ImportResponse, ListQuery,
        StatusResponse,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use curriculum_core::{
    Catalog, CurriculumError, CurriculumFilter, CurriculumSummary, CurriculumTree, ImportOptions,
    Importer, Page, RecordId, all_trees, curriculum_tree, export_tables, list_curricula, pack,
};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for a core error.
///
/// Archive problems are the client's fault; storage problems are ours.
pub fn error_status(error: &CurriculumError) -> StatusCode {
    match error {
        CurriculumError::IncompleteArchive { .. }
        | CurriculumError::ArchiveFormat(_)
        | CurriculumError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CurriculumError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error returned by the read endpoints.
#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl From<CurriculumError> for ApiError {
    fn from(error: CurriculumError) -> Self {
        Self(error_status(&error), error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorResponse { error: self.1 })).into_response()
    }
}

fn backend_name(catalog: &Catalog) -> &'static str {
    if catalog.is_persistent() {
        "redb"
    } else {
        "memory"
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Record counts per kind.
pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let catalog = state.catalog.lock().await;
    let counts = catalog.counts()?;
    Ok(Json(StatusResponse::new(backend_name(&catalog), counts)))
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Export the whole catalog as a base64 encoded archive.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.catalog.lock().await;

    let packed = export_tables(&*catalog).and_then(|tables| Ok((pack(&tables)?, tables)));
    match packed {
        Ok((data, tables)) => {
            tracing::info!(bytes = data.len(), "export served");
            (StatusCode::OK, Json(ExportResponse::success(&data, &tables)))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExportResponse::error(format!("Export failed: {}", e))),
        ),
    }
}

// =============================================================================
// IMPORT HANDLER
// =============================================================================

/// Import a base64 encoded archive.
///
/// The import itself is synchronous and runs on the blocking pool while
/// holding the catalog lock, so imports never interleave.
pub async fn import_handler(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> impl IntoResponse {
    let bytes = match base64::Engine::decode(
        &base64::engine::general_purpose::STANDARD,
        request.archive.as_bytes(),
    ) {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ImportResponse::error(format!("Invalid base64 archive: {}", e))),
            );
        }
    };

    let limit = state.config.archive_limit();
    if bytes.len() > limit {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(ImportResponse::error(format!(
                "Archive size {} bytes exceeds maximum {} bytes",
                bytes.len(),
                limit
            ))),
        );
    }

    let options = ImportOptions::default()
        .dry_run(request.dry_run)
        .strict_references(
            request
                .strict_references
                .unwrap_or(state.config.import.strict_references),
        );

    let mut catalog = state.catalog.clone().lock_owned().await;
    let outcome =
        tokio::task::spawn_blocking(move || Importer::new(options).run(&mut *catalog, &bytes))
            .await;

    match outcome {
        Ok(Ok(report)) => {
            tracing::info!(
                inserted = report.total_inserted(),
                dry_run = report.dry_run,
                fatal = report.has_fatal(),
                "import finished"
            );
            (StatusCode::OK, Json(ImportResponse::success(report)))
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "import rejected");
            (error_status(&e), Json(ImportResponse::error(e.to_string())))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ImportResponse::error(format!("Import task failed: {}", e))),
        ),
    }
}

// =============================================================================
// READ VIEWS
// =============================================================================

/// Paginated curriculum list, filtered by state and subject.
pub async fn list_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<CurriculumSummary>>, ApiError> {
    let page = query.page_number();
    let filter = CurriculumFilter {
        state: query.state,
        subject: query.subject,
    };
    let catalog = state.catalog.lock().await;
    Ok(Json(list_curricula(&*catalog, &filter, page)?))
}

/// Every curriculum with its full subtree.
pub async fn all_trees_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<CurriculumTree>>, ApiError> {
    let catalog = state.catalog.lock().await;
    Ok(Json(all_trees(&*catalog)?))
}

/// One curriculum with its full subtree.
pub async fn tree_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<CurriculumTree>, ApiError> {
    let catalog = state.catalog.lock().await;
    match curriculum_tree(&*catalog, RecordId(id))? {
        Some(tree) => Ok(Json(tree)),
        None => Err(ApiError(
            StatusCode::NOT_FOUND,
            format!("curriculum {} not found", id),
        )),
    }
}
