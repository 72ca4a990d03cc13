use std::path::Path;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeDir;

use crate::data::filter::{apply_filters, FilterCriteria};
use crate::data::model::RowView;
use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/api/data", get(get_data))
        .route("/api/options", get(get_options))
        .route("/api/refresh", post(refresh))
        .with_state(state);

    match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Query string of `/api/data`. Absent, empty and `All` values leave a filter off.
#[derive(Debug, Default, Deserialize)]
pub struct DataQuery {
    pub ai_model: Option<String>,
    pub project_name: Option<String>,
    pub thumbs: Option<String>,
    pub user_query: Option<String>,
}

impl From<DataQuery> for FilterCriteria {
    fn from(query: DataQuery) -> Self {
        FilterCriteria::default()
            .ai_model(query.ai_model)
            .project_name(query.project_name)
            .thumbs(query.thumbs)
            .user_query(query.user_query)
    }
}

#[derive(Serialize)]
struct DataResponse<'a> {
    data: Vec<RowView<'a>>,
    columns: &'a [String],
    count: usize,
}

#[derive(Serialize)]
struct OptionsResponse<'a> {
    ai_models: &'a [String],
    project_names: &'a [String],
    count: usize,
}

#[derive(Serialize)]
struct RefreshResponse {
    count: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_data(
    State(state): State<AppState>,
    Query(query): Query<DataQuery>,
) -> Result<Response, ApiError> {
    let criteria = FilterCriteria::from(query);
    let dataset = state.dataset.snapshot();
    let result = apply_filters(&dataset.table, &criteria)?;
    if criteria.is_identity() {
        log::debug!("unfiltered request, {} rows", result.count);
    } else {
        log::debug!(
            "{criteria:?} matched {} of {} rows",
            result.count,
            dataset.table.len()
        );
    }

    // Serialise while the snapshot is still borrowed.
    Ok(Json(DataResponse {
        data: result.row_views().collect(),
        columns: result.columns,
        count: result.count,
    })
    .into_response())
}

async fn get_options(State(state): State<AppState>) -> Response {
    let dataset = state.dataset.snapshot();
    Json(OptionsResponse {
        ai_models: &dataset.ai_models,
        project_names: &dataset.project_names,
        count: dataset.table.len(),
    })
    .into_response()
}

async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>, ApiError> {
    let dataset = state.refresh().await.map_err(ApiError::Reload)?;
    Ok(Json(RefreshResponse {
        count: dataset.table.len(),
    }))
}
