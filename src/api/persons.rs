// 👥 Person lookup endpoints

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;

use super::{error::ApiError, run_blocking, AppState};
use crate::access::{can_administer, Caller};
use crate::directory::SEARCH_LIMIT;
use crate::error::DomainError;
use crate::model::PersonSummary;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: Option<String>,
}

/// GET /persons/search?query= (ADMIN)
pub async fn search(
    State(state): State<AppState>,
    caller: Caller,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<PersonSummary>>, ApiError> {
    if !can_administer(caller.role) {
        return Err(DomainError::Forbidden("Only administrators can search persons".to_string()).into());
    }

    let Query(params) = params?;
    let term = params.query.unwrap_or_default();

    let directory = state.directory.clone();
    let persons = run_blocking(move || directory.search(&term, SEARCH_LIMIT)).await?;

    Ok(Json(persons))
}
