// 📋 Weighing sheet endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{error::ApiError, run_blocking, AppState};
use crate::access::{can_mutate_cattle, Caller};
use crate::error::DomainError;
use crate::model::{CattleType, EntryInput, PersonSummary, RawWeight, Sex, SheetDetail, SheetId, SheetSummary};
use crate::queries::ListQuery;
use crate::sheets::{AppendedEntry, CounterpartyRef};

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SuggestParams {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MineParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateByLegalIdRequest {
    pub seller_legal_id: String,
    pub buyer_legal_id: String,
}

#[derive(Debug, Deserialize)]
pub struct NamedParty {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateByNameRequest {
    pub seller: NamedParty,
    pub buyer: NamedParty,
}

/// Entry fields are all optional here so a missing one is reported as a
/// validation error rather than a body rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest {
    #[serde(default, alias = "number")]
    pub tag_number: Option<String>,
    #[serde(default, rename = "type")]
    pub cattle_type: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub weight: Option<RawWeight>,
    #[serde(default)]
    pub mark: Option<String>,
}

impl EntryRequest {
    fn into_input(self) -> Result<EntryInput, DomainError> {
        let (Some(cattle_type), Some(sex), Some(weight)) = (self.cattle_type, self.sex, self.weight)
        else {
            return Err(DomainError::Validation(
                "Missing required fields: type, sex, weight".to_string(),
            ));
        };

        Ok(EntryInput {
            tag_number: self.tag_number.unwrap_or_default(),
            cattle_type: cattle_type.parse::<CattleType>()?,
            sex: sex.parse::<Sex>()?,
            weight,
            mark: self.mark,
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /sheets/suggestions-persons?q=
pub async fn suggest_persons(
    State(state): State<AppState>,
    _caller: Caller,
    params: Result<Query<SuggestParams>, QueryRejection>,
) -> ApiResult<Json<Vec<PersonSummary>>> {
    let Query(params) = params?;
    let term = params.q.unwrap_or_default();

    let queries = state.queries.clone();
    Ok(Json(run_blocking(move || queries.suggest_persons(&term)).await?))
}

/// GET /sheets/mine?q=&from=&to=
pub async fn list_mine(
    State(state): State<AppState>,
    caller: Caller,
    params: Result<Query<MineParams>, QueryRejection>,
) -> ApiResult<Json<Vec<SheetSummary>>> {
    let Query(params) = params?;
    let query = ListQuery {
        text: params.q,
        date_from: params.from,
        date_to: params.to,
    };

    let queries = state.queries.clone();
    Ok(Json(run_blocking(move || queries.list_for_caller(&caller, &query)).await?))
}

/// POST /sheets/create (ADMIN), counterparties by legal id
pub async fn create_by_legal_id(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateByLegalIdRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SheetDetail>)> {
    let Json(request) = body?;
    let seller = CounterpartyRef::ByLegalId(request.seller_legal_id);
    let buyer = CounterpartyRef::ByLegalId(request.buyer_legal_id);

    let sheets = state.sheets.clone();
    let detail = run_blocking(move || sheets.create_sheet(&seller, &buyer, &caller)).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

/// POST /sheets/create-by-name (ADMIN), counterparties found or created by name
pub async fn create_by_name(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateByNameRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SheetDetail>)> {
    let Json(request) = body?;
    let seller = CounterpartyRef::ByName(request.seller.name);
    let buyer = CounterpartyRef::ByName(request.buyer.name);

    let sheets = state.sheets.clone();
    let detail = run_blocking(move || sheets.create_sheet(&seller, &buyer, &caller)).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /sheets/:id
pub async fn get_sheet(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<SheetId>, PathRejection>,
) -> ApiResult<Json<SheetDetail>> {
    let Path(sheet_id) = id?;

    let sheets = state.sheets.clone();
    Ok(Json(run_blocking(move || sheets.get_sheet(sheet_id, &caller)).await?))
}

/// POST /sheets/:id/entries (ADMIN)
pub async fn add_entry(
    State(state): State<AppState>,
    caller: Caller,
    id: Result<Path<SheetId>, PathRejection>,
    body: Result<Json<EntryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AppendedEntry>)> {
    // A refused caller gets 403 whatever the body looks like
    if !can_mutate_cattle(caller.role) {
        return Err(DomainError::Forbidden("Only administrators can add cattle".to_string()).into());
    }

    let Path(sheet_id) = id?;
    let Json(request) = body?;

    let sheets = state.sheets.clone();
    let appended =
        run_blocking(move || sheets.add_entry(sheet_id, request.into_input()?, &caller)).await?;

    Ok((StatusCode::CREATED, Json(appended)))
}
