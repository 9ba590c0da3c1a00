// 🌐 REST API with Axum
// Thin boundary over the core: authenticate, extract, call the core on the
// blocking pool, map the result to JSON.

pub mod auth;
pub mod error;
pub mod persons;
pub mod sheets;

use axum::{
    body::Body,
    http::Request,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::accounts::AccountService;
use crate::directory::PersonDirectory;
use crate::error::DomainError;
use crate::queries::SheetQueries;
use crate::sheets::SheetManager;
use crate::store::Store;

pub use auth::{Claims, TokenIssuer};
pub use error::ApiError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub directory: PersonDirectory,
    pub sheets: SheetManager,
    pub queries: SheetQueries,
    pub accounts: AccountService,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, tokens: TokenIssuer) -> Self {
        AppState {
            directory: PersonDirectory::new(store.clone()),
            sheets: SheetManager::new(store.clone()),
            queries: SheetQueries::new(store.clone()),
            accounts: AccountService::new(store),
            tokens,
        }
    }
}

/// Core calls hit SQLite and argon2, so they run off the async workers.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError(DomainError::Internal(format!("Worker task failed: {e}"))))?
        .map_err(ApiError::from)
}

/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/register-client", post(auth::register_client));

    let person_routes = Router::new().route("/search", get(persons::search));

    let sheet_routes = Router::new()
        .route("/suggestions-persons", get(sheets::suggest_persons))
        .route("/mine", get(sheets::list_mine))
        .route("/create", post(sheets::create_by_legal_id))
        .route("/create-by-name", post(sheets::create_by_name))
        .route("/:id", get(sheets::get_sheet))
        .route("/:id/entries", post(sheets::add_entry));

    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .nest("/persons", person_routes)
        .nest("/sheets", sheet_routes)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
