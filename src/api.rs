// HTTP API over the ledger
//
// Every handler goes through one mutex-guarded Database, so requests are
// applied one at a time, the same as a single operator at the terminal.

use crate::db::{Amounts, Casino, Database, TransactionView};
use crate::error::{Error, ErrorKind};
use crate::stats::{CasinoSeries, Overview};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Database>>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    fn with_db<T>(&self, op: impl FnOnce(&Database) -> crate::Result<T>) -> Result<T, ApiError> {
        // The handle holds no state a panicking request could have half-written
        let guard = match self.db.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        op(&*guard).map_err(ApiError)
    }
}

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &Error) -> StatusCode {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NoData => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Config | ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            info!("Request rejected ({}): {}", status.as_u16(), self.0);
        }
        (status, Json(ApiResponse::err(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct NewCasino {
    pub name: String,
    #[serde(default)]
    pub link: Option<String>,
}

/// Either `casino_id` or `casino` (a name) picks the target.
#[derive(Debug, Deserialize)]
pub struct NewTransaction {
    #[serde(default)]
    pub casino_id: Option<i64>,
    #[serde(default)]
    pub casino: Option<String>,
    #[serde(default)]
    pub deposit: f64,
    #[serde(default)]
    pub remaining: f64,
    #[serde(default)]
    pub payment: f64,
}

#[derive(Debug, Serialize)]
pub struct Created {
    pub id: i64,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/casinos
async fn list_casinos(State(state): State<AppState>) -> ApiResult<Vec<Casino>> {
    let casinos = state.with_db(|db| db.casinos())?;
    Ok(Json(ApiResponse::ok(casinos)))
}

/// POST /api/casinos
async fn create_casino(
    State(state): State<AppState>,
    Json(body): Json<NewCasino>,
) -> Result<(StatusCode, Json<ApiResponse<Casino>>), ApiError> {
    let casino = state.with_db(|db| {
        let id = db.add_casino(&body.name, body.link.as_deref())?;
        db.casino(id)?.ok_or(Error::CasinoNotFound(id))
    })?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(casino))))
}

/// GET /api/transactions - oldest first, with casino names
async fn list_transactions(State(state): State<AppState>) -> ApiResult<Vec<TransactionView>> {
    let transactions = state.with_db(|db| db.transaction_views())?;
    Ok(Json(ApiResponse::ok(transactions)))
}

/// POST /api/transactions
async fn create_transaction(
    State(state): State<AppState>,
    Json(body): Json<NewTransaction>,
) -> Result<(StatusCode, Json<ApiResponse<Created>>), ApiError> {
    let amounts = Amounts::new(body.deposit, body.remaining, body.payment);

    let id = state.with_db(|db| match (body.casino_id, body.casino.as_deref()) {
        (Some(casino_id), _) => db.record_transaction(casino_id, amounts),
        (None, Some(name)) => db.record_transaction_by_name(name, amounts),
        (None, None) => Err(Error::InvalidInput(
            "either casino_id or casino must be given".to_string(),
        )),
    })?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(Created { id }))))
}

/// GET /api/overview
async fn overview(State(state): State<AppState>) -> ApiResult<Overview> {
    let overview = state.with_db(|db| db.overview())?;
    Ok(Json(ApiResponse::ok(overview)))
}

/// GET /api/casinos/:name/stats
async fn casino_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<CasinoSeries> {
    let series = state.with_db(|db| db.casino_stats(&name))?;
    Ok(Json(ApiResponse::ok(series)))
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/casinos", get(list_casinos).post(create_casino))
        .route("/casinos/:name/stats", get(casino_stats))
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route("/overview", get(overview))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TempDb;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_router(temp: &TempDb) -> Router {
        let db = Database::new(temp.path());
        db.init().unwrap();
        router(AppState::new(db))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let temp = TempDb::new("api-health");
        let app = test_router(&temp);

        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_create_casino_and_record_transactions() {
        let temp = TempDb::new("api-flow");
        let app = test_router(&temp);

        let (status, body) = send(&app, Method::POST, "/api/casinos", Some(json!({"name": "Royal"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_i64().unwrap();
        assert_eq!(body["data"]["deposit"], 0.0);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/transactions",
            Some(json!({"casino_id": id, "deposit": 200.0, "remaining": 30.0, "payment": 40.0})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/transactions",
            Some(json!({"casino": "Royal", "deposit": 100.0, "remaining": 20.0, "payment": 50.0})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = send(&app, Method::GET, "/api/casinos", None).await;
        let casino = &body["data"][0];
        assert_eq!(casino["deposit"], 300.0);
        assert_eq!(casino["remaining"], 20.0);
        assert_eq!(casino["payment"], 90.0);

        let (_, body) = send(&app, Method::GET, "/api/transactions", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"][0]["casino"], "Royal");

        let (status, body) = send(&app, Method::GET, "/api/casinos/Royal/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["summary"]["total_deposit"], 300.0);
        assert_eq!(body["data"]["summary"]["profit"], -190.0);

        let (status, body) = send(&app, Method::GET, "/api/overview", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totals"]["profit"], -190.0);
    }

    #[tokio::test]
    async fn test_create_casino_returns_stored_row() {
        let temp = TempDb::new("api-create");
        let app = test_router(&temp);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/casinos",
            Some(json!({"name": "  Golden Palace ", "link": "https://golden.example"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["name"], "Golden Palace");
        assert_eq!(body["data"]["link"], "https://golden.example");
        assert_eq!(body["data"]["remaining"], 0.0);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let temp = TempDb::new("api-errors");
        let app = test_router(&temp);

        send(&app, Method::POST, "/api/casinos", Some(json!({"name": "Royal"}))).await;

        let (status, body) = send(&app, Method::POST, "/api/casinos", Some(json!({"name": "Royal"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, _) = send(&app, Method::POST, "/api/casinos", Some(json!({"name": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/transactions",
            Some(json!({"casino_id": 99, "deposit": 1.0})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::POST, "/api/transactions", Some(json!({"deposit": 1.0}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // known casino, nothing recorded yet
        let (status, body) = send(&app, Method::GET, "/api/casinos/Royal/stats", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("No transactions"));

        let (status, _) = send(&app, Method::GET, "/api/casinos/Ghost/stats", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_faults_are_server_errors() {
        let err = Error::Store(rusqlite::Error::InvalidQuery);
        assert_eq!(status_for(&err), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(&Error::DuplicateCasino("x".into())), StatusCode::CONFLICT);
    }
}
