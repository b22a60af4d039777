// Herdbook REST API
// Axum router over the SQLite store. The binary in bin/server.rs only binds it.

use crate::classifier::{age_months, determine_category, parse_date};
use crate::db::{
    get_animal_by_tag, get_events_for_animal, get_movements_for_animal, herd_summary,
    list_animals, list_dams, list_sires, refresh_categories, register_animal, AnimalFilter,
    NewAnimal,
};
use crate::error::HerdError;
use crate::records::{
    list_births, list_exits, list_health_events, list_purchases, list_sales, record_birth,
    record_exit, record_health_event, record_purchase, record_sale, HealthEventFilter, NewBirth,
    NewExit, NewHealthEvent, NewPurchase, NewSale,
};
use crate::schema::ValidationError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    actor: String,
}

impl AppState {
    pub fn new(conn: Connection, actor: &str) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            actor: actor.to_string(),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-request leaves the connection usable; SQLite rolled back.
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ============================================================================
// Response envelope
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<ValidationError>,
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

/// Store error as an HTTP response
struct ApiError(HerdError);

impl From<HerdError> for ApiError {
    fn from(err: HerdError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            HerdError::Validation(_) | HerdError::InvalidExitType(_) => StatusCode::BAD_REQUEST,
            HerdError::AnimalNotFound(_) => StatusCode::NOT_FOUND,
            HerdError::DuplicateTag(_) | HerdError::AlreadyInactive(_) => StatusCode::CONFLICT,
            HerdError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let fields = match &self.0 {
            HerdError::Validation(errors) => errors.clone(),
            _ => Vec::new(),
        };
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: self.0.code(),
                message: self.0.to_string(),
                fields,
            }),
        };

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::ok(data))))
}

fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(data))))
}

// ============================================================================
// Query parameters
// ============================================================================

/// `?as_of=YYYY-MM-DD` overrides today as the classification reference date
#[derive(Debug, Default, Deserialize)]
pub struct ReferenceQuery {
    as_of: Option<NaiveDate>,
}

impl ReferenceQuery {
    fn reference_date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(today)
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[derive(Debug, Default, Deserialize)]
pub struct ClassifyQuery {
    #[serde(default)]
    species: String,
    #[serde(default)]
    sex: String,
    #[serde(default)]
    dob: String,
    #[serde(default)]
    castrated: bool,
    reference_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    category: String,
    age_months: Option<i32>,
    reference_date: NaiveDate,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/classify - Category for raw form input, recomputed on every change
async fn classify(Query(query): Query<ClassifyQuery>) -> ApiResult<ClassifyResponse> {
    let reference_date = query.reference_date.unwrap_or_else(today);
    let dob = parse_date(&query.dob);

    ok(ClassifyResponse {
        category: determine_category(
            &query.species,
            &query.sex,
            dob,
            query.castrated,
            reference_date,
        ),
        age_months: dob.map(|d| age_months(d, reference_date)),
        reference_date,
    })
}

/// GET /api/livestock - List animals, optionally filtered
async fn get_livestock(
    State(state): State<AppState>,
    Query(filter): Query<AnimalFilter>,
) -> ApiResult<Vec<crate::db::Animal>> {
    let conn = state.conn();
    ok(list_animals(&conn, &filter)?)
}

/// POST /api/livestock - Register an animal
async fn create_livestock(
    State(state): State<AppState>,
    Query(reference): Query<ReferenceQuery>,
    Json(animal): Json<NewAnimal>,
) -> ApiResult<crate::db::Animal> {
    let conn = state.conn();
    created(register_animal(
        &conn,
        &animal,
        reference.reference_date(),
        &state.actor,
    )?)
}

/// GET /api/livestock/:tag
async fn get_livestock_by_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> ApiResult<crate::db::Animal> {
    let conn = state.conn();
    ok(get_animal_by_tag(&conn, &tag)?)
}

/// GET /api/livestock/:tag/events
async fn get_livestock_events(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> ApiResult<Vec<crate::db::Event>> {
    let conn = state.conn();
    let animal = get_animal_by_tag(&conn, &tag)?;
    ok(get_events_for_animal(&conn, animal.id)?)
}

/// GET /api/livestock/:tag/movements
async fn get_livestock_movements(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> ApiResult<Vec<crate::db::Movement>> {
    let conn = state.conn();
    let animal = get_animal_by_tag(&conn, &tag)?;
    ok(get_movements_for_animal(&conn, animal.id)?)
}

/// GET /api/livestock/sires
async fn get_sires(State(state): State<AppState>) -> ApiResult<Vec<crate::db::Animal>> {
    let conn = state.conn();
    ok(list_sires(&conn)?)
}

/// GET /api/livestock/dams
async fn get_dams(State(state): State<AppState>) -> ApiResult<Vec<crate::db::Animal>> {
    let conn = state.conn();
    ok(list_dams(&conn)?)
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    changed: usize,
    as_of: NaiveDate,
}

/// POST /api/livestock/refresh-categories
async fn post_refresh_categories(
    State(state): State<AppState>,
    Query(reference): Query<ReferenceQuery>,
) -> ApiResult<RefreshResponse> {
    let conn = state.conn();
    let as_of = reference.reference_date();
    let changed = refresh_categories(&conn, as_of, &state.actor)?;
    ok(RefreshResponse { changed, as_of })
}

/// GET /api/births
async fn get_births(State(state): State<AppState>) -> ApiResult<Vec<crate::records::Birth>> {
    let conn = state.conn();
    ok(list_births(&conn)?)
}

/// POST /api/births
async fn create_birth(
    State(state): State<AppState>,
    Query(reference): Query<ReferenceQuery>,
    Json(birth): Json<NewBirth>,
) -> ApiResult<crate::records::Birth> {
    let conn = state.conn();
    created(record_birth(
        &conn,
        &birth,
        reference.reference_date(),
        &state.actor,
    )?)
}

/// GET /api/purchases
async fn get_purchases(
    State(state): State<AppState>,
) -> ApiResult<Vec<crate::records::Purchase>> {
    let conn = state.conn();
    ok(list_purchases(&conn)?)
}

/// POST /api/purchases
async fn create_purchase(
    State(state): State<AppState>,
    Query(reference): Query<ReferenceQuery>,
    Json(purchase): Json<NewPurchase>,
) -> ApiResult<crate::records::Purchase> {
    let conn = state.conn();
    created(record_purchase(
        &conn,
        &purchase,
        reference.reference_date(),
        &state.actor,
    )?)
}

/// GET /api/sales
async fn get_sales(State(state): State<AppState>) -> ApiResult<Vec<crate::records::Sale>> {
    let conn = state.conn();
    ok(list_sales(&conn)?)
}

/// POST /api/sales
async fn create_sale(
    State(state): State<AppState>,
    Json(sale): Json<NewSale>,
) -> ApiResult<crate::records::Sale> {
    let conn = state.conn();
    created(record_sale(&conn, &sale, &state.actor)?)
}

/// GET /api/exits
async fn get_exits(State(state): State<AppState>) -> ApiResult<Vec<crate::records::Exit>> {
    let conn = state.conn();
    ok(list_exits(&conn)?)
}

/// POST /api/exits
async fn create_exit(
    State(state): State<AppState>,
    Json(exit): Json<NewExit>,
) -> ApiResult<crate::records::Exit> {
    let conn = state.conn();
    created(record_exit(&conn, &exit, &state.actor)?)
}

/// GET /api/health-events - Optional `tag_number`, `date_from`, `date_to` filters
async fn get_health_events(
    State(state): State<AppState>,
    Query(filter): Query<HealthEventFilter>,
) -> ApiResult<Vec<crate::records::HealthEvent>> {
    let conn = state.conn();
    ok(list_health_events(&conn, &filter)?)
}

/// POST /api/health-events
async fn create_health_event(
    State(state): State<AppState>,
    Json(event): Json<NewHealthEvent>,
) -> ApiResult<crate::records::HealthEvent> {
    let conn = state.conn();
    created(record_health_event(&conn, &event, &state.actor)?)
}

/// GET /api/summary - Active head count by species and category as of `?as_of`
async fn get_summary(
    State(state): State<AppState>,
    Query(reference): Query<ReferenceQuery>,
) -> ApiResult<Vec<crate::db::HerdSummaryRow>> {
    let conn = state.conn();
    ok(herd_summary(&conn, reference.reference_date())?)
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/classify", get(classify))
        .route("/livestock", get(get_livestock).post(create_livestock))
        .route("/livestock/sires", get(get_sires))
        .route("/livestock/dams", get(get_dams))
        .route("/livestock/refresh-categories", post(post_refresh_categories))
        .route("/livestock/:tag", get(get_livestock_by_tag))
        .route("/livestock/:tag/events", get(get_livestock_events))
        .route("/livestock/:tag/movements", get(get_livestock_movements))
        .route("/births", get(get_births).post(create_birth))
        .route("/purchases", get(get_purchases).post(create_purchase))
        .route("/sales", get(get_sales).post(create_sale))
        .route("/exits", get(get_exits).post(create_exit))
        .route(
            "/health-events",
            get(get_health_events).post(create_health_event),
        )
        .route("/summary", get(get_summary))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}
