use crate::auth::{self, AuthUser, JwtProvider, ROLE_USER};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use crate::openapi::ApiDoc;
use crate::services::{Clock, CreditService, CustomerService};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;
use validator::Validate;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Bearer token issuer and verifier.
    pub jwt: JwtProvider,
    /// Source of "today" for the first-installment date rule.
    pub clock: Clock,
}

/// Builds the application router.
///
/// The authentication filter runs on every route; it only attaches the
/// principal, and handlers that require one reject its absence with 401.
/// Swagger UI and the OpenAPI document stay public.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/api/customers", post(create_customer))
        .route(
            "/api/customers/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/api/credits", post(create_credit).get(list_credits))
        .route("/api/credits/:credit_code", get(get_credit_by_code))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .with_state(state)
}

/// Deserializes and field-validates a JSON request body.
///
/// A body that fails to deserialize, or deserializes but violates a field
/// rule, produces the structured validation response.
fn validated<T: Validate>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    let Json(value) = body.map_err(|rejection| rejected("body", rejection.body_text()))?;
    value.validate()?;
    Ok(value)
}

/// Unwraps a query-string extraction, turning the rejection into the
/// structured validation response instead of axum's plain-text default.
fn parsed_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    let Query(value) = query.map_err(|rejection| rejected("query", rejection.body_text()))?;
    Ok(value)
}

/// Unwraps a path-parameter extraction, same treatment as [`parsed_query`].
fn parsed_path<T>(path: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    let Path(value) = path.map_err(|rejection| rejected("path", rejection.body_text()))?;
    Ok(value)
}

fn rejected(part: &str, message: String) -> AppError {
    let mut details = BTreeMap::new();
    details.insert(part.to_string(), message);
    AppError::Validation(details)
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy")),
    tag = "health"
)]
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "credit-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/auth/login
///
/// Verifies the supplied credentials against the stored bcrypt hash and
/// issues a bearer token for the customer. The response never reveals
/// whether the email or the password was at fault.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let request = validated(body)?;
    let customer = CustomerService::new(state.db.clone())
        .authenticate(&request.email, &request.password)
        .await?;

    let token = state
        .jwt
        .issue(&customer.email, vec![ROLE_USER.to_string()])?;

    tracing::info!(customer_id = customer.id, "Customer logged in");
    Ok(Json(TokenResponse { token }))
}

/// POST /api/customers
///
/// Registers a new customer. Public endpoint: a customer cannot hold a
/// token before registering.
///
/// # Returns
///
/// * 201 with a `Location` header pointing to the created resource and the
///   stored profile as body.
#[utoipa::path(
    post,
    path = "/api/customers",
    request_body = CustomerRequest,
    responses(
        (status = 201, description = "Customer registered", body = CustomerResponse),
        (status = 400, description = "Validation failure or duplicate CPF/email"),
    ),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CustomerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = validated(body)?;

    let customer = CustomerService::new(state.db.clone()).create(&request).await?;
    tracing::info!(customer_id = customer.id, "Customer registered");

    let location = format!("/api/customers/{}", customer.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(CustomerResponse::from(customer)),
    ))
}

/// GET /api/customers/:id
#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    params(("id" = i64, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer profile", body = CustomerResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Customer not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<CustomerResponse>, AppError> {
    let id = parsed_path(path)?;
    let customer = CustomerService::new(state.db.clone()).find_by_id(id).await?;
    Ok(Json(CustomerResponse::from(customer)))
}

/// PUT /api/customers/:id
///
/// Partial update: only the fields present in the body are overwritten.
#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    params(("id" = i64, Path, description = "Customer id")),
    request_body = CustomerUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = CustomerResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Customer not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<CustomerUpdateRequest>, JsonRejection>,
) -> Result<Json<CustomerResponse>, AppError> {
    let id = parsed_path(path)?;
    let patch = validated(body)?;

    let customer = CustomerService::new(state.db.clone()).update(id, &patch).await?;
    tracing::info!(customer_id = customer.id, "Customer updated");
    Ok(Json(CustomerResponse::from(customer)))
}

/// DELETE /api/customers/:id
///
/// Owned credits are removed with the customer by the schema's cascade.
#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    params(("id" = i64, Path, description = "Customer id")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Customer not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "customers"
)]
pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = parsed_path(path)?;
    CustomerService::new(state.db.clone()).delete(id).await?;
    tracing::info!(customer_id = id, "Customer deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/credits
///
/// Requests a credit for an existing customer, subject to the eligibility
/// rules (installment count within [1, 48], first installment at most three
/// months ahead).
#[utoipa::path(
    post,
    path = "/api/credits",
    request_body = CreditRequest,
    responses(
        (status = 201, description = "Credit created", body = CreditResponse),
        (status = 400, description = "Eligibility rule violated"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Customer not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "credits"
)]
pub async fn create_credit(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    body: Result<Json<CreditRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = validated(body)?;

    let credit = CreditService::new(state.db.clone(), state.clock)
        .create(&request)
        .await?;
    tracing::info!(
        customer_id = credit.customer_id,
        credit_code = %credit.credit_code,
        "Credit created"
    );

    Ok((StatusCode::CREATED, Json(CreditResponse::from(credit))))
}

/// GET /api/credits?customerId=&page=&size=
#[utoipa::path(
    get,
    path = "/api/credits",
    params(CreditListParams),
    responses(
        (status = 200, description = "Page of the customer's credits", body = [CreditSummary]),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Customer not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "credits"
)]
pub async fn list_credits(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    query: Result<Query<CreditListParams>, QueryRejection>,
) -> Result<Json<Vec<CreditSummary>>, AppError> {
    let params = parsed_query(query)?;
    let credits = CreditService::new(state.db.clone(), state.clock)
        .find_all_by_customer(params.customer_id, params.page, params.size)
        .await?;

    Ok(Json(credits.into_iter().map(CreditSummary::from).collect()))
}

/// GET /api/credits/:credit_code?customerId=
///
/// The credit must belong to the customer named in the query; a code owned
/// by someone else is a business-rule violation, not a 404.
#[utoipa::path(
    get,
    path = "/api/credits/{credit_code}",
    params(
        ("credit_code" = Uuid, Path, description = "Public credit code"),
        CreditOwnerParams,
    ),
    responses(
        (status = 200, description = "Credit detail", body = CreditView),
        (status = 400, description = "Credit belongs to another customer"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Credit code not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "credits"
)]
pub async fn get_credit_by_code(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<CreditOwnerParams>, QueryRejection>,
) -> Result<Json<CreditView>, AppError> {
    let credit_code = parsed_path(path)?;
    let params = parsed_query(query)?;
    let credit = CreditService::new(state.db.clone(), state.clock)
        .find_by_credit_code(params.customer_id, credit_code)
        .await?;
    let owner = CustomerService::new(state.db.clone())
        .find_by_id(credit.customer_id)
        .await?;

    Ok(Json(CreditView::new(credit, &owner)))
}
