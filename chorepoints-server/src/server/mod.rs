mod acl;
pub mod auth;
mod config;

use crate::chores::{ClaimError, ClaimRequest};
use crate::server::auth::AuthCtx;
use crate::settlement::{ClaimOutcome, SettlementError};
use crate::storage::{StorageError, Store, models};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::response::Response as AxumResponse;
use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::{Method, StatusCode, header},
    routing::{delete, get, post, put},
};
use bcrypt::verify;
use chorepoints_shared::api::{self, ChildDto, ClaimDto, PointLogDto};
use chorepoints_shared::auth::Role;
use chrono::Utc;
use chrono_tz::Tz;
pub use config::{AppConfig, ConfigError, SettlementConfig, UserConfig};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Span, info_span};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    pub tz: Tz,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, store: Store) -> Result<Self, ConfigError> {
        let tz = config.tz()?;
        Ok(Self {
            config,
            store,
            tz,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

pub fn router(state: AppState) -> Router {
    let private = Router::new()
        .route("/api/v1/children", get(api_list_children))
        .route("/api/v1/chores", get(api_list_chores))
        .route("/api/v1/claims", get(api_list_pending_claims))
        .route("/api/v1/claims/{claim_id}/approve", post(api_approve_claim))
        .route("/api/v1/claims/{claim_id}/reject", post(api_reject_claim))
        .route(
            "/api/v1/children/{id}/claims",
            get(api_list_child_claims).post(api_submit_claim),
        )
        .route(
            "/api/v1/children/{id}/claims/{claim_id}",
            delete(api_return_claim),
        )
        .route("/api/v1/children/{id}/ledger", get(api_child_ledger))
        .route(
            "/api/v1/children/{id}/points",
            get(api_child_balance).post(api_adjust_points),
        )
        .route(
            "/api/v1/children/{id}/pocket-money",
            post(api_adjust_pocket_money),
        )
        .route("/api/v1/children/{id}/convert", post(api_convert_points))
        .route("/api/v1/settings", get(api_list_settings))
        .route("/api/v1/settings/{key}", put(api_update_setting))
        .route("/api/v1/settlement/run", post(api_run_settlement))
        .with_state(state.clone())
        .layer(middleware::from_fn(acl::enforce_acl))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ))
        .layer(middleware::from_fn(set_auth_span_fields));

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            username = tracing::field::Empty,
            role = tracing::field::Empty,
            child_id = tracing::field::Empty
        )
    });

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/api/v1/auth/login", post(api_auth_login))
        .merge(private)
        .with_state(state.clone())
        .layer(trace)
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(add_request_id));

    // Optionally add CORS for dev if configured
    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    // Use provided x-request-id if present, else generate
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(ReqId(rid.clone()));
    let mut resp = next.run(req).await;
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn add_security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let path = req.uri().path().to_string();
    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );

    // Balances change under the client's feet, never cache
    if path == "/healthz" || path.starts_with("/api/") {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
    }

    Ok(resp)
}

async fn set_auth_span_fields(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    if let Some(auth) = req.extensions().get::<AuthCtx>() {
        let span = Span::current();
        span.record("username", tracing::field::display(&auth.claims.sub));
        span.record("role", tracing::field::debug(&auth.claims.role));
        if let Some(cid) = &auth.claims.child_id {
            span.record("child_id", tracing::field::display(cid));
        }
    }
    Ok(next.run(req).await)
}

fn rfc3339(dt: chrono::NaiveDateTime) -> String {
    chrono::DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

fn claim_dto(c: models::ChoreClaim) -> ClaimDto {
    ClaimDto {
        id: c.id,
        child_id: c.child_id,
        chore_id: c.chore_id,
        chore_name: c.chore_name,
        points: c.points.0,
        approved: c.approved.0,
        comment: c.comment,
    }
}

async fn balance(state: &AppState, child_id: &str) -> Result<api::BalanceResp, AppError> {
    let child = state.store.get_child(child_id).await?;
    Ok(api::BalanceResp {
        child_id: child.id,
        points_balance: child.points_balance.0,
        pocket_money: child.pocket_money.0,
    })
}

async fn api_list_children(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthCtx>,
) -> Result<Json<Vec<ChildDto>>, AppError> {
    // ACL enforced by middleware
    let rows = state.store.list_children().await?;
    let items = rows
        .into_iter()
        .map(|c| ChildDto {
            id: c.id,
            display_name: c.display_name,
            points_balance: c.points_balance.0,
            pocket_money: c.pocket_money.0,
            place_1: c.place_1,
            place_2: c.place_2,
            place_3: c.place_3,
        })
        .collect();
    Ok(Json(items))
}

async fn api_list_chores(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthCtx>,
) -> Result<Json<Vec<api::ChoreDto>>, AppError> {
    let rows = state.store.list_chores().await?;
    let items = rows
        .into_iter()
        .map(|(c, assigned)| api::ChoreDto {
            assignment_type: c.assignment_type.parse().unwrap_or_default(),
            id: c.id,
            name: c.name,
            comment: c.comment,
            points: c.points.0,
            available: c.available,
            daily: c.daily,
            persistent: c.persistent,
            assigned_children: assigned,
            early_bonus: c.early_bonus,
            bonus_end_time: c.bonus_end_time,
            available_time: chorepoints_shared::domain::AvailableTime(c.available_time),
        })
        .collect();
    Ok(Json(items))
}

async fn api_list_pending_claims(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthCtx>,
) -> Result<Json<Vec<ClaimDto>>, AppError> {
    let rows = state.store.list_pending_claims().await?;
    Ok(Json(rows.into_iter().map(claim_dto).collect()))
}

async fn api_list_child_claims(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ClaimDto>>, AppError> {
    let rows = state.store.list_claims_for_child(&id).await?;
    Ok(Json(rows.into_iter().map(claim_dto).collect()))
}

async fn api_submit_claim(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Json(body): Json<api::ClaimReq>,
) -> Result<(StatusCode, Json<ClaimDto>), AppError> {
    let request = match (body.chore_id, body.name) {
        (Some(chore_id), None) => ClaimRequest::Chore { chore_id },
        (None, Some(name)) => ClaimRequest::Custom {
            name,
            points: body
                .points
                .ok_or_else(|| AppError::bad_request("points required for a custom claim"))?,
            comment: body.comment.unwrap_or_default(),
        },
        _ => return Err(AppError::bad_request("either chore_id or name required")),
    };
    let now = Utc::now().with_timezone(&state.tz);
    let claim = state.store.submit_claim(&id, request, now).await?;
    Ok((StatusCode::CREATED, Json(claim_dto(claim))))
}

async fn api_return_claim(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthCtx>,
    Path((id, claim_id)): Path<(String, i32)>,
) -> Result<StatusCode, AppError> {
    if state.store.return_claim(claim_id, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::conflict("claim already resolved"))
    }
}

async fn api_approve_claim(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(claim_id): Path<i32>,
    Json(body): Json<api::ApproveReq>,
) -> Result<Json<api::ApproveResp>, AppError> {
    let outcome = state
        .store
        .approve_claim(claim_id, body.penalty, &auth.claims.sub)
        .await?;
    let resp = match outcome {
        ClaimOutcome::Approved { amount, .. } => api::ApproveResp {
            claim_id,
            approved: amount,
            applied: true,
        },
        ClaimOutcome::AlreadyProcessed { approved, .. } => api::ApproveResp {
            claim_id,
            approved,
            applied: false,
        },
    };
    Ok(Json(resp))
}

async fn api_reject_claim(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(claim_id): Path<i32>,
) -> Result<Json<api::ApproveResp>, AppError> {
    let applied = state.store.reject_claim(claim_id, &auth.claims.sub).await?;
    Ok(Json(api::ApproveResp {
        claim_id,
        approved: Decimal::ZERO,
        applied,
    }))
}

#[derive(Deserialize)]
struct PageOpts {
    page: Option<usize>,
    per_page: Option<usize>,
}

async fn api_child_ledger(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Query(opts): Query<PageOpts>,
) -> Result<Json<Vec<PointLogDto>>, AppError> {
    let page = opts.page.unwrap_or(1);
    let per_page = opts.per_page.unwrap_or(20);
    let rows = state
        .store
        .list_ledger_for_child(&id, page, per_page)
        .await?;
    let items = rows
        .into_iter()
        .map(|r| PointLogDto {
            id: r.id,
            points_change: r.points_change.0,
            reason: r.reason,
            chore: r.chore,
            penalty: r.penalty.0,
            date_recorded: rfc3339(r.date_recorded),
            approver: r.approver,
        })
        .collect();
    Ok(Json(items))
}

async fn api_child_balance(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<api::BalanceResp>, AppError> {
    Ok(Json(balance(&state, &id).await?))
}

async fn api_adjust_points(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Json(body): Json<api::PointAdjustmentReq>,
) -> Result<Json<api::BalanceResp>, AppError> {
    state
        .store
        .adjust_points(&id, body.points_change, &body.reason, &auth.claims.sub)
        .await?;
    Ok(Json(balance(&state, &id).await?))
}

async fn api_adjust_pocket_money(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Json(body): Json<api::PocketMoneyAdjustmentReq>,
) -> Result<Json<api::BalanceResp>, AppError> {
    state.store.adjust_pocket_money(&id, body.amount).await?;
    Ok(Json(balance(&state, &id).await?))
}

async fn api_convert_points(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<api::BalanceResp>, AppError> {
    let (points_balance, pocket_money) = state
        .store
        .convert_points(&id, &auth.claims.sub)
        .await?;
    Ok(Json(api::BalanceResp {
        child_id: id,
        points_balance,
        pocket_money,
    }))
}

async fn api_list_settings(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthCtx>,
) -> Result<Json<Vec<api::SettingDto>>, AppError> {
    let rows = state.store.list_settings().await?;
    Ok(Json(
        rows.into_iter()
            .map(|s| api::SettingDto {
                key: s.key,
                name: s.name,
                value: s.value.0,
            })
            .collect(),
    ))
}

async fn api_update_setting(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(key): Path<String>,
    Json(body): Json<api::SettingUpdateReq>,
) -> Result<Json<api::SettingDto>, AppError> {
    let s = state.store.update_setting(&key, body.value).await?;
    tracing::info!(key = %s.key, value = %s.value, by = %auth.claims.sub, "setting changed");
    Ok(Json(api::SettingDto {
        key: s.key,
        name: s.name,
        value: s.value.0,
    }))
}

async fn api_run_settlement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<api::SettlementReportDto>, AppError> {
    let now = Utc::now().with_timezone(&state.tz);
    tracing::info!(by = %auth.claims.sub, "manual settlement requested");
    let report = state
        .store
        .run_settlement(&state.config.settlement.job_code, now)
        .await?;
    Ok(Json(report.into()))
}

async fn api_auth_login(
    State(state): State<AppState>,
    Json(body): Json<api::AuthReq>,
) -> Result<Json<api::AuthResp>, AppError> {
    let user = state
        .config
        .users
        .iter()
        .find(|u| u.username == body.username)
        .ok_or_else(|| {
            tracing::warn!(username=%body.username, "login: unknown username");
            AppError::unauthorized()
        })?;
    if !verify(&body.password, &user.password_hash).map_err(|e| {
        tracing::error!(username=%body.username, error=%e, "login: bcrypt verify failed");
        AppError::internal(e)
    })? {
        tracing::warn!(username=%body.username, "login: invalid password");
        return Err(AppError::unauthorized());
    }
    if user.role == Role::Child && user.child_id.is_none() {
        tracing::error!(username=%body.username, "login: child user missing child_id in config");
        return Err(AppError::internal("child user missing child_id"));
    }
    let token = auth::issue_jwt_for_user(&state, &user.username, user.role, user.child_id.clone())?;
    Ok(Json(api::AuthResp { token }))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        Self::BadRequest(msg.into())
    }
    fn unauthorized() -> Self {
        Self::Unauthorized
    }
    fn forbidden() -> Self {
        Self::Forbidden
    }
    fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }
    fn conflict<T: Into<String>>(msg: T) -> Self {
        Self::Conflict(msg.into())
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { .. } => AppError::not_found(e.to_string()),
            StorageError::InvalidInput(m) => AppError::bad_request(m),
            other => AppError::internal(other),
        }
    }
}

impl From<SettlementError> for AppError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::InvalidPenalty { .. } => AppError::bad_request(e.to_string()),
            SettlementError::NotFound { .. } => AppError::not_found(e.to_string()),
            SettlementError::MissingConfig(_) => AppError::conflict(e.to_string()),
            SettlementError::Storage(inner) => inner.into(),
        }
    }
}

impl From<ClaimError> for AppError {
    fn from(e: ClaimError) -> Self {
        match e {
            ClaimError::ChoreNotFound(_) | ClaimError::ChildNotFound(_) => {
                AppError::not_found(e.to_string())
            }
            ClaimError::Unavailable
            | ClaimError::OutsideWindow
            | ClaimError::AlreadyClaimed
            | ClaimError::MissingConfig(_) => AppError::conflict(e.to_string()),
            ClaimError::NotAssigned => AppError::forbidden(),
            ClaimError::Invalid(m) => AppError::bad_request(m),
            ClaimError::Storage(inner) => inner.into(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg, kind, detail) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m, "bad_request", None),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".into(),
                "unauthorized",
                None,
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".into(), "forbidden", None),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, "not_found", None),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m, "conflict", None),
            // Do not leak internal error details to clients, but log them
            AppError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
                "internal",
                Some(m),
            ),
        };
        if let Some(detail) = detail {
            tracing::error!(status = %status, kind = kind, message = %msg, detail = %detail, "request failed");
        } else {
            tracing::warn!(status = %status, kind = kind, message = %msg, "request failed");
        }
        let body = axum::Json(ErrorBody { error: msg });
        (status, body).into_response()
    }
}
