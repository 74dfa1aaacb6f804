use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use chorepoints_shared::auth::Role;
use chorepoints_shared::jwt::{self, JwtClaims};
use chrono::{Duration, Utc};
use tracing::{error, warn};

use super::{AppError, AppState};

/// How many days before mandatory re-login.
const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub claims: JwtClaims,
}

pub async fn require_bearer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || Err(AppError::unauthorized());
    let header_val = match req.headers().get(header::AUTHORIZATION) {
        Some(v) => v,
        None => return unauthorized(),
    };
    let header_str = header_val.to_str().map_err(|_| AppError::unauthorized())?;
    let Some(token) = header_str.strip_prefix("Bearer ") else {
        return unauthorized();
    };

    let claims = match jwt::decode_and_verify(token, state.config.jwt_secret.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error=%e, "auth: jwt decode failed");
            return unauthorized();
        }
    };

    // users removed from the config lose access immediately
    validate_claims(&state, &claims).map_err(|e| {
        warn!(error=?e, username=%claims.sub, "auth: validate_claims failed");
        AppError::unauthorized()
    })?;

    req.extensions_mut().insert(AuthCtx { claims });
    Ok(next.run(req).await)
}

pub fn issue_jwt_for_user(
    state: &AppState,
    username: &str,
    role: Role,
    child_id: Option<String>,
) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp();
    let claims = JwtClaims {
        sub: username.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        exp,
        role,
        child_id,
    };

    validate_claims(state, &claims)?;

    jwt::encode(&claims, state.config.jwt_secret.as_bytes()).map_err(|e| {
        error!(username, error=%e, "login: jwt encode failed");
        AppError::internal(e)
    })
}

fn validate_claims(state: &AppState, claims: &JwtClaims) -> Result<(), AppError> {
    let user = state
        .config
        .users
        .iter()
        .find(|u| u.username == claims.sub)
        .ok_or_else(|| {
            warn!(username = %claims.sub, "issue_jwt: unknown user");
            AppError::forbidden()
        })?;

    if user.role != claims.role {
        warn!(
            username = %claims.sub,
            requested_role = ?claims.role,
            actual_role = ?user.role,
            "issue_jwt: role mismatch"
        );
        return Err(AppError::forbidden());
    }

    match claims.role {
        Role::Parent => {
            if claims.child_id.is_some() {
                warn!(
                    username = %claims.sub,
                    "issue_jwt: parent token must not include child"
                );
                return Err(AppError::forbidden());
            }
        }
        Role::Child => {
            let child_id = claims.child_id.as_deref().ok_or_else(|| {
                warn!(username = %claims.sub, "issue_jwt: child token missing child_id");
                AppError::forbidden()
            })?;
            if user.child_id.as_deref() != Some(child_id) {
                warn!(
                    username = %claims.sub,
                    expected = ?user.child_id,
                    requested = child_id,
                    "issue_jwt: child mismatch"
                );
                return Err(AppError::forbidden());
            }
            if !state.config.children.iter().any(|c| c.id == child_id) {
                warn!(child_id, "issue_jwt: child not configured");
                return Err(AppError::not_found(format!(
                    "child not found: {}",
                    child_id
                )));
            }
        }
    }

    Ok(())
}
