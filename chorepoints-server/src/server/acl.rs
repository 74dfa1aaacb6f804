use super::{AppError, auth::AuthCtx};
use axum::response::Response;
use axum::{
    extract::OriginalUri,
    http::{Method, Request},
    middleware::Next,
};
use chorepoints_shared::auth::Role;
use chorepoints_shared::jwt::JwtClaims;
use percent_encoding::percent_decode_str;

const API_PREFIX: [&str; 2] = ["api", "v1"];

pub async fn enforce_acl(req: Request<axum::body::Body>, next: Next) -> Result<Response, AppError> {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|orig| orig.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().clone();
    let Some(auth) = req.extensions().get::<AuthCtx>() else {
        return Err(AppError::unauthorized());
    };
    let claims = &auth.claims;

    let segs = segmented(&path);
    if !segs.as_slice().starts_with(&API_PREFIX) {
        tracing::warn!(?segs, "ACL: path outside api scope");
        return Err(AppError::forbidden());
    }
    let rest = &segs[API_PREFIX.len()..];

    let decision = match claims.role {
        Role::Parent => allow_parent(&method, rest),
        Role::Child => allow_child(&method, rest, claims),
    };

    if let Err(err) = decision {
        tracing::warn!(
            method = %method,
            path = %path,
            username = %claims.sub,
            role = ?claims.role,
            token_child = ?claims.child_id,
            "ACL: no rule matched; denying"
        );
        return Err(err);
    }

    Ok(next.run(req).await)
}

fn allow_parent(method: &Method, rest: &[&str]) -> Result<(), AppError> {
    match rest {
        ["children"] if *method == Method::GET => Ok(()),
        ["chores"] if *method == Method::GET => Ok(()),
        ["claims"] if *method == Method::GET => Ok(()),
        ["claims", id, action]
            if *method == Method::POST
                && (action == &"approve" || action == &"reject")
                && id.parse::<i32>().is_ok() =>
        {
            Ok(())
        }
        ["children", _, "claims"] if *method == Method::GET => Ok(()),
        ["children", _, "ledger"] if *method == Method::GET => Ok(()),
        ["children", _, "points"] if *method == Method::GET || *method == Method::POST => Ok(()),
        ["children", _, "pocket-money"] if *method == Method::POST => Ok(()),
        ["children", _, "convert"] if *method == Method::POST => Ok(()),
        ["settings"] if *method == Method::GET => Ok(()),
        ["settings", _] if *method == Method::PUT => Ok(()),
        ["settlement", "run"] if *method == Method::POST => Ok(()),
        _ => Err(AppError::forbidden()),
    }
}

fn allow_child(method: &Method, rest: &[&str], claims: &JwtClaims) -> Result<(), AppError> {
    match rest {
        ["children"] if *method == Method::GET => Ok(()),
        ["chores"] if *method == Method::GET => Ok(()),
        ["children", child, "claims"] if *method == Method::GET || *method == Method::POST => {
            ensure_child(claims, child)
        }
        ["children", child, "claims", id]
            if *method == Method::DELETE && id.parse::<i32>().is_ok() =>
        {
            ensure_child(claims, child)
        }
        ["children", child, "ledger"] if *method == Method::GET => ensure_child(claims, child),
        ["children", child, "points"] if *method == Method::GET => ensure_child(claims, child),
        ["children", child, "convert"] if *method == Method::POST => ensure_child(claims, child),
        _ => Err(AppError::forbidden()),
    }
}

fn segmented(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn decode(seg: &str) -> String {
    percent_decode_str(seg).decode_utf8_lossy().to_string()
}

fn ensure_child(claims: &JwtClaims, seg: &str) -> Result<(), AppError> {
    let expected = claims.child_id.as_ref().ok_or_else(AppError::forbidden)?;
    let provided = decode(seg);
    if expected == &provided {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(id: &str) -> JwtClaims {
        JwtClaims {
            sub: id.to_string(),
            jti: "j".into(),
            exp: 0,
            role: Role::Child,
            child_id: Some(id.to_string()),
        }
    }

    #[test]
    fn parent_may_run_settlement_and_children_may_not() {
        assert!(allow_parent(&Method::POST, &["settlement", "run"]).is_ok());
        assert!(allow_child(&Method::POST, &["settlement", "run"], &child("alice")).is_err());
    }

    #[test]
    fn child_is_pinned_to_own_ledger() {
        let claims = child("ann marie");
        assert!(allow_child(&Method::GET, &["children", "ann%20marie", "ledger"], &claims).is_ok());
        assert!(allow_child(&Method::GET, &["children", "bob", "ledger"], &claims).is_err());
    }

    #[test]
    fn children_cannot_adjust_points_or_approve() {
        let claims = child("alice");
        assert!(allow_child(&Method::POST, &["children", "alice", "points"], &claims).is_err());
        assert!(allow_child(&Method::POST, &["claims", "1", "approve"], &claims).is_err());
    }

    #[test]
    fn only_the_owner_may_withdraw_a_claim() {
        let claims = child("alice");
        assert!(allow_child(&Method::DELETE, &["children", "alice", "claims", "3"], &claims).is_ok());
        assert!(allow_child(&Method::DELETE, &["children", "bob", "claims", "3"], &claims).is_err());
        assert!(allow_child(&Method::DELETE, &["children", "alice", "claims", "x"], &claims).is_err());
        assert!(allow_parent(&Method::DELETE, &["children", "alice", "claims", "3"]).is_err());
    }

    #[test]
    fn claim_actions_need_numeric_ids() {
        assert!(allow_parent(&Method::POST, &["claims", "12", "reject"]).is_ok());
        assert!(allow_parent(&Method::POST, &["claims", "x", "reject"]).is_err());
    }
}
