use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::API_V1_PREFIX;

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

fn enc(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

fn child_scoped(base: &str, child_id: &str, suffix: &str) -> String {
    base_join(
        base,
        &format!("{}/children/{}/{}", API_V1_PREFIX, enc(child_id), suffix),
    )
}

pub fn auth_login(base: &str) -> String {
    base_join(base, &format!("{}/auth/login", API_V1_PREFIX))
}
pub fn children(base: &str) -> String {
    base_join(base, &format!("{}/children", API_V1_PREFIX))
}
pub fn chores(base: &str) -> String {
    base_join(base, &format!("{}/chores", API_V1_PREFIX))
}
pub fn pending_claims(base: &str) -> String {
    base_join(base, &format!("{}/claims", API_V1_PREFIX))
}
pub fn claim_approve(base: &str, claim_id: i32) -> String {
    base_join(
        base,
        &format!("{}/claims/{}/approve", API_V1_PREFIX, claim_id),
    )
}
pub fn claim_reject(base: &str, claim_id: i32) -> String {
    base_join(
        base,
        &format!("{}/claims/{}/reject", API_V1_PREFIX, claim_id),
    )
}
pub fn child_claims(base: &str, child_id: &str) -> String {
    child_scoped(base, child_id, "claims")
}
pub fn child_claim(base: &str, child_id: &str, claim_id: i32) -> String {
    child_scoped(base, child_id, &format!("claims/{}", claim_id))
}
pub fn child_ledger(base: &str, child_id: &str) -> String {
    child_scoped(base, child_id, "ledger")
}
pub fn child_points(base: &str, child_id: &str) -> String {
    child_scoped(base, child_id, "points")
}
pub fn child_pocket_money(base: &str, child_id: &str) -> String {
    child_scoped(base, child_id, "pocket-money")
}
pub fn child_convert(base: &str, child_id: &str) -> String {
    child_scoped(base, child_id, "convert")
}
pub fn settings(base: &str) -> String {
    base_join(base, &format!("{}/settings", API_V1_PREFIX))
}
pub fn setting(base: &str, key: &str) -> String {
    base_join(
        base,
        &format!("{}/settings/{}", API_V1_PREFIX, enc(key)),
    )
}
pub fn settlement_run(base: &str) -> String {
    base_join(base, &format!("{}/settlement/run", API_V1_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_paths_are_encoded() {
        assert_eq!(
            child_ledger("http://localhost:5151/", "ann marie"),
            "http://localhost:5151/api/v1/children/ann%20marie/ledger"
        );
        assert_eq!(
            claim_approve("http://h", 7),
            "http://h/api/v1/claims/7/approve"
        );
        assert_eq!(
            child_claim("http://h", "alice", 3),
            "http://h/api/v1/children/alice/claims/3"
        );
    }
}
