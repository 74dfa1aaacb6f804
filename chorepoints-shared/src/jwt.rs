use jsonwebtoken::{self, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::Role;

/// Claims carried by every bearer token issued by the server.
///
/// `child_id` is set only for child accounts and pins the token to that
/// child's ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub jti: String,
    pub exp: i64,
    pub role: Role,
    pub child_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    Decode(String),
    #[error("encoding failed: {0}")]
    Encode(String),
}

pub fn decode_and_verify(token: &str, secret: &[u8]) -> Result<JwtClaims, JwtError> {
    let key = DecodingKey::from_secret(secret);
    let validation = Validation::new(Algorithm::HS256);
    jsonwebtoken::decode::<JwtClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::Decode(e.to_string()))
}

pub fn encode(token: &JwtClaims, secret: &[u8]) -> Result<String, JwtError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        token,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| JwtError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_claims_survive_signing() {
        let claims = JwtClaims {
            sub: "alice".into(),
            jti: "j-1".into(),
            exp: 4_102_444_800,
            role: Role::Child,
            child_id: Some("alice".into()),
        };
        let token = encode(&claims, b"secret").unwrap();
        let back = decode_and_verify(&token, b"secret").unwrap();
        assert_eq!(back.sub, "alice");
        assert_eq!(back.role, Role::Child);
        assert_eq!(back.child_id.as_deref(), Some("alice"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = JwtClaims {
            sub: "parent".into(),
            jti: "j-2".into(),
            exp: 4_102_444_800,
            role: Role::Parent,
            child_id: None,
        };
        let token = encode(&claims, b"secret").unwrap();
        assert!(matches!(
            decode_and_verify(&token, b"other"),
            Err(JwtError::Decode(_))
        ));
    }
}
