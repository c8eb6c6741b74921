//! # Bearer Token Authentication
//!
//! The auth provider issues HS256-signed identity tokens with a secret
//! shared with this backend. The backend never issues tokens; it only
//! verifies them and reads the claims.
//!
//! ## Claims
//!
//! | Claim | Description |
//! |-------|-------------|
//! | `sub` | Stable user id |
//! | `email` | User email |
//! | `role` | "member" or "admin" |
//! | `exp` | Expiry (unix seconds), enforced by validation |

use actix_web::HttpRequest;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication failures.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No `Authorization: Bearer ...` header on the request
    #[error("Missing Authorization bearer token")]
    MissingToken,

    /// Token failed signature or expiry validation
    #[error("Invalid bearer token: {0}")]
    InvalidToken(String),

    /// Token is valid but lacks the required role
    #[error("Insufficient privileges")]
    Forbidden,
}

/// Claims carried by an identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: String,

    /// User email.
    #[serde(default)]
    pub email: String,

    /// Role: "member" (default) or "admin".
    #[serde(default = "default_role")]
    pub role: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

fn default_role() -> String {
    "member".to_string()
}

impl Claims {
    /// Whether the token grants admin actions.
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Verifier for inbound bearer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: String,
}

impl TokenVerifier {
    /// Create a verifier with the shared HMAC secret.
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Verify and decode a raw token string.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(token_data.claims)
    }

    /// Extract and verify the bearer token from a request.
    pub fn authenticate(&self, req: &HttpRequest) -> Result<Claims, AuthError> {
        let header = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .ok_or(AuthError::MissingToken)?;

        self.verify(token.trim())
    }

    /// Like [`authenticate`](Self::authenticate), but requires the admin
    /// role.
    pub fn authenticate_admin(&self, req: &HttpRequest) -> Result<Claims, AuthError> {
        let claims = self.authenticate(req)?;
        if !claims.is_admin() {
            return Err(AuthError::Forbidden);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "a_sufficiently_long_shared_secret_for_hs256";

    fn make_token(secret: &str, role: &str, ttl: i64) -> String {
        let claims = Claims {
            sub: "uid-123".to_string(),
            email: "member@example.com".to_string(),
            role: role.to_string(),
            exp: Utc::now().timestamp() + ttl,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_round_trip() {
        let verifier = TokenVerifier::new(SECRET.to_string());
        let claims = verifier.verify(&make_token(SECRET, "member", 3600)).unwrap();

        assert_eq!(claims.sub, "uid-123");
        assert_eq!(claims.email, "member@example.com");
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_admin_role() {
        let verifier = TokenVerifier::new(SECRET.to_string());
        let claims = verifier.verify(&make_token(SECRET, "admin", 3600)).unwrap();
        assert!(claims.is_admin());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let verifier = TokenVerifier::new(SECRET.to_string());
        assert!(verifier.verify("invalid.token.here").is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = TokenVerifier::new(SECRET.to_string());
        let token = make_token("some_other_secret_entirely_here", "member", 3600);
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = TokenVerifier::new(SECRET.to_string());
        let token = make_token(SECRET, "member", -3600);
        assert!(verifier.verify(&token).is_err());
    }
}
