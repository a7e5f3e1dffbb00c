//! HS256 bearer tokens issued at login and checked on every authenticated route.

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;

/// Request headers that may carry the token, in lookup order.
pub const TOKEN_HEADERS: [&str; 3] = ["authorization", "x-authorization", "x-token"];

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwtError {
    #[error("En-tête Authorization manquant")]
    MissingHeader,
    #[error("Format d'en-tête Authorization invalide")]
    InvalidHeaderFormat,
    #[error("Token non valide (structure incorrecte)")]
    Malformed,
    #[error("Signature du token invalide")]
    InvalidSignature,
    #[error("Token expiré")]
    Expired,
    #[error("Émetteur du token invalide")]
    InvalidIssuer,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct TokenClaims {
    pub user_id: i64,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl TokenClaims {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiration_secs: i64,
    issuer: String,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiration_secs", &self.expiration_secs)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    pub fn new(secret: &[u8], expiration_secs: i64, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        validation.set_issuer(&[issuer.as_str()]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            expiration_secs,
            issuer,
        }
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }

    /// Issue a token for a user, stamped with `iat`, `exp` and `iss`
    pub fn issue(&self, user_id: i64, email: &str, role: &str) -> Result<String, JwtError> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            user_id,
            email: email.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + self.expiration_secs,
            iss: self.issuer.clone(),
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &TokenClaims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, JwtError> {
        if token.split('.').count() != 3 {
            debug!("token rejected: not three segments");
            return Err(JwtError::Malformed);
        }

        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                match e.kind() {
                    ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                    ErrorKind::ExpiredSignature => JwtError::Expired,
                    ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
                    _ => JwtError::Malformed,
                }
            })
    }
}

/// Pull the token out of a header value: `Bearer <token>` or a bare token.
pub fn token_from_header_value(value: &str) -> Result<&str, JwtError> {
    let value = value.trim();

    if let Some(scheme) = value.get(..6).filter(|s| s.eq_ignore_ascii_case("bearer")) {
        let rest = &value[scheme.len()..];
        if rest.starts_with(char::is_whitespace) {
            return Ok(rest.trim());
        }
    }

    if value.split('.').count() == 3 {
        return Ok(value);
    }

    Err(JwtError::InvalidHeaderFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(b"test-secret", 3600, "angular-chat-app")
    }

    #[test]
    fn issued_token_verifies() {
        let jwt = service();
        let token = jwt.issue(7, "parent@example.com", "user").unwrap();
        let claims = jwt.verify(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "parent@example.com");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.iss, "angular-chat-app");
        assert!(!claims.is_admin());
    }

    #[test]
    fn token_segments_are_unpadded_base64url() {
        let token = service().issue(1, "a@b.c", "admin").unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn other_secret_fails_signature() {
        let token = service().issue(1, "a@b.c", "user").unwrap();
        let other = JwtService::new(b"another-secret", 3600, "angular-chat-app");
        assert_eq!(other.verify(&token), Err(JwtError::InvalidSignature));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = service();
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            user_id: 1,
            email: "a@b.c".into(),
            role: "user".into(),
            iat: now - 7200,
            exp: now - 10,
            iss: "angular-chat-app".into(),
        };
        let token = jwt.encode(&claims).unwrap();
        assert_eq!(jwt.verify(&token), Err(JwtError::Expired));
    }

    #[test]
    fn wrong_shape_is_malformed() {
        assert_eq!(service().verify("abc.def"), Err(JwtError::Malformed));
        assert_eq!(service().verify("a.b.c"), Err(JwtError::Malformed));
    }

    #[test]
    fn header_value_forms() {
        assert_eq!(token_from_header_value("Bearer a.b.c"), Ok("a.b.c"));
        assert_eq!(token_from_header_value("bearer   a.b.c "), Ok("a.b.c"));
        assert_eq!(token_from_header_value("a.b.c"), Ok("a.b.c"));
        assert_eq!(
            token_from_header_value("Basic dXNlcjpwYXNz"),
            Err(JwtError::InvalidHeaderFormat)
        );
        assert_eq!(
            token_from_header_value("Bearerx.y.z.w"),
            Err(JwtError::InvalidHeaderFormat)
        );
    }
}
