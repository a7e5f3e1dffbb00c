//! Request extractors for the bearer token and the caller's address.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use tracing::debug;
use utils::jwt::{JwtError, TOKEN_HEADERS, TokenClaims, token_from_header_value};

use crate::{DeploymentImpl, error::ApiError};

/// Raw token from the first token header present
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, JwtError> {
    let value = TOKEN_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .ok_or(JwtError::MissingHeader)?;
    let value = value.to_str().map_err(|_| JwtError::InvalidHeaderFormat)?;
    token_from_header_value(value)
}

/// Any signed-in user
#[derive(Debug, Clone)]
pub struct AuthUser(pub TokenClaims);

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.0.user_id
    }
}

impl FromRequestParts<DeploymentImpl> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        Ok(AuthUser(deployment.jwt().verify(token)?))
    }
}

/// A signed-in user whose token carries the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub TokenClaims);

impl AdminUser {
    pub fn id(&self) -> i64 {
        self.0.user_id
    }
}

impl FromRequestParts<DeploymentImpl> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, deployment).await?;
        if !claims.is_admin() {
            debug!(user_id = claims.user_id, "non-admin hit an admin route");
            return Err(ApiError::Forbidden("Accès refusé".to_string()));
        }
        Ok(AdminUser(claims))
    }
}

/// Claims when a valid token is supplied; anonymous otherwise
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<TokenClaims>);

impl OptionalAuthUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|claims| claims.user_id)
    }
}

impl FromRequestParts<DeploymentImpl> for OptionalAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let claims = match bearer_token(&parts.headers) {
            Ok(token) => deployment
                .jwt()
                .verify(token)
                .map_err(|e| debug!(error = %e, "ignoring invalid optional token"))
                .ok(),
            Err(_) => None,
        };
        Ok(OptionalAuthUser(claims))
    }
}

/// Address recorded in the audit trail. Proxy headers count only when
/// `trust_proxy_headers` is set; otherwise the socket peer is used.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let forwarded = if trust_proxy_headers {
        header("x-forwarded-for").or_else(|| header("x-real-ip"))
    } else {
        None
    };
    forwarded.or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

impl FromRequestParts<DeploymentImpl> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(client_ip(
            &parts.headers,
            peer,
            deployment.config().trust_proxy_headers,
        )))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn header_lookup_order() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err(JwtError::MissingHeader));

        headers.insert("x-token", HeaderValue::from_static("a.b.c"));
        assert_eq!(bearer_token(&headers), Ok("a.b.c"));

        headers.insert("authorization", HeaderValue::from_static("Bearer x.y.z"));
        assert_eq!(bearer_token(&headers), Ok("x.y.z"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), Err(JwtError::InvalidHeaderFormat));
    }

    #[test]
    fn proxy_headers_need_opt_in() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer), false).as_deref(), Some("127.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer), true).as_deref(), Some("203.0.113.9"));
        assert_eq!(client_ip(&HeaderMap::new(), None, true), None);
    }
}
