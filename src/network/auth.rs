//! Transport identity binding.
//!
//! A connection speaks for one chat handle. The handle is named in the
//! connection's `auth` message, either directly or as the `sub` of an HS256
//! token signed by the chat bridge when `AUTH_SECRET` is set. The arena only
//! hands the bound handle to the credential issuer; every later message uses
//! the anonymous id.

use std::fmt;

use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use crate::network::protocol::{AuthRequest, ErrorCode, ServerError};

/// Longest accepted handle, in bytes.
pub const MAX_IDENTITY_LEN: usize = 256;

/// How handles are vouched for.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Key shared with the chat bridge. Unset means the supplied handle is trusted.
    pub secret: Option<String>,
    /// Required `iss` of bridge tokens.
    pub issuer: Option<String>,
}

impl AuthConfig {
    /// Read `AUTH_SECRET` and `AUTH_ISSUER`.
    pub fn from_env() -> Self {
        Self {
            secret: std::env::var("AUTH_SECRET").ok().filter(|s| !s.is_empty()),
            issuer: std::env::var("AUTH_ISSUER").ok().filter(|s| !s.is_empty()),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Why a connection could not be bound.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Bridge tokens are required and none was sent.
    #[error("a bridge token is required")]
    TokenRequired,
    /// Neither a handle nor a token was sent.
    #[error("no identity supplied")]
    IdentityRequired,
    /// Handle is blank or longer than [`MAX_IDENTITY_LEN`].
    #[error("identity must be 1 to 256 bytes")]
    InvalidIdentity,
    /// Token is past its `exp`.
    #[error("token expired")]
    Expired,
    /// Token failed signature, issuer or format checks.
    #[error("token rejected: {0}")]
    Rejected(String),
}

impl From<&AuthError> for ServerError {
    fn from(err: &AuthError) -> Self {
        let code = match err {
            AuthError::Expired => ErrorCode::TokenExpired,
            AuthError::Rejected(_) => ErrorCode::InvalidToken,
            AuthError::TokenRequired | AuthError::IdentityRequired | AuthError::InvalidIdentity => {
                ErrorCode::AuthFailed
            }
        };
        ServerError::new(code, err.to_string())
    }
}

#[derive(Deserialize)]
struct BridgeClaims {
    sub: String,
}

fn handle_from_token(token: &str, secret: &str, issuer: Option<&str>) -> Result<String, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_aud = false;
    if let Some(issuer) = issuer {
        validation.set_issuer(&[issuer]);
    }

    let key = DecodingKey::from_secret(secret.as_bytes());
    decode::<BridgeClaims>(token, &key, &validation)
        .map(|data| data.claims.sub)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Rejected(e.to_string()),
        })
}

/// Handle that an [`AuthRequest`] binds its connection to.
///
/// With a bridge secret configured the token is mandatory and its subject
/// wins over any supplied handle.
pub fn resolve_identity(request: &AuthRequest, config: &AuthConfig) -> Result<String, AuthError> {
    let handle = match &config.secret {
        Some(secret) => {
            let token = request.token.as_deref().ok_or(AuthError::TokenRequired)?;
            handle_from_token(token, secret, config.issuer.as_deref())?
        }
        None => request.identity.clone().ok_or(AuthError::IdentityRequired)?,
    };

    let handle = handle.trim();
    if handle.is_empty() || handle.len() > MAX_IDENTITY_LEN {
        return Err(AuthError::InvalidIdentity);
    }
    Ok(handle.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "bridge-secret";

    fn sign(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn bridged(issuer: Option<&str>) -> AuthConfig {
        AuthConfig {
            secret: Some(SECRET.into()),
            issuer: issuer.map(String::from),
        }
    }

    fn with_token(token: String) -> AuthRequest {
        AuthRequest {
            identity: Some("spoofed".into()),
            token: Some(token),
        }
    }

    #[test]
    fn test_token_subject_overrides_supplied_handle() {
        let token = sign(json!({ "sub": "tg:1234", "iss": "bridge" }));
        let handle = resolve_identity(&with_token(token), &bridged(Some("bridge"))).unwrap();
        assert_eq!(handle, "tg:1234");
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let token = sign(json!({ "sub": "tg:1234", "iss": "someone-else" }));
        let err = resolve_identity(&with_token(token), &bridged(Some("bridge"))).unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
        assert_eq!(ServerError::from(&err).code, ErrorCode::InvalidToken);
    }

    #[test]
    fn test_expired_token_reports_token_expired() {
        let token = sign(json!({ "sub": "tg:1234", "exp": 1 }));
        let err = resolve_identity(&with_token(token), &bridged(None)).unwrap_err();
        assert_eq!(err, AuthError::Expired);
        assert_eq!(ServerError::from(&err).code, ErrorCode::TokenExpired);
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({ "sub": "tg:1234" }),
            &EncodingKey::from_secret(b"not-the-bridge"),
        )
        .unwrap();
        let err = resolve_identity(&with_token(token), &bridged(None)).unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
    }

    #[test]
    fn test_token_required_when_bridged() {
        let request = AuthRequest {
            identity: Some("alice".into()),
            token: None,
        };
        let err = resolve_identity(&request, &bridged(None)).unwrap_err();
        assert_eq!(err, AuthError::TokenRequired);
        assert_eq!(ServerError::from(&err).code, ErrorCode::AuthFailed);
    }

    #[test]
    fn test_supplied_handle_trimmed_and_bounded() {
        let config = AuthConfig::default();
        let handle = |identity: Option<String>| {
            resolve_identity(&AuthRequest { identity, token: None }, &config)
        };

        assert_eq!(handle(Some(" alice ".into())).unwrap(), "alice");
        assert_eq!(handle(Some("a".repeat(MAX_IDENTITY_LEN))).unwrap().len(), MAX_IDENTITY_LEN);
        assert_eq!(
            handle(Some("a".repeat(MAX_IDENTITY_LEN + 1))),
            Err(AuthError::InvalidIdentity)
        );
        assert_eq!(handle(Some("   ".into())), Err(AuthError::InvalidIdentity));
        assert_eq!(handle(None), Err(AuthError::IdentityRequired));
    }

    #[test]
    fn test_overlong_token_subject_rejected() {
        let token = sign(json!({ "sub": "x".repeat(MAX_IDENTITY_LEN + 1) }));
        let err = resolve_identity(&with_token(token), &bridged(None)).unwrap_err();
        assert_eq!(err, AuthError::InvalidIdentity);
    }
}
