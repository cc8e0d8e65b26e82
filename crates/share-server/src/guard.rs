//! Request guards.
//!
//! A guard inspects the inbound headers and either admits the request with
//! a (possibly enriched) [`RequestContext`] or denies it. Guards hold no
//! mutable state; every request is evaluated on its own.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use share_protocol::{Admission, RequestContext};
use share_services::TokenError;
use thiserror::Error;

/// Why a guard denied a request. Internal only: the transport answers every
/// denial with the same 401 body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("Authorization header is not a bearer credential")]
    MalformedHeader,

    #[error("token rejected: {0}")]
    InvalidToken(TokenError),

    #[error("token scope {0:?} not accepted here")]
    WrongScope(String),
}

/// Trait for request guards.
pub trait Guard: Send + Sync {
    /// Evaluate the request and return the merged context on admission.
    fn authorize(&self, headers: &HeaderMap, ctx: RequestContext) -> Admission;

    /// Guard name for logs.
    fn name(&self) -> &str;

    /// Boolean form: on admission `ctx` is replaced by the merged context,
    /// on denial it is left untouched.
    fn can_activate(&self, headers: &HeaderMap, ctx: &mut RequestContext) -> bool {
        match self.authorize(headers, ctx.clone()) {
            Admission::Admitted(merged) => {
                *ctx = merged;
                true
            }
            Admission::Denied => false,
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// Header names are case-insensitive by construction of [`HeaderMap`]; the
/// scheme is compared case-insensitively too, and any run of spaces or tabs
/// may separate it from the token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, DenyReason> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(DenyReason::MissingHeader)?
        .to_str()
        .map_err(|_| DenyReason::MalformedHeader)?;

    let (scheme, token) = value
        .split_once(char::is_whitespace)
        .ok_or(DenyReason::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(DenyReason::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(DenyReason::MalformedHeader);
    }
    Ok(token)
}
