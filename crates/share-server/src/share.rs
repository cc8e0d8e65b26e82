//! Share access guard: admits only share-scoped bearer tokens.
//!
//! Flow: bearer extraction -> token verification -> `scope == "share"` ->
//! claims merged into the request context. Every failure is a plain denial;
//! the reason is only logged.

use std::sync::Arc;

use axum::http::HeaderMap;
use share_protocol::{Admission, RequestContext, SHARE_SCOPE, ShareClaims};
use share_services::TokenVerifier;
use tracing::{debug, warn};

use crate::guard::{DenyReason, Guard, bearer_token};

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ShareDecision {
    Admitted(ShareClaims),
    Denied(DenyReason),
}

impl ShareDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

/// Guard for share-link visitors.
pub struct ShareGuard<V: TokenVerifier> {
    verifier: Arc<V>,
}

impl<V: TokenVerifier> ShareGuard<V> {
    pub fn new(verifier: Arc<V>) -> Self {
        Self { verifier }
    }

    /// Evaluate the request without touching any context.
    pub fn evaluate(&self, headers: &HeaderMap) -> ShareDecision {
        match bearer_token(headers) {
            Ok(token) => self.evaluate_token(token),
            Err(reason) => ShareDecision::Denied(reason),
        }
    }

    fn evaluate_token(&self, token: &str) -> ShareDecision {
        let claims = match self.verifier.verify_share(token) {
            Ok(claims) => claims,
            Err(e) => return ShareDecision::Denied(DenyReason::InvalidToken(e)),
        };

        // Tokens minted for anything else (login sessions included) never pass
        if claims.scope != SHARE_SCOPE {
            return ShareDecision::Denied(DenyReason::WrongScope(claims.scope));
        }

        ShareDecision::Admitted(claims)
    }
}

impl<V: TokenVerifier> Guard for ShareGuard<V> {
    fn authorize(&self, headers: &HeaderMap, ctx: RequestContext) -> Admission {
        match self.evaluate(headers) {
            ShareDecision::Admitted(claims) => {
                debug!(
                    "Share access granted: workspace {} target {:?}",
                    claims.workspace_id, claims.target_id
                );
                Admission::Admitted(ctx.attach_share(claims))
            }
            ShareDecision::Denied(reason @ DenyReason::WrongScope(_)) => {
                warn!("Share access denied: {reason}");
                Admission::Denied
            }
            ShareDecision::Denied(reason) => {
                debug!("Share access denied: {reason}");
                Admission::Denied
            }
        }
    }

    fn name(&self) -> &str {
        "share"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header::AUTHORIZATION};
    use chrono::{Duration, Utc};
    use secrecy::SecretString;
    use serde_json::json;
    use share_protocol::RequestUser;
    use share_services::{HmacTokenService, ShareGrant, TokenError};

    fn tokens() -> Arc<HmacTokenService> {
        Arc::new(HmacTokenService::new(SecretString::from("guard-secret".to_string())).unwrap())
    }

    fn with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn share_token(tokens: &HmacTokenService, workspace: &str) -> String {
        tokens
            .mint_share(ShareGrant::new(workspace).for_link("link-1", "est-1"), Duration::hours(2))
            .unwrap()
    }

    #[test]
    fn header_absent_denied() {
        let guard = ShareGuard::new(tokens());
        let mut ctx = RequestContext::default();
        assert!(!guard.can_activate(&HeaderMap::new(), &mut ctx));
        assert_eq!(ctx, RequestContext::default());
        assert_eq!(guard.evaluate(&HeaderMap::new()), ShareDecision::Denied(DenyReason::MissingHeader));
    }

    #[test]
    fn wrong_scheme_denied() {
        let guard = ShareGuard::new(tokens());
        let mut ctx = RequestContext::default();
        assert!(!guard.can_activate(&with_auth("Token abc"), &mut ctx));
        assert_eq!(
            guard.evaluate(&with_auth("Token abc")),
            ShareDecision::Denied(DenyReason::MalformedHeader)
        );
    }

    #[test]
    fn expired_token_denied_without_context() {
        let tokens = tokens();
        let expired = tokens.mint_share(ShareGrant::new("W1"), Duration::seconds(-30)).unwrap();
        let guard = ShareGuard::new(tokens);
        let headers = with_auth(&format!("Bearer {expired}"));

        let mut ctx = RequestContext::default();
        assert!(!guard.can_activate(&headers, &mut ctx));
        assert!(ctx.share.is_none());
        assert!(ctx.user.is_none());
        assert_eq!(
            guard.evaluate(&headers),
            ShareDecision::Denied(DenyReason::InvalidToken(TokenError::Expired))
        );
    }

    #[test]
    fn foreign_signature_denied() {
        let other = HmacTokenService::new(SecretString::from("other-secret".to_string())).unwrap();
        let token = share_token(&other, "W1");
        let guard = ShareGuard::new(tokens());
        assert_eq!(
            guard.evaluate(&with_auth(&format!("Bearer {token}"))),
            ShareDecision::Denied(DenyReason::InvalidToken(TokenError::InvalidSignature))
        );
    }

    #[test]
    fn malformed_token_denied() {
        let guard = ShareGuard::new(tokens());
        assert!(matches!(
            guard.evaluate(&with_auth("Bearer not-a-jwt")),
            ShareDecision::Denied(DenyReason::InvalidToken(TokenError::InvalidFormat))
        ));
    }

    #[test]
    fn login_scope_denied() {
        let tokens = tokens();
        let login = tokens
            .mint_share(ShareGrant::new("W1").with_scope("login"), Duration::hours(1))
            .unwrap();
        let guard = ShareGuard::new(tokens);
        let headers = with_auth(&format!("Bearer {login}"));

        let mut ctx = RequestContext::default();
        assert!(!guard.can_activate(&headers, &mut ctx));
        assert_eq!(ctx, RequestContext::default());
        assert_eq!(
            guard.evaluate(&headers),
            ShareDecision::Denied(DenyReason::WrongScope("login".into()))
        );
    }

    #[test]
    fn session_token_without_scope_denied() {
        let tokens = tokens();
        let session = tokens.mint_session("u-1", "W1", Some("owner"), Duration::hours(1)).unwrap();
        let guard = ShareGuard::new(tokens);
        assert!(!guard.evaluate(&with_auth(&format!("Bearer {session}"))).is_admitted());
    }

    #[test]
    fn token_without_workspace_denied() {
        let tokens = tokens();
        let now = Utc::now().timestamp();
        let token = tokens
            .sign(&json!({ "scope": "share", "iat": now, "exp": now + 600 }))
            .unwrap();
        let guard = ShareGuard::new(tokens);
        assert_eq!(
            guard.evaluate(&with_auth(&format!("Bearer {token}"))),
            ShareDecision::Denied(DenyReason::InvalidToken(TokenError::MissingClaim(
                "workspaceId".into()
            )))
        );
    }

    #[test]
    fn share_token_admitted_with_client_identity() {
        let tokens = tokens();
        let token = share_token(&tokens, "W1");
        let guard = ShareGuard::new(tokens);

        let mut ctx = RequestContext::default();
        assert!(guard.can_activate(&with_auth(&format!("Bearer {token}")), &mut ctx));

        let share = ctx.share.as_ref().unwrap();
        assert_eq!(share.scope, "share");
        assert_eq!(share.workspace_id, "W1");
        assert_eq!(share.target_id.as_deref(), Some("est-1"));
        assert_eq!(
            ctx.user,
            Some(RequestUser {
                id: None,
                workspace_id: "W1".into(),
                role: "client".into(),
            })
        );
    }

    #[test]
    fn existing_user_not_overwritten() {
        let tokens = tokens();
        let token = share_token(&tokens, "W1");
        let guard = ShareGuard::new(tokens);

        let owner = RequestUser {
            id: None,
            workspace_id: "W2".into(),
            role: "owner".into(),
        };
        let mut ctx = RequestContext::with_user(owner.clone());
        assert!(guard.can_activate(&with_auth(&format!("Bearer {token}")), &mut ctx));
        assert!(ctx.share.is_some());
        assert_eq!(ctx.user, Some(owner));
    }

    #[test]
    fn lowercase_scheme_admitted() {
        let tokens = tokens();
        let token = share_token(&tokens, "W1");
        let guard = ShareGuard::new(tokens);
        assert!(guard.evaluate(&with_auth(&format!("bearer {token}"))).is_admitted());
    }

    #[test]
    fn decision_is_idempotent() {
        let tokens = tokens();
        let valid = share_token(&tokens, "W1");
        let guard = ShareGuard::new(tokens);

        for value in [format!("Bearer {valid}"), "Bearer junk".to_string(), "Token x".to_string()] {
            let headers = with_auth(&value);
            let first = guard.evaluate(&headers);
            let second = guard.evaluate(&headers);
            assert_eq!(first, second, "{value}");

            let mut a = RequestContext::default();
            let mut b = RequestContext::default();
            assert_eq!(guard.can_activate(&headers, &mut a), guard.can_activate(&headers, &mut b));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn authorize_returns_uniform_denial() {
        let guard = ShareGuard::new(tokens());
        assert_eq!(guard.authorize(&HeaderMap::new(), RequestContext::default()), Admission::Denied);
        assert_eq!(
            guard.authorize(&with_auth("Bearer junk"), RequestContext::default()),
            Admission::Denied
        );
        assert_eq!(guard.name(), "share");
    }
}
