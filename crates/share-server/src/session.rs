//! Session guard: admits workspace members' login tokens.
//!
//! The mirror image of the share guard: share-scoped tokens are refused
//! here, so a share-link visitor can never reach member routes.

use std::sync::Arc;

use axum::http::HeaderMap;
use share_protocol::{Admission, DEFAULT_MEMBER_ROLE, RequestContext, RequestUser, SHARE_SCOPE};
use share_services::TokenVerifier;
use tracing::{debug, warn};

use crate::guard::{DenyReason, Guard, bearer_token};

/// Guard for member-only routes.
pub struct SessionGuard<V: TokenVerifier> {
    verifier: Arc<V>,
}

impl<V: TokenVerifier> SessionGuard<V> {
    pub fn new(verifier: Arc<V>) -> Self {
        Self { verifier }
    }

    /// Resolve the member identity behind the request.
    pub fn evaluate(&self, headers: &HeaderMap) -> Result<RequestUser, DenyReason> {
        let token = bearer_token(headers)?;
        let claims = self
            .verifier
            .verify_session(token)
            .map_err(DenyReason::InvalidToken)?;

        if let Some(scope) = claims.scope.filter(|s| s == SHARE_SCOPE) {
            return Err(DenyReason::WrongScope(scope));
        }

        let role = claims.role.unwrap_or_else(|| DEFAULT_MEMBER_ROLE.to_string());
        Ok(RequestUser::new(claims.sub, claims.workspace_id, role))
    }
}

impl<V: TokenVerifier> Guard for SessionGuard<V> {
    fn authorize(&self, headers: &HeaderMap, mut ctx: RequestContext) -> Admission {
        match self.evaluate(headers) {
            Ok(user) => {
                ctx.user = Some(user);
                Admission::Admitted(ctx)
            }
            Err(reason @ DenyReason::WrongScope(_)) => {
                warn!("Session access denied: {reason}");
                Admission::Denied
            }
            Err(reason) => {
                debug!("Session access denied: {reason}");
                Admission::Denied
            }
        }
    }

    fn name(&self) -> &str {
        "session"
    }
}
