//! Authorization constants and guard outcomes.
//!
//! Guard flow for a share-gated request:
//!   1. Client sends `Authorization: Bearer <token>`
//!   2. The token is verified (signature, expiry, required claims)
//!   3. The `scope` claim must equal [`SHARE_SCOPE`]
//!   4. The claims and a synthetic client identity are merged into the
//!      request's [`RequestContext`]

use crate::context::RequestContext;

/// Scope claim value minted for share-link visitors.
pub const SHARE_SCOPE: &str = "share";

/// Role given to the synthetic identity of a share-link visitor.
pub const CLIENT_ROLE: &str = "client";

/// Role assumed for a session token that carries no `role` claim.
pub const DEFAULT_MEMBER_ROLE: &str = "member";

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation State
// ─────────────────────────────────────────────────────────────────────────────

/// Authorization state of a single request evaluation.
///
/// Both states are terminal; nothing is remembered between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Admitted,
    Denied,
}

// ─────────────────────────────────────────────────────────────────────────────
// Admission
// ─────────────────────────────────────────────────────────────────────────────

/// What a guard hands back to the transport layer.
///
/// Deliberately carries no reason on denial: every failure looks the same
/// to the requester.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// The request may proceed with this (merged) context.
    Admitted(RequestContext),
    /// The request must be answered with a uniform 401.
    Denied,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }

    pub fn state(&self) -> AuthState {
        match self {
            Self::Admitted(_) => AuthState::Admitted,
            Self::Denied => AuthState::Denied,
        }
    }

    pub fn into_context(self) -> Option<RequestContext> {
        match self {
            Self::Admitted(ctx) => Some(ctx),
            Self::Denied => None,
        }
    }
}
