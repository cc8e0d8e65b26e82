//! Share-link protocol types.
//!
//! Wire types for the share-link HTTP API, the typed claim sets carried by
//! share and session tokens, the per-request context the guards produce,
//! and the error type every service layer returns. This crate is the single
//! source of truth for JSON field names and scope/role constants.

pub mod auth;
pub mod claims;
pub mod context;
pub mod error;
pub mod links;

pub use auth::{Admission, AuthState, CLIENT_ROLE, DEFAULT_MEMBER_ROLE, SHARE_SCOPE};
pub use claims::{SessionClaims, ShareClaims, TimeBounded};
pub use context::{RequestContext, RequestUser};
pub use error::{ShareError, ShareErrorKind};
pub use links::{
    ClaimShareLinkRequest, ClaimShareLinkResponse, CreateShareLinkRequest,
    CreateShareLinkResponse, RevokeShareLinkResponse, ShareLinkType, ShareLinkView,
};
