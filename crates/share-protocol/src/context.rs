//! Request context: per-request identity produced by the guards.
//!
//! Built fresh for every HTTP request and dropped when the response is sent.
//! Guards never mutate shared state: they return a new context that the
//! transport layer stores in the request's extensions for downstream
//! handlers.

use serde::{Deserialize, Serialize};

use crate::auth::CLIENT_ROLE;
use crate::claims::ShareClaims;

/// The identity downstream handlers see as "the authenticated user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestUser {
    /// User id; absent for the synthetic share-link identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "workspaceId")]
    pub workspace_id: String,
    pub role: String,
}

impl RequestUser {
    pub fn new(id: impl Into<String>, workspace_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            workspace_id: workspace_id.into(),
            role: role.into(),
        }
    }

    /// The minimal identity given to a share-link visitor.
    pub fn client(workspace_id: impl Into<String>) -> Self {
        Self {
            id: None,
            workspace_id: workspace_id.into(),
            role: CLIENT_ROLE.to_string(),
        }
    }
}

/// Context for a single request.
///
/// `share` is present iff the share guard admitted the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<ShareClaims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<RequestUser>,
}

impl RequestContext {
    pub fn with_user(user: RequestUser) -> Self {
        Self {
            share: None,
            user: Some(user),
        }
    }

    /// Merge admitted share claims into this context.
    ///
    /// The synthetic client identity is only set when no user is present;
    /// an existing user is never overwritten.
    pub fn attach_share(mut self, claims: ShareClaims) -> Self {
        if self.user.is_none() {
            self.user = Some(RequestUser::client(claims.workspace_id.clone()));
        }
        self.share = Some(claims);
        self
    }

    /// Workspace the request is scoped to, if any identity is attached.
    pub fn workspace_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.workspace_id.as_str())
    }
}
