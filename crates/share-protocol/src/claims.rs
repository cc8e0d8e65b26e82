//! Typed claim sets for share and session tokens.

use serde::{Deserialize, Serialize};

/// Claims that carry a validity window (`iat`..`exp`, seconds since epoch).
pub trait TimeBounded {
    fn issued_at(&self) -> i64;
    fn expires_at(&self) -> i64;

    /// First required string claim that decoded but is empty.
    fn empty_required_claim(&self) -> Option<&'static str> {
        None
    }
}

/// Claims of a share token, minted when a share link is claimed.
///
/// `scope`, `workspaceId`, `iat` and `exp` are required; a payload without
/// them does not decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareClaims {
    /// `share:<linkId>` when minted by the link service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(rename = "workspaceId")]
    pub workspace_id: String,
    #[serde(rename = "shareId", default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
    #[serde(rename = "targetId", default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub perms: Vec<String>,
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
}

impl TimeBounded for ShareClaims {
    fn issued_at(&self) -> i64 {
        self.iat
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }

    fn empty_required_claim(&self) -> Option<&'static str> {
        if self.workspace_id.is_empty() {
            Some("workspaceId")
        } else if self.scope.is_empty() {
            Some("scope")
        } else {
            None
        }
    }
}

/// Claims of a workspace member's login session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    #[serde(rename = "workspaceId")]
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Login tokens normally carry no scope at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl TimeBounded for SessionClaims {
    fn issued_at(&self) -> i64 {
        self.iat
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }

    fn empty_required_claim(&self) -> Option<&'static str> {
        if self.sub.is_empty() {
            Some("sub")
        } else if self.workspace_id.is_empty() {
            Some("workspaceId")
        } else {
            None
        }
    }
}
