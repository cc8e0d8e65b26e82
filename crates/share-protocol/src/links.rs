//! Share-link request/response types.
//!
//! Field names follow the CRM backend's JSON (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of workspace resource a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareLinkType {
    Estimate,
    Invoice,
    Project,
    Document,
}

// ─────────────────────────────────────────────────────────────────────────────
// Member → Server
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `POST /share-links`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateShareLinkRequest {
    #[serde(rename = "type")]
    pub link_type: ShareLinkType,
    #[serde(rename = "targetId")]
    pub target_id: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(rename = "expiresAt", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "maxUses", default, skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    /// Plain-text password; only its digest is stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(rename = "singleUse", default)]
    pub single_use: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl CreateShareLinkRequest {
    pub fn new(link_type: ShareLinkType, target_id: impl Into<String>) -> Self {
        Self {
            link_type,
            target_id: target_id.into(),
            permissions: Vec::new(),
            expires_at: None,
            max_uses: None,
            password: None,
            single_use: false,
            metadata: None,
        }
    }
}

/// Result of creating a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateShareLinkResponse {
    pub token: String,
    pub url: String,
}

/// Result of revoking a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeShareLinkResponse {
    pub revoked: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Visitor → Server
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `POST /share-links/{token}/claim`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimShareLinkRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// A freshly minted share token plus what it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimShareLinkResponse {
    /// Signed share token (`scope = "share"`)
    pub token: String,
    pub permissions: Vec<String>,
    #[serde(rename = "targetId")]
    pub target_id: String,
    #[serde(rename = "type")]
    pub link_type: ShareLinkType,
}

// ─────────────────────────────────────────────────────────────────────────────
// Listing
// ─────────────────────────────────────────────────────────────────────────────

/// A stored link as members see it. Never includes the password digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareLinkView {
    pub id: String,
    pub token: String,
    #[serde(rename = "type")]
    pub link_type: ShareLinkType,
    #[serde(rename = "targetId")]
    pub target_id: String,
    #[serde(rename = "workspaceId")]
    pub workspace_id: String,
    pub permissions: Vec<String>,
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "maxUses")]
    pub max_uses: u32,
    #[serde(rename = "usedCount")]
    pub used_count: u32,
    #[serde(rename = "singleUse")]
    pub single_use: bool,
    #[serde(rename = "passwordProtected")]
    pub password_protected: bool,
    #[serde(rename = "createdByUserId")]
    pub created_by_user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(rename = "revokedAt", skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}
