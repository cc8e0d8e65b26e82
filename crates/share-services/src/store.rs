//! Share-link persistence.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use share_protocol::{ShareLinkType, ShareLinkView};

/// A stored share link.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareLink {
    pub id: String,
    /// Random 48-hex-char token embedded in the public URL
    pub token: String,
    pub link_type: ShareLinkType,
    pub target_id: String,
    pub workspace_id: String,
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: u32,
    pub used_count: u32,
    pub single_use: bool,
    pub password_hash: Option<String>,
    pub created_by_user_id: String,
    pub metadata: Option<serde_json::Value>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ShareLink {
    pub fn view(&self) -> ShareLinkView {
        ShareLinkView {
            id: self.id.clone(),
            token: self.token.clone(),
            link_type: self.link_type,
            target_id: self.target_id.clone(),
            workspace_id: self.workspace_id.clone(),
            permissions: self.permissions.clone(),
            expires_at: self.expires_at,
            max_uses: self.max_uses,
            used_count: self.used_count,
            single_use: self.single_use,
            password_protected: self.password_hash.is_some(),
            created_by_user_id: self.created_by_user_id.clone(),
            metadata: self.metadata.clone(),
            revoked_at: self.revoked_at,
            created_at: self.created_at,
        }
    }
}

/// Storage backend for share links, keyed by token.
pub trait ShareLinkStore: Send + Sync + 'static {
    fn insert(&self, link: ShareLink);

    fn get(&self, token: &str) -> Option<ShareLink>;

    /// Run `f` on the stored link while holding its entry exclusively,
    /// so check-then-update sequences are atomic per link.
    fn modify<T>(&self, token: &str, f: impl FnOnce(&mut ShareLink) -> T) -> Option<T>;

    /// All links of a workspace, newest first.
    fn list_workspace(&self, workspace_id: &str) -> Vec<ShareLink>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store used for development and tests.
#[derive(Debug, Default)]
pub struct MemoryShareLinkStore {
    links: DashMap<String, ShareLink>,
}

impl MemoryShareLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShareLinkStore for MemoryShareLinkStore {
    fn insert(&self, link: ShareLink) {
        self.links.insert(link.token.clone(), link);
    }

    fn get(&self, token: &str) -> Option<ShareLink> {
        self.links.get(token).map(|entry| entry.value().clone())
    }

    fn modify<T>(&self, token: &str, f: impl FnOnce(&mut ShareLink) -> T) -> Option<T> {
        self.links.get_mut(token).map(|mut entry| f(entry.value_mut()))
    }

    fn list_workspace(&self, workspace_id: &str) -> Vec<ShareLink> {
        let mut links: Vec<ShareLink> = self
            .links
            .iter()
            .filter(|entry| entry.workspace_id == workspace_id)
            .map(|entry| entry.value().clone())
            .collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        links
    }

    fn len(&self) -> usize {
        self.links.len()
    }
}
