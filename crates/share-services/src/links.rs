//! Share-link lifecycle: create, claim, revoke, list.
//!
//! A link is a persisted, revocable record. Claiming it runs every
//! limit check against the stored record, bumps its usage counter in the
//! same critical section, then mints a short-lived share token.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use share_protocol::{
    ClaimShareLinkRequest, ClaimShareLinkResponse, CreateShareLinkRequest,
    CreateShareLinkResponse, RevokeShareLinkResponse, ShareError, ShareLinkView,
};
use tracing::{debug, error, info};

use crate::password::{hash_password, verify_password};
use crate::store::{ShareLink, ShareLinkStore};
use crate::token::{HmacTokenService, MAX_TOKEN_TTL_SECS, SHARE_TOKEN_TTL_SECS, ShareGrant, TokenError};

/// Random bytes in a link token (hex-encoded, so 48 chars).
const LINK_TOKEN_BYTES: usize = 24;

/// Usage cap applied when the creator gives neither `maxUses` nor `singleUse`.
pub const DEFAULT_MAX_USES: u32 = 100;

/// Share-link service configuration.
#[derive(Debug, Clone)]
pub struct ShareLinkConfig {
    /// Public frontend base URL; links render as `{frontend_url}/share/{token}`
    pub frontend_url: String,
    /// Lifetime of share tokens minted on claim
    pub share_token_ttl: Duration,
}

impl Default for ShareLinkConfig {
    fn default() -> Self {
        Self {
            frontend_url: String::new(),
            share_token_ttl: Duration::seconds(SHARE_TOKEN_TTL_SECS),
        }
    }
}

impl ShareLinkConfig {
    /// A share token has to outlive the claim that mints it.
    pub fn validate(&self) -> Result<(), TokenError> {
        let secs = self.share_token_ttl.num_seconds();
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&secs) {
            return Err(TokenError::InvalidLifetime(secs));
        }
        Ok(())
    }
}

/// Share-link service over a pluggable store.
pub struct ShareLinkService<S: ShareLinkStore> {
    store: Arc<S>,
    tokens: Arc<HmacTokenService>,
    config: ShareLinkConfig,
}

impl<S: ShareLinkStore> ShareLinkService<S> {
    pub fn new(store: Arc<S>, tokens: Arc<HmacTokenService>, config: ShareLinkConfig) -> Self {
        Self {
            store,
            tokens,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create a link for `target_id` in `workspace_id` on behalf of `user_id`.
    pub fn create(
        &self,
        req: CreateShareLinkRequest,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<CreateShareLinkResponse, ShareError> {
        if req.target_id.trim().is_empty() {
            return Err(ShareError::bad_request("targetId is required"));
        }
        if req.max_uses == Some(0) {
            return Err(ShareError::bad_request("maxUses must be at least 1"));
        }
        let now = Utc::now();
        if let Some(expires_at) = req.expires_at {
            if expires_at <= now {
                return Err(ShareError::bad_request("expiresAt must be in the future"));
            }
        }

        let password_hash = req
            .password
            .as_deref()
            .map(hash_password)
            .transpose()
            .map_err(|e| {
                error!("Failed to hash share link password: {e}");
                ShareError::internal("Failed to create share link")
            })?;

        let token = generate_link_token();
        let max_uses = req
            .max_uses
            .unwrap_or(if req.single_use { 1 } else { DEFAULT_MAX_USES });

        let link = ShareLink {
            id: uuid::Uuid::new_v4().to_string(),
            token: token.clone(),
            link_type: req.link_type,
            target_id: req.target_id,
            workspace_id: workspace_id.to_string(),
            permissions: req.permissions,
            expires_at: req.expires_at,
            max_uses,
            used_count: 0,
            single_use: req.single_use,
            password_hash,
            created_by_user_id: user_id.to_string(),
            metadata: req.metadata,
            revoked_at: None,
            created_at: now,
        };

        info!(
            "Share link created: {} ({:?} {}) in workspace {workspace_id}",
            link.id, link.link_type, link.target_id
        );
        self.store.insert(link);

        let url = format!("{}/share/{token}", self.config.frontend_url.trim_end_matches('/'));
        Ok(CreateShareLinkResponse { token, url })
    }

    /// Claim a link and mint a share token for it.
    ///
    /// The password is checked against a snapshot outside the entry lock;
    /// the limits are re-checked under the lock, where the token is minted
    /// before the use is counted.
    pub fn claim(
        &self,
        token: &str,
        req: ClaimShareLinkRequest,
    ) -> Result<ClaimShareLinkResponse, ShareError> {
        let snapshot = self
            .store
            .get(token)
            .ok_or_else(|| ShareError::not_found("Invalid share link"))?;
        check_claimable(&snapshot, Utc::now())
            .inspect_err(|e| debug!("Share link claim refused: {}", e.message))?;
        if let Some(hash) = &snapshot.password_hash {
            if !verify_password(req.password.as_deref().unwrap_or_default(), hash) {
                debug!("Share link claim refused: wrong password for {}", snapshot.id);
                return Err(ShareError::forbidden("Invalid password"));
            }
        }

        let (link, share_token) = self
            .store
            .modify(token, |link| -> Result<(ShareLink, String), ShareError> {
                check_claimable(link, Utc::now())?;
                let share_token = self.issue_share_token(link)?;
                link.used_count += 1;
                Ok((link.clone(), share_token))
            })
            .ok_or_else(|| ShareError::not_found("Invalid share link"))?
            .inspect_err(|e| debug!("Share link claim refused: {}", e.message))?;

        info!("Share link claimed: {} ({} of {})", link.id, link.used_count, link.max_uses);
        Ok(ClaimShareLinkResponse {
            token: share_token,
            permissions: link.permissions,
            target_id: link.target_id,
            link_type: link.link_type,
        })
    }

    fn issue_share_token(&self, link: &ShareLink) -> Result<String, ShareError> {
        let grant = ShareGrant::new(link.workspace_id.clone())
            .for_link(link.id.clone(), link.target_id.clone())
            .with_perms(link.permissions.clone());
        self.config
            .validate()
            .and_then(|()| self.tokens.mint_share(grant, self.config.share_token_ttl))
            .map_err(|e| {
                error!("Failed to mint share token for link {}: {e}", link.id);
                ShareError::internal("Failed to issue share token")
            })
    }

    /// Revoke a link owned by `workspace_id`.
    pub fn revoke(&self, token: &str, workspace_id: &str) -> Result<RevokeShareLinkResponse, ShareError> {
        let now = Utc::now();
        let revoked = self.store.modify(token, |link| {
            if link.workspace_id != workspace_id {
                return None;
            }
            link.revoked_at = Some(now);
            Some(link.id.clone())
        });

        match revoked.flatten() {
            Some(id) => {
                info!("Share link revoked: {id}");
                Ok(RevokeShareLinkResponse { revoked: true })
            }
            None => Err(ShareError::not_found("Not found")),
        }
    }

    pub fn list(&self, workspace_id: &str) -> Vec<ShareLinkView> {
        self.store
            .list_workspace(workspace_id)
            .iter()
            .map(ShareLink::view)
            .collect()
    }
}

/// Limit checks, in the order the claim endpoint reports them.
fn check_claimable(link: &ShareLink, now: DateTime<Utc>) -> Result<(), ShareError> {
    if link.revoked_at.is_some() {
        return Err(ShareError::bad_request("Share link revoked"));
    }
    if link.expires_at.is_some_and(|at| at < now) {
        return Err(ShareError::bad_request("Share link expired"));
    }
    if link.single_use && link.used_count >= 1 {
        return Err(ShareError::forbidden("Share link already used"));
    }
    if link.max_uses > 0 && link.used_count >= link.max_uses {
        return Err(ShareError::forbidden("Usage limit reached"));
    }
    Ok(())
}

fn generate_link_token() -> String {
    let bytes: [u8; LINK_TOKEN_BYTES] = rand::rng().random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryShareLinkStore;
    use crate::token::TokenVerifier;
    use secrecy::SecretString;
    use share_protocol::{ShareErrorKind, ShareLinkType};

    fn setup() -> (ShareLinkService<MemoryShareLinkStore>, Arc<HmacTokenService>) {
        let tokens = Arc::new(HmacTokenService::new(SecretString::from("test-secret".to_string())).unwrap());
        let service = ShareLinkService::new(
            Arc::new(MemoryShareLinkStore::new()),
            tokens.clone(),
            ShareLinkConfig {
                frontend_url: "https://crm.example.com/".into(),
                ..ShareLinkConfig::default()
            },
        );
        (service, tokens)
    }

    fn estimate() -> CreateShareLinkRequest {
        let mut req = CreateShareLinkRequest::new(ShareLinkType::Estimate, "est-1");
        req.permissions = vec!["view".into()];
        req
    }

    fn claim(svc: &ShareLinkService<MemoryShareLinkStore>, token: &str) -> Result<ClaimShareLinkResponse, ShareError> {
        svc.claim(token, ClaimShareLinkRequest::default())
    }

    #[test]
    fn create_returns_token_and_url() {
        let (svc, _) = setup();
        let created = svc.create(estimate(), "W1", "u-1").unwrap();
        assert_eq!(created.token.len(), 48);
        assert!(created.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(created.url, format!("https://crm.example.com/share/{}", created.token));

        let stored = svc.store().get(&created.token).unwrap();
        assert_eq!(stored.max_uses, DEFAULT_MAX_USES);
        assert_eq!(stored.used_count, 0);
        assert_eq!(stored.created_by_user_id, "u-1");
    }

    #[test]
    fn single_use_defaults_to_one_use() {
        let (svc, _) = setup();
        let mut req = estimate();
        req.single_use = true;
        let created = svc.create(req, "W1", "u-1").unwrap();
        assert_eq!(svc.store().get(&created.token).unwrap().max_uses, 1);
    }

    #[test]
    fn create_validates_input() {
        let (svc, _) = setup();

        let mut req = estimate();
        req.target_id = "  ".into();
        assert_eq!(svc.create(req, "W1", "u-1").unwrap_err().kind(), ShareErrorKind::BadRequest);

        let mut req = estimate();
        req.max_uses = Some(0);
        assert_eq!(svc.create(req, "W1", "u-1").unwrap_err().kind(), ShareErrorKind::BadRequest);

        let mut req = estimate();
        req.expires_at = Some(Utc::now() - Duration::minutes(1));
        assert_eq!(svc.create(req, "W1", "u-1").unwrap_err().kind(), ShareErrorKind::BadRequest);
    }

    #[test]
    fn claim_mints_share_token() {
        let (svc, tokens) = setup();
        let created = svc.create(estimate(), "W1", "u-1").unwrap();

        let claimed = claim(&svc, &created.token).unwrap();
        assert_eq!(claimed.target_id, "est-1");
        assert_eq!(claimed.link_type, ShareLinkType::Estimate);
        assert_eq!(claimed.permissions, vec!["view".to_string()]);

        let claims = tokens.verify_share(&claimed.token).unwrap();
        let link = svc.store().get(&created.token).unwrap();
        assert_eq!(claims.scope, "share");
        assert_eq!(claims.workspace_id, "W1");
        assert_eq!(claims.share_id.as_deref(), Some(link.id.as_str()));
        assert_eq!(claims.sub, Some(format!("share:{}", link.id)));
        assert_eq!(claims.exp - claims.iat, SHARE_TOKEN_TTL_SECS);
        assert_eq!(link.used_count, 1);
    }

    #[test]
    fn claim_unknown_token() {
        let (svc, _) = setup();
        let err = claim(&svc, "nope").unwrap_err();
        assert_eq!(err.kind(), ShareErrorKind::NotFound);
        assert_eq!(err.message, "Invalid share link");
    }

    #[test]
    fn single_use_link_claims_once() {
        let (svc, _) = setup();
        let mut req = estimate();
        req.single_use = true;
        let created = svc.create(req, "W1", "u-1").unwrap();

        assert!(claim(&svc, &created.token).is_ok());
        let err = claim(&svc, &created.token).unwrap_err();
        assert_eq!(err.kind(), ShareErrorKind::Forbidden);
        assert_eq!(err.message, "Share link already used");
    }

    #[test]
    fn usage_limit_enforced() {
        let (svc, _) = setup();
        let mut req = estimate();
        req.max_uses = Some(2);
        let created = svc.create(req, "W1", "u-1").unwrap();

        assert!(claim(&svc, &created.token).is_ok());
        assert!(claim(&svc, &created.token).is_ok());
        let err = claim(&svc, &created.token).unwrap_err();
        assert_eq!(err.message, "Usage limit reached");
        assert_eq!(svc.store().get(&created.token).unwrap().used_count, 2);
    }

    #[test]
    fn password_protected_link() {
        let (svc, _) = setup();
        let mut req = estimate();
        req.password = Some("hunter2".into());
        let created = svc.create(req, "W1", "u-1").unwrap();

        let err = claim(&svc, &created.token).unwrap_err();
        assert_eq!(err.message, "Invalid password");

        let err = svc
            .claim(&created.token, ClaimShareLinkRequest { password: Some("wrong".into()) })
            .unwrap_err();
        assert_eq!(err.kind(), ShareErrorKind::Forbidden);

        // Failed attempts do not consume uses
        assert_eq!(svc.store().get(&created.token).unwrap().used_count, 0);

        let ok = svc.claim(&created.token, ClaimShareLinkRequest { password: Some("hunter2".into()) });
        assert!(ok.is_ok());
    }

    #[test]
    fn config_rejects_unusable_ttl() {
        for secs in [0, -1, -7200, MAX_TOKEN_TTL_SECS + 1] {
            let config = ShareLinkConfig {
                share_token_ttl: Duration::seconds(secs),
                ..ShareLinkConfig::default()
            };
            assert_eq!(config.validate(), Err(TokenError::InvalidLifetime(secs)));
        }
        assert!(ShareLinkConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_ttl_does_not_burn_single_use_link() {
        let tokens = Arc::new(HmacTokenService::new(SecretString::from("test-secret".to_string())).unwrap());
        let svc = ShareLinkService::new(
            Arc::new(MemoryShareLinkStore::new()),
            tokens,
            ShareLinkConfig {
                share_token_ttl: Duration::seconds(0),
                ..ShareLinkConfig::default()
            },
        );
        let mut req = estimate();
        req.single_use = true;
        let created = svc.create(req, "W1", "u-1").unwrap();

        for _ in 0..2 {
            let err = claim(&svc, &created.token).unwrap_err();
            assert_eq!(err.kind(), ShareErrorKind::InternalError);
        }
        assert_eq!(svc.store().get(&created.token).unwrap().used_count, 0);
    }

    #[test]
    fn backend_bcrypt_digest_accepted() {
        let (svc, _) = setup();
        let created = svc.create(estimate(), "W1", "u-1").unwrap();
        let digest = bcrypt::hash_with_result("legacy-pw", 4)
            .unwrap()
            .format_for_version(bcrypt::Version::TwoA);
        svc.store()
            .modify(&created.token, |l| l.password_hash = Some(digest));

        let err = claim(&svc, &created.token).unwrap_err();
        assert_eq!(err.message, "Invalid password");
        let ok = svc.claim(&created.token, ClaimShareLinkRequest { password: Some("legacy-pw".into()) });
        assert!(ok.is_ok());
        assert_eq!(svc.store().get(&created.token).unwrap().used_count, 1);
    }

    #[test]
    fn expired_link_rejected() {
        let (svc, _) = setup();
        let created = svc.create(estimate(), "W1", "u-1").unwrap();
        svc.store()
            .modify(&created.token, |l| l.expires_at = Some(Utc::now() - Duration::seconds(1)));

        let err = claim(&svc, &created.token).unwrap_err();
        assert_eq!(err.kind(), ShareErrorKind::BadRequest);
        assert_eq!(err.message, "Share link expired");
    }

    #[test]
    fn revoke_then_claim() {
        let (svc, _) = setup();
        let created = svc.create(estimate(), "W1", "u-1").unwrap();

        assert_eq!(svc.revoke(&created.token, "W1").unwrap(), RevokeShareLinkResponse { revoked: true });
        let err = claim(&svc, &created.token).unwrap_err();
        assert_eq!(err.message, "Share link revoked");
    }

    #[test]
    fn revoke_other_workspace_not_found() {
        let (svc, _) = setup();
        let created = svc.create(estimate(), "W1", "u-1").unwrap();

        let err = svc.revoke(&created.token, "W2").unwrap_err();
        assert_eq!(err.kind(), ShareErrorKind::NotFound);
        assert!(svc.store().get(&created.token).unwrap().revoked_at.is_none());
        assert_eq!(svc.revoke("missing", "W1").unwrap_err().kind(), ShareErrorKind::NotFound);
    }

    #[test]
    fn list_is_workspace_scoped() {
        let (svc, _) = setup();
        svc.create(estimate(), "W1", "u-1").unwrap();
        svc.create(estimate(), "W1", "u-1").unwrap();
        svc.create(estimate(), "W2", "u-2").unwrap();

        let w1 = svc.list("W1");
        assert_eq!(w1.len(), 2);
        assert!(w1.iter().all(|l| l.workspace_id == "W1"));
        assert!(w1[0].created_at >= w1[1].created_at);
        assert_eq!(svc.list("W2").len(), 1);
        assert!(svc.list("W3").is_empty());
    }
}
