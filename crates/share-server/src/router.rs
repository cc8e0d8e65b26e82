//! Share Server: owns the link service and guards, and answers the transport.

use std::sync::Arc;

use axum::http::HeaderMap;
use share_protocol::{
    Admission, CLIENT_ROLE, ClaimShareLinkRequest, ClaimShareLinkResponse, CreateShareLinkRequest,
    CreateShareLinkResponse, RequestContext, RevokeShareLinkResponse, ShareError, ShareLinkView,
};
use share_services::{
    HmacTokenService, MemoryShareLinkStore, ShareLinkConfig, ShareLinkService, ShareLinkStore,
    TokenVerifier,
};
use share_transport::RequestHandler;
use tracing::{debug, info};

use crate::guard::Guard;
use crate::session::SessionGuard;
use crate::share::ShareGuard;

/// The share server. Routes transport calls to the link service.
pub struct ShareServer<S: ShareLinkStore, V: TokenVerifier = HmacTokenService> {
    links: ShareLinkService<S>,
    share_guard: ShareGuard<V>,
    session_guard: SessionGuard<V>,
}

/// Identity of a workspace member acting on links.
struct Member<'a> {
    user_id: &'a str,
    workspace_id: &'a str,
}

impl<S: ShareLinkStore, V: TokenVerifier> ShareServer<S, V> {
    pub fn new(links: ShareLinkService<S>, verifier: Arc<V>) -> Self {
        Self {
            links,
            share_guard: ShareGuard::new(verifier.clone()),
            session_guard: SessionGuard::new(verifier),
        }
    }

    /// Link management is for signed-in members; client visitors are refused.
    fn member<'a>(&self, ctx: &'a RequestContext) -> Result<Member<'a>, ShareError> {
        let user = ctx.user.as_ref().ok_or_else(ShareError::unauthorized)?;
        match user.id.as_deref() {
            Some(user_id) if user.role != CLIENT_ROLE => Ok(Member {
                user_id,
                workspace_id: &user.workspace_id,
            }),
            _ => Err(ShareError::forbidden("Workspace members only")),
        }
    }
}

fn run_guard(guard: &impl Guard, headers: &HeaderMap, ctx: RequestContext) -> Admission {
    let admission = guard.authorize(headers, ctx);
    debug!("{} guard: {:?}", guard.name(), admission.state());
    admission
}

impl ShareServer<MemoryShareLinkStore> {
    /// Server over an in-memory store, verifying with the same key it mints with.
    pub fn in_memory(tokens: Arc<HmacTokenService>, config: ShareLinkConfig) -> Self {
        info!(
            "Initializing share server (share token ttl {}s)",
            config.share_token_ttl.num_seconds()
        );
        let links = ShareLinkService::new(Arc::new(MemoryShareLinkStore::new()), tokens.clone(), config);
        Self::new(links, tokens)
    }
}

impl<S: ShareLinkStore, V: TokenVerifier> RequestHandler for ShareServer<S, V> {
    fn admit_share(&self, headers: &HeaderMap, ctx: RequestContext) -> Admission {
        run_guard(&self.share_guard, headers, ctx)
    }

    fn admit_session(&self, headers: &HeaderMap, ctx: RequestContext) -> Admission {
        run_guard(&self.session_guard, headers, ctx)
    }

    async fn create_link(
        &self,
        ctx: &RequestContext,
        req: CreateShareLinkRequest,
    ) -> Result<CreateShareLinkResponse, ShareError> {
        let member = self.member(ctx)?;
        self.links.create(req, member.workspace_id, member.user_id)
    }

    async fn list_links(&self, ctx: &RequestContext) -> Result<Vec<ShareLinkView>, ShareError> {
        let member = self.member(ctx)?;
        let links = self.links.list(member.workspace_id);
        debug!("Listing {} share links for workspace {}", links.len(), member.workspace_id);
        Ok(links)
    }

    async fn revoke_link(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<RevokeShareLinkResponse, ShareError> {
        let member = self.member(ctx)?;
        self.links.revoke(token, member.workspace_id)
    }

    async fn claim_link(
        &self,
        token: &str,
        req: ClaimShareLinkRequest,
    ) -> Result<ClaimShareLinkResponse, ShareError> {
        self.links.claim(token, req)
    }

    fn link_count(&self) -> usize {
        self.links.store().len()
    }
}
