//! Concurrent claims against one link: the usage cap must hold.

use std::sync::Arc;

use secrecy::SecretString;
use share_protocol::{ClaimShareLinkRequest, CreateShareLinkRequest, ShareErrorKind, ShareLinkType};
use share_services::{
    HmacTokenService, MemoryShareLinkStore, ShareLinkConfig, ShareLinkService, ShareLinkStore,
    TokenVerifier,
};

fn service() -> (Arc<HmacTokenService>, Arc<ShareLinkService<MemoryShareLinkStore>>) {
    let tokens = Arc::new(HmacTokenService::new(SecretString::from("claim-secret".to_string())).unwrap());
    let service = ShareLinkService::new(
        Arc::new(MemoryShareLinkStore::new()),
        tokens.clone(),
        ShareLinkConfig::default(),
    );
    (tokens, Arc::new(service))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_respect_max_uses() {
    let (_, service) = service();
    let mut req = CreateShareLinkRequest::new(ShareLinkType::Estimate, "est-1");
    req.max_uses = Some(5);
    let created = service.create(req, "W1", "u-1").unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let service = service.clone();
        let token = created.token.clone();
        handles.push(tokio::spawn(async move {
            service.claim(&token, ClaimShareLinkRequest::default())
        }));
    }

    let mut admitted = 0;
    let mut limited = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(e) => {
                assert_eq!(e.kind(), ShareErrorKind::Forbidden);
                assert_eq!(e.message, "Usage limit reached");
                limited += 1;
            }
        }
    }

    assert_eq!(admitted, 5);
    assert_eq!(limited, 27);
    let stored = service.store().get(&created.token).unwrap();
    assert_eq!(stored.used_count, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_single_use_claim_admits_once() {
    let (tokens, service) = service();
    let mut req = CreateShareLinkRequest::new(ShareLinkType::Document, "doc-1");
    req.single_use = true;
    let created = service.create(req, "W1", "u-1").unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let service = service.clone();
        let token = created.token.clone();
        handles.push(tokio::spawn(async move {
            service.claim(&token, ClaimShareLinkRequest::default())
        }));
    }

    let mut minted = Vec::new();
    for handle in handles {
        if let Ok(claimed) = handle.await.unwrap() {
            minted.push(claimed.token);
        }
    }

    assert_eq!(minted.len(), 1);
    let claims = tokens.verify_share(&minted[0]).unwrap();
    assert_eq!(claims.workspace_id, "W1");
    assert_eq!(claims.target_id.as_deref(), Some("doc-1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_password_claims_respect_max_uses() {
    let (_, service) = service();
    let mut req = CreateShareLinkRequest::new(ShareLinkType::Invoice, "inv-1");
    req.max_uses = Some(2);
    req.password = Some("hunter2".into());
    let created = service.create(req, "W1", "u-1").unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let service = service.clone();
        let token = created.token.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            service.claim(&token, ClaimShareLinkRequest { password: Some("hunter2".into()) })
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(e) => assert_eq!(e.message, "Usage limit reached"),
        }
    }

    assert_eq!(admitted, 2);
    assert_eq!(service.store().get(&created.token).unwrap().used_count, 2);
}
