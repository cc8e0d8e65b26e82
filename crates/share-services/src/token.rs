//! HS256 JWT signing and verification.
//!
//! Tokens are standard RFC 7519 JWTs signed with HMAC-SHA256 over a shared
//! secret, the same format the CRM backend's `JwtService` issues:
//! - Header: `{"alg":"HS256","typ":"JWT"}`
//! - Payload: typed claims ([`ShareClaims`] or [`SessionClaims`])
//! - Signature: HMAC-SHA256 over `base64url(header).base64url(payload)`

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;
use share_protocol::{SHARE_SCOPE, SessionClaims, ShareClaims, TimeBounded};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// JWT header (static for HS256)
const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Accepted clock skew for `iat`, in seconds.
const IAT_LEEWAY_SECS: i64 = 60;

/// Lifetime of a share token minted from a claimed link.
pub const SHARE_TOKEN_TTL_SECS: i64 = 2 * 60 * 60;

/// Longest configurable token lifetime (one year).
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Errors from token operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Invalid base64 encoding")]
    InvalidBase64,

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Token not yet valid")]
    NotYetValid,

    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    #[error("Signing secret must not be empty")]
    EmptySecret,

    #[error("Signing key rejected")]
    InvalidKey,

    #[error("Token lifetime must be between 1 and {MAX_TOKEN_TTL_SECS} seconds, got {0}")]
    InvalidLifetime(i64),
}

/// Verifies raw bearer tokens into typed claims.
///
/// This is the only thing the guards know about tokens: they never see the
/// secret or the signing algorithm.
pub trait TokenVerifier: Send + Sync + 'static {
    fn verify_share(&self, token: &str) -> Result<ShareClaims, TokenError>;
    fn verify_session(&self, token: &str) -> Result<SessionClaims, TokenError>;
}

/// What a share token should grant.
#[derive(Debug, Clone)]
pub struct ShareGrant {
    pub workspace_id: String,
    pub share_id: Option<String>,
    pub target_id: Option<String>,
    pub perms: Vec<String>,
    pub scope: String,
}

impl ShareGrant {
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            share_id: None,
            target_id: None,
            perms: Vec::new(),
            scope: SHARE_SCOPE.to_string(),
        }
    }

    pub fn for_link(mut self, share_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        self.share_id = Some(share_id.into());
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_perms(mut self, perms: Vec<String>) -> Self {
        self.perms = perms;
        self
    }

    /// Override the scope claim. Only debugging tools should need this.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

#[derive(Deserialize)]
struct JwtHeader {
    alg: String,
}

/// HMAC-SHA256 token service holding the signing secret.
pub struct HmacTokenService {
    secret: SecretString,
}

impl std::fmt::Debug for HmacTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacTokenService").finish_non_exhaustive()
    }
}

impl HmacTokenService {
    pub fn new(secret: SecretString) -> Result<Self, TokenError> {
        if secret.expose_secret().is_empty() {
            return Err(TokenError::EmptySecret);
        }
        Ok(Self { secret })
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::InvalidKey)
    }

    /// Encode and sign arbitrary claims.
    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String, TokenError> {
        let header_b64 = URL_SAFE_NO_PAD.encode(JWT_HEADER);
        let payload_json =
            serde_json::to_vec(claims).map_err(|e| TokenError::InvalidJson(e.to_string()))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload_json);

        let signing_input = format!("{header_b64}.{payload_b64}");

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Decode and verify a token into typed claims.
    ///
    /// Checks, in order: shape, header algorithm, signature, payload shape
    /// (required claims), expiry, issued-at.
    pub fn decode<C: DeserializeOwned + TimeBounded>(&self, token: &str) -> Result<C, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(TokenError::InvalidFormat);
        }

        let header_b64 = parts[0];
        let payload_b64 = parts[1];
        let signature_b64 = parts[2];

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::InvalidBase64)?;
        let header: JwtHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| TokenError::InvalidJson(e.to_string()))?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        // Verify signature before looking at the payload
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::InvalidBase64)?;
        let mut mac = self.mac()?;
        mac.update(format!("{header_b64}.{payload_b64}").as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::InvalidBase64)?;
        let claims: C = serde_json::from_slice(&payload_bytes).map_err(classify_payload_error)?;

        if let Some(claim) = claims.empty_required_claim() {
            return Err(TokenError::MissingClaim(claim.to_string()));
        }

        let now = Utc::now().timestamp();
        if now >= claims.expires_at() {
            return Err(TokenError::Expired);
        }
        if claims.issued_at() > now + IAT_LEEWAY_SECS {
            return Err(TokenError::NotYetValid);
        }

        Ok(claims)
    }

    /// Mint a share token valid for `ttl`.
    pub fn mint_share(&self, grant: ShareGrant, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = ShareClaims {
            sub: grant.share_id.as_ref().map(|id| format!("share:{id}")),
            workspace_id: grant.workspace_id,
            share_id: grant.share_id,
            target_id: grant.target_id,
            perms: grant.perms,
            scope: grant.scope,
            iat: now,
            exp: now + ttl.num_seconds(),
        };
        self.sign(&claims)
    }

    /// Mint a workspace member session token valid for `ttl`.
    pub fn mint_session(
        &self,
        user_id: &str,
        workspace_id: &str,
        role: Option<&str>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            workspace_id: workspace_id.to_string(),
            email: None,
            role: role.map(str::to_string),
            scope: None,
            iat: now,
            exp: now + ttl.num_seconds(),
        };
        self.sign(&claims)
    }
}

impl TokenVerifier for HmacTokenService {
    fn verify_share(&self, token: &str) -> Result<ShareClaims, TokenError> {
        self.decode(token)
    }

    fn verify_session(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.decode(token)
    }
}

/// serde reports absent fields as "missing field `name` at line .."
fn classify_payload_error(e: serde_json::Error) -> TokenError {
    let message = e.to_string();
    if let Some(rest) = message.strip_prefix("missing field `") {
        if let Some((field, _)) = rest.split_once('`') {
            return TokenError::MissingClaim(field.to_string());
        }
    }
    TokenError::InvalidJson(message)
}
