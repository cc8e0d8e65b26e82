//! Share-link service implementations.
//!
//! - [`token`]: HS256 token signing and verification
//! - [`store`]: share-link persistence behind the [`ShareLinkStore`] trait
//! - [`links`]: the create/claim/revoke/list lifecycle
//! - [`password`]: salted digests for password-protected links

pub mod links;
pub mod password;
pub mod store;
pub mod token;

pub use links::{ShareLinkConfig, ShareLinkService};
pub use store::{MemoryShareLinkStore, ShareLink, ShareLinkStore};
pub use token::{HmacTokenService, ShareGrant, TokenError, TokenVerifier};
