//! Share Server: access guards and the request handler behind the transport.
//!
//! The server owns the link service and both guards, and provides the
//! `RequestHandler` implementation for the transport layer.

pub mod guard;
pub mod router;
pub mod session;
pub mod share;

pub use guard::{DenyReason, Guard, bearer_token};
pub use router::ShareServer;
pub use session::SessionGuard;
pub use share::{ShareDecision, ShareGuard};
