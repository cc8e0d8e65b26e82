//! Share-link HTTP Transport
//!
//! Provides the axum HTTP surface for the share-link server.
//! The transport layer handles:
//! - Routing and JSON (de)serialization
//! - Running the share and session guards as route layers and merging the
//!   admitted [`RequestContext`](share_protocol::RequestContext) into request
//!   extensions
//! - Uniform error bodies
//! - Server lifecycle (bind, graceful shutdown)
//!
//! The transport is decoupled from the server logic via the `RequestHandler` trait.

pub mod server;

pub use server::{ApiError, RequestHandler, TransportConfig, TransportServer, router};
