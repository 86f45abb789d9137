//! Request/response dump middleware for axum.
//!
//! Captures inbound request metadata (headers, body) and outbound response
//! metadata (headers, body, latency), strips configured sensitive fields,
//! and emits one structured `tracing` event per request. Intended for
//! debugging and auditing HTTP traffic on a running service.
//!
//! The middleware is fail-open: any failure while building the dump record
//! is downgraded to a diagnostic note on the emitted event and never
//! changes the status, headers, or body delivered to the client.
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{middleware::from_fn_with_state, routing::get, Router};
//! use axum_dump::DumpConfig;
//!
//! let config = Arc::new(DumpConfig::new().hide_body_field("password"));
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "ok" }))
//!     .layer(from_fn_with_state(config, axum_dump::dump));
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod format;
pub mod middleware;

pub use config::{DumpConfig, DumpOptions};
pub use error::DumpError;
pub use middleware::dump;
