//! HTTP request/response model and hosting transport.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum catch-all, body buffering, CORS, request ID)
//!     → request.rs (Inbound → Request, body parsed by content type)
//!     → routing::Dispatcher (resolve + invoke handler)
//!     → response.rs (Response flushed into a Sink)
//!     → server.rs (Sink converted to an axum response)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{BodyKind, Inbound, Request, RequestUuid, X_REQUEST_ID};
pub use response::{Flushed, Response, Sink};
pub use server::{HttpServer, ServerError};
