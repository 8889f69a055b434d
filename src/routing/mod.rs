//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     get/post/put/patch/delete(pattern, handler)
//!     → router.rs (RouteTable, registration order kept per method)
//!     → frozen inside a Dispatcher, shared via Arc
//!
//! Per exchange:
//!     method + raw URI
//!     → dispatcher.rs (strip query, strip trailing slash)
//!     → router.rs (exact lookup)
//!     → matcher.rs (ordered placeholder scan on miss)
//!     → handler(request, response, params)
//!     → response flushed once, or fixed 404
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (registration order), exact matches checked before placeholders

pub mod dispatcher;
pub mod matcher;
pub mod router;

pub use dispatcher::{normalize_path, DispatchError, Dispatched, Dispatcher, NOT_FOUND_BODY};
pub use matcher::{Params, PathPattern};
pub use router::{Handler, HandlerError, HandlerResult, Route, RouteTable};
