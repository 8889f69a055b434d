//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (answer preflight, tag allowed origins, advertise methods and headers)
//!     → Pass to routing
//! ```

pub mod cors;

pub use cors::{cors_layer, with_cors};
