//! Minimal HTTP routing layer with a users REST API.

pub mod api;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::AppConfig;
pub use http::{HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use routing::{Dispatcher, Params, RouteTable};
