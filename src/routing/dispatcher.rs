//! Request dispatch.
//!
//! # Responsibilities
//! - Normalize the incoming path
//! - Resolve a route: exact lookup first, then ordered placeholder scan
//! - Invoke the handler with bound path parameters
//! - Flush the response to the transport exactly once
//!
//! # Design Decisions
//! - First registered placeholder pattern that matches wins, not the most specific
//! - An unmatched exchange gets a fixed `404 - Not Found` plain-text body
//! - Handler errors are not caught here; they propagate to the transport
//! - No timeout is imposed on handlers

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use thiserror::Error;

use crate::http::{Inbound, Request, Response, Sink};
use crate::routing::matcher::Params;
use crate::routing::router::{HandlerError, Route, RouteTable};

/// Body of the fixed no-route response.
pub const NOT_FOUND_BODY: &str = "404 - Not Found";

/// Failure raised by a matched handler.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler for {method} {pattern} failed: {source}")]
    Handler {
        method: Method,
        pattern: String,
        #[source]
        source: HandlerError,
    },
}

/// Summary of a completed dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub status: StatusCode,
    /// Pattern of the matched route, `None` for the fixed 404.
    pub route: Option<String>,
}

/// Strip the query string and a single trailing slash. An empty result becomes `/`.
pub fn normalize_path(raw: &str) -> String {
    let path = raw.split_once('?').map_or(raw, |(path, _)| path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Resolves and invokes handlers from a shared route table.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: Arc<RouteTable>,
}

impl Dispatcher {
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Find the route for a normalized path and its parameter bindings.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<(&Route, Params)> {
        if let Some(route) = self.table.lookup_exact(method, path) {
            return Some((route, Params::new()));
        }

        self.table
            .iterate(method)
            .find_map(|route| route.pattern().captures(path).map(|params| (route, params)))
    }

    /// Run one exchange: resolve, invoke, flush.
    pub fn dispatch<S>(&self, inbound: Inbound, sink: &mut S) -> Result<Dispatched, DispatchError>
    where
        S: Sink + ?Sized,
    {
        let path = normalize_path(&inbound.uri);
        let method = inbound.method.clone();

        let Some((route, params)) = self.resolve(&method, &path) else {
            tracing::debug!(method = %method, path = %path, "No route matched");
            let response = Response::new()
                .with_status(StatusCode::NOT_FOUND)
                .write(NOT_FOUND_BODY);
            response.flush(sink);
            return Ok(Dispatched {
                status: StatusCode::NOT_FOUND,
                route: None,
            });
        };

        let pattern = route.pattern().as_str();
        tracing::debug!(
            method = %method,
            path = %path,
            pattern = %pattern,
            params = params.len(),
            "Route matched"
        );

        let mut request = Request::from_inbound(inbound);
        request.set_path(path);
        for (name, value) in params.iter() {
            request.with_attribute(name, value);
        }

        let response = route
            .handler()
            .call(&mut request, Response::new(), &params)
            .map_err(|source| DispatchError::Handler {
                method: method.clone(),
                pattern: pattern.to_string(),
                source,
            })?;

        let status = response.status();
        response.flush(sink);
        Ok(Dispatched {
            status,
            route: Some(pattern.to_string()),
        })
    }
}
