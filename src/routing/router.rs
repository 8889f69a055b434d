//! Route table.
//!
//! # Responsibilities
//! - Store handlers keyed by (method, pattern)
//! - Exact lookup of a normalized path
//! - Ordered iteration over placeholder-bearing patterns
//!
//! # Design Decisions
//! - Populated once at startup, read-only afterwards (shared via Arc, no locks)
//! - Methods are compared case-sensitively as received
//! - Re-registering a (method, pattern) replaces the handler but keeps its original position
//! - The table only grows; there is no removal

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::http::{Request, Response};
use crate::routing::matcher::{Params, PathPattern};

/// Boxed error a handler may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of invoking a handler.
pub type HandlerResult = Result<Response, HandlerError>;

/// Application code bound to a route.
pub trait Handler: Send + Sync {
    fn call(&self, request: &mut Request, response: Response, params: &Params) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&mut Request, Response, &Params) -> HandlerResult + Send + Sync,
{
    fn call(&self, request: &mut Request, response: Response, params: &Params) -> HandlerResult {
        self(request, response, params)
    }
}

/// A registered (method, pattern) pair and its handler.
pub struct Route {
    method: Method,
    pattern: PathPattern,
    handler: Arc<dyn Handler>,
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Routes for a single method, in registration order.
#[derive(Debug, Default)]
struct MethodRoutes {
    routes: Vec<Route>,
    by_pattern: HashMap<String, usize>,
}

/// Mapping of method → pattern → handler.
#[derive(Debug, Default)]
pub struct RouteTable {
    methods: HashMap<Method, MethodRoutes>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handler` under (method, pattern). The pattern is kept verbatim.
    pub fn register<H>(&mut self, method: Method, pattern: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler + 'static,
    {
        let pattern = pattern.into();
        let handler: Arc<dyn Handler> = Arc::new(handler);
        let entry = self.methods.entry(method.clone()).or_default();

        match entry.by_pattern.get(&pattern) {
            Some(&idx) => {
                tracing::warn!(method = %method, pattern = %pattern, "Route registered twice, replacing handler");
                entry.routes[idx].handler = handler;
            }
            None => {
                tracing::debug!(method = %method, pattern = %pattern, "Route registered");
                entry.by_pattern.insert(pattern.clone(), entry.routes.len());
                entry.routes.push(Route {
                    method,
                    pattern: PathPattern::new(pattern),
                    handler,
                });
            }
        }
        self
    }

    pub fn get<F>(&mut self, pattern: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, Response, &Params) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(Method::GET, pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, Response, &Params) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(Method::POST, pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, Response, &Params) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(Method::PUT, pattern, handler)
    }

    pub fn patch<F>(&mut self, pattern: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, Response, &Params) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(Method::PATCH, pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut Request, Response, &Params) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(Method::DELETE, pattern, handler)
    }

    /// Route whose pattern string equals `path` exactly.
    pub fn lookup_exact(&self, method: &Method, path: &str) -> Option<&Route> {
        let entry = self.methods.get(method)?;
        entry.by_pattern.get(path).map(|&idx| &entry.routes[idx])
    }

    /// Placeholder-bearing routes for `method`, in registration order.
    ///
    /// Each call starts a fresh iteration.
    pub fn iterate<'a>(&'a self, method: &Method) -> impl Iterator<Item = &'a Route> + 'a {
        self.methods
            .get(method)
            .into_iter()
            .flat_map(|entry| entry.routes.iter())
            .filter(|route| route.pattern.has_placeholders())
    }

    /// Every registered (method, pattern), grouped by method.
    pub fn routes(&self) -> Vec<(&Method, &str)> {
        let mut all: Vec<_> = self
            .methods
            .iter()
            .flat_map(|(method, entry)| entry.routes.iter().map(move |r| (method, r.pattern.as_str())))
            .collect();
        all.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        all
    }

    pub fn len(&self) -> usize {
        self.methods.values().map(|entry| entry.routes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
