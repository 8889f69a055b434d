//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router with a catch-all handler
//! - Wire up middleware (tracing, request ID, CORS, body limit)
//! - Buffer the body and pre-parse multipart fields
//! - Hand each exchange to the Dispatcher on a blocking thread
//! - Turn the flushed output, or a handler failure, into an HTTP response

use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, FromRequest, Multipart, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::request::{BodyKind, Inbound, RequestUuid, X_REQUEST_ID};
use crate::http::response::Flushed;
use crate::observability::metrics;
use crate::routing::{DispatchError, Dispatcher, RouteTable};
use crate::security::with_cors;

/// Body returned when a handler fails or panics.
pub const INTERNAL_ERROR_BODY: &str = "500 - Internal Server Error";

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into the catch-all handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub max_body_size: usize,
}

/// HTTP server hosting a route table.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a server dispatching into `table`.
    pub fn new(config: AppConfig, table: RouteTable) -> Self {
        for (method, pattern) in table.routes() {
            tracing::debug!(method = %method, pattern = %pattern, "Route");
        }
        tracing::info!(routes = table.len(), "Route table ready");

        let state = AppState {
            dispatcher: Dispatcher::new(table),
            max_body_size: config.limits.max_body_size,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/", any(dispatch_handler))
            .route("/{*path}", any(dispatch_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.limits.max_body_size));

        with_cors(router, &config.cors)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, RequestUuid))
    }

    /// The configured axum router, for embedding or in-process testing.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until a shutdown signal is broadcast.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Catch-all handler: every exchange goes through the Dispatcher.
async fn dispatch_handler(State(state): State<AppState>, request: axum::extract::Request) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let inbound = match read_inbound(request, state.max_body_size).await {
        Ok(inbound) => inbound,
        Err(rejection) => {
            metrics::record_request(method.as_str(), rejection.status().as_u16(), None, start_time);
            return rejection;
        }
    };

    tracing::debug!(request_id = %request_id, method = %method, uri = %inbound.uri, "Dispatching");

    let dispatcher = state.dispatcher.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut sink = Flushed::default();
        dispatcher
            .dispatch(inbound, &mut sink)
            .map(|dispatched| (dispatched, sink))
    })
    .await;

    match outcome {
        Ok(Ok((dispatched, sink))) => {
            metrics::record_request(
                method.as_str(),
                dispatched.status.as_u16(),
                dispatched.route.as_deref(),
                start_time,
            );
            sink.into_response()
        }
        Ok(Err(err)) => {
            let DispatchError::Handler { pattern, .. } = &err;
            tracing::error!(request_id = %request_id, error = %err, "Handler failed");
            metrics::record_handler_failure(method.as_str(), pattern);
            metrics::record_request(method.as_str(), 500, Some(pattern.as_str()), start_time);
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Handler panicked");
            metrics::record_handler_failure(method.as_str(), "unknown");
            metrics::record_request(method.as_str(), 500, None, start_time);
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
        }
    }
}

/// Collect method, URI, content type and body into an `Inbound`.
async fn read_inbound(request: axum::extract::Request, limit: usize) -> Result<Inbound, Response> {
    let method: Method = request.method().clone();
    let uri = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(content_type) = content_type else {
        let body = buffer_body(request, limit).await?;
        let mut inbound = Inbound::new(method, uri);
        inbound.body = body;
        return Ok(inbound);
    };

    if BodyKind::of(&content_type) == BodyKind::Multipart {
        let fields = match read_multipart(request).await {
            Ok(fields) => fields,
            Err((status, reason)) if status == StatusCode::PAYLOAD_TOO_LARGE => {
                tracing::warn!(error = %reason, limit, "Multipart body too large");
                return Err((status, "Request body too large").into_response());
            }
            Err((_, reason)) => {
                tracing::warn!(error = %reason, "Unreadable multipart body, dispatching without fields");
                Vec::new()
            }
        };
        return Ok(Inbound::new(method, uri)
            .with_body(content_type, Bytes::new())
            .with_form_fields(fields));
    }

    let body = buffer_body(request, limit).await?;
    Ok(Inbound::new(method, uri).with_body(content_type, body))
}

async fn buffer_body(request: axum::extract::Request, limit: usize) -> Result<Bytes, Response> {
    axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, limit, "Failed to read request body");
            (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
        })
}

/// Text fields of a multipart body. File parts are skipped.
async fn read_multipart(
    request: axum::extract::Request,
) -> Result<Vec<(String, String)>, (StatusCode, String)> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| (e.status(), e.body_text()))?;

    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            continue;
        }
        let value = field.text().await.map_err(|e| (e.status(), e.body_text()))?;
        fields.push((name, value));
    }
    Ok(fields)
}

impl IntoResponse for Flushed {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().append(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request as RouteRequest;
    use crate::routing::{HandlerResult, Params};
    use axum::body::to_bytes;
    use tower::ServiceExt;

    fn server() -> Router {
        let mut table = RouteTable::new();
        table
            .get("/hello/{name}", |_: &mut RouteRequest, res: crate::http::Response, p: &Params| {
                Ok(res.write(format!("Hello, {}", p.get("name").unwrap_or_default())))
            })
            .post("/echo", |req: &mut RouteRequest, res: crate::http::Response, _: &Params| -> HandlerResult {
                let body = req.parsed_body().cloned().unwrap_or_default();
                Ok(res.json(&body))
            })
            .get("/fail", |_: &mut RouteRequest, _: crate::http::Response, _: &Params| Err("boom".into()))
            .get("/panic", |_: &mut RouteRequest, _: crate::http::Response, _: &Params| -> HandlerResult {
                panic!("handler bug")
            });
        HttpServer::new(AppConfig::default(), table).into_router()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> axum::extract::Request {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_dispatches_through_router() {
        let res = server().oneshot(get("/hello/axum")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key(X_REQUEST_ID));
        assert_eq!(body_text(res).await, "Hello, axum");
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let res = server().oneshot(get("/missing")).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(body_text(res).await, "404 - Not Found");
    }

    #[tokio::test]
    async fn test_json_body_reaches_handler() {
        let req = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"Hi"}"#))
            .unwrap();

        let res = server().oneshot(req).await.unwrap();
        assert_eq!(res.headers().get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(body_text(res).await, r#"{"title":"Hi"}"#);
    }

    #[tokio::test]
    async fn test_multipart_fields_reach_handler() {
        let body = "--XYZ\r\n\
                    Content-Disposition: form-data; name=\"title\"\r\n\r\n\
                    Hello\r\n\
                    --XYZ--\r\n";
        let req = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XYZ")
            .body(Body::from(body))
            .unwrap();

        let res = server().oneshot(req).await.unwrap();
        assert_eq!(body_text(res).await, r#"{"title":"Hello"}"#);
    }

    #[tokio::test]
    async fn test_malformed_multipart_on_unmatched_route_is_not_found() {
        let req = axum::http::Request::builder()
            .method(Method::DELETE)
            .uri("/nowhere")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XYZ")
            .body(Body::from("garbage without boundary"))
            .unwrap();

        let res = server().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(res).await, "404 - Not Found");
    }

    #[tokio::test]
    async fn test_multipart_without_boundary_still_dispatched() {
        let req = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header(header::CONTENT_TYPE, "multipart/form-data")
            .body(Body::from("title=Hello"))
            .unwrap();

        let res = server().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "{}");
    }

    #[tokio::test]
    async fn test_handler_error_and_panic_become_500() {
        for uri in ["/fail", "/panic"] {
            let res = server().oneshot(get(uri)).await.unwrap();
            assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body_text(res).await, INTERNAL_ERROR_BODY);
        }
    }

    #[tokio::test]
    async fn test_body_over_limit_rejected() {
        let mut config = AppConfig::default();
        config.limits.max_body_size = 8;
        let mut table = RouteTable::new();
        table.post("/echo", |_: &mut RouteRequest, res: crate::http::Response, _: &Params| Ok(res));
        let router = HttpServer::new(config, table).into_router();

        let req = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("far more than eight bytes"))
            .unwrap();
        let res = router.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_flushed_into_response_keeps_repeated_headers() {
        let flushed = Flushed {
            status: StatusCode::CREATED,
            headers: vec![
                ("Set-Cookie".into(), "a=1".into()),
                ("Set-Cookie".into(), "b=2".into()),
                ("Bad Header".into(), "x".into()),
            ],
            body: b"ok".to_vec(),
        };

        let res = flushed.into_response();
        assert_eq!(res.status(), StatusCode::CREATED);
        let cookies: Vec<_> = res.headers().get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert_eq!(res.headers().len(), 2);
    }
}
