//! Request model.
//!
//! # Responsibilities
//! - Carry the transport-supplied exchange data (`Inbound`)
//! - Parse the body once, driven by content type
//! - Hold string-keyed attributes (path parameters, handler metadata)
//! - Generate request IDs for the hosting transport
//!
//! # Design Decisions
//! - Method and URI are read once and never change
//! - Query-string stripping and path normalization belong to the dispatcher
//! - Dynamic values use `serde_json::Value`
//! - Unparseable or unrecognized bodies leave the parsed body absent

use std::collections::HashMap;

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, Method};
use serde_json::{Map, Value};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the per-exchange request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Raw exchange data handed over by the hosting transport.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub method: Method,
    /// Full request URI: path plus optional query string.
    pub uri: String,
    pub content_type: Option<String>,
    pub body: Bytes,
    /// Fields the transport already decoded from a form or multipart body.
    pub form_fields: Vec<(String, String)>,
    pub query: HashMap<String, String>,
}

impl Inbound {
    /// Start an exchange with no body. Query parameters are decoded from `uri`.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let query = uri
            .split_once('?')
            .map(|(_, qs)| decode_pairs(qs.as_bytes()).into_iter().collect())
            .unwrap_or_default();

        Self {
            method,
            uri,
            content_type: None,
            body: Bytes::new(),
            form_fields: Vec::new(),
            query,
        }
    }

    /// Attach a body. URL-encoded form bodies are decoded into `form_fields` here.
    pub fn with_body(mut self, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let content_type = content_type.into();
        let body = body.into();
        if BodyKind::of(&content_type) == BodyKind::Form {
            self.form_fields = decode_pairs(&body);
        }
        self.content_type = Some(content_type);
        self.body = body;
        self
    }

    pub fn with_form_fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.form_fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }
}

fn decode_pairs(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input).into_owned().collect()
}

/// How a body is decoded, by media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
    Multipart,
    Other,
}

impl BodyKind {
    pub fn of(content_type: &str) -> Self {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match media_type.as_str() {
            "application/json" => BodyKind::Json,
            "application/x-www-form-urlencoded" => BodyKind::Form,
            "multipart/form-data" => BodyKind::Multipart,
            _ => BodyKind::Other,
        }
    }
}

/// One inbound HTTP exchange as seen by handlers.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: String,
    path: String,
    attributes: HashMap<String, Value>,
    parsed_body: Option<Value>,
    query: HashMap<String, String>,
    body: Bytes,
}

impl Request {
    pub fn from_inbound(inbound: Inbound) -> Self {
        let parsed_body = if carries_body(&inbound.method) {
            parse_body(&inbound)
        } else {
            None
        };

        Self {
            path: inbound.uri.clone(),
            method: inbound.method,
            uri: inbound.uri,
            attributes: HashMap::new(),
            parsed_body,
            query: inbound.query,
            body: inbound.body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The URI exactly as received, query string included.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The path the route was resolved against.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: String) {
        self.path = path;
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attribute_or<'a>(&'a self, name: &str, default: &'a Value) -> &'a Value {
        self.attributes.get(name).unwrap_or(default)
    }

    /// Set an attribute; a later write to the same name wins.
    pub fn with_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    pub fn parsed_body(&self) -> Option<&Value> {
        self.parsed_body.as_ref()
    }

    /// Look up a top-level field of an object body.
    pub fn body_field(&self, name: &str) -> Option<&Value> {
        self.parsed_body.as_ref()?.as_object()?.get(name)
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Raw body bytes as received.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

fn carries_body(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

fn parse_body(inbound: &Inbound) -> Option<Value> {
    let kind = BodyKind::of(inbound.content_type.as_deref()?);
    match kind {
        BodyKind::Json => serde_json::from_slice::<Value>(&inbound.body)
            .ok()
            .filter(|value| value.is_object() || value.is_array()),
        BodyKind::Form | BodyKind::Multipart => {
            let fields: Map<String, Value> = inbound
                .form_fields
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            Some(Value::Object(fields))
        }
        BodyKind::Other => None,
    }
}

/// Request ID generator using random UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestUuid;

impl MakeRequestId for RequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let value = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_decoded_from_uri() {
        let inbound = Inbound::new(Method::GET, "/api/posts?page=2&tag=rust%20lang");
        assert_eq!(inbound.query.get("page").map(String::as_str), Some("2"));
        assert_eq!(inbound.query.get("tag").map(String::as_str), Some("rust lang"));

        let request = Request::from_inbound(inbound);
        assert_eq!(request.uri(), "/api/posts?page=2&tag=rust%20lang");
        assert_eq!(request.query_param("page"), Some("2"));
        assert_eq!(request.query_param("missing"), None);
    }

    #[test]
    fn test_json_body_parsed_for_write_methods() {
        let inbound = Inbound::new(Method::POST, "/api/users")
            .with_body("application/json; charset=utf-8", r#"{"name":"Ada"}"#);
        let request = Request::from_inbound(inbound);

        assert_eq!(request.parsed_body(), Some(&json!({"name": "Ada"})));
        assert_eq!(request.body_field("name"), Some(&json!("Ada")));
    }

    #[test]
    fn test_json_array_body() {
        let inbound = Inbound::new(Method::PUT, "/items").with_body("application/json", "[1,2]");
        let request = Request::from_inbound(inbound);
        assert_eq!(request.parsed_body(), Some(&json!([1, 2])));
    }

    #[test]
    fn test_body_ignored_for_get() {
        let inbound = Inbound::new(Method::GET, "/").with_body("application/json", r#"{"a":1}"#);
        let request = Request::from_inbound(inbound);
        assert!(request.parsed_body().is_none());
        assert_eq!(request.body(), br#"{"a":1}"#);
    }

    #[test]
    fn test_invalid_or_scalar_json_is_absent() {
        let bad = Inbound::new(Method::POST, "/").with_body("application/json", "{not json");
        assert!(Request::from_inbound(bad).parsed_body().is_none());

        let scalar = Inbound::new(Method::POST, "/").with_body("application/json", "42");
        assert!(Request::from_inbound(scalar).parsed_body().is_none());
    }

    #[test]
    fn test_form_body_fields() {
        let inbound = Inbound::new(Method::POST, "/api/users").with_body(
            "application/x-www-form-urlencoded",
            "name=Ada+Lovelace&email=ada%40example.com",
        );
        let request = Request::from_inbound(inbound);

        assert_eq!(
            request.parsed_body(),
            Some(&json!({"name": "Ada Lovelace", "email": "ada@example.com"}))
        );
    }

    #[test]
    fn test_multipart_uses_transport_fields() {
        let inbound = Inbound::new(Method::PATCH, "/upload")
            .with_body("multipart/form-data; boundary=xyz", "opaque")
            .with_form_fields([("title", "Hello")]);
        let request = Request::from_inbound(inbound);
        assert_eq!(request.body_field("title"), Some(&json!("Hello")));
    }

    #[test]
    fn test_unknown_content_type_leaves_body_absent() {
        let inbound = Inbound::new(Method::POST, "/").with_body("text/plain", "hello");
        assert!(Request::from_inbound(inbound).parsed_body().is_none());
    }

    #[test]
    fn test_attributes_last_write_wins() {
        let mut request = Request::from_inbound(Inbound::new(Method::GET, "/"));
        request.with_attribute("id", "1").with_attribute("id", "2");

        assert_eq!(request.attribute("id"), Some(&json!("2")));
        let fallback = json!(null);
        assert_eq!(request.attribute_or("missing", &fallback), &Value::Null);
    }

    #[test]
    fn test_body_kind_classification() {
        assert_eq!(BodyKind::of("Application/JSON"), BodyKind::Json);
        assert_eq!(BodyKind::of("multipart/form-data; boundary=a"), BodyKind::Multipart);
        assert_eq!(BodyKind::of("text/html"), BodyKind::Other);
    }

    #[test]
    fn test_request_uuid_generates_header_value() {
        let req = axum::http::Request::builder().body(()).unwrap();
        let id = RequestUuid.make_request_id(&req).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
    }
}
