//! Response model and the transport write boundary.
//!
//! # Responsibilities
//! - Accumulate status, headers and body for one exchange
//! - Emit them to a `Sink` exactly once
//!
//! # Design Decisions
//! - Mutators take and return `self` so handlers can chain them
//! - `flush` consumes the response: nothing can be changed or re-sent afterwards
//! - Header names compare case-insensitively and keep first-insertion order
//! - Each value of a repeated header is written as its own header line

use axum::http::StatusCode;
use serde::Serialize;

/// Destination the response is flushed to.
pub trait Sink {
    fn write_status(&mut self, status: StatusCode);
    fn write_header(&mut self, name: &str, value: &str);
    fn write_body(&mut self, body: &[u8]);
}

/// Output accumulated by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, Vec<String>)>,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Replace every value previously set for `name`.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.headers[idx].1 = vec![value],
            None => self.headers.push((name, vec![value])),
        }
        self
    }

    /// Add another value for `name`, keeping the existing ones.
    pub fn with_added_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.headers[idx].1.push(value),
            None => self.headers.push((name, vec![value])),
        }
        self
    }

    /// Append to the body buffer.
    pub fn write(mut self, chunk: impl AsRef<[u8]>) -> Self {
        self.body.extend_from_slice(chunk.as_ref());
        self
    }

    /// Set a JSON content type and append the serialized value.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        let response = self.with_header("Content-Type", "application/json");
        match serde_json::to_vec(value) {
            Ok(encoded) => response.write(encoded),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON body");
                response
            }
        }
    }

    /// Values recorded for `name`, if any.
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.position(name).map(|idx| self.headers[idx].1.as_slice())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Write status, every header line, then the body.
    pub fn flush<S: Sink + ?Sized>(self, sink: &mut S) {
        sink.write_status(self.status);
        for (name, values) in &self.headers {
            for value in values {
                sink.write_header(name, value);
            }
        }
        sink.write_body(&self.body);
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

/// A sink that keeps everything written to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flushed {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Default for Flushed {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

impl Flushed {
    /// All written values for `name`, in write order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Sink for Flushed {
    fn write_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn write_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write_body(&mut self, body: &[u8]) {
        self.body.extend_from_slice(body);
    }
}
