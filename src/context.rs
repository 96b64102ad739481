// src/context.rs
//
// Per-request context: owns the request data (converted from the
// zero-copy `parser::Request<'a>` at the worker boundary so `Handler`/
// `Middleware` stay lifetime-free), the deferred response being built up,
// a user-value store, and path parameters bound by the router.

use std::any::Any;
use std::collections::HashMap;

use crate::http::{Body, Method};

/// An owned copy of the wire request, decoupled from the connection
/// buffer's lifetime so it can be carried across the middleware chain
/// without threading a lifetime parameter through every `Handler`.
#[derive(Debug, Clone)]
pub struct OwnedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl OwnedRequest {
    pub fn from_parsed(req: &crate::http::Request<'_>) -> Self {
        Self {
            method: req.method,
            path: req.path.to_string(),
            query: req.query.map(|q| q.to_string()),
            headers: req.headers[..req.header_count as usize]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: req.body.to_vec(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse `query` into `key=value` pairs, `&`-separated, percent-decoding
    /// neither key nor value (plain split; the framework core does not
    /// assume a particular form encoding beyond `&`/`=` delimiters).
    fn query_pairs(&self) -> Vec<(String, String)> {
        let Some(q) = &self.query else { return Vec::new() };
        q.split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect()
    }
}

/// Per-request context threaded through the middleware chain and into
/// the terminal handler. A response is committed exactly once: either a
/// handler/middleware sets `status`/`body` directly, or calls
/// `abort_with_status`, after which `aborted` short-circuits any further
/// writes (§4.5 "deferred response commit").
pub struct Context {
    pub request: OwnedRequest,
    pub params: HashMap<String, String>,

    pub status: u16,
    pub response_body: Vec<u8>,
    pub response_headers: Vec<(&'static str, String)>,
    pub content_type: &'static str,
    aborted: bool,

    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new(request: OwnedRequest, params: HashMap<String, String>) -> Self {
        Self {
            request,
            params,
            status: 200,
            response_body: Vec::new(),
            response_headers: Vec::new(),
            content_type: "text/plain",
            aborted: false,
            values: HashMap::new(),
        }
    }

    /// A minimal context for tests that only exercise middleware/handler
    /// composition, not the real request path.
    #[cfg(test)]
    pub fn test_default() -> Self {
        Self::new(
            OwnedRequest {
                method: Method::Get,
                path: "/".to_string(),
                query: None,
                headers: Vec::new(),
                body: Vec::new(),
            },
            HashMap::new(),
        )
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.request
            .query_pairs()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Parse `application/x-www-form-urlencoded` bodies the same way as
    /// the query string (pairs split on `&`/`=`).
    pub fn form_value(&self, name: &str) -> Option<String> {
        let body = std::str::from_utf8(&self.request.body).ok()?;
        body.split('&')
            .filter(|pair| !pair.is_empty())
            .find_map(|pair| match pair.split_once('=') {
                Some((k, v)) if k == name => Some(v.to_string()),
                _ => None,
            })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// Resolve the client IP for this request: `X-Forwarded-For`'s first
    /// hop, falling back to `X-Real-IP`, falling back to `remote_addr`.
    /// Pure function of header state — has no knowledge of trusted-proxy
    /// configuration (§4.5).
    pub fn client_ip(&self, remote_addr: &str) -> String {
        if let Some(xff) = self.header("X-Forwarded-For") {
            if let Some(first) = xff.split(',').next() {
                let trimmed = first.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
        if let Some(xri) = self.header("X-Real-IP") {
            let trimmed = xri.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
        remote_addr.to_string()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.values.insert(key.into(), Box::new(value));
    }

    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn abort_with_status(&mut self, status: u16) {
        self.status = status;
        self.aborted = true;
    }

    pub fn json<T: serde::Serialize>(&mut self, status: u16, val: &T) {
        match serde_json::to_vec(val) {
            Ok(bytes) => {
                self.status = status;
                self.response_body = bytes;
                self.content_type = "application/json";
            }
            Err(_) => {
                self.status = 500;
                self.response_body = b"Internal Server Error".to_vec();
                self.content_type = "text/plain";
            }
        }
    }

    pub fn text(&mut self, status: u16, body: impl AsRef<[u8]>) {
        self.status = status;
        self.response_body = body.as_ref().to_vec();
        self.content_type = "text/plain";
    }

    /// Commit this context's buffered response into a wire `Response`.
    /// Called exactly once, after the middleware chain has unwound.
    pub fn into_response(self) -> crate::http::Response {
        crate::http::Response {
            status: self.status,
            body: Body::Bytes(self.response_body),
            content_type: self.content_type,
            headers: self.response_headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_headers(headers: Vec<(&str, &str)>) -> Context {
        Context::new(
            OwnedRequest {
                method: Method::Get,
                path: "/".to_string(),
                query: None,
                headers: headers.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                body: Vec::new(),
            },
            HashMap::new(),
        )
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let ctx = ctx_with_headers(vec![
            ("X-Forwarded-For", "203.0.113.5, 10.0.0.1"),
            ("X-Real-IP", "198.51.100.2"),
        ]);
        assert_eq!(ctx.client_ip("127.0.0.1"), "203.0.113.5");
    }

    #[test]
    fn client_ip_falls_back_to_real_ip() {
        let ctx = ctx_with_headers(vec![("X-Real-IP", "198.51.100.2")]);
        assert_eq!(ctx.client_ip("127.0.0.1"), "198.51.100.2");
    }

    #[test]
    fn client_ip_falls_back_to_remote_addr() {
        let ctx = ctx_with_headers(vec![]);
        assert_eq!(ctx.client_ip("127.0.0.1"), "127.0.0.1");
    }

    #[test]
    fn query_param_parses_pairs() {
        let mut ctx = ctx_with_headers(vec![]);
        ctx.request.query = Some("a=1&b=2&flag".to_string());
        assert_eq!(ctx.query_param("a").as_deref(), Some("1"));
        assert_eq!(ctx.query_param("b").as_deref(), Some("2"));
        assert_eq!(ctx.query_param("flag").as_deref(), Some(""));
        assert_eq!(ctx.query_param("missing"), None);
    }

    #[test]
    fn form_value_parses_body() {
        let mut ctx = ctx_with_headers(vec![]);
        ctx.request.body = b"name=alice&age=30".to_vec();
        assert_eq!(ctx.form_value("name").as_deref(), Some("alice"));
        assert_eq!(ctx.form_value("age").as_deref(), Some("30"));
    }

    #[test]
    fn abort_sets_status_and_flag() {
        let mut ctx = ctx_with_headers(vec![]);
        ctx.abort_with_status(403);
        assert_eq!(ctx.status, 403);
        assert!(ctx.is_aborted());
    }

    #[test]
    fn user_values_roundtrip() {
        let mut ctx = ctx_with_headers(vec![]);
        ctx.set("user_id", 42u64);
        assert_eq!(ctx.get::<u64>("user_id"), Some(&42));
        assert_eq!(ctx.get::<String>("user_id"), None);
    }
}
