use crate::parser::ParseError;
use std::io;

/// Central error type for the Chopin core engine.
#[derive(Debug)]
pub enum ChopinError {
    /// Underlying I/O error from the OS or network.
    Io(io::Error),
    /// Error during HTTP request parsing.
    Parse(ParseError),
    /// Slab allocator reached its maximum capacity.
    SlabFull,
    /// A background worker or task panicked.
    WorkerPanic(String),
    /// Generic or miscellaneous error.
    Other(String),
}

impl std::fmt::Display for ChopinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChopinError::Io(e) => write!(f, "I/O error: {}", e),
            ChopinError::Parse(e) => write!(f, "Parse error: {:?}", e),
            ChopinError::SlabFull => write!(f, "Connection slab is full"),
            ChopinError::WorkerPanic(msg) => write!(f, "Worker panic: {}", msg),
            ChopinError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for ChopinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChopinError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ChopinError {
    fn from(e: io::Error) -> Self {
        ChopinError::Io(e)
    }
}

impl From<ParseError> for ChopinError {
    fn from(e: ParseError) -> Self {
        ChopinError::Parse(e)
    }
}

pub type ChopinResult<T> = Result<T, ChopinError>;

// ── API-level error taxonomy ──
//
// Distinct from `ChopinError` above (engine/transport errors): `APIError`
// is what handlers and middleware raise to describe a request-level
// failure, shaped for JSON rendering on the wire. The kind/status/code
// pairing below follows `chopin-core::error::ChopinError`'s
// `status_code()`/`error_code()` split, generalized from a fixed enum of
// domain errors to a `kind` + free-form `message` + optional `details`
// so application code isn't limited to a closed set of variants.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use thiserror::Error;

use crate::context::Context;
use crate::middleware::Middleware;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Unauthorized,
    Forbidden,
    Conflict,
    Validation,
    TooManyRequests,
    Internal,
    /// A dependency the handler needed (DB, upstream service, ...) is down.
    Unavailable,
    /// A blocking operation exceeded its deadline.
    Timeout,
    /// Well-formed request, semantically invalid entity — distinct from
    /// `Validation`'s malformed-input case.
    Unprocessable,
}

impl ErrorKind {
    pub fn default_status(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::Conflict => 409,
            ErrorKind::Validation => 422,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::Internal => 500,
            ErrorKind::Unavailable => 503,
            ErrorKind::Timeout => 504,
            ErrorKind::Unprocessable => 422,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorKind::Internal => "INTERNAL_ERROR",
            ErrorKind::Unavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Unprocessable => "UNPROCESSABLE_ENTITY",
        }
    }
}

/// A request-level error: kind, HTTP status (defaults from `kind` but may
/// be overridden), a human-readable message, and optional structured
/// `details` that `RecoveryMiddleware` hides on the wire when running in
/// production mode.
#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct APIError {
    pub kind: ErrorKind,
    pub http_status: u16,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl APIError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let http_status = kind.default_status();
        Self {
            kind,
            http_status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = status;
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Lift any `std::error::Error` into an opaque `Internal` API error,
    /// preserving its message.
    pub fn wrap(err: impl std::error::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl APIError {
    fn render(&self, hide_details: bool) -> (u16, ErrorBody) {
        let body = ErrorBody {
            kind: self.kind.code().to_string(),
            code: self.http_status,
            message: self.message.clone(),
            details: if hide_details { None } else { self.details.clone() },
        };
        (self.http_status, body)
    }
}

type CustomHandler = Arc<dyn Fn(&APIError, &mut Context) + Send + Sync>;

/// Built-in recovery middleware: catches `APIError`s raised via
/// `Context::set`/`abort_with_status` plumbing (concretely: anything that
/// calls `RecoveryMiddleware::fail(ctx, err)` within the chain) and
/// renders them as JSON. Per-kind handlers run first, then a global
/// fallback, then the default JSON body — the three-tier order the error
/// handling design specifies.
pub struct RecoveryMiddleware {
    production: bool,
    per_kind: RwLock<std::collections::HashMap<ErrorKind, CustomHandler>>,
    fallback: RwLock<Option<CustomHandler>>,
}

impl RecoveryMiddleware {
    pub fn new() -> Self {
        Self {
            production: false,
            per_kind: RwLock::new(std::collections::HashMap::new()),
            fallback: RwLock::new(None),
        }
    }

    pub fn production(mut self, on: bool) -> Self {
        self.production = on;
        self
    }

    pub fn on_kind(self, kind: ErrorKind, handler: impl Fn(&APIError, &mut Context) + Send + Sync + 'static) -> Self {
        self.per_kind.write().unwrap().insert(kind, Arc::new(handler));
        self
    }

    pub fn on_any(self, handler: impl Fn(&APIError, &mut Context) + Send + Sync + 'static) -> Self {
        *self.fallback.write().unwrap() = Some(Arc::new(handler));
        self
    }

    /// Apply `err` to `ctx`, used by handlers/middleware that surface an
    /// `APIError` instead of returning one (the pipeline has no `Result`
    /// return channel by design — errors are applied to the context
    /// directly, mirroring how the rest of the pipeline reports failure
    /// via mutation rather than a bubbled return value).
    pub fn fail(&self, ctx: &mut Context, err: APIError) {
        if let Some(handler) = self.per_kind.read().unwrap().get(&err.kind) {
            handler(&err, ctx);
            ctx.abort_with_status(ctx.status);
            return;
        }
        if let Some(handler) = self.fallback.read().unwrap().as_ref() {
            handler(&err, ctx);
            ctx.abort_with_status(ctx.status);
            return;
        }
        let (status, body) = err.render(self.production);
        ctx.json(status, &body);
        ctx.abort_with_status(status);
    }
}

impl Default for RecoveryMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for RecoveryMiddleware {
    /// Runs the rest of the chain under `catch_unwind` so a handler panic
    /// renders as a 500 instead of tearing down the worker thread.
    fn handle(&self, ctx: &mut Context, next: &mut dyn FnMut(&mut Context)) {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| next(ctx)));
        if let Err(payload) = outcome {
            self.fail(ctx, APIError::internal(panic_message(&payload)));
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod api_error_tests {
    use super::*;

    #[test]
    fn default_status_matches_kind() {
        assert_eq!(APIError::not_found("missing").http_status, 404);
        assert_eq!(APIError::bad_request("bad").http_status, 400);
        assert_eq!(APIError::internal("boom").http_status, 500);
    }

    #[test]
    fn fail_renders_default_json_body() {
        let recovery = RecoveryMiddleware::new();
        let mut ctx = Context::test_default();
        recovery.fail(&mut ctx, APIError::not_found("no such user").with_details(serde_json::json!({"id": 7})));

        assert_eq!(ctx.status, 404);
        assert!(ctx.is_aborted());
        let parsed: serde_json::Value = serde_json::from_slice(&ctx.response_body).unwrap();
        assert_eq!(parsed["type"], "NOT_FOUND");
        assert_eq!(parsed["code"], 404);
        assert_eq!(parsed["details"]["id"], 7);
    }

    #[test]
    fn production_mode_hides_details() {
        let recovery = RecoveryMiddleware::new().production(true);
        let mut ctx = Context::test_default();
        recovery.fail(&mut ctx, APIError::internal("boom").with_details(serde_json::json!({"trace": "..."})));

        let parsed: serde_json::Value = serde_json::from_slice(&ctx.response_body).unwrap();
        assert!(parsed.get("details").is_none());
    }

    #[test]
    fn catches_handler_panic_as_internal_error() {
        let recovery = RecoveryMiddleware::new();
        let mut ctx = Context::test_default();
        let mut next = |_ctx: &mut Context| panic!("boom");

        recovery.handle(&mut ctx, &mut next);

        assert_eq!(ctx.status, 500);
        assert!(ctx.is_aborted());
        let parsed: serde_json::Value = serde_json::from_slice(&ctx.response_body).unwrap();
        assert_eq!(parsed["type"], "INTERNAL_ERROR");
        assert_eq!(parsed["code"], 500);
        assert_eq!(parsed["message"], "boom");
    }

    #[test]
    fn per_kind_handler_takes_priority() {
        let recovery = RecoveryMiddleware::new().on_kind(ErrorKind::Forbidden, |_err, ctx| {
            ctx.text(403, "custom forbidden body");
        });
        let mut ctx = Context::test_default();
        recovery.fail(&mut ctx, APIError::new(ErrorKind::Forbidden, "nope"));

        assert_eq!(ctx.status, 403);
        assert_eq!(ctx.response_body, b"custom forbidden body");
    }
}
