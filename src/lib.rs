// src/lib.rs
pub mod cache;
pub mod conn;
pub mod context;
pub mod contracts;
pub mod error;
pub mod extract;
pub mod http;
pub mod json;
pub mod metrics;
pub mod middleware;
pub mod parser;
pub mod path;
pub mod router;
pub mod server;
pub mod slab;
pub mod syscalls;
pub mod worker;

// Re-exports for users
pub use cache::MatchCache;
pub use context::{Context, OwnedRequest};
pub use error::{APIError, ChopinError, ChopinResult, ErrorKind, RecoveryMiddleware};
pub use extract::{FromRequest, Json, Query};
pub use http::{Method, Request, Response};
pub use middleware::{compose, FnMiddleware, Middleware};
pub use router::{Router, RouterError};
pub use server::Server;
