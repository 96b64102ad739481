// src/router.rs
//
// PathTrie: the multi-variant routing tree (§4.1 registration, §4.2
// matching). Nodes live in a flat arena (`Vec<Node>`); children and the
// parent back-link are indices into that arena rather than owned
// pointers, per the design note in spec §9 ("arena+index representation").

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::http::Method;
use crate::middleware::Middleware;
use crate::path::{self, PathError, Segment};

pub type Handler = Arc<dyn Fn(&mut crate::context::Context) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    InvalidRoute(PathError),
    RouteConflict { method: Method, full_path: String },
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::InvalidRoute(e) => write!(f, "invalid route: {e}"),
            RouterError::RouteConflict { method, full_path } => {
                write!(f, "route conflict: {method} {full_path} is already registered")
            }
        }
    }
}

impl std::error::Error for RouterError {}

impl From<PathError> for RouterError {
    fn from(e: PathError) -> Self {
        RouterError::InvalidRoute(e)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum NodeKind {
    Static,
    Param,
    Regex,
    Wildcard,
}

struct Node {
    #[allow(dead_code)]
    kind: NodeKind,
    /// Literal segment text for `Static`; the bound name for `Param`/
    /// `Regex`/`Wildcard` (empty string for the unnamed `*`).
    segment: String,
    pattern: Option<regex::Regex>,
    #[allow(dead_code)]
    full_path: String,
    parent: Option<usize>,

    handlers: HashMap<Method, Handler>,
    middleware: Vec<Arc<dyn Middleware>>,

    static_children: HashMap<String, usize>,
    param_child: Option<usize>,
    regex_child: Option<usize>,
    wildcard_child: Option<usize>,
}

impl Node {
    fn new(kind: NodeKind, segment: String, full_path: String, parent: Option<usize>) -> Self {
        Self {
            kind,
            segment,
            pattern: None,
            full_path,
            parent,
            handlers: HashMap::new(),
            middleware: Vec::new(),
            static_children: HashMap::new(),
            param_child: None,
            regex_child: None,
            wildcard_child: None,
        }
    }
}

/// Result of a successful route match: the bound handler, the ordered
/// ancestor-to-leaf middleware (not including server-global middleware —
/// the caller in `server.rs` prepends that), and captured path
/// parameters.
pub struct RouteMatch {
    pub handler: Handler,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub params: HashMap<String, String>,
}

/// Outcome of a lookup that didn't produce a match, distinguishing "no
/// path registered" from "path registered, wrong method" so the facade
/// can choose 404 vs 405 (§4.2 step 3 / §7 category 2).
pub enum MatchOutcome {
    Matched(RouteMatch),
    NotFound,
    MethodNotAllowed,
}

/// Multi-variant routing tree, one independent root per HTTP method.
pub struct PathTrie {
    nodes: Vec<Node>,
    roots: HashMap<Method, usize>,
}

impl PathTrie {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: HashMap::new(),
        }
    }

    fn root_for(&mut self, method: Method) -> usize {
        if let Some(&idx) = self.roots.get(&method) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(Node::new(NodeKind::Static, String::new(), "/".to_string(), None));
        self.roots.insert(method, idx);
        idx
    }

    /// Register `path` under `method`, binding `handler` and any per-route
    /// `middleware` at the leaf. Fails with `InvalidRoute` if the path
    /// violates the grammar (§3) or `RouteConflict` if a handler is
    /// already bound at the same (kind-normalized) position.
    pub fn add(
        &mut self,
        method: Method,
        full_path: &str,
        handler: Handler,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), RouterError> {
        let segments = path::parse_template(full_path)?;
        let root = self.root_for(method);

        let mut current = root;
        let mut path_so_far = String::new();

        for segment in &segments {
            current = self.descend(method, current, segment, &mut path_so_far)?;
        }

        let node = &mut self.nodes[current];
        if node.handlers.contains_key(&method) {
            return Err(RouterError::RouteConflict {
                method,
                full_path: full_path.to_string(),
            });
        }
        node.handlers.insert(method, handler);
        node.middleware = middleware;
        Ok(())
    }

    fn descend(
        &mut self,
        method: Method,
        current: usize,
        segment: &Segment,
        path_so_far: &mut String,
    ) -> Result<usize, RouterError> {
        match segment {
            Segment::Static(s) => {
                path_so_far.push('/');
                path_so_far.push_str(s);
                if let Some(&idx) = self.nodes[current].static_children.get(s) {
                    return Ok(idx);
                }
                let idx = self.push_child(current, NodeKind::Static, s.clone(), path_so_far.clone());
                self.nodes[current].static_children.insert(s.clone(), idx);
                Ok(idx)
            }
            Segment::Param(name) => {
                path_so_far.push('/');
                path_so_far.push(':');
                path_so_far.push_str(name);
                if let Some(idx) = self.nodes[current].param_child {
                    // First-registered name wins; it is a local capture
                    // label, not part of the conflict check (§4.1 step 5).
                    return Ok(idx);
                }
                let idx = self.push_child(current, NodeKind::Param, name.clone(), path_so_far.clone());
                self.nodes[current].param_child = Some(idx);
                Ok(idx)
            }
            Segment::Regex { name, pattern, source } => {
                path_so_far.push('/');
                path_so_far.push('{');
                path_so_far.push_str(name);
                path_so_far.push(':');
                path_so_far.push_str(source);
                path_so_far.push('}');
                if let Some(idx) = self.nodes[current].regex_child {
                    let existing = &self.nodes[idx];
                    if existing.pattern.as_ref().map(|p| p.as_str()) != Some(pattern.as_str()) {
                        return Err(RouterError::RouteConflict {
                            method,
                            full_path: path_so_far.clone(),
                        });
                    }
                    return Ok(idx);
                }
                let idx = self.push_child(current, NodeKind::Regex, name.clone(), path_so_far.clone());
                self.nodes[idx].pattern = Some(pattern.clone());
                self.nodes[current].regex_child = Some(idx);
                Ok(idx)
            }
            Segment::Wildcard(name) => {
                path_so_far.push('/');
                path_so_far.push('*');
                if let Some(n) = name {
                    path_so_far.push_str(n);
                }
                if let Some(idx) = self.nodes[current].wildcard_child {
                    return Ok(idx);
                }
                let label = name.clone().unwrap_or_default();
                let idx = self.push_child(current, NodeKind::Wildcard, label, path_so_far.clone());
                self.nodes[current].wildcard_child = Some(idx);
                Ok(idx)
            }
        }
    }

    fn push_child(&mut self, parent: usize, kind: NodeKind, segment: String, full_path: String) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::new(kind, segment, full_path, Some(parent)));
        idx
    }

    /// Match `(method, path)` against the trie, backtracking through
    /// static > param > regex > wildcard alternatives at each level
    /// (§4.2). Parameter bindings from failed branches never leak into
    /// the final result.
    pub fn match_route(&self, method: Method, request_path: &str) -> MatchOutcome {
        let Some(&root) = self.roots.get(&method) else {
            return self.method_not_allowed_or_not_found(request_path, method);
        };

        if request_path == "/" {
            return match self.terminal(root, method) {
                Some(m) => MatchOutcome::Matched(m),
                None => self.method_not_allowed_or_not_found(request_path, method),
            };
        }

        let segments = path::split_request_path(request_path);
        let mut params = Vec::new();
        match self.descend_match(root, &segments, 0, &mut params) {
            Some(leaf) => match self.terminal_with_params(leaf, method, params) {
                Some(m) => MatchOutcome::Matched(m),
                None => self.method_not_allowed_or_not_found(request_path, method),
            },
            None => self.method_not_allowed_or_not_found(request_path, method),
        }
    }

    fn method_not_allowed_or_not_found(&self, request_path: &str, requested: Method) -> MatchOutcome {
        let segments = path::split_request_path(request_path);
        for (&method, &root) in &self.roots {
            if method == requested {
                continue;
            }
            let mut scratch = Vec::new();
            let found = if request_path == "/" {
                self.terminal(root, method).is_some()
            } else {
                self.descend_match(root, &segments, 0, &mut scratch)
                    .and_then(|leaf| self.terminal(leaf, method))
                    .is_some()
            };
            if found {
                return MatchOutcome::MethodNotAllowed;
            }
        }
        MatchOutcome::NotFound
    }

    fn terminal(&self, node_idx: usize, method: Method) -> Option<RouteMatch> {
        self.terminal_with_params(node_idx, method, Vec::new())
    }

    fn terminal_with_params(
        &self,
        node_idx: usize,
        method: Method,
        params: Vec<(String, String)>,
    ) -> Option<RouteMatch> {
        let node = &self.nodes[node_idx];
        let handler = node.handlers.get(&method).cloned()?;
        Some(RouteMatch {
            handler,
            middleware: self.collect_ancestor_middleware(node_idx),
            params: params.into_iter().collect(),
        })
    }

    /// Walk from the leaf to the root collecting per-node middleware, then
    /// reverse so execution order is root-to-leaf (§4.2 "Ancestor
    /// middleware collection").
    fn collect_ancestor_middleware(&self, mut node_idx: usize) -> Vec<Arc<dyn Middleware>> {
        let mut collected = Vec::new();
        loop {
            let node = &self.nodes[node_idx];
            collected.extend(node.middleware.iter().cloned());
            match node.parent {
                Some(p) => node_idx = p,
                None => break,
            }
        }
        collected.reverse();
        collected
    }

    fn descend_match(
        &self,
        node_idx: usize,
        segments: &[&str],
        depth: usize,
        params: &mut Vec<(String, String)>,
    ) -> Option<usize> {
        if depth == segments.len() {
            return Some(node_idx);
        }
        let segment = segments[depth];
        let node = &self.nodes[node_idx];

        // 1. Static
        if let Some(&child) = node.static_children.get(segment) {
            if let Some(leaf) = self.descend_match(child, segments, depth + 1, params) {
                return Some(leaf);
            }
        }

        // 2. Param
        if let Some(child) = node.param_child {
            let mark = params.len();
            params.push((self.nodes[child].segment.clone(), segment.to_string()));
            if let Some(leaf) = self.descend_match(child, segments, depth + 1, params) {
                return Some(leaf);
            }
            params.truncate(mark);
        }

        // 3. Regex
        if let Some(child) = node.regex_child {
            let pattern = self.nodes[child].pattern.as_ref().expect("regex child always has a pattern");
            if pattern.is_match(segment) {
                let mark = params.len();
                params.push((self.nodes[child].segment.clone(), segment.to_string()));
                if let Some(leaf) = self.descend_match(child, segments, depth + 1, params) {
                    return Some(leaf);
                }
                params.truncate(mark);
            }
        }

        // 4. Wildcard — terminal; consumes all remaining segments. There
        // is nothing past it to backtrack into, so whether this counts
        // as a match is left to the caller's terminal-handler check.
        if let Some(child) = node.wildcard_child {
            let name = &self.nodes[child].segment;
            if !name.is_empty() {
                let rest = segments[depth..].join("/");
                params.push((name.clone(), rest));
            }
            return Some(child);
        }

        None
    }
}

impl Default for PathTrie {
    fn default() -> Self {
        Self::new()
    }
}

/// Outward-facing router builder: verb shortcuts, global middleware, and
/// the match cache, wrapping a `PathTrie`. Cheap to `Clone` (everything
/// lives behind one `Arc`) so each worker thread gets its own handle to
/// the same registered routes (§5 "each worker owns an immutable `Arc`
/// clone").
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterState>,
}

struct RouterState {
    trie: std::sync::RwLock<PathTrie>,
    global_middleware: std::sync::RwLock<Vec<Arc<dyn Middleware>>>,
    cache: crate::cache::MatchCache,
}

/// What the worker loop needs for a given request: the fully composed
/// handler (global ++ ancestor ++ terminal, §4.2/§4.5) and its captured
/// params.
pub struct Resolved {
    pub handler: Handler,
    pub params: HashMap<String, String>,
}

pub enum Resolution {
    Matched(Resolved),
    NotFound,
    MethodNotAllowed,
}

impl Router {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RouterState {
                trie: std::sync::RwLock::new(PathTrie::new()),
                global_middleware: std::sync::RwLock::new(Vec::new()),
                cache: crate::cache::MatchCache::new(),
            }),
        }
    }

    /// Register server-global middleware, run before any per-route
    /// middleware and in declared order (§4.5).
    pub fn use_middleware(&self, middleware: Arc<dyn Middleware>) -> &Self {
        self.inner.global_middleware.write().unwrap().push(middleware);
        self
    }

    pub fn route(
        &self,
        method: Method,
        path: &str,
        handler: impl Fn(&mut crate::context::Context) + Send + Sync + 'static,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Result<&Self, RouterError> {
        self.inner
            .trie
            .write()
            .unwrap()
            .add(method, path, Arc::new(handler), middleware)?;
        // Any trie change invalidates previously cached lookups wholesale.
        self.inner.cache.clear();
        Ok(self)
    }

    fn verb(&self, method: Method, path: &str, handler: impl Fn(&mut crate::context::Context) + Send + Sync + 'static) -> &Self {
        self.route(method, path, handler, Vec::new())
            .unwrap_or_else(|e| panic!("route registration failed for {method} {path}: {e}"))
    }

    pub fn get(&self, path: &str, handler: impl Fn(&mut crate::context::Context) + Send + Sync + 'static) -> &Self {
        self.verb(Method::Get, path, handler)
    }
    pub fn post(&self, path: &str, handler: impl Fn(&mut crate::context::Context) + Send + Sync + 'static) -> &Self {
        self.verb(Method::Post, path, handler)
    }
    pub fn put(&self, path: &str, handler: impl Fn(&mut crate::context::Context) + Send + Sync + 'static) -> &Self {
        self.verb(Method::Put, path, handler)
    }
    pub fn delete(&self, path: &str, handler: impl Fn(&mut crate::context::Context) + Send + Sync + 'static) -> &Self {
        self.verb(Method::Delete, path, handler)
    }
    pub fn patch(&self, path: &str, handler: impl Fn(&mut crate::context::Context) + Send + Sync + 'static) -> &Self {
        self.verb(Method::Patch, path, handler)
    }
    pub fn head(&self, path: &str, handler: impl Fn(&mut crate::context::Context) + Send + Sync + 'static) -> &Self {
        self.verb(Method::Head, path, handler)
    }
    pub fn options(&self, path: &str, handler: impl Fn(&mut crate::context::Context) + Send + Sync + 'static) -> &Self {
        self.verb(Method::Options, path, handler)
    }

    pub fn enable_cache(&self, max_size: u64) {
        self.inner.cache.enable(max_size);
    }

    pub fn disable_cache(&self) {
        self.inner.cache.disable();
    }

    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.inner.cache.stats()
    }

    /// Resolve `(method, path)` into a fully composed handler, checking
    /// the match cache first (§4.3) and falling back to the trie on a
    /// miss, populating the cache for next time.
    pub fn resolve(&self, method: Method, path: &str) -> Resolution {
        if let Some(cached) = self.inner.cache.get(method, path) {
            let global = self.inner.global_middleware.read().unwrap().clone();
            let chain = [global, cached.middleware].concat();
            return Resolution::Matched(Resolved {
                handler: crate::middleware::compose(chain, cached.handler),
                params: cached.params,
            });
        }

        let outcome = self.inner.trie.read().unwrap().match_route(method, path);
        match outcome {
            MatchOutcome::Matched(m) => {
                self.inner.cache.set(method, path, &m);
                let global = self.inner.global_middleware.read().unwrap().clone();
                let chain = [global, m.middleware].concat();
                Resolution::Matched(Resolved {
                    handler: crate::middleware::compose(chain, m.handler),
                    params: m.params,
                })
            }
            MatchOutcome::NotFound => Resolution::NotFound,
            MatchOutcome::MethodNotAllowed => Resolution::MethodNotAllowed,
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn handler() -> Handler {
        Arc::new(|ctx: &mut Context| ctx.status = 200)
    }

    fn counting_handler(counter: Arc<AtomicUsize>) -> Handler {
        Arc::new(move |ctx: &mut Context| {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.status = 200;
        })
    }

    #[test]
    fn registration_totality() {
        let mut trie = PathTrie::new();
        trie.add(Method::Get, "/a/b", handler(), vec![]).unwrap();
        match trie.match_route(Method::Get, "/a/b") {
            MatchOutcome::Matched(m) => assert!(m.params.is_empty()),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn root_route() {
        let mut trie = PathTrie::new();
        trie.add(Method::Get, "/", handler(), vec![]).unwrap();
        assert!(matches!(trie.match_route(Method::Get, "/"), MatchOutcome::Matched(_)));
        assert!(matches!(trie.match_route(Method::Get, "/missing"), MatchOutcome::NotFound));
    }

    #[test]
    fn duplicate_route_same_method_conflicts() {
        let mut trie = PathTrie::new();
        trie.add(Method::Get, "/users", handler(), vec![]).unwrap();
        let err = trie.add(Method::Get, "/users", handler(), vec![]).unwrap_err();
        assert!(matches!(err, RouterError::RouteConflict { .. }));
    }

    #[test]
    fn same_path_different_methods_ok() {
        let mut trie = PathTrie::new();
        trie.add(Method::Get, "/users", handler(), vec![]).unwrap();
        trie.add(Method::Post, "/users", handler(), vec![]).unwrap();
        assert!(matches!(trie.match_route(Method::Get, "/users"), MatchOutcome::Matched(_)));
        assert!(matches!(trie.match_route(Method::Post, "/users"), MatchOutcome::Matched(_)));
    }

    #[test]
    fn regex_vs_param_priority() {
        let mut trie = PathTrie::new();
        trie.add(Method::Get, "/users/:id", handler(), vec![]).unwrap();
        trie.add(Method::Get, "/users/{id:[0-9]+}", handler(), vec![]).unwrap();

        match trie.match_route(Method::Get, "/users/42") {
            MatchOutcome::Matched(m) => assert_eq!(m.params.get("id").unwrap(), "42"),
            _ => panic!("expected match"),
        }
        match trie.match_route(Method::Get, "/users/abc") {
            MatchOutcome::Matched(m) => assert_eq!(m.params.get("id").unwrap(), "abc"),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn wildcard_consumes_remaining_segments() {
        let mut trie = PathTrie::new();
        trie.add(Method::Get, "/files/*path", handler(), vec![]).unwrap();
        match trie.match_route(Method::Get, "/files/a/b/c") {
            MatchOutcome::Matched(m) => assert_eq!(m.params.get("path").unwrap(), "a/b/c"),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn static_beats_param() {
        let mut trie = PathTrie::new();
        trie.add(Method::Get, "/api/static", handler(), vec![]).unwrap();
        trie.add(Method::Get, "/api/:name", handler(), vec![]).unwrap();

        match trie.match_route(Method::Get, "/api/static") {
            MatchOutcome::Matched(m) => assert!(m.params.is_empty()),
            _ => panic!("expected static match"),
        }
        match trie.match_route(Method::Get, "/api/users") {
            MatchOutcome::Matched(m) => assert_eq!(m.params.get("name").unwrap(), "users"),
            _ => panic!("expected param match"),
        }
    }

    #[test]
    fn method_not_allowed_vs_not_found() {
        let mut trie = PathTrie::new();
        trie.add(Method::Get, "/users", handler(), vec![]).unwrap();
        assert!(matches!(trie.match_route(Method::Post, "/users"), MatchOutcome::MethodNotAllowed));
        assert!(matches!(trie.match_route(Method::Get, "/nope"), MatchOutcome::NotFound));
    }

    #[test]
    fn failed_subtree_does_not_leak_params() {
        let mut trie = PathTrie::new();
        // Only a POST handler lives under the param branch; GET must fail
        // over past it without leaving "id" bound anywhere visible.
        trie.add(Method::Post, "/users/:id", handler(), vec![]).unwrap();
        trie.add(Method::Get, "/users/:id/profile", handler(), vec![]).unwrap();

        match trie.match_route(Method::Get, "/users/42/profile") {
            MatchOutcome::Matched(m) => {
                assert_eq!(m.params.len(), 1);
                assert_eq!(m.params.get("id").unwrap(), "42");
            }
            _ => panic!("expected match"),
        }
        assert!(matches!(trie.match_route(Method::Get, "/users/42"), MatchOutcome::MethodNotAllowed));
    }

    #[test]
    fn conflicting_regex_patterns_reject() {
        let mut trie = PathTrie::new();
        trie.add(Method::Get, "/items/{id:[0-9]+}", handler(), vec![]).unwrap();
        let err = trie.add(Method::Get, "/items/{id:[a-z]+}", handler(), vec![]).unwrap_err();
        assert!(matches!(err, RouterError::RouteConflict { .. }));
    }

    #[test]
    fn invalid_route_rejected_at_registration() {
        let mut trie = PathTrie::new();
        let err = trie.add(Method::Get, "users", handler(), vec![]).unwrap_err();
        assert!(matches!(err, RouterError::InvalidRoute(_)));
    }

    #[test]
    fn middleware_collected_root_to_leaf() {
        use crate::middleware::FnMiddleware;

        let order: Arc<std::sync::Mutex<Vec<&'static str>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

        let o1 = order.clone();
        let m1: Arc<dyn Middleware> = Arc::new(FnMiddleware::new(move |ctx, next| {
            o1.lock().unwrap().push("m1-before");
            next(ctx);
            o1.lock().unwrap().push("m1-after");
        }));

        let o2 = order.clone();
        let m2: Arc<dyn Middleware> = Arc::new(FnMiddleware::new(move |ctx, next| {
            o2.lock().unwrap().push("m2-before");
            next(ctx);
            o2.lock().unwrap().push("m2-after");
        }));

        let counter = Arc::new(AtomicUsize::new(0));
        let mut trie = PathTrie::new();
        trie.add(Method::Get, "/a", handler(), vec![m1]).unwrap();
        trie.add(Method::Get, "/a/b", counting_handler(counter.clone()), vec![m2]).unwrap();

        let m = match trie.match_route(Method::Get, "/a/b") {
            MatchOutcome::Matched(m) => m,
            _ => panic!("expected match"),
        };
        assert_eq!(m.middleware.len(), 2);

        let mut ctx = Context::test_default();
        let chain = crate::middleware::compose(m.middleware, m.handler);
        chain(&mut ctx);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(*order.lock().unwrap(), vec!["m1-before", "m2-before", "m2-after", "m1-after"]);
    }
}

#[cfg(test)]
mod router_facade_tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn resolve_runs_global_then_route_middleware() {
        let order: Arc<std::sync::Mutex<Vec<&'static str>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

        let o1 = order.clone();
        let global: Arc<dyn Middleware> = Arc::new(crate::middleware::FnMiddleware::new(move |ctx, next| {
            o1.lock().unwrap().push("global");
            next(ctx);
        }));
        let o2 = order.clone();
        let route_mw: Arc<dyn Middleware> = Arc::new(crate::middleware::FnMiddleware::new(move |ctx, next| {
            o2.lock().unwrap().push("route");
            next(ctx);
        }));

        let router = Router::new();
        router.use_middleware(global);
        router
            .route(Method::Get, "/ping", |ctx: &mut Context| ctx.status = 200, vec![route_mw])
            .unwrap();

        match router.resolve(Method::Get, "/ping") {
            Resolution::Matched(resolved) => {
                let mut ctx = Context::test_default();
                (resolved.handler)(&mut ctx);
                assert_eq!(ctx.status, 200);
            }
            _ => panic!("expected match"),
        }
        assert_eq!(*order.lock().unwrap(), vec!["global", "route"]);
    }

    #[test]
    fn resolve_not_found_and_method_not_allowed() {
        let router = Router::new();
        router.get("/users", |ctx: &mut Context| ctx.status = 200);

        assert!(matches!(router.resolve(Method::Get, "/missing"), Resolution::NotFound));
        assert!(matches!(router.resolve(Method::Post, "/users"), Resolution::MethodNotAllowed));
    }

    #[test]
    fn resolve_uses_cache_on_second_lookup() {
        let router = Router::new();
        router.enable_cache(10);
        router.get("/users", |ctx: &mut Context| ctx.status = 200);

        assert!(matches!(router.resolve(Method::Get, "/users"), Resolution::Matched(_)));
        assert!(matches!(router.resolve(Method::Get, "/users"), Resolution::Matched(_)));

        let stats = router.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn route_registration_invalidates_cache() {
        let router = Router::new();
        router.enable_cache(10);
        router.get("/users", |ctx: &mut Context| ctx.status = 200);
        router.resolve(Method::Get, "/users");
        assert_eq!(router.cache_stats().size, 1);

        router.get("/posts", |ctx: &mut Context| ctx.status = 200);
        assert_eq!(router.cache_stats().size, 0);
    }
}
