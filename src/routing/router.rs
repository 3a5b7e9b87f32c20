//! Route table and dispatch.
//!
//! # Responsibilities
//! - Store handlers keyed by method, literal prefix and parameter count
//! - Resolve a request to the most specific registered handler
//! - Fall back to the per-method default handler, or report no match
//!
//! # Design Decisions
//! - Built before the server starts and shared immutably afterwards
//! - Handlers are plain closures held in the table, not looked up by name
//! - Lookups are exact-key hash lookups; the candidate list is the only scan

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::http::request::{strip_query, Headers};
use crate::http::response::Response;
use crate::routing::pattern::{candidate_splits, RoutePattern};

/// Error returned by a failing handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler produces: a response, `None` for "not found", or an error.
pub type HandlerResult = Result<Option<Response>, HandlerError>;

/// Handler for a registered pattern, called with the body and decoded parameters.
pub type RouteHandler = Arc<dyn Fn(&[u8], &[String]) -> HandlerResult + Send + Sync>;

/// Fallback handler for a method, called with the query-less path, headers and body.
pub type DefaultHandler = Arc<dyn Fn(&str, &Headers, &[u8]) -> HandlerResult + Send + Sync>;

/// Description of a registered route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub pattern: String,
    pub method: String,
    pub description: Option<String>,
}

#[derive(Default)]
struct MethodRoutes {
    resources: HashMap<String, HashMap<usize, RouteHandler>>,
    default: Option<DefaultHandler>,
}

/// Maps `(method, path)` to handlers.
#[derive(Default)]
pub struct Router {
    table: HashMap<String, MethodRoutes>,
    routes: Vec<RouteInfo>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("routes", &self.routes).finish_non_exhaustive()
    }
}

impl Router {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `pattern` under `method`.
    ///
    /// Re-registering the same prefix and parameter count replaces the handler.
    pub fn connect<F>(&mut self, pattern: &str, method: &str, handler: F)
    where
        F: Fn(&[u8], &[String]) -> HandlerResult + Send + Sync + 'static,
    {
        self.insert(pattern, method, None, Arc::new(handler));
    }

    /// Register a handler together with a description for the docs pages.
    pub fn connect_documented<F>(&mut self, pattern: &str, method: &str, description: &str, handler: F)
    where
        F: Fn(&[u8], &[String]) -> HandlerResult + Send + Sync + 'static,
    {
        self.insert(pattern, method, Some(description.to_string()), Arc::new(handler));
    }

    fn insert(&mut self, pattern: &str, method: &str, description: Option<String>, handler: RouteHandler) {
        let RoutePattern { prefix, param_count } = RoutePattern::parse(pattern);
        tracing::debug!(%pattern, %method, %prefix, param_count, "Route registered");

        self.table
            .entry(method.to_string())
            .or_default()
            .resources
            .entry(prefix)
            .or_default()
            .insert(param_count, handler);

        self.routes.retain(|r| !(r.pattern == pattern && r.method == method));
        self.routes.push(RouteInfo {
            pattern: pattern.to_string(),
            method: method.to_string(),
            description,
        });
    }

    /// Set the handler used for `method` when no route matches.
    pub fn set_default_handler<F>(&mut self, method: &str, handler: F)
    where
        F: Fn(&str, &Headers, &[u8]) -> HandlerResult + Send + Sync + 'static,
    {
        self.table.entry(method.to_string()).or_default().default = Some(Arc::new(handler));
    }

    /// Whether a default handler is set for `method`.
    pub fn has_default_handler(&self, method: &str) -> bool {
        self.table.get(method).is_some_and(|r| r.default.is_some())
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    /// Resolve and invoke the handler for a request.
    ///
    /// `Ok(None)` means nothing matched (or the handler found nothing).
    pub fn dispatch(&self, method: &str, path: &str, headers: &Headers, body: &[u8]) -> HandlerResult {
        let Some(routes) = self.table.get(method) else {
            return Ok(None);
        };
        let path = strip_query(path);

        for candidate in candidate_splits(path) {
            let handler = routes
                .resources
                .get(&candidate.prefix)
                .and_then(|by_count| by_count.get(&candidate.param_count));
            if let Some(handler) = handler {
                tracing::trace!(prefix = %candidate.prefix, params = ?candidate.params, "Route matched");
                return handler(body, &candidate.params);
            }
        }

        match &routes.default {
            Some(default) => {
                tracing::trace!(%method, %path, "Using default handler");
                default(path, headers, body)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn body_of(result: HandlerResult) -> Option<String> {
        result
            .unwrap()
            .map(|r| String::from_utf8(r.body).unwrap())
    }

    fn get(router: &Router, path: &str) -> Option<String> {
        body_of(router.dispatch("GET", path, &Headers::new(), b""))
    }

    fn labelled(label: &'static str) -> impl Fn(&[u8], &[String]) -> HandlerResult {
        move |_, params| Ok(Some(format!("{label}{params:?}").into()))
    }

    #[test]
    fn worked_example_two_params() {
        let mut router = Router::new();
        router.connect("/items/:id/:rev", "GET", labelled("item"));
        assert_eq!(get(&router, "/items/42/3").as_deref(), Some(r#"item["42", "3"]"#));
        assert_eq!(get(&router, "/items/42"), None);
    }

    #[test]
    fn literal_route_beats_parameterised_route() {
        let mut router = Router::new();
        router.connect("/a/:x", "GET", labelled("param"));
        router.connect("/a/b", "GET", labelled("literal"));
        assert_eq!(get(&router, "/a/b").as_deref(), Some("literal[]"));
        assert_eq!(get(&router, "/a/c").as_deref(), Some(r#"param["c"]"#));
    }

    #[test]
    fn query_string_is_ignored() {
        let mut router = Router::new();
        router.connect("/echo/:msg", "GET", labelled("echo"));
        assert_eq!(get(&router, "/echo/hi?x=1&y=2").as_deref(), Some(r#"echo["hi"]"#));
    }

    #[test]
    fn params_arrive_decoded() {
        let mut router = Router::new();
        router.connect("/echo/:msg", "GET", |_, params| Ok(Some(params[0].clone().into())));
        assert_eq!(get(&router, "/echo/hello%20world").as_deref(), Some("hello world"));
    }

    #[test]
    fn trailing_slash_prefers_empty_param_then_literal() {
        let mut router = Router::new();
        router.connect("/docs", "GET", labelled("literal"));
        assert_eq!(get(&router, "/docs/").as_deref(), Some("literal[]"));

        router.connect("/docs/:page", "GET", labelled("page"));
        assert_eq!(get(&router, "/docs/").as_deref(), Some(r#"page[""]"#));
    }

    #[test]
    fn methods_are_separate() {
        let mut router = Router::new();
        router.connect("/thing", "POST", |body, _| Ok(Some(body.to_vec().into())));
        assert_eq!(get(&router, "/thing"), None);
        let posted = router.dispatch("POST", "/thing", &Headers::new(), b"payload");
        assert_eq!(body_of(posted).as_deref(), Some("payload"));
    }

    #[test]
    fn default_handler_runs_once_for_unmatched_path() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut router = Router::new();
        router.connect("/known", "GET", labelled("known"));
        router.set_default_handler("GET", move |path, _, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("default {path}").into()))
        });

        assert_eq!(get(&router, "/unknown/x?q=1").as_deref(), Some("default /unknown/x"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(get(&router, "/known").as_deref(), Some("known[]"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_route_and_no_default_yields_nothing() {
        let mut router = Router::new();
        router.connect("/known", "GET", labelled("known"));
        assert_eq!(get(&router, "/unknown"), None);
        assert!(router.dispatch("PATCH", "/known", &Headers::new(), b"").unwrap().is_none());
    }

    #[test]
    fn handler_errors_propagate() {
        let mut router = Router::new();
        router.connect("/fail", "GET", |_, _| Err("broken handler".into()));
        let err = router.dispatch("GET", "/fail", &Headers::new(), b"").unwrap_err();
        assert_eq!(err.to_string(), "broken handler");
    }

    #[test]
    fn re_registration_replaces_handler_and_route_info() {
        let mut router = Router::new();
        router.connect("/x/:a", "GET", labelled("first"));
        router.connect_documented("/x/:a", "GET", "second version", labelled("second"));
        assert_eq!(get(&router, "/x/1").as_deref(), Some(r#"second["1"]"#));
        assert_eq!(router.routes().len(), 1);
        assert_eq!(router.routes()[0].description.as_deref(), Some("second version"));
    }

    #[test]
    fn setting_default_handler_again_replaces_it() {
        let mut router = Router::new();
        router.set_default_handler("GET", |_, _, _| Ok(Some("first".into())));
        router.set_default_handler("GET", |_, _, _| Ok(Some("second".into())));
        assert!(router.has_default_handler("GET"));
        assert!(!router.has_default_handler("POST"));
        assert_eq!(get(&router, "/anything").as_deref(), Some("second"));
    }
}
