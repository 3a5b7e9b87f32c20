//! Route documentation pages.
//!
//! `GET /docs/` lists every registered route as an HTML table and
//! `GET /docs/json/` returns the same list as JSON.

use std::sync::Arc;

use crate::http::response::{escape_html, Response};
use crate::routing::{RouteInfo, Router};

pub const DOCS_PATH: &str = "/docs/";
pub const DOCS_JSON_PATH: &str = "/docs/json/";

/// Register both docs routes on `router`.
///
/// The listing is taken now, so call this after all other routes are connected.
pub fn install(router: &mut Router) {
    let mut listed = router.routes().to_vec();
    listed.retain(|r| !(r.method == "GET" && (r.pattern == DOCS_PATH || r.pattern == DOCS_JSON_PATH)));
    listed.push(RouteInfo {
        pattern: DOCS_PATH.to_string(),
        method: "GET".to_string(),
        description: Some("This page, as HTML".to_string()),
    });
    listed.push(RouteInfo {
        pattern: DOCS_JSON_PATH.to_string(),
        method: "GET".to_string(),
        description: Some("This page, as JSON".to_string()),
    });
    let listed = Arc::new(listed);

    let html = Arc::clone(&listed);
    router.connect_documented(DOCS_PATH, "GET", "This page, as HTML", move |_, _| {
        Ok(Some(Response::new(render_html(&html)).with_content_type("text/html")))
    });
    router.connect_documented(DOCS_JSON_PATH, "GET", "This page, as JSON", move |_, _| {
        let body = serde_json::to_vec(listed.as_slice())?;
        Ok(Some(Response::new(body).with_content_type("application/json")))
    });
    tracing::debug!(routes = router.routes().len(), "Documentation pages installed");
}

fn render_html(routes: &[RouteInfo]) -> String {
    let rows: String = routes
        .iter()
        .map(|route| {
            let pattern = escape_html(&route.pattern);
            let description = match &route.description {
                Some(text) => escape_html(text).replace('\n', "<br />"),
                None => "&lt;No docs provided!&gt;".to_string(),
            };
            format!(
                "<tr><td><a href=\"{pattern}\">{pattern}</a></td><td>{}</td><td>{description}</td></tr>\n",
                escape_html(&route.method)
            )
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n<html><head><title>{} Web Documentation</title></head><body>\n\
         <table border=\"1\">\n<tr><th>Resource</th><th>Method</th><th>Description</th></tr>\n\
         {rows}</table>\n</body></html>\n",
        env!("CARGO_PKG_NAME")
    )
}
