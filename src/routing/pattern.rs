//! Route pattern parsing and candidate path splits.
//!
//! # Responsibilities
//! - Turn a registered pattern into a literal prefix and a parameter count
//! - Enumerate the ways a request path can be read as prefix + parameters
//!
//! # Design Decisions
//! - Parameters are positional: only their count is part of a route's key
//! - Candidates run from most to least specific (fewest parameters first)
//! - Parameters are percent-decoded lossily, decoding never fails

/// Delimiter introducing a positional parameter in a pattern.
pub const PARAM_DELIMITER: &str = "/:";

/// A registered pattern reduced to its lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePattern {
    pub prefix: String,
    pub param_count: usize,
}

impl RoutePattern {
    /// Split `pattern` on [`PARAM_DELIMITER`].
    ///
    /// `/items/:id/:rev` becomes prefix `/items` with two parameters.
    pub fn parse(pattern: &str) -> Self {
        let mut parts = pattern.split(PARAM_DELIMITER);
        let prefix = parts.next().unwrap_or_default().to_string();
        Self {
            prefix,
            param_count: parts.count(),
        }
    }
}

/// One way of reading a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub prefix: String,
    pub param_count: usize,
    /// Decoded parameter values, in path order.
    pub params: Vec<String>,
}

impl Candidate {
    fn new(prefix: &str, raw_params: &[&str]) -> Self {
        Self {
            prefix: prefix.to_string(),
            param_count: raw_params.len(),
            params: raw_params.iter().map(|p| percent_decode(p)).collect(),
        }
    }
}

/// Enumerate candidate splits of `path`, most specific first.
///
/// Starting from the whole path with no parameters, the last segment moves
/// from the prefix into the parameters until the prefix is empty. When the
/// prefix plus `/` is exactly the path, a variant that drops the trailing
/// empty parameter is also tried, so `/a/` can reach a route registered as `/a`.
pub fn candidate_splits(path: &str) -> Vec<Candidate> {
    let segments: Vec<&str> = path.split('/').collect();
    let mut candidates = Vec::with_capacity(segments.len() + 1);

    for keep in (1..=segments.len()).rev() {
        let prefix = segments[..keep].join("/");
        let params = &segments[keep..];

        if !params.is_empty() && prefix.len() + 1 == path.len() && path.ends_with('/') {
            candidates.push(Candidate::new(&prefix, params));
            candidates.push(Candidate::new(&prefix, &params[..params.len() - 1]));
        } else {
            candidates.push(Candidate::new(&prefix, params));
        }
    }
    candidates
}

/// Percent-decode a path segment, replacing invalid UTF-8.
pub fn percent_decode(segment: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned()
}
