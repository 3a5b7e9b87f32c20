//! Parsed request representation.
//!
//! # Responsibilities
//! - Hold the request line, headers and body produced by the framer
//! - Answer header lookups for the router and handlers
//!
//! # Design Decisions
//! - Headers keep arrival order; the first occurrence of a name wins
//! - Header names match ASCII case-insensitively, values are kept verbatim

/// Ordered request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a header block of `Name: Value` lines separated by CRLF.
    ///
    /// Lines without a `": "` separator are ignored.
    pub fn parse(block: &str) -> Self {
        let mut headers = Self::new();
        for line in block.split("\r\n") {
            if let Some((name, value)) = line.split_once(": ") {
                headers.insert(name, value);
            }
        }
        headers
    }

    /// Add a header unless one with the same name is already present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if self.get(&name).is_none() {
            self.entries.push((name, value.into()));
        }
    }

    /// Look up a header value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterate headers in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A request read off one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Method token exactly as sent, e.g. `GET`.
    pub method: String,
    /// Request target as sent, including any query string.
    pub path: String,
    /// Protocol version token, absent for `METHOD PATH` request lines.
    pub version: Option<String>,
    pub headers: Headers,
    /// Body of exactly `Content-Length` bytes, or empty.
    pub body: Vec<u8>,
}

impl Request {
    /// The request path with everything from the first `?` removed.
    pub fn path_without_query(&self) -> &str {
        strip_query(&self.path)
    }
}

/// Remove everything from the first `?` onward.
pub fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(before, _)| before)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_first_value_and_order() {
        let headers = Headers::parse("Host: a\r\nX-Dup: one\r\nAccept: */*\r\nX-Dup: two");
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("x-dup"), Some("one"));
        let names: Vec<_> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["Host", "X-Dup", "Accept"]);
    }

    #[test]
    fn parse_splits_on_first_separator_only() {
        let headers = Headers::parse("Referer: http://x: y\r\nbroken-line\r\nNoSpace:value");
        assert_eq!(headers.get("Referer"), Some("http://x: y"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let headers = Headers::parse("content-length: 12");
        assert_eq!(headers.get("Content-Length"), Some("12"));
        assert_eq!(headers.get("Content-Type"), None);
    }

    #[test]
    fn strip_query_removes_from_first_question_mark() {
        assert_eq!(strip_query("/a/b?x=1?y=2"), "/a/b");
        assert_eq!(strip_query("/plain"), "/plain");
        assert_eq!(strip_query("?only"), "");
    }
}
