//! Static file serving for unmatched `GET` requests.
//!
//! # Responsibilities
//! - Map a URL path onto files below the configured root
//! - Enforce the include / exclude glob lists
//! - Render redirect pages and directory listings
//!
//! # Design Decisions
//! - Candidates are tried in a fixed order: `r/<index>`, `r`,
//!   `<static_dir>/r/<index>`, `<static_dir>/r`; the first allowed one that
//!   exists wins
//! - Globs follow fnmatch rules, so `*` also matches across `/`
//! - Any `..` component makes a candidate ineligible, whatever the globs say
//! - Directory listings are sorted by name

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use regex::Regex;
use thiserror::Error;

use crate::config::StaticFilesConfig;
use crate::http::response::{escape_html, Response};
use crate::routing::pattern::percent_decode;
use crate::routing::HandlerResult;

const HTML: &str = "text/html";

/// Error building the static file handler.
#[derive(Debug, Error)]
#[error("invalid file pattern '{pattern}': {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// Name and addresses shown at the foot of generated pages.
///
/// Filled in once the listeners are bound.
#[derive(Debug, Clone, Default)]
pub struct ServerSignature(Arc<OnceLock<String>>);

impl ServerSignature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the bound addresses. Only the first call has an effect.
    pub fn set_addresses<I, A>(&self, addresses: I)
    where
        I: IntoIterator<Item = A>,
        A: std::fmt::Display,
    {
        let joined = addresses.into_iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
        let _ = self.0.set(format!("{} Server at {}", server_name(), joined));
    }

    pub fn line(&self) -> String {
        self.0
            .get()
            .cloned()
            .unwrap_or_else(|| format!("{} Server", server_name()))
    }
}

fn server_name() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Serves files and directory listings below a root directory.
#[derive(Debug)]
pub struct StaticFiles {
    root: PathBuf,
    static_dir: String,
    index: String,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    signature: ServerSignature,
}

impl StaticFiles {
    pub fn from_config(config: &StaticFilesConfig, signature: ServerSignature) -> Result<Self, PatternError> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>, PatternError> {
            patterns
                .iter()
                .map(|p| {
                    let expanded = expand_placeholders(p, &config.static_dir, &config.index);
                    glob_to_regex(&expanded).map_err(|source| PatternError {
                        pattern: p.clone(),
                        source,
                    })
                })
                .collect()
        };

        Ok(Self {
            root: config.root.clone(),
            static_dir: config.static_dir.clone(),
            index: config.index.clone(),
            include: compile(&config.include)?,
            exclude: compile(&config.exclude)?,
            signature,
        })
    }

    /// Answer a `GET` for `url_path`, or `Ok(None)` when nothing is served there.
    pub fn handle(&self, url_path: &str) -> HandlerResult {
        let decoded = percent_decode(url_path);
        let relative = decoded.trim_start_matches('/');

        for candidate in self.candidates(relative) {
            if !self.is_allowed(&candidate) {
                continue;
            }
            let on_disk = self.root.join(&candidate);
            let Ok(metadata) = fs::metadata(&on_disk) else {
                continue;
            };

            tracing::debug!(url = %url_path, file = %on_disk.display(), "Serving static path");
            if metadata.is_file() {
                return Ok(Some(Response::new(fs::read(&on_disk)?)));
            }
            let page = if candidate.ends_with('/') {
                self.listing_page(&candidate, &on_disk)?
            } else {
                redirect_page(&format!("/{candidate}/"))
            };
            return Ok(Some(Response::new(page).with_content_type(HTML)));
        }
        Ok(None)
    }

    fn candidates(&self, relative: &str) -> [String; 4] {
        let index = join(relative, &self.index);
        [
            index.clone(),
            relative.to_string(),
            join(&self.static_dir, &index),
            join(&self.static_dir, relative),
        ]
    }

    /// Whether `candidate` may be served under the glob lists.
    pub fn is_allowed(&self, candidate: &str) -> bool {
        if candidate.split('/').any(|part| part == "..") {
            return false;
        }
        if self.exclude.iter().any(|re| re.is_match(candidate)) {
            return false;
        }
        self.include.iter().any(|re| re.is_match(candidate))
    }

    fn listing_page(&self, candidate: &str, dir: &Path) -> io::Result<String> {
        let mut entries: Vec<(String, SystemTime, u64)> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let Ok(metadata) = fs::metadata(entry.path()) else {
                tracing::debug!(path = %entry.path().display(), "Skipping unreadable directory entry");
                continue;
            };
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if metadata.is_dir() {
                name.push('/');
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((name, modified, metadata.len()));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let title = escape_html(&format!("/{candidate}"));
        let mut page = format!(
            "<html><head><title>Index of {title}</title></head><body><h1>Index of {title}</h1><table>\
             <tr><th valign=\"top\"></th><th>Name</th><th>Last modified</th><th>Size</th></tr>\
             <tr><th colspan=\"5\"><hr></th></tr>\
             <tr><td valign=\"top\"></td><td><a href=\"..\">Parent Directory</a></td><td>&nbsp;</td><td align=\"right\">  - </td></tr>"
        );
        for (name, modified, size) in entries {
            let href = match name.strip_suffix('/') {
                Some(dir) => format!("{}/", urlencoding::encode(dir)),
                None => urlencoding::encode(&name).into_owned(),
            };
            let modified: DateTime<Local> = modified.into();
            page.push_str(&format!(
                "<tr><td valign=\"top\"></td><td><a href=\"{}\">{}</a></td><td align=\"right\">{}</td><td align=\"right\">{}</td></tr>",
                escape_html(&href),
                escape_html(&name),
                modified.format("%Y-%m-%d %H:%M:%S"),
                format_size(size)
            ));
        }
        page.push_str(&format!(
            "<tr><th colspan=\"5\"><hr></th></tr></table><address>{}</address></body></html>",
            escape_html(&self.signature.line())
        ));
        Ok(page)
    }
}

/// Join two relative URL paths with exactly one `/`.
fn join(base: &str, tail: &str) -> String {
    if base.is_empty() || base.ends_with('/') {
        format!("{base}{tail}")
    } else {
        format!("{base}/{tail}")
    }
}

fn expand_placeholders(pattern: &str, static_dir: &str, index: &str) -> String {
    pattern.replace("{staticdir}", static_dir).replace("{staticindex}", index)
}

/// Translate an fnmatch-style glob into an anchored regex.
///
/// `*` matches any run of characters (including `/`), `?` one character,
/// `[...]` a class (`[!...]` negated). An unterminated `[` is literal.
pub fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from("(?s)^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut j = i + 1;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    out.push_str("\\[");
                } else {
                    let class = &chars[i + 1..j];
                    out.push('[');
                    match class.split_first() {
                        Some(('!', rest)) => {
                            out.push('^');
                            push_class_body(&mut out, rest);
                        }
                        _ => push_class_body(&mut out, class),
                    }
                    out.push(']');
                    i = j;
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out.push('$');
    Regex::new(&out)
}

/// Emit fnmatch class members; only `x-y` between two members is a range.
fn push_class_body(out: &mut String, class: &[char]) {
    let mut k = 0;
    while k < class.len() {
        push_class_char(out, class[k]);
        if k + 2 < class.len() && class[k + 1] == '-' {
            out.push('-');
            push_class_char(out, class[k + 2]);
            k += 3;
        } else {
            k += 1;
        }
    }
}

// `&&`, `--` and `~~` are set operators inside regex classes.
fn push_class_char(out: &mut String, c: char) {
    if matches!(c, '\\' | '[' | ']' | '^' | '&' | '-' | '~') {
        out.push('\\');
    }
    out.push(c);
}

/// Human-readable size, in the largest binary unit the size exceeds.
pub fn format_size(size: u64) -> String {
    const UNITS: [(u32, &str); 4] = [(40, "T"), (30, "G"), (20, "M"), (10, "K")];
    for (shift, unit) in UNITS {
        if size > 1 << shift {
            return format!("{:.1}{unit}", size as f64 / (1u64 << shift) as f64);
        }
    }
    size.to_string()
}

/// Page that sends the browser on to `dest`.
pub fn redirect_page(dest: &str) -> String {
    let dest = escape_html(dest);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n\
         <meta http-equiv=\"refresh\" content=\"0;URL={dest}\">\n\
         <title>Redirect</title>\n</head>\n<body>\n\
         There is no information at this page. \
         If you are not redirected to {dest} immediately, you can click <a href=\"{dest}\">here</a>.\n\
         </body>\n</html>\n"
    )
}
