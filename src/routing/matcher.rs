//! Path pattern matching.
//!
//! # Responsibilities
//! - Split a route pattern into literal text and `{name}` placeholders
//! - Build an anchored regex matcher for placeholder-bearing patterns
//! - Bind captured segments to placeholder names
//!
//! # Design Decisions
//! - A placeholder matches one or more characters excluding `/`
//! - Literal text is escaped, so `.` or `+` in a pattern match themselves
//! - The regex is compiled on first use and cached for the pattern's lifetime
//! - Patterns are stored verbatim; no normalization at registration

use std::sync::{LazyLock, OnceLock};

use regex::Regex;

/// Recognizes `{name}` placeholders inside a pattern string.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^/}]+)\}").expect("placeholder regex is valid"));

/// Path-parameter bindings for one matched request.
///
/// Entries keep the order in which placeholders appear in the pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Value bound to `name`. A name repeated in the pattern resolves to its last capture.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A route pattern such as `/api/users/{id}`.
#[derive(Debug)]
pub struct PathPattern {
    source: String,
    names: Vec<String>,
    matcher: OnceLock<Option<Regex>>,
}

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let names = PLACEHOLDER
            .captures_iter(&source)
            .map(|caps| caps[1].to_string())
            .collect();

        Self {
            source,
            names,
            matcher: OnceLock::new(),
        }
    }

    /// The pattern exactly as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Placeholder names in pattern order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_placeholders(&self) -> bool {
        !self.names.is_empty()
    }

    /// Match a normalized path against the whole pattern.
    ///
    /// Literal patterns never match here; they are only reachable through exact lookup.
    pub fn captures(&self, path: &str) -> Option<Params> {
        let regex = self.matcher()?;
        let caps = regex.captures(path)?;

        let mut params = Params::new();
        for (index, name) in self.names.iter().enumerate() {
            let value = caps.get(index + 1)?;
            params.push(name.clone(), value.as_str());
        }
        Some(params)
    }

    fn matcher(&self) -> Option<&Regex> {
        self.matcher
            .get_or_init(|| {
                if !self.has_placeholders() {
                    return None;
                }
                match Regex::new(&to_regex(&self.source)) {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        tracing::error!(pattern = %self.source, error = %e, "Failed to compile route pattern");
                        None
                    }
                }
            })
            .as_ref()
    }
}

/// Translate a pattern into an anchored regex source string.
fn to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 16);
    out.push('^');

    let mut last = 0;
    for m in PLACEHOLDER.find_iter(pattern) {
        out.push_str(&regex::escape(&pattern[last..m.start()]));
        out.push_str("([^/]+)");
        last = m.end();
    }
    out.push_str(&regex::escape(&pattern[last..]));

    out.push('$');
    out
}
