//! Compiled path patterns.
//!
//! A [`PathPattern`] carries two views of the same route path:
//!
//! - a **matcher** (a compiled [`Regex`]) that decides whether a request path is
//!   accepted at all, and
//! - a **segment layout** parsed from the template (`/users/:id`) that says which
//!   `/`-separated positions hold captures.
//!
//! Captured values are read from the request path by position against the layout,
//! not from the regex groups. Templates follow the familiar colon syntax:
//!
//! | Template piece    | Segment                 | Captures          |
//! |-------------------|-------------------------|-------------------|
//! | `users`           | [`Segment::Literal`]    | none              |
//! | `:id`             | [`Segment::Capture`]    | one               |
//! | `:id?`            | optional capture        | one, may be unset |
//! | `:id.:format?`    | [`Segment::Resource`]   | id + format       |
//! | `*`               | [`Segment::Wildcard`]   | none              |
//!
//! An optional capture and `*` must be the last segment. Literals match
//! ignoring ASCII case, and a trailing slash is tolerated.

use regex::Regex;

use crate::error::ConfigError;
use crate::request::Params;

/// One `/`-separated piece of a route template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Segment {
    /// Literal text, compared ignoring ASCII case.
    Literal(String),
    /// `:name` or `:name?`.
    Capture { name: String, optional: bool },
    /// `:name.:format?`: a resource id with an optional dotted format suffix,
    /// e.g. `42` or `42.json`.
    Resource { name: String, format: String },
    /// `*`: accepts the rest of the path without binding it.
    Wildcard,
}

impl Segment {
    fn parse(piece: &str, template: &str, index: usize) -> Result<Self, ConfigError> {
        if piece == "*" {
            return Ok(Self::Wildcard);
        }
        let Some(rest) = piece.strip_prefix(':') else {
            return Ok(Self::Literal(piece.to_owned()));
        };
        let unnamed = || ConfigError::UnnamedCapture { template: template.to_owned(), segment: index };

        if let Some((name, format)) = rest.split_once(".:") {
            let format = format.trim_end_matches('?');
            if name.is_empty() || format.is_empty() {
                return Err(unnamed());
            }
            return Ok(Self::Resource { name: name.to_owned(), format: format.to_owned() });
        }

        let optional = rest.ends_with('?');
        let name = rest.trim_end_matches('?');
        if name.is_empty() {
            return Err(unnamed());
        }
        Ok(Self::Capture { name: name.to_owned(), optional })
    }

    fn push_regex(&self, re: &mut String) {
        match self {
            Self::Literal(text) => {
                re.push('/');
                push_literal(re, text);
            }
            Self::Capture { optional: false, .. } => re.push_str("/([^/]+?)"),
            Self::Capture { optional: true, .. } => re.push_str("(?:/([^/]+?))?"),
            Self::Resource { .. } => re.push_str(r"/([^/]+?)(?:\.([^/.]+?))?"),
            Self::Wildcard => re.push_str("(?:/.*)?"),
        }
    }
}

/// Escapes `text`, letting ASCII letters match either case and nothing else.
/// Mirrors the `eq_ignore_ascii_case` comparison [`PathPattern::bind`] makes.
fn push_literal(re: &mut String, text: &str) {
    let mut buf = [0; 4];
    for c in text.chars() {
        if c.is_ascii_alphabetic() {
            re.push('[');
            re.push(c.to_ascii_lowercase());
            re.push(c.to_ascii_uppercase());
            re.push(']');
        } else {
            re.push_str(&regex::escape(c.encode_utf8(&mut buf)));
        }
    }
}

/// A route path: its template, segment layout and matcher.
#[derive(Clone, Debug)]
pub struct PathPattern {
    template: String,
    segments: Vec<Segment>,
    matcher: Regex,
}

impl PathPattern {
    /// Parses a template and compiles the matcher from it.
    ///
    /// ```rust
    /// use murmur::PathPattern;
    ///
    /// let p = PathPattern::parse("/users/:id").unwrap();
    /// assert!(p.accepts("/users/42"));
    /// assert!(p.accepts("/Users/42/"));
    /// assert!(!p.accepts("/users"));
    /// ```
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let segments = Self::layout(template)?;

        let mut re = String::from("^");
        for segment in &segments[1..] {
            segment.push_regex(&mut re);
            if *segment == Segment::Wildcard {
                break;
            }
        }
        re.push_str("/?$");

        let matcher = Regex::new(&re).map_err(|e| ConfigError::InvalidPattern {
            template: template.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self { template: template.to_owned(), segments, matcher })
    }

    /// Pairs a template with a matcher compiled elsewhere.
    ///
    /// The route registration layer may compile its own expressions; the template
    /// is still needed to locate captures by position.
    pub fn with_matcher(template: &str, matcher: Regex) -> Result<Self, ConfigError> {
        let segments = Self::layout(template)?;
        Ok(Self { template: template.to_owned(), segments, matcher })
    }

    fn layout(template: &str) -> Result<Vec<Segment>, ConfigError> {
        if !template.starts_with('/') {
            return Err(ConfigError::RelativeTemplate(template.to_owned()));
        }
        let segments = template
            .split('/')
            .enumerate()
            .map(|(i, piece)| Segment::parse(piece, template, i))
            .collect::<Result<Vec<_>, _>>()?;

        // An optional capture or a wildcard may only be followed by a trailing slash.
        let open_ended = |s: &Segment| matches!(s, Segment::Wildcard | Segment::Capture { optional: true, .. });
        if let Some(i) = segments.iter().position(open_ended) {
            let trailing_slash = |s: &Segment| matches!(s, Segment::Literal(text) if text.is_empty());
            if !segments[i + 1..].iter().all(trailing_slash) {
                let template = template.to_owned();
                return Err(match segments[i] {
                    Segment::Wildcard => ConfigError::WildcardNotLast { template, segment: i },
                    _ => ConfigError::OptionalNotLast { template, segment: i },
                });
            }
        }
        Ok(segments)
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of capturing groups the matcher produces.
    pub fn capture_count(&self) -> usize {
        self.matcher.captures_len() - 1
    }

    /// Capture names as written in the template, in capture order.
    pub fn capture_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Capture { name, .. } => names.push(name.clone()),
                Segment::Resource { name, format } => {
                    names.push(name.clone());
                    names.push(format.clone());
                }
                Segment::Literal(_) | Segment::Wildcard => {}
            }
        }
        names
    }

    /// Whether the matcher accepts `path` (query string already stripped).
    pub fn accepts(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// Binds `names`, left to right, to the captured positions of `path`.
    ///
    /// Returns `None` when the path does not line up with the layout: a literal
    /// segment differs or a required capture position is empty.
    pub(crate) fn bind(&self, path: &str, names: &[String]) -> Option<Params> {
        let pieces: Vec<&str> = path.split('/').collect();
        let mut names = names.iter();
        let mut params = Params::default();

        for (i, segment) in self.segments.iter().enumerate() {
            let piece = pieces.get(i).copied();
            let value = piece.filter(|p| !p.is_empty());

            match segment {
                Segment::Literal(text) => {
                    if !piece.is_some_and(|p| p.eq_ignore_ascii_case(text)) {
                        return None;
                    }
                }
                Segment::Capture { optional, .. } => {
                    let name = names.next();
                    match (name, value) {
                        (Some(name), Some(value)) => params.insert(name, value),
                        (_, None) if !optional => return None,
                        _ => {}
                    }
                }
                Segment::Resource { .. } => {
                    let (id_name, format_name) = (names.next(), names.next());
                    let value = value?;
                    let (id, format) = match value.rsplit_once('.') {
                        Some((id, format)) if !id.is_empty() && !format.is_empty() => (id, Some(format)),
                        _ => (value, None),
                    };
                    if let Some(name) = id_name {
                        params.insert(name, id);
                    }
                    if let (Some(name), Some(format)) = (format_name, format) {
                        params.insert(name, format);
                    }
                }
                Segment::Wildcard => break,
            }
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(p: &PathPattern) -> Vec<String> {
        p.capture_names()
    }

    #[test]
    fn literal_route_accepts_trailing_slash_and_any_case() {
        let p = PathPattern::parse("/route/check").unwrap();
        assert!(p.accepts("/route/check"));
        assert!(p.accepts("/route/check/"));
        assert!(p.accepts("/ROUTE/Check"));
        assert!(!p.accepts("/route/check/more"));
        assert!(!p.accepts("/wrong/path"));
        assert_eq!(p.capture_count(), 0);
    }

    #[test]
    fn captures_bind_by_position() {
        let p = PathPattern::parse("/x/:a/:b").unwrap();
        assert_eq!(p.capture_count(), 2);

        let params = p.bind("/x/1/2", &names(&p)).unwrap();
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some("2"));
    }

    #[test]
    fn binding_uses_the_supplied_names_not_the_template_names() {
        let p = PathPattern::parse("/x/:a/:b").unwrap();
        let params = p.bind("/x/1/2", &["first".into(), "second".into()]).unwrap();
        assert_eq!(params.get("first"), Some("1"));
        assert_eq!(params.get("second"), Some("2"));
        assert_eq!(params.get("a"), None);
    }

    #[test]
    fn optional_capture_may_be_absent() {
        let p = PathPattern::parse("/posts/:page?").unwrap();
        assert!(p.accepts("/posts"));
        assert!(p.accepts("/posts/3"));

        let params = p.bind("/posts", &names(&p)).unwrap();
        assert!(params.is_empty());
        let params = p.bind("/posts/3", &names(&p)).unwrap();
        assert_eq!(params.get("page"), Some("3"));
    }

    #[test]
    fn resource_segment_splits_the_format_suffix() {
        let p = PathPattern::parse("/forums/:forum.:format?").unwrap();
        assert_eq!(names(&p), ["forum", "format"]);
        assert_eq!(p.capture_count(), 2);
        assert!(p.accepts("/forums/12"));
        assert!(p.accepts("/forums/12.json"));

        let params = p.bind("/forums/12.json", &names(&p)).unwrap();
        assert_eq!(params.get("forum"), Some("12"));
        assert_eq!(params.get("format"), Some("json"));

        let params = p.bind("/forums/12", &names(&p)).unwrap();
        assert_eq!(params.get("forum"), Some("12"));
        assert_eq!(params.get("format"), None);
    }

    #[test]
    fn wildcard_accepts_everything_below() {
        let p = PathPattern::parse("/*").unwrap();
        assert!(p.accepts("/"));
        assert!(p.accepts("/anything/at/all"));
        assert_eq!(p.capture_count(), 0);
        assert!(p.bind("/anything/at/all", &[]).unwrap().is_empty());
    }

    #[test]
    fn literals_are_escaped() {
        let p = PathPattern::parse("/v1.0/items").unwrap();
        assert!(p.accepts("/v1.0/items"));
        assert!(!p.accepts("/v1x0/items"));
    }

    #[test]
    fn loose_external_matcher_is_caught_by_layout_check() {
        let p = PathPattern::with_matcher("/api/:id", Regex::new(r"^/\w+/(\w+)$").unwrap()).unwrap();
        assert!(p.accepts("/other/7"));
        assert!(p.bind("/other/7", &["id".into()]).is_none());
        assert_eq!(p.bind("/api/7", &["id".into()]).unwrap().get("id"), Some("7"));
    }

    #[test]
    fn literal_case_folding_is_ascii_only() {
        let p = PathPattern::parse("/kelvin/caf\u{e9}").unwrap();
        assert!(p.accepts("/KELVIN/caf\u{e9}"));
        assert!(!p.accepts("/\u{212A}elvin/caf\u{e9}"));
        assert!(!p.accepts("/kelvin/CAF\u{c9}"));
        assert!(p.bind("/KELVIN/caf\u{e9}", &[]).is_some());
    }

    #[test]
    fn every_accepted_path_binds() {
        let cases = [
            ("/posts/:page?", &["/posts", "/posts/", "/posts/3", "/POSTS/3/"][..]),
            ("/forums/:forum.:format?", &["/forums/1", "/forums/1.json", "/forums/a.b.c"][..]),
            ("/files/*", &["/files", "/files/a/b/c", "/Files/"][..]),
            ("/x/:a/:b", &["/x/1/2", "/X/1/2/"][..]),
        ];
        for (template, paths) in cases {
            let p = PathPattern::parse(template).unwrap();
            for path in paths {
                assert!(p.accepts(path), "{template} should accept {path}");
                assert!(p.bind(path, &names(&p)).is_some(), "{template} accepted {path} but did not bind");
            }
        }
    }

    #[test]
    fn open_ended_segments_must_come_last() {
        assert_eq!(
            PathPattern::parse("/posts/:page?/comments").unwrap_err(),
            ConfigError::OptionalNotLast { template: "/posts/:page?/comments".into(), segment: 2 }
        );
        assert_eq!(
            PathPattern::parse("/a/*/b").unwrap_err(),
            ConfigError::WildcardNotLast { template: "/a/*/b".into(), segment: 2 }
        );
        assert!(matches!(
            PathPattern::parse("/a/:b?/:c?").unwrap_err(),
            ConfigError::OptionalNotLast { segment: 2, .. }
        ));
        assert!(PathPattern::parse("/posts/:page?/").is_ok());
        assert!(PathPattern::parse("/files/*/").is_ok());
    }

    #[test]
    fn rejects_bad_templates() {
        assert_eq!(
            PathPattern::parse("users").unwrap_err(),
            ConfigError::RelativeTemplate("users".into())
        );
        assert!(matches!(
            PathPattern::parse("/users/:").unwrap_err(),
            ConfigError::UnnamedCapture { segment: 2, .. }
        ));
    }
}
