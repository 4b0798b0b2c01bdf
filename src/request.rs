//! Synthetic request type.
//!
//! What a stage sees instead of a request parsed off a socket. One is built per
//! dispatch and dropped when the dispatch settles; nothing in it is shared with
//! any other dispatch.

use std::collections::HashMap;

use http::HeaderMap;
use serde_json::{Map, Value};

use crate::method::Method;

/// Session stand-in. Starts empty on every dispatch and is never persisted.
pub type Session = Map<String, Value>;

/// Path parameters in capture order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// Binds `name`, replacing an earlier binding of the same name in place.
    pub(crate) fn insert(&mut self, name: &str, value: &str) {
        match self.0.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => value.clone_into(&mut slot.1),
            None => self.0.push((name.to_owned(), value.to_owned())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Flash stand-in. Records messages so stages can read them back within the
/// same dispatch; nothing survives the dispatch.
#[derive(Clone, Debug, Default)]
pub struct Flash {
    messages: Vec<(String, String)>,
}

impl Flash {
    pub fn push(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        self.messages.push((kind.into(), message.into()));
    }

    /// Messages of one kind, oldest first.
    pub fn messages<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.messages.iter().filter(move |(k, _)| k == kind).map(|(_, m)| m.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// The request handed to every stage of one dispatch.
#[derive(Debug)]
pub struct SyntheticRequest {
    pub(crate) url: String,
    pub(crate) method: Method,
    pub(crate) headers: HeaderMap,
    pub(crate) query: HashMap<String, String>,
    pub(crate) body: Value,
    pub(crate) params: Params,
    pub(crate) identity: Option<Value>,
    pub(crate) session: Session,
    pub(crate) flash: Flash,
    pub(crate) locals: Map<String, Value>,
}

impl SyntheticRequest {
    /// The path as supplied by the caller, query string included.
    pub fn url(&self) -> &str { &self.url }
    pub fn method(&self) -> Method { self.method }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn query(&self) -> &HashMap<String, String> { &self.query }
    pub fn body(&self) -> &Value { &self.body }
    pub fn params(&self) -> &Params { &self.params }

    /// The caller-supplied identity, exactly as given.
    pub fn identity(&self) -> Option<&Value> { self.identity.as_ref() }

    pub fn session(&self) -> &Session { &self.session }
    pub fn session_mut(&mut self) -> &mut Session { &mut self.session }
    pub fn flash(&self) -> &Flash { &self.flash }
    pub fn flash_mut(&mut self) -> &mut Flash { &mut self.flash }

    /// Scratch space for stages to hand values to later stages.
    pub fn locals(&self) -> &Map<String, Value> { &self.locals }
    pub fn locals_mut(&mut self) -> &mut Map<String, Value> { &mut self.locals }

    /// The path without its query string.
    pub fn path(&self) -> &str {
        self.url.split_once('?').map_or(self.url.as_str(), |(path, _)| path)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Looks `name` up in the path params, then the query, then the body, and
    /// falls back to `default`.
    ///
    /// Empty strings and `null` count as missing at every level.
    ///
    /// ```rust,ignore
    /// // GET /users/42?sort=asc  with body {"limit": 10}
    /// req.param("id", Value::Null);    // "42"
    /// req.param("sort", Value::Null);  // "asc"
    /// req.param("limit", 20);          // 10
    /// req.param("page", 1);            // 1
    /// ```
    pub fn param(&self, name: &str, default: impl Into<Value>) -> Value {
        if let Some(v) = self.params.get(name).filter(|v| !v.is_empty()) {
            return Value::from(v);
        }
        if let Some(v) = self.query.get(name).filter(|v| !v.is_empty()) {
            return Value::from(v.as_str());
        }
        match self.body.get(name) {
            Some(Value::Null) | None => default.into(),
            Some(Value::String(s)) if s.is_empty() => default.into(),
            Some(v) => v.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(params: &[(&str, &str)], query: &[(&str, &str)], body: Value) -> SyntheticRequest {
        let mut p = Params::default();
        for (k, v) in params {
            p.insert(k, v);
        }
        SyntheticRequest {
            url: "/users/42?sort=asc".into(),
            method: Method::Get,
            headers: HeaderMap::new(),
            query: query.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect(),
            body,
            params: p,
            identity: None,
            session: Session::new(),
            flash: Flash::default(),
            locals: Map::new(),
        }
    }

    #[test]
    fn param_prefers_path_then_query_then_body() {
        let req = request(&[("id", "42")], &[("id", "q"), ("sort", "asc")], json!({"id": 7, "sort": "desc", "limit": 10}));
        assert_eq!(req.param("id", Value::Null), json!("42"));
        assert_eq!(req.param("sort", Value::Null), json!("asc"));
        assert_eq!(req.param("limit", 20), json!(10));
        assert_eq!(req.param("page", 1), json!(1));
    }

    #[test]
    fn empty_values_fall_through() {
        let req = request(&[("id", "")], &[("id", "")], json!({"id": ""}));
        assert_eq!(req.param("id", "fallback"), json!("fallback"));
    }

    #[test]
    fn non_object_body_is_skipped() {
        let req = request(&[], &[], json!("plain text"));
        assert_eq!(req.param("anything", false), json!(false));
    }

    #[test]
    fn path_strips_the_query() {
        let req = request(&[], &[], Value::Null);
        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.url(), "/users/42?sort=asc");
    }

    #[test]
    fn params_replace_in_place() {
        let mut p = Params::default();
        p.insert("a", "1");
        p.insert("b", "2");
        p.insert("a", "3");
        assert_eq!(p.iter().collect::<Vec<_>>(), [("a", "3"), ("b", "2")]);
    }

    #[test]
    fn flash_filters_by_kind() {
        let mut flash = Flash::default();
        flash.push("info", "saved");
        flash.push("error", "nope");
        flash.push("info", "again");
        assert_eq!(flash.messages("info").collect::<Vec<_>>(), ["saved", "again"]);
    }
}
