//! Builds the request/response pair a chain runs against.
//!
//! Mirrors what a live transport would have produced for the same request:
//! the query string is split into a flat map, a textual body is decoded as
//! JSON, and a `host` header is filled in. Session and flash start empty.

use std::collections::HashMap;

use http::header::{HOST, HeaderName, HeaderValue};
use http::HeaderMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{DispatchError, StageError};
use crate::method::Method;
use crate::request::{Flash, Params, Session, SyntheticRequest};
use crate::response::{Flow, Step, SyntheticResponse};

/// The body of a synthetic request as the caller supplies it.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DispatchBody {
    #[default]
    Empty,
    /// Raw text, decoded as JSON when non-empty.
    Text(String),
    /// Already structured; passed through untouched.
    Json(Value),
}

impl From<&str> for DispatchBody {
    fn from(text: &str) -> Self { Self::Text(text.to_owned()) }
}

impl From<String> for DispatchBody {
    fn from(text: String) -> Self { Self::Text(text) }
}

impl From<Value> for DispatchBody {
    fn from(value: Value) -> Self { Self::Json(value) }
}

/// Values seeded into the synthetic request before the chain runs.
#[derive(Clone, Debug, Default)]
pub struct RequestOverrides {
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
    pub(crate) locals: Map<String, Value>,
}

impl RequestOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header. `host` is always replaced by the request path.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Seeds a value into [`SyntheticRequest::locals`].
    pub fn local(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(key.into(), value.into());
        self
    }
}

/// The pair every stage receives and hands on.
#[derive(Debug)]
pub struct Exchange {
    pub request: SyntheticRequest,
    pub response: SyntheticResponse,
}

impl Exchange {
    pub(crate) fn new(request: SyntheticRequest) -> Self {
        Self { request, response: SyntheticResponse::new() }
    }

    /// Proceed to the next stage.
    pub fn next(self) -> Step {
        Step(Flow::Next(self))
    }

    /// Proceed with an error: skips the remaining normal stages and hands
    /// `err` to the error-handling stages.
    pub fn fail(self, err: impl Into<StageError>) -> Step {
        Step(Flow::Fail(self, err.into()))
    }
}

/// Everything about a request that is known before any route is bound.
pub(crate) struct Seed {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) body: DispatchBody,
    pub(crate) identity: Option<Value>,
    pub(crate) overrides: RequestOverrides,
}

impl Seed {
    /// Builds the synthetic request. Fails only if the body does not decode.
    pub(crate) fn build(self) -> Result<SyntheticRequest, DispatchError> {
        let body = decode_body(self.body)?;
        let (base, query) = split_url(&self.url);
        let query = parse_query(query);

        let mut headers = HeaderMap::new();
        for (name, value) in self.overrides.headers {
            headers.append(name, value);
        }
        match HeaderValue::from_str(base) {
            Ok(host) => {
                headers.insert(HOST, host);
            }
            Err(e) => debug!(path = base, "no host header: {e}"),
        }

        Ok(SyntheticRequest {
            url: self.url,
            method: self.method,
            headers,
            query,
            body,
            params: Params::default(),
            identity: self.identity,
            session: Session::new(),
            flash: Flash::default(),
            locals: self.overrides.locals,
        })
    }
}

/// Splits a path into its base and its query string.
pub(crate) fn split_url(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    }
}

fn decode_body(body: DispatchBody) -> Result<Value, DispatchError> {
    match body {
        DispatchBody::Empty => Ok(Value::Null),
        DispatchBody::Json(value) => Ok(value),
        DispatchBody::Text(text) if text.is_empty() => Ok(Value::String(text)),
        DispatchBody::Text(text) => serde_json::from_str(&text).map_err(|e| {
            warn!("body is not valid JSON: {e}");
            DispatchError::BodyParse(e.to_string())
        }),
    }
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return HashMap::new();
    };
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => pairs.into_iter().collect(),
        Err(e) => {
            warn!(query, "unreadable query string: {e}");
            HashMap::new()
        }
    }
}
