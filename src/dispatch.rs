//! One logical request, end to end.
//!
//! ```text
//! DispatchRequest ─► RouteTable::lookup ─► bind params ─► build context ─► run chain ─► Outcome
//!                         │                    │               │                │
//!                   RouteNotFound        PathMismatch      BodyParse    Chain / Unanswered / Timeout
//! ```
//!
//! The first three failures are reported before any stage runs.

use std::time::Duration;

use serde_json::Value;
use tracing::{Instrument, debug, debug_span, warn};

use crate::context::{DispatchBody, Exchange, RequestOverrides, Seed, split_url};
use crate::error::DispatchError;
use crate::middleware::{self, Bound, Chain};
use crate::response::Outcome;
use crate::router::RouteTable;

/// The caller's description of one synthetic request.
///
/// ```rust
/// use murmur::DispatchRequest;
/// use serde_json::json;
///
/// let req = DispatchRequest::new("post", "/users?notify=1")
///     .body(r#"{"name":"alice"}"#)
///     .identity(json!({"id": 7}))
///     .sequence(0);
/// ```
#[derive(Clone, Debug)]
pub struct DispatchRequest {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) body: DispatchBody,
    pub(crate) identity: Option<Value>,
    pub(crate) sequence: Option<usize>,
    pub(crate) overrides: RequestOverrides,
}

impl DispatchRequest {
    /// `method` in any case; `path` may carry a query string.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            body: DispatchBody::Empty,
            identity: None,
            sequence: None,
            overrides: RequestOverrides::default(),
        }
    }

    /// Raw text (decoded as JSON) or an already structured value.
    pub fn body(mut self, body: impl Into<DispatchBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Attached to the request verbatim.
    pub fn identity(mut self, identity: impl Into<Value>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Placement of this item's result within a batch.
    pub fn sequence(mut self, index: usize) -> Self {
        self.sequence = Some(index);
        self
    }

    pub fn overrides(mut self, overrides: RequestOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn sequence_hint(&self) -> Option<usize> {
        self.sequence
    }
}

/// Routes and runs single requests against a shared, read-only table.
pub(crate) struct Dispatcher {
    pub(crate) table: RouteTable,
    pub(crate) middleware: Chain,
    pub(crate) timeout: Option<Duration>,
}

impl Dispatcher {
    pub(crate) async fn dispatch(&self, input: DispatchRequest) -> Result<Outcome, DispatchError> {
        let span = debug_span!("dispatch", method = %input.method, path = %input.path);
        self.dispatch_inner(input).instrument(span).await
    }

    async fn dispatch_inner(&self, input: DispatchRequest) -> Result<Outcome, DispatchError> {
        let routes = self.table.lookup(&input.method, &input.path);
        if routes.is_empty() {
            warn!("no route matches");
            return Err(DispatchError::RouteNotFound { method: input.method, path: input.path });
        }

        let (base, _) = split_url(&input.path);
        let bound = routes
            .iter()
            .map(|&route| route.descriptor.bind(base).map(move |params| Bound { chain: &route.chain, params }))
            .collect::<Result<Vec<_>, _>>()?;

        // Every route in `routes` parsed this method, so this cannot miss.
        let method = routes[0].descriptor.method();
        let request = Seed {
            method,
            url: input.path,
            body: input.body,
            identity: input.identity,
            overrides: input.overrides,
        }
        .build()?;

        debug!(routes = bound.len(), "running chain");
        let run = middleware::run(&self.middleware, bound, Exchange::new(request));
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                warn!(?limit, "dispatch stalled");
                DispatchError::Timeout(limit)
            })?,
            None => run.await,
        }
    }
}
