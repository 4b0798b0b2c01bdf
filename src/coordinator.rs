//! The public entry points: [`Coordinator::init`] and [`Coordinator::send`].
//!
//! A coordinator owns everything it dispatches against. Build as many as you
//! like; they share nothing.

use tracing::info;

use crate::batch::{self, BatchResult};
use crate::config::Options;
use crate::dispatch::{DispatchRequest, Dispatcher};
use crate::error::{BatchError, DispatchError, Error};
use crate::handler::Stage;
use crate::middleware::Chain;
use crate::response::Outcome;
use crate::router::{RouteDescriptor, RouteTable};

/// What the route registration side hands over: route descriptors in
/// registration order and the process-wide middleware stack.
#[derive(Clone, Debug, Default)]
pub struct RouteSource {
    routes: Vec<RouteDescriptor>,
    middleware: Vec<Stage>,
}

impl RouteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }

    /// Appends a process-wide stage. Runs ahead of every route, in the order
    /// added.
    pub fn middleware(mut self, stage: Stage) -> Self {
        self.middleware.push(stage);
        self
    }
}

/// A single request or a batch.
#[derive(Clone, Debug)]
pub enum Submission {
    One(DispatchRequest),
    Many(Vec<DispatchRequest>),
}

impl From<DispatchRequest> for Submission {
    fn from(request: DispatchRequest) -> Self { Self::One(request) }
}

impl From<Vec<DispatchRequest>> for Submission {
    fn from(requests: Vec<DispatchRequest>) -> Self { Self::Many(requests) }
}

/// What [`Coordinator::send`] resolves with; mirrors the [`Submission`].
#[derive(Debug)]
pub enum Delivery {
    One(Outcome),
    Many(BatchResult),
}

impl Delivery {
    pub fn into_one(self) -> Option<Outcome> {
        match self {
            Self::One(outcome) => Some(outcome),
            Self::Many(_) => None,
        }
    }

    pub fn into_many(self) -> Option<BatchResult> {
        match self {
            Self::Many(results) => Some(results),
            Self::One(_) => None,
        }
    }
}

/// Dispatches synthetic requests in-process.
///
/// ```rust
/// use murmur::{Coordinator, DispatchRequest, Exchange, Method, Options, RouteDescriptor, RouteSource, Stage, Step};
/// use serde_json::json;
///
/// async fn check(ex: Exchange) -> Step {
///     ex.response.send("test return")
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let routes = RouteSource::new()
///     .route(RouteDescriptor::new(Method::Get, "/route/check", vec![Stage::middleware(check)]).unwrap());
/// let app = Coordinator::init(routes, Options::new());
///
/// let out = app.dispatch(DispatchRequest::new("get", "/route/check")).await.unwrap();
/// assert_eq!(out.body(), Some(&json!("test return")));
/// # }
/// ```
pub struct Coordinator {
    dispatcher: Dispatcher,
    options: Options,
}

impl Coordinator {
    /// Classifies every stage by role and freezes the route table.
    pub fn init(source: RouteSource, options: Options) -> Self {
        let table = RouteTable::new(source.routes);
        let middleware = Chain::classify(&source.middleware);
        info!(routes = table.len(), middleware = source.middleware.len(), "coordinator ready");

        let dispatcher = Dispatcher { table, middleware, timeout: options.timeout_limit() };
        Self { dispatcher, options }
    }

    /// Runs one request or a batch.
    ///
    /// A single request resolves exactly like [`dispatch`](Self::dispatch). A
    /// batch resolves like [`dispatch_batch`](Self::dispatch_batch): per-item
    /// failures sit in their slots, only malformed batch input is an `Err`.
    pub async fn send(&self, input: impl Into<Submission>) -> Result<Delivery, Error> {
        match input.into() {
            Submission::One(request) => Ok(Delivery::One(self.dispatch(request).await?)),
            Submission::Many(requests) => Ok(Delivery::Many(self.dispatch_batch(requests).await?)),
        }
    }

    /// [`send`](Self::send), reporting through a completion callback.
    pub async fn send_with<F>(&self, input: impl Into<Submission>, callback: F)
    where
        F: FnOnce(Result<Delivery, Error>),
    {
        callback(self.send(input).await);
    }

    pub async fn dispatch(&self, request: DispatchRequest) -> Result<Outcome, DispatchError> {
        self.dispatcher.dispatch(request).await
    }

    pub async fn dispatch_batch(&self, requests: Vec<DispatchRequest>) -> Result<BatchResult, BatchError> {
        batch::run(&self.dispatcher, requests, self.options.concurrency_limit()).await
    }

    pub fn routes(&self) -> &RouteTable {
        &self.dispatcher.table
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}
