//! # murmur
//!
//! Call your registered routes without a socket.
//!
//! murmur takes a route table and a middleware stack that already exist, and
//! runs synthetic requests through them in-process. It matches the route, builds
//! a request/response pair shaped like what a live transport would produce, walks
//! the middleware and handler stages one at a time, and hands back whatever the
//! handler answered with.
//!
//! ## The contract
//!
//! What murmur does:
//!
//! - **Route matching** against an ordered table, every overlapping match in
//!   registration order
//! - **Positional params** bound from the matched template
//! - **Sequential stages** with short-circuit on terminal actions and a separate
//!   error-handling chain
//! - **Batches** dispatched concurrently, results placed by `sequence`
//!
//! What murmur leaves to someone else: route registration syntax, view
//! rendering (a render is recorded, not performed), session storage, real
//! network I/O, authentication (an identity is passed through as given).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use murmur::{Coordinator, DispatchRequest, Exchange, Method, Options, RouteDescriptor, RouteSource, Stage, StageError, Step};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let routes = RouteSource::new()
//!         .middleware(Stage::middleware(require_user))
//!         .middleware(Stage::error_handler(unauthorized))
//!         .route(RouteDescriptor::new(Method::Get, "/users/:id", vec![Stage::middleware(get_user)])?);
//!
//!     let app = Coordinator::init(routes, Options::new());
//!
//!     let one = app.dispatch(DispatchRequest::new("get", "/users/42").identity("alice")).await?;
//!     println!("{one:?}");
//!
//!     let many = app
//!         .dispatch_batch(vec![
//!             DispatchRequest::new("get", "/users/1").identity("alice").sequence(1),
//!             DispatchRequest::new("get", "/users/2").identity("alice").sequence(0),
//!         ])
//!         .await?;
//!     println!("{:?}", many.get(0));
//!     Ok(())
//! }
//!
//! async fn require_user(ex: Exchange) -> Step {
//!     if ex.request.identity().is_none() {
//!         return ex.fail("not signed in");
//!     }
//!     ex.next()
//! }
//!
//! async fn unauthorized(err: StageError, ex: Exchange) -> Step {
//!     ex.response.redirect(format!("/login?reason={err}"))
//! }
//!
//! async fn get_user(ex: Exchange) -> Step {
//!     let id = ex.request.param("id", serde_json::Value::Null);
//!     ex.response.send(serde_json::json!({ "id": id }))
//! }
//! ```

mod batch;
mod config;
mod context;
mod coordinator;
mod dispatch;
mod error;
mod handler;
mod method;
mod middleware;
mod pattern;
mod request;
mod response;
mod router;

pub use batch::{BatchResult, BatchSlot, MAX_SEQUENCE_GAP};
pub use config::Options;
pub use context::{DispatchBody, Exchange, RequestOverrides};
pub use coordinator::{Coordinator, Delivery, RouteSource, Submission};
pub use dispatch::DispatchRequest;
pub use error::{BatchError, BatchItemError, ConfigError, DispatchError, Error, StageError};
pub use handler::{ErrorMiddleware, Middleware, Role, Stage};
pub use method::Method;
pub use pattern::{PathPattern, Segment};
pub use request::{Flash, Params, Session, SyntheticRequest};
pub use response::{Outcome, Step, SyntheticResponse};
pub use router::{RouteDescriptor, RouteTable};
