//! Error taxonomy.
//!
//! Nothing here is thrown across the dispatch boundary. Every failure a caller
//! can observe comes back as one of these values through the `Result` of
//! [`Coordinator::send`](crate::Coordinator::send) and friends.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// The top-level error returned by [`Coordinator::send`](crate::Coordinator::send).
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A single-request submission failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A batch could not be run at all. Per-item failures never end up here.
    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Raised while building route descriptors, before any request is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("route template `{0}` must start with `/`")]
    RelativeTemplate(String),

    #[error("route template `{template}` has an unnamed capture in segment {segment}")]
    UnnamedCapture { template: String, segment: usize },

    #[error("route template `{template}` does not compile: {reason}")]
    InvalidPattern { template: String, reason: String },

    #[error("route `{template}` names {names} params but its pattern captures {captures}")]
    ParamCountMismatch { template: String, names: usize, captures: usize },

    #[error("route template `{template}` has an optional capture in segment {segment}, which is not the last")]
    OptionalNotLast { template: String, segment: usize },

    #[error("route template `{template}` has `*` in segment {segment}, which is not the last")]
    WildcardNotLast { template: String, segment: usize },
}

/// Why one logical dispatch failed.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// No descriptor accepts the method and path.
    #[error("couldn't find the route -> {method}::{path}")]
    RouteNotFound { method: String, path: String },

    /// A pattern accepted the path but the segments do not line up with the
    /// route's template.
    #[error("path `{path}` does not line up with route `{template}`")]
    PathMismatch { path: String, template: String },

    /// The textual body is not valid JSON.
    #[error("error parsing JSON body: {0}")]
    BodyParse(String),

    /// A stage failed and no error-handling stage answered.
    #[error("unhandled stage error: {0}")]
    Chain(StageError),

    /// Every stage proceeded and none fired a terminal action.
    #[error("middleware chain finished without a terminal action")]
    Unanswered,

    /// The chain stalled past the configured timeout.
    #[error("dispatch stalled for longer than {0:?}")]
    Timeout(Duration),
}

/// One failed item of a batch. Sibling items are unaffected.
#[derive(Debug, Clone, Error)]
#[error("batch item {position} failed: {error}")]
pub struct BatchItemError {
    /// Index of the item in the submitted collection.
    pub position: usize,
    /// The item's `sequence` hint, if it carried one.
    pub sequence: Option<usize>,
    #[source]
    pub error: DispatchError,
}

/// Malformed batch input. Reported before any item runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("sequence {sequence} is claimed by items {first} and {second}")]
    DuplicateSequence { sequence: usize, first: usize, second: usize },

    /// The hint points too far past the end of the batch to lay out.
    #[error("item {position} asks for sequence {sequence}, this batch allows below {limit}")]
    SequenceOutOfRange { sequence: usize, position: usize, limit: usize },
}

/// The error a stage hands to `proceed`.
///
/// Wraps any error type behind an `Arc`, so the error chain can pass it from
/// handler to handler without requiring `Clone` on the original.
#[derive(Clone)]
pub struct StageError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl StageError {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }

    /// An error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(Arc::new(Message(message.into())))
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<&str> for StageError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

impl From<String> for StageError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);
