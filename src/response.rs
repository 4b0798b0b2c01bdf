//! Response capture, outcomes, and the [`Step`] a stage returns.
//!
//! A [`SyntheticResponse`] writes nothing anywhere. Its four terminal actions
//! (`send`, `end`, `render`, `redirect`) take the response **by value** and turn
//! it into a [`Step`] that ends the dispatch. A response can therefore answer at
//! most once; a second terminal call does not compile.

use http::StatusCode;
use serde_json::Value;

use crate::context::Exchange;
use crate::error::StageError;

// ── Outcome ──────────────────────────────────────────────────────────────────

/// What a dispatch resolved with.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// `send` / `end`: the payload, and the status code if one was given.
    Payload { body: Value, status: Option<StatusCode> },
    /// `render`: the view name and the values handed to it.
    Render { view: String, locals: Value },
    /// `redirect`: where to.
    Redirect { target: String },
}

impl Outcome {
    /// `"render"` or `"redirect"` for directives, `None` for plain payloads.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::Payload { .. } => None,
            Self::Render { .. } => Some("render"),
            Self::Redirect { .. } => Some("redirect"),
        }
    }

    /// The payload of a `send` / `end` outcome.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Payload { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Payload { status, .. } => *status,
            _ => None,
        }
    }
}

// ── Step ─────────────────────────────────────────────────────────────────────

/// How a stage finished. Obtained only from [`Exchange::next`],
/// [`Exchange::fail`] or a terminal action on [`SyntheticResponse`].
#[derive(Debug)]
#[must_use = "a stage must return its Step for the chain to advance"]
pub struct Step(pub(crate) Flow);

#[derive(Debug)]
pub(crate) enum Flow {
    Next(Exchange),
    Fail(Exchange, StageError),
    Done(Outcome),
}

impl Step {
    fn done(outcome: Outcome) -> Self {
        Self(Flow::Done(outcome))
    }
}

// ── SyntheticResponse ────────────────────────────────────────────────────────

/// The response handed to every stage of one dispatch.
#[derive(Debug, Default)]
pub struct SyntheticResponse {
    status: Option<StatusCode>,
}

impl SyntheticResponse {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sets the status code a later `send` or `end` reports.
    pub fn status(&mut self, code: StatusCode) -> &mut Self {
        self.status = Some(code);
        self
    }

    /// Terminal: answers with `payload`.
    pub fn send(self, payload: impl Into<Value>) -> Step {
        Step::done(Outcome::Payload { body: payload.into(), status: self.status })
    }

    /// Terminal: answers with `payload` and `status`.
    pub fn send_with_status(self, payload: impl Into<Value>, status: StatusCode) -> Step {
        Step::done(Outcome::Payload { body: payload.into(), status: Some(status) })
    }

    /// Terminal: answers with no payload.
    pub fn end(self) -> Step {
        self.send(Value::Null)
    }

    /// Terminal: answers with `payload`. Same as [`send`](Self::send).
    pub fn end_with(self, payload: impl Into<Value>) -> Step {
        self.send(payload)
    }

    /// Terminal: records that `view` should be rendered with `locals`.
    pub fn render(self, view: impl Into<String>, locals: impl Into<Value>) -> Step {
        Step::done(Outcome::Render { view: view.into(), locals: locals.into() })
    }

    /// Terminal: records a redirect to `target`.
    pub fn redirect(self, target: impl Into<String>) -> Step {
        Step::done(Outcome::Redirect { target: target.into() })
    }
}
