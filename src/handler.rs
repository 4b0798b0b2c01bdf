//! Stage traits and type erasure.
//!
//! # How stages are stored
//!
//! A chain holds stages of many different concrete types in one `Vec`, so each
//! stage is hidden behind a trait object:
//!
//! ```text
//! async fn auth(ex: Exchange) -> Step { … }     ← user writes this
//!        ↓ Stage::middleware(auth)
//! auth.into_boxed_stage()                        ← Middleware blanket impl
//!        ↓
//! Arc::new(FnStage(auth))                        ← heap-allocated wrapper
//!        ↓  stored as BoxedStage = Arc<dyn ErasedStage>
//! stage.call(ex)  at dispatch time               ← one vtable dispatch
//! ```
//!
//! # Roles
//!
//! Every [`Stage`] carries an explicit [`Role`] fixed when it is created.
//! Normal stages take the [`Exchange`]; error-handling stages take the
//! [`StageError`] first. Infrastructure stages stand for the host framework's
//! own routing and error-terminal machinery, which the dispatcher replaces, and
//! are dropped when a chain is built.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Exchange;
use crate::error::StageError;
use crate::response::Step;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Step`].
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Step> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedStage {
    fn call(&self, ex: Exchange) -> BoxFuture;
}

#[doc(hidden)]
pub trait ErasedErrorStage {
    fn call(&self, err: StageError, ex: Exchange) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedStage = Arc<dyn ErasedStage + Send + Sync + 'static>;

#[doc(hidden)]
pub type BoxedErrorStage = Arc<dyn ErasedErrorStage + Send + Sync + 'static>;

// ── Public traits ─────────────────────────────────────────────────────────────

/// Implemented for every `async fn(Exchange) -> Step`.
///
/// Sealed: only the blanket impl below satisfies it.
pub trait Middleware: private::SealedStage + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_stage(self) -> BoxedStage;
}

/// Implemented for every `async fn(StageError, Exchange) -> Step`.
pub trait ErrorMiddleware: private::SealedErrorStage + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_error_stage(self) -> BoxedErrorStage;
}

mod private {
    pub trait SealedStage {}
    pub trait SealedErrorStage {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut> private::SealedStage for F
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Step> + Send + 'static,
{
}

impl<F, Fut> Middleware for F
where
    F: Fn(Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Step> + Send + 'static,
{
    fn into_boxed_stage(self) -> BoxedStage {
        Arc::new(FnStage(self))
    }
}

impl<F, Fut> private::SealedErrorStage for F
where
    F: Fn(StageError, Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Step> + Send + 'static,
{
}

impl<F, Fut> ErrorMiddleware for F
where
    F: Fn(StageError, Exchange) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Step> + Send + 'static,
{
    fn into_boxed_error_stage(self) -> BoxedErrorStage {
        Arc::new(FnErrorStage(self))
    }
}

// ── Concrete wrappers ─────────────────────────────────────────────────────────

struct FnStage<F>(F);

impl<F, Fut> ErasedStage for FnStage<F>
where
    F: Fn(Exchange) -> Fut + Send + Sync,
    Fut: Future<Output = Step> + Send + 'static,
{
    fn call(&self, ex: Exchange) -> BoxFuture {
        Box::pin((self.0)(ex))
    }
}

struct FnErrorStage<F>(F);

impl<F, Fut> ErasedErrorStage for FnErrorStage<F>
where
    F: Fn(StageError, Exchange) -> Fut + Send + Sync,
    Fut: Future<Output = Step> + Send + 'static,
{
    fn call(&self, err: StageError, ex: Exchange) -> BoxFuture {
        Box::pin((self.0)(err, ex))
    }
}

// ── Stage ─────────────────────────────────────────────────────────────────────

/// How a stage takes part in a chain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Normal,
    ErrorHandler,
    Infrastructure,
}

#[derive(Clone)]
pub(crate) enum Kind {
    Normal(BoxedStage),
    ErrorHandler(BoxedErrorStage),
    Infrastructure,
}

/// One registered middleware or handler, tagged with its [`Role`].
///
/// ```rust
/// use murmur::{Exchange, Stage, StageError, Step};
///
/// async fn require_user(ex: Exchange) -> Step {
///     if ex.request.identity().is_none() {
///         return ex.fail("not signed in");
///     }
///     ex.next()
/// }
///
/// async fn deny(err: StageError, ex: Exchange) -> Step {
///     ex.response.send(format!("denied: {err}"))
/// }
///
/// let stack = vec![
///     Stage::middleware(require_user).named("require_user"),
///     Stage::infrastructure("router"),
///     Stage::error_handler(deny),
/// ];
/// ```
#[derive(Clone)]
pub struct Stage {
    name: Option<Cow<'static, str>>,
    pub(crate) kind: Kind,
}

impl Stage {
    pub fn middleware(f: impl Middleware) -> Self {
        Self { name: None, kind: Kind::Normal(f.into_boxed_stage()) }
    }

    pub fn error_handler(f: impl ErrorMiddleware) -> Self {
        Self { name: None, kind: Kind::ErrorHandler(f.into_boxed_error_stage()) }
    }

    /// A placeholder for host-framework machinery. Never runs.
    pub fn infrastructure(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: Some(name.into()), kind: Kind::Infrastructure }
    }

    /// Attaches a name, used in logs.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn role(&self) -> Role {
        match self.kind {
            Kind::Normal(_) => Role::Normal,
            Kind::ErrorHandler(_) => Role::ErrorHandler,
            Kind::Infrastructure => Role::Infrastructure,
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("role", &self.role())
            .finish()
    }
}
