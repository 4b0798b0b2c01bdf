//! Middleware chain execution.
//!
//! A dispatch runs one flat walk over its stages: the process-wide middleware
//! first, in registration order, then the stages of each matched route. Each
//! stage returns a [`Step`](crate::Step) and the walk advances only when that
//! future resolves, so stages never overlap and chain length does not grow the
//! call stack.
//!
//! ```text
//!   process-wide ─► route 1 ─► route 2 ─► … ─► Unanswered
//!        │             │          │
//!        └──── fail ───┴──────────┴─► route error stages ─► process-wide error stages ─► Chain(err)
//! ```
//!
//! A terminal action anywhere ends the walk with that outcome.

use tracing::{debug, error, trace};

use crate::context::Exchange;
use crate::error::{DispatchError, StageError};
use crate::handler::{BoxedErrorStage, BoxedStage, Kind, Stage};
use crate::request::Params;
use crate::response::{Flow, Outcome};

/// Stages split by role. Built once, when the route table or the coordinator
/// is created; infrastructure stages are dropped here.
#[derive(Clone, Default)]
pub(crate) struct Chain {
    normal: Vec<BoxedStage>,
    errors: Vec<BoxedErrorStage>,
}

impl Chain {
    pub(crate) fn classify(stages: &[Stage]) -> Self {
        let mut chain = Self::default();
        for stage in stages {
            match &stage.kind {
                Kind::Normal(s) => chain.normal.push(s.clone()),
                Kind::ErrorHandler(s) => chain.errors.push(s.clone()),
                Kind::Infrastructure => debug!(stage = stage.name(), "skipping infrastructure stage"),
            }
        }
        chain
    }
}

/// A matched route ready to run: its chain and its bound params.
pub(crate) struct Bound<'t> {
    pub(crate) chain: &'t Chain,
    pub(crate) params: Params,
}

/// Walks `global` and then every route in `routes` against `ex`.
pub(crate) async fn run(global: &Chain, routes: Vec<Bound<'_>>, mut ex: Exchange) -> Result<Outcome, DispatchError> {
    let segments = std::iter::once((global, None)).chain(routes.into_iter().map(|b| (b.chain, Some(b.params))));

    for (route_no, (chain, params)) in segments.enumerate() {
        let in_route = params.is_some();
        if let Some(params) = params {
            ex.request.params = params;
        }

        for (stage_no, stage) in chain.normal.iter().enumerate() {
            trace!(route_no, stage_no, "stage");
            match stage.call(ex).await.0 {
                Flow::Next(next) => ex = next,
                Flow::Done(outcome) => return Ok(outcome),
                Flow::Fail(next, err) => {
                    debug!(route_no, stage_no, error = %err, "stage failed");
                    let handlers: Vec<&BoxedErrorStage> = if in_route {
                        chain.errors.iter().chain(&global.errors).collect()
                    } else {
                        global.errors.iter().collect()
                    };
                    return recover(err, &handlers, next).await;
                }
            }
        }
    }

    debug!("every stage proceeded without answering");
    Err(DispatchError::Unanswered)
}

/// Runs the error-handling stages until one answers.
///
/// Proceeding without an error hands the same error on; proceeding with an
/// error replaces it.
async fn recover(mut err: StageError, handlers: &[&BoxedErrorStage], mut ex: Exchange) -> Result<Outcome, DispatchError> {
    for handler in handlers {
        match handler.call(err.clone(), ex).await.0 {
            Flow::Next(next) => ex = next,
            Flow::Fail(next, replaced) => {
                ex = next;
                err = replaced;
            }
            Flow::Done(outcome) => return Ok(outcome),
        }
    }
    error!(error = %err, "unhandled stage error");
    Err(DispatchError::Chain(err))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{Value, json};

    use super::*;
    use crate::context::{DispatchBody, RequestOverrides, Seed};
    use crate::method::Method;

    fn exchange() -> Exchange {
        let seed = Seed {
            method: Method::Get,
            url: "/x".into(),
            body: DispatchBody::Empty,
            identity: None,
            overrides: RequestOverrides::new(),
        };
        Exchange::new(seed.build().unwrap())
    }

    fn push(ex: &mut Exchange, tag: &str) {
        let trace = ex.request.locals_mut().entry("trace").or_insert_with(|| json!([]));
        if let Value::Array(items) = trace {
            items.push(tag.into());
        }
    }

    fn mark(tag: &'static str) -> Stage {
        Stage::middleware(move |mut ex: Exchange| async move {
            push(&mut ex, tag);
            ex.next()
        })
    }

    fn answer_with_trace() -> Stage {
        Stage::middleware(|ex: Exchange| async move {
            let trace = ex.request.locals().get("trace").cloned().unwrap_or(Value::Null);
            ex.response.send(trace)
        })
    }

    fn counter(hits: &Arc<AtomicUsize>) -> Stage {
        let hits = Arc::clone(hits);
        Stage::middleware(move |ex: Exchange| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                ex.response.send("counted")
            }
        })
    }

    fn failing(message: &'static str) -> Stage {
        Stage::middleware(move |ex: Exchange| async move { ex.fail(message) })
    }

    fn bound(chain: &Chain) -> Bound<'_> {
        Bound { chain, params: Params::default() }
    }

    #[tokio::test]
    async fn stages_run_in_order() {
        let global = Chain::classify(&[mark("g1"), mark("g2")]);
        let route = Chain::classify(&[mark("r1"), mark("r2"), answer_with_trace()]);

        let out = run(&global, vec![bound(&route)], exchange()).await.unwrap();
        assert_eq!(out.body(), Some(&json!(["g1", "g2", "r1", "r2"])));
    }

    #[tokio::test]
    async fn terminal_action_stops_the_chain() {
        let hits = Arc::new(AtomicUsize::new(0));
        let route = Chain::classify(&[
            Stage::middleware(|ex: Exchange| async move { ex.response.send("early") }),
            counter(&hits),
        ]);

        let out = run(&Chain::default(), vec![bound(&route)], exchange()).await.unwrap();
        assert_eq!(out.body(), Some(&json!("early")));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn global_failure_skips_the_route_and_reaches_error_stages() {
        let hits = Arc::new(AtomicUsize::new(0));
        let global = Chain::classify(&[
            failing("boom"),
            Stage::error_handler(|err: StageError, ex: Exchange| async move {
                ex.response.send(format!("handled {err}"))
            }),
        ]);
        let route = Chain::classify(&[counter(&hits)]);

        let out = run(&global, vec![bound(&route)], exchange()).await.unwrap();
        assert_eq!(out.body(), Some(&json!("handled boom")));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unhandled_failure_settles_as_chain_error() {
        let route = Chain::classify(&[failing("nobody listens")]);
        let err = run(&Chain::default(), vec![bound(&route)], exchange()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Chain(e) if e.to_string() == "nobody listens"));
    }

    #[tokio::test]
    async fn error_stages_forward_or_replace_the_error() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = |seen: &Arc<std::sync::Mutex<Vec<String>>>, replace: Option<&'static str>| {
            let seen = Arc::clone(seen);
            Stage::error_handler(move |err: StageError, ex: Exchange| {
                seen.lock().unwrap().push(err.to_string());
                async move {
                    match replace {
                        Some(message) => ex.fail(message),
                        None => ex.next(),
                    }
                }
            })
        };
        let global = Chain::classify(&[log(&seen, None)]);
        let route = Chain::classify(&[failing("first"), log(&seen, Some("second"))]);

        let err = run(&global, vec![bound(&route)], exchange()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Chain(e) if e.to_string() == "second"));
        assert_eq!(*seen.lock().unwrap(), ["first", "second"]);
    }

    #[tokio::test]
    async fn route_error_stages_do_not_see_global_failures() {
        let hits = Arc::new(AtomicUsize::new(0));
        let route_errors = {
            let hits = Arc::clone(&hits);
            Stage::error_handler(move |_err: StageError, ex: Exchange| {
                hits.fetch_add(1, Ordering::SeqCst);
                async move { ex.response.end() }
            })
        };
        let global = Chain::classify(&[failing("global")]);
        let route = Chain::classify(&[mark("unreached"), route_errors]);

        let err = run(&global, vec![bound(&route)], exchange()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Chain(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn proceeding_past_a_route_falls_through_to_the_next_match() {
        let first = Chain::classify(&[Stage::middleware(|ex: Exchange| async move {
            let seen = ex.request.params().get("id").map(str::to_owned);
            let mut ex = ex;
            ex.request.locals_mut().insert("first".into(), json!(seen));
            ex.next()
        })]);
        let second = Chain::classify(&[Stage::middleware(|ex: Exchange| async move {
            let first = ex.request.locals().get("first").cloned();
            let id = ex.request.params().get("id").map(str::to_owned);
            ex.response.send(json!({"first": first, "second": id}))
        })]);

        let mut p1 = Params::default();
        p1.insert("id", "7");
        let routes = vec![Bound { chain: &first, params: p1 }, bound(&second)];

        let out = run(&Chain::default(), routes, exchange()).await.unwrap();
        assert_eq!(out.body(), Some(&json!({"first": "7", "second": null})));
    }

    #[tokio::test]
    async fn exhausting_every_stage_is_unanswered() {
        let route = Chain::classify(&[mark("a"), mark("b")]);
        let err = run(&Chain::default(), vec![bound(&route)], exchange()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Unanswered));
    }

    #[test]
    fn infrastructure_stages_are_dropped() {
        let global = Chain::classify(&[Stage::infrastructure("router"), mark("g"), Stage::infrastructure("errorHandler")]);
        assert_eq!(global.normal.len(), 1);
        assert!(global.errors.is_empty());
    }

    #[tokio::test]
    async fn long_chains_do_not_recurse() {
        let mut stages: Vec<Stage> = (0..10_000).map(|_| Stage::middleware(|ex: Exchange| async move { ex.next() })).collect();
        stages.push(Stage::middleware(|ex: Exchange| async move { ex.response.send("deep") }));
        let route = Chain::classify(&stages);

        let out = run(&Chain::default(), vec![bound(&route)], exchange()).await.unwrap();
        assert_eq!(out.body(), Some(&json!("deep")));
    }
}
