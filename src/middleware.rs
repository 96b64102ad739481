// src/middleware.rs
//
// Middleware composition (§4.2 "ancestor middleware collection" / §4.5
// before-handler-after ordering). A chain is built by folding the
// ordered middleware list right-to-left into nested closures, so
// execution is stack-unwind: declared order before the handler,
// reverse order after.

use std::sync::Arc;

use crate::context::Context;
use crate::router::Handler;

/// A single middleware stage. `next` runs the remainder of the chain
/// (further middleware, then the terminal handler); a middleware that
/// does not call `next` short-circuits everything after it.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: &mut Context, next: &mut dyn FnMut(&mut Context));
}

/// Wraps a plain closure as a `Middleware`, for ad hoc/inline use and
/// for tests.
pub struct FnMiddleware<F>
where
    F: Fn(&mut Context, &mut dyn FnMut(&mut Context)) + Send + Sync,
{
    f: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(&mut Context, &mut dyn FnMut(&mut Context)) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Context, &mut dyn FnMut(&mut Context)) + Send + Sync,
{
    fn handle(&self, ctx: &mut Context, next: &mut dyn FnMut(&mut Context)) {
        (self.f)(ctx, next)
    }
}

/// Fold an ordered middleware chain and a terminal handler into a single
/// `Handler`. `chain[0]` runs first and wraps everything after it.
pub fn compose(chain: Vec<Arc<dyn Middleware>>, handler: Handler) -> Handler {
    chain.into_iter().rev().fold(handler, |next, mw| {
        Arc::new(move |ctx: &mut Context| {
            let mut next_fn = |ctx: &mut Context| next(ctx);
            mw.handle(ctx, &mut next_fn);
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn short_circuit_skips_handler() {
        let handler_ran = Arc::new(AtomicBool::new(false));
        let hr = handler_ran.clone();
        let handler: Handler = Arc::new(move |ctx: &mut Context| {
            hr.store(true, Ordering::SeqCst);
            ctx.status = 200;
        });

        let blocker: Arc<dyn Middleware> = Arc::new(FnMiddleware::new(|ctx: &mut Context, _next: &mut dyn FnMut(&mut Context)| {
            ctx.abort_with_status(401);
        }));

        let chain = compose(vec![blocker], handler);
        let mut ctx = Context::test_default();
        chain(&mut ctx);

        assert!(!handler_ran.load(Ordering::SeqCst));
        assert_eq!(ctx.status, 401);
        assert!(ctx.is_aborted());
    }

    #[test]
    fn empty_chain_runs_handler_directly() {
        let handler: Handler = Arc::new(|ctx: &mut Context| ctx.status = 204);
        let chain = compose(vec![], handler);
        let mut ctx = Context::test_default();
        chain(&mut ctx);
        assert_eq!(ctx.status, 204);
    }
}
