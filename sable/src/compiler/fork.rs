//! Fork and synchronized bodies, await
//!
//! A fork body compiles to its own routine. Evaluating the fork expression
//! snapshots the current environment chain, captures the effective
//! arithmetic mode into a copy of the interpreter state, and submits the body
//! to a queue: the one named after `via`, or the run's queue. The proxy for
//! the work item is stored in the body's self slot and is also the value of
//! the expression.
//!
//! A synchronized body runs under the monitor of its target, so bodies
//! synchronized on one target never overlap whatever queue runs them.

use std::sync::Arc;
use std::time::Duration;

use super::expr::Lowered;
use super::scope::RoutineKind;
use super::Compiler;
use crate::ast::{Block, Expr, Spanned};
use crate::contract::{union, Contract};
use crate::error::Result;
use crate::interp::{
    synchronized, Environment, ErrorKind, Eval, Frame, InterpResult, InterpreterState, Layout,
    RuntimeError, Value,
};
use crate::queue::{ScriptQueue, WorkBody};

impl Compiler {
    pub(super) fn lower_fork(
        &mut self,
        target: Option<&Spanned<Expr>>,
        queue: Option<&Spanned<Expr>>,
        body: &Block,
        kind: RoutineKind,
    ) -> Result<Lowered> {
        let target = target.map(|t| self.lower_spanned(t)).transpose()?.map(|t| t.eval);
        let queue = queue.map(|q| self.lower_spanned(q)).transpose()?.map(|q| q.eval);
        let lexical = self.tree.mode();

        let self_slot = self.tree.push_boundary(kind);
        let body = self.lower_stmts(body)?.eval;
        let layout = self.tree.pop().unwrap_or_else(|| Arc::from(Vec::new()));
        tracing::trace!(?kind, slots = layout.len(), "lowered concurrent body");

        let eval: Eval = Arc::new(move |frame: &mut Frame| {
            let target = match &target {
                Some(target) => target(frame)?,
                None => Value::Void,
            };
            let queue = match &queue {
                Some(queue) => ScriptQueue::adapt(&queue(frame)?.resolve()?)?,
                None => Arc::clone(&frame.state.queue),
            };
            let mut state = frame.state.clone();
            state.mode = frame.mode(lexical);

            let work = work_body(
                kind,
                Arc::clone(&body),
                Arc::clone(&layout),
                frame.env.snapshot(),
                target.clone(),
            );
            let handle = queue.submit(target, work, state)?;
            tracing::trace!(queue = queue.name(), "work item submitted");

            let proxy = Value::Proxy(handle);
            frame.env.slot(0, self_slot).declare(Some(proxy.clone()), None, frame.state.mode)?;
            Ok(proxy)
        });
        Ok(Lowered::new(eval, Contract::Super))
    }

    /// `await(handle, timeout_ms, fallback)`. The fallback is evaluated
    /// before waiting. A value that is not a proxy is returned as is.
    pub(super) fn lower_await(
        &mut self,
        handle: &Spanned<Expr>,
        timeout: &Spanned<Expr>,
        fallback: &Spanned<Expr>,
    ) -> Result<Lowered> {
        let handle = self.lower_spanned(handle)?;
        let timeout = self.lower_spanned(timeout)?.eval;
        let fallback = self.lower_spanned(fallback)?;
        let contract = union(&handle.contract, &fallback.contract);
        let (handle, fallback) = (handle.eval, fallback.eval);

        let eval: Eval = Arc::new(move |frame: &mut Frame| {
            let target = handle(frame)?;
            let timeout = wait_timeout(timeout(frame)?.resolve()?)?;
            let fallback = fallback(frame)?;
            match target {
                Value::Proxy(handle) => handle.await_value(timeout, fallback),
                other => Ok(other),
            }
        });
        Ok(Lowered::new(eval, contract))
    }
}

/// Body handed to the queue: a fresh activation over the captured snapshot
fn work_body(kind: RoutineKind, body: Eval, layout: Layout, captured: Arc<Environment>, target: Value) -> WorkBody {
    Box::new(move |state: &InterpreterState| {
        let run = move || {
            let mut frame = Frame::new(Environment::new(&layout, Some(captured)), state.clone());
            match body(&mut frame) {
                Err(RuntimeError {
                    kind: ErrorKind::Return(value),
                    ..
                }) => Ok(*value),
                other => other,
            }
        };
        match kind {
            RoutineKind::Synchronizer => synchronized(&target, run),
            RoutineKind::Fork | RoutineKind::Plain => run(),
        }
    })
}

/// Milliseconds to wait. Void or a negative timeout waits without limit.
fn wait_timeout(value: Value) -> InterpResult<Option<Duration>> {
    if let Value::Void = value {
        return Ok(None);
    }
    match value.as_real() {
        Some(millis) if millis >= 0.0 => Ok(Duration::try_from_secs_f64(millis / 1000.0).ok()),
        Some(_) => Ok(None),
        None => Err(RuntimeError::contract_binding(&value, &Contract::INTEGER)),
    }
}
