//! Host entry point
//!
//! An [`Engine`] owns what outlives a single run: the global object with the
//! standard library installed, the queue fork bodies use by default, the
//! relationship cache and an optional debug monitor. Programs are compiled
//! against its globals and run against a fresh [`InterpreterState`].

use std::sync::Arc;

use crate::ast::Program;
use crate::compiler::{Compiler, Fragment};
use crate::config::{QueueKind, RunConfig};
use crate::contract::{Contract, RelationshipCache};
use crate::error::{CompileError, SableError};
use crate::interp::{
    builtins, DebugMonitor, InterpResult, InterpreterState, ScriptObject, TracingMonitor, Value,
};
use crate::queue::{create_queue, WorkItemQueue};

pub struct Engine {
    config: RunConfig,
    globals: Arc<ScriptObject>,
    queue: Arc<dyn WorkItemQueue>,
    monitor: Option<Arc<dyn DebugMonitor>>,
    cache: Arc<RelationshipCache>,
}

impl Engine {
    pub fn new(config: RunConfig) -> Self {
        let queue = create_queue(config.queue, config.pool_threads);
        let globals = Arc::new(ScriptObject::new());
        let default_queue = match config.queue {
            QueueKind::Default => Arc::clone(&queue),
            QueueKind::Parallel | QueueKind::Lazy => create_queue(QueueKind::Default, config.pool_threads),
        };
        builtins::install(&globals, default_queue);

        let monitor: Option<Arc<dyn DebugMonitor>> = if config.monitor_calls {
            Some(Arc::new(TracingMonitor))
        } else {
            None
        };
        tracing::debug!(
            queue = queue.name(),
            checked = config.checked,
            monitor = monitor.is_some(),
            "engine ready"
        );

        Engine {
            config,
            globals,
            queue,
            monitor,
            cache: Arc::new(RelationshipCache::new()),
        }
    }

    /// Replace the debug monitor
    pub fn with_monitor(mut self, monitor: Arc<dyn DebugMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn globals(&self) -> &Arc<ScriptObject> {
        &self.globals
    }

    /// Mutable global binding. Programs compiled afterwards can see it.
    pub fn define_global(&self, name: &str, value: Value, contract: Option<Contract>) {
        self.globals.define(name, value, contract);
    }

    /// Immutable global holding a contract, resolved statically by the compiler
    pub fn define_contract(&self, name: &str, contract: Contract) {
        self.globals.define_constant(name, Value::Contract(contract));
    }

    /// Fresh per-run state
    pub fn state(&self) -> InterpreterState {
        let mut state = InterpreterState::new(Arc::clone(&self.globals))
            .with_mode(self.config.mode())
            .with_queue(Arc::clone(&self.queue));
        state.cache = Arc::clone(&self.cache);
        if let Some(monitor) = &self.monitor {
            state = state.with_monitor(Arc::clone(monitor));
        }
        state
    }

    pub fn compile(&self, program: &Program) -> Result<Fragment, CompileError> {
        Compiler::new(Arc::clone(&self.globals))
            .with_cache(Arc::clone(&self.cache))
            .compile(program)
    }

    /// Run a compiled fragment. A proxy result is waited for.
    pub fn execute(&self, fragment: &Fragment) -> InterpResult<Value> {
        let value = fragment.run(&self.state())?.resolve()?;
        tracing::debug!(result = %value, "run finished");
        Ok(value)
    }

    pub fn run(&self, program: &Program) -> Result<Value, SableError> {
        let fragment = self.compile(program)?;
        Ok(self.execute(&fragment)?)
    }

    /// Run a JSON-serialized program
    pub fn run_json(&self, text: &str) -> Result<Value, SableError> {
        let program = Program::from_json(text).map_err(|e| SableError::Load(e.to_string()))?;
        self.run(&program)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(RunConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::{BinOp, ContractExpr};
    use crate::interp::{MonitorEvent, RecordingMonitor};

    #[test]
    fn test_run_program() {
        let engine = Engine::default();
        let program = Program::new(vec![
            let_("xs", array(vec![int(1), int(2), int(3)])),
            expr(invoke("len", vec![ident("xs")])),
        ]);
        assert_eq!(engine.run(&program).unwrap(), Value::Integer(3));
    }

    #[test]
    fn test_unchecked_config_wraps() {
        let config = RunConfig {
            checked: false,
            ..RunConfig::default()
        };
        let engine = Engine::new(config);
        let program = Program::new(vec![expr(binary(int(i64::MAX), BinOp::Add, int(1)))]);
        assert_eq!(engine.run(&program).unwrap(), Value::Integer(i64::MIN));

        let checked = Engine::default();
        assert!(matches!(checked.run(&program), Err(SableError::Runtime(_))));
    }

    #[test]
    fn test_fork_result_is_resolved() {
        let engine = Engine::default();
        let program = Program::new(vec![expr(fork(vec![expr(int(5))]))]);
        assert_eq!(engine.run(&program).unwrap(), Value::Integer(5));
    }

    #[test]
    fn test_lazy_engine_runs_on_await() {
        let engine = Engine::new(RunConfig {
            queue: QueueKind::Lazy,
            ..RunConfig::default()
        });
        let program = Program::new(vec![
            let_("h", fork(vec![expr(int(9))])),
            expr(unwrap(ident("h"))),
        ]);
        assert_eq!(engine.run(&program).unwrap(), Value::Integer(9));
    }

    #[test]
    fn test_host_contract_is_static() {
        let engine = Engine::default();
        engine.define_contract("Small", Contract::set([Value::Integer(1), Value::Integer(2)]));
        let program = Program::new(vec![expr(is(int(2), ContractExpr::Named("Small".into())))]);
        assert_eq!(engine.run(&program).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_host_global_visible() {
        let engine = Engine::default();
        engine.define_global("base", Value::Integer(40), Some(Contract::INTEGER));
        let program = Program::new(vec![expr(binary(ident("base"), BinOp::Add, int(2)))]);
        assert_eq!(engine.run(&program).unwrap(), Value::Integer(42));
    }

    #[test]
    fn test_run_json_load_error() {
        let engine = Engine::default();
        assert!(matches!(engine.run_json("{ nope"), Err(SableError::Load(_))));
    }

    #[test]
    fn test_monitor_sees_calls() {
        let monitor = Arc::new(RecordingMonitor::new());
        let engine = Engine::default().with_monitor(monitor.clone());
        let program = Program::new(vec![
            function("id", vec![param("x", None)], None, vec![expr(ident("x"))]),
            expr(invoke("id", vec![int(3)])),
        ]);
        assert_eq!(engine.run(&program).unwrap(), Value::Integer(3));
        let events = monitor.events();
        assert!(matches!(events.first(), Some(MonitorEvent::Push { routine, .. }) if routine == "id"));
        assert!(matches!(events.last(), Some(MonitorEvent::Pop { routine, .. }) if routine == "id"));
    }
}
