//! Scope compiler
//!
//! Lowers an AST into a tree of closures ([`Eval`]) in a single
//! pass. Names are resolved to `(hops, index)` slot addresses while lowering,
//! so nothing is looked up by name at run time except host globals.
//!
//! Static contract knowledge flows alongside each lowered expression and is
//! used to skip conversions that cannot fail and to inline calls to routines
//! declared `inline`.
//!
//! [`Eval`]: crate::interp::Eval

mod contract;
mod expr;
mod fork;
mod fragment;
mod routine;
mod scope;
mod stmt;

pub use fragment::Fragment;
pub use scope::{Declaration, Resolved, RoutineInfo, RoutineKind, ScopeKind, ScopeTree};

use std::sync::Arc;

use crate::ast::Program;
use crate::contract::RelationshipCache;
use crate::error::Result;
use crate::interp::ScriptObject;

/// Compiler for one compilation unit
pub struct Compiler {
    tree: ScopeTree,
    globals: Arc<ScriptObject>,
    cache: Arc<RelationshipCache>,
}

impl Compiler {
    /// Compiler resolving free names against `globals`
    pub fn new(globals: Arc<ScriptObject>) -> Self {
        Compiler {
            tree: ScopeTree::new(globals.names()),
            globals,
            cache: Arc::new(RelationshipCache::new()),
        }
    }

    /// Share a relationship cache with the interpreter
    pub fn with_cache(mut self, cache: Arc<RelationshipCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn compile(mut self, program: &Program) -> Result<Fragment> {
        tracing::debug!(statements = program.body.len(), "compiling program");
        let lowered = self.lower_stmts(&program.body)?;
        let layout = self.tree.take_root_layout();
        tracing::debug!(slots = layout.len(), "compiled program");
        Ok(Fragment::new(lowered.eval, layout, lowered.contract))
    }
}

/// Compile `program` against `globals`
pub fn compile(program: &Program, globals: Arc<ScriptObject>) -> Result<Fragment> {
    Compiler::new(globals).compile(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::ast::{BinOp, ContractExpr};
    use crate::contract::Contract;
    use crate::error::CompileError;
    use crate::interp::{InterpreterState, Value};

    fn run(body: Vec<crate::ast::build::SStmt>) -> Value {
        let globals = Arc::new(ScriptObject::new());
        crate::interp::builtins::install(&globals, crate::queue::DefaultQueue::shared());
        let fragment = compile(&Program::new(body), Arc::clone(&globals)).unwrap();
        fragment.run(&InterpreterState::new(globals)).unwrap()
    }

    #[test]
    fn test_final_expression_is_result() {
        let value = run(vec![
            let_("x", int(20)),
            expr(binary(ident("x"), BinOp::Add, int(22))),
        ]);
        assert_eq!(value, Value::Integer(42));
    }

    #[test]
    fn test_top_level_return() {
        let value = run(vec![ret(Some(int(7))), expr(int(8))]);
        assert_eq!(value, Value::Integer(7));
    }

    #[test]
    fn test_fragment_runs_twice() {
        let globals = Arc::new(ScriptObject::new());
        let program = Program::new(vec![let_("n", int(1)), expr(ident("n"))]);
        let fragment = compile(&program, Arc::clone(&globals)).unwrap();
        let state = InterpreterState::new(globals);
        assert_eq!(fragment.run(&state).unwrap(), Value::Integer(1));
        assert_eq!(fragment.run(&state).unwrap(), Value::Integer(1));
        assert_eq!(fragment.slot_count(), 1);
    }

    #[test]
    fn test_static_result_contract() {
        let globals = Arc::new(ScriptObject::new());
        let program = Program::new(vec![expr(convert(int(3), ContractExpr::Real))]);
        let fragment = compile(&program, globals).unwrap();
        assert_eq!(fragment.contract(), &Contract::REAL);
    }

    #[test]
    fn test_undeclared_name_fails_compilation() {
        let program = Program::new(vec![expr(ident("missing"))]);
        let err = compile(&program, Arc::new(ScriptObject::new())).unwrap_err();
        assert!(matches!(err, CompileError::UndeclaredIdentifier { .. }));
    }

    #[test]
    fn test_recursive_function() {
        let value = run(vec![
            function(
                "fact",
                vec![param("n", Some(ContractExpr::Integer))],
                Some(ContractExpr::Integer),
                vec![expr(if_else(
                    binary(ident("n"), BinOp::Le, int(1)),
                    vec![expr(int(1))],
                    Some(vec![expr(binary(
                        ident("n"),
                        BinOp::Mul,
                        invoke("fact", vec![binary(ident("n"), BinOp::Sub, int(1))]),
                    ))]),
                ))],
            ),
            expr(invoke("fact", vec![int(10)])),
        ]);
        assert_eq!(value, Value::Integer(3_628_800));
    }
}
