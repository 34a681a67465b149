//! Integration tests for the Sable runtime
//!
//! Programs are assembled with `sable::ast::build` and run through an
//! [`Engine`], covering:
//! - Scoping and declarations
//! - Checked and unchecked arithmetic
//! - Control flow and faults
//! - Fork, synchronized, await and the queue disciplines

use std::time::{Duration, Instant};

use sable::ast::build::*;
use sable::ast::{BinOp, ContractExpr};
use sable::{CompileError, Engine, ErrorKind, Program, QueueKind, RunConfig, SableError, Value};

fn run(body: Vec<SStmt>) -> Result<Value, SableError> {
    Engine::default().run(&Program::new(body))
}

fn value(body: Vec<SStmt>) -> Value {
    run(body).unwrap()
}

fn runtime_kind(body: Vec<SStmt>) -> ErrorKind {
    match run(body) {
        Err(SableError::Runtime(err)) => err.kind,
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

fn compile_error(body: Vec<SStmt>) -> CompileError {
    match Engine::default().compile(&Program::new(body)) {
        Err(err) => err,
        Ok(fragment) => panic!("expected a compile error, got {fragment:?}"),
    }
}

fn ints(values: &[i64]) -> Value {
    Value::array(values.iter().map(|n| Value::Integer(*n)).collect())
}

// ============================================
// Scoping
// ============================================

#[test]
fn test_duplicate_declaration_fails() {
    let err = compile_error(vec![let_("x", int(1)), let_("x", int(2))]);
    assert!(matches!(err, CompileError::DuplicateDeclaration { ref name, .. } if name == "x"));
}

#[test]
fn test_child_shadowing_resolves_to_child() {
    let result = value(vec![
        let_("x", int(1)),
        let_("inner", block(vec![let_("x", int(2)), expr(ident("x"))])),
        expr(array(vec![ident("inner"), ident("x")])),
    ]);
    assert_eq!(result, ints(&[2, 1]));
}

#[test]
fn test_param_and_body_share_scope() {
    let err = compile_error(vec![function(
        "f",
        vec![param("a", None)],
        None,
        vec![let_("a", int(1))],
    )]);
    assert!(matches!(err, CompileError::DuplicateDeclaration { .. }));
}

#[test]
fn test_undeclared_identifier_hint() {
    let err = compile_error(vec![let_("count", int(1)), expr(ident("coutn"))]);
    assert!(matches!(err, CompileError::UndeclaredIdentifier { .. }));
    assert!(err.message().contains("count"));
}

#[test]
fn test_closure_captures_binding() {
    let result = value(vec![
        let_("base", int(10)),
        let_("add", lambda(&["n"], vec![expr(binary(ident("base"), BinOp::Add, ident("n")))])),
        assign(ident("base"), int(20)),
        expr(call(ident("add"), vec![int(1)])),
    ]);
    assert_eq!(result, Value::Integer(21));
}

#[test]
fn test_functions_are_hoisted() {
    let result = value(vec![
        expr(invoke("is_even", vec![int(10)])),
        function(
            "is_even",
            vec![param("n", Some(ContractExpr::Integer))],
            Some(ContractExpr::Boolean),
            vec![expr(if_else(
                binary(ident("n"), BinOp::Eq, int(0)),
                vec![expr(boolean(true))],
                Some(vec![expr(invoke("is_odd", vec![binary(ident("n"), BinOp::Sub, int(1))]))]),
            ))],
        ),
        function(
            "is_odd",
            vec![param("n", Some(ContractExpr::Integer))],
            Some(ContractExpr::Boolean),
            vec![expr(if_else(
                binary(ident("n"), BinOp::Eq, int(0)),
                vec![expr(boolean(false))],
                Some(vec![expr(invoke("is_even", vec![binary(ident("n"), BinOp::Sub, int(1))]))]),
            ))],
        ),
        expr(invoke("is_odd", vec![int(7)])),
    ]);
    assert_eq!(result, Value::Boolean(true));
}

#[test]
fn test_inline_routine() {
    let square = || {
        inline_function(
            "square",
            vec![param("n", Some(ContractExpr::Integer))],
            Some(ContractExpr::Integer),
            vec![expr(binary(ident("n"), BinOp::Mul, ident("n")))],
        )
    };
    let result = value(vec![
        square(),
        expr(array(vec![
            invoke("square", vec![int(7)]),
            invoke("square", vec![convert(real(3.5), ContractExpr::Integer)]),
        ])),
    ]);
    assert_eq!(result, ints(&[49, 9]));

    let kind = runtime_kind(vec![square(), expr(invoke("square", vec![int(1), int(2)]))]);
    assert!(matches!(kind, ErrorKind::ArityMismatch));
}

// ============================================
// Slots
// ============================================

#[test]
fn test_constant_write_fails() {
    let kind = runtime_kind(vec![const_("c", Some(int(1))), assign(ident("c"), int(2))]);
    assert!(matches!(kind, ErrorKind::ConstantMutation));
}

#[test]
fn test_constant_unchanged_after_failed_write() {
    let result = value(vec![
        const_("c", Some(int(1))),
        try_(vec![assign(ident("c"), int(2))], Some((None, vec![])), None),
        expr(ident("c")),
    ]);
    assert_eq!(result, Value::Integer(1));
}

#[test]
fn test_deferred_constant_initializes_once() {
    let kind = runtime_kind(vec![
        const_("c", None),
        assign(ident("c"), int(1)),
        assign(ident("c"), int(2)),
    ]);
    assert!(matches!(kind, ErrorKind::ConstantMutation));
}

#[test]
fn test_typed_binding_converts() {
    let result = value(vec![
        let_typed("x", ContractExpr::Real, Some(int(3))),
        expr(ident("x")),
    ]);
    assert_eq!(result, Value::Real(3.0));
}

#[test]
fn test_index_assignment_writes_back() {
    let result = value(vec![
        let_("xs", array(vec![int(1), int(2), int(3)])),
        let_("ys", ident("xs")),
        assign(index(ident("xs"), int(1)), int(20)),
        expr(array(vec![ident("xs"), ident("ys")])),
    ]);
    assert_eq!(
        result,
        Value::array(vec![ints(&[1, 20, 3]), ints(&[1, 2, 3])])
    );
}

#[test]
fn test_object_members_are_shared() {
    let result = value(vec![
        let_("p", object(vec![("x", int(1))])),
        let_("q", ident("p")),
        assign(member(ident("q"), "x"), int(5)),
        expr(member(ident("p"), "x")),
    ]);
    assert_eq!(result, Value::Integer(5));
}

// ============================================
// Arithmetic and conversion
// ============================================

#[test]
fn test_checked_conversions() {
    let result = value(vec![expr(array(vec![
        convert(boolean(true), ContractExpr::Integer),
        convert(real(1.9), ContractExpr::Integer),
    ]))]);
    assert_eq!(result, ints(&[1, 1]));
}

#[test]
fn test_checked_overflow() {
    let kind = runtime_kind(vec![expr(binary(int(i64::MAX), BinOp::Add, int(10)))]);
    assert!(matches!(kind, ErrorKind::Overflow));
}

#[test]
fn test_unchecked_block_wraps() {
    let result = value(vec![expr(unchecked(vec![expr(binary(
        int(i64::MAX),
        BinOp::Add,
        int(10),
    ))]))]);
    assert_eq!(result, Value::Integer(i64::MIN + 9));
}

#[test]
fn test_checked_block_inside_unchecked_run() {
    let engine = Engine::new(RunConfig {
        checked: false,
        ..RunConfig::default()
    });
    let program = Program::new(vec![expr(checked(vec![expr(binary(
        int(i64::MAX),
        BinOp::Add,
        int(1),
    ))]))]);
    assert!(matches!(engine.run(&program), Err(SableError::Runtime(_))));
}

#[test]
fn test_is_and_contract_values() {
    let result = value(vec![
        let_("r", invoke("relationship", vec![contract(ContractExpr::Integer), contract(ContractExpr::Real)])),
        expr(array(vec![
            is(int(3), ContractExpr::Real),
            is(string("a"), ContractExpr::Integer),
            ident("r"),
        ])),
    ]);
    assert_eq!(
        result,
        Value::array(vec![Value::Boolean(true), Value::Boolean(false), Value::string("subset")])
    );
}

// ============================================
// Control flow
// ============================================

#[test]
fn test_labelled_break() {
    let result = value(vec![
        let_("hits", int(0)),
        for_each(
            Some("outer"),
            "i",
            array(vec![int(1), int(2), int(3)]),
            vec![for_each(
                None,
                "j",
                array(vec![int(1), int(2), int(3)]),
                vec![
                    expr(if_else(
                        binary(ident("j"), BinOp::Eq, int(2)),
                        vec![continue_(Some("outer"))],
                        None,
                    )),
                    assign(ident("hits"), binary(ident("hits"), BinOp::Add, int(1))),
                ],
            )],
        ),
        expr(ident("hits")),
    ]);
    assert_eq!(result, Value::Integer(3));
}

#[test]
fn test_break_outside_loop_fails() {
    let err = compile_error(vec![break_(None)]);
    assert!(matches!(err, CompileError::InvalidLoopGrouping { .. }));

    let err = compile_error(vec![while_(None, boolean(false), vec![break_(Some("nope"))])]);
    assert!(matches!(err, CompileError::InvalidLoopGrouping { .. }));
}

#[test]
fn test_return_in_finally_fails() {
    let err = compile_error(vec![function(
        "f",
        vec![],
        None,
        vec![try_(vec![], None, Some(vec![ret(Some(int(1)))]))],
    )]);
    assert!(matches!(err, CompileError::ReturnFromFinally { .. }));
}

#[test]
fn test_raise_caught_by_handler() {
    let result = value(vec![
        let_("seen", void()),
        let_("cleaned", boolean(false)),
        try_(
            vec![raise(string("boom"))],
            Some((Some("e"), vec![assign(ident("seen"), ident("e"))])),
            Some(vec![assign(ident("cleaned"), boolean(true))]),
        ),
        expr(array(vec![ident("seen"), ident("cleaned")])),
    ]);
    assert_eq!(result, Value::array(vec![Value::string("boom"), Value::Boolean(true)]));
}

#[test]
fn test_uncaught_fault_surfaces() {
    let kind = runtime_kind(vec![raise(int(3))]);
    assert!(matches!(kind, ErrorKind::Fault(ref value) if **value == Value::Integer(3)));
}

// ============================================
// Fork and await
// ============================================

#[test]
fn test_await_timeout_then_value() {
    let started = Instant::now();
    let result = value(vec![
        let_(
            "h",
            fork_on(
                None,
                Some(ident("parallel")),
                vec![expr(invoke("sleep", vec![int(1000)])), expr(int(2))],
            ),
        ),
        let_("early", await_(ident("h"), int(500), int(42))),
        let_("late", await_(ident("h"), int(2000), int(42))),
        expr(array(vec![ident("early"), ident("late")])),
    ]);
    assert_eq!(result, ints(&[42, 2]));
    assert!(started.elapsed() >= Duration::from_millis(1000));
}

#[test]
fn test_lazy_item_runs_once() {
    let result = value(vec![
        let_("counter", object(vec![("runs", int(0))])),
        let_(
            "h",
            fork_on(
                None,
                Some(ident("lazy")),
                vec![
                    assign(
                        member(ident("counter"), "runs"),
                        binary(member(ident("counter"), "runs"), BinOp::Add, int(1)),
                    ),
                    expr(int(7)),
                ],
            ),
        ),
        let_("before", member(ident("counter"), "runs")),
        let_("first", unwrap(ident("h"))),
        let_("second", unwrap(ident("h"))),
        expr(array(vec![
            ident("before"),
            ident("first"),
            ident("second"),
            member(ident("counter"), "runs"),
        ])),
    ]);
    assert_eq!(result, ints(&[0, 7, 7, 1]));
}

#[test]
fn test_fork_fault_reaches_waiter() {
    let result = value(vec![
        let_("h", fork(vec![raise(string("late"))])),
        let_("caught", void()),
        try_(
            vec![expr(unwrap(ident("h")))],
            Some((Some("e"), vec![assign(ident("caught"), ident("e"))])),
            None,
        ),
        expr(ident("caught")),
    ]);
    assert_eq!(result, Value::string("late"));
}

#[test]
fn test_fork_sees_snapshot_of_locals() {
    let engine = Engine::new(RunConfig {
        queue: QueueKind::Lazy,
        ..RunConfig::default()
    });
    let program = Program::new(vec![
        let_("n", int(1)),
        let_("h", fork(vec![expr(ident("n"))])),
        assign(ident("n"), int(2)),
        expr(unwrap(ident("h"))),
    ]);
    assert_eq!(engine.run(&program).unwrap(), Value::Integer(1));
}

#[test]
fn test_fork_captures_unchecked_mode() {
    let result = value(vec![
        let_(
            "h",
            unchecked(vec![expr(fork(vec![expr(binary(int(i64::MAX), BinOp::Add, int(1)))]))]),
        ),
        expr(unwrap(ident("h"))),
    ]);
    assert_eq!(result, Value::Integer(i64::MIN));
}

#[test]
fn test_await_non_proxy_is_identity() {
    let result = value(vec![expr(await_(int(5), int(0), int(42)))]);
    assert_eq!(result, Value::Integer(5));
}

#[test]
fn test_script_queue_adapter() {
    let submit = lambda(
        &["target", "work"],
        vec![
            let_("v", call(ident("work"), vec![])),
            expr(object(vec![
                ("wait", lambda(&["timeout"], vec![expr(boolean(true))])),
                ("result", lambda(&[], vec![expr(ident("v"))])),
            ])),
        ],
    );
    let result = value(vec![
        let_("inline_queue", object(vec![("submit", submit)])),
        let_("h", fork_on(None, Some(ident("inline_queue")), vec![expr(int(11))])),
        expr(unwrap(ident("h"))),
    ]);
    assert_eq!(result, Value::Integer(11));
}

#[test]
fn test_script_queue_deferred_work_keeps_fork_mode() {
    // The queue only stores the work; checked code drains it later
    let submit = lambda(
        &["target", "work"],
        vec![
            assign(member(ident("pending"), "job"), ident("work")),
            expr(object(vec![
                ("wait", lambda(&["timeout"], vec![expr(boolean(true))])),
                ("result", lambda(&[], vec![expr(member(ident("pending"), "value"))])),
            ])),
        ],
    );
    let result = value(vec![
        function(
            "overflowing",
            vec![],
            None,
            vec![ret(Some(binary(int(i64::MAX), BinOp::Add, int(1))))],
        ),
        let_("pending", object(vec![("job", void()), ("value", void())])),
        let_("deferred_queue", object(vec![("submit", submit)])),
        let_(
            "h",
            unchecked(vec![expr(fork_on(
                None,
                Some(ident("deferred_queue")),
                vec![expr(invoke("overflowing", vec![]))],
            ))]),
        ),
        assign(member(ident("pending"), "value"), call(member(ident("pending"), "job"), vec![])),
        expr(unwrap(ident("h"))),
    ]);
    assert_eq!(result, Value::Integer(i64::MIN));
}

#[test]
fn test_via_non_queue_fails() {
    let kind = runtime_kind(vec![expr(fork_on(None, Some(int(3)), vec![expr(int(1))]))]);
    assert!(matches!(kind, ErrorKind::QueueProtocol));
}

#[test]
fn test_synchronized_bodies_never_overlap() {
    let guard = || {
        vec![
            assign(
                member(ident("s"), "active"),
                binary(member(ident("s"), "active"), BinOp::Add, int(1)),
            ),
            expr(if_else(
                binary(member(ident("s"), "active"), BinOp::Gt, int(1)),
                vec![assign(member(ident("s"), "overlap"), boolean(true))],
                None,
            )),
            expr(invoke("sleep", vec![int(20)])),
            assign(
                member(ident("s"), "active"),
                binary(member(ident("s"), "active"), BinOp::Sub, int(1)),
            ),
        ]
    };
    let names = ["a", "b", "c", "d"];
    let mut body = vec![let_(
        "s",
        object(vec![("active", int(0)), ("overlap", boolean(false))]),
    )];
    for name in names {
        body.push(let_(name, synchronized(ident("s"), Some(ident("parallel")), guard())));
    }
    for name in names {
        body.push(expr(unwrap(ident(name))));
    }
    body.push(expr(member(ident("s"), "overlap")));
    assert_eq!(value(body), Value::Boolean(false));
}

#[test]
fn test_forks_on_parallel_queue_overlap() {
    let started = Instant::now();
    let sleeper = || fork_on(None, Some(ident("parallel")), vec![expr(invoke("sleep", vec![int(300)]))]);
    value(vec![
        let_("a", sleeper()),
        let_("b", sleeper()),
        expr(unwrap(ident("a"))),
        expr(unwrap(ident("b"))),
    ]);
    assert!(started.elapsed() < Duration::from_millis(590));
}
