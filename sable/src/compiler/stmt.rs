//! Statement and block lowering

use std::sync::Arc;

use super::expr::{index_value, member_value, Lowered};
use super::routine::RoutineTemplate;
use super::scope::{Declaration, LoopInfo, Resolved, ScopeKind};
use super::Compiler;
use crate::ast::{Block, ContractExpr, Expr, Handler, Spanned, Stmt};
use crate::contract::Contract;
use crate::error::{CompileError, Result};
use crate::interp::{ErrorKind, Eval, Frame, InterpResult, RuntimeError, Value};

type Store = Arc<dyn Fn(&mut Frame, Value) -> InterpResult<()> + Send + Sync>;

/// Assignable location
struct Place {
    load: Eval,
    store: Store,
}

/// What a loop does after one pass over its body
enum Flow {
    Next,
    Exit,
}

impl Compiler {
    /// Lower `body` in a fresh scope of the given kind
    pub(super) fn lower_block(&mut self, body: &[Spanned<Stmt>], kind: ScopeKind) -> Result<Lowered> {
        self.tree.push(kind);
        let lowered = self.lower_stmts(body);
        self.tree.pop();
        lowered
    }

    /// Lower statements into the current scope. Function declarations are
    /// hoisted: their names are declared first, and the routines are created
    /// on entry to the block so they can call each other in any order.
    pub(super) fn lower_stmts(&mut self, body: &[Spanned<Stmt>]) -> Result<Lowered> {
        let mut hoisted = Vec::new();
        for stmt in body {
            if let Stmt::Function(decl) = &stmt.node {
                let signature = self.lower_signature(&decl.params, decl.ret.as_ref(), decl.inline)?;
                let declaration = Declaration {
                    routine: Some(signature.info()),
                    ..Declaration::constant(None)
                };
                let declared = self.tree.declare(&decl.name.node, declaration, decl.name.span)?;
                hoisted.push((declared.index, signature));
            }
        }

        let mut hoisted = hoisted.into_iter();
        let mut functions: Vec<(usize, RoutineTemplate)> = Vec::new();
        let mut evals: Vec<Eval> = Vec::new();
        let mut contract = Contract::VOID;
        for stmt in body {
            contract = Contract::VOID;
            match &stmt.node {
                Stmt::Function(decl) => {
                    let Some((index, signature)) = hoisted.next() else {
                        continue;
                    };
                    let template = self.lower_routine(&decl.name.node, signature, &decl.params, &decl.body)?;
                    functions.push((index, template));
                }
                Stmt::Expr(expr) => {
                    let lowered = self.lower_expr(expr, stmt.span)?;
                    contract = lowered.contract;
                    evals.push(lowered.eval);
                }
                _ => evals.push(self.lower_stmt(stmt)?),
            }
        }
        let yields = matches!(body.last(), Some(Spanned { node: Stmt::Expr(_), .. }));

        let functions: Arc<[(usize, RoutineTemplate)]> = functions.into();
        let evals: Arc<[Eval]> = evals.into();
        let eval: Eval = Arc::new(move |frame: &mut Frame| {
            for (index, template) in functions.iter() {
                let routine = template.instantiate(frame)?;
                frame.env.slot(0, *index).declare(Some(Value::Routine(routine)), None, frame.state.mode)?;
            }
            let mut last = Value::Void;
            for eval in evals.iter() {
                last = eval(frame)?;
            }
            Ok(if yields { last } else { Value::Void })
        });
        Ok(Lowered::new(eval, contract))
    }

    fn lower_stmt(&mut self, stmt: &Spanned<Stmt>) -> Result<Eval> {
        match &stmt.node {
            Stmt::Let {
                name,
                contract,
                value,
                constant,
            } => self.lower_let(name, contract.as_ref(), value.as_ref(), *constant),
            Stmt::Assign { target, value } => {
                let value = self.lower_spanned(value)?.eval;
                let place = self.lower_place(target)?;
                let store = place.store;
                Ok(Arc::new(move |frame: &mut Frame| {
                    let value = value(frame)?;
                    store(frame, value)?;
                    Ok(Value::Void)
                }))
            }
            Stmt::Delete(name) => self.lower_delete(name),
            Stmt::Return(value) => {
                if self.tree.in_finally() {
                    return Err(CompileError::return_from_finally(stmt.span));
                }
                let value = match value {
                    Some(value) => self.lower_spanned(value)?,
                    None => Lowered::void(),
                };
                let eval = value.eval;
                Ok(Arc::new(move |frame: &mut Frame| Err(RuntimeError::return_value(eval(frame)?))))
            }
            Stmt::While { label, cond, body } => {
                let cond = self.lower_spanned(cond)?.eval;
                let body = self.lower_loop_body(label.as_ref(), None, body)?.1;
                let label = label.clone();
                Ok(Arc::new(move |frame: &mut Frame| {
                    while cond(frame)?.resolve()?.is_truthy() {
                        if let Flow::Exit = loop_flow(body(frame), label.as_deref())? {
                            break;
                        }
                    }
                    Ok(Value::Void)
                }))
            }
            Stmt::ForEach {
                label,
                var,
                iterable,
                body,
            } => {
                let iterable = self.lower_spanned(iterable)?.eval;
                let (var_slot, body) = self.lower_loop_body(label.as_ref(), Some(var), body)?;
                let label = label.clone();
                Ok(Arc::new(move |frame: &mut Frame| {
                    let items = iteration_items(iterable(frame)?)?;
                    for item in items {
                        if let Some(index) = var_slot {
                            frame.env.slot(0, index).declare(Some(item), None, frame.state.mode)?;
                        }
                        if let Flow::Exit = loop_flow(body(frame), label.as_deref())? {
                            break;
                        }
                    }
                    Ok(Value::Void)
                }))
            }
            Stmt::Break(label) => {
                self.check_loop(label.as_deref(), "break", stmt)?;
                let label = label.clone();
                Ok(Arc::new(move |_: &mut Frame| Err(RuntimeError::break_loop(label.clone()))))
            }
            Stmt::Continue(label) => {
                self.check_loop(label.as_deref(), "continue", stmt)?;
                let label = label.clone();
                Ok(Arc::new(move |_: &mut Frame| Err(RuntimeError::continue_loop(label.clone()))))
            }
            Stmt::Raise(value) => {
                let value = self.lower_spanned(value)?.eval;
                Ok(Arc::new(move |frame: &mut Frame| Err(RuntimeError::fault(value(frame)?))))
            }
            Stmt::Try {
                body,
                handler,
                finally,
            } => self.lower_try(body, handler.as_ref(), finally.as_ref()),
            // Handled by lower_stmts
            Stmt::Function(_) | Stmt::Expr(_) => Ok(Lowered::void().eval),
        }
    }

    fn lower_let(
        &mut self,
        name: &Spanned<String>,
        contract: Option<&Spanned<ContractExpr>>,
        value: Option<&Spanned<Expr>>,
        constant: bool,
    ) -> Result<Eval> {
        let source = contract
            .map(|c| self.lower_contract(&c.node, c.span))
            .transpose()?;
        // The initializer sees the enclosing binding of the same name
        let init = value.map(|v| self.lower_spanned(v)).transpose()?;

        let declared = match (&source, &init) {
            (Some(source), _) => source.as_static().cloned(),
            (None, Some(init)) if constant && !matches!(init.contract, Contract::Super) => {
                Some(init.contract.clone())
            }
            _ => None,
        };
        let known = match value.map(|v| &v.node) {
            Some(Expr::Contract(literal)) if constant => {
                self.lower_contract(literal, name.span)?.as_static().cloned()
            }
            _ => None,
        };
        let mut declaration = if constant {
            Declaration::constant(declared)
        } else {
            Declaration::variable(declared)
        };
        declaration.known = known;
        let index = self.tree.declare(&name.node, declaration, name.span)?.index;
        let lexical = self.tree.mode();
        let init = init.map(|init| init.eval);

        Ok(Arc::new(move |frame: &mut Frame| {
            let value = match &init {
                Some(init) => Some(init(frame)?),
                None => None,
            };
            let contract = match &source {
                Some(source) => Some(source.resolve(frame)?),
                None => None,
            };
            let mode = frame.mode(lexical);
            frame.env.slot(0, index).declare(value, contract, mode)?;
            Ok(Value::Void)
        }))
    }

    fn lower_delete(&mut self, name: &Spanned<String>) -> Result<Eval> {
        let resolved = self.tree.resolve(&name.node, name.span)?;
        let name: Arc<str> = Arc::from(name.node.as_str());
        let eval: Eval = match resolved {
            Resolved::Local { hops, decl } => {
                let index = decl.index;
                Arc::new(move |frame: &mut Frame| {
                    frame.env.slot(hops, index).delete(&name)?;
                    Ok(Value::Void)
                })
            }
            Resolved::Global => Arc::new(move |frame: &mut Frame| {
                match frame.state.globals.slot(&name) {
                    Some(slot) => slot.delete(&name)?,
                    None => return Err(RuntimeError::missing_member(&name)),
                }
                Ok(Value::Void)
            }),
        };
        Ok(eval)
    }

    /// Names, members and indexes can be assigned. Writing an array element
    /// stores a modified copy of the array back into its own place.
    fn lower_place(&mut self, target: &Spanned<Expr>) -> Result<Place> {
        let lexical = self.tree.mode();
        match &target.node {
            Expr::Ident(name) => {
                let load = self.lower_ident(name, target.span)?.eval;
                let name: Arc<str> = Arc::from(name.as_str());
                let store: Store = match self.tree.resolve(&name, target.span)? {
                    Resolved::Local { hops, decl } => {
                        let index = decl.index;
                        Arc::new(move |frame: &mut Frame, value| {
                            frame.env.slot(hops, index).write(&name, value, frame.mode(lexical))
                        })
                    }
                    Resolved::Global => Arc::new(move |frame: &mut Frame, value| {
                        let mode = frame.mode(lexical);
                        frame.state.globals.set(&name, value, mode)
                    }),
                };
                Ok(Place { load, store })
            }
            Expr::Member { object, name } => {
                let object = self.lower_spanned(object)?.eval;
                let name: Arc<str> = Arc::from(name.node.as_str());
                let (read_object, read_name) = (Arc::clone(&object), Arc::clone(&name));
                let load: Eval = Arc::new(move |frame: &mut Frame| {
                    let target = read_object(frame)?.resolve()?;
                    member_value(&target, &read_name, frame.mode(lexical))
                });
                let store: Store = Arc::new(move |frame: &mut Frame, value| {
                    match object(frame)?.resolve()? {
                        Value::Object(target) => target.set(&name, value, frame.mode(lexical)),
                        _ => Err(RuntimeError::missing_member(&name)),
                    }
                });
                Ok(Place { load, store })
            }
            Expr::Index { object, index } => {
                let base = match &object.node {
                    Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. } => self.lower_place(object)?,
                    _ => return Err(CompileError::invalid_assignment(object.span)),
                };
                let index = self.lower_spanned(index)?.eval;
                let (base_load, key) = (Arc::clone(&base.load), Arc::clone(&index));
                let load: Eval = Arc::new(move |frame: &mut Frame| {
                    let target = base_load(frame)?.resolve()?;
                    let key = key(frame)?.resolve()?;
                    index_value(&target, &key, frame.mode(lexical))
                });
                let store: Store = Arc::new(move |frame: &mut Frame, value| {
                    let key = index(frame)?.resolve()?;
                    match (base.load)(frame)?.resolve()? {
                        Value::Array(mut items) => {
                            let position = match key {
                                Value::Integer(i) => usize::try_from(i)
                                    .ok()
                                    .filter(|position| *position < items.len())
                                    .ok_or_else(|| RuntimeError::index_out_of_bounds(i, items.len()))?,
                                other => {
                                    return Err(RuntimeError::type_mismatch("[]=", &Value::Array(items), &other));
                                }
                            };
                            Arc::make_mut(&mut items)[position] = value;
                            (base.store)(frame, Value::Array(items))
                        }
                        Value::Object(target) => match key {
                            Value::String(name) => target.set(&name, value, frame.mode(lexical)),
                            other => Err(RuntimeError::type_mismatch("[]=", &Value::Object(target), &other)),
                        },
                        other => Err(RuntimeError::type_mismatch("[]=", &other, &key)),
                    }
                });
                Ok(Place { load, store })
            }
            _ => Err(CompileError::invalid_assignment(target.span)),
        }
    }

    /// Body scope of a loop, with the loop variable (if any) declared in it
    fn lower_loop_body(
        &mut self,
        label: Option<&String>,
        var: Option<&Spanned<String>>,
        body: &Block,
    ) -> Result<(Option<usize>, Eval)> {
        let scope = self.tree.push(ScopeKind::Generic);
        self.tree.scope_mut(scope).loop_info = Some(LoopInfo { label: label.cloned() });
        let var_slot = match var {
            Some(var) => Some(self.tree.declare(&var.node, Declaration::variable(None), var.span)?.index),
            None => None,
        };
        let body = self.lower_stmts(body)?.eval;
        self.tree.pop();
        Ok((var_slot, body))
    }

    fn check_loop(&self, label: Option<&str>, keyword: &str, stmt: &Spanned<Stmt>) -> Result<()> {
        if self.tree.find_loop(label) {
            return Ok(());
        }
        let message = match label {
            Some(label) => format!("{keyword} names no enclosing loop labelled `{label}`"),
            None => format!("{keyword} outside of a loop"),
        };
        Err(CompileError::loop_grouping(message, stmt.span))
    }

    fn lower_try(&mut self, body: &Block, handler: Option<&Handler>, finally: Option<&Block>) -> Result<Eval> {
        let body = self.lower_block(body, ScopeKind::Generic)?.eval;

        let handler = match handler {
            Some(handler) => {
                self.tree.push(ScopeKind::Generic);
                let binding = match &handler.binding {
                    Some(name) => Some(self.tree.declare(&name.node, Declaration::variable(None), name.span)?.index),
                    None => None,
                };
                let eval = self.lower_stmts(&handler.body)?.eval;
                self.tree.pop();
                Some((binding, eval))
            }
            None => None,
        };

        let finally = match finally {
            Some(block) => {
                let scope = self.tree.push(ScopeKind::Generic);
                self.tree.scope_mut(scope).in_finally = true;
                let eval = self.lower_stmts(block)?.eval;
                self.tree.pop();
                Some(eval)
            }
            None => None,
        };

        Ok(Arc::new(move |frame: &mut Frame| {
            let outcome = match (body(frame), &handler) {
                (Err(err), Some((binding, handler))) if err.is_catchable() => {
                    tracing::trace!(error = %err, "try handler caught error");
                    let bound = match binding {
                        Some(index) => frame.env.slot(0, *index).declare(Some(err.payload()), None, frame.state.mode),
                        None => Ok(()),
                    };
                    bound.and_then(|()| handler(frame))
                }
                (outcome, _) => outcome,
            };
            // An error raised by the finally block replaces the outcome
            if let Some(finally) = &finally {
                finally(frame)?;
            }
            outcome.map(|_| Value::Void)
        }))
    }
}

/// Decide how a loop continues after its body produced `result`. Break and
/// continue aimed at an outer loop propagate.
fn loop_flow(result: InterpResult<Value>, label: Option<&str>) -> InterpResult<Flow> {
    let err = match result {
        Ok(_) => return Ok(Flow::Next),
        Err(err) => err,
    };
    let targets = |target: &Option<String>| target.as_deref().is_none_or(|t| Some(t) == label);
    match &err.kind {
        ErrorKind::Break(target) if targets(target) => Ok(Flow::Exit),
        ErrorKind::Continue(target) if targets(target) => Ok(Flow::Next),
        _ => Err(err),
    }
}

/// Values a for-each loop visits: array elements, the characters of a
/// string, or the member names of an object
fn iteration_items(value: Value) -> InterpResult<Vec<Value>> {
    match value.resolve()? {
        Value::Array(items) => Ok(items.as_ref().clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::string(c.encode_utf8(&mut [0; 4]))).collect()),
        Value::Object(object) => Ok(object.names().iter().map(|name| Value::string(name)).collect()),
        other => Err(RuntimeError::not_iterable(&other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_flow_labels() {
        let plain_break = Err(RuntimeError::break_loop(None));
        assert!(matches!(loop_flow(plain_break, Some("outer")), Ok(Flow::Exit)));

        let labelled = Err(RuntimeError::continue_loop(Some("outer".into())));
        assert!(matches!(loop_flow(labelled, Some("outer")), Ok(Flow::Next)));

        let elsewhere = Err(RuntimeError::break_loop(Some("outer".into())));
        assert!(loop_flow(elsewhere, Some("inner")).is_err());

        let fault = Err(RuntimeError::fault(Value::Integer(1)));
        assert!(loop_flow(fault, None).is_err());
    }

    #[test]
    fn test_iteration_items() {
        let chars = iteration_items(Value::string("ab")).unwrap();
        assert_eq!(chars, vec![Value::string("a"), Value::string("b")]);
        assert!(iteration_items(Value::Integer(3)).is_err());
    }
}
