//! Lexical scope tree
//!
//! Scopes live in an arena and link to their parent by index. Every routine
//! scope (function, lambda, fork or synchronized body) owns a slot layout;
//! generic and context scopes allocate their slots in the layout of the
//! routine that encloses them. Resolution therefore yields a pair
//! `(hops, index)` where `hops` counts routine boundaries crossed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::ast::Span;
use crate::contract::{ArithmeticMode, Contract};
use crate::error::{CompileError, Result};
use crate::interp::{Layout, SlotAttributes};
use crate::util::{find_similar_name, format_suggestion_hint, suggestion_threshold};

pub type ScopeId = usize;

/// Kind of routine a routine scope compiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineKind {
    Plain,
    Fork,
    Synchronizer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Generic,
    /// checked { } / unchecked { }
    Context(ArithmeticMode),
    Routine(RoutineKind),
}

/// Static facts about a routine declaration, used for inlining
#[derive(Debug, Clone)]
pub struct RoutineInfo {
    pub arity: usize,
    /// Parameter contracts, when the routine is inlinable and all are static
    pub inline_params: Option<Vec<Contract>>,
    pub ret: Contract,
}

/// A named slot
#[derive(Debug, Clone)]
pub struct Declaration {
    pub index: usize,
    pub constant: bool,
    /// Declared contract, if known at compile time
    pub contract: Option<Contract>,
    /// Contract value held by a constant initialized with a contract literal
    pub known: Option<Contract>,
    pub routine: Option<RoutineInfo>,
}

impl Declaration {
    pub fn variable(contract: Option<Contract>) -> Self {
        Declaration {
            index: 0,
            constant: false,
            contract,
            known: None,
            routine: None,
        }
    }

    pub fn constant(contract: Option<Contract>) -> Self {
        Declaration {
            constant: true,
            ..Self::variable(contract)
        }
    }
}

/// Where an identifier lives
#[derive(Debug, Clone)]
pub enum Resolved {
    Local { hops: usize, decl: Declaration },
    Global,
}

/// Loop marker on a loop body scope
#[derive(Debug, Clone)]
pub struct LoopInfo {
    pub label: Option<String>,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    names: HashMap<String, Declaration>,
    pub loop_info: Option<LoopInfo>,
    pub in_finally: bool,
    /// Index into the tree's layouts
    layout: usize,
}

/// Arena of scopes plus the slot layouts of open routines
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    current: ScopeId,
    layouts: Vec<Vec<SlotAttributes>>,
    globals: BTreeSet<String>,
    hidden: usize,
}

impl ScopeTree {
    /// Tree with a root routine scope. `globals` are the names the host
    /// provides at run time.
    pub fn new(globals: impl IntoIterator<Item = String>) -> Self {
        ScopeTree {
            scopes: vec![Scope {
                kind: ScopeKind::Routine(RoutineKind::Plain),
                parent: None,
                names: HashMap::new(),
                loop_info: None,
                in_finally: false,
                layout: 0,
            }],
            current: 0,
            layouts: vec![Vec::new()],
            globals: globals.into_iter().collect(),
            hidden: 0,
        }
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id]
    }

    /// Enter a child of the current scope
    pub fn push(&mut self, kind: ScopeKind) -> ScopeId {
        let layout = match kind {
            ScopeKind::Routine(_) => {
                self.layouts.push(Vec::new());
                self.layouts.len() - 1
            }
            _ => self.scopes[self.current].layout,
        };
        self.scopes.push(Scope {
            kind,
            parent: Some(self.current),
            names: HashMap::new(),
            loop_info: None,
            in_finally: false,
            layout,
        });
        self.current = self.scopes.len() - 1;
        self.current
    }

    /// Enter a fork or synchronized body. Returns the body's self slot: a
    /// hidden slot in the enclosing activation that receives its proxy.
    pub fn push_boundary(&mut self, kind: RoutineKind) -> usize {
        let self_slot = self.declare_hidden("fork");
        self.push(ScopeKind::Routine(kind));
        self_slot
    }

    /// Leave the current scope. Leaving a routine scope returns its final
    /// slot layout.
    pub fn pop(&mut self) -> Option<Layout> {
        let scope = &self.scopes[self.current];
        let layout = match scope.kind {
            ScopeKind::Routine(_) => Some(Arc::from(std::mem::take(&mut self.layouts[scope.layout]))),
            _ => None,
        };
        self.current = scope.parent.unwrap_or(0);
        layout
    }

    /// Layout of the root routine, consumed at the end of compilation
    pub fn take_root_layout(&mut self) -> Layout {
        Arc::from(std::mem::take(&mut self.layouts[0]))
    }

    /// Declare `name` in the current scope. A name already declared in this
    /// scope fails; shadowing an outer declaration gets a fresh slot.
    pub fn declare(&mut self, name: &str, mut decl: Declaration, span: Span) -> Result<Declaration> {
        if self.scopes[self.current].names.contains_key(name) {
            return Err(CompileError::duplicate(name, span));
        }
        let attrs = if decl.constant {
            SlotAttributes::Immutable
        } else {
            SlotAttributes::Plain
        };
        decl.index = self.allocate(attrs);
        self.scopes[self.current].names.insert(name.to_string(), decl.clone());
        Ok(decl)
    }

    /// Slot in the current activation that no identifier can name
    pub fn declare_hidden(&mut self, prefix: &str) -> usize {
        self.hidden += 1;
        let name = format!("{prefix}#{}", self.hidden);
        let index = self.allocate(SlotAttributes::Plain);
        self.scopes[self.current]
            .names
            .insert(name, Declaration { index, ..Declaration::variable(None) });
        index
    }

    fn allocate(&mut self, attrs: SlotAttributes) -> usize {
        let layout = &mut self.layouts[self.scopes[self.current].layout];
        layout.push(attrs);
        layout.len() - 1
    }

    /// Look `name` up from the current scope outwards, then among globals
    pub fn resolve(&self, name: &str, span: Span) -> Result<Resolved> {
        let mut hops = 0;
        let mut id = Some(self.current);
        while let Some(scope_id) = id {
            let scope = &self.scopes[scope_id];
            if let Some(decl) = scope.names.get(name) {
                return Ok(Resolved::Local {
                    hops,
                    decl: decl.clone(),
                });
            }
            if matches!(scope.kind, ScopeKind::Routine(_)) {
                hops += 1;
            }
            id = scope.parent;
        }
        if self.globals.contains(name) {
            return Ok(Resolved::Global);
        }
        let visible = self.visible_names();
        let suggestion = find_similar_name(
            name,
            visible.iter().map(String::as_str),
            suggestion_threshold(name),
        );
        Err(CompileError::undeclared(name, format_suggestion_hint(suggestion), span))
    }

    /// Every name resolvable from the current scope
    pub fn visible_names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.globals.clone();
        let mut id = Some(self.current);
        while let Some(scope_id) = id {
            let scope = &self.scopes[scope_id];
            names.extend(scope.names.keys().filter(|n| !n.contains('#')).cloned());
            id = scope.parent;
        }
        names.into_iter().collect()
    }

    /// Mode fixed by the nearest enclosing context scope, if any
    pub fn mode(&self) -> Option<ArithmeticMode> {
        self.ancestors().find_map(|scope| match scope.kind {
            ScopeKind::Context(mode) => Some(mode),
            _ => None,
        })
    }

    /// Whether a loop matching `label` encloses the current scope without a
    /// routine boundary in between
    pub fn find_loop(&self, label: Option<&str>) -> bool {
        for scope in self.ancestors() {
            let matched = scope
                .loop_info
                .as_ref()
                .is_some_and(|info| label.is_none() || info.label.as_deref() == label);
            if matched {
                return true;
            }
            if matches!(scope.kind, ScopeKind::Routine(_)) {
                return false;
            }
        }
        false
    }

    /// Whether the current scope is inside a finally block of the current
    /// routine
    pub fn in_finally(&self) -> bool {
        for scope in self.ancestors() {
            if scope.in_finally {
                return true;
            }
            if matches!(scope.kind, ScopeKind::Routine(_)) {
                return false;
            }
        }
        false
    }

    fn ancestors(&self) -> impl Iterator<Item = &Scope> {
        let mut id = Some(self.current);
        std::iter::from_fn(move || {
            let scope = &self.scopes[id?];
            id = scope.parent;
            Some(scope)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ScopeTree {
        ScopeTree::new(["print".to_string()])
    }

    fn local(resolved: Resolved) -> (usize, usize) {
        match resolved {
            Resolved::Local { hops, decl } => (hops, decl.index),
            Resolved::Global => panic!("expected a local"),
        }
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut tree = tree();
        tree.declare("x", Declaration::variable(None), Span::default()).unwrap();
        let err = tree.declare("x", Declaration::variable(None), Span::new(5, 6)).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateDeclaration { .. }));
    }

    #[test]
    fn test_shadowing_gets_fresh_slot() {
        let mut tree = tree();
        let outer = tree.declare("x", Declaration::variable(None), Span::default()).unwrap();
        tree.push(ScopeKind::Generic);
        let inner = tree.declare("x", Declaration::variable(None), Span::default()).unwrap();
        assert_ne!(outer.index, inner.index);
        assert_eq!(local(tree.resolve("x", Span::default()).unwrap()), (0, inner.index));
        tree.pop();
        assert_eq!(local(tree.resolve("x", Span::default()).unwrap()), (0, outer.index));
    }

    #[test]
    fn test_routine_boundary_counts_hops() {
        let mut tree = tree();
        tree.declare("x", Declaration::variable(None), Span::default()).unwrap();
        tree.push(ScopeKind::Routine(RoutineKind::Plain));
        tree.push(ScopeKind::Generic);
        assert_eq!(local(tree.resolve("x", Span::default()).unwrap()), (1, 0));
        tree.pop();
        let layout = tree.pop().unwrap();
        assert!(layout.is_empty());
    }

    #[test]
    fn test_undeclared_with_hint() {
        let mut tree = tree();
        tree.declare("counter", Declaration::variable(None), Span::default()).unwrap();
        let err = tree.resolve("countr", Span::new(1, 7)).unwrap_err();
        assert!(err.message().contains("did you mean `counter`"));
        assert!(matches!(tree.resolve("print", Span::default()).unwrap(), Resolved::Global));
    }

    #[test]
    fn test_context_mode_is_lexical() {
        let mut tree = tree();
        assert_eq!(tree.mode(), None);
        tree.push(ScopeKind::Context(ArithmeticMode::Unchecked));
        tree.push(ScopeKind::Routine(RoutineKind::Fork));
        assert_eq!(tree.mode(), Some(ArithmeticMode::Unchecked));
        tree.push(ScopeKind::Context(ArithmeticMode::Checked));
        assert_eq!(tree.mode(), Some(ArithmeticMode::Checked));
    }

    #[test]
    fn test_loops_do_not_cross_routines() {
        let mut tree = tree();
        let body = tree.push(ScopeKind::Generic);
        tree.scope_mut(body).loop_info = Some(LoopInfo {
            label: Some("outer".into()),
        });
        assert!(tree.find_loop(None));
        assert!(tree.find_loop(Some("outer")));
        assert!(!tree.find_loop(Some("inner")));
        tree.push(ScopeKind::Routine(RoutineKind::Fork));
        assert!(!tree.find_loop(None));
    }

    #[test]
    fn test_boundary_self_slot_lives_outside() {
        let mut tree = tree();
        tree.declare("x", Declaration::variable(None), Span::default()).unwrap();
        assert_eq!(tree.push_boundary(RoutineKind::Fork), 1);
        assert_eq!(local(tree.resolve("x", Span::default()).unwrap()), (1, 0));
        assert!(tree.visible_names().iter().all(|n| !n.contains('#')));
        tree.pop();
        assert_eq!(tree.take_root_layout().len(), 2);
    }
}
