//! Callable values: compiled routines and host functions

use std::fmt;
use std::sync::Arc;

use super::{Environment, ErrorKind, Eval, Frame, InterpResult, Layout, RuntimeError, Value, MAX_CALL_DEPTH};
use crate::contract::{convert, ArithmeticMode, Contract, FunctionSignature};

/// Stack growth parameters for deep recursion
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Routine compiled from a function declaration, lambda or fork body
pub struct Routine {
    pub name: String,
    /// Parameter contracts; parameters occupy the first slots of the layout
    pub params: Vec<Contract>,
    pub ret: Contract,
    /// Lexical checked/unchecked override at the definition site
    pub mode: Option<ArithmeticMode>,
    pub inlinable: bool,
    pub(crate) body: Eval,
    pub(crate) layout: Layout,
    /// Activation the routine was defined in
    pub(crate) captured: Option<Arc<Environment>>,
}

impl Routine {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn signature(&self) -> FunctionSignature {
        FunctionSignature {
            params: self.params.clone(),
            ret: self.ret.clone(),
        }
    }

    /// Dynamic dispatch: check the argument count and convert every
    /// argument to its parameter contract
    pub fn call(&self, args: Vec<Value>, frame: &mut Frame) -> InterpResult<Value> {
        if args.len() != self.params.len() {
            return Err(RuntimeError::arity_mismatch(&self.name, self.params.len(), args.len()));
        }
        let mode = frame.mode(self.mode);
        let args = self
            .params
            .iter()
            .zip(args)
            .map(|(contract, arg)| convert(&arg, contract, mode))
            .collect::<InterpResult<Vec<_>>>()?;
        self.enter(args, frame)
    }

    /// Direct entry with arguments already counted and converted
    pub fn enter(&self, args: Vec<Value>, frame: &mut Frame) -> InterpResult<Value> {
        if frame.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::stack_overflow());
        }
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.enter_inner(args, frame))
    }

    fn enter_inner(&self, args: Vec<Value>, frame: &mut Frame) -> InterpResult<Value> {
        let mode = frame.mode(self.mode);
        let env = Environment::new(&self.layout, self.captured.clone());

        frame.enter(env, |callee| {
            if let Some(calls) = callee.calls.as_mut() {
                calls.push(&self.name, &args);
            }
            let result = self.bind_and_run(args, callee, mode);
            if let Some(calls) = callee.calls.as_mut() {
                calls.pop();
            }
            result
        })
    }

    fn bind_and_run(&self, args: Vec<Value>, callee: &mut Frame, mode: ArithmeticMode) -> InterpResult<Value> {
        for (index, (arg, contract)) in args.into_iter().zip(&self.params).enumerate() {
            let bound = (!matches!(contract, Contract::Super)).then(|| contract.clone());
            callee.env.slot(0, index).bind(arg, bound);
        }
        let value = match (self.body)(callee) {
            Ok(value) => value,
            Err(RuntimeError {
                kind: ErrorKind::Return(value),
                ..
            }) => *value,
            Err(err) => return Err(err),
        };
        convert(&value, &self.ret, mode)
    }
}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Routine({}: {})", self.name, Contract::Function(Arc::new(self.signature())))
    }
}

/// Host function body; receives the caller's frame
pub type NativeFn = dyn Fn(&[Value], &mut Frame) -> InterpResult<Value> + Send + Sync;

/// Routine implemented by the host
pub struct NativeFunction {
    name: String,
    arity: Option<usize>,
    inlinable: bool,
    f: Box<NativeFn>,
}

impl NativeFunction {
    /// `arity` of `None` accepts any number of arguments
    pub fn new(
        name: impl Into<String>,
        arity: Option<usize>,
        f: impl Fn(&[Value], &mut Frame) -> InterpResult<Value> + Send + Sync + 'static,
    ) -> Self {
        NativeFunction {
            name: name.into(),
            arity,
            inlinable: false,
            f: Box::new(f),
        }
    }

    /// Allow call sites with matching arity to bind directly
    pub fn inlinable(mut self) -> Self {
        self.inlinable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    pub fn is_inlinable(&self) -> bool {
        self.inlinable
    }

    pub fn call(&self, args: &[Value], frame: &mut Frame) -> InterpResult<Value> {
        match self.arity {
            Some(arity) if arity != args.len() => {
                return Err(RuntimeError::arity_mismatch(&self.name, arity, args.len()));
            }
            _ => {}
        }
        self.invoke(args, frame)
    }

    /// Direct entry without the arity check
    pub fn invoke(&self, args: &[Value], frame: &mut Frame) -> InterpResult<Value> {
        (self.f)(args, frame)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// Invoke any callable value (the `invoke` capability).
///
/// A contract used as a callee converts its single argument.
pub fn invoke(callee: &Value, args: Vec<Value>, frame: &mut Frame) -> InterpResult<Value> {
    match callee {
        Value::Routine(routine) => routine.call(args, frame),
        Value::Native(native) => native.call(&args, frame),
        Value::Contract(contract) => match args.as_slice() {
            [arg] => convert(arg, contract, frame.state.mode),
            _ => Err(RuntimeError::arity_mismatch(&contract.to_string(), 1, args.len())),
        },
        Value::Proxy(_) => {
            let resolved = callee.clone().resolve()?;
            invoke(&resolved, args, frame)
        }
        other => Err(RuntimeError::not_callable(other)),
    }
}
