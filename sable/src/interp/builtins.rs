//! Library globals installed by the host

use std::sync::Arc;
use std::time::Duration;

use super::{Frame, InterpResult, NativeFunction, RuntimeError, ScriptObject, Value};
use crate::contract::{convert, intersect, union, Contract};
use crate::queue::{LazyQueue, ParallelQueue, WorkItemQueue};

/// Install the standard globals into `globals`. `default_queue` is exposed
/// to scripts under that name.
pub fn install(globals: &ScriptObject, default_queue: Arc<dyn WorkItemQueue>) {
    globals.define_constant("parallel", Value::Queue(Arc::new(ParallelQueue::new())));
    globals.define_constant("lazy", Value::Queue(Arc::new(LazyQueue::new())));
    globals.define_constant("default_queue", Value::Queue(default_queue));

    let natives = [
        NativeFunction::new("sleep", Some(1), sleep).inlinable(),
        NativeFunction::new("print", None, print),
        NativeFunction::new("len", Some(1), len).inlinable(),
        NativeFunction::new("relationship", Some(2), relationship).inlinable(),
        NativeFunction::new("union", Some(2), |args, _| {
            Ok(Value::Contract(union(&contract_arg(&args[0])?, &contract_arg(&args[1])?)))
        })
        .inlinable(),
        NativeFunction::new("intersect", Some(2), |args, _| {
            let met = intersect(&contract_arg(&args[0])?, &contract_arg(&args[1])?);
            Ok(met.map(Value::Contract).unwrap_or(Value::Void))
        })
        .inlinable(),
        NativeFunction::new("contract_of", Some(1), |args, _| {
            Ok(Value::Contract(Contract::of(&args[0].clone().resolve()?)))
        }),
        NativeFunction::new("custom", Some(1), |args, _| {
            Ok(Value::Contract(Contract::custom(args[0].clone().resolve()?.to_string())))
        }),
        NativeFunction::new("new", Some(2), construct),
    ];
    for native in natives {
        let name = native.name().to_string();
        globals.define_constant(&name, Value::Native(Arc::new(native)));
    }
}

fn contract_arg(value: &Value) -> InterpResult<Contract> {
    match value.clone().resolve()? {
        Value::Contract(contract) => Ok(contract),
        other => Err(RuntimeError::contract_binding(&other, &Contract::Meta)),
    }
}

fn sleep(args: &[Value], _: &mut Frame) -> InterpResult<Value> {
    let millis = match args[0].clone().resolve()? {
        Value::Integer(n) => n.max(0) as u64,
        Value::Real(x) if x > 0.0 => x as u64,
        Value::Real(_) => 0,
        other => return Err(RuntimeError::contract_binding(&other, &Contract::INTEGER)),
    };
    std::thread::sleep(Duration::from_millis(millis));
    Ok(Value::Void)
}

fn print(args: &[Value], _: &mut Frame) -> InterpResult<Value> {
    let parts = args
        .iter()
        .map(|arg| arg.clone().resolve().map(|v| v.to_string()))
        .collect::<InterpResult<Vec<_>>>()?;
    println!("{}", parts.join(" "));
    Ok(Value::Void)
}

fn len(args: &[Value], _: &mut Frame) -> InterpResult<Value> {
    let n = match args[0].clone().resolve()? {
        Value::Array(items) => items.len(),
        Value::String(s) => s.chars().count(),
        Value::Object(object) => object.len(),
        other => return Err(RuntimeError::not_iterable(&other)),
    };
    Ok(Value::Integer(n as i64))
}

fn relationship(args: &[Value], frame: &mut Frame) -> InterpResult<Value> {
    let (a, b) = (contract_arg(&args[0])?, contract_arg(&args[1])?);
    let relation = frame.state.cache.relationship(&a, &b);
    Ok(Value::string(&relation.to_string()))
}

/// `new(contract, object)`: a custom contract stamps a copy of the object
/// with its identity; any other contract converts the object.
fn construct(args: &[Value], frame: &mut Frame) -> InterpResult<Value> {
    let contract = contract_arg(&args[0])?;
    let init = args[1].clone().resolve()?;
    match (&contract, &init) {
        (Contract::Custom(custom), Value::Object(source)) => {
            let object = ScriptObject::with_constructor(Arc::clone(custom));
            for (name, member) in source.members() {
                object.define(&name, member, None);
            }
            Ok(Value::object(object))
        }
        (Contract::Custom(custom), Value::Void) => {
            Ok(Value::object(ScriptObject::with_constructor(Arc::clone(custom))))
        }
        (Contract::Custom(_), _) => Err(RuntimeError::contract_binding(&init, &contract)),
        _ => convert(&init, &contract, frame.state.mode),
    }
}
