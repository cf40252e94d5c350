//! Bootstrap shim for the core-library loader
//!
//! The real core-library loader is an external collaborator: it owns the
//! catalog of primitive methods and is free to replace everything this file
//! registers. What the engine itself requires is only the bootstrap
//! contract: on construction, create the six built-in classes with `Object`
//! first (so the interpreter's first-class-is-Object heuristic agrees),
//! store their handles, and bind each class to a same-named global. That
//! global binding is what keeps the built-in classes reachable across
//! collections.
//!
//! Beyond that contract, this shim installs the handful of primitives the
//! integration tests drive — a few `Num` and `String` operations,
//! `Object.type`/`==`, and `Fn.call`, the in-tree exerciser of the no-value
//! return convention. Everything goes through the same interfaces an
//! external loader would use (`define_primitive` and the symbol tables);
//! nothing here touches engine internals.

use super::Vm;
use crate::object::{object_to_value, value_to_obj};
use crate::value::Value;
use crate::{VmError, VmResult};

pub(crate) fn load_core(vm: &mut Vm) -> VmResult<()> {
    let object_class = vm.new_class(None);
    vm.object_class = Some(object_class);
    vm.define_global("Object", object_to_value(object_class))?;
    vm.define_primitive(object_class, "type", object_type)?;
    vm.define_primitive(object_class, "==", object_eq)?;

    // The subclasses below inherit Object's methods by slot copying, so
    // Object's table must be complete before they are created.

    let bool_class = vm.new_class(Some(object_class));
    vm.bool_class = Some(bool_class);
    vm.define_global("Bool", object_to_value(bool_class))?;

    let null_class = vm.new_class(Some(object_class));
    vm.null_class = Some(null_class);
    vm.define_global("Null", object_to_value(null_class))?;

    let num_class = vm.new_class(Some(object_class));
    vm.num_class = Some(num_class);
    vm.define_global("Num", object_to_value(num_class))?;
    vm.define_primitive(num_class, "+", num_add)?;
    vm.define_primitive(num_class, "<", num_lt)?;
    vm.define_primitive(num_class, "abs", num_abs)?;

    let fn_class = vm.new_class(Some(object_class));
    vm.fn_class = Some(fn_class);
    vm.define_global("Fn", object_to_value(fn_class))?;
    vm.define_primitive(fn_class, "call", fn_call)?;

    let string_class = vm.new_class(Some(object_class));
    vm.string_class = Some(string_class);
    vm.define_global("String", object_to_value(string_class))?;
    vm.define_primitive(string_class, "count", string_count)?;
    vm.define_primitive(string_class, "+", string_add)?;

    Ok(())
}

/// Default constructor installed on every metaclass by CLASS/SUBCLASS:
/// allocates an instance of the receiver class. No initializer is invoked.
pub(crate) fn metaclass_new(vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    let class = value_to_obj(args[0])
        .filter(|obj| obj.as_class().is_some())
        .ok_or_else(|| VmError::TypeError("new requires a class receiver".to_string()))?;
    Ok(vm.new_instance(class))
}

// ===== Argument helpers =====

/// Fetch a call argument by position
///
/// The dispatcher sizes the argument window from the CALL_n opcode, not
/// from the method being invoked, so hand-assembled bytecode can reach a
/// two-argument primitive through CALL_0. A compiler that picks the opcode
/// matching the send's arity (as `BytecodeWriter::emit_call` does) never
/// takes the error path; for any other stream, the missing-argument error
/// is the defined outcome.
fn arg(args: &[Value], index: usize) -> VmResult<Value> {
    args.get(index)
        .copied()
        .ok_or_else(|| VmError::RuntimeError(format!("missing argument {}", index)))
}

fn num_arg(args: &[Value], index: usize) -> VmResult<f64> {
    arg(args, index)?
        .as_num()
        .ok_or_else(|| VmError::TypeError("operand must be a number".to_string()))
}

fn string_arg(args: &[Value], index: usize) -> VmResult<String> {
    value_to_obj(arg(args, index)?)
        .and_then(|obj| obj.as_str().map(|s| s.value.clone()))
        .ok_or_else(|| VmError::TypeError("operand must be a string".to_string()))
}

// ===== Object =====

fn object_type(vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    let class = vm.class_of(args[0])?;
    Ok(object_to_value(class))
}

fn object_eq(_vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    Ok(Value::bool_val(args[0] == arg(args, 1)?))
}

// ===== Num =====

fn num_add(_vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    Ok(Value::num(num_arg(args, 0)? + num_arg(args, 1)?))
}

fn num_lt(_vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    Ok(Value::bool_val(num_arg(args, 0)? < num_arg(args, 1)?))
}

fn num_abs(_vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    Ok(Value::num(num_arg(args, 0)?.abs()))
}

// ===== Fn =====

/// `Fn.call`: runs the receiver function in a fresh call frame. Returns the
/// no-value sentinel so the dispatcher leaves the stack to that frame.
fn fn_call(vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    let function = value_to_obj(args[0])
        .filter(|obj| obj.as_fn().is_some())
        .ok_or_else(|| VmError::TypeError("receiver must be a function".to_string()))?;
    vm.fiber.call_function(function, args.len())?;
    Ok(Value::no_value())
}

// ===== String =====

fn string_count(_vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    Ok(Value::num(string_arg(args, 0)?.len() as f64))
}

fn string_add(vm: &mut Vm, args: &[Value]) -> VmResult<Value> {
    let mut combined = string_arg(args, 0)?;
    combined.push_str(&string_arg(args, 1)?);
    Ok(vm.new_string(&combined))
}
