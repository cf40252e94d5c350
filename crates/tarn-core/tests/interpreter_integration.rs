//! Integration tests for the bytecode interpreter
//!
//! Tests cover:
//! - Literals, locals, globals, and stack manipulation
//! - Conditional branches and the falsey-only-false rule
//! - Class creation, method binding, and dispatch
//! - Subclass overrides
//! - Primitive methods, including the no-value frame-push convention

use tarn_bytecode::Opcode;
use tarn_core::{object_to_value, value_to_obj, GcPtr, Obj, Value, Vm, VmError};

/// Build a function object from hand-assembled code and constants
fn make_function(vm: &mut Vm, code: &[u8], constants: &[Value]) -> GcPtr {
    let mut function = vm.new_function();
    vm.pin(object_to_value(function));
    {
        let function = function.as_fn_mut().unwrap();
        for &constant in constants {
            function.add_constant(constant).unwrap();
        }
        function.code.extend_from_slice(code);
    }
    vm.unpin(object_to_value(function));
    function
}

/// Assemble and run a single function
fn run(vm: &mut Vm, code: &[u8], constants: &[Value]) -> Value {
    let function = make_function(vm, code, constants);
    vm.interpret(function).unwrap()
}

#[test]
fn test_constant_return() {
    let mut vm = Vm::new();
    let result = run(
        &mut vm,
        &[Opcode::Constant as u8, 0, Opcode::End as u8],
        &[Value::num(42.0)],
    );
    assert_eq!(result, Value::num(42.0));
}

#[test]
fn test_literals() {
    let mut vm = Vm::new();
    assert_eq!(
        run(&mut vm, &[Opcode::Null as u8, Opcode::End as u8], &[]),
        Value::null()
    );
    assert_eq!(
        run(&mut vm, &[Opcode::True as u8, Opcode::End as u8], &[]),
        Value::bool_val(true)
    );
    assert_eq!(
        run(&mut vm, &[Opcode::False as u8, Opcode::End as u8], &[]),
        Value::bool_val(false)
    );
}

/// Branch skeleton shared by the jump tests:
///
/// ```text
/// <condition>
/// JUMP_IF +4      ; over the then-branch and its jump
/// CONSTANT 0      ; then: 1
/// JUMP +2         ; over the else-branch
/// CONSTANT 1      ; else: 2
/// END
/// ```
fn branch_code(condition: Opcode) -> Vec<u8> {
    vec![
        condition as u8,
        Opcode::JumpIf as u8,
        4,
        Opcode::Constant as u8,
        0,
        Opcode::Jump as u8,
        2,
        Opcode::Constant as u8,
        1,
        Opcode::End as u8,
    ]
}

#[test]
fn test_jump_if_true_takes_then_branch() {
    let mut vm = Vm::new();
    let constants = [Value::num(1.0), Value::num(2.0)];
    let result = run(&mut vm, &branch_code(Opcode::True), &constants);
    assert_eq!(result, Value::num(1.0));
}

#[test]
fn test_jump_if_false_takes_else_branch() {
    let mut vm = Vm::new();
    let constants = [Value::num(1.0), Value::num(2.0)];
    let result = run(&mut vm, &branch_code(Opcode::False), &constants);
    assert_eq!(result, Value::num(2.0));
}

#[test]
fn test_null_is_truthy_in_jump_if() {
    // Only false takes the branch; null does not.
    let mut vm = Vm::new();
    let constants = [Value::num(1.0), Value::num(2.0)];
    let result = run(&mut vm, &branch_code(Opcode::Null), &constants);
    assert_eq!(result, Value::num(1.0));
}

#[test]
fn test_locals_are_stack_slots() {
    let mut vm = Vm::new();
    let constants = [Value::num(10.0), Value::num(20.0)];

    // Two pushes, then re-load slot 0.
    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Constant as u8,
            1,
            Opcode::LoadLocal as u8,
            0,
            Opcode::End as u8,
        ],
        &constants,
    );
    assert_eq!(result, Value::num(10.0));
}

#[test]
fn test_store_local_overwrites_without_popping() {
    let mut vm = Vm::new();
    let constants = [Value::num(10.0), Value::num(20.0)];

    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Constant as u8,
            1,
            Opcode::StoreLocal as u8,
            0,
            Opcode::Pop as u8,
            Opcode::LoadLocal as u8,
            0,
            Opcode::End as u8,
        ],
        &constants,
    );
    assert_eq!(result, Value::num(20.0));
}

#[test]
fn test_globals_persist_across_runs() {
    let mut vm = Vm::new();
    let global = vm.global_symbols_mut().ensure("x").unwrap() as u8;

    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::StoreGlobal as u8,
            global,
            Opcode::End as u8,
        ],
        &[Value::num(3.5)],
    );
    assert_eq!(result, Value::num(3.5));
    assert_eq!(vm.find_global("x"), Some(Value::num(3.5)));

    let result = run(
        &mut vm,
        &[Opcode::LoadGlobal as u8, global, Opcode::End as u8],
        &[],
    );
    assert_eq!(result, Value::num(3.5));
}

#[test]
fn test_dup_and_pop() {
    let mut vm = Vm::new();
    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Dup as u8,
            Opcode::Pop as u8,
            Opcode::End as u8,
        ],
        &[Value::num(8.0)],
    );
    assert_eq!(result, Value::num(8.0));
}

#[test]
fn test_class_new_returns_instance() {
    let mut vm = Vm::new();
    let global = vm.global_symbols_mut().ensure("C").unwrap() as u8;
    let new_symbol = vm.methods_mut().ensure("new").unwrap() as u8;

    let result = run(
        &mut vm,
        &[
            Opcode::Class as u8,
            Opcode::StoreGlobal as u8,
            global,
            Opcode::Pop as u8,
            Opcode::LoadGlobal as u8,
            global,
            Opcode::Call0 as u8,
            new_symbol,
            Opcode::End as u8,
        ],
        &[],
    );

    let class = value_to_obj(vm.find_global("C").unwrap()).unwrap();
    let instance = value_to_obj(result).expect("new should return an object");
    assert_eq!(instance.as_instance().unwrap().class, class);
}

#[test]
fn test_method_dispatch() {
    let mut vm = Vm::new();
    let global = vm.global_symbols_mut().ensure("C").unwrap() as u8;
    let new_symbol = vm.methods_mut().ensure("new").unwrap() as u8;
    let m_symbol = vm.methods_mut().ensure("m").unwrap() as u8;

    // m() { return 7 }
    let body = make_function(
        &mut vm,
        &[Opcode::Constant as u8, 0, Opcode::End as u8],
        &[Value::num(7.0)],
    );
    vm.pin(object_to_value(body));
    let main = make_function(
        &mut vm,
        &[
            Opcode::Class as u8,
            Opcode::Method as u8,
            m_symbol,
            0,
            Opcode::StoreGlobal as u8,
            global,
            Opcode::Pop as u8,
            Opcode::LoadGlobal as u8,
            global,
            Opcode::Call0 as u8,
            new_symbol,
            Opcode::Call0 as u8,
            m_symbol,
            Opcode::End as u8,
        ],
        &[object_to_value(body)],
    );
    vm.unpin(object_to_value(body));

    assert_eq!(vm.interpret(main).unwrap(), Value::num(7.0));
}

#[test]
fn test_subclass_override() {
    let mut vm = Vm::new();
    let c_global = vm.global_symbols_mut().ensure("C").unwrap() as u8;
    let d_global = vm.global_symbols_mut().ensure("D").unwrap() as u8;
    let new_symbol = vm.methods_mut().ensure("new").unwrap() as u8;
    let m_symbol = vm.methods_mut().ensure("m").unwrap() as u8;

    // Define C with m() { return 7 } and leave it in a global.
    let c_body = make_function(
        &mut vm,
        &[Opcode::Constant as u8, 0, Opcode::End as u8],
        &[Value::num(7.0)],
    );
    vm.pin(object_to_value(c_body));
    let define_c = make_function(
        &mut vm,
        &[
            Opcode::Class as u8,
            Opcode::Method as u8,
            m_symbol,
            0,
            Opcode::StoreGlobal as u8,
            c_global,
            Opcode::End as u8,
        ],
        &[object_to_value(c_body)],
    );
    vm.unpin(object_to_value(c_body));
    vm.interpret(define_c).unwrap();

    // Define D as a subclass of C, overriding m() { return 9 }.
    let d_body = make_function(
        &mut vm,
        &[Opcode::Constant as u8, 0, Opcode::End as u8],
        &[Value::num(9.0)],
    );
    vm.pin(object_to_value(d_body));
    let define_d = make_function(
        &mut vm,
        &[
            Opcode::LoadGlobal as u8,
            c_global,
            Opcode::Subclass as u8,
            Opcode::Method as u8,
            m_symbol,
            0,
            Opcode::StoreGlobal as u8,
            d_global,
            Opcode::End as u8,
        ],
        &[object_to_value(d_body)],
    );
    vm.unpin(object_to_value(d_body));
    vm.interpret(define_d).unwrap();

    // (D new) m == 9
    let call_on_d = make_function(
        &mut vm,
        &[
            Opcode::LoadGlobal as u8,
            d_global,
            Opcode::Call0 as u8,
            new_symbol,
            Opcode::Call0 as u8,
            m_symbol,
            Opcode::End as u8,
        ],
        &[],
    );
    assert_eq!(vm.interpret(call_on_d).unwrap(), Value::num(9.0));

    // (C new) m still == 7: the override did not leak upward.
    let call_on_c = make_function(
        &mut vm,
        &[
            Opcode::LoadGlobal as u8,
            c_global,
            Opcode::Call0 as u8,
            new_symbol,
            Opcode::Call0 as u8,
            m_symbol,
            Opcode::End as u8,
        ],
        &[],
    );
    assert_eq!(vm.interpret(call_on_c).unwrap(), Value::num(7.0));
}

#[test]
fn test_metaclass_opcode() {
    let mut vm = Vm::new();
    let global = vm.global_symbols_mut().ensure("C").unwrap() as u8;

    let result = run(
        &mut vm,
        &[
            Opcode::Class as u8,
            Opcode::StoreGlobal as u8,
            global,
            Opcode::Metaclass as u8,
            Opcode::End as u8,
        ],
        &[],
    );

    let class = value_to_obj(vm.find_global("C").unwrap()).unwrap();
    let metaclass = class.as_class().unwrap().metaclass.unwrap();
    assert_eq!(value_to_obj(result).unwrap(), metaclass);
}

#[test]
fn test_is_compares_identity_only() {
    let mut vm = Vm::new();
    let num_global = vm.global_symbols_mut().ensure("Num").unwrap() as u8;
    let bool_global = vm.global_symbols_mut().ensure("Bool").unwrap() as u8;
    let object_global = vm.global_symbols_mut().ensure("Object").unwrap() as u8;
    let c_global = vm.global_symbols_mut().ensure("C").unwrap() as u8;
    let new_symbol = vm.methods_mut().ensure("new").unwrap() as u8;

    // 3 is Num
    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::LoadGlobal as u8,
            num_global,
            Opcode::Is as u8,
            Opcode::End as u8,
        ],
        &[Value::num(3.0)],
    );
    assert_eq!(result, Value::bool_val(true));

    // 3 is Bool
    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::LoadGlobal as u8,
            bool_global,
            Opcode::Is as u8,
            Opcode::End as u8,
        ],
        &[Value::num(3.0)],
    );
    assert_eq!(result, Value::bool_val(false));

    // (C new) is Object: false, because IS does not walk the superclass
    // chain.
    let result = run(
        &mut vm,
        &[
            Opcode::Class as u8,
            Opcode::StoreGlobal as u8,
            c_global,
            Opcode::Call0 as u8,
            new_symbol,
            Opcode::LoadGlobal as u8,
            object_global,
            Opcode::Is as u8,
            Opcode::End as u8,
        ],
        &[],
    );
    assert_eq!(result, Value::bool_val(false));
}

#[test]
fn test_num_primitives() {
    let mut vm = Vm::new();
    let plus = vm.methods_mut().ensure("+").unwrap() as u8;
    let less = vm.methods_mut().ensure("<").unwrap() as u8;
    let abs = vm.methods_mut().ensure("abs").unwrap() as u8;

    let constants = [Value::num(3.0), Value::num(4.0)];
    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Constant as u8,
            1,
            Opcode::Call1 as u8,
            plus,
            Opcode::End as u8,
        ],
        &constants,
    );
    assert_eq!(result, Value::num(7.0));

    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Constant as u8,
            1,
            Opcode::Call1 as u8,
            less,
            Opcode::End as u8,
        ],
        &constants,
    );
    assert_eq!(result, Value::bool_val(true));

    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Call0 as u8,
            abs,
            Opcode::End as u8,
        ],
        &[Value::num(-5.0)],
    );
    assert_eq!(result, Value::num(5.0));
}

#[test]
fn test_string_primitives() {
    let mut vm = Vm::new();
    let plus = vm.methods_mut().ensure("+").unwrap() as u8;
    let count = vm.methods_mut().ensure("count").unwrap() as u8;

    let foo = vm.new_string("foo");
    vm.pin(foo);
    let bar = vm.new_string("bar");
    vm.pin(bar);
    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Constant as u8,
            1,
            Opcode::Call1 as u8,
            plus,
            Opcode::End as u8,
        ],
        &[foo, bar],
    );
    vm.unpin(bar);
    vm.unpin(foo);

    let combined = value_to_obj(result).unwrap();
    assert_eq!(combined.as_str().unwrap().value, "foobar");

    let hello = vm.new_string("hello");
    vm.pin(hello);
    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Call0 as u8,
            count,
            Opcode::End as u8,
        ],
        &[hello],
    );
    vm.unpin(hello);
    assert_eq!(result, Value::num(5.0));
}

#[test]
fn test_fn_call_pushes_a_frame() {
    // `call` is a primitive that pushes a frame and returns no-value; the
    // callee's result must surface as the call's result.
    let mut vm = Vm::new();
    let call = vm.methods_mut().ensure("call").unwrap() as u8;

    let callee = make_function(
        &mut vm,
        &[Opcode::Constant as u8, 0, Opcode::End as u8],
        &[Value::num(5.0)],
    );
    vm.pin(object_to_value(callee));
    let main = make_function(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Call0 as u8,
            call,
            Opcode::End as u8,
        ],
        &[object_to_value(callee)],
    );
    vm.unpin(object_to_value(callee));

    assert_eq!(vm.interpret(main).unwrap(), Value::num(5.0));
}

#[test]
fn test_object_type_and_equality() {
    let mut vm = Vm::new();
    let type_symbol = vm.methods_mut().ensure("type").unwrap() as u8;
    let eq = vm.methods_mut().ensure("==").unwrap() as u8;

    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Call0 as u8,
            type_symbol,
            Opcode::End as u8,
        ],
        &[Value::num(1.0)],
    );
    assert_eq!(result, vm.find_global("Num").unwrap());

    let result = run(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Constant as u8,
            1,
            Opcode::Call1 as u8,
            eq,
            Opcode::End as u8,
        ],
        &[Value::num(1.0), Value::num(1.0)],
    );
    assert_eq!(result, Value::bool_val(true));
}

#[test]
fn test_dispatch_failure_is_an_error() {
    let mut vm = Vm::new();
    let missing = vm.methods_mut().ensure("frobnicate").unwrap() as u8;

    let function = make_function(
        &mut vm,
        &[
            Opcode::Null as u8,
            Opcode::Call0 as u8,
            missing,
            Opcode::End as u8,
        ],
        &[],
    );
    let err = vm.interpret(function).unwrap_err();
    match err {
        VmError::DoesNotImplement { receiver, method } => {
            assert_eq!(receiver, "null");
            assert_eq!(method, "frobnicate");
        }
        other => panic!("expected DoesNotImplement, got {:?}", other),
    }
}

#[test]
fn test_call_below_a_primitive_arity_is_a_runtime_error() {
    // The argument window is sized by the CALL_n opcode, so hand-assembled
    // bytecode can invoke the two-argument `+` with just the receiver. The
    // primitive's missing-argument error is the defined outcome; a compiler
    // that matches the opcode to the send's arity never reaches it.
    let mut vm = Vm::new();
    let plus = vm.methods_mut().ensure("+").unwrap() as u8;

    let function = make_function(
        &mut vm,
        &[
            Opcode::Constant as u8,
            0,
            Opcode::Call0 as u8,
            plus,
            Opcode::End as u8,
        ],
        &[Value::num(3.0)],
    );
    assert!(matches!(
        vm.interpret(function),
        Err(VmError::RuntimeError(_))
    ));
}

#[test]
fn test_interpret_rejects_non_function() {
    let mut vm = Vm::new();
    let class = value_to_obj(vm.find_global("Object").unwrap()).unwrap();
    assert!(matches!(
        vm.interpret(class),
        Err(VmError::TypeError(_))
    ));
}

#[test]
fn test_invalid_opcode_is_an_error() {
    let mut vm = Vm::new();
    let function = make_function(&mut vm, &[0xEE], &[]);
    assert!(matches!(
        vm.interpret(function),
        Err(VmError::InvalidOpcode(0xEE))
    ));
}

#[test]
fn test_running_off_the_end_is_an_error() {
    let mut vm = Vm::new();
    // CONSTANT with its operand missing.
    let function = make_function(&mut vm, &[Opcode::Constant as u8], &[]);
    assert!(matches!(
        vm.interpret(function),
        Err(VmError::UnexpectedEndOfCode)
    ));
}
