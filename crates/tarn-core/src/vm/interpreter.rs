//! Bytecode dispatch loop

use super::core_lib;
use super::Vm;
use crate::gc::GcPtr;
use crate::object::{display_value, object_to_value, value_to_obj, Method, Obj, ObjFn};
use crate::value::Value;
use crate::{VmError, VmResult};
use tarn_bytecode::limits::MAX_CALL_ARGS;
use tarn_bytecode::Opcode;

impl Vm {
    /// Execute a function to completion and return its result
    ///
    /// Pushes the initial call frame (no arguments) and runs the dispatch
    /// loop until the final frame returns. Errors leave the fiber in an
    /// undefined state; the VM itself stays usable for inspection.
    pub fn interpret(&mut self, function: GcPtr) -> VmResult<Value> {
        if function.as_fn().is_none() {
            return Err(VmError::TypeError(
                "interpret requires a function".to_string(),
            ));
        }
        self.fiber.call_function(function, 0)?;
        self.run()
    }

    fn run(&mut self) -> VmResult<Value> {
        loop {
            let frame = self.fiber.current_frame()?;
            let function = frame.function;
            let function = function
                .as_fn()
                .ok_or_else(|| VmError::TypeError("call frame holds a non-function".to_string()))?;
            let mut ip = frame.ip;

            let opcode_byte = read_byte(function, &mut ip)?;
            let opcode =
                Opcode::from_u8(opcode_byte).ok_or(VmError::InvalidOpcode(opcode_byte))?;

            match opcode {
                Opcode::Constant => {
                    let index = read_byte(function, &mut ip)?;
                    let value = constant(function, index)?;
                    self.fiber.set_ip(ip)?;
                    self.fiber.push(value)?;
                }

                Opcode::Null => {
                    self.fiber.set_ip(ip)?;
                    self.fiber.push(Value::null())?;
                }
                Opcode::False => {
                    self.fiber.set_ip(ip)?;
                    self.fiber.push(Value::bool_val(false))?;
                }
                Opcode::True => {
                    self.fiber.set_ip(ip)?;
                    self.fiber.push(Value::bool_val(true))?;
                }

                Opcode::Class | Opcode::Subclass => {
                    self.fiber.set_ip(ip)?;

                    let superclass = if opcode == Opcode::Subclass {
                        let value = self.fiber.pop()?;
                        Some(as_class_ptr(value, "superclass")?)
                    } else {
                        // Implicit Object superclass; None only while Object
                        // itself is being defined.
                        self.object_class
                    };

                    let class = self.new_class(superclass);

                    // The first class ever defined is Object.
                    if self.object_class.is_none() {
                        self.object_class = Some(class);
                    }

                    // Every class answers `new` on its metaclass.
                    let new_symbol = self.methods.ensure("new")?;
                    let mut metaclass = class
                        .as_class()
                        .and_then(|c| c.metaclass)
                        .ok_or(VmError::NoMetaclass)?;
                    if let Some(metaclass) = metaclass.as_class_mut() {
                        metaclass
                            .bind_method(new_symbol, Method::Primitive(core_lib::metaclass_new));
                    }

                    self.fiber.push(object_to_value(class))?;
                }

                Opcode::Metaclass => {
                    self.fiber.set_ip(ip)?;
                    let class = as_class_ptr(self.fiber.peek()?, "receiver of METACLASS")?;
                    let metaclass = class
                        .as_class()
                        .and_then(|c| c.metaclass)
                        .ok_or(VmError::NoMetaclass)?;
                    self.fiber.push(object_to_value(metaclass))?;
                }

                Opcode::Method => {
                    let symbol = read_byte(function, &mut ip)? as u16;
                    let index = read_byte(function, &mut ip)?;
                    self.fiber.set_ip(ip)?;

                    let mut class = as_class_ptr(self.fiber.peek()?, "receiver of METHOD")?;
                    let body = value_to_obj(constant(function, index)?)
                        .filter(|obj| obj.as_fn().is_some())
                        .ok_or_else(|| {
                            VmError::TypeError("method body must be a function".to_string())
                        })?;
                    if let Some(class) = class.as_class_mut() {
                        class.bind_method(symbol, Method::Block(body));
                    }
                }

                Opcode::LoadLocal => {
                    let slot = read_byte(function, &mut ip)?;
                    self.fiber.set_ip(ip)?;
                    let value = self.fiber.load_local(slot as usize)?;
                    self.fiber.push(value)?;
                }
                Opcode::StoreLocal => {
                    let slot = read_byte(function, &mut ip)?;
                    self.fiber.set_ip(ip)?;
                    let value = self.fiber.peek()?;
                    self.fiber.store_local(slot as usize, value)?;
                }
                Opcode::LoadGlobal => {
                    let global = read_byte(function, &mut ip)?;
                    self.fiber.set_ip(ip)?;
                    self.fiber.push(self.globals[global as usize])?;
                }
                Opcode::StoreGlobal => {
                    let global = read_byte(function, &mut ip)?;
                    self.fiber.set_ip(ip)?;
                    self.globals[global as usize] = self.fiber.peek()?;
                }

                Opcode::Dup => {
                    self.fiber.set_ip(ip)?;
                    let value = self.fiber.peek()?;
                    self.fiber.push(value)?;
                }
                Opcode::Pop => {
                    self.fiber.set_ip(ip)?;
                    self.fiber.pop()?;
                }

                Opcode::Call0
                | Opcode::Call1
                | Opcode::Call2
                | Opcode::Call3
                | Opcode::Call4
                | Opcode::Call5
                | Opcode::Call6
                | Opcode::Call7
                | Opcode::Call8
                | Opcode::Call9
                | Opcode::Call10 => {
                    // The receiver counts as an argument.
                    let num_args = opcode
                        .call_arg_count()
                        .ok_or(VmError::InvalidOpcode(opcode_byte))?;
                    let symbol = read_byte(function, &mut ip)? as u16;
                    self.fiber.set_ip(ip)?;

                    let base = self
                        .fiber
                        .stack_size()
                        .checked_sub(num_args)
                        .ok_or(VmError::StackUnderflow)?;
                    let receiver = self.fiber.slot(base)?;

                    let class = self.class_of(receiver)?;
                    let method = class
                        .as_class()
                        .ok_or_else(|| {
                            VmError::TypeError("dispatch target is not a class".to_string())
                        })?
                        .method(symbol);

                    match method {
                        Method::None => {
                            return Err(VmError::DoesNotImplement {
                                receiver: display_value(receiver),
                                method: self
                                    .methods
                                    .name(symbol)
                                    .unwrap_or("<unknown>")
                                    .to_string(),
                            });
                        }
                        Method::Primitive(primitive) => {
                            let mut args = [Value::null(); MAX_CALL_ARGS];
                            for (i, slot) in args.iter_mut().enumerate().take(num_args) {
                                *slot = self.fiber.slot(base + i)?;
                            }
                            let result = primitive(self, &args[..num_args])?;

                            // A primitive returning no-value has pushed a
                            // call frame itself and left the stack in the
                            // shape that frame expects.
                            if !result.is_no_value() {
                                self.fiber.set_slot(base, result)?;
                                self.fiber.truncate(base + 1);
                            }
                        }
                        Method::Block(body) => {
                            self.fiber.call_function(body, num_args)?;
                        }
                    }
                }

                Opcode::Jump => {
                    let offset = read_byte(function, &mut ip)?;
                    ip += offset as usize;
                    self.fiber.set_ip(ip)?;
                }
                Opcode::JumpIf => {
                    let offset = read_byte(function, &mut ip)?;
                    let condition = self.fiber.pop()?;
                    // False is the only falsey value.
                    if condition.is_falsey() {
                        ip += offset as usize;
                    }
                    self.fiber.set_ip(ip)?;
                }

                Opcode::Is => {
                    self.fiber.set_ip(ip)?;
                    let class_value = self.fiber.pop()?;
                    let value = self.fiber.pop()?;
                    let expected = as_class_ptr(class_value, "right operand of IS")?;
                    // Identity only; the superclass chain is not walked.
                    let actual = self.class_of(value)?;
                    self.fiber.push(Value::bool_val(actual == expected))?;
                }

                Opcode::End => {
                    let result = self.fiber.pop()?;
                    if let Some(result) = self.fiber.return_from_frame(result)? {
                        return Ok(result);
                    }
                }
            }
        }
    }
}

#[inline]
fn read_byte(function: &ObjFn, ip: &mut usize) -> VmResult<u8> {
    let byte = *function.code.get(*ip).ok_or(VmError::UnexpectedEndOfCode)?;
    *ip += 1;
    Ok(byte)
}

#[inline]
fn constant(function: &ObjFn, index: u8) -> VmResult<Value> {
    function
        .constants
        .get(index as usize)
        .copied()
        .ok_or_else(|| VmError::RuntimeError(format!("invalid constant index {}", index)))
}

fn as_class_ptr(value: Value, what: &str) -> VmResult<GcPtr> {
    value_to_obj(value)
        .filter(|obj| obj.as_class().is_some())
        .ok_or_else(|| VmError::TypeError(format!("{} must be a class", what)))
}
