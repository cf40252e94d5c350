//! Tarn VM Core Runtime
//!
//! This crate provides the execution engine for the Tarn language:
//! - NaN-boxed value representation
//! - Mark-and-sweep garbage collector with pinning
//! - Class/metaclass object model with flattened single inheritance
//! - Symbol tables for method and global names
//! - Stack-based bytecode interpreter driving a call-frame fiber
//!
//! The VM is strictly single-threaded: one [`Vm`] owns the heap, the symbol
//! tables, and the fiber, and nothing is shared.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod fiber;
pub mod gc;
pub mod object;
pub mod symbol;
pub mod value;
pub mod vm;

pub use fiber::{CallFrame, Fiber};
pub use gc::{GcHeader, GcPtr, Heap, HeapStats};
pub use object::{
    display_value, object_to_value, value_to_obj, Method, Obj, ObjClass, ObjFn, ObjInstance,
    ObjString, PrimitiveFn,
};
pub use symbol::SymbolTable;
pub use value::Value;
pub use vm::{Vm, VmOptions};

/// VM execution errors
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Operand stack exceeded its slot limit
    #[error("stack overflow")]
    StackOverflow,

    /// Operand stack popped or read past its base
    #[error("stack underflow")]
    StackUnderflow,

    /// Call frame stack exceeded its limit
    #[error("call frame overflow")]
    FrameOverflow,

    /// Byte does not decode to an instruction
    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    /// Instruction or operand fetch ran past the end of the function
    #[error("unexpected end of bytecode")]
    UnexpectedEndOfCode,

    /// Value had the wrong type for an operation
    #[error("type error: {0}")]
    TypeError(String),

    /// Method dispatch found no implementation on the receiver's class
    #[error("receiver {receiver} does not implement method \"{method}\"")]
    DoesNotImplement {
        /// Rendered receiver value
        receiver: String,
        /// Method name looked up in the symbol table
        method: String,
    },

    /// Method dispatch on a metaclass value, which has no metaclass of its own
    #[error("class has no metaclass")]
    NoMetaclass,

    /// A built-in class handle was consulted before bootstrap installed it
    #[error("core class {0} is not initialized")]
    CoreClassMissing(&'static str),

    /// Symbol table is full
    #[error("too many symbols")]
    TooManySymbols,

    /// Symbol already present where a fresh definition was required
    #[error("duplicate symbol \"{0}\"")]
    DuplicateSymbol(String),

    /// Function constant table is full
    #[error("too many constants in function")]
    TooManyConstants,

    /// Any other runtime error
    #[error("runtime error: {0}")]
    RuntimeError(String),
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;
