//! Instruction-format limits
//!
//! Every operand in the bytecode stream is a single byte, which caps the
//! addressable range of constants, locals, symbols, and jump distances. The
//! buffer ceilings below are what `tarn-core` pre-reserves when it creates a
//! function object.

/// Maximum number of constants per function (8-bit constant index).
pub const MAX_CONSTANTS: usize = 256;

/// Maximum number of local slots per function (8-bit local index).
pub const MAX_LOCALS: usize = 256;

/// Maximum number of interned symbols per table (8-bit symbol id). Method
/// slots and global slots are both addressed by these ids.
pub const MAX_SYMBOLS: usize = 256;

/// Maximum bytecode length of a single function, in bytes.
pub const MAX_CODE: usize = 1024;

/// Maximum argument count of a call, including the receiver.
pub const MAX_CALL_ARGS: usize = 11;

/// Maximum forward jump distance (8-bit offset operand).
pub const MAX_JUMP: usize = 255;
