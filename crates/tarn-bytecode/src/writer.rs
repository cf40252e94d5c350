//! Bytecode emission
//!
//! [`BytecodeWriter`] builds the instruction stream for one function. It
//! validates operand ranges as it emits; the finished byte buffer is handed
//! to `tarn-core` when filling a function object.

use crate::limits::{MAX_CODE, MAX_JUMP};
use crate::opcode::Opcode;
use thiserror::Error;

/// Errors that can occur while assembling bytecode
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssembleError {
    /// Function body exceeds the fixed code buffer
    #[error("function body exceeds the code buffer limit")]
    CodeTooLong,

    /// Call with more arguments than the instruction set encodes
    #[error("call with {0} arguments (max 10)")]
    TooManyArguments(usize),

    /// Forward jump distance does not fit in one byte
    #[error("jump of {0} bytes does not fit in a one-byte offset")]
    OffsetTooFar(usize),
}

/// Bytecode writer for a single function body
///
/// Emission is append-only; forward jumps are emitted with a placeholder
/// offset and patched once the target is known.
pub struct BytecodeWriter {
    buffer: Vec<u8>,
}

impl BytecodeWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Current length of the emitted stream, in bytes
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// The emitted bytes so far
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Validate the finished stream and return it
    pub fn finish(self) -> Result<Vec<u8>, AssembleError> {
        if self.buffer.len() > MAX_CODE {
            return Err(AssembleError::CodeTooLong);
        }
        Ok(self.buffer)
    }

    // ===== Raw emission =====

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit an opcode without operands
    pub fn emit_opcode(&mut self, opcode: Opcode) {
        self.emit_u8(opcode.to_u8());
    }

    // ===== Literals & stack =====

    /// Emit CONSTANT with a constant-table index
    pub fn emit_constant(&mut self, index: u8) {
        self.emit_opcode(Opcode::Constant);
        self.emit_u8(index);
    }

    /// Emit NULL
    pub fn emit_null(&mut self) {
        self.emit_opcode(Opcode::Null);
    }

    /// Emit FALSE
    pub fn emit_false(&mut self) {
        self.emit_opcode(Opcode::False);
    }

    /// Emit TRUE
    pub fn emit_true(&mut self) {
        self.emit_opcode(Opcode::True);
    }

    /// Emit DUP
    pub fn emit_dup(&mut self) {
        self.emit_opcode(Opcode::Dup);
    }

    /// Emit POP
    pub fn emit_pop(&mut self) {
        self.emit_opcode(Opcode::Pop);
    }

    // ===== Variables =====

    /// Emit LOAD_LOCAL
    pub fn emit_load_local(&mut self, slot: u8) {
        self.emit_opcode(Opcode::LoadLocal);
        self.emit_u8(slot);
    }

    /// Emit STORE_LOCAL
    pub fn emit_store_local(&mut self, slot: u8) {
        self.emit_opcode(Opcode::StoreLocal);
        self.emit_u8(slot);
    }

    /// Emit LOAD_GLOBAL
    pub fn emit_load_global(&mut self, global: u8) {
        self.emit_opcode(Opcode::LoadGlobal);
        self.emit_u8(global);
    }

    /// Emit STORE_GLOBAL
    pub fn emit_store_global(&mut self, global: u8) {
        self.emit_opcode(Opcode::StoreGlobal);
        self.emit_u8(global);
    }

    // ===== Classes & methods =====

    /// Emit CLASS
    pub fn emit_class(&mut self) {
        self.emit_opcode(Opcode::Class);
    }

    /// Emit SUBCLASS
    pub fn emit_subclass(&mut self) {
        self.emit_opcode(Opcode::Subclass);
    }

    /// Emit METACLASS
    pub fn emit_metaclass(&mut self) {
        self.emit_opcode(Opcode::Metaclass);
    }

    /// Emit METHOD binding a body constant to a method symbol
    pub fn emit_method(&mut self, symbol: u8, body_constant: u8) {
        self.emit_opcode(Opcode::Method);
        self.emit_u8(symbol);
        self.emit_u8(body_constant);
    }

    /// Emit IS
    pub fn emit_is(&mut self) {
        self.emit_opcode(Opcode::Is);
    }

    // ===== Calls =====

    /// Emit a CALL_n dispatch of `symbol` with `args` arguments (excluding
    /// the receiver)
    pub fn emit_call(&mut self, args: usize, symbol: u8) -> Result<(), AssembleError> {
        let opcode = Opcode::call(args).ok_or(AssembleError::TooManyArguments(args))?;
        self.emit_opcode(opcode);
        self.emit_u8(symbol);
        Ok(())
    }

    // ===== Control flow =====

    /// Emit JUMP with a known forward offset
    pub fn emit_jump(&mut self, offset: u8) {
        self.emit_opcode(Opcode::Jump);
        self.emit_u8(offset);
    }

    /// Emit JUMP_IF with a known forward offset
    pub fn emit_jump_if(&mut self, offset: u8) {
        self.emit_opcode(Opcode::JumpIf);
        self.emit_u8(offset);
    }

    /// Emit JUMP with a placeholder offset; returns the operand position for
    /// [`BytecodeWriter::patch_jump`]
    pub fn emit_jump_placeholder(&mut self) -> usize {
        self.emit_opcode(Opcode::Jump);
        let at = self.offset();
        self.emit_u8(0);
        at
    }

    /// Emit JUMP_IF with a placeholder offset; returns the operand position
    /// for [`BytecodeWriter::patch_jump`]
    pub fn emit_jump_if_placeholder(&mut self) -> usize {
        self.emit_opcode(Opcode::JumpIf);
        let at = self.offset();
        self.emit_u8(0);
        at
    }

    /// Emit END
    pub fn emit_end(&mut self) {
        self.emit_opcode(Opcode::End);
    }

    /// Patch a placeholder jump operand at `operand_at` so the jump lands on
    /// the current offset
    ///
    /// Jumps are relative to the instruction pointer after the operand has
    /// been consumed.
    pub fn patch_jump(&mut self, operand_at: usize) -> Result<(), AssembleError> {
        let distance = self.offset() - (operand_at + 1);
        if distance > MAX_JUMP {
            return Err(AssembleError::OffsetTooFar(distance));
        }
        self.buffer[operand_at] = distance as u8;
        Ok(())
    }
}

impl Default for BytecodeWriter {
    fn default() -> Self {
        Self::new()
    }
}
