//! Bytecode opcodes for the Tarn VM
//!
//! This module defines the complete instruction set for the Tarn virtual
//! machine. All opcodes are single-byte instructions followed by zero, one,
//! or two single-byte operands.
//!
//! Opcodes are organized into categories:
//! - 0x00-0x0F: Literals & stack manipulation
//! - 0x10-0x1F: Local and global variables
//! - 0x20-0x2F: Classes and methods
//! - 0x30-0x3F: Method calls
//! - 0x40-0x4F: Control flow

/// Bytecode opcode enumeration
///
/// The `CallN` family encodes the argument count in the opcode itself:
/// `Call0` dispatches with just the receiver, `Call10` with the receiver and
/// ten arguments.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Literals & Stack (0x00-0x0F) =====
    /// Push a constant from the function's constant table (operand: u8 index)
    Constant = 0x00,
    /// Push the `null` literal
    Null = 0x01,
    /// Push the `false` literal
    False = 0x02,
    /// Push the `true` literal
    True = 0x03,
    /// Push a copy of the top of the stack
    Dup = 0x04,
    /// Discard the top of the stack
    Pop = 0x05,

    // ===== Variables (0x10-0x1F) =====
    /// Push a local slot of the current frame (operand: u8 slot)
    LoadLocal = 0x10,
    /// Store the top of the stack into a local slot, without popping (operand: u8 slot)
    StoreLocal = 0x11,
    /// Push the value of a global variable (operand: u8 global id)
    LoadGlobal = 0x12,
    /// Store the top of the stack into a global variable, without popping (operand: u8 global id)
    StoreGlobal = 0x13,

    // ===== Classes & Methods (0x20-0x2F) =====
    /// Create a class whose superclass is `Object`; push it
    Class = 0x20,
    /// Pop a superclass, create a class inheriting from it; push it
    Subclass = 0x21,
    /// Push the metaclass of the class on top of the stack
    Metaclass = 0x22,
    /// Bind a method on the class on top of the stack
    /// (operands: u8 method symbol, u8 constant index of the body function)
    Method = 0x23,
    /// Pop a class and a value; push whether the value's class is exactly that class
    Is = 0x24,

    // ===== Calls (0x30-0x3F) =====
    /// Dispatch a method with the receiver only (operand: u8 method symbol)
    Call0 = 0x30,
    /// Dispatch a method with the receiver and 1 argument (operand: u8 method symbol)
    Call1 = 0x31,
    /// Dispatch a method with the receiver and 2 arguments (operand: u8 method symbol)
    Call2 = 0x32,
    /// Dispatch a method with the receiver and 3 arguments (operand: u8 method symbol)
    Call3 = 0x33,
    /// Dispatch a method with the receiver and 4 arguments (operand: u8 method symbol)
    Call4 = 0x34,
    /// Dispatch a method with the receiver and 5 arguments (operand: u8 method symbol)
    Call5 = 0x35,
    /// Dispatch a method with the receiver and 6 arguments (operand: u8 method symbol)
    Call6 = 0x36,
    /// Dispatch a method with the receiver and 7 arguments (operand: u8 method symbol)
    Call7 = 0x37,
    /// Dispatch a method with the receiver and 8 arguments (operand: u8 method symbol)
    Call8 = 0x38,
    /// Dispatch a method with the receiver and 9 arguments (operand: u8 method symbol)
    Call9 = 0x39,
    /// Dispatch a method with the receiver and 10 arguments (operand: u8 method symbol)
    Call10 = 0x3A,

    // ===== Control Flow (0x40-0x4F) =====
    /// Unconditional forward jump (operand: u8 offset)
    Jump = 0x40,
    /// Pop a value; forward jump if it is `false` (operand: u8 offset)
    JumpIf = 0x41,
    /// Pop the result, pop the current call frame; the final frame's result
    /// is the value of the whole program
    End = 0x42,
}

impl Opcode {
    /// Decode an opcode from its byte representation
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            // Literals & stack
            0x00 => Some(Self::Constant),
            0x01 => Some(Self::Null),
            0x02 => Some(Self::False),
            0x03 => Some(Self::True),
            0x04 => Some(Self::Dup),
            0x05 => Some(Self::Pop),

            // Variables
            0x10 => Some(Self::LoadLocal),
            0x11 => Some(Self::StoreLocal),
            0x12 => Some(Self::LoadGlobal),
            0x13 => Some(Self::StoreGlobal),

            // Classes & methods
            0x20 => Some(Self::Class),
            0x21 => Some(Self::Subclass),
            0x22 => Some(Self::Metaclass),
            0x23 => Some(Self::Method),
            0x24 => Some(Self::Is),

            // Calls
            0x30 => Some(Self::Call0),
            0x31 => Some(Self::Call1),
            0x32 => Some(Self::Call2),
            0x33 => Some(Self::Call3),
            0x34 => Some(Self::Call4),
            0x35 => Some(Self::Call5),
            0x36 => Some(Self::Call6),
            0x37 => Some(Self::Call7),
            0x38 => Some(Self::Call8),
            0x39 => Some(Self::Call9),
            0x3A => Some(Self::Call10),

            // Control flow
            0x40 => Some(Self::Jump),
            0x41 => Some(Self::JumpIf),
            0x42 => Some(Self::End),

            _ => None,
        }
    }

    /// Encode this opcode as a byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Number of single-byte operands following this opcode
    pub fn operand_count(self) -> usize {
        match self {
            Self::Method => 2,
            Self::Constant
            | Self::LoadLocal
            | Self::StoreLocal
            | Self::LoadGlobal
            | Self::StoreGlobal
            | Self::Jump
            | Self::JumpIf => 1,
            op if op.is_call() => 1,
            _ => 0,
        }
    }

    /// Whether this opcode is one of the `CallN` family
    #[inline]
    pub fn is_call(self) -> bool {
        (Self::Call0 as u8..=Self::Call10 as u8).contains(&(self as u8))
    }

    /// Argument count of a `CallN` opcode, including the receiver
    ///
    /// Returns `None` for non-call opcodes.
    pub fn call_arg_count(self) -> Option<usize> {
        if self.is_call() {
            Some((self as u8 - Self::Call0 as u8) as usize + 1)
        } else {
            None
        }
    }

    /// The `CallN` opcode for a given argument count (excluding the receiver)
    ///
    /// Returns `None` if `args` exceeds 10.
    pub fn call(args: usize) -> Option<Self> {
        if args <= 10 {
            Self::from_u8(Self::Call0 as u8 + args as u8)
        } else {
            None
        }
    }

    /// Whether this opcode terminates execution of a function
    #[inline]
    pub fn is_terminator(self) -> bool {
        self == Self::End
    }

    /// Human-readable instruction name
    pub fn name(self) -> &'static str {
        match self {
            Self::Constant => "CONSTANT",
            Self::Null => "NULL",
            Self::False => "FALSE",
            Self::True => "TRUE",
            Self::Dup => "DUP",
            Self::Pop => "POP",
            Self::LoadLocal => "LOAD_LOCAL",
            Self::StoreLocal => "STORE_LOCAL",
            Self::LoadGlobal => "LOAD_GLOBAL",
            Self::StoreGlobal => "STORE_GLOBAL",
            Self::Class => "CLASS",
            Self::Subclass => "SUBCLASS",
            Self::Metaclass => "METACLASS",
            Self::Method => "METHOD",
            Self::Is => "IS",
            Self::Call0 => "CALL_0",
            Self::Call1 => "CALL_1",
            Self::Call2 => "CALL_2",
            Self::Call3 => "CALL_3",
            Self::Call4 => "CALL_4",
            Self::Call5 => "CALL_5",
            Self::Call6 => "CALL_6",
            Self::Call7 => "CALL_7",
            Self::Call8 => "CALL_8",
            Self::Call9 => "CALL_9",
            Self::Call10 => "CALL_10",
            Self::Jump => "JUMP",
            Self::JumpIf => "JUMP_IF",
            Self::End => "END",
        }
    }

    /// All defined opcodes, in encoding order
    pub fn all() -> impl Iterator<Item = Opcode> {
        (0u8..=0xFF).filter_map(Opcode::from_u8)
    }
}
