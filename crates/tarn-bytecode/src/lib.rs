//! Tarn VM Bytecode Definitions
//!
//! This crate provides the instruction set and byte-level emission utilities
//! for the Tarn virtual machine. The compiler and the embedding tests target
//! this crate; the runtime lives in `tarn-core`.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod limits;
pub mod opcode;
pub mod writer;

pub use opcode::Opcode;
pub use writer::{AssembleError, BytecodeWriter};
