//! Garbage-collected heap
//!
//! Every object lives in a single allocation shaped as:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ GcHeader (8-byte aligned)               │
//! │  - marked: bool                         │
//! │  - size: usize (whole footprint)        │
//! ├─────────────────────────────────────────┤  ← GcPtr points here
//! │ Obj payload                             │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The [`Heap`] tracks every allocation in its all-objects list and accounts
//! the footprint in bytes. The mark phase lives in the VM, which owns the
//! roots (globals, pin stack, fiber); [`Heap::sweep`] frees whatever the
//! mark phase did not reach and clears the mark flag on survivors.

mod header;
mod heap;
mod ptr;

pub use header::GcHeader;
pub use heap::{Heap, HeapStats};
pub use ptr::GcPtr;
