//! Wisp Core: the interpreter's object model
//!
//! Key design principles:
//! - Value: a single NaN-boxed machine word; compound data is an index
//!   into the heap, never a host pointer
//! - Heap: two-space copying collection; any allocation may move every
//!   live object
//! - Registers: the complete mutable state of the machine lives inside a
//!   heap vector, so the collector can see and relocate it
//!
//! The evaluator and reader live in `wisp-runtime`, layered on this crate.

pub mod error;
pub mod heap;
pub mod printer;
pub mod registers;
pub mod symbols;
pub mod value;

pub use error::{ErrorCode, Result};
pub use heap::{Heap, HeapStats};
pub use registers::{NUM_REGISTERS, Register};
pub use symbols::hash_bytes;
pub use value::{MAX_FIXNUM, MIN_FIXNUM, Tag, Value};
