//! Root Register File and the Save/Restore Stack
//!
//! The evaluator keeps its entire mutable state in a fixed set of named
//! registers. The registers live inside a heap vector — the root object —
//! so that a collection sees and relocates every reference the machine is
//! holding. Host locals must never carry a heap reference across an
//! allocation; registers are the only place such a reference survives.
//!
//! Nested evaluations spill registers onto a stack that is itself a heap
//! list headed by the `Stack` register, so spilled values are collected
//! roots like any other.

use crate::error::Result;
use crate::heap::Heap;
use crate::value::Value;

/// Names of the root vector's slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// The symbol interning table (a vector of symbol lists)
    SymbolTable = 0,
    /// The expression currently being reduced
    Expression = 1,
    /// The last computed value
    Value = 2,
    /// The active lexical environment
    Environment = 3,
    /// Remaining work of the current compound form
    Unevaluated = 4,
    /// The currently dispatched callable
    Procedure = 5,
    /// Accumulated (reversed) list of evaluated arguments
    ArgumentList = 6,
    /// Boxed identifier of the next machine step to run
    Continue = 7,
    /// Head of the save/restore spill list
    Stack = 8,
    /// Reader: partially read list elements
    ReadStack = 9,
    /// Reader: the source string being read
    ReadSource = 10,
    /// Reader: reserved for a growable read buffer
    ReadBuffer = 11,
}

/// Fixed size of the root vector.
pub const NUM_REGISTERS: usize = 12;

impl Heap {
    /// Allocate the root register vector and install it as the GC root.
    /// Called once during interpreter construction, before anything else
    /// is allocated.
    pub fn install_root_vector(&mut self) -> Result<()> {
        let root = self.allocate_vector(NUM_REGISTERS)?;
        self.set_root(root);
        Ok(())
    }

    pub fn get_register(&self, register: Register) -> Value {
        self.vector_slot(self.root(), register as usize)
    }

    pub fn set_register(&mut self, register: Register, value: Value) {
        let root = self.root();
        self.vector_slot_set(root, register as usize, value);
    }

    /// Push the contents of `register` onto the spill stack.
    ///
    /// Allocates, so every reference the caller still needs must already
    /// be in a register.
    pub fn save(&mut self, register: Register) -> Result<()> {
        let pair = self.allocate_pair()?;
        let value = self.get_register(register);
        let stack = self.get_register(Register::Stack);
        self.set_car(pair, value);
        self.set_cdr(pair, stack);
        self.set_register(Register::Stack, pair);
        Ok(())
    }

    /// Pop the top of the spill stack into `register`.
    ///
    /// The machine keeps saves and restores balanced; restoring from an
    /// empty stack is a bug in the step functions, not a user error.
    pub fn restore(&mut self, register: Register) {
        let stack = self.get_register(Register::Stack);
        debug_assert!(stack.is_pair(), "restore from an empty spill stack");
        let value = self.car(stack);
        let rest = self.cdr(stack);
        self.set_register(register, value);
        self.set_register(Register::Stack, rest);
    }
}
