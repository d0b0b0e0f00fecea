//! The Interpreter Instance
//!
//! Ties the heap, the reader, the evaluator and the primitive library
//! into one handle. All state is per-instance — tests and embedders can
//! run several interpreters side by side and tear them down independently.

use tracing::debug;

use wisp_core::{Heap, HeapStats, Register, Result, Value};

use crate::env::define_variable;
use crate::eval;
use crate::primitives::PRIMITIVES;
use crate::reader::Reader;

/// Default size of each heap semispace, in 8-byte words.
pub const DEFAULT_HEAP_WORDS: usize = 1 << 16;

/// Default number of symbol-table buckets.
pub const DEFAULT_SYMBOL_BUCKETS: usize = 251;

/// Symbols the machine itself depends on: the six special forms, and the
/// conventional result of an assignment. Interned eagerly so dispatch and
/// the reader can use non-allocating lookups.
const WIRED_SYMBOLS: &[&str] = &["quote", "set!", "define", "if", "fn", "begin", "ok"];

/// A complete interpreter: heap, registers, symbol table, global
/// environment with the primitive bindings installed.
pub struct Interpreter {
    heap: Heap,
}

impl Interpreter {
    /// Build an interpreter with `heap_words` per semispace and
    /// `symbol_buckets` interning buckets.
    pub fn new(heap_words: usize, symbol_buckets: usize) -> Result<Interpreter> {
        let mut heap = Heap::new(heap_words);
        heap.install_root_vector()?;
        heap.make_symbol_table(symbol_buckets)?;
        for name in WIRED_SYMBOLS {
            heap.intern(name)?;
        }

        // The global environment: one scope, initially empty.
        heap.ensure_capacity(4)?;
        let scope = heap.allocate_pair()?;
        let frame = heap.allocate_pair()?;
        heap.set_car(frame, scope);
        heap.set_register(Register::Environment, frame);

        // Bind every primitive in the global scope.
        for (index, (name, _)) in PRIMITIVES.iter().enumerate() {
            let symbol = heap.intern(name)?;
            heap.set_register(Register::Unevaluated, symbol);
            heap.set_register(Register::Value, Value::primitive(index));
            define_variable(&mut heap)?;
        }

        debug!(heap_words, symbol_buckets, primitives = PRIMITIVES.len(), "interpreter ready");
        Ok(Interpreter { heap })
    }

    pub fn with_defaults() -> Result<Interpreter> {
        Interpreter::new(DEFAULT_HEAP_WORDS, DEFAULT_SYMBOL_BUCKETS)
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Run the evaluator over the expression in `Expression`, in the
    /// environment in `Environment`.
    ///
    /// This is the top-level entry: the transient machine registers and
    /// the spill stack are cleared first, which is what makes the machine
    /// ready for a fresh expression even after a previous one failed.
    /// The returned reference is valid until the next allocation.
    pub fn evaluate(&mut self) -> Result<Value> {
        for register in [
            Register::Stack,
            Register::ArgumentList,
            Register::Unevaluated,
            Register::Procedure,
            Register::Value,
        ] {
            self.heap.set_register(register, Value::NIL);
        }
        eval::evaluate(&mut self.heap)?;
        Ok(self.heap.get_register(Register::Value))
    }

    /// Parse the first expression of `source` into `Expression`.
    pub fn read_str(&mut self, source: &str) -> Result<Value> {
        let s = self.heap.allocate_string(source)?;
        self.heap.set_register(Register::ReadSource, s);
        Reader::new().read(&mut self.heap)?;
        Ok(self.heap.get_register(Register::Expression))
    }

    /// Read and evaluate every expression in `source`, returning the last
    /// value. Empty input is a read error, like any other missing
    /// expression.
    pub fn eval_str(&mut self, source: &str) -> Result<Value> {
        let s = self.heap.allocate_string(source)?;
        self.heap.set_register(Register::ReadSource, s);
        let mut reader = Reader::new();

        reader.read(&mut self.heap)?;
        self.evaluate()?;
        while !reader.at_eof(&self.heap) {
            reader.read(&mut self.heap)?;
            self.evaluate()?;
        }
        Ok(self.heap.get_register(Register::Value))
    }

    /// Render a value for display.
    pub fn format_value(&self, value: Value) -> String {
        self.heap.format_value(value)
    }

    /// Heap occupancy and collector counters.
    pub fn stats(&self) -> HeapStats {
        self.heap.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisp_core::ErrorCode;

    fn interp() -> Interpreter {
        Interpreter::with_defaults().unwrap()
    }

    #[test]
    fn test_self_evaluating() {
        let mut wisp = interp();
        assert_eq!(wisp.eval_str("42"), Ok(Value::fixnum(42)));
        assert_eq!(wisp.eval_str("true"), Ok(Value::TRUE));
        assert_eq!(wisp.eval_str("nil"), Ok(Value::NIL));
        assert_eq!(wisp.eval_str("1.5"), Ok(Value::real64(1.5)));
    }

    #[test]
    fn test_quote() {
        let mut wisp = interp();
        let v = wisp.eval_str("(quote x)").unwrap();
        assert!(v.is_symbol());
        assert_eq!(wisp.format_value(v), "x");

        let v = wisp.eval_str("'(1 2)").unwrap();
        assert_eq!(wisp.format_value(v), "(1 2)");

        assert_eq!(wisp.eval_str("(quote)"), Err(ErrorCode::QuoteMalformed));
        assert_eq!(wisp.eval_str("(quote a b)"), Err(ErrorCode::QuoteMalformed));
    }

    #[test]
    fn test_define_set_lookup() {
        let mut wisp = interp();
        // A definition yields the defined symbol.
        let v = wisp.eval_str("(define x 41)").unwrap();
        assert_eq!(wisp.format_value(v), "x");

        // An assignment yields the symbol ok.
        let v = wisp.eval_str("(set! x (+ x 1))").unwrap();
        assert_eq!(wisp.format_value(v), "ok");

        assert_eq!(wisp.eval_str("x"), Ok(Value::fixnum(42)));

        assert_eq!(
            wisp.eval_str("(set! never-defined 1)"),
            Err(ErrorCode::UnboundVariable)
        );
        assert_eq!(wisp.eval_str("nope"), Err(ErrorCode::UnboundVariable));
    }

    #[test]
    fn test_if() {
        let mut wisp = interp();
        assert_eq!(wisp.eval_str("(if true 1 2)"), Ok(Value::fixnum(1)));
        assert_eq!(wisp.eval_str("(if false 1 2)"), Ok(Value::fixnum(2)));
        // Nil is true.
        assert_eq!(wisp.eval_str("(if nil 1 2)"), Ok(Value::fixnum(1)));
        // Missing alternative yields nil.
        assert_eq!(wisp.eval_str("(if false 1)"), Ok(Value::NIL));
        assert_eq!(wisp.eval_str("(if true)"), Err(ErrorCode::IfMalformed));
    }

    #[test]
    fn test_lambda_application() {
        let mut wisp = interp();
        assert_eq!(
            wisp.eval_str("((fn (x y) (+ x y)) 3 4)"),
            Ok(Value::fixnum(7))
        );
        // Thunks.
        assert_eq!(wisp.eval_str("((fn () 9))"), Ok(Value::fixnum(9)));
        // Multi-expression bodies evaluate in order.
        assert_eq!(
            wisp.eval_str("((fn (x) (define y 1) (+ x y)) 2)"),
            Ok(Value::fixnum(3))
        );
    }

    #[test]
    fn test_closures_capture() {
        let mut wisp = interp();
        wisp.eval_str("(define make-adder (fn (n) (fn (m) (+ m n))))")
            .unwrap();
        assert_eq!(wisp.eval_str("((make-adder 3) 4)"), Ok(Value::fixnum(7)));
    }

    #[test]
    fn test_lexical_scope() {
        let mut wisp = interp();
        wisp.eval_str("(define x 1)").unwrap();
        assert_eq!(wisp.eval_str("((fn (x) x) 2)"), Ok(Value::fixnum(2)));
        // The outer binding is untouched by the shadow.
        assert_eq!(wisp.eval_str("x"), Ok(Value::fixnum(1)));

        // set! from an inner scope reaches the nearest binding.
        wisp.eval_str("((fn () (set! x 5)))").unwrap();
        assert_eq!(wisp.eval_str("x"), Ok(Value::fixnum(5)));
    }

    #[test]
    fn test_begin() {
        let mut wisp = interp();
        assert_eq!(
            wisp.eval_str("(begin (define a 1) (define b 2) (+ a b))"),
            Ok(Value::fixnum(3))
        );
        assert_eq!(wisp.eval_str("(begin 7)"), Ok(Value::fixnum(7)));
        assert_eq!(wisp.eval_str("(begin)"), Err(ErrorCode::BeginMalformed));
    }

    #[test]
    fn test_application_errors() {
        let mut wisp = interp();
        assert_eq!(wisp.eval_str("(1 2)"), Err(ErrorCode::NotAProcedure));
        assert_eq!(
            wisp.eval_str("((fn (x) x))"),
            Err(ErrorCode::ArityMismatch)
        );
        assert_eq!(
            wisp.eval_str("((fn (x) x) 1 2)"),
            Err(ErrorCode::ArityMismatch)
        );
        assert_eq!(wisp.eval_str("(+ 1 true)"), Err(ErrorCode::InvalidArgumentType));
    }

    #[test]
    fn test_machine_recovers_after_error() {
        let mut wisp = interp();
        assert!(wisp.eval_str("(1 2)").is_err());
        // The next top-level expression evaluates normally.
        assert_eq!(wisp.eval_str("(+ 1 2)"), Ok(Value::fixnum(3)));
        assert!(wisp.heap().get_register(Register::Stack).is_nil());
    }

    #[test]
    fn test_eval_str_sequences() {
        let mut wisp = interp();
        assert_eq!(
            wisp.eval_str("(define x 41) (set! x (+ x 1)) x"),
            Ok(Value::fixnum(42))
        );
    }

    #[test]
    fn test_read_str() {
        let mut wisp = interp();
        let expr = wisp.read_str("(+ 1 2)").unwrap();
        assert!(expr.is_pair());
        assert_eq!(wisp.format_value(expr), "(+ 1 2)");
    }

    #[test]
    fn test_evaluate_primitive() {
        let mut wisp = interp();
        assert_eq!(wisp.eval_str("(evaluate '(+ 1 2))"), Ok(Value::fixnum(3)));
        // Nested inside an application, with spilled state around it.
        assert_eq!(
            wisp.eval_str("(+ 1 (evaluate '(+ 2 3)))"),
            Ok(Value::fixnum(6))
        );
    }

    #[test]
    fn test_eq_on_interned_symbols() {
        let mut wisp = interp();
        assert_eq!(
            wisp.eval_str("(if (eq? (quote a) (quote a)) 1 2)"),
            Ok(Value::fixnum(1))
        );
        assert_eq!(
            wisp.eval_str("(if (eq? 'a 'b) 1 2)"),
            Ok(Value::fixnum(2))
        );
    }

    #[test]
    fn test_factorial_on_modest_heap() {
        let mut wisp = Interpreter::new(4096, 31).unwrap();
        assert_eq!(
            wisp.eval_str(
                "(begin \
                   (define f (fn (n) (if (eq? n 0) 1 (* n (f (- n 1)))))) \
                   (f 6))"
            ),
            Ok(Value::fixnum(720))
        );
    }

    #[test]
    fn test_string_evaluates_to_itself() {
        let mut wisp = interp();
        let v = wisp.eval_str("\"hello\"").unwrap();
        assert!(v.is_string());
        let heap = wisp.heap();
        assert_eq!(heap.blob_len(v), 6);
        let bytes: Vec<u8> = (0..6).map(|i| heap.blob_byte(v, i)).collect();
        assert_eq!(bytes, b"hello\0");
    }

    #[test]
    fn test_stats_exposed() {
        let wisp = interp();
        let stats = wisp.stats();
        assert!(stats.used_words > 0);
        assert_eq!(stats.capacity_words, DEFAULT_HEAP_WORDS);
    }
}
