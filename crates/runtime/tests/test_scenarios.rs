//! End-to-end interpreter scenarios: read, evaluate, collect, repeat.

use wisp_runtime::{ErrorCode, Interpreter, Value};

#[test]
fn test_define_assign_lookup() {
    let mut wisp = Interpreter::with_defaults().unwrap();
    wisp.eval_str("(define x 41)").unwrap();
    wisp.eval_str("(set! x (+ x 1))").unwrap();
    assert_eq!(wisp.eval_str("x"), Ok(Value::fixnum(42)));
}

#[test]
fn test_lambda_application() {
    let mut wisp = Interpreter::with_defaults().unwrap();
    assert_eq!(
        wisp.eval_str("((fn (x y) (+ x y)) 3 4)"),
        Ok(Value::fixnum(7))
    );
}

#[test]
fn test_symbol_interning_reference_equality() {
    let mut wisp = Interpreter::with_defaults().unwrap();
    assert_eq!(
        wisp.eval_str("(if (eq? (quote a) (quote a)) 1 2)"),
        Ok(Value::fixnum(1))
    );
}

#[test]
fn test_vector_contents_survive_collection() {
    // Small heap, so the churn loop forces many collections.
    let mut wisp = Interpreter::new(2048, 13).unwrap();
    wisp.eval_str("(define v (make-vector 3))").unwrap();
    wisp.eval_str("(vector-set! v 0 \"a\")").unwrap();
    wisp.eval_str("(vector-set! v 1 \"b\")").unwrap();
    wisp.eval_str("(vector-set! v 2 \"c\")").unwrap();

    // Ten thousand pairs of garbage.
    for _ in 0..10_000 {
        wisp.eval_str("(pair 1 2)").unwrap();
    }
    assert!(wisp.stats().collections > 0);

    let s = wisp.eval_str("(vector-ref v 1)").unwrap();
    assert!(s.is_string());
    let heap = wisp.heap();
    assert_eq!(heap.blob_len(s), 2);
    assert_eq!(heap.blob_byte(s, 0), b'b');
    assert_eq!(heap.blob_byte(s, 1), 0);
}

#[test]
fn test_factorial_on_modest_heap() {
    // Recursive factorial must not exhaust a 4096-word heap: the spill
    // stack is heap data and gets collected like everything else.
    let mut wisp = Interpreter::new(4096, 31).unwrap();
    let result = wisp.eval_str(
        "(begin \
           (define f (fn (n) (if (eq? n 0) 1 (* n (f (- n 1)))))) \
           (f 6))",
    );
    assert_eq!(result, Ok(Value::fixnum(720)));
}

#[test]
fn test_string_literal() {
    let mut wisp = Interpreter::with_defaults().unwrap();
    let v = wisp.eval_str("\"hello\"").unwrap();
    assert!(v.is_string());
    let heap = wisp.heap();
    let bytes: Vec<u8> = (0..heap.blob_len(v)).map(|i| heap.blob_byte(v, i)).collect();
    assert_eq!(bytes, b"hello\0");
}

#[test]
fn test_deeper_recursion_under_collection_pressure() {
    let mut wisp = Interpreter::new(4096, 31).unwrap();
    wisp.eval_str("(define count (fn (n) (if (eq? n 0) 0 (count (- n 1)))))")
        .unwrap();
    assert_eq!(wisp.eval_str("(count 80)"), Ok(Value::fixnum(0)));
    assert!(wisp.stats().collections > 0);
}

#[test]
fn test_repeated_evaluation_is_deterministic() {
    let source = "(begin (define g (fn (n) (+ n 1))) (g (g (g 0))))";
    let mut first = Interpreter::with_defaults().unwrap();
    let mut second = Interpreter::with_defaults().unwrap();
    assert_eq!(
        first.eval_str(source).unwrap(),
        second.eval_str(source).unwrap()
    );
}

#[test]
fn test_error_reporting_and_recovery() {
    let mut wisp = Interpreter::with_defaults().unwrap();
    assert_eq!(wisp.eval_str("(1 2)"), Err(ErrorCode::NotAProcedure));
    assert_eq!(wisp.eval_str("missing"), Err(ErrorCode::UnboundVariable));
    assert_eq!(wisp.eval_str("(+ 1 'a)"), Err(ErrorCode::InvalidArgumentType));
    assert_eq!(wisp.eval_str("(/ 1 0)"), Err(ErrorCode::DivideByZero));
    assert_eq!(wisp.eval_str("((fn (x) x) 1 2)"), Err(ErrorCode::ArityMismatch));
    assert_eq!(wisp.eval_str("(vector-ref (make-vector 1) 5)"), Err(ErrorCode::IndexOutOfRange));

    // Errors are fatal to the expression, not the interpreter.
    assert_eq!(wisp.eval_str("(+ 1 2)"), Ok(Value::fixnum(3)));
}

#[test]
fn test_out_of_memory_is_recoverable() {
    let mut wisp = Interpreter::new(700, 13).unwrap();
    // A vector bigger than what remains cannot be satisfied.
    assert_eq!(
        wisp.eval_str("(make-vector 1000)"),
        Err(ErrorCode::OutOfMemory)
    );
    // The machine still accepts new top-level expressions.
    assert_eq!(wisp.eval_str("(+ 1 2)"), Ok(Value::fixnum(3)));
}

#[test]
fn test_list_building_programs() {
    let mut wisp = Interpreter::with_defaults().unwrap();
    wisp.eval_str(
        "(define map1 (fn (f xs) \
           (if (null? xs) nil (pair (f (left xs)) (map1 f (right xs))))))",
    )
    .unwrap();
    let v = wisp.eval_str("(map1 (fn (n) (* n n)) (list 1 2 3 4))").unwrap();
    assert_eq!(wisp.format_value(v), "(1 4 9 16)");
}

#[test]
fn test_higher_order_and_shadowing() {
    let mut wisp = Interpreter::with_defaults().unwrap();
    wisp.eval_str("(define compose (fn (f g) (fn (x) (f (g x)))))")
        .unwrap();
    wisp.eval_str("(define inc (fn (n) (+ n 1)))").unwrap();
    wisp.eval_str("(define double (fn (n) (* n 2)))").unwrap();
    assert_eq!(
        wisp.eval_str("((compose inc double) 10)"),
        Ok(Value::fixnum(21))
    );
}
