//! Primitive Procedures
//!
//! Host functions callable from Wisp code. A primitive value's payload
//! indexes [`PRIMITIVES`]; the evaluator calls the function with the heap
//! and stores the returned value into the `Value` register.
//!
//! # Calling Contract
//!
//! - Arguments arrive as a single source-order list in the `ArgumentList`
//!   register; they are already evaluated.
//! - A primitive may allocate, and any allocation may collect. A heap
//!   reference extracted before an allocation is therefore stale after
//!   it: re-extract from the registers, as `primitive_pair` does.
//! - A primitive either returns a value or an error code; errors abort
//!   the current top-level expression.
//!
//! # Arithmetic
//!
//! `+ - * /` accept fixnums and real64s, promoting to real64 when either
//! side is one. Fixnum results are computed wide and checked against the
//! 47-bit range afterwards; out-of-range results report overflow or
//! underflow rather than wrapping.

use wisp_core::{ErrorCode, Heap, MAX_FIXNUM, MIN_FIXNUM, Register, Result, Tag, Value};

use crate::eval;

/// A host function implementing a primitive procedure.
pub type PrimitiveFn = fn(&mut Heap) -> Result<Value>;

/// The primitive table. Order is load-bearing: a primitive value's
/// payload is its index here.
pub static PRIMITIVES: &[(&str, PrimitiveFn)] = &[
    // Arithmetic
    ("+", primitive_add),
    ("-", primitive_subtract),
    ("*", primitive_multiply),
    ("/", primitive_divide),
    ("remainder", primitive_remainder),
    // Identity
    ("eq?", primitive_eq),
    // Pairs and lists
    ("pair", primitive_pair),
    ("pair?", primitive_is_pair),
    ("left", primitive_left),
    ("right", primitive_right),
    ("set-left!", primitive_set_left),
    ("set-right!", primitive_set_right),
    ("list", primitive_list),
    ("null?", primitive_is_null),
    // Vectors
    ("make-vector", primitive_make_vector),
    ("vector?", primitive_is_vector),
    ("vector-length", primitive_vector_length),
    ("vector-ref", primitive_vector_ref),
    ("vector-set!", primitive_vector_set),
    // Byte vectors
    ("make-byte-vector", primitive_make_byte_vector),
    ("byte-vector?", primitive_is_byte_vector),
    ("byte-vector-length", primitive_byte_vector_length),
    ("byte-vector-ref", primitive_byte_vector_ref),
    ("byte-vector-set!", primitive_byte_vector_set),
    // Strings and symbols
    ("string?", primitive_is_string),
    ("string->byte-vector", primitive_string_to_byte_vector),
    ("byte-vector->string", primitive_byte_vector_to_string),
    ("symbol->string", primitive_symbol_to_string),
    ("string->symbol", primitive_intern),
    ("intern", primitive_intern),
    ("find-symbol", primitive_find_symbol),
    ("unintern", primitive_unintern),
    // Meta
    ("evaluate", primitive_evaluate),
];

// =============================================================================
// Argument extraction
// =============================================================================

/// Pop the next argument off `rest`.
fn argument(heap: &Heap, rest: &mut Value) -> Result<Value> {
    if !rest.is_pair() {
        return Err(ErrorCode::ArityMismatch);
    }
    let value = heap.car(*rest);
    *rest = heap.cdr(*rest);
    Ok(value)
}

fn no_more(rest: Value) -> Result<()> {
    if rest.is_nil() {
        Ok(())
    } else {
        Err(ErrorCode::ArityMismatch)
    }
}

fn extract_1(heap: &Heap) -> Result<Value> {
    let mut rest = heap.get_register(Register::ArgumentList);
    let a = argument(heap, &mut rest)?;
    no_more(rest)?;
    Ok(a)
}

fn extract_2(heap: &Heap) -> Result<(Value, Value)> {
    let mut rest = heap.get_register(Register::ArgumentList);
    let a = argument(heap, &mut rest)?;
    let b = argument(heap, &mut rest)?;
    no_more(rest)?;
    Ok((a, b))
}

fn extract_3(heap: &Heap) -> Result<(Value, Value, Value)> {
    let mut rest = heap.get_register(Register::ArgumentList);
    let a = argument(heap, &mut rest)?;
    let b = argument(heap, &mut rest)?;
    let c = argument(heap, &mut rest)?;
    no_more(rest)?;
    Ok((a, b, c))
}

/// The conventional "I did a side effect" result.
fn ok_symbol(heap: &Heap) -> Value {
    heap.find_symbol("ok")
}

// =============================================================================
// Arithmetic
// =============================================================================

/// Box a wide intermediate, reporting overflow past either end of the
/// fixnum range.
fn fixnum_result(n: i128) -> Result<Value> {
    if n > MAX_FIXNUM as i128 {
        Err(ErrorCode::ArithmeticOverflow)
    } else if n < MIN_FIXNUM as i128 {
        Err(ErrorCode::ArithmeticUnderflow)
    } else {
        Ok(Value::fixnum(n as i64))
    }
}

/// Apply a binary numeric operation with fixnum/real64 promotion.
fn numeric_binary(
    a: Value,
    b: Value,
    int_op: fn(i64, i64) -> i128,
    real_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    if a.is_fixnum() {
        if b.is_fixnum() {
            return fixnum_result(int_op(a.as_fixnum(), b.as_fixnum()));
        }
        if b.is_real64() {
            return Ok(Value::real64(real_op(a.as_fixnum() as f64, b.as_real64())));
        }
        return Err(ErrorCode::InvalidArgumentType);
    }
    if a.is_real64() {
        if b.is_fixnum() {
            return Ok(Value::real64(real_op(a.as_real64(), b.as_fixnum() as f64)));
        }
        if b.is_real64() {
            return Ok(Value::real64(real_op(a.as_real64(), b.as_real64())));
        }
        return Err(ErrorCode::InvalidArgumentType);
    }
    Err(ErrorCode::InvalidArgumentType)
}

fn primitive_add(heap: &mut Heap) -> Result<Value> {
    let (a, b) = extract_2(heap)?;
    numeric_binary(a, b, |a, b| a as i128 + b as i128, |a, b| a + b)
}

fn primitive_subtract(heap: &mut Heap) -> Result<Value> {
    let mut rest = heap.get_register(Register::ArgumentList);
    let a = argument(heap, &mut rest)?;
    if rest.is_nil() {
        // Unary negation.
        if a.is_fixnum() {
            return fixnum_result(-(a.as_fixnum() as i128));
        }
        if a.is_real64() {
            return Ok(Value::real64(-a.as_real64()));
        }
        return Err(ErrorCode::InvalidArgumentType);
    }
    let b = argument(heap, &mut rest)?;
    no_more(rest)?;
    numeric_binary(a, b, |a, b| a as i128 - b as i128, |a, b| a - b)
}

fn primitive_multiply(heap: &mut Heap) -> Result<Value> {
    let (a, b) = extract_2(heap)?;
    numeric_binary(a, b, |a, b| a as i128 * b as i128, |a, b| a * b)
}

fn primitive_divide(heap: &mut Heap) -> Result<Value> {
    let (a, b) = extract_2(heap)?;
    if a.is_fixnum() && b.is_fixnum() {
        if b.as_fixnum() == 0 {
            return Err(ErrorCode::DivideByZero);
        }
        return fixnum_result(a.as_fixnum() as i128 / b.as_fixnum() as i128);
    }
    // At least one real64: IEEE division, infinities included.
    numeric_binary(a, b, |_, _| 0, |a, b| a / b)
}

fn primitive_remainder(heap: &mut Heap) -> Result<Value> {
    let (a, b) = extract_2(heap)?;
    if !a.is_fixnum() || !b.is_fixnum() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    if b.as_fixnum() == 0 {
        return Err(ErrorCode::DivideByZero);
    }
    fixnum_result(a.as_fixnum() as i128 % b.as_fixnum() as i128)
}

// =============================================================================
// Identity
// =============================================================================

/// Bit equality: reference equality for heap kinds, value equality for
/// immediates.
fn primitive_eq(heap: &mut Heap) -> Result<Value> {
    let (a, b) = extract_2(heap)?;
    Ok(Value::boolean(a == b))
}

// =============================================================================
// Pairs and lists
// =============================================================================

fn primitive_pair(heap: &mut Heap) -> Result<Value> {
    extract_2(heap)?; // arity check before allocating
    let pair = heap.allocate_pair()?;
    let (a, b) = extract_2(heap)?; // re-extract: the allocation may have moved them
    heap.set_car(pair, a);
    heap.set_cdr(pair, b);
    Ok(pair)
}

fn primitive_is_pair(heap: &mut Heap) -> Result<Value> {
    Ok(Value::boolean(extract_1(heap)?.is_pair()))
}

fn primitive_left(heap: &mut Heap) -> Result<Value> {
    let pair = extract_1(heap)?;
    if !pair.is_pair() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    Ok(heap.car(pair))
}

fn primitive_right(heap: &mut Heap) -> Result<Value> {
    let pair = extract_1(heap)?;
    if !pair.is_pair() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    Ok(heap.cdr(pair))
}

fn primitive_set_left(heap: &mut Heap) -> Result<Value> {
    let (pair, value) = extract_2(heap)?;
    if !pair.is_pair() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    heap.set_car(pair, value);
    Ok(ok_symbol(heap))
}

fn primitive_set_right(heap: &mut Heap) -> Result<Value> {
    let (pair, value) = extract_2(heap)?;
    if !pair.is_pair() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    heap.set_cdr(pair, value);
    Ok(ok_symbol(heap))
}

/// The argument list is already a freshly consed source-order list.
fn primitive_list(heap: &mut Heap) -> Result<Value> {
    Ok(heap.get_register(Register::ArgumentList))
}

fn primitive_is_null(heap: &mut Heap) -> Result<Value> {
    Ok(Value::boolean(extract_1(heap)?.is_nil()))
}

// =============================================================================
// Vectors
// =============================================================================

/// Extract a non-negative fixnum, for sizes and indices.
fn count_argument(value: Value) -> Result<usize> {
    if !value.is_fixnum() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    let n = value.as_fixnum();
    if n < 0 {
        return Err(ErrorCode::IndexOutOfRange);
    }
    Ok(n as usize)
}

fn primitive_make_vector(heap: &mut Heap) -> Result<Value> {
    let n = count_argument(extract_1(heap)?)?;
    heap.allocate_vector(n)
}

fn primitive_is_vector(heap: &mut Heap) -> Result<Value> {
    Ok(Value::boolean(extract_1(heap)?.is_vector()))
}

fn primitive_vector_length(heap: &mut Heap) -> Result<Value> {
    let v = extract_1(heap)?;
    if !v.is_vector() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    Ok(Value::fixnum(heap.vector_length(v) as i64))
}

fn primitive_vector_ref(heap: &mut Heap) -> Result<Value> {
    let (v, index) = extract_2(heap)?;
    if !v.is_vector() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    heap.vector_ref(v, count_argument(index)?)
}

fn primitive_vector_set(heap: &mut Heap) -> Result<Value> {
    let (v, index, value) = extract_3(heap)?;
    if !v.is_vector() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    heap.vector_set(v, count_argument(index)?, value)?;
    Ok(ok_symbol(heap))
}

// =============================================================================
// Byte vectors
// =============================================================================

fn primitive_make_byte_vector(heap: &mut Heap) -> Result<Value> {
    let n = count_argument(extract_1(heap)?)?;
    heap.allocate_byte_vector(n)
}

fn primitive_is_byte_vector(heap: &mut Heap) -> Result<Value> {
    Ok(Value::boolean(extract_1(heap)?.is_byte_vector()))
}

fn primitive_byte_vector_length(heap: &mut Heap) -> Result<Value> {
    let bv = extract_1(heap)?;
    if !bv.is_byte_vector() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    Ok(Value::fixnum(heap.byte_vector_length(bv) as i64))
}

fn primitive_byte_vector_ref(heap: &mut Heap) -> Result<Value> {
    let (bv, index) = extract_2(heap)?;
    if !bv.is_byte_vector() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    let byte = heap.byte_vector_ref(bv, count_argument(index)?)?;
    Ok(Value::fixnum(byte as i64))
}

fn primitive_byte_vector_set(heap: &mut Heap) -> Result<Value> {
    let (bv, index, value) = extract_3(heap)?;
    if !bv.is_byte_vector() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    if !value.is_fixnum() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    heap.byte_vector_set(bv, count_argument(index)?, value.as_fixnum() as u8)?;
    Ok(ok_symbol(heap))
}

// =============================================================================
// Strings and symbols
// =============================================================================

fn primitive_is_string(heap: &mut Heap) -> Result<Value> {
    Ok(Value::boolean(extract_1(heap)?.is_string()))
}

/// Re-tag a string as a byte vector; the storage is shared.
fn primitive_string_to_byte_vector(heap: &mut Heap) -> Result<Value> {
    let s = extract_1(heap)?;
    if !s.is_string() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    Ok(s.retag(Tag::ByteVector))
}

fn primitive_byte_vector_to_string(heap: &mut Heap) -> Result<Value> {
    let bv = extract_1(heap)?;
    if !bv.is_byte_vector() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    Ok(bv.retag(Tag::String))
}

fn primitive_symbol_to_string(heap: &mut Heap) -> Result<Value> {
    let symbol = extract_1(heap)?;
    if !symbol.is_symbol() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    Ok(symbol.retag(Tag::String))
}

fn primitive_intern(heap: &mut Heap) -> Result<Value> {
    let s = extract_1(heap)?;
    if !s.is_string() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    // The name is copied out to host memory, so the intern's own
    // allocations cannot invalidate it.
    let name = heap.blob_string(s);
    heap.intern(&name)
}

fn primitive_find_symbol(heap: &mut Heap) -> Result<Value> {
    let s = extract_1(heap)?;
    if !s.is_string() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    let name = heap.blob_string(s);
    Ok(heap.find_symbol(&name))
}

fn primitive_unintern(heap: &mut Heap) -> Result<Value> {
    let s = extract_1(heap)?;
    if !s.is_string() {
        return Err(ErrorCode::InvalidArgumentType);
    }
    let name = heap.blob_string(s);
    heap.unintern(&name);
    Ok(ok_symbol(heap))
}

// =============================================================================
// Meta
// =============================================================================

/// Evaluate an already-read expression in the current environment. The
/// machine's saves and restores are balanced across `evaluate`, so the
/// outer application's spilled state is untouched.
fn primitive_evaluate(heap: &mut Heap) -> Result<Value> {
    let expr = extract_1(heap)?;
    heap.set_register(Register::Expression, expr);
    eval::evaluate(heap)?;
    Ok(heap.get_register(Register::Value))
}
