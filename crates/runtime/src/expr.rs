//! Expression Classification
//!
//! The evaluator sorts expressions into four mutually exclusive classes,
//! tested in order: self-evaluating atoms, variables (symbols), the six
//! special forms (pairs whose head is a known symbol), and applications
//! (any other pair). Anything else is unknown.
//!
//! The per-form extractors validate a form's shape in one pass and hand
//! back its pieces; each form has its own malformed-syntax error code.
//! Extractors never allocate, so they are safe to re-run against the
//! `Expression` register after an allocation has moved the heap.

use wisp_core::{ErrorCode, Heap, Result, Tag, Value};

/// Atoms that evaluate to themselves.
pub fn is_self_evaluating(value: Value) -> bool {
    value.is_real64()
        || matches!(
            value.tag(),
            Tag::Nil
                | Tag::True
                | Tag::False
                | Tag::Fixnum
                | Tag::Real32
                | Tag::Vector
                | Tag::ByteVector
                | Tag::String
        )
}

/// Variables are symbols.
pub fn is_variable(value: Value) -> bool {
    value.is_symbol()
}

/// A pair whose head is the interned symbol named `name`. Interned-symbol
/// identity makes this a reference comparison.
pub fn is_tagged_list(heap: &Heap, expr: Value, name: &str) -> bool {
    if !expr.is_pair() {
        return false;
    }
    let symbol = heap.find_symbol(name);
    symbol.is_symbol() && heap.car(expr) == symbol
}

/// A chain of pairs ending in nil.
pub fn is_proper_list(heap: &Heap, mut value: Value) -> bool {
    while value.is_pair() {
        value = heap.cdr(value);
    }
    value.is_nil()
}

/// `(quote x)` — exactly one argument.
pub fn quote_text(heap: &Heap, expr: Value) -> Result<Value> {
    let rest = heap.cdr(expr);
    if rest.is_pair() && heap.cdr(rest).is_nil() {
        Ok(heap.car(rest))
    } else {
        Err(ErrorCode::QuoteMalformed)
    }
}

/// `(set! sym expr)` / `(define sym expr)` share a shape; `code` selects
/// which malformed error to report.
fn binding_parts(heap: &Heap, expr: Value, code: ErrorCode) -> Result<(Value, Value)> {
    let rest = heap.cdr(expr);
    if !rest.is_pair() {
        return Err(code);
    }
    let variable = heap.car(rest);
    if !variable.is_symbol() {
        return Err(code);
    }
    let rest = heap.cdr(rest);
    if !rest.is_pair() || !heap.cdr(rest).is_nil() {
        return Err(code);
    }
    Ok((variable, heap.car(rest)))
}

pub fn assignment_parts(heap: &Heap, expr: Value) -> Result<(Value, Value)> {
    binding_parts(heap, expr, ErrorCode::AssignmentMalformed)
}

pub fn definition_parts(heap: &Heap, expr: Value) -> Result<(Value, Value)> {
    binding_parts(heap, expr, ErrorCode::DefinitionMalformed)
}

/// `(if p c)` or `(if p c a)` — predicate, consequent, optional
/// alternative.
pub fn if_parts(heap: &Heap, expr: Value) -> Result<(Value, Value, Option<Value>)> {
    let rest = heap.cdr(expr);
    if !rest.is_pair() {
        return Err(ErrorCode::IfMalformed);
    }
    let predicate = heap.car(rest);
    let rest = heap.cdr(rest);
    if !rest.is_pair() {
        return Err(ErrorCode::IfMalformed);
    }
    let consequent = heap.car(rest);
    let rest = heap.cdr(rest);
    if rest.is_nil() {
        return Ok((predicate, consequent, None));
    }
    if rest.is_pair() && heap.cdr(rest).is_nil() {
        return Ok((predicate, consequent, Some(heap.car(rest))));
    }
    Err(ErrorCode::IfMalformed)
}

/// `(fn (sym...) body...)` — a proper list of parameter symbols and a
/// non-empty proper-list body.
pub fn lambda_parts(heap: &Heap, expr: Value) -> Result<(Value, Value)> {
    let rest = heap.cdr(expr);
    if !rest.is_pair() {
        return Err(ErrorCode::LambdaMalformed);
    }
    let parameters = heap.car(rest);
    let mut check = parameters;
    while check.is_pair() {
        if !heap.car(check).is_symbol() {
            return Err(ErrorCode::LambdaMalformed);
        }
        check = heap.cdr(check);
    }
    if !check.is_nil() {
        return Err(ErrorCode::LambdaMalformed);
    }

    let body = heap.cdr(rest);
    if !body.is_pair() || !is_proper_list(heap, body) {
        return Err(ErrorCode::LambdaMalformed);
    }
    Ok((parameters, body))
}

/// `(begin e1 ... en)` — a non-empty proper-list body.
pub fn begin_body(heap: &Heap, expr: Value) -> Result<Value> {
    let body = heap.cdr(expr);
    if !body.is_pair() || !is_proper_list(heap, body) {
        return Err(ErrorCode::BeginMalformed);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_heap() -> Heap {
        let mut heap = Heap::new(512);
        heap.install_root_vector().unwrap();
        heap.make_symbol_table(13).unwrap();
        heap
    }

    fn list_of(heap: &mut Heap, values: &[Value]) -> Value {
        let mut list = Value::NIL;
        for &v in values.iter().rev() {
            let pair = heap.allocate_pair().unwrap();
            heap.set_car(pair, v);
            heap.set_cdr(pair, list);
            list = pair;
        }
        list
    }

    #[test]
    fn test_self_evaluating() {
        let mut heap = test_heap();
        assert!(is_self_evaluating(Value::NIL));
        assert!(is_self_evaluating(Value::TRUE));
        assert!(is_self_evaluating(Value::FALSE));
        assert!(is_self_evaluating(Value::fixnum(3)));
        assert!(is_self_evaluating(Value::real32(1.0)));
        assert!(is_self_evaluating(Value::real64(1.0)));

        let s = heap.allocate_string("s").unwrap();
        assert!(is_self_evaluating(s));
        let v = heap.allocate_vector(1).unwrap();
        assert!(is_self_evaluating(v));

        let sym = heap.intern("x").unwrap();
        assert!(!is_self_evaluating(sym));
        assert!(is_variable(sym));
        let pair = heap.allocate_pair().unwrap();
        assert!(!is_self_evaluating(pair));
    }

    #[test]
    fn test_tagged_list() {
        let mut heap = test_heap();
        let quote = heap.intern("quote").unwrap();
        let x = heap.intern("x").unwrap();
        let form = list_of(&mut heap, &[quote, x]);

        assert!(is_tagged_list(&heap, form, "quote"));
        assert!(!is_tagged_list(&heap, form, "if"));
        assert!(!is_tagged_list(&heap, x, "quote"));
        // A list headed by nil never matches a never-interned name.
        let odd = list_of(&mut heap, &[Value::NIL]);
        assert!(!is_tagged_list(&heap, odd, "no-such-symbol"));
    }

    #[test]
    fn test_quote_extraction() {
        let mut heap = test_heap();
        let quote = heap.intern("quote").unwrap();
        let x = heap.intern("x").unwrap();

        let good = list_of(&mut heap, &[quote, x]);
        assert_eq!(quote_text(&heap, good).unwrap(), x);

        let empty = list_of(&mut heap, &[quote]);
        assert_eq!(quote_text(&heap, empty), Err(ErrorCode::QuoteMalformed));

        let extra = list_of(&mut heap, &[quote, x, x]);
        assert_eq!(quote_text(&heap, extra), Err(ErrorCode::QuoteMalformed));
    }

    #[test]
    fn test_binding_extraction() {
        let mut heap = test_heap();
        let define = heap.intern("define").unwrap();
        let x = heap.intern("x").unwrap();

        let good = list_of(&mut heap, &[define, x, Value::fixnum(1)]);
        let (variable, value) = definition_parts(&heap, good).unwrap();
        assert_eq!(variable, x);
        assert_eq!(value, Value::fixnum(1));

        // The variable slot must hold a symbol.
        let bad = list_of(&mut heap, &[define, Value::fixnum(1), Value::fixnum(2)]);
        assert_eq!(
            definition_parts(&heap, bad),
            Err(ErrorCode::DefinitionMalformed)
        );

        let short = list_of(&mut heap, &[define, x]);
        assert_eq!(
            definition_parts(&heap, short),
            Err(ErrorCode::DefinitionMalformed)
        );
        assert_eq!(
            assignment_parts(&heap, short),
            Err(ErrorCode::AssignmentMalformed)
        );
    }

    #[test]
    fn test_if_extraction() {
        let mut heap = test_heap();
        let if_sym = heap.intern("if").unwrap();

        let two = list_of(&mut heap, &[if_sym, Value::TRUE, Value::fixnum(1)]);
        let (p, c, a) = if_parts(&heap, two).unwrap();
        assert_eq!(p, Value::TRUE);
        assert_eq!(c, Value::fixnum(1));
        assert!(a.is_none());

        let three = list_of(
            &mut heap,
            &[if_sym, Value::TRUE, Value::fixnum(1), Value::fixnum(2)],
        );
        let (_, _, a) = if_parts(&heap, three).unwrap();
        assert_eq!(a, Some(Value::fixnum(2)));

        let one = list_of(&mut heap, &[if_sym, Value::TRUE]);
        assert_eq!(if_parts(&heap, one), Err(ErrorCode::IfMalformed));

        let four = list_of(
            &mut heap,
            &[
                if_sym,
                Value::TRUE,
                Value::fixnum(1),
                Value::fixnum(2),
                Value::fixnum(3),
            ],
        );
        assert_eq!(if_parts(&heap, four), Err(ErrorCode::IfMalformed));
    }

    #[test]
    fn test_lambda_extraction() {
        let mut heap = test_heap();
        let fn_sym = heap.intern("fn").unwrap();
        let x = heap.intern("x").unwrap();

        let params = list_of(&mut heap, &[x]);
        let good = list_of(&mut heap, &[fn_sym, params, x]);
        let (p, body) = lambda_parts(&heap, good).unwrap();
        assert_eq!(p, params);
        assert_eq!(heap.car(body), x);

        // Zero parameters is fine.
        let thunk = list_of(&mut heap, &[fn_sym, Value::NIL, Value::fixnum(1)]);
        let (p, _) = lambda_parts(&heap, thunk).unwrap();
        assert!(p.is_nil());

        // Non-symbol parameter.
        let bad_params = list_of(&mut heap, &[Value::fixnum(1)]);
        let bad = list_of(&mut heap, &[fn_sym, bad_params, x]);
        assert_eq!(lambda_parts(&heap, bad), Err(ErrorCode::LambdaMalformed));

        // Empty body.
        let empty = list_of(&mut heap, &[fn_sym, params]);
        assert_eq!(lambda_parts(&heap, empty), Err(ErrorCode::LambdaMalformed));
    }

    #[test]
    fn test_begin_extraction() {
        let mut heap = test_heap();
        let begin = heap.intern("begin").unwrap();

        let good = list_of(&mut heap, &[begin, Value::fixnum(1), Value::fixnum(2)]);
        let body = begin_body(&heap, good).unwrap();
        assert_eq!(heap.list_length(body), 2);

        let empty = list_of(&mut heap, &[begin]);
        assert_eq!(begin_body(&heap, empty), Err(ErrorCode::BeginMalformed));
    }

    #[test]
    fn test_proper_list() {
        let mut heap = test_heap();
        assert!(is_proper_list(&heap, Value::NIL));

        let list = list_of(&mut heap, &[Value::fixnum(1)]);
        assert!(is_proper_list(&heap, list));

        let dotted = heap.allocate_pair().unwrap();
        heap.set_cdr(dotted, Value::fixnum(2));
        assert!(!is_proper_list(&heap, dotted));
        assert!(!is_proper_list(&heap, Value::fixnum(1)));
    }
}
