//! The Register-Machine Evaluator
//!
//! Reduction is an explicit state machine: each step runs, sets up the
//! registers for whatever comes next, and returns control to the dispatch
//! loop. There is no host-language recursion over subexpressions — every
//! suspension point is a `save` of the registers still needed, a write of
//! the next step into the `Continue` register, and a return to the loop.
//! That keeps the whole continuation in heap data, where the collector
//! can see it; the host call stack never carries a heap reference across
//! an allocation.
//!
//! Entering a nested evaluation therefore looks like:
//!
//! ```text
//! save the registers the current form still needs
//! save Continue                 (where to resume afterwards)
//! Expression := subexpression
//! Continue   := the step that consumes Value
//! goto Dispatch
//! ```
//!
//! and a completed reduction jumps to whatever step `Continue` names.
//! Errors short-circuit the loop between steps and leave the machine
//! ready for the next top-level expression.

use tracing::trace;

use wisp_core::{ErrorCode, Heap, Register, Result, Value};

use crate::env::{define_variable, extend_environment, lookup_variable, set_variable};
use crate::expr::{
    assignment_parts, begin_body, definition_parts, if_parts, is_proper_list, is_self_evaluating,
    is_tagged_list, is_variable, lambda_parts, quote_text,
};
use crate::primitives::PRIMITIVES;

/// Machine steps. The active step's identifier is what the `Continue`
/// register holds, boxed as a fixnum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Done = 0,
    Dispatch = 1,
    IfDecide = 2,
    AssignDo = 3,
    DefineDo = 4,
    SeqStep = 5,
    SeqDidExpr = 6,
    AppDidOperator = 7,
    AppOperandLoop = 8,
    AppDidOperand = 9,
    AppDidLastOperand = 10,
    AppDispatch = 11,
}

impl Step {
    fn to_value(self) -> Value {
        Value::fixnum(self as i64)
    }

    fn from_value(value: Value) -> Step {
        match value.as_fixnum() {
            0 => Step::Done,
            1 => Step::Dispatch,
            2 => Step::IfDecide,
            3 => Step::AssignDo,
            4 => Step::DefineDo,
            5 => Step::SeqStep,
            6 => Step::SeqDidExpr,
            7 => Step::AppDidOperator,
            8 => Step::AppOperandLoop,
            9 => Step::AppDidOperand,
            10 => Step::AppDidLastOperand,
            11 => Step::AppDispatch,
            other => unreachable!("continue register holds no step id: {other}"),
        }
    }
}

/// Jump to whatever step the `Continue` register names.
fn continue_step(heap: &Heap) -> Step {
    Step::from_value(heap.get_register(Register::Continue))
}

/// Run the machine to completion.
///
/// On entry `Expression` holds the expression and `Environment` the
/// environment; on success the result is in `Value`. On error the
/// registers are unspecified but the heap is intact, and the caller may
/// evaluate a fresh top-level expression after clearing the spill stack.
///
/// Saves and restores stay balanced across a successful run, so a
/// primitive may re-enter `evaluate` (the `evaluate` primitive does) and
/// find its caller's spilled state untouched.
pub fn evaluate(heap: &mut Heap) -> Result<()> {
    heap.set_register(Register::Continue, Step::Done.to_value());
    let mut step = Step::Dispatch;
    loop {
        trace!(?step, "evaluate");
        step = match step {
            Step::Done => return Ok(()),
            Step::Dispatch => dispatch(heap)?,
            Step::IfDecide => if_decide(heap)?,
            Step::AssignDo => assign_do(heap)?,
            Step::DefineDo => define_do(heap)?,
            Step::SeqStep => seq_step(heap)?,
            Step::SeqDidExpr => seq_did_expr(heap)?,
            Step::AppDidOperator => app_did_operator(heap)?,
            Step::AppOperandLoop => app_operand_loop(heap)?,
            Step::AppDidOperand => app_did_operand(heap)?,
            Step::AppDidLastOperand => app_did_last_operand(heap)?,
            Step::AppDispatch => app_dispatch(heap)?,
        };
    }
}

/// Classify `Expression` and begin reducing it. The classes are tested in
/// order: self-evaluating, variable, special form, application.
fn dispatch(heap: &mut Heap) -> Result<Step> {
    let expr = heap.get_register(Register::Expression);

    if is_self_evaluating(expr) {
        heap.set_register(Register::Value, expr);
        return Ok(continue_step(heap));
    }
    if is_variable(expr) {
        return eval_variable(heap);
    }
    if expr.is_pair() {
        if is_tagged_list(heap, expr, "quote") {
            return eval_quote(heap);
        }
        if is_tagged_list(heap, expr, "set!") {
            return eval_assignment(heap);
        }
        if is_tagged_list(heap, expr, "define") {
            return eval_definition(heap);
        }
        if is_tagged_list(heap, expr, "if") {
            return eval_if(heap);
        }
        if is_tagged_list(heap, expr, "fn") {
            return eval_lambda(heap);
        }
        if is_tagged_list(heap, expr, "begin") {
            return eval_begin(heap);
        }
        return eval_application(heap);
    }
    Err(ErrorCode::UnknownExpression)
}

fn eval_variable(heap: &mut Heap) -> Result<Step> {
    let expr = heap.get_register(Register::Expression);
    let environment = heap.get_register(Register::Environment);
    match lookup_variable(heap, expr, environment) {
        Some(value) => {
            heap.set_register(Register::Value, value);
            Ok(continue_step(heap))
        }
        None => {
            trace!(variable = %heap.blob_string(expr), "unbound variable");
            Err(ErrorCode::UnboundVariable)
        }
    }
}

fn eval_quote(heap: &mut Heap) -> Result<Step> {
    let expr = heap.get_register(Register::Expression);
    let text = quote_text(heap, expr)?;
    heap.set_register(Register::Value, text);
    Ok(continue_step(heap))
}

fn eval_assignment(heap: &mut Heap) -> Result<Step> {
    let expr = heap.get_register(Register::Expression);
    let (variable, value_expr) = assignment_parts(heap, expr)?;
    // Both pieces go into registers before the saves can collect.
    heap.set_register(Register::Unevaluated, variable);
    heap.set_register(Register::Expression, value_expr);
    heap.save(Register::Unevaluated)?;
    heap.save(Register::Environment)?;
    heap.save(Register::Continue)?;
    heap.set_register(Register::Continue, Step::AssignDo.to_value());
    Ok(Step::Dispatch)
}

fn assign_do(heap: &mut Heap) -> Result<Step> {
    heap.restore(Register::Continue);
    heap.restore(Register::Environment);
    heap.restore(Register::Unevaluated);
    let variable = heap.get_register(Register::Unevaluated);
    let value = heap.get_register(Register::Value);
    let environment = heap.get_register(Register::Environment);
    set_variable(heap, variable, value, environment)?;

    let ok = heap.find_symbol("ok");
    heap.set_register(Register::Value, ok);
    Ok(continue_step(heap))
}

fn eval_definition(heap: &mut Heap) -> Result<Step> {
    let expr = heap.get_register(Register::Expression);
    let (variable, value_expr) = definition_parts(heap, expr)?;
    heap.set_register(Register::Unevaluated, variable);
    heap.set_register(Register::Expression, value_expr);
    heap.save(Register::Unevaluated)?;
    heap.save(Register::Environment)?;
    heap.save(Register::Continue)?;
    heap.set_register(Register::Continue, Step::DefineDo.to_value());
    Ok(Step::Dispatch)
}

fn define_do(heap: &mut Heap) -> Result<Step> {
    heap.restore(Register::Continue);
    heap.restore(Register::Environment);
    heap.restore(Register::Unevaluated);
    define_variable(heap)?;

    // A definition yields the symbol it defined.
    let variable = heap.get_register(Register::Unevaluated);
    heap.set_register(Register::Value, variable);
    Ok(continue_step(heap))
}

fn eval_if(heap: &mut Heap) -> Result<Step> {
    let expr = heap.get_register(Register::Expression);
    if_parts(heap, expr)?; // shape check before committing any state
    heap.save(Register::Expression)?;
    heap.save(Register::Environment)?;
    heap.save(Register::Continue)?;

    // Re-derive from the register: the saves may have moved the form.
    let expr = heap.get_register(Register::Expression);
    let (predicate, _, _) = if_parts(heap, expr)?;
    heap.set_register(Register::Expression, predicate);
    heap.set_register(Register::Continue, Step::IfDecide.to_value());
    Ok(Step::Dispatch)
}

fn if_decide(heap: &mut Heap) -> Result<Step> {
    heap.restore(Register::Continue);
    heap.restore(Register::Environment);
    heap.restore(Register::Expression);

    let expr = heap.get_register(Register::Expression);
    let (_, consequent, alternative) = if_parts(heap, expr)?;

    // Anything but false is true, including nil.
    let test = heap.get_register(Register::Value);
    if !test.is_false() {
        heap.set_register(Register::Expression, consequent);
        Ok(Step::Dispatch)
    } else if let Some(alternative) = alternative {
        heap.set_register(Register::Expression, alternative);
        Ok(Step::Dispatch)
    } else {
        heap.set_register(Register::Value, Value::NIL);
        Ok(continue_step(heap))
    }
}

fn eval_lambda(heap: &mut Heap) -> Result<Step> {
    let expr = heap.get_register(Register::Expression);
    lambda_parts(heap, expr)?; // shape check first

    let procedure = heap.allocate_procedure()?;
    let expr = heap.get_register(Register::Expression);
    let (parameters, body) = lambda_parts(heap, expr)?;
    let environment = heap.get_register(Register::Environment);
    heap.set_procedure_environment(procedure, environment);
    heap.set_procedure_parameters(procedure, parameters);
    heap.set_procedure_body(procedure, body);

    heap.set_register(Register::Value, procedure);
    Ok(continue_step(heap))
}

fn eval_begin(heap: &mut Heap) -> Result<Step> {
    let expr = heap.get_register(Register::Expression);
    let body = begin_body(heap, expr)?;
    heap.set_register(Register::Unevaluated, body);
    heap.save(Register::Continue)?;
    Ok(Step::SeqStep)
}

/// Evaluate the sequence in `Unevaluated`. Invariant: the continuation to
/// run after the last expression is on top of the spill stack, which
/// makes the last expression a tail position.
fn seq_step(heap: &mut Heap) -> Result<Step> {
    let unevaluated = heap.get_register(Register::Unevaluated);
    debug_assert!(unevaluated.is_pair(), "sequence bodies are non-empty");
    let first = heap.car(unevaluated);
    heap.set_register(Register::Expression, first);

    if heap.cdr(unevaluated).is_nil() {
        heap.restore(Register::Continue);
        Ok(Step::Dispatch)
    } else {
        heap.save(Register::Unevaluated)?;
        heap.save(Register::Environment)?;
        heap.set_register(Register::Continue, Step::SeqDidExpr.to_value());
        Ok(Step::Dispatch)
    }
}

fn seq_did_expr(heap: &mut Heap) -> Result<Step> {
    heap.restore(Register::Environment);
    heap.restore(Register::Unevaluated);
    let unevaluated = heap.get_register(Register::Unevaluated);
    let rest = heap.cdr(unevaluated);
    heap.set_register(Register::Unevaluated, rest);
    Ok(Step::SeqStep)
}

fn eval_application(heap: &mut Heap) -> Result<Step> {
    let expr = heap.get_register(Register::Expression);
    if !is_proper_list(heap, heap.cdr(expr)) {
        return Err(ErrorCode::UnknownExpression);
    }

    heap.save(Register::Continue)?;
    heap.save(Register::Environment)?;
    let expr = heap.get_register(Register::Expression);
    let operands = heap.cdr(expr);
    heap.set_register(Register::Unevaluated, operands);
    heap.save(Register::Unevaluated)?;

    let expr = heap.get_register(Register::Expression);
    let operator = heap.car(expr);
    heap.set_register(Register::Expression, operator);
    heap.set_register(Register::Continue, Step::AppDidOperator.to_value());
    Ok(Step::Dispatch)
}

fn app_did_operator(heap: &mut Heap) -> Result<Step> {
    heap.restore(Register::Unevaluated);
    heap.restore(Register::Environment);
    let operator = heap.get_register(Register::Value);
    heap.set_register(Register::Procedure, operator);
    heap.set_register(Register::ArgumentList, Value::NIL);

    if heap.get_register(Register::Unevaluated).is_nil() {
        // No operands; the caller's continuation is on top of the stack.
        Ok(Step::AppDispatch)
    } else {
        heap.save(Register::Procedure)?;
        Ok(Step::AppOperandLoop)
    }
}

fn app_operand_loop(heap: &mut Heap) -> Result<Step> {
    heap.save(Register::ArgumentList)?;
    let unevaluated = heap.get_register(Register::Unevaluated);
    let first = heap.car(unevaluated);
    heap.set_register(Register::Expression, first);

    if heap.cdr(unevaluated).is_nil() {
        heap.set_register(Register::Continue, Step::AppDidLastOperand.to_value());
        Ok(Step::Dispatch)
    } else {
        heap.save(Register::Environment)?;
        heap.save(Register::Unevaluated)?;
        heap.set_register(Register::Continue, Step::AppDidOperand.to_value());
        Ok(Step::Dispatch)
    }
}

fn app_did_operand(heap: &mut Heap) -> Result<Step> {
    heap.restore(Register::Unevaluated);
    heap.restore(Register::Environment);
    heap.restore(Register::ArgumentList);
    push_value_onto_argument_list(heap)?;
    let unevaluated = heap.get_register(Register::Unevaluated);
    let rest = heap.cdr(unevaluated);
    heap.set_register(Register::Unevaluated, rest);
    Ok(Step::AppOperandLoop)
}

fn app_did_last_operand(heap: &mut Heap) -> Result<Step> {
    heap.restore(Register::ArgumentList);
    push_value_onto_argument_list(heap)?;
    heap.restore(Register::Procedure);
    Ok(Step::AppDispatch)
}

fn app_dispatch(heap: &mut Heap) -> Result<Step> {
    // Arguments accumulated front-first; one in-place reversal puts them
    // in source order without allocating.
    let arguments = heap.get_register(Register::ArgumentList);
    let arguments = heap.reverse_in_place(arguments, Value::NIL);
    heap.set_register(Register::ArgumentList, arguments);

    let procedure = heap.get_register(Register::Procedure);
    if procedure.is_primitive() {
        let (_, func) = PRIMITIVES[procedure.primitive_index()];
        let result = func(heap)?;
        heap.set_register(Register::Value, result);
        heap.restore(Register::Continue);
        Ok(continue_step(heap))
    } else if procedure.is_procedure() {
        extend_environment(heap)?;
        let procedure = heap.get_register(Register::Procedure);
        let body = heap.procedure_body(procedure);
        heap.set_register(Register::Unevaluated, body);
        // The caller's continuation is on top of the stack; the body runs
        // as a sequence and the last expression returns through it.
        Ok(Step::SeqStep)
    } else {
        Err(ErrorCode::NotAProcedure)
    }
}

fn push_value_onto_argument_list(heap: &mut Heap) -> Result<()> {
    let pair = heap.allocate_pair()?;
    let value = heap.get_register(Register::Value);
    let arguments = heap.get_register(Register::ArgumentList);
    heap.set_car(pair, value);
    heap.set_cdr(pair, arguments);
    heap.set_register(Register::ArgumentList, pair);
    Ok(())
}
