//! Lexical Environments
//!
//! An environment is a list of scopes, innermost first. Each scope is a
//! pair of two positionally aligned lists: car holds the bound symbols,
//! cdr the corresponding values.
//!
//! ```text
//! Environment := (innermost-scope ... global-scope)
//! Scope       := (variables . values)
//! ```
//!
//! Lookup walks scopes innermost-first and within each scope walks the
//! parallel lists; symbols are interned, so the comparison is reference
//! equality.
//!
//! The mutating operations allocate, so they take their operands through
//! registers rather than parameters: a collection in the middle of a
//! splice would otherwise leave the caller holding stale references.
//! Multi-pair splices reserve their full footprint up front, making each
//! operation atomic with respect to both collection and allocation
//! failure.

use wisp_core::{ErrorCode, Heap, Register, Result, Value};

/// Find the value-list cell whose car holds `variable`'s binding in
/// `scope`, or nil.
fn scope_value_cell(heap: &Heap, variable: Value, scope: Value) -> Value {
    if !scope.is_pair() {
        return Value::NIL;
    }
    let mut variables = heap.car(scope);
    let mut values = heap.cdr(scope);
    while variables.is_pair() && values.is_pair() {
        if heap.car(variables) == variable {
            return values;
        }
        variables = heap.cdr(variables);
        values = heap.cdr(values);
    }
    Value::NIL
}

/// Find the value-list cell for `variable` anywhere in `environment`,
/// innermost scope first, or nil.
fn lookup_value_cell(heap: &Heap, variable: Value, environment: Value) -> Value {
    let mut env = environment;
    while env.is_pair() {
        let cell = scope_value_cell(heap, variable, heap.car(env));
        if cell.is_pair() {
            return cell;
        }
        env = heap.cdr(env);
    }
    Value::NIL
}

/// Look up the value bound to `variable`, or `None` if it is unbound.
pub fn lookup_variable(heap: &Heap, variable: Value, environment: Value) -> Option<Value> {
    let cell = lookup_value_cell(heap, variable, environment);
    if cell.is_pair() {
        Some(heap.car(cell))
    } else {
        None
    }
}

/// Assign to the nearest existing binding of `variable`.
pub fn set_variable(
    heap: &mut Heap,
    variable: Value,
    value: Value,
    environment: Value,
) -> Result<()> {
    let cell = lookup_value_cell(heap, variable, environment);
    if !cell.is_pair() {
        return Err(ErrorCode::UnboundVariable);
    }
    heap.set_car(cell, value);
    Ok(())
}

/// Introduce a binding in the innermost scope.
///
/// Reads the symbol from `Unevaluated`, the value from `Value`, and the
/// environment from `Environment`. Redefinition overwrites the existing
/// innermost binding in place.
pub fn define_variable(heap: &mut Heap) -> Result<()> {
    let variable = heap.get_register(Register::Unevaluated);
    let environment = heap.get_register(Register::Environment);
    debug_assert!(environment.is_pair(), "environment has no scope");

    let cell = scope_value_cell(heap, variable, heap.car(environment));
    if cell.is_pair() {
        let value = heap.get_register(Register::Value);
        heap.set_car(cell, value);
        return Ok(());
    }

    heap.ensure_capacity(4)?;
    let vars_cell = heap.allocate_pair()?;
    let vals_cell = heap.allocate_pair()?;

    let environment = heap.get_register(Register::Environment);
    let scope = heap.car(environment);
    let variable = heap.get_register(Register::Unevaluated);
    let value = heap.get_register(Register::Value);
    let old_vars = heap.car(scope);
    let old_vals = heap.cdr(scope);

    heap.set_car(vars_cell, variable);
    heap.set_cdr(vars_cell, old_vars);
    heap.set_car(scope, vars_cell);

    heap.set_car(vals_cell, value);
    heap.set_cdr(vals_cell, old_vals);
    heap.set_cdr(scope, vals_cell);
    Ok(())
}

/// Build the call scope for a compound procedure application.
///
/// Reads the procedure from `Procedure` and the (source-order) argument
/// list from `ArgumentList`; installs a new environment — a scope binding
/// the parameters to the arguments, extending the procedure's captured
/// environment — into `Environment`. Arity must match exactly.
pub fn extend_environment(heap: &mut Heap) -> Result<()> {
    let procedure = heap.get_register(Register::Procedure);
    let parameters = heap.procedure_parameters(procedure);
    let arguments = heap.get_register(Register::ArgumentList);
    if heap.list_length(parameters) != heap.list_length(arguments) {
        return Err(ErrorCode::ArityMismatch);
    }

    heap.ensure_capacity(4)?;
    let scope = heap.allocate_pair()?;
    let frame = heap.allocate_pair()?;

    let procedure = heap.get_register(Register::Procedure);
    let arguments = heap.get_register(Register::ArgumentList);
    let parameters = heap.procedure_parameters(procedure);
    let captured = heap.procedure_environment(procedure);

    heap.set_car(scope, parameters);
    heap.set_cdr(scope, arguments);
    heap.set_car(frame, scope);
    heap.set_cdr(frame, captured);
    heap.set_register(Register::Environment, frame);
    Ok(())
}
