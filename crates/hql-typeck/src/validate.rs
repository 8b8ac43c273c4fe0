//! Call-site validation: arity and advisory type checks.
//!
//! Everything here is a warning. The checker has no sound inference, so it
//! only complains when a call demonstrably cannot line up with the
//! signature it resolved to.

use hql_ast::{Diag, SExp, Span};
use smol_str::SmolStr;

use crate::scope::{ParamSig, Symbol};
use crate::types;

/// Validate one call against a resolved function signature. `inferred`
/// holds a shallow type per element of `args` (tags included, as `Any`).
pub fn check_call(
    symbol: &Symbol,
    args: &[SExp],
    inferred: &[SmolStr],
    call_span: Span,
    diags: &mut Vec<Diag>,
) {
    let mut positional: Vec<usize> = Vec::new();
    let mut named: Vec<(SmolStr, usize, Span)> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if let SExp::Tag { name, span } = &args[i] {
            if i + 1 < args.len() {
                named.push((name.clone(), i + 1, *span));
                i += 2;
            } else {
                diags.push(Diag::warning(
                    format!("named argument '{}' has no value", name),
                    *span,
                ));
                i += 1;
            }
        } else {
            positional.push(i);
            i += 1;
        }
    }

    let supplied = positional.len() + named.len();
    let required = symbol.params.iter().filter(|p| !p.optional && !p.rest).count();
    let has_rest = symbol.params.iter().any(|p| p.rest);
    let max = symbol.params.iter().filter(|p| !p.rest).count();

    if named.is_empty() {
        if supplied < required {
            diags.push(Diag::warning(
                format!(
                    "'{}' expects at least {} argument{}, got {}",
                    symbol.name,
                    required,
                    if required == 1 { "" } else { "s" },
                    supplied
                ),
                call_span,
            ));
        } else if !has_rest && supplied > max {
            diags.push(Diag::warning(
                format!(
                    "'{}' expects at most {} argument{}, got {}",
                    symbol.name,
                    max,
                    if max == 1 { "" } else { "s" },
                    supplied
                ),
                call_span,
            ));
        }
    } else {
        // named mode: every parameter without a default must be covered,
        // positionally or by name
        for (slot, param) in symbol.params.iter().filter(|p| !p.rest).enumerate() {
            if param.optional {
                continue;
            }
            let covered =
                slot < positional.len() || named.iter().any(|(n, _, _)| *n == param.name);
            if !covered {
                diags.push(Diag::warning(
                    format!(
                        "missing parameter '{}' in call to '{}'",
                        param.name, symbol.name
                    ),
                    call_span,
                ));
            }
        }
        if !has_rest && supplied > max {
            diags.push(Diag::warning(
                format!(
                    "'{}' expects at most {} argument{}, got {}",
                    symbol.name,
                    max,
                    if max == 1 { "" } else { "s" },
                    supplied
                ),
                call_span,
            ));
        }
    }

    for (name, value_idx, span) in &named {
        match symbol.params.iter().find(|p| p.name == *name) {
            Some(param) => {
                check_arg_type(symbol, param, &inferred[*value_idx], args[*value_idx].span(), diags)
            }
            None => diags.push(Diag::warning(
                format!("unknown parameter '{}' for '{}'", name, symbol.name),
                *span,
            )),
        }
    }

    let fixed: Vec<&ParamSig> = symbol.params.iter().filter(|p| !p.rest).collect();
    for (slot, arg_idx) in positional.iter().enumerate() {
        let Some(param) = fixed.get(slot) else { break };
        check_arg_type(symbol, param, &inferred[*arg_idx], args[*arg_idx].span(), diags);
    }
}

/// Type warnings apply only to `fx` signatures; `fn` parameters are loose
/// even when annotated.
fn check_arg_type(
    symbol: &Symbol,
    param: &ParamSig,
    actual: &str,
    span: Span,
    diags: &mut Vec<Diag>,
) {
    if !symbol.is_pure {
        return;
    }
    let Some(expected) = &param.ty else { return };
    if !types::compatible(expected, actual) {
        diags.push(Diag::warning(
            format!(
                "type mismatch for parameter '{}' of '{}': expected {}, got {}",
                param.name, symbol.name, expected, actual
            ),
            span,
        ));
    }
}
