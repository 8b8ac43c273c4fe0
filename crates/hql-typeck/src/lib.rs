//! Scope resolution and advisory checking.
//!
//! Operates on the macro-free S-expression forest. Builds a two-pass
//! symbol table (declarations first, so use may precede definition), then
//! resolves every occurrence and validates call sites against the
//! signatures they resolve to. Nothing here is fatal: unresolved names and
//! implausible calls surface as warnings, naming conventions as hints.

mod builtins;
pub mod scope;
pub mod types;
mod validate;

#[cfg(test)]
mod tests;

use hql_ast::{Diag, SExp};

pub use builtins::{is_builtin, is_host_global, is_known};
pub use scope::{
    resolve, ParamSig, ScopeId, Symbol, SymbolId, SymbolKind, SymbolTable, GLOBAL_SCOPE,
};

/// The full result of checking a document.
pub struct Analysis {
    pub table: SymbolTable,
    pub diags: Vec<Diag>,
}

pub fn check(forms: &[SExp]) -> Analysis {
    let (table, diags) = resolve(forms);
    Analysis { table, diags }
}
