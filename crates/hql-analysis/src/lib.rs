//! The front-end pipeline, packaged for an editor host.
//!
//! One call runs read → expand → lower → check over a document snapshot
//! and merges every stage's diagnostics into a single host-facing batch
//! with 1-indexed line/column ranges. Later stages always run: a parse
//! error in one form never suppresses findings elsewhere.

mod document;
mod symbols;
mod workspace;

use serde::Serialize;

use hql_ast::{Pos, Severity, Span};
use hql_ir::IrModule;

pub use document::Document;
pub use symbols::{export_symbols, SymbolData, SymbolRecord};
pub use workspace::imported_records;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Pos,
    pub end: Pos,
}

/// A diagnostic in the shape the host consumes directly.
#[derive(Serialize, Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub range: Range,
    pub message: String,
    pub source: &'static str,
}

/// All diagnostics for one document snapshot, tagged with the version the
/// host sent so stale batches can be discarded.
#[derive(Serialize, Debug, Clone)]
pub struct DiagnosticsBatch {
    pub version: i32,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct AnalysisOutcome {
    pub batch: DiagnosticsBatch,
    pub symbols: Vec<SymbolRecord>,
    pub ir: IrModule,
}

/// Analyze one document snapshot end to end.
pub fn analyze(doc: &Document) -> AnalysisOutcome {
    let (forms, parse_errors) = hql_reader::parse_tolerant(doc.text());
    tracing::debug!(
        forms = forms.len(),
        errors = parse_errors.len(),
        "read document"
    );

    let expanded = hql_macros::expand_document(forms);
    tracing::debug!(
        forms = expanded.forms.len(),
        errors = expanded.errors.len(),
        "expanded macros"
    );

    let (ir, lower_diags) = hql_ir::lower(&expanded.forms);
    tracing::debug!(nodes = ir.len(), errors = lower_diags.len(), "lowered");

    let analysis = hql_typeck::check(&expanded.forms);
    tracing::debug!(
        symbols = analysis.table.symbols().len(),
        diags = analysis.diags.len(),
        "resolved symbols"
    );

    let mut diagnostics = Vec::new();
    for err in &parse_errors {
        diagnostics.push(to_diagnostic(doc, Severity::Error, err.span, &err.message));
    }
    for err in &expanded.errors {
        diagnostics.push(to_diagnostic(doc, Severity::Error, err.span, &err.message));
    }
    for diag in lower_diags.iter().chain(analysis.diags.iter()) {
        diagnostics.push(to_diagnostic(doc, diag.severity, diag.span, &diag.message));
    }
    diagnostics.sort_by_key(|d| (d.range.start.line, d.range.start.column, d.severity));

    AnalysisOutcome {
        batch: DiagnosticsBatch {
            version: doc.version(),
            diagnostics,
        },
        symbols: export_symbols(&analysis.table),
        ir,
    }
}

fn to_diagnostic(doc: &Document, severity: Severity, span: Span, message: &str) -> Diagnostic {
    Diagnostic {
        severity,
        range: Range {
            start: doc.pos(span.start),
            end: doc.pos(span.end),
        },
        message: message.to_string(),
        source: "hql",
    }
}
