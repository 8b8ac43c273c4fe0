//! Shallow, best-effort inspection of directly imported files.
//!
//! Only one level deep: the imported file's own imports are not followed.
//! Any failure to read or parse an import degrades to an empty result for
//! that file; the current document's analysis is never blocked on the
//! workspace.

use std::path::{Path, PathBuf};

use hql_ir::{IrModule, IrNode};

use crate::symbols::{record, SymbolRecord};

/// Top-level symbols of every file the module imports by path.
pub fn imported_records(doc_path: &Path, module: &IrModule) -> Vec<SymbolRecord> {
    let dir = doc_path.parent().unwrap_or_else(|| Path::new("."));
    let mut out = Vec::new();
    for id in &module.toplevel {
        let IrNode::Import { path: Some(path), .. } = module.node(*id) else {
            continue;
        };
        out.extend(file_symbols(&resolve_import(dir, path)));
    }
    out
}

fn resolve_import(dir: &Path, path: &str) -> PathBuf {
    let mut resolved = dir.join(path);
    if resolved.extension().is_none() {
        resolved.set_extension("hql");
    }
    resolved
}

fn file_symbols(path: &Path) -> Vec<SymbolRecord> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "skipping unreadable import");
            return Vec::new();
        }
    };
    let (forms, _) = hql_reader::parse_tolerant(&text);
    let expanded = hql_macros::expand_document(forms);
    let analysis = hql_typeck::check(&expanded.forms);
    analysis
        .table
        .symbols()
        .iter()
        .filter(|s| s.scope_path == "global")
        .map(record)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_symbols_from_an_imported_file() {
        let dir = std::env::temp_dir().join("hql-analysis-workspace-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("utils.hql"), "(fn helper (a b) (+ a b))").unwrap();

        let (forms, _) = hql_reader::parse_tolerant("(import utils from \"./utils.hql\")");
        let expanded = hql_macros::expand_document(forms);
        let (module, _) = hql_ir::lower(&expanded.forms);

        let records = imported_records(&dir.join("main.hql"), &module);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "helper");
        assert_eq!(records[0].kind, "function");
    }

    #[test]
    fn missing_import_degrades_to_empty() {
        let (forms, _) = hql_reader::parse_tolerant("(import gone from \"./no-such-file.hql\")");
        let expanded = hql_macros::expand_document(forms);
        let (module, _) = hql_ir::lower(&expanded.forms);

        let records = imported_records(Path::new("/nonexistent/main.hql"), &module);
        assert!(records.is_empty());
    }
}
