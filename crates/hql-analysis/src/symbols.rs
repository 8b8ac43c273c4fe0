use serde::Serialize;

use hql_typeck::{Symbol, SymbolTable};

/// Extra detail the host shows in hovers and completion.
#[derive(Serialize, Debug, Clone)]
pub struct SymbolData {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    pub is_pure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// One exported symbol, addressed by its scope path
/// (`global`, `global.f`, `global.f.let#3`, ...).
#[derive(Serialize, Debug, Clone)]
pub struct SymbolRecord {
    pub name: String,
    pub kind: &'static str,
    pub scope_path: String,
    pub data: SymbolData,
}

pub fn export_symbols(table: &SymbolTable) -> Vec<SymbolRecord> {
    table.symbols().iter().map(record).collect()
}

pub(crate) fn record(symbol: &Symbol) -> SymbolRecord {
    let params = symbol
        .params
        .iter()
        .map(|p| {
            let mut s = String::new();
            if p.rest {
                s.push_str("& ");
            }
            s.push_str(&p.name);
            if let Some(ty) = &p.ty {
                s.push_str(": ");
                s.push_str(ty);
            }
            s
        })
        .collect();
    SymbolRecord {
        name: symbol.name.to_string(),
        kind: symbol.kind.as_str(),
        scope_path: symbol.scope_path.to_string(),
        data: SymbolData {
            params,
            is_pure: symbol.is_pure,
            enum_name: symbol.enum_name.as_ref().map(|n| n.to_string()),
            documentation: symbol.documentation.clone(),
        },
    }
}
