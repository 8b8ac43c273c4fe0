//! Symbol table and scope resolution.
//!
//! Two passes over the expanded forest. The first collects top-level
//! declarations so a definition may appear after its first use. The second
//! walks every expression position, declaring local bindings as they come
//! into view and resolving each symbol occurrence innermost-first.

use std::collections::HashMap;

use hql_ast::{Diag, SExp, Span, StrSegment};
use hql_ir::params::{parse_param_list, type_annotation, Param};
use smol_str::SmolStr;

use crate::builtins;
use crate::validate;

pub type ScopeId = usize;
pub type SymbolId = usize;

pub const GLOBAL_SCOPE: ScopeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Method,
    Constructor,
    Class,
    Struct,
    Enum,
    EnumCase,
    Let,
    Var,
    Param,
    Field,
    Import,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Class => "class",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumCase => "enum-member",
            SymbolKind::Let | SymbolKind::Var => "variable",
            SymbolKind::Param => "param",
            SymbolKind::Field => "field",
            SymbolKind::Import => "import",
        }
    }
}

/// One signature parameter, as much of it as call validation needs.
#[derive(Debug, Clone)]
pub struct ParamSig {
    pub name: SmolStr,
    pub ty: Option<SmolStr>,
    pub optional: bool,
    pub rest: bool,
}

impl ParamSig {
    fn from_param(p: &Param) -> Self {
        ParamSig {
            name: p.name.clone(),
            ty: p.ty.clone(),
            optional: p.default.is_some(),
            rest: p.rest,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: SmolStr,
    pub kind: SymbolKind,
    pub scope_path: SmolStr,
    pub span: Span,
    pub params: Vec<ParamSig>,
    pub is_pure: bool,
    /// Declared type of a parameter or binding.
    pub ty: Option<SmolStr>,
    pub return_ty: Option<SmolStr>,
    pub enum_name: Option<SmolStr>,
    pub documentation: Option<String>,
}

impl Symbol {
    fn new(name: SmolStr, kind: SymbolKind, span: Span) -> Self {
        Symbol {
            name,
            kind,
            scope_path: SmolStr::default(),
            span,
            params: Vec::new(),
            is_pure: false,
            ty: None,
            return_ty: None,
            enum_name: None,
            documentation: None,
        }
    }
}

#[derive(Debug)]
struct ScopeData {
    parent: Option<ScopeId>,
    path: String,
    names: HashMap<SmolStr, SymbolId>,
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<ScopeData>,
    symbols: Vec<Symbol>,
    anon: u32,
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable {
            scopes: vec![ScopeData {
                parent: None,
                path: "global".to_string(),
                names: HashMap::new(),
            }],
            symbols: Vec::new(),
            anon: 0,
        }
    }
}

impl SymbolTable {
    fn child_scope(&mut self, parent: ScopeId, label: &str) -> ScopeId {
        let path = format!("{}.{}", self.scopes[parent].path, label);
        self.scopes.push(ScopeData {
            parent: Some(parent),
            path,
            names: HashMap::new(),
        });
        self.scopes.len() - 1
    }

    /// Scope for an unnamed construct, labelled `let#3`, `lambda#7`, ...
    fn anon_scope(&mut self, parent: ScopeId, kind: &str) -> ScopeId {
        self.anon += 1;
        let label = format!("{}#{}", kind, self.anon);
        self.child_scope(parent, &label)
    }

    fn declare(&mut self, scope: ScopeId, mut symbol: Symbol) -> SymbolId {
        symbol.scope_path = SmolStr::new(&self.scopes[scope].path);
        let id = self.symbols.len();
        self.scopes[scope].names.insert(symbol.name.clone(), id);
        self.symbols.push(symbol);
        id
    }

    fn lookup_in(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scopes[scope].names.get(name).copied()
    }

    /// Innermost-first lookup.
    pub fn resolve_from(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if let Some(id) = self.scopes[s].names.get(name) {
                return Some(*id);
            }
            current = self.scopes[s].parent;
        }
        None
    }

    pub fn resolve_global(&self, name: &str) -> Option<&Symbol> {
        self.lookup_in(GLOBAL_SCOPE, name).map(|id| &self.symbols[id])
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

/// Build the table and run resolution plus call validation.
pub fn resolve(forms: &[SExp]) -> (SymbolTable, Vec<Diag>) {
    let mut table = SymbolTable::default();
    let mut diags = Vec::new();
    collect_globals(forms, &mut table, &mut diags);
    let mut resolver = Resolver { table: &mut table, diags: &mut diags };
    resolver.walk_body(forms, GLOBAL_SCOPE, true);
    (table, diags)
}

// ── Pass 1: top-level declarations ────────────────────────────────

fn collect_globals(forms: &[SExp], table: &mut SymbolTable, diags: &mut Vec<Diag>) {
    for form in forms {
        let Some(elems) = form.as_list() else { continue };
        let span = form.span();
        match form.head_symbol() {
            Some(kw @ ("fn" | "fx")) => {
                if let Some(symbol) = function_symbol(kw, elems, span) {
                    hint_lowercase(&symbol.name, symbol.span, "function", diags);
                    table.declare(GLOBAL_SCOPE, symbol);
                }
            }
            Some("class") => {
                if let Some(SExp::Symbol { name, span: nspan }) = elems.get(1) {
                    hint_capitalized(name, *nspan, "class", diags);
                    table.declare(GLOBAL_SCOPE, Symbol::new(name.clone(), SymbolKind::Class, span));
                }
            }
            Some("struct") => {
                if let Some(SExp::Symbol { name, span: nspan }) = elems.get(1) {
                    hint_capitalized(name, *nspan, "struct", diags);
                    table.declare(GLOBAL_SCOPE, Symbol::new(name.clone(), SymbolKind::Struct, span));
                }
            }
            Some("enum") => collect_enum(elems, span, table, diags),
            Some(kw @ ("let" | "var")) => {
                if let Some(SExp::Symbol { name, span: nspan }) = elems.get(1) {
                    let kind = if kw == "var" { SymbolKind::Var } else { SymbolKind::Let };
                    hint_lowercase(name, *nspan, "binding", diags);
                    table.declare(GLOBAL_SCOPE, Symbol::new(name.clone(), kind, span));
                }
            }
            Some("import") => {
                match elems.get(1) {
                    Some(SExp::Symbol { name, .. }) => {
                        table.declare(
                            GLOBAL_SCOPE,
                            Symbol::new(name.clone(), SymbolKind::Import, span),
                        );
                    }
                    Some(SExp::Vector { elems: names, .. }) => {
                        let mut i = 0;
                        while i < names.len() {
                            let SExp::Symbol { name, span: nspan } = &names[i] else {
                                i += 1;
                                continue;
                            };
                            // `name as alias` binds the alias locally
                            let (local, lspan) = if names
                                .get(i + 1)
                                .map_or(false, |e| e.is_symbol("as"))
                            {
                                match names.get(i + 2) {
                                    Some(SExp::Symbol { name: alias, span: aspan }) => {
                                        i += 3;
                                        (alias.clone(), *aspan)
                                    }
                                    _ => {
                                        i += 2;
                                        (name.clone(), *nspan)
                                    }
                                }
                            } else {
                                i += 1;
                                (name.clone(), *nspan)
                            };
                            table.declare(
                                GLOBAL_SCOPE,
                                Symbol::new(local, SymbolKind::Import, lspan),
                            );
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

fn collect_enum(elems: &[SExp], span: Span, table: &mut SymbolTable, diags: &mut Vec<Diag>) {
    let (name, case_start) = match elems.get(1) {
        Some(SExp::Symbol { name, span: nspan }) => {
            hint_capitalized(name, *nspan, "enum", diags);
            (name.clone(), 2)
        }
        Some(SExp::Tag { name, span: nspan }) => {
            hint_capitalized(name, *nspan, "enum", diags);
            (name.clone(), 3)
        }
        _ => return,
    };
    table.declare(GLOBAL_SCOPE, Symbol::new(name.clone(), SymbolKind::Enum, span));
    for member in &elems[case_start.min(elems.len())..] {
        if member.head_symbol() != Some("case") {
            continue;
        }
        let Some(parts) = member.as_list() else { continue };
        if let Some(SExp::Symbol { name: cname, span: cspan }) = parts.get(1) {
            let dotted = SmolStr::new(format!("{}.{}", name, cname));
            let mut sym = Symbol::new(dotted, SymbolKind::EnumCase, *cspan);
            sym.enum_name = Some(name.clone());
            table.declare(GLOBAL_SCOPE, sym);
        }
    }
}

/// Build the symbol for a `fn`/`fx` definition, including its signature
/// and leading docstring.
fn function_symbol(kw: &str, elems: &[SExp], span: Span) -> Option<Symbol> {
    let SExp::Symbol { name, .. } = elems.get(1)? else { return None };
    let mut symbol = Symbol::new(name.clone(), SymbolKind::Function, span);
    symbol.is_pure = kw == "fx";
    if let Some(SExp::List { elems: plist, .. }) = elems.get(2) {
        // structural problems in the list are lowering's to report
        let mut scratch = Vec::new();
        let params = parse_param_list(plist, &mut scratch);
        symbol.params = params.iter().map(ParamSig::from_param).collect();
    }
    let mut body_start = 3;
    if let Some(ty) = elems.get(3).and_then(return_annotation) {
        symbol.return_ty = Some(ty);
        body_start = 4;
    }
    // a leading string with more body after it is a docstring
    if let Some(SExp::Str { segments, .. }) = elems.get(body_start) {
        if elems.len() > body_start + 1 {
            let mut doc = String::new();
            for seg in segments {
                if let StrSegment::Text(t) = seg {
                    doc.push_str(t);
                }
            }
            symbol.documentation = Some(doc);
        }
    }
    Some(symbol)
}

fn return_annotation(sexp: &SExp) -> Option<SmolStr> {
    let parts = sexp.as_list()?;
    match parts {
        [arrow, ty] if arrow.is_symbol("->") => type_annotation(ty),
        _ => None,
    }
}

fn hint_capitalized(name: &str, span: Span, what: &str, diags: &mut Vec<Diag>) {
    if name.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        diags.push(Diag::hint(
            format!("{} names are conventionally capitalized: '{}'", what, name),
            span,
        ));
    }
}

fn hint_lowercase(name: &str, span: Span, what: &str, diags: &mut Vec<Diag>) {
    if name.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        diags.push(Diag::hint(
            format!("{} names are conventionally lowercase: '{}'", what, name),
            span,
        ));
    }
}

// ── Pass 2: resolution and call validation ────────────────────────

struct Resolver<'a> {
    table: &'a mut SymbolTable,
    diags: &'a mut Vec<Diag>,
}

impl Resolver<'_> {
    /// Walk a sequence of forms. A simple `(let name value)` opens a fresh
    /// scope covering the remainder of the body.
    fn walk_body(&mut self, forms: &[SExp], scope: ScopeId, toplevel: bool) {
        let mut scope = scope;
        for form in forms {
            if let Some(elems) = form.as_list() {
                if let Some(kw @ ("let" | "var")) = form.head_symbol() {
                    if let Some(SExp::Symbol { name, span }) = elems.get(1) {
                        for value in &elems[2..] {
                            self.walk_expr(value, scope);
                        }
                        self.check_shadowing(name, *span, scope);
                        if toplevel {
                            // already declared in the global scope by pass 1
                            continue;
                        }
                        let kind =
                            if kw == "var" { SymbolKind::Var } else { SymbolKind::Let };
                        scope = self.table.anon_scope(scope, "let");
                        self.table
                            .declare(scope, Symbol::new(name.clone(), kind, *span));
                        continue;
                    }
                }
            }
            if toplevel {
                self.walk_toplevel_form(form);
            } else {
                self.walk_expr(form, scope);
            }
        }
    }

    fn walk_toplevel_form(&mut self, form: &SExp) {
        match form.head_symbol() {
            // declared by pass 1; only their interiors need walking
            Some("fn" | "fx") => {
                if let Some(elems) = form.as_list() {
                    if matches!(elems.get(1), Some(SExp::List { .. })) {
                        self.walk_lambda(elems, GLOBAL_SCOPE);
                    } else {
                        self.walk_function(elems, GLOBAL_SCOPE, true);
                    }
                }
            }
            Some("class") => {
                if let Some(elems) = form.as_list() {
                    self.walk_class(elems, GLOBAL_SCOPE);
                }
            }
            Some("struct" | "enum" | "import") => {}
            _ => self.walk_expr(form, GLOBAL_SCOPE),
        }
    }

    fn walk_expr(&mut self, form: &SExp, scope: ScopeId) {
        match form {
            SExp::Symbol { name, span } => {
                self.resolve_occurrence(name, *span, scope);
            }
            SExp::Tag { .. }
            | SExp::Int { .. }
            | SExp::Float { .. }
            | SExp::Bool { .. }
            | SExp::Nil { .. } => {}
            SExp::Str { segments, .. } => {
                for seg in segments {
                    if let StrSegment::Interp(forms) = seg {
                        for f in forms {
                            self.walk_expr(f, scope);
                        }
                    }
                }
            }
            SExp::Vector { elems, .. } | SExp::Set { elems, .. } => {
                for e in elems {
                    self.walk_expr(e, scope);
                }
            }
            SExp::Map { elems, .. } => self.walk_map(elems, scope),
            SExp::List { elems, span } => self.walk_list(elems, *span, scope),
        }
    }

    /// Map literals alternate keys and values; keys are labels, not
    /// references.
    fn walk_map(&mut self, elems: &[SExp], scope: ScopeId) {
        let mut i = 0;
        while i < elems.len() {
            if elems[i].is_symbol("&") {
                if let Some(expr) = elems.get(i + 1) {
                    self.walk_expr(expr, scope);
                }
                i += 2;
                continue;
            }
            // key position: skipped
            if let Some(value) = elems.get(i + 1) {
                self.walk_expr(value, scope);
            }
            i += 2;
        }
    }

    fn walk_list(&mut self, elems: &[SExp], span: Span, scope: ScopeId) {
        let Some(head) = elems.first() else { return };
        match head.as_symbol() {
            Some("fn" | "fx") => {
                // anonymous fn is a lambda
                if matches!(elems.get(1), Some(SExp::List { .. })) {
                    self.walk_lambda(elems, scope);
                } else {
                    self.walk_function(elems, scope, false);
                }
            }
            Some("lambda") => self.walk_lambda(elems, scope),
            Some("let" | "var") => self.walk_binding_form(elems, scope),
            Some("loop") => self.walk_loop(elems, scope),
            Some("for") => self.walk_for(elems, scope),
            Some("cond") => self.walk_cond(elems, scope),
            Some("class") => self.walk_class(elems, scope),
            Some("struct" | "enum" | "import" | "defmacro" | "macro") => {}
            // sequential bodies: a simple `let` covers the later siblings
            Some("do") => self.walk_body(&elems[1..], scope, false),
            Some("while" | "when" | "unless") => {
                if let Some(cond) = elems.get(1) {
                    self.walk_expr(cond, scope);
                }
                self.walk_body(&elems[2.min(elems.len())..], scope, false);
            }
            Some("export" | "set!" | "if" | "return" | "recur" | "new") => {
                // `new` resolves its class name like any other occurrence
                for e in &elems[1..] {
                    self.walk_expr(e, scope);
                }
            }
            Some(_) => self.walk_call(elems, span, scope),
            None => {
                for e in elems {
                    self.walk_expr(e, scope);
                }
            }
        }
    }

    fn walk_call(&mut self, elems: &[SExp], span: Span, scope: ScopeId) {
        let head = &elems[0];
        let name = head.as_symbol().unwrap_or_default();
        let resolved = self.resolve_occurrence(name, head.span(), scope);
        if let Some(id) = resolved {
            let symbol = self.table.symbol(id).clone();
            if matches!(symbol.kind, SymbolKind::Function | SymbolKind::Method) {
                let inferred = self.infer_args(&elems[1..], scope);
                validate::check_call(&symbol, &elems[1..], &inferred, span, self.diags);
            }
        }
        // argument values; named-parameter tags are labels
        for e in &elems[1..] {
            self.walk_expr(e, scope);
        }
    }

    fn infer_args(&mut self, args: &[SExp], scope: ScopeId) -> Vec<SmolStr> {
        args.iter().map(|a| self.infer(a, scope)).collect()
    }

    /// Shallow syntactic type inference, used only to power advisory
    /// warnings. Anything unclear is `Any`.
    fn infer(&mut self, sexp: &SExp, scope: ScopeId) -> SmolStr {
        match sexp {
            SExp::Int { .. } => "Int".into(),
            SExp::Float { .. } => "Float".into(),
            SExp::Bool { .. } => "Bool".into(),
            SExp::Nil { .. } => "Nil".into(),
            SExp::Str { .. } => "String".into(),
            SExp::Map { .. } => "Map".into(),
            SExp::Set { .. } => "Set".into(),
            SExp::Vector { elems, .. } => {
                let mut inner: Option<SmolStr> = None;
                for e in elems {
                    let t = self.infer(e, scope);
                    match &inner {
                        None => inner = Some(t),
                        Some(prev) if *prev == t => {}
                        Some(_) => return "Vector".into(),
                    }
                }
                match inner {
                    Some(t) if t != "Any" => SmolStr::new(format!("[{}]", t)),
                    _ => "Vector".into(),
                }
            }
            SExp::Tag { .. } => "Any".into(),
            SExp::Symbol { name, .. } => self.infer_symbol(name, scope),
            SExp::List { elems, .. } => match elems.first().and_then(SExp::as_symbol) {
                Some("vector") => "Vector".into(),
                Some("list") => "List".into(),
                Some("hash-map") => "Map".into(),
                Some("hash-set") => "Set".into(),
                Some("new") => match elems.get(1).and_then(SExp::as_symbol) {
                    Some(class) => SmolStr::new(class),
                    None => "Any".into(),
                },
                Some(head) => match self.lookup_quiet(head, scope) {
                    Some(sym)
                        if matches!(sym.kind, SymbolKind::Function | SymbolKind::Method) =>
                    {
                        sym.return_ty.clone().unwrap_or_else(|| "Any".into())
                    }
                    _ => "Any".into(),
                },
                None => "Any".into(),
            },
        }
    }

    fn infer_symbol(&self, name: &str, scope: ScopeId) -> SmolStr {
        if let Some(sym) = self.lookup_quiet(name, scope) {
            match sym.kind {
                SymbolKind::EnumCase => {
                    return sym.enum_name.clone().unwrap_or_else(|| "Any".into())
                }
                SymbolKind::Param | SymbolKind::Let | SymbolKind::Var => {
                    if let Some(ty) = &sym.ty {
                        return ty.clone();
                    }
                }
                _ => {}
            }
        }
        "Any".into()
    }

    fn lookup_quiet(&self, name: &str, scope: ScopeId) -> Option<&Symbol> {
        if let Some(id) = self.table.resolve_from(scope, name) {
            return Some(self.table.symbol(id));
        }
        let head = name.split('.').next().unwrap_or(name);
        if head != name {
            if let Some(id) = self.table.resolve_from(scope, head) {
                return Some(self.table.symbol(id));
            }
        }
        None
    }

    /// Resolve one symbol occurrence; a miss is exactly one warning.
    fn resolve_occurrence(&mut self, name: &str, span: Span, scope: ScopeId) -> Option<SymbolId> {
        if name.is_empty() || name == "else" || name == "_" {
            return None;
        }
        if let Some(id) = self.table.resolve_from(scope, name) {
            return Some(id);
        }
        // dotted reference: only the head segment must resolve
        let head = name.split('.').next().unwrap_or(name);
        if head != name {
            if let Some(id) = self.table.resolve_from(scope, head) {
                return Some(id);
            }
        }
        if builtins::is_known(head) {
            return None;
        }
        self.diags
            .push(Diag::warning(format!("undefined symbol '{}'", head), span));
        None
    }

    fn check_shadowing(&mut self, name: &str, span: Span, scope: ScopeId) {
        if let Some(id) = self.table.resolve_from(scope, name) {
            if self.table.symbol(id).kind == SymbolKind::Param {
                self.diags
                    .push(Diag::warning(format!("'{}' shadows a parameter", name), span));
            }
        }
    }

    fn walk_function(&mut self, elems: &[SExp], scope: ScopeId, toplevel: bool) {
        let Some(SExp::Symbol { name, span }) = elems.get(1) else { return };
        if !toplevel && self.table.lookup_in(scope, name).is_none() {
            let kw = if elems[0].is_symbol("fx") { "fx" } else { "fn" };
            if let Some(symbol) = function_symbol(kw, elems, *span) {
                self.table.declare(scope, symbol);
            }
        }
        let fn_scope = self.table.child_scope(scope, name);
        let params = self.declare_params(elems.get(2), fn_scope);
        let mut body_start = 3;
        if elems.get(3).and_then(return_annotation).is_some() {
            body_start = 4;
        }
        // defaults see earlier parameters
        for default in params {
            self.walk_expr(&default, fn_scope);
        }
        self.walk_body(&elems[body_start.min(elems.len())..], fn_scope, false);
    }

    fn walk_lambda(&mut self, elems: &[SExp], scope: ScopeId) {
        let lambda_scope = self.table.anon_scope(scope, "lambda");
        let plist = if elems[0].is_symbol("lambda") || elems[0].is_symbol("fn") {
            elems.get(1)
        } else {
            None
        };
        let defaults = self.declare_params(plist, lambda_scope);
        for default in defaults {
            self.walk_expr(&default, lambda_scope);
        }
        self.walk_body(&elems[2.min(elems.len())..], lambda_scope, false);
    }

    /// Declare a parameter list into `scope`; returns the default-value
    /// expressions for the caller to walk.
    fn declare_params(&mut self, plist: Option<&SExp>, scope: ScopeId) -> Vec<SExp> {
        let Some(SExp::List { elems, .. }) = plist else { return Vec::new() };
        let mut scratch = Vec::new();
        let params = parse_param_list(elems, &mut scratch);
        let mut defaults = Vec::new();
        for p in &params {
            let mut sym = Symbol::new(p.name.clone(), SymbolKind::Param, p.span);
            sym.ty = p.ty.clone();
            self.table.declare(scope, sym);
            if let Some(d) = &p.default {
                defaults.push(d.clone());
            }
        }
        defaults
    }

    /// Block binding form: `(let ((a 1) (b 2)) body...)`.
    fn walk_binding_form(&mut self, elems: &[SExp], scope: ScopeId) {
        let kind = if elems[0].is_symbol("var") { SymbolKind::Var } else { SymbolKind::Let };
        match elems.get(1) {
            Some(SExp::Symbol { .. }) => {
                // simple form outside a body position, e.g. (print (let x 1))
                if let Some(SExp::Symbol { name, span }) = elems.get(1) {
                    for value in &elems[2..] {
                        self.walk_expr(value, scope);
                    }
                    self.check_shadowing(name, *span, scope);
                    let child = self.table.anon_scope(scope, "let");
                    self.table.declare(child, Symbol::new(name.clone(), kind, *span));
                }
            }
            Some(SExp::List { elems: pairs, .. }) => {
                let child = self.table.anon_scope(scope, "let");
                for pair in pairs {
                    if let Some([SExp::Symbol { name, span }, value]) = pair.as_list() {
                        self.walk_expr(value, child);
                        self.check_shadowing(name, *span, child);
                        self.table.declare(child, Symbol::new(name.clone(), kind, *span));
                    }
                }
                self.walk_body(&elems[2..], child, false);
            }
            _ => {}
        }
    }

    fn walk_loop(&mut self, elems: &[SExp], scope: ScopeId) {
        let Some(SExp::List { elems: pairs, .. }) = elems.get(1) else { return };
        let child = self.table.anon_scope(scope, "loop");
        for pair in pairs {
            if let Some([SExp::Symbol { name, span }, value]) = pair.as_list() {
                self.walk_expr(value, child);
                self.table
                    .declare(child, Symbol::new(name.clone(), SymbolKind::Let, *span));
            }
        }
        self.walk_body(&elems[2..], child, false);
    }

    fn walk_for(&mut self, elems: &[SExp], scope: ScopeId) {
        let Some(SExp::List { elems: binding, .. }) = elems.get(1) else { return };
        if let [SExp::Symbol { name, span }, seq] = binding.as_slice() {
            self.walk_expr(seq, scope);
            let child = self.table.anon_scope(scope, "for");
            self.table
                .declare(child, Symbol::new(name.clone(), SymbolKind::Let, *span));
            self.walk_body(&elems[2..], child, false);
        }
    }

    /// `else` in test position is a keyword, not a reference.
    fn walk_cond(&mut self, elems: &[SExp], scope: ScopeId) {
        for clause in &elems[1..] {
            let Some(parts) = clause.as_list() else { continue };
            for (i, part) in parts.iter().enumerate() {
                if i == 0 && part.is_symbol("else") {
                    continue;
                }
                self.walk_expr(part, scope);
            }
        }
    }

    fn walk_class(&mut self, elems: &[SExp], scope: ScopeId) {
        let Some(SExp::Symbol { name, span }) = elems.get(1) else { return };
        if scope != GLOBAL_SCOPE && self.table.lookup_in(scope, name).is_none() {
            self.table
                .declare(scope, Symbol::new(name.clone(), SymbolKind::Class, *span));
        }
        let class_scope = self.table.child_scope(scope, name);
        // methods and field defaults may refer to the instance
        self.table.declare(
            class_scope,
            Symbol::new(SmolStr::new("self"), SymbolKind::Param, *span),
        );
        // declare fields and methods before walking bodies
        for member in &elems[2..] {
            let Some(parts) = member.as_list() else { continue };
            match member.head_symbol() {
                Some("var" | "let") => {
                    if let Some(SExp::Symbol { name: fname, span: fspan }) = parts.get(1) {
                        self.table.declare(
                            class_scope,
                            Symbol::new(fname.clone(), SymbolKind::Field, *fspan),
                        );
                    }
                }
                Some(kw @ ("fn" | "fx")) => {
                    if let Some(SExp::Symbol { name: mname, span: mspan }) = parts.get(1) {
                        let mut symbol = function_symbol(kw, parts, *mspan)
                            .unwrap_or_else(|| Symbol::new(mname.clone(), SymbolKind::Function, *mspan));
                        symbol.kind = SymbolKind::Method;
                        self.table.declare(class_scope, symbol);
                    }
                }
                _ => {}
            }
        }
        for member in &elems[2..] {
            let Some(parts) = member.as_list() else { continue };
            match member.head_symbol() {
                Some("var" | "let") => {
                    for value in parts.iter().skip(2) {
                        self.walk_expr(value, class_scope);
                    }
                }
                Some("constructor" | "init") => {
                    self.table.declare(
                        class_scope,
                        Symbol::new(
                            SmolStr::new("constructor"),
                            SymbolKind::Constructor,
                            member.span(),
                        ),
                    );
                    let ctor_scope = self.table.child_scope(class_scope, "constructor");
                    let defaults = self.declare_params(parts.get(1), ctor_scope);
                    for default in defaults {
                        self.walk_expr(&default, ctor_scope);
                    }
                    self.walk_body(&parts[2.min(parts.len())..], ctor_scope, false);
                }
                Some("fn" | "fx") => self.walk_function(parts, class_scope, true),
                _ => {}
            }
        }
    }
}
