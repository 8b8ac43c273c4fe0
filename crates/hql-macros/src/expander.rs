use std::collections::HashMap;
use std::fmt;

use hql_ast::{SExp, Span, StrSegment};
use smol_str::SmolStr;

use crate::hygiene::gensym;
use crate::special_forms::is_special_form;

/// Expansion gives up past this depth and reports a cycle. Deep enough for
/// any reasonable macro tower, small enough to fail fast on mutual
/// recursion.
pub const MAX_EXPANSION_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct ExpandError {
    pub message: String,
    pub span: Span,
}

impl ExpandError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        ExpandError { message: message.into(), span }
    }
}

impl fmt::Display for ExpandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: SmolStr,
    pub params: Vec<SmolStr>,
    pub rest: Option<SmolStr>,
    pub body: SExp,
    pub span: Span,
}

impl MacroDef {
    /// Minimum number of call-site arguments this macro accepts.
    fn required(&self) -> usize {
        self.params.len()
    }
}

/// Per-document macro registry. Built in a first pass over the top level so
/// a macro may be used before the form that defines it.
#[derive(Debug, Default)]
pub struct MacroRegistry {
    defs: HashMap<SmolStr, MacroDef>,
}

impl MacroRegistry {
    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.defs.get(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Register a `(defmacro name (params) body)` form. Returns an error for
    /// malformed definitions; a later definition of the same name replaces
    /// the earlier one.
    fn register(&mut self, elems: &[SExp], span: Span) -> Result<(), ExpandError> {
        let name = match elems.get(1) {
            Some(SExp::Symbol { name, .. }) => name.clone(),
            _ => return Err(ExpandError::new("macro definition is missing a name", span)),
        };
        if is_special_form(&name) {
            return Err(ExpandError::new(
                format!("cannot redefine special form '{}'", name),
                span,
            ));
        }
        let param_list = match elems.get(2) {
            Some(SExp::List { elems, .. }) => elems.as_slice(),
            _ => {
                return Err(ExpandError::new(
                    format!("macro '{}' is missing a parameter list", name),
                    span,
                ))
            }
        };
        let (params, rest) = parse_params(&name, param_list)?;
        let body = match elems.len() {
            4 => elems[3].clone(),
            n if n > 4 => {
                return Err(ExpandError::new(
                    format!("macro '{}' takes a single body form", name),
                    span,
                ))
            }
            _ => {
                return Err(ExpandError::new(
                    format!("macro '{}' is missing a body", name),
                    span,
                ))
            }
        };
        self.defs.insert(name.clone(), MacroDef { name, params, rest, body, span });
        Ok(())
    }
}

fn parse_params(
    name: &str,
    list: &[SExp],
) -> Result<(Vec<SmolStr>, Option<SmolStr>), ExpandError> {
    let mut params = Vec::new();
    let mut rest = None;
    let mut iter = list.iter().peekable();
    while let Some(p) = iter.next() {
        let SExp::Symbol { name: pname, span: pspan } = p else {
            return Err(ExpandError::new(
                format!("macro '{}' parameters must be symbols", name),
                p.span(),
            ));
        };
        if pname == "&" {
            let Some(SExp::Symbol { name: rname, .. }) = iter.next() else {
                return Err(ExpandError::new(
                    format!("macro '{}' has a rest marker with no name", name),
                    *pspan,
                ));
            };
            if iter.peek().is_some() {
                return Err(ExpandError::new(
                    format!("macro '{}' rest parameter must be last", name),
                    *pspan,
                ));
            }
            rest = Some(rname.clone());
        } else if let Some(stripped) = pname.strip_prefix('&') {
            if iter.peek().is_some() {
                return Err(ExpandError::new(
                    format!("macro '{}' rest parameter must be last", name),
                    *pspan,
                ));
            }
            rest = Some(SmolStr::new(stripped));
        } else {
            if params.iter().any(|q| q == pname) {
                return Err(ExpandError::new(
                    format!("duplicate macro parameter '{}'", pname),
                    *pspan,
                ));
            }
            params.push(pname.clone());
        }
    }
    Ok((params, rest))
}

/// Result of expanding a document: the surviving top-level forms with all
/// macro calls rewritten, plus any errors hit along the way. A form that
/// fails to expand is dropped; the rest of the document is unaffected.
#[derive(Debug)]
pub struct ExpandResult {
    pub forms: Vec<SExp>,
    pub errors: Vec<ExpandError>,
}

/// Expand every macro call in `forms` to a fixed point.
///
/// Macro definitions are collected from the top level first, then removed
/// from the output; everything the later passes see is macro-free.
pub fn expand_document(forms: Vec<SExp>) -> ExpandResult {
    let mut registry = MacroRegistry::default();
    let mut errors = Vec::new();
    let mut rest = Vec::new();

    for form in forms {
        if let Some(elems) = form.as_list() {
            if matches!(form.head_symbol(), Some("defmacro" | "macro")) {
                if let Err(err) = registry.register(elems, form.span()) {
                    errors.push(err);
                }
                continue;
            }
        }
        rest.push(form);
    }

    let mut out = Vec::with_capacity(rest.len());
    for form in rest {
        match expand_form(&registry, &form, 0, &mut errors) {
            Some(expanded) => out.push(expanded),
            None => {}
        }
    }
    ExpandResult { forms: out, errors }
}

/// Expand a single form. Returns `None` when the form (or a sub-form that
/// cannot be recovered) hit an expansion error.
fn expand_form(
    registry: &MacroRegistry,
    sexp: &SExp,
    depth: usize,
    errors: &mut Vec<ExpandError>,
) -> Option<SExp> {
    if depth > MAX_EXPANSION_DEPTH {
        errors.push(ExpandError::new(
            "macro expansion exceeded maximum depth (expansion cycle?)",
            sexp.span(),
        ));
        return None;
    }
    match sexp {
        SExp::List { elems, span } => {
            if let Some(head) = sexp.head_symbol() {
                if !is_special_form(head) {
                    if let Some(def) = registry.get(head) {
                        let replaced = apply_macro(def, &elems[1..], *span, errors)?;
                        return expand_form(registry, &replaced, depth + 1, errors);
                    }
                }
                if is_special_form(head) {
                    return expand_special(registry, head, elems, *span, depth, errors);
                }
            }
            let new = expand_all(registry, elems, depth, errors)?;
            Some(SExp::List { elems: new, span: *span })
        }
        SExp::Vector { elems, span } => {
            let new = expand_all(registry, elems, depth, errors)?;
            Some(SExp::Vector { elems: new, span: *span })
        }
        SExp::Map { elems, span } => {
            let new = expand_all(registry, elems, depth, errors)?;
            Some(SExp::Map { elems: new, span: *span })
        }
        SExp::Set { elems, span } => {
            let new = expand_all(registry, elems, depth, errors)?;
            Some(SExp::Set { elems: new, span: *span })
        }
        SExp::Str { segments, span } => {
            let mut new = Vec::with_capacity(segments.len());
            for seg in segments {
                match seg {
                    StrSegment::Text(t) => new.push(StrSegment::Text(t.clone())),
                    StrSegment::Interp(forms) => {
                        let expanded = expand_all(registry, forms, depth, errors)?;
                        new.push(StrSegment::Interp(expanded));
                    }
                }
            }
            Some(SExp::Str { segments: new, span: *span })
        }
        other => Some(other.clone()),
    }
}

fn expand_all(
    registry: &MacroRegistry,
    elems: &[SExp],
    depth: usize,
    errors: &mut Vec<ExpandError>,
) -> Option<Vec<SExp>> {
    let mut out = Vec::with_capacity(elems.len());
    for e in elems {
        out.push(expand_form(registry, e, depth, errors)?);
    }
    Some(out)
}

/// Special forms pass through unexpanded, but their expression positions
/// are still walked. Binding names and parameter lists are kept verbatim so
/// a macro sharing a name with a parameter cannot hijack the form.
fn expand_special(
    registry: &MacroRegistry,
    head: &str,
    elems: &[SExp],
    span: Span,
    depth: usize,
    errors: &mut Vec<ExpandError>,
) -> Option<SExp> {
    let keep = match head {
        // (enum ...), (struct ...), (import ...), (export ...) carry no
        // expression positions; nested macro definitions stay verbatim too.
        "enum" | "struct" | "import" | "export" | "defmacro" | "macro" => elems.len(),
        // (fn name (params) body...) / anonymous (fn (params) body...)
        "fn" => match elems.get(1) {
            Some(SExp::Symbol { .. }) => 3,
            _ => 2,
        },
        // (lambda (params) body...)
        "lambda" => 2,
        // (fx name (params) (-> Type) body...)
        "fx" => 4,
        // (let name value) / (let ((n v) ...) body...) — handled below.
        "let" | "var" | "loop" => return expand_binding_form(registry, elems, span, depth, errors),
        "for" => return expand_binding_form(registry, elems, span, depth, errors),
        // (set! target value): the target is a place, not an expression.
        "set!" => 2,
        _ => 1,
    };
    let mut out = Vec::with_capacity(elems.len());
    out.extend_from_slice(&elems[..keep.min(elems.len())]);
    for e in elems.iter().skip(keep) {
        out.push(expand_form(registry, e, depth, errors)?);
    }
    Some(SExp::List { elems: out, span })
}

/// let / var / loop / for: expand the value side of each binding and the
/// body, keep the bound names untouched.
fn expand_binding_form(
    registry: &MacroRegistry,
    elems: &[SExp],
    span: Span,
    depth: usize,
    errors: &mut Vec<ExpandError>,
) -> Option<SExp> {
    let mut out = Vec::with_capacity(elems.len());
    out.push(elems[0].clone());
    match elems.get(1) {
        // (let name value ...): name verbatim, everything after expanded.
        Some(SExp::Symbol { .. }) => {
            out.push(elems[1].clone());
            for e in &elems[2..] {
                out.push(expand_form(registry, e, depth, errors)?);
            }
        }
        // (let ((n v) ...) body...): each pair keeps its name, value walked.
        Some(SExp::List { elems: pairs, span: bspan }) => {
            let mut new_pairs = Vec::with_capacity(pairs.len());
            for pair in pairs {
                match pair.as_list() {
                    Some([name, value]) => {
                        let value = expand_form(registry, value, depth, errors)?;
                        new_pairs.push(SExp::List {
                            elems: vec![name.clone(), value],
                            span: pair.span(),
                        });
                    }
                    _ => new_pairs.push(expand_form(registry, pair, depth, errors)?),
                }
            }
            out.push(SExp::List { elems: new_pairs, span: *bspan });
            for e in &elems[2..] {
                out.push(expand_form(registry, e, depth, errors)?);
            }
        }
        _ => {
            for e in &elems[1..] {
                out.push(expand_form(registry, e, depth, errors)?);
            }
        }
    }
    Some(SExp::List { elems: out, span })
}

/// Substitute call-site arguments into the macro body.
///
/// Bindings the template introduces through `let`/`var` are renamed with
/// [`gensym`] so they cannot capture call-site names.
fn apply_macro(
    def: &MacroDef,
    args: &[SExp],
    call_span: Span,
    errors: &mut Vec<ExpandError>,
) -> Option<SExp> {
    if def.rest.is_none() && args.len() != def.required() {
        errors.push(ExpandError::new(
            format!(
                "macro '{}' expects {} argument{}, got {}",
                def.name,
                def.required(),
                if def.required() == 1 { "" } else { "s" },
                args.len()
            ),
            call_span,
        ));
        return None;
    }
    if def.rest.is_some() && args.len() < def.required() {
        errors.push(ExpandError::new(
            format!(
                "macro '{}' expects at least {} argument{}, got {}",
                def.name,
                def.required(),
                if def.required() == 1 { "" } else { "s" },
                args.len()
            ),
            call_span,
        ));
        return None;
    }

    let mut subst: HashMap<&str, Binding<'_>> = HashMap::new();
    for (param, arg) in def.params.iter().zip(args) {
        subst.insert(param.as_str(), Binding::One(arg));
    }
    let spliced;
    if let Some(rest) = &def.rest {
        spliced = args[def.required()..].to_vec();
        subst.insert(rest.as_str(), Binding::Splice(&spliced));
    }

    let mut renames = HashMap::new();
    collect_template_bindings(&def.body, &subst, &mut renames);

    Some(substitute(&def.body, &subst, &renames, call_span))
}

enum Binding<'a> {
    One(&'a SExp),
    Splice(&'a [SExp]),
}

/// Find `let`/`var` names the template itself introduces (as opposed to
/// names it received from the call site) and assign each a fresh name.
fn collect_template_bindings(
    sexp: &SExp,
    subst: &HashMap<&str, Binding<'_>>,
    renames: &mut HashMap<SmolStr, SmolStr>,
) {
    if let SExp::List { elems, .. } = sexp {
        if matches!(sexp.head_symbol(), Some("let" | "var" | "loop")) {
            match elems.get(1) {
                Some(SExp::Symbol { name, .. }) if !subst.contains_key(name.as_str()) => {
                    renames
                        .entry(name.clone())
                        .or_insert_with(|| SmolStr::new(gensym(name)));
                }
                Some(SExp::List { elems: pairs, .. }) => {
                    for pair in pairs {
                        if let Some([SExp::Symbol { name, .. }, _]) = pair.as_list() {
                            if !subst.contains_key(name.as_str()) {
                                renames
                                    .entry(name.clone())
                                    .or_insert_with(|| SmolStr::new(gensym(name)));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    match sexp {
        SExp::List { elems, .. }
        | SExp::Vector { elems, .. }
        | SExp::Map { elems, .. }
        | SExp::Set { elems, .. } => {
            for e in elems {
                collect_template_bindings(e, subst, renames);
            }
        }
        SExp::Str { segments, .. } => {
            for seg in segments {
                if let StrSegment::Interp(forms) = seg {
                    for f in forms {
                        collect_template_bindings(f, subst, renames);
                    }
                }
            }
        }
        _ => {}
    }
}

fn substitute(
    sexp: &SExp,
    subst: &HashMap<&str, Binding<'_>>,
    renames: &HashMap<SmolStr, SmolStr>,
    call_span: Span,
) -> SExp {
    match sexp {
        SExp::Symbol { name, span } => match subst.get(name.as_str()) {
            Some(Binding::One(arg)) => (*arg).clone(),
            Some(Binding::Splice(rest)) => SExp::List {
                elems: rest.to_vec(),
                span: call_span,
            },
            None => match renames.get(name) {
                Some(fresh) => SExp::Symbol { name: fresh.clone(), span: *span },
                None => sexp.clone(),
            },
        },
        SExp::List { elems, span } => SExp::List {
            elems: substitute_elems(elems, subst, renames, call_span),
            span: *span,
        },
        SExp::Vector { elems, span } => SExp::Vector {
            elems: substitute_elems(elems, subst, renames, call_span),
            span: *span,
        },
        SExp::Map { elems, span } => SExp::Map {
            elems: substitute_elems(elems, subst, renames, call_span),
            span: *span,
        },
        SExp::Set { elems, span } => SExp::Set {
            elems: substitute_elems(elems, subst, renames, call_span),
            span: *span,
        },
        SExp::Str { segments, span } => {
            let segments = segments
                .iter()
                .map(|seg| match seg {
                    StrSegment::Text(t) => StrSegment::Text(t.clone()),
                    StrSegment::Interp(forms) => StrSegment::Interp(
                        forms
                            .iter()
                            .map(|f| substitute(f, subst, renames, call_span))
                            .collect(),
                    ),
                })
                .collect();
            SExp::Str { segments, span: *span }
        }
        other => other.clone(),
    }
}

/// Substitute a sequence, splicing rest-bound symbols in place so
/// `(do body)` with a rest-bound `body` becomes `(do f1 f2 ...)`.
fn substitute_elems(
    elems: &[SExp],
    subst: &HashMap<&str, Binding<'_>>,
    renames: &HashMap<SmolStr, SmolStr>,
    call_span: Span,
) -> Vec<SExp> {
    let mut out = Vec::with_capacity(elems.len());
    for e in elems {
        if let SExp::Symbol { name, .. } = e {
            if let Some(Binding::Splice(rest)) = subst.get(name.as_str()) {
                out.extend(rest.iter().cloned());
                continue;
            }
        }
        out.push(substitute(e, subst, renames, call_span));
    }
    out
}
