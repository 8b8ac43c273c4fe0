use hql_ast::{Diag, SExp, Span, StrSegment};
use smol_str::SmolStr;

use crate::params::{parse_param_list, type_annotation, Param};
use crate::{
    Arg, CtorDef, EnumCase, FieldDef, InterpPart, IrId, IrModule, IrNode, LoweredParam,
    MethodDef, ObjectEntry, Purity,
};

/// Lower an expanded S-expression forest into IR.
///
/// Always returns a module; structural errors are reported as diagnostics
/// and leave an [`IrNode::Error`] placeholder behind.
pub fn lower(forms: &[SExp]) -> (IrModule, Vec<Diag>) {
    let mut lowerer = Lowerer::default();
    for form in forms {
        let id = lowerer.lower_form(form);
        lowerer.module.toplevel.push(id);
    }
    (lowerer.module, lowerer.diags)
}

#[derive(Default)]
struct Lowerer {
    module: IrModule,
    diags: Vec<Diag>,
}

impl Lowerer {
    fn alloc(&mut self, node: IrNode) -> IrId {
        self.module.alloc(node)
    }

    fn error(&mut self, message: impl Into<String>, span: Span) -> IrId {
        self.diags.push(Diag::error(message, span));
        self.alloc(IrNode::Error { span })
    }

    fn lower_form(&mut self, sexp: &SExp) -> IrId {
        match sexp {
            SExp::Int { value, span } => self.alloc(IrNode::IntLit { value: *value, span: *span }),
            SExp::Float { value, span } => {
                self.alloc(IrNode::FloatLit { value: *value, span: *span })
            }
            SExp::Bool { value, span } => {
                self.alloc(IrNode::BoolLit { value: *value, span: *span })
            }
            SExp::Nil { span } => self.alloc(IrNode::NilLit { span: *span }),
            SExp::Str { segments, span } => self.lower_string(segments, *span),
            SExp::Symbol { name, span } => self.lower_symbol(name, *span),
            SExp::Tag { name, span } => {
                self.error(format!("stray named-parameter tag '{}:'", name), *span)
            }
            SExp::Vector { elems, span } => {
                let elems = elems.iter().map(|e| self.lower_form(e)).collect();
                self.alloc(IrNode::ArrayLit { elems, span: *span })
            }
            SExp::Set { elems, span } => {
                let elems = elems.iter().map(|e| self.lower_form(e)).collect();
                self.alloc(IrNode::SetLit { elems, span: *span })
            }
            SExp::Map { elems, span } => self.lower_map(elems, *span),
            SExp::List { elems, span } => self.lower_list(elems, *span),
        }
    }

    /// Dotted symbols become member chains rooted at an identifier.
    fn lower_symbol(&mut self, name: &str, span: Span) -> IrId {
        let mut parts = name.split('.');
        let head = parts.next().unwrap_or(name);
        if head.is_empty() {
            return self.alloc(IrNode::Identifier { name: SmolStr::new(name), span });
        }
        let mut id = self.alloc(IrNode::Identifier { name: SmolStr::new(head), span });
        for part in parts {
            if part.is_empty() {
                continue;
            }
            id = self.alloc(IrNode::Member {
                object: id,
                property: SmolStr::new(part),
                span,
            });
        }
        id
    }

    fn lower_string(&mut self, segments: &[StrSegment], span: Span) -> IrId {
        let has_interp = segments.iter().any(|s| matches!(s, StrSegment::Interp(_)));
        if !has_interp {
            let mut value = String::new();
            for seg in segments {
                if let StrSegment::Text(t) = seg {
                    value.push_str(t);
                }
            }
            return self.alloc(IrNode::StrLit { value, span });
        }
        let mut parts = Vec::with_capacity(segments.len());
        for seg in segments {
            match seg {
                StrSegment::Text(t) => parts.push(InterpPart::Text(t.clone())),
                StrSegment::Interp(forms) => {
                    let exprs = forms.iter().map(|f| self.lower_form(f)).collect();
                    parts.push(InterpPart::Exprs(exprs));
                }
            }
        }
        self.alloc(IrNode::StrInterp { parts, span })
    }

    fn lower_map(&mut self, elems: &[SExp], span: Span) -> IrId {
        let mut entries = Vec::new();
        let mut i = 0;
        while i < elems.len() {
            if let SExp::Symbol { name, span: sspan } = &elems[i] {
                if name == "&" {
                    match elems.get(i + 1) {
                        Some(expr) => {
                            let expr = self.lower_form(expr);
                            entries.push(ObjectEntry::Spread { expr, span: *sspan });
                            i += 2;
                        }
                        None => {
                            self.diags
                                .push(Diag::error("'&' spread has no expression", *sspan));
                            i += 1;
                        }
                    }
                    continue;
                }
            }
            let key = match &elems[i] {
                SExp::Tag { name, .. } | SExp::Symbol { name, .. } => name.clone(),
                SExp::Str { segments, .. } => {
                    let mut key = String::new();
                    for seg in segments {
                        if let StrSegment::Text(t) = seg {
                            key.push_str(t);
                        }
                    }
                    SmolStr::new(key)
                }
                other => {
                    self.diags
                        .push(Diag::error("invalid map key", other.span()));
                    i += 1;
                    continue;
                }
            };
            match elems.get(i + 1) {
                Some(value) => {
                    let kspan = elems[i].span();
                    let value = self.lower_form(value);
                    entries.push(ObjectEntry::Field { key, value, span: kspan });
                    i += 2;
                }
                None => {
                    self.diags.push(Diag::error(
                        format!("map key '{}' has no value", key),
                        elems[i].span(),
                    ));
                    i += 1;
                }
            }
        }
        self.alloc(IrNode::ObjectLit { entries, span })
    }

    fn lower_list(&mut self, elems: &[SExp], span: Span) -> IrId {
        let Some(head) = elems.first() else {
            // () is the empty list literal
            return self.alloc(IrNode::ArrayLit { elems: Vec::new(), span });
        };
        match head.as_symbol() {
            Some("fn") => self.lower_fn(elems, span, Purity::Loose),
            Some("fx") => self.lower_fn(elems, span, Purity::Pure),
            Some("lambda") => self.lower_lambda(elems, span),
            Some("let") => self.lower_binding(elems, span, false),
            Some("var") => self.lower_binding(elems, span, true),
            Some("if") => self.lower_if(elems, span),
            Some("do") => {
                let body = elems[1..].iter().map(|e| self.lower_form(e)).collect();
                self.alloc(IrNode::Do { body, span })
            }
            Some("cond") => self.lower_cond(elems, span),
            Some("when") => self.lower_when(elems, span, false),
            Some("unless") => self.lower_when(elems, span, true),
            Some("loop") => self.lower_loop(elems, span),
            Some("recur") => {
                let args = elems[1..].iter().map(|e| self.lower_form(e)).collect();
                self.alloc(IrNode::Recur { args, span })
            }
            Some("for") => self.lower_for(elems, span),
            Some("while") => self.lower_while(elems, span),
            Some("class") => self.lower_class(elems, span),
            Some("struct") => self.lower_struct(elems, span),
            Some("enum") => self.lower_enum(elems, span),
            Some("import") => self.lower_import(elems, span),
            Some("export") => self.lower_export(elems, span),
            Some("new") => self.lower_new(elems, span),
            Some("return") => {
                let value = elems.get(1).map(|e| self.lower_form(e));
                if elems.len() > 2 {
                    self.diags
                        .push(Diag::error("return takes at most one value", span));
                }
                self.alloc(IrNode::Return { value, span })
            }
            Some("set!") => self.lower_assign(elems, span),
            Some("defmacro") | Some("macro") => {
                self.error("macro definitions are only allowed at the top level", span)
            }
            _ => self.lower_call(elems, span),
        }
    }

    fn lower_call(&mut self, elems: &[SExp], span: Span) -> IrId {
        let callee = self.lower_form(&elems[0]);
        let args = self.lower_args(&elems[1..]);
        self.alloc(IrNode::Call { callee, args, span })
    }

    fn lower_args(&mut self, elems: &[SExp]) -> Vec<Arg> {
        let mut args = Vec::new();
        let mut i = 0;
        while i < elems.len() {
            if let SExp::Tag { name, span } = &elems[i] {
                match elems.get(i + 1) {
                    Some(value) => {
                        let value = self.lower_form(value);
                        args.push(Arg::Named { name: name.clone(), value, span: *span });
                        i += 2;
                    }
                    // a dangling tag is call validation's to report
                    None => i += 1,
                }
            } else {
                let value = self.lower_form(&elems[i]);
                args.push(Arg::Positional(value));
                i += 1;
            }
        }
        args
    }

    fn lower_params(&mut self, params: &[Param]) -> Vec<LoweredParam> {
        params
            .iter()
            .map(|p| LoweredParam {
                name: p.name.clone(),
                ty: p.ty.clone(),
                default: p.default.as_ref().map(|d| self.lower_form(d)),
                rest: p.rest,
                span: p.span,
            })
            .collect()
    }

    fn lower_fn(&mut self, elems: &[SExp], span: Span, purity: Purity) -> IrId {
        let kw = if purity == Purity::Pure { "fx" } else { "fn" };
        // anonymous (fn (params) body...) lowers to a lambda
        if kw == "fn" {
            if let Some(SExp::List { .. }) = elems.get(1) {
                return self.lower_lambda(elems, span);
            }
        }
        let Some(SExp::Symbol { name, .. }) = elems.get(1) else {
            return self.error(format!("{} is missing a name", kw), span);
        };
        let name = name.clone();
        let Some(SExp::List { elems: plist, .. }) = elems.get(2) else {
            return self.error(format!("{} '{}' is missing a parameter list", kw, name), span);
        };
        let params = parse_param_list(plist, &mut self.diags);
        let mut body_start = 3;
        let mut return_type = None;

        if purity == Purity::Pure {
            for p in &params {
                if p.ty.is_none() && !p.rest {
                    self.diags.push(Diag::error(
                        format!("fx parameter '{}' is missing a type annotation", p.name),
                        p.span,
                    ));
                }
            }
            match elems.get(3).and_then(return_annotation) {
                Some(ty) => {
                    return_type = Some(ty);
                    body_start = 4;
                }
                None => {
                    self.diags.push(Diag::error(
                        format!("fx '{}' is missing a return type annotation '(-> Type)'", name),
                        span,
                    ));
                }
            }
        } else if let Some(ty) = elems.get(3).and_then(return_annotation) {
            // fn may carry a return annotation too; it is advisory
            return_type = Some(ty);
            body_start = 4;
        }

        let body: Vec<IrId> = elems[body_start.min(elems.len())..]
            .iter()
            .map(|e| self.lower_form(e))
            .collect();
        if purity == Purity::Pure && body.is_empty() {
            self.diags
                .push(Diag::error(format!("fx '{}' has no body", name), span));
        }
        let params = self.lower_params(&params);
        self.alloc(IrNode::Fn { name, purity, params, return_type, body, span })
    }

    fn lower_lambda(&mut self, elems: &[SExp], span: Span) -> IrId {
        let Some(SExp::List { elems: plist, .. }) = elems.get(1) else {
            return self.error("lambda is missing a parameter list", span);
        };
        let params = parse_param_list(plist, &mut self.diags);
        let params = self.lower_params(&params);
        let body = elems[2..].iter().map(|e| self.lower_form(e)).collect();
        self.alloc(IrNode::Lambda { params, body, span })
    }

    fn lower_binding(&mut self, elems: &[SExp], span: Span, mutable: bool) -> IrId {
        let kw = if mutable { "var" } else { "let" };
        match elems.get(1) {
            Some(SExp::Symbol { name, .. }) => {
                let name = name.clone();
                let Some(value) = elems.get(2) else {
                    return self.error(format!("{} '{}' has no value", kw, name), span);
                };
                let value = self.lower_form(value);
                if elems.len() > 3 {
                    self.diags.push(Diag::error(
                        format!("{} binding takes a single value", kw),
                        span,
                    ));
                }
                if mutable {
                    self.alloc(IrNode::Var { name, value, span })
                } else {
                    self.alloc(IrNode::Let { name, value, span })
                }
            }
            Some(SExp::List { elems: pairs, .. }) => {
                let bindings = self.lower_binding_pairs(pairs);
                let body = elems[2..].iter().map(|e| self.lower_form(e)).collect();
                self.alloc(IrNode::LetBlock { mutable, bindings, body, span })
            }
            _ => self.error(format!("{} expects a name or a binding list", kw), span),
        }
    }

    fn lower_binding_pairs(&mut self, pairs: &[SExp]) -> Vec<(SmolStr, IrId)> {
        let mut bindings = Vec::with_capacity(pairs.len());
        for pair in pairs {
            match pair.as_list() {
                Some([SExp::Symbol { name, .. }, value]) => {
                    let value = self.lower_form(value);
                    bindings.push((name.clone(), value));
                }
                _ => self
                    .diags
                    .push(Diag::error("binding must be a (name value) pair", pair.span())),
            }
        }
        bindings
    }

    fn lower_if(&mut self, elems: &[SExp], span: Span) -> IrId {
        let Some(cond) = elems.get(1) else {
            return self.error("if is missing a condition", span);
        };
        let Some(then) = elems.get(2) else {
            return self.error("if is missing a then-branch", span);
        };
        let cond = self.lower_form(cond);
        let then_branch = self.lower_form(then);
        let else_branch = elems.get(3).map(|e| self.lower_form(e));
        if elems.len() > 4 {
            self.diags
                .push(Diag::error("if takes at most three forms", span));
        }
        self.alloc(IrNode::If { cond, then_branch, else_branch, span })
    }

    /// `(cond (t1 e1) (t2 e2) (else e3))` lowers to nested ifs,
    /// right-to-left.
    fn lower_cond(&mut self, elems: &[SExp], span: Span) -> IrId {
        let mut else_branch: Option<IrId> = None;
        for clause in elems[1..].iter().rev() {
            let Some(parts) = clause.as_list() else {
                self.diags.push(Diag::error(
                    "cond clause must be a (test expr) list",
                    clause.span(),
                ));
                continue;
            };
            let [test, rest @ ..] = parts else {
                self.diags
                    .push(Diag::error("empty cond clause", clause.span()));
                continue;
            };
            let cspan = clause.span();
            let branch = self.lower_clause_body(rest, cspan);
            if test.is_symbol("else") || matches!(test, SExp::Bool { value: true, .. }) {
                else_branch = Some(branch);
            } else {
                let cond = self.lower_form(test);
                else_branch = Some(self.alloc(IrNode::If {
                    cond,
                    then_branch: branch,
                    else_branch,
                    span: cspan,
                }));
            }
        }
        else_branch.unwrap_or_else(|| self.error("cond has no clauses", span))
    }

    fn lower_clause_body(&mut self, forms: &[SExp], span: Span) -> IrId {
        match forms {
            [] => self.alloc(IrNode::NilLit { span }),
            [single] => self.lower_form(single),
            many => {
                let body = many.iter().map(|e| self.lower_form(e)).collect();
                self.alloc(IrNode::Do { body, span })
            }
        }
    }

    fn lower_when(&mut self, elems: &[SExp], span: Span, invert: bool) -> IrId {
        let kw = if invert { "unless" } else { "when" };
        let Some(cond) = elems.get(1) else {
            return self.error(format!("{} is missing a condition", kw), span);
        };
        let cond = self.lower_form(cond);
        let body = self.lower_clause_body(&elems[2..], span);
        let (then_branch, else_branch) = if invert {
            let nil = self.alloc(IrNode::NilLit { span });
            (nil, Some(body))
        } else {
            (body, None)
        };
        self.alloc(IrNode::If { cond, then_branch, else_branch, span })
    }

    fn lower_loop(&mut self, elems: &[SExp], span: Span) -> IrId {
        let Some(SExp::List { elems: pairs, .. }) = elems.get(1) else {
            return self.error("loop expects a binding list", span);
        };
        let bindings = self.lower_binding_pairs(pairs);
        let body = elems[2..].iter().map(|e| self.lower_form(e)).collect();
        self.alloc(IrNode::Loop { bindings, body, span })
    }

    /// `(for (x seq) body...)`
    fn lower_for(&mut self, elems: &[SExp], span: Span) -> IrId {
        let Some(SExp::List { elems: binding, .. }) = elems.get(1) else {
            return self.error("for expects a (name sequence) binding", span);
        };
        let [SExp::Symbol { name, .. }, seq] = binding.as_slice() else {
            return self.error("for expects a (name sequence) binding", span);
        };
        let var = name.clone();
        let seq = self.lower_form(seq);
        let body = elems[2..].iter().map(|e| self.lower_form(e)).collect();
        self.alloc(IrNode::For { var, seq, body, span })
    }

    fn lower_while(&mut self, elems: &[SExp], span: Span) -> IrId {
        let Some(cond) = elems.get(1) else {
            return self.error("while is missing a condition", span);
        };
        let cond = self.lower_form(cond);
        let body = elems[2..].iter().map(|e| self.lower_form(e)).collect();
        self.alloc(IrNode::While { cond, body, span })
    }

    fn lower_class(&mut self, elems: &[SExp], span: Span) -> IrId {
        let Some(SExp::Symbol { name, .. }) = elems.get(1) else {
            return self.error("class is missing a name", span);
        };
        let name = name.clone();
        let mut fields = Vec::new();
        let mut ctor: Option<CtorDef> = None;
        let mut methods = Vec::new();

        for member in &elems[2..] {
            let mspan = member.span();
            let Some(parts) = member.as_list() else {
                self.diags
                    .push(Diag::error("invalid class member", mspan));
                continue;
            };
            match member.head_symbol() {
                Some("var") | Some("let") => match parts.get(1) {
                    Some(SExp::Symbol { name: fname, .. }) => {
                        let default = parts.get(2).map(|d| self.lower_form(d));
                        fields.push(FieldDef { name: fname.clone(), default, span: mspan });
                    }
                    _ => self
                        .diags
                        .push(Diag::error("field is missing a name", mspan)),
                },
                Some("constructor") | Some("init") => {
                    let Some(SExp::List { elems: plist, .. }) = parts.get(1) else {
                        self.diags.push(Diag::error(
                            "constructor is missing a parameter list",
                            mspan,
                        ));
                        continue;
                    };
                    let params = parse_param_list(plist, &mut self.diags);
                    let params = self.lower_params(&params);
                    let body = parts[2..].iter().map(|e| self.lower_form(e)).collect();
                    if ctor.is_some() {
                        self.diags.push(Diag::error(
                            format!("class '{}' has more than one constructor", name),
                            mspan,
                        ));
                    } else {
                        ctor = Some(CtorDef { params, body, span: mspan });
                    }
                }
                Some("fn") | Some("fx") => {
                    let purity = if member.head_symbol() == Some("fx") {
                        Purity::Pure
                    } else {
                        Purity::Loose
                    };
                    let id = self.lower_fn(parts, mspan, purity);
                    if let IrNode::Fn { name: mname, params, return_type, body, .. } =
                        self.module.node(id).clone()
                    {
                        methods.push(MethodDef {
                            name: mname,
                            purity,
                            params,
                            return_type,
                            body,
                            span: mspan,
                        });
                    }
                }
                _ => self
                    .diags
                    .push(Diag::error("invalid class member", mspan)),
            }
        }
        if fields.is_empty() && ctor.is_none() && methods.is_empty() {
            self.diags
                .push(Diag::warning(format!("class '{}' has no members", name), span));
        }
        self.alloc(IrNode::Class { name, fields, ctor, methods, span })
    }

    fn lower_struct(&mut self, elems: &[SExp], span: Span) -> IrId {
        let Some(SExp::Symbol { name, .. }) = elems.get(1) else {
            return self.error("struct is missing a name", span);
        };
        let name = name.clone();
        let mut fields = Vec::new();
        for member in &elems[2..] {
            match member {
                SExp::Symbol { name: fname, span: fspan } => {
                    fields.push(FieldDef { name: fname.clone(), default: None, span: *fspan })
                }
                SExp::List { elems: parts, span: fspan } => match parts.as_slice() {
                    [SExp::Symbol { name: fname, .. }] => {
                        fields.push(FieldDef { name: fname.clone(), default: None, span: *fspan })
                    }
                    [SExp::Symbol { name: fname, .. }, default] => {
                        let default = Some(self.lower_form(default));
                        fields.push(FieldDef { name: fname.clone(), default, span: *fspan })
                    }
                    _ => self
                        .diags
                        .push(Diag::error("invalid struct field", *fspan)),
                },
                other => self
                    .diags
                    .push(Diag::error("invalid struct field", other.span())),
            }
        }
        self.alloc(IrNode::Struct { name, fields, span })
    }

    /// `(enum Name (case a) (case b))`, or `(enum Name: Int (case ok 1))`
    /// for a raw-valued enum.
    fn lower_enum(&mut self, elems: &[SExp], span: Span) -> IrId {
        let (name, raw_type, case_start) = match elems.get(1) {
            Some(SExp::Symbol { name, .. }) => (name.clone(), None, 2),
            Some(SExp::Tag { name, span: tspan }) => {
                match elems.get(2).and_then(type_annotation) {
                    Some(ty) => (name.clone(), Some(ty), 3),
                    None => {
                        self.diags.push(Diag::error(
                            format!("enum '{}' has a ':' but no raw type", name),
                            *tspan,
                        ));
                        (name.clone(), None, 2)
                    }
                }
            }
            _ => return self.error("enum is missing a name", span),
        };
        let mut cases: Vec<EnumCase> = Vec::new();
        for member in &elems[case_start..] {
            let mspan = member.span();
            let Some(parts) = member.as_list() else {
                self.diags.push(Diag::error("invalid enum case", mspan));
                continue;
            };
            if member.head_symbol() != Some("case") {
                self.diags.push(Diag::error("invalid enum case", mspan));
                continue;
            }
            let Some(SExp::Symbol { name: cname, .. }) = parts.get(1) else {
                self.diags
                    .push(Diag::error("enum case is missing a name", mspan));
                continue;
            };
            if cases.iter().any(|c| c.name == *cname) {
                self.diags.push(Diag::error(
                    format!("duplicate enum case '{}'", cname),
                    mspan,
                ));
                continue;
            }
            let mut value = None;
            let mut params = Vec::new();
            match parts.get(2) {
                // (case err code: Int msg: String)
                Some(SExp::Tag { .. }) => {
                    let mut i = 2;
                    while i < parts.len() {
                        let SExp::Tag { name: pname, span: pspan } = &parts[i] else {
                            self.diags
                                .push(Diag::error("invalid enum case parameter", parts[i].span()));
                            i += 1;
                            continue;
                        };
                        match parts.get(i + 1).and_then(type_annotation) {
                            Some(ty) => params.push((pname.clone(), ty)),
                            None => self.diags.push(Diag::error(
                                format!("enum case parameter '{}' has no type", pname),
                                *pspan,
                            )),
                        }
                        i += 2;
                    }
                }
                // (case ok 200)
                Some(v) => value = Some(self.lower_form(v)),
                None => {}
            }
            cases.push(EnumCase { name: cname.clone(), value, params, span: mspan });
        }
        self.alloc(IrNode::Enum { name, raw_type, cases, span })
    }

    /// `(import name "path")`, `(import name from "path")`, or
    /// `(import [a b as c] "path")`.
    fn lower_import(&mut self, elems: &[SExp], span: Span) -> IrId {
        let names = match elems.get(1) {
            Some(SExp::Symbol { name, .. }) => vec![name.clone()],
            Some(SExp::Vector { elems, .. }) => {
                let mut names = Vec::new();
                let mut i = 0;
                while i < elems.len() {
                    let Some(n) = elems[i].as_symbol() else {
                        self.diags
                            .push(Diag::error("import names must be symbols", elems[i].span()));
                        i += 1;
                        continue;
                    };
                    // `name as alias` binds the alias locally
                    if elems.get(i + 1).map_or(false, |e| e.is_symbol("as")) {
                        match elems.get(i + 2).and_then(|e| e.as_symbol()) {
                            Some(alias) => {
                                names.push(SmolStr::new(alias));
                                i += 3;
                            }
                            None => {
                                self.diags.push(Diag::error(
                                    "'as' is missing an alias name",
                                    elems[i + 1].span(),
                                ));
                                i += 2;
                            }
                        }
                        continue;
                    }
                    names.push(SmolStr::new(n));
                    i += 1;
                }
                names
            }
            _ => return self.error("import is missing a name", span),
        };
        let mut rest = &elems[2..];
        if let Some(first) = rest.first() {
            if first.is_symbol("from") {
                rest = &rest[1..];
            }
        }
        let path = match rest.first() {
            Some(SExp::Str { segments, .. }) => {
                let mut path = String::new();
                for seg in segments {
                    match seg {
                        StrSegment::Text(t) => path.push_str(t),
                        StrSegment::Interp(_) => self.diags.push(Diag::error(
                            "import path cannot be interpolated",
                            rest[0].span(),
                        )),
                    }
                }
                Some(path)
            }
            Some(other) => {
                self.diags
                    .push(Diag::error("import path must be a string", other.span()));
                None
            }
            None => None,
        };
        self.alloc(IrNode::Import { names, path, span })
    }

    fn lower_export(&mut self, elems: &[SExp], span: Span) -> IrId {
        // (export "wire-name" symbol) exports one binding under a new name
        if let [_, str_form @ SExp::Str { segments, .. }, SExp::Symbol { name, .. }] = elems {
            let mut wire = String::new();
            for seg in segments {
                match seg {
                    StrSegment::Text(t) => wire.push_str(t),
                    StrSegment::Interp(_) => self.diags.push(Diag::error(
                        "export name cannot be interpolated",
                        str_form.span(),
                    )),
                }
            }
            return self.alloc(IrNode::Export {
                names: vec![name.clone()],
                rename: Some(SmolStr::new(wire)),
                span,
            });
        }
        let mut names = Vec::new();
        for e in &elems[1..] {
            match e {
                SExp::Symbol { name, .. } => names.push(name.clone()),
                SExp::Vector { elems, .. } => {
                    for v in elems {
                        match v.as_symbol() {
                            Some(n) => names.push(SmolStr::new(n)),
                            None => self
                                .diags
                                .push(Diag::error("export names must be symbols", v.span())),
                        }
                    }
                }
                other => self
                    .diags
                    .push(Diag::error("export names must be symbols", other.span())),
            }
        }
        self.alloc(IrNode::Export { names, rename: None, span })
    }

    fn lower_new(&mut self, elems: &[SExp], span: Span) -> IrId {
        let Some(SExp::Symbol { name, .. }) = elems.get(1) else {
            return self.error("new is missing a class name", span);
        };
        let class = name.clone();
        let args = self.lower_args(&elems[2..]);
        self.alloc(IrNode::New { class, args, span })
    }

    fn lower_assign(&mut self, elems: &[SExp], span: Span) -> IrId {
        let Some(target) = elems.get(1) else {
            return self.error("set! is missing a target", span);
        };
        if target.as_symbol().is_none() {
            return self.error("set! target must be a symbol", target.span());
        }
        let Some(value) = elems.get(2) else {
            return self.error("set! is missing a value", span);
        };
        let target = self.lower_form(target);
        let value = self.lower_form(value);
        self.alloc(IrNode::Assign { target, value, span })
    }
}

fn return_annotation(sexp: &SExp) -> Option<SmolStr> {
    let parts = sexp.as_list()?;
    match parts {
        [arrow, ty] if arrow.is_symbol("->") => type_annotation(ty),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower_source(source: &str) -> (IrModule, Vec<Diag>) {
        let forms = hql_reader::parse(source).expect("parse");
        let expanded = hql_macros::expand_document(forms);
        assert!(expanded.errors.is_empty(), "{:?}", expanded.errors);
        lower(&expanded.forms)
    }

    fn lower_ok(source: &str) -> IrModule {
        let (module, diags) = lower_source(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        module
    }

    fn first_error(source: &str) -> String {
        let (_, diags) = lower_source(source);
        diags
            .iter()
            .find(|d| d.severity == hql_ast::Severity::Error)
            .map(|d| d.message.clone())
            .expect("expected an error diagnostic")
    }

    #[test]
    fn lowers_call_with_named_args() {
        let module = lower_ok("(install os: \"linux\" version: 2)");
        let IrNode::Call { args, .. } = module.node(module.toplevel[0]) else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(&args[0], Arg::Named { name, .. } if name == "os"));
        assert!(matches!(&args[1], Arg::Named { name, .. } if name == "version"));
    }

    #[test]
    fn dotted_symbol_becomes_member_chain() {
        let module = lower_ok("(print a.b.c)");
        let IrNode::Call { args, .. } = module.node(module.toplevel[0]) else {
            panic!("expected call");
        };
        let Arg::Positional(id) = &args[0] else { panic!() };
        let IrNode::Member { property, object, .. } = module.node(*id) else {
            panic!("expected member");
        };
        assert_eq!(property, "c");
        assert!(matches!(module.node(*object), IrNode::Member { property, .. } if property == "b"));
    }

    #[test]
    fn cond_lowers_to_nested_ifs() {
        let module = lower_ok("(cond ((< x 0) \"neg\") ((> x 0) \"pos\") (else \"zero\"))");
        let IrNode::If { else_branch: Some(inner), .. } = module.node(module.toplevel[0]) else {
            panic!("expected if");
        };
        let IrNode::If { else_branch: Some(last), .. } = module.node(*inner) else {
            panic!("expected nested if");
        };
        assert!(matches!(module.node(*last), IrNode::StrLit { value, .. } if value == "zero"));
    }

    #[test]
    fn when_lowers_to_if_without_else() {
        let module = lower_ok("(when ready (launch))");
        assert!(matches!(
            module.node(module.toplevel[0]),
            IrNode::If { else_branch: None, .. }
        ));
    }

    #[test]
    fn unless_lowers_to_if_with_else_body() {
        let module = lower_ok("(unless ready (wait))");
        let IrNode::If { then_branch, else_branch: Some(_), .. } =
            module.node(module.toplevel[0])
        else {
            panic!("expected if");
        };
        assert!(matches!(module.node(*then_branch), IrNode::NilLit { .. }));
    }

    #[test]
    fn anonymous_fn_is_a_lambda() {
        let module = lower_ok("(map (fn (x) (* x 2)) xs)");
        let IrNode::Call { args, .. } = module.node(module.toplevel[0]) else {
            panic!("expected call");
        };
        let Arg::Positional(id) = &args[0] else { panic!() };
        assert!(matches!(module.node(*id), IrNode::Lambda { .. }));
    }

    #[test]
    fn fx_requires_param_types() {
        let msg = first_error("(fx add (a b: Int) (-> Int) (+ a b))");
        insta::assert_snapshot!(msg, @"fx parameter 'a' is missing a type annotation");
    }

    #[test]
    fn fx_requires_return_annotation() {
        let msg = first_error("(fx add (a: Int b: Int) (+ a b))");
        insta::assert_snapshot!(msg, @"fx 'add' is missing a return type annotation '(-> Type)'");
    }

    #[test]
    fn fx_requires_a_body() {
        let msg = first_error("(fx add (a: Int b: Int) (-> Int))");
        insta::assert_snapshot!(msg, @"fx 'add' has no body");
    }

    #[test]
    fn fn_allows_untyped_params() {
        let module = lower_ok("(fn add (a b) (+ a b))");
        let IrNode::Fn { purity, params, .. } = module.node(module.toplevel[0]) else {
            panic!("expected fn");
        };
        assert_eq!(*purity, Purity::Loose);
        assert!(params.iter().all(|p| p.ty.is_none()));
    }

    #[test]
    fn class_with_two_constructors_is_an_error() {
        let msg = first_error(
            "(class P (var x) (constructor (a) (set! x a)) (constructor (b) (set! x b)))",
        );
        insta::assert_snapshot!(msg, @"class 'P' has more than one constructor");
    }

    #[test]
    fn empty_class_warns() {
        let (_, diags) = lower_source("(class Empty)");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, hql_ast::Severity::Warning);
        insta::assert_snapshot!(diags[0].message, @"class 'Empty' has no members");
    }

    #[test]
    fn duplicate_enum_case_is_an_error() {
        let msg = first_error("(enum Os (case macos) (case linux) (case macos))");
        insta::assert_snapshot!(msg, @"duplicate enum case 'macos'");
    }

    #[test]
    fn raw_valued_enum_carries_its_type() {
        let module = lower_ok("(enum Code: Int (case ok 200) (case missing 404))");
        let IrNode::Enum { raw_type, cases, .. } = module.node(module.toplevel[0]) else {
            panic!("expected enum");
        };
        assert_eq!(raw_type.as_deref(), Some("Int"));
        assert_eq!(cases.len(), 2);
        assert!(cases[0].value.is_some());
    }

    #[test]
    fn enum_case_with_associated_values() {
        let module = lower_ok("(enum Result (case ok value: Any) (case err code: Int msg: String))");
        let IrNode::Enum { cases, .. } = module.node(module.toplevel[0]) else {
            panic!("expected enum");
        };
        assert_eq!(cases[0].params[0].0, "value");
        assert_eq!(cases[0].params[0].1, "Any");
        assert_eq!(cases[1].params.len(), 2);
        assert!(cases[1].value.is_none());
    }

    #[test]
    fn enum_case_parameter_needs_a_type() {
        let msg = first_error("(enum Result (case err code:))");
        insta::assert_snapshot!(msg, @"enum case parameter 'code' has no type");
    }

    #[test]
    fn map_spread_entry() {
        let module = lower_ok("{name: \"a\" & defaults}");
        let IrNode::ObjectLit { entries, .. } = module.node(module.toplevel[0]) else {
            panic!("expected object literal");
        };
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[1], ObjectEntry::Spread { .. }));
    }

    #[test]
    fn map_key_without_value() {
        let msg = first_error("{a: 1 b:}");
        insta::assert_snapshot!(msg, @"map key 'b' has no value");
    }

    #[test]
    fn interpolated_string_lowers_segments() {
        let module = lower_ok(r#"(print "x is \(x)!")"#);
        let IrNode::Call { args, .. } = module.node(module.toplevel[0]) else {
            panic!("expected call");
        };
        let Arg::Positional(id) = &args[0] else { panic!() };
        let IrNode::StrInterp { parts, .. } = module.node(*id) else {
            panic!("expected interpolated string");
        };
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn import_with_from_keyword() {
        let module = lower_ok("(import utils from \"./utils.hql\")");
        let IrNode::Import { names, path, .. } = module.node(module.toplevel[0]) else {
            panic!("expected import");
        };
        assert_eq!(names[0], "utils");
        assert_eq!(path.as_deref(), Some("./utils.hql"));
    }

    #[test]
    fn import_alias_binds_the_alias() {
        let module = lower_ok("(import [run as start, stop] from \"./svc.hql\")");
        let IrNode::Import { names, .. } = module.node(module.toplevel[0]) else {
            panic!("expected import");
        };
        assert_eq!(names.as_slice(), ["start", "stop"]);
    }

    #[test]
    fn export_can_rename_a_binding() {
        let module = lower_ok("(let run 1) (export \"start\" run)");
        let IrNode::Export { names, rename, .. } = module.node(module.toplevel[1]) else {
            panic!("expected export");
        };
        assert_eq!(names.as_slice(), ["run"]);
        assert_eq!(rename.as_deref(), Some("start"));
    }

    #[test]
    fn nested_macro_definition_is_rejected() {
        let msg = first_error("(fn f () (defmacro m (x) x))");
        insta::assert_snapshot!(msg, @"macro definitions are only allowed at the top level");
    }

    #[test]
    fn malformed_form_leaves_error_node() {
        let (module, diags) = lower_source("(let)");
        assert_eq!(diags.len(), 1);
        assert!(matches!(module.node(module.toplevel[0]), IrNode::Error { .. }));
    }

    #[test]
    fn loop_recur_shape() {
        let module = lower_ok("(loop ((i 0)) (if (< i 10) (recur (+ i 1)) i))");
        let IrNode::Loop { bindings, body, .. } = module.node(module.toplevel[0]) else {
            panic!("expected loop");
        };
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].0, "i");
        assert_eq!(body.len(), 1);
    }
}
