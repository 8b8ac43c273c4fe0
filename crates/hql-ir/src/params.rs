//! Parameter-list parsing, shared between lowering and scope analysis.
//!
//! Grammar of a parameter list:
//!
//! ```text
//! (a b)                positional, untyped
//! (a: Int b: String)   typed (tag followed by a type expression)
//! (a = 10)             default value
//! (a: Int = 10)        typed with default
//! (a & rest)           trailing rest parameter
//! ```

use hql_ast::{Diag, SExp, Span};
use smol_str::SmolStr;

/// A parsed parameter. The default value stays as surface syntax so both
/// lowering (which wants IR) and scope analysis (which only wants names)
/// can consume it.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: SmolStr,
    pub ty: Option<SmolStr>,
    pub default: Option<SExp>,
    pub rest: bool,
    pub span: Span,
}

impl Param {
    /// A parameter a call site may omit.
    pub fn is_optional(&self) -> bool {
        self.rest || self.default.is_some()
    }
}

/// Render a type expression to its canonical name: `Int`, `[Int]`, `[[Str]]`.
pub fn type_annotation(sexp: &SExp) -> Option<SmolStr> {
    match sexp {
        SExp::Symbol { name, .. } => Some(name.clone()),
        SExp::Vector { elems, .. } if elems.len() == 1 => {
            let inner = type_annotation(&elems[0])?;
            Some(SmolStr::new(format!("[{}]", inner)))
        }
        _ => None,
    }
}

/// Parse a parameter list. Malformed entries are reported and skipped; the
/// surviving parameters are always usable.
pub fn parse_param_list(elems: &[SExp], diags: &mut Vec<Diag>) -> Vec<Param> {
    let mut params: Vec<Param> = Vec::new();
    let mut i = 0;
    while i < elems.len() {
        match &elems[i] {
            // `name:` tag introduces a typed parameter.
            SExp::Tag { name, span } => {
                let ty = match elems.get(i + 1).and_then(type_annotation) {
                    Some(ty) => {
                        i += 2;
                        Some(ty)
                    }
                    None => {
                        diags.push(Diag::error(
                            format!("parameter '{}' has a ':' but no type", name),
                            *span,
                        ));
                        i += 1;
                        None
                    }
                };
                push_param(&mut params, name.clone(), ty, *span, diags);
            }
            SExp::Symbol { name, span } if name == "&" => {
                match elems.get(i + 1) {
                    Some(SExp::Symbol { name: rest, span: rspan }) => {
                        if i + 2 < elems.len() {
                            diags.push(Diag::error(
                                "rest parameter must be last",
                                *rspan,
                            ));
                        }
                        params.push(Param {
                            name: rest.clone(),
                            ty: None,
                            default: None,
                            rest: true,
                            span: *rspan,
                        });
                    }
                    _ => diags.push(Diag::error("'&' must be followed by a name", *span)),
                }
                break;
            }
            SExp::Symbol { name, span } if name == "=" => {
                // default for the parameter just parsed
                match (params.last_mut(), elems.get(i + 1)) {
                    (Some(prev), Some(value)) => {
                        prev.default = Some(value.clone());
                        i += 2;
                        continue;
                    }
                    _ => {
                        diags.push(Diag::error("'=' has no parameter to attach to", *span));
                        i += 1;
                        continue;
                    }
                }
            }
            SExp::Symbol { name, span } if name.starts_with('&') && name.len() > 1 => {
                if i + 1 < elems.len() {
                    diags.push(Diag::error("rest parameter must be last", *span));
                }
                params.push(Param {
                    name: SmolStr::new(&name[1..]),
                    ty: None,
                    default: None,
                    rest: true,
                    span: *span,
                });
                break;
            }
            SExp::Symbol { name, span } => {
                push_param(&mut params, name.clone(), None, *span, diags);
                i += 1;
            }
            other => {
                diags.push(Diag::error("expected a parameter name", other.span()));
                i += 1;
            }
        }
    }
    params
}

fn push_param(
    params: &mut Vec<Param>,
    name: SmolStr,
    ty: Option<SmolStr>,
    span: Span,
    diags: &mut Vec<Diag>,
) {
    if params.iter().any(|p| p.name == name) {
        diags.push(Diag::error(format!("duplicate parameter '{}'", name), span));
        return;
    }
    params.push(Param { name, ty, default: None, rest: false, span });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (Vec<Param>, Vec<Diag>) {
        let forms = hql_reader::parse(source).expect("parse");
        let elems = forms[0].as_list().expect("list").to_vec();
        let mut diags = Vec::new();
        let params = parse_param_list(&elems, &mut diags);
        (params, diags)
    }

    #[test]
    fn untyped_positional() {
        let (params, diags) = parse("(a b c)");
        assert!(diags.is_empty());
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].name, "a");
        assert!(params[0].ty.is_none());
    }

    #[test]
    fn typed_parameters() {
        let (params, diags) = parse("(x: Int y: String)");
        assert!(diags.is_empty());
        assert_eq!(params[0].ty.as_deref(), Some("Int"));
        assert_eq!(params[1].ty.as_deref(), Some("String"));
    }

    #[test]
    fn list_type_annotation() {
        let (params, diags) = parse("(xs: [Int])");
        assert!(diags.is_empty());
        assert_eq!(params[0].ty.as_deref(), Some("[Int]"));
    }

    #[test]
    fn default_value() {
        let (params, diags) = parse("(name = \"World\")");
        assert!(diags.is_empty());
        assert!(params[0].default.is_some());
        assert!(params[0].is_optional());
    }

    #[test]
    fn typed_with_default() {
        let (params, diags) = parse("(x: Int = 10)");
        assert!(diags.is_empty());
        assert_eq!(params[0].ty.as_deref(), Some("Int"));
        assert!(params[0].default.is_some());
    }

    #[test]
    fn rest_parameter() {
        let (params, diags) = parse("(a & rest)");
        assert!(diags.is_empty());
        assert_eq!(params.len(), 2);
        assert!(params[1].rest);
        assert_eq!(params[1].name, "rest");
    }

    #[test]
    fn duplicate_parameter_reported() {
        let (params, diags) = parse("(a a)");
        assert_eq!(params.len(), 1);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("duplicate parameter 'a'"));
    }

    #[test]
    fn rest_must_be_last() {
        let (_, diags) = parse("(a & rest b)");
        assert!(diags.iter().any(|d| d.message.contains("rest parameter must be last")));
    }
}
