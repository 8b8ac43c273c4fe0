//! Macro and special-form expansion.
//!
//! Takes the reader's S-expression forest, collects `(defmacro ...)`
//! definitions from the top level, and rewrites every macro call until no
//! macro heads remain. Special forms are never expanded; their expression
//! positions are still walked so macros nested inside them fire.

mod expander;
mod hygiene;
mod special_forms;

pub use expander::{
    expand_document, ExpandError, ExpandResult, MacroDef, MacroRegistry, MAX_EXPANSION_DEPTH,
};
pub use hygiene::gensym;
pub use special_forms::is_special_form;

#[cfg(test)]
mod tests {
    use super::*;
    use hql_ast::print_toplevel;

    fn expand_ok(source: &str) -> String {
        let forms = hql_reader::parse(source).expect("parse");
        let result = expand_document(forms);
        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
        print_toplevel(&result.forms)
    }

    fn expand_err(source: &str) -> String {
        let forms = hql_reader::parse(source).expect("parse");
        let result = expand_document(forms);
        assert!(!result.errors.is_empty(), "expected at least one error");
        result.errors[0].message.clone()
    }

    #[test]
    fn simple_substitution() {
        let out = expand_ok("(defmacro twice (x) (+ x x)) (twice 5)");
        insta::assert_snapshot!(out, @"(+ 5 5)");
    }

    #[test]
    fn definition_may_follow_use() {
        let out = expand_ok("(twice 5) (defmacro twice (x) (+ x x))");
        insta::assert_snapshot!(out, @"(+ 5 5)");
    }

    #[test]
    fn rest_parameter_splices() {
        let out = expand_ok("(defmacro prog (& body) (do body)) (prog (f 1) (g 2))");
        insta::assert_snapshot!(out, @"(do (f 1) (g 2))");
    }

    #[test]
    fn ampersand_prefixed_rest_parameter() {
        let out = expand_ok("(defmacro prog (&body) (do body)) (prog (f 1) (g 2))");
        insta::assert_snapshot!(out, @"(do (f 1) (g 2))");
    }

    #[test]
    fn macros_expand_inside_macro_output() {
        let out = expand_ok(
            "(defmacro twice (x) (+ x x)) (defmacro quad (x) (twice (twice x))) (quad 3)",
        );
        insta::assert_snapshot!(out, @"(+ (+ 3 3) (+ 3 3))");
    }

    #[test]
    fn macros_expand_inside_special_form_bodies() {
        let out = expand_ok("(defmacro inc (x) (+ x 1)) (if cond (inc n) (inc m))");
        insta::assert_snapshot!(out, @"(if cond (+ n 1) (+ m 1))");
    }

    #[test]
    fn parameter_list_is_not_an_expansion_site() {
        // `twice` appears as a parameter name; it must not be treated as a
        // macro call even though a macro of that name exists.
        let out = expand_ok("(defmacro twice (x) (+ x x)) (fn f (twice y) (twice y))");
        insta::assert_snapshot!(out, @"(fn f (twice y) (+ y y))");
    }

    #[test]
    fn let_binding_names_survive() {
        let out = expand_ok("(defmacro inc (x) (+ x 1)) (let total (inc 41))");
        insta::assert_snapshot!(out, @"(let total (+ 41 1))");
    }

    #[test]
    fn template_let_bindings_are_renamed() {
        let forms = hql_reader::parse(
            "(defmacro swap-print (a b) (do (let tmp a) (print tmp b))) (swap-print x y)",
        )
        .expect("parse");
        let result = expand_document(forms);
        assert!(result.errors.is_empty());
        let printed = print_toplevel(&result.forms);
        // the template-introduced `tmp` must be renamed to a fresh symbol
        assert!(!printed.contains("let tmp"), "binding not renamed: {}", printed);
        assert!(printed.contains("(print __tmp_"), "rename not applied: {}", printed);
        // call-site symbols pass through untouched
        assert!(printed.contains("x)"), "argument lost: {}", printed);
    }

    #[test]
    fn hygiene_does_not_rename_caller_bindings() {
        let out = expand_ok("(defmacro inc (x) (+ x 1)) (let tmp (inc 1))");
        insta::assert_snapshot!(out, @"(let tmp (+ 1 1))");
    }

    #[test]
    fn arity_mismatch_reports_error() {
        let msg = expand_err("(defmacro twice (x) (+ x x)) (twice 1 2)");
        insta::assert_snapshot!(msg, @"macro 'twice' expects 1 argument, got 2");
    }

    #[test]
    fn rest_macro_still_requires_fixed_args() {
        let msg = expand_err("(defmacro wrap (tag & body) (do body)) (wrap)");
        insta::assert_snapshot!(msg, @"macro 'wrap' expects at least 1 argument, got 0");
    }

    #[test]
    fn expansion_cycle_is_reported() {
        let msg = expand_err("(defmacro a (x) (b x)) (defmacro b (x) (a x)) (a 1)");
        insta::assert_snapshot!(msg, @"macro expansion exceeded maximum depth (expansion cycle?)");
    }

    #[test]
    fn self_recursive_macro_is_reported() {
        let msg = expand_err("(defmacro loopy (x) (loopy x)) (loopy 1)");
        insta::assert_snapshot!(msg, @"macro expansion exceeded maximum depth (expansion cycle?)");
    }

    #[test]
    fn special_forms_cannot_be_redefined() {
        let msg = expand_err("(defmacro let (x) x)");
        insta::assert_snapshot!(msg, @"cannot redefine special form 'let'");
    }

    #[test]
    fn failed_form_does_not_poison_document() {
        let forms = hql_reader::parse("(defmacro twice (x) (+ x x)) (twice) (twice 7)").unwrap();
        let result = expand_document(forms);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.forms.len(), 1);
        insta::assert_snapshot!(print_toplevel(&result.forms), @"(+ 7 7)");
    }

    #[test]
    fn definitions_are_removed_from_output() {
        let forms = hql_reader::parse("(defmacro m (x) x) (print 1)").unwrap();
        let result = expand_document(forms);
        assert!(result.errors.is_empty());
        assert_eq!(result.forms.len(), 1);
    }

    #[test]
    fn expansion_is_idempotent() {
        let forms = hql_reader::parse(
            "(defmacro inc (x) (+ x 1)) (fn f (n) (if (> n 0) (inc n) 0)) (print (inc 2))",
        )
        .unwrap();
        let once = expand_document(forms);
        assert!(once.errors.is_empty());
        let twice = expand_document(once.forms.clone());
        assert!(twice.errors.is_empty());
        assert_eq!(once.forms.len(), twice.forms.len());
        for (a, b) in once.forms.iter().zip(&twice.forms) {
            assert!(a.same_shape(b), "expansion changed on second pass");
        }
    }

    #[test]
    fn interpolation_groups_are_expansion_sites() {
        let out = expand_ok(r#"(defmacro inc (x) (+ x 1)) (print "n is \((inc 2))")"#);
        insta::assert_snapshot!(out, @r#"(print "n is \((+ 2 1))")"#);
    }

    #[test]
    fn document_without_macros_passes_through() {
        let src = "(fn add (a b) (+ a b)) (print (add 1 2))";
        let forms = hql_reader::parse(src).unwrap();
        let before = forms.clone();
        let result = expand_document(forms);
        assert!(result.errors.is_empty());
        for (a, b) in before.iter().zip(&result.forms) {
            assert!(a.same_shape(b));
        }
    }
}
