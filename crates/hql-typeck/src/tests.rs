use hql_ast::{Diag, Severity};

use crate::SymbolKind;

fn check_source(source: &str) -> crate::Analysis {
    let forms = hql_reader::parse(source).expect("parse");
    let expanded = hql_macros::expand_document(forms);
    assert!(expanded.errors.is_empty(), "{:?}", expanded.errors);
    crate::check(&expanded.forms)
}

fn diags(source: &str) -> Vec<Diag> {
    check_source(source).diags
}

fn check_clean(source: &str) {
    let diags = diags(source);
    assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
}

fn first_message(source: &str) -> String {
    let diags = diags(source);
    assert!(!diags.is_empty(), "expected a diagnostic");
    diags[0].message.clone()
}

#[test]
fn clean_document() {
    check_clean("(fn add (a b) (+ a b)) (print (add 1 2))");
}

#[test]
fn undefined_symbol_warns() {
    let msg = first_message("(print mystery)");
    insta::assert_snapshot!(msg, @"undefined symbol 'mystery'");
}

#[test]
fn one_warning_per_occurrence() {
    let diags = diags("(print mystery) (print mystery)");
    assert_eq!(diags.len(), 2);
    assert!(diags.iter().all(|d| d.severity == Severity::Warning));
}

#[test]
fn use_before_definition_is_fine() {
    check_clean("(print (add 1 2)) (fn add (a b) (+ a b))");
}

#[test]
fn too_few_arguments() {
    let msg = first_message("(fn add (a b) (+ a b)) (add 1)");
    insta::assert_snapshot!(msg, @"'add' expects at least 2 arguments, got 1");
}

#[test]
fn too_many_arguments() {
    let msg = first_message("(fn add (a b) (+ a b)) (add 1 2 3)");
    insta::assert_snapshot!(msg, @"'add' expects at most 2 arguments, got 3");
}

#[test]
fn defaults_relax_the_minimum() {
    check_clean("(fn greet (name = \"World\") (print name)) (greet) (greet \"you\")");
}

#[test]
fn default_in_the_middle_relaxes_only_its_slot() {
    let source = "(fn f (a, b = 1, c) a)";
    insta::assert_snapshot!(
        first_message(&format!("{} (f 1)", source)),
        @"'f' expects at least 2 arguments, got 1"
    );
    insta::assert_snapshot!(
        first_message(&format!("{} (f 1 2 3 4)", source)),
        @"'f' expects at most 3 arguments, got 4"
    );
}

#[test]
fn rest_parameter_lifts_the_maximum() {
    check_clean("(fn sum (first & rest) first) (sum 1 2 3 4 5)");
}

#[test]
fn rest_parameter_keeps_the_minimum() {
    let msg = first_message("(fn sum (first & rest) first) (sum)");
    insta::assert_snapshot!(msg, @"'sum' expects at least 1 argument, got 0");
}

#[test]
fn fx_type_mismatch() {
    let msg = first_message("(fx add (a: Int b: Int) (-> Int) (+ a b)) (add \"one\" 2)");
    insta::assert_snapshot!(msg, @"type mismatch for parameter 'a' of 'add': expected Int, got String");
}

#[test]
fn fn_annotations_are_not_enforced() {
    // only fx signatures get type warnings
    check_clean("(fn add (a: Int b: Int) (+ a b)) (add \"one\" 2)");
}

#[test]
fn numeric_group_is_interchangeable() {
    check_clean("(fx add (a: Int b: Int) (-> Int) (+ a b)) (add 1.5 2)");
}

#[test]
fn fx_return_type_feeds_inference() {
    let msg = first_message(
        "(fx add (a: Int b: Int) (-> Int) (+ a b)) \
         (fx shout (s: String) (-> String) s) \
         (shout (add 1 2))",
    );
    insta::assert_snapshot!(msg, @"type mismatch for parameter 's' of 'shout': expected String, got Int");
}

#[test]
fn named_arguments_match_parameters() {
    check_clean("(fn install (os = \"mac\" version = 1) os) (install version: 2 os: \"linux\")");
}

#[test]
fn unknown_named_parameter() {
    let msg = first_message("(fn install (os = \"mac\" version = 1) os) (install flavor: 3)");
    insta::assert_snapshot!(msg, @"unknown parameter 'flavor' for 'install'");
}

#[test]
fn named_call_reports_each_missing_parameter() {
    let msg = first_message("(fn connect (host port timeout = 30) host) (connect port: 80)");
    insta::assert_snapshot!(msg, @"missing parameter 'host' in call to 'connect'");
}

#[test]
fn named_argument_without_value() {
    let msg = first_message("(fn install (os = \"mac\") os) (install os:)");
    insta::assert_snapshot!(msg, @"named argument 'os' has no value");
}

#[test]
fn let_in_a_do_body_covers_later_siblings() {
    check_clean("(fn f () (do (let y 1) (print y)))");
}

#[test]
fn let_in_a_while_body_covers_later_siblings() {
    check_clean("(fn tick () (while true (let step 1) (print step)))");
}

#[test]
fn let_in_a_when_body_covers_later_siblings() {
    check_clean("(fn f (flag) (when flag (let msg \"hi\") (print msg)))");
}

#[test]
fn let_shadowing_a_parameter_warns() {
    let msg = first_message("(fn f (x) (let x 2) x)");
    insta::assert_snapshot!(msg, @"'x' shadows a parameter");
}

#[test]
fn let_scope_paths_are_recorded() {
    let analysis = check_source("(fn f (x) (let y 2) y)");
    let y = analysis
        .table
        .symbols()
        .iter()
        .find(|s| s.name == "y")
        .expect("y is declared");
    assert_eq!(y.kind, SymbolKind::Let);
    assert!(
        y.scope_path.starts_with("global.f.let#"),
        "unexpected path {}",
        y.scope_path
    );
}

#[test]
fn enum_cases_resolve_through_the_enum() {
    check_clean("(enum Os (case macos) (case linux)) (print Os.macos)");
}

#[test]
fn enum_case_existence_is_not_validated() {
    // only the head segment of a dotted reference resolves
    check_clean("(enum Os (case macos)) (print Os.windows)");
}

#[test]
fn enum_typed_parameter() {
    check_clean("(enum Os (case macos)) (fx pick (o: Os) (-> Bool) true) (pick Os.macos)");
}

#[test]
fn enum_typed_parameter_mismatch() {
    let msg = first_message("(enum Os (case macos)) (fx pick (o: Os) (-> Bool) true) (pick 5)");
    insta::assert_snapshot!(msg, @"type mismatch for parameter 'o' of 'pick': expected Os, got Int");
}

#[test]
fn host_globals_need_no_declaration() {
    check_clean("(console.log \"hello\") (print Math.PI)");
}

#[test]
fn imports_bind_their_names() {
    check_clean("(import utils from \"./utils.hql\") (utils.run)");
}

#[test]
fn import_alias_binds_the_alias() {
    check_clean("(import [fetch as get] from \"./http.hql\") (get \"/\")");
    insta::assert_snapshot!(
        first_message("(import [fetch as get] from \"./http.hql\") (fetch \"/\")"),
        @"undefined symbol 'fetch'"
    );
}

#[test]
fn cond_else_is_a_keyword() {
    check_clean("(fn sign (x) (cond ((< x 0) -1) ((> x 0) 1) (else 0)))");
}

#[test]
fn loop_bindings_are_in_scope() {
    check_clean("(loop ((i 0) (acc 1)) (if (< i 10) (recur (+ i 1) (* acc 2)) acc))");
}

#[test]
fn for_binding_is_in_scope() {
    check_clean("(for (x (range 10)) (print x))");
}

#[test]
fn lambda_parameters_are_in_scope() {
    check_clean("(map (lambda (x) (* x 2)) (range 5))");
}

#[test]
fn class_fields_visible_in_methods() {
    check_clean(
        "(class Counter \
           (var count 0) \
           (fn bump () (set! count (+ count 1))) \
           (fn value () count)) \
         (let c (new Counter)) \
         (c.bump)",
    );
}

#[test]
fn docstring_is_captured() {
    let analysis = check_source("(fn add (a b) \"Add two numbers.\" (+ a b))");
    let add = analysis.table.resolve_global("add").expect("declared");
    assert_eq!(add.documentation.as_deref(), Some("Add two numbers."));
}

#[test]
fn methods_are_their_own_kind() {
    let analysis = check_source("(class Dog (fn bark (times) times))");
    let bark = analysis
        .table
        .symbols()
        .iter()
        .find(|s| s.name == "bark")
        .expect("bark is declared");
    assert_eq!(bark.kind, SymbolKind::Method);
}

#[test]
fn method_calls_are_arity_checked() {
    let msg = first_message(
        "(class Dog \
           (fn bark () 1) \
           (fn go () (bark 1)))",
    );
    insta::assert_snapshot!(msg, @"'bark' expects at most 0 arguments, got 1");
}

#[test]
fn lowercase_class_name_hints() {
    let diags = diags("(class point (var x 0))");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Hint);
    insta::assert_snapshot!(diags[0].message, @"class names are conventionally capitalized: 'point'");
}

#[test]
fn uppercase_function_name_hints() {
    let diags = diags("(fn Add (a b) (+ a b))");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Hint);
    insta::assert_snapshot!(diags[0].message, @"function names are conventionally lowercase: 'Add'");
}

#[test]
fn string_interpolation_resolves_symbols() {
    let msg = first_message(r#"(print "hello \(who)")"#);
    insta::assert_snapshot!(msg, @"undefined symbol 'who'");
}

#[test]
fn nested_function_is_checked() {
    let msg = first_message("(fn outer () (fn inner (a) a) (inner 1 2))");
    insta::assert_snapshot!(msg, @"'inner' expects at most 1 argument, got 2");
}

#[test]
fn macro_expansion_feeds_checking() {
    let msg = first_message("(defmacro twice (x) (+ x x)) (twice unknown-thing)");
    insta::assert_snapshot!(msg, @"undefined symbol 'unknown-thing'");
}
