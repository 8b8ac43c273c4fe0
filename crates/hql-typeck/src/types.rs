//! Type name compatibility.
//!
//! Types are canonical names (`Int`, `String`, `[Int]`, an enum name).
//! Checking is advisory and permissive: two names are compatible unless
//! they demonstrably clash, and `Any` matches everything.

const NUMERIC: &[&str] = &["Int", "Float", "Number", "Double"];
const LISTY: &[&str] = &["List", "Vector", "Array"];

pub fn is_numeric(name: &str) -> bool {
    NUMERIC.contains(&name)
}

pub fn is_listy(name: &str) -> bool {
    LISTY.contains(&name)
}

/// Strip `[T]` down to `T`, if this is an element-typed collection.
fn element_type(name: &str) -> Option<&str> {
    name.strip_prefix('[')?.strip_suffix(']')
}

/// Whether a value of type `actual` is acceptable where `expected` is
/// annotated.
pub fn compatible(expected: &str, actual: &str) -> bool {
    if expected == actual || expected == "Any" || actual == "Any" || actual == "Nil" {
        return true;
    }
    if is_numeric(expected) && is_numeric(actual) {
        return true;
    }
    if is_listy(expected) && is_listy(actual) {
        return true;
    }
    match (element_type(expected), element_type(actual)) {
        // [Int] vs [Float], recursively
        (Some(e), Some(a)) => compatible(e, a),
        // [Int] accepts an untyped collection and vice versa
        (Some(_), None) => is_listy(actual),
        (None, Some(_)) => is_listy(expected),
        (None, None) => false,
    }
}
