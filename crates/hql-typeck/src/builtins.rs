use phf::phf_set;

/// Built-in functions and operators that need no declaration.
static BUILTINS: phf::Set<&'static str> = phf_set! {
    "+", "-", "*", "/", "%",
    "<", ">", "<=", ">=", "=", "!=",
    "and", "or", "not",
    "print", "println", "str", "concat",
    "list", "vector", "hash-map", "hash-set",
    "get", "set", "push", "pop", "count", "empty?",
    "first", "rest", "last", "nth", "cons", "conj",
    "map", "filter", "reduce", "range", "contains?", "keys", "values",
    "inc", "dec", "abs", "min", "max",
    "nil?", "int?", "float?", "string?", "bool?", "list?",
    "throw", "type",
};

/// Host globals visible to every document; member access hangs off these.
static HOST_GLOBALS: phf::Set<&'static str> = phf_set! {
    "console", "Math", "JSON", "Date", "Object", "Array", "String",
    "Number", "Boolean", "document", "window", "globalThis", "process",
    "self", "this",
};

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(name)
}

pub fn is_host_global(name: &str) -> bool {
    HOST_GLOBALS.contains(name)
}

/// A name that resolves without any user declaration.
pub fn is_known(name: &str) -> bool {
    is_builtin(name) || is_host_global(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_are_builtin() {
        assert!(is_builtin("+"));
        assert!(is_builtin("!="));
    }

    #[test]
    fn host_globals_are_known() {
        assert!(is_known("console"));
        assert!(is_known("Math"));
        assert!(!is_known("definitely-not-defined"));
    }
}
