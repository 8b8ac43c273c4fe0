use phf::phf_set;

/// Core special forms. Fixed at process startup, read-only thereafter;
/// lowered directly by the compiler and never macro-expandable or
/// user-redefinable.
static SPECIAL_FORMS: phf::Set<&'static str> = phf_set! {
    "fn",
    "fx",
    "lambda",
    "let",
    "var",
    "if",
    "do",
    "cond",
    "when",
    "unless",
    "loop",
    "recur",
    "for",
    "while",
    "class",
    "struct",
    "enum",
    "import",
    "export",
    "new",
    "return",
    "set!",
    "defmacro",
    "macro",
};

pub fn is_special_form(name: &str) -> bool {
    SPECIAL_FORMS.contains(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_forms_recognized() {
        for name in ["fn", "fx", "let", "var", "enum", "class", "defmacro"] {
            assert!(is_special_form(name), "{} should be a special form", name);
        }
    }

    #[test]
    fn ordinary_names_are_not_special() {
        assert!(!is_special_form("print"));
        assert!(!is_special_form("my-macro"));
        assert!(!is_special_form("vector"));
    }
}
