use hql_ast::{LineIndex, Pos};

/// An open document: its text, the host's version counter, and a line
/// index kept in sync with the text.
#[derive(Debug)]
pub struct Document {
    text: String,
    version: i32,
    line_index: LineIndex,
}

impl Document {
    pub fn new(text: impl Into<String>, version: i32) -> Self {
        let text = text.into();
        let line_index = LineIndex::new(&text);
        Document { text, version, line_index }
    }

    /// Whole-text replacement; the host sends full snapshots.
    pub fn update(&mut self, text: impl Into<String>, version: i32) {
        self.text = text.into();
        self.version = version;
        self.line_index = LineIndex::new(&self.text);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn pos(&self, offset: u32) -> Pos {
        self.line_index.pos(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_text_and_index() {
        let mut doc = Document::new("(a)", 1);
        assert_eq!(doc.pos(2).column, 3);
        doc.update("(longer form)\n(second)", 2);
        assert_eq!(doc.version(), 2);
        assert_eq!(doc.pos(14).line, 2);
    }
}
