use std::fmt;
use std::fmt::Write;

use pest::Span;

use super::ast::StringSpan;

/// A problem found while turning a parsed model into a [`Model`](crate::Model),
/// located in the source text where possible.
#[derive(Debug, Clone)]
pub struct ValidationError {
    text: String,
    source_ref: Option<StringSpan>,
}

impl ValidationError {
    pub fn new(text: String, span: Option<StringSpan>) -> Self {
        Self {
            text,
            source_ref: span,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn as_error_message(&self, f: &mut String, input: &str) -> fmt::Result {
        let line_col = self
            .source_ref
            .and_then(|source_ref| Span::new(input, source_ref.pos_start, source_ref.pos_end))
            .map(|span| span.start_pos().line_col());
        match line_col {
            Some((line, col)) => write!(f, "Line {}, Column {}: Error: {}", line, col, self.text),
            None => write!(f, "Error: {}", self.text),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(source_ref) = self.source_ref {
            write!(f, "{}: Error: {}", source_ref, self.text)
        } else {
            write!(f, "Error: {}", self.text)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, new: ValidationError) {
        self.errors.push(new);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// All errors, one per line, with line and column numbers resolved
    /// against `input`.
    pub fn as_error_message(&self, input: &str) -> String {
        let mut buf = "\n".to_string();
        for err in &self.errors {
            // writing to a String cannot fail
            let _ = err.as_error_message(&mut buf, input);
            buf.push('\n');
        }
        buf
    }

    pub fn has_error_contains(&self, text: &str) -> bool {
        self.errors.iter().any(|err| err.text.contains(text))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for err in &self.errors {
            writeln!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
