//! Accumulated compile errors. Passes never print or abort on their own;
//! they collect every independent error with its source span so a single
//! compile reports as much as possible, and the driver renders the list.

use colored::Colorize;

use crate::frontend::{SourceFile, lexer::Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

/// Renders a diagnostic list for terminal output
pub fn render(diagnostics: &[Diagnostic], source: &SourceFile) -> String {
    let mut out = String::new();

    for diagnostic in diagnostics {
        out.push_str(&format!(
            "{}{} {} ({})\n",
            "error".red(),
            ":".bold(),
            diagnostic.message.bold(),
            source.format_span_position(diagnostic.span),
        ));
    }

    out
}
