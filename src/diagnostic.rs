//! Compiler diagnostics.
//!
//! Every pass failure is a [`Diagnostic`] with a span, a stable `MDxxxx`
//! code, a message, and an optional hint. The pipeline aborts on the first
//! diagnostic; only the type checker additionally produces non-fatal
//! warnings.
//!
//! Code taxonomy (the last code of each band is the pass default):
//!
//! | band   | pass          |
//! |--------|---------------|
//! | MD1xxx | lexer         |
//! | MD2xxx | parser        |
//! | MD30xx | name resolver |
//! | MD31xx | type checker  |
//! | MD4xxx | borrow checker|
//! | MD5xxx | lowering      |

use crate::intern::Interner;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub span: Span,
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn error(span: Span, code: &'static str, message: impl Into<String>) -> Self {
        Diagnostic {
            span,
            severity: Severity::Error,
            code,
            message: message.into(),
            hint: None,
        }
    }

    pub fn warning(span: Span, code: &'static str, message: impl Into<String>) -> Self {
        Diagnostic {
            span,
            severity: Severity::Warning,
            code,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Formats the diagnostic as the single-line driver format, with the
    /// hint on a second indented line when present:
    ///
    /// ```text
    /// main.mdr:3:5: error[MD3101]: unknown name 'x'
    ///   hint: declare it first
    /// ```
    pub fn render(&self, interner: &Interner) -> String {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        let mut out = format!(
            "{}:{}:{}: {}[{}]: {}",
            interner.resolve(self.span.file),
            self.span.line,
            self.span.col,
            label,
            self.code,
            self.message
        );
        if let Some(hint) = &self.hint {
            out.push_str("\n  hint: ");
            out.push_str(hint);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    fn span(interner: &mut Interner) -> Span {
        let file = interner.intern("diag.mdr");
        Span::new(file, 19, 24, 1, 20)
    }

    #[test]
    fn render_has_location_code_and_message() {
        let mut interner = Interner::new();
        let d = Diagnostic::error(span(&mut interner), "MD3101", "unknown name 'x'");
        assert_eq!(
            d.render(&interner),
            "diag.mdr:1:20: error[MD3101]: unknown name 'x'"
        );
    }

    #[test]
    fn render_appends_hint_line() {
        let mut interner = Interner::new();
        let d = Diagnostic::error(span(&mut interner), "MD1002", "unterminated string literal")
            .with_hint("add a closing quote");
        let text = d.render(&interner);
        assert!(text.ends_with("\n  hint: add a closing quote"));
    }

    #[test]
    fn warnings_render_with_warning_label() {
        let mut interner = Interner::new();
        let d = Diagnostic::warning(span(&mut interner), "MD3100", "`task` modifier is not compiled");
        assert!(d.render(&interner).contains("warning[MD3100]"));
    }
}
