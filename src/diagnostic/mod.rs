pub mod ansi;
pub mod json;
pub mod registry;

use crate::compiler::CompileError;
use crate::lexer::LexError;
use crate::source::{SourceMap, Span};
use crate::vm::{InterpretError, RuntimeError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable registry code such as `LOX-C001`.
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    /// Unknown spans are dropped rather than pointing at offset zero.
    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        if !span.is_unknown() {
            self.labels.push(Label { span, message: label.into(), is_primary: true });
        }
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches `source` and, for runtime faults, the `[line N] in script`
    /// trailer.
    pub fn for_interpret_error(e: &InterpretError, source: &str) -> Self {
        let d = Diagnostic::from(e).with_source(source);
        match e {
            InterpretError::Runtime(r) if !r.span.is_unknown() => {
                let line = SourceMap::new(source).line(r.span.start);
                d.with_note(format!("[line {line}] in script"))
            }
            _ => d,
        }
    }
}

// ---- From impls for the crate's error types ----

impl From<&LexError> for Diagnostic {
    fn from(e: &LexError) -> Self {
        Diagnostic::error(e.to_string())
            .with_code(e.kind.code())
            .with_span(e.span(), "here")
    }
}

impl From<&CompileError> for Diagnostic {
    fn from(e: &CompileError) -> Self {
        let label = match &e.lexeme {
            Some(lexeme) => format!("at '{lexeme}'"),
            None => "at end".to_string(),
        };
        let d = Diagnostic::error(&e.message).with_code(e.code).with_span(e.span, label);
        match e.code {
            "LOX-C002" => d.with_suggestion("close the group with ')'"),
            "LOX-C004" => d.with_suggestion("split the expression; a chunk holds at most 256 constants"),
            _ => d,
        }
    }
}

impl From<&RuntimeError> for Diagnostic {
    fn from(e: &RuntimeError) -> Self {
        Diagnostic::error(e.to_string())
            .with_code(e.kind.code())
            .with_span(e.span, "")
    }
}

impl From<&InterpretError> for Diagnostic {
    fn from(e: &InterpretError) -> Self {
        match e {
            InterpretError::Compile(c) => Diagnostic::from(c),
            InterpretError::Runtime(r) => Diagnostic::from(r),
        }
    }
}
