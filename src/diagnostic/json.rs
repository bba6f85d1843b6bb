use serde::Serialize;

use super::{Diagnostic, Severity};
use crate::source::SourceMap;

#[derive(Serialize)]
struct JsonLabel<'a> {
    start: usize,
    end: usize,
    message: &'a str,
    primary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    col: Option<usize>,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    severity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    message: &'a str,
    labels: Vec<JsonLabel<'a>>,
    notes: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'a str>,
}

/// One diagnostic as a single-line JSON object.
pub fn render(d: &Diagnostic) -> String {
    let source_map = d.source.as_deref().map(SourceMap::new);

    let labels = d
        .labels
        .iter()
        .map(|l| {
            let position = source_map.as_ref().map(|map| map.lookup(l.span.start));
            JsonLabel {
                start: l.span.start,
                end: l.span.end,
                message: &l.message,
                primary: l.is_primary,
                line: position.map(|(line, _)| line),
                col: position.map(|(_, col)| col),
            }
        })
        .collect();

    let json = JsonDiagnostic {
        severity: match d.severity {
            Severity::Error => "error",
        },
        code: d.code,
        message: &d.message,
        labels,
        notes: &d.notes,
        suggestion: d.suggestion.as_deref(),
    };

    serde_json::to_string(&json)
        .unwrap_or_else(|_| r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Span;

    fn parse_json(s: &str) -> serde_json::Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    #[test]
    fn render_basic_error() {
        let v = parse_json(&render(&Diagnostic::error("Stack underflow.")));
        assert_eq!(v["severity"], "error");
        assert_eq!(v["message"], "Stack underflow.");
        assert!(v["labels"].as_array().unwrap().is_empty());
        assert!(v.get("code").is_none());
    }

    #[test]
    fn render_code() {
        let d = Diagnostic::error("Division by zero.").with_code("LOX-R003");
        assert_eq!(parse_json(&render(&d))["code"], "LOX-R003");
    }

    #[test]
    fn render_with_span_and_source() {
        let d = Diagnostic::error("Expect end of expression.")
            .with_span(Span { start: 6, end: 7 }, "at '2'")
            .with_source("1 +\n1 2".to_string());
        let v = parse_json(&render(&d));
        let label = &v["labels"][0];
        assert_eq!(label["start"], 6);
        assert_eq!(label["end"], 7);
        assert_eq!(label["message"], "at '2'");
        assert_eq!(label["primary"], true);
        assert_eq!(label["line"], 2);
        assert_eq!(label["col"], 3);
    }

    #[test]
    fn render_label_without_source_no_line_col() {
        let d = Diagnostic::error("bad").with_span(Span { start: 5, end: 8 }, "here");
        let v = parse_json(&render(&d));
        let label = &v["labels"][0];
        assert!(label.get("line").is_none());
        assert!(label.get("col").is_none());
    }

    #[test]
    fn render_notes_and_suggestion() {
        let d = Diagnostic::error("bad")
            .with_note("[line 1] in script")
            .with_suggestion("close the group with ')'");
        let v = parse_json(&render(&d));
        assert_eq!(v["notes"][0], "[line 1] in script");
        assert_eq!(v["suggestion"], "close the group with ')'");
    }
}
