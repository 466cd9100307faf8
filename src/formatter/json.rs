use std::io::Write;

use serde_json::json;

use crate::analyzer::AnalyzeOutcome;
use crate::formatter::{resolve_value, slice_span, Formatter};
use crate::matcher::{MatchItem, PatternMatch};

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_to(&self, outcome: &AnalyzeOutcome, out: &mut dyn Write) {
        let documents: Vec<serde_json::Value> = outcome
            .reports
            .iter()
            .map(|report| {
                json!({
                    "path": report.path.display().to_string(),
                    "matches": report.matches.iter()
                        .map(|m| match_json(m, &report.source))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        let failures: Vec<serde_json::Value> = outcome
            .failures
            .iter()
            .map(|(path, message)| {
                json!({
                    "path": path.display().to_string(),
                    "message": message,
                })
            })
            .collect();
        let output = json!({
            "metadata": {
                "files_inspected": outcome.reports.len() + outcome.failures.len(),
                "match_count": outcome.match_count(),
                "failure_count": outcome.failures.len(),
            },
            "documents": documents,
            "failures": failures,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                let _ = writeln!(out, "{text}");
            }
            Err(err) => {
                let _ = writeln!(out, "{{\"error\": \"{err}\"}}");
            }
        }
    }
}

fn match_json(m: &PatternMatch, source: &str) -> serde_json::Value {
    json!({
        "name": m.name,
        "value": m.value.as_deref().map(|v| resolve_value(v, source)),
        "start_ordpos": m.start_ordpos,
        "end_ordpos": m.end_ordpos,
        "start": m.start.offset,
        "end": m.end.offset,
        "text": slice_span(source, m.start, m.end),
        "items": m.items.iter().map(|item| item_json(item, source)).collect::<Vec<_>>(),
    })
}

fn item_json(item: &MatchItem, source: &str) -> serde_json::Value {
    json!({
        "name": item.name,
        "value": item.value.as_deref().map(|v| resolve_value(v, source)),
        "start_ordpos": item.start_ordpos,
        "end_ordpos": item.end_ordpos,
        "start": item.start.offset,
        "end": item.end.offset,
        "text": slice_span(source, item.start, item.end),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::tests::sample_outcome;

    fn render(outcome: &AnalyzeOutcome) -> serde_json::Value {
        let mut buf = Vec::new();
        JsonFormatter.format_to(outcome, &mut buf);
        serde_json::from_slice(&buf).unwrap()
    }

    #[test]
    fn output_is_valid_json_with_metadata() {
        let parsed = render(&sample_outcome());
        assert_eq!(parsed["metadata"]["files_inspected"], 2);
        assert_eq!(parsed["metadata"]["match_count"], 1);
        assert_eq!(parsed["metadata"]["failure_count"], 1);
    }

    #[test]
    fn match_fields_carry_resolved_text() {
        let parsed = render(&sample_outcome());
        let m = &parsed["documents"][0]["matches"][0];
        assert_eq!(m["name"], "travel");
        assert_eq!(m["text"], "to Dublin");
        assert_eq!(m["items"][0]["name"], "dest");
        assert_eq!(m["items"][0]["text"], "Dublin");
        assert!(m["items"][0]["value"].is_null());
    }

    #[test]
    fn empty_outcome_serializes() {
        let parsed = render(&AnalyzeOutcome::default());
        assert_eq!(parsed["documents"].as_array().unwrap().len(), 0);
        assert_eq!(parsed["metadata"]["match_count"], 0);
    }
}
