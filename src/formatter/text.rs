use std::io::Write;

use crate::analyzer::AnalyzeOutcome;
use crate::format::result_map::ResultFormatMap;
use crate::formatter::{resolve_value, Formatter};

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_to(&self, outcome: &AnalyzeOutcome, out: &mut dyn Write) {
        let templates = ResultFormatMap::default();
        for report in &outcome.reports {
            let path = report.path.display();
            for m in &report.matches {
                let line = templates.map_match(m).unwrap_or_default();
                let _ = writeln!(out, "{path}: {}", resolve_value(&line, &report.source));
                for item in &m.items {
                    let rendered = templates.map_item(item).unwrap_or_default();
                    let _ = writeln!(out, "  {}", resolve_value(&rendered, &report.source));
                }
            }
        }
        for (path, message) in &outcome.failures {
            let _ = writeln!(out, "{}: error: {message}", path.display());
        }

        let file_count = outcome.reports.len() + outcome.failures.len();
        let match_count = outcome.match_count();
        let file_word = if file_count == 1 { "file" } else { "files" };
        let match_word = if match_count == 1 { "match" } else { "matches" };
        let _ = writeln!(
            out,
            "\n{file_count} {file_word} inspected, {match_count} {match_word} detected"
        );
    }
}
