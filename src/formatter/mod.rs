pub mod json;
pub mod text;

use std::io::Write;

use crate::analyzer::AnalyzeOutcome;
use crate::format::{FormatChunk, FormatChunks};
use crate::lexem::Address;

pub trait Formatter {
    fn format_to(&self, outcome: &AnalyzeOutcome, out: &mut dyn Write);

    fn print(&self, outcome: &AnalyzeOutcome) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        self.format_to(outcome, &mut lock);
    }
}

pub fn create_formatter(format: &str) -> Box<dyn Formatter> {
    match format {
        "json" => Box::new(json::JsonFormatter),
        // "text" and any unknown value
        _ => Box::new(text::TextFormatter),
    }
}

/// Splice encoded source-span references in a formatted value with the
/// referenced document text. File analysis runs single-segment, so only
/// offsets are consulted.
pub(crate) fn resolve_value(value: &str, source: &str) -> String {
    let mut out = String::new();
    for chunk in FormatChunks::new(value) {
        match chunk {
            FormatChunk::Text(text) => out.push_str(text),
            FormatChunk::Span { start, end } => out.push_str(slice_span(source, start, end)),
        }
    }
    out
}

/// Source text between two addresses; empty on out-of-range or
/// split-codepoint references.
pub(crate) fn slice_span(source: &str, start: Address, end: Address) -> &str {
    source.get(start.offset..end.offset).unwrap_or("")
}
