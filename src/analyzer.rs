//! Document analysis: scan text into lexemes, feed them to a match
//! context and collect pattern matches, over one source or many files in
//! parallel.

use std::fs;
use std::path::PathBuf;

use rayon::prelude::*;

use crate::error::Result;
use crate::matcher::PatternMatch;
use crate::rules::Program;

/// All matches of one document.
#[derive(Debug)]
pub struct DocumentReport {
    pub path: PathBuf,
    /// Kept for resolving source-span references in the output stage.
    pub source: String,
    pub matches: Vec<PatternMatch>,
}

/// Outcome of an analyzer run. Failed documents do not abort the run;
/// they are reported alongside the results.
#[derive(Debug, Default)]
pub struct AnalyzeOutcome {
    pub reports: Vec<DocumentReport>,
    pub failures: Vec<(PathBuf, String)>,
}

impl AnalyzeOutcome {
    pub fn match_count(&self) -> usize {
        self.reports.iter().map(|r| r.matches.len()).sum()
    }
}

/// Analyze one in-memory document as segment 0.
pub fn analyze_source(program: &Program, src: &str) -> Result<Vec<PatternMatch>> {
    let mut ctx = program.matcher.create_context();
    for lexem in program.lexer.scan(0, src) {
        ctx.put_input(lexem)?;
    }
    ctx.fetch_results()
}

/// Analyze the given files in parallel. Each file is read and matched
/// independently; a compiled [`Program`] is shared read-only across the
/// pool.
pub fn run_analyzer(program: &Program, files: &[PathBuf], debug: bool) -> AnalyzeOutcome {
    let wall_start = std::time::Instant::now();

    let per_file: Vec<std::result::Result<DocumentReport, (PathBuf, String)>> = files
        .par_iter()
        .map(|path| {
            let source = fs::read_to_string(path)
                .map_err(|err| (path.clone(), format!("failed to read: {err}")))?;
            let matches = analyze_source(program, &source)
                .map_err(|err| (path.clone(), err.to_string()))?;
            Ok(DocumentReport {
                path: path.clone(),
                source,
                matches,
            })
        })
        .collect();

    let mut outcome = AnalyzeOutcome::default();
    for result in per_file {
        match result {
            Ok(report) => outcome.reports.push(report),
            Err(failure) => outcome.failures.push(failure),
        }
    }

    if debug {
        eprintln!(
            "debug: analyzed {} files in {:.0?}, {} matches, {} failures",
            files.len(),
            wall_start.elapsed(),
            outcome.match_count(),
            outcome.failures.len()
        );
    }

    outcome
}
