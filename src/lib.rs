pub mod analyzer;
pub mod cli;
pub mod error;
pub mod feeder;
pub mod format;
pub mod formatter;
pub mod fs;
pub mod lexem;
pub mod lexer;
pub mod matcher;
pub mod rules;

use std::io::Read;

use anyhow::Result;

use analyzer::{run_analyzer, AnalyzeOutcome, DocumentReport};
use cli::Args;
use formatter::create_formatter;
use fs::discover_files;
use rules::load_rules;

/// Run the analyzer. Returns the exit code: 0 = clean run, 1 = some
/// documents failed, 2 = error.
pub fn run(args: Args) -> Result<i32> {
    let rules_start = std::time::Instant::now();
    let program = load_rules(&args.rules)?;
    if args.debug {
        eprintln!(
            "debug: rule file loaded in {:.0?}: {} lexer rules, {} patterns",
            rules_start.elapsed(),
            program.lexer.rule_count(),
            program.matcher.pattern_count()
        );
    }

    // --stdin: analyze a single document from standard input
    if let Some(ref display_path) = args.stdin {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        let matches = analyzer::analyze_source(&program, &source)
            .map_err(|err| anyhow::anyhow!("{}: {err}", display_path.display()))?;
        let outcome = AnalyzeOutcome {
            reports: vec![DocumentReport {
                path: display_path.clone(),
                source,
                matches,
            }],
            failures: Vec::new(),
        };
        create_formatter(&args.format).print(&outcome);
        return Ok(0);
    }

    let files = discover_files(&args.paths, &args.include, &args.exclude)?;
    if args.debug {
        eprintln!("debug: {} files to analyze", files.len());
    }

    let outcome = run_analyzer(&program, &files, args.debug);
    create_formatter(&args.format).print(&outcome);

    if outcome.failures.is_empty() {
        Ok(0)
    } else {
        Ok(1)
    }
}
