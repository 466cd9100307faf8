//! Throughput benchmark over a synthetic corpus.
//!
//! Usage:
//!   cargo run --release --bin bench_patmatch            # default corpus
//!   cargo run --release --bin bench_patmatch -- --docs 2000 --words 800

use std::time::Instant;

use clap::Parser;

use patmatch::analyzer::analyze_source;
use patmatch::rules::{parse_rules, Program};

#[derive(Parser)]
#[command(about = "Benchmark patmatch scanning and matching on generated text.")]
struct Args {
    /// Number of synthetic documents
    #[arg(long, default_value_t = 500)]
    docs: usize,

    /// Words per document
    #[arg(long, default_value_t = 400)]
    words: usize,

    /// Timed repetitions (best run is reported)
    #[arg(long, default_value_t = 3)]
    runs: u32,
}

const RULES: &str = r#"
lexems:
  - name: word
    regex: "[A-Za-z]+"
  - name: number
    regex: "[0-9]+"
  - name: sent_delim
    regex: "[.!?]"
    posbind: succ
symbols:
  - name: kw_from
    lexem: word
    value: "from"
  - name: kw_to
    lexem: word
    value: "to"
patterns:
  - name: route
    format: "{orig}->{dest}"
    steps:
      - term: sent_delim
      - term: kw_from
      - term: word
      - variable: orig
      - expression:
          join: sequence_imm
          argc: 2
      - term: kw_to
      - term: word
      - variable: dest
      - expression:
          join: sequence_imm
          argc: 2
      - expression:
          join: sequence_struct
          argc: 3
          range: 12
  - name: amount
    steps:
      - term: number
      - term: word
      - expression:
          join: sequence_imm
          argc: 2
"#;

// Deterministic filler so runs are comparable.
const FILLER: &[&str] = &[
    "the", "quick", "brown", "fox", "jumps", "over", "a", "lazy", "dog", "while", "counting",
    "stars", "beside", "an", "old", "harbor",
];

fn generate_document(seed: usize, words: usize) -> String {
    let mut out = String::with_capacity(words * 6);
    for ii in 0..words {
        let kk = (seed + ii).wrapping_mul(2654435761) % 97;
        match kk {
            0 => out.push_str("from"),
            3 => out.push_str("to"),
            7 => {
                out.push_str(&(kk * seed % 10_000).to_string());
            }
            13 => {
                out.pop();
                out.push('.');
            }
            _ => out.push_str(FILLER[kk % FILLER.len()]),
        }
        out.push(' ');
    }
    out
}

fn format_time(seconds: f64) -> String {
    if seconds >= 1.0 {
        format!("{seconds:.2}s")
    } else {
        format!("{:.0}ms", seconds * 1000.0)
    }
}

fn run_corpus(program: &Program, corpus: &[String]) -> usize {
    let mut matches = 0;
    for doc in corpus {
        matches += analyze_source(program, doc)
            .expect("analysis failed on synthetic input")
            .len();
    }
    matches
}

fn main() {
    let args = Args::parse();
    let program = parse_rules(RULES).expect("benchmark rules must compile");

    eprintln!(
        "Generating corpus: {} documents x {} words...",
        args.docs, args.words
    );
    let corpus: Vec<String> = (0..args.docs)
        .map(|seed| generate_document(seed, args.words))
        .collect();
    let total_bytes: usize = corpus.iter().map(String::len).sum();

    let mut best = f64::MAX;
    let mut matches = 0;
    for run in 1..=args.runs {
        let start = Instant::now();
        matches = run_corpus(&program, &corpus);
        let elapsed = start.elapsed().as_secs_f64();
        eprintln!("run {run}: {} ({matches} matches)", format_time(elapsed));
        best = best.min(elapsed);
    }

    let mib = total_bytes as f64 / (1024.0 * 1024.0);
    println!(
        "{} documents, {:.1} MiB, {matches} matches: best {} ({:.1} MiB/s)",
        args.docs,
        mib,
        format_time(best),
        mib / best
    );
}
