use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "patmatch", version, about = "A pattern matcher over text documents")]
pub struct Args {
    /// Files or directories to analyze
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Path to the rule file
    #[arg(short, long, value_name = "FILE")]
    pub rules: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Only analyze files matching these globs (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Skip files matching these globs (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Read the document from stdin, use PATH for display
    #[arg(long, value_name = "PATH")]
    pub stdin: Option<PathBuf>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["patmatch", "--rules", "rules.yml"]);
        assert_eq!(args.paths, vec![PathBuf::from(".")]);
        assert_eq!(args.format, "text");
        assert!(args.include.is_empty());
        assert!(!args.debug);
    }

    #[test]
    fn comma_separated_globs() {
        let args = Args::parse_from([
            "patmatch",
            "--rules",
            "rules.yml",
            "--include",
            "*.txt,*.md",
        ]);
        assert_eq!(args.include, vec!["*.txt".to_string(), "*.md".to_string()]);
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Args::try_parse_from(["patmatch", "--rules", "r.yml", "-f", "xml"]).is_err());
    }

    #[test]
    fn rules_flag_is_required() {
        assert!(Args::try_parse_from(["patmatch", "."]).is_err());
    }
}
