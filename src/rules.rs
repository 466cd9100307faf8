//! YAML rule files.
//!
//! A rule file declares the lexer side (`lexems`, `symbols`) and the
//! matcher side (`patterns`). Pattern bodies are written as a step list
//! in postfix order: operand steps push onto the construction stack and
//! an `expression` step combines them, mirroring the builder API
//! one-to-one. Loading produces a [`Program`] ready to run against
//! documents.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::lexem::PositionBind;
use crate::lexer::{PatternLexer, PatternLexerBuilder};
use crate::matcher::{JoinOperation, PatternMatcher, PatternMatcherBuilder};

/// A compiled rule file: the lexer and matcher halves of one pipeline.
#[derive(Debug)]
pub struct Program {
    pub lexer: PatternLexer,
    pub matcher: PatternMatcher,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default)]
    lexems: Vec<LexemDecl>,
    #[serde(default)]
    symbols: Vec<SymbolDecl>,
    #[serde(default)]
    patterns: Vec<PatternDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LexemDecl {
    name: String,
    regex: String,
    #[serde(default)]
    group: usize,
    #[serde(default)]
    level: u32,
    #[serde(default)]
    posbind: PosBindDecl,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PosBindDecl {
    #[default]
    Content,
    #[serde(alias = "succ")]
    Successor,
    #[serde(alias = "pred")]
    Predecessor,
    Unique,
}

impl From<PosBindDecl> for PositionBind {
    fn from(decl: PosBindDecl) -> PositionBind {
        match decl {
            PosBindDecl::Content => PositionBind::Content,
            PosBindDecl::Successor => PositionBind::Successor,
            PosBindDecl::Predecessor => PositionBind::Predecessor,
            PosBindDecl::Unique => PositionBind::Unique,
        }
    }
}

/// A named term value specializing a lexem. The symbol name lives in the
/// same namespace as lexem names and is referenced by `term` steps.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SymbolDecl {
    name: String,
    lexem: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatternDecl {
    name: String,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    format: Option<String>,
    #[serde(with = "serde_yml::with::singleton_map_recursive")]
    steps: Vec<Step>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Step {
    Term(String),
    Pattern(String),
    Variable(String),
    Expression(ExprStep),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExprStep {
    join: JoinDecl,
    argc: usize,
    #[serde(default)]
    range: u32,
    #[serde(default)]
    cardinality: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum JoinDecl {
    Sequence,
    SequenceImm,
    SequenceStruct,
    Within,
    WithinStruct,
    Any,
    And,
}

impl From<JoinDecl> for JoinOperation {
    fn from(decl: JoinDecl) -> JoinOperation {
        match decl {
            JoinDecl::Sequence => JoinOperation::Sequence,
            JoinDecl::SequenceImm => JoinOperation::SequenceImm,
            JoinDecl::SequenceStruct => JoinOperation::SequenceStruct,
            JoinDecl::Within => JoinOperation::Within,
            JoinDecl::WithinStruct => JoinOperation::WithinStruct,
            JoinDecl::Any => JoinOperation::Any,
            JoinDecl::And => JoinOperation::And,
        }
    }
}

/// Load and compile a rule file.
pub fn load_rules(path: &Path) -> Result<Program> {
    let src = fs::read_to_string(path)
        .with_context(|| format!("failed to read rule file {}", path.display()))?;
    parse_rules(&src).with_context(|| format!("invalid rule file {}", path.display()))
}

/// Compile rule-file source.
pub fn parse_rules(src: &str) -> Result<Program> {
    let file: RuleFile = serde_yml::from_str(src).context("failed to parse rule file")?;
    compile(file)
}

fn compile(file: RuleFile) -> Result<Program> {
    // Lexems and symbols share one dense id space starting at 1.
    let mut ids: HashMap<String, u32> = HashMap::new();
    let mut next_id = 1u32;
    let mut intern = |name: &str, ids: &mut HashMap<String, u32>| -> Result<u32> {
        if ids.contains_key(name) {
            bail!("duplicate name '{name}'");
        }
        let id = next_id;
        next_id += 1;
        ids.insert(name.to_string(), id);
        Ok(id)
    };

    let mut lexer = PatternLexerBuilder::new();
    for decl in &file.lexems {
        let id = intern(&decl.name, &mut ids)?;
        lexer
            .define_lexem(id, &decl.regex, decl.group, decl.level, decl.posbind.into())
            .with_context(|| format!("lexem '{}'", decl.name))?;
        lexer.define_lexem_name(id, &decl.name);
    }
    for decl in &file.symbols {
        let Some(&lexem_id) = ids.get(&decl.lexem) else {
            bail!("symbol '{}' refers to unknown lexem '{}'", decl.name, decl.lexem);
        };
        let id = intern(&decl.name, &mut ids)?;
        lexer
            .define_symbol(id, lexem_id, &decl.value)
            .with_context(|| format!("symbol '{}'", decl.name))?;
        lexer.define_lexem_name(id, &decl.name);
    }

    let mut matcher = PatternMatcherBuilder::new();
    for pattern in &file.patterns {
        for step in &pattern.steps {
            let outcome = match step {
                Step::Term(name) => {
                    let Some(&id) = ids.get(name) else {
                        bail!("pattern '{}' refers to unknown term '{name}'", pattern.name);
                    };
                    matcher.push_term(id)
                }
                Step::Pattern(name) => matcher.push_pattern(name),
                Step::Variable(name) => matcher.attach_variable(name),
                Step::Expression(expr) => matcher.push_expression(
                    expr.join.into(),
                    expr.argc,
                    expr.range,
                    expr.cardinality,
                ),
            };
            outcome.with_context(|| format!("pattern '{}'", pattern.name))?;
        }
        matcher
            .define_pattern(&pattern.name, pattern.format.as_deref(), pattern.visible)
            .with_context(|| format!("pattern '{}'", pattern.name))?;
    }

    Ok(Program {
        lexer: lexer.compile(),
        matcher: matcher.compile()?,
    })
}
