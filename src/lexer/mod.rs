//! Pattern lexer: regex rules over raw text segments.
//!
//! Rules are registered on a [`PatternLexerBuilder`] and frozen into a
//! [`PatternLexer`] by `compile()`. The compiled lexer is immutable and
//! safely shared across threads; `scan` is stateless per segment.
//!
//! Scanning collects leftmost candidates per rule, merges them, eliminates
//! lower-level candidates fully contained in higher-level ones, assigns
//! dense ordinal positions according to each rule's position bind, and
//! resolves literal symbol specializations.

mod scan;

use std::collections::HashMap;

use crate::error::{PatternError, Result};
use crate::lexem::{Lexem, PositionBind};

/// Ceiling for lexeme/symbol ids.
pub const MAX_LEXEM_ID: u32 = 1 << 20;

/// One compiled lexer rule.
#[derive(Debug)]
pub(crate) struct LexemRule {
    pub(crate) id: u32,
    pub(crate) level: u32,
    pub(crate) regex: RuleRegex,
    pub(crate) group: usize,
    pub(crate) posbind: PositionBind,
}

/// Rule regex, compiled with `regex` where possible and `fancy-regex`
/// where the pattern needs lookaround or backreferences.
#[derive(Debug)]
pub(crate) enum RuleRegex {
    Standard(regex::Regex),
    Fancy(Box<fancy_regex::Regex>),
}

impl RuleRegex {
    /// Leftmost match at or after `start`, reduced to the selected capture
    /// group. Returns absolute `(offset, len)`.
    pub(crate) fn find_group(&self, src: &str, start: usize, group: usize) -> Option<(usize, usize)> {
        match self {
            RuleRegex::Standard(re) => {
                let caps = re.captures_at(src, start)?;
                let m = caps.get(group)?;
                Some((m.start(), m.len()))
            }
            RuleRegex::Fancy(re) => {
                // Backtracking-limit errors count as "no match" for this rule.
                let caps = re.captures_from_pos(src, start).ok().flatten()?;
                let m = caps.get(group)?;
                Some((m.start(), m.end() - m.start()))
            }
        }
    }
}

fn compile_rule_regex(expression: &str, group: usize) -> Result<RuleRegex> {
    match regex::Regex::new(expression) {
        Ok(re) => {
            if group >= re.captures_len() {
                return Err(PatternError::definition(format!(
                    "regex '{expression}' has no capture group {group}"
                )));
            }
            Ok(RuleRegex::Standard(re))
        }
        Err(std_err) => match fancy_regex::Regex::new(expression) {
            Ok(re) => Ok(RuleRegex::Fancy(Box::new(re))),
            Err(_) => Err(PatternError::definition(format!(
                "malformed regex '{expression}': {std_err}"
            ))),
        },
    }
}

/// Construction-side of the lexer. Consumed by `compile()`; definition
/// calls after freezing are unrepresentable.
#[derive(Debug, Default)]
pub struct PatternLexerBuilder {
    rules: Vec<LexemRule>,
    names: HashMap<u32, String>,
    symbols: HashMap<u32, HashMap<String, u32>>,
}

impl PatternLexerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule: lexeme id, regex, capture group selector, relevance
    /// level (higher levels eliminate fully-contained lower-level matches)
    /// and position bind.
    pub fn define_lexem(
        &mut self,
        id: u32,
        expression: &str,
        result_index: usize,
        level: u32,
        posbind: PositionBind,
    ) -> Result<()> {
        if id == 0 {
            return Err(PatternError::definition("used 0 as lexem identifier"));
        }
        if id >= MAX_LEXEM_ID {
            return Err(PatternError::Capacity("lexem id above ceiling"));
        }
        let regex = compile_rule_regex(expression, result_index)?;
        self.rules.push(LexemRule {
            id,
            level,
            regex,
            group: result_index,
            posbind,
        });
        Ok(())
    }

    /// Attach a display name to a lexeme id (diagnostics, rule loader).
    pub fn define_lexem_name(&mut self, id: u32, name: &str) {
        self.names.insert(id, name.to_string());
    }

    /// Attach a secondary id to a literal string instance of a generic
    /// lexeme (dictionary-style specialization).
    pub fn define_symbol(&mut self, id: u32, lexemid: u32, name: &str) -> Result<()> {
        if id == 0 {
            return Err(PatternError::definition("used 0 as symbol identifier"));
        }
        if id >= MAX_LEXEM_ID {
            return Err(PatternError::Capacity("symbol id above ceiling"));
        }
        let table = self.symbols.entry(lexemid).or_default();
        if table.contains_key(name) {
            return Err(PatternError::definition(format!(
                "duplicate symbol '{name}' for lexem {lexemid}"
            )));
        }
        table.insert(name.to_string(), id);
        Ok(())
    }

    pub fn get_symbol(&self, lexemid: u32, name: &str) -> Option<u32> {
        self.symbols.get(&lexemid)?.get(name).copied()
    }

    /// Freeze the rule set.
    pub fn compile(self) -> PatternLexer {
        PatternLexer {
            rules: self.rules,
            names: self.names,
            symbols: self.symbols,
        }
    }
}

/// Compiled, immutable lexer.
#[derive(Debug)]
pub struct PatternLexer {
    rules: Vec<LexemRule>,
    names: HashMap<u32, String>,
    symbols: HashMap<u32, HashMap<String, u32>>,
}

impl PatternLexer {
    /// Turn one text segment into ordered, typed, positioned lexemes.
    pub fn scan(&self, segment: u32, src: &str) -> Vec<Lexem> {
        scan::scan_segment(&self.rules, &self.symbols, segment, src)
    }

    pub fn get_symbol(&self, lexemid: u32, name: &str) -> Option<u32> {
        self.symbols.get(&lexemid)?.get(name).copied()
    }

    pub fn get_lexem_name(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
