//! Term feeder: adapts externally tokenized terms to matcher lexemes.
//!
//! Where [`crate::lexer`] produces lexemes by scanning raw text, the
//! feeder serves callers that already have a typed term stream. Term type
//! names map case-insensitively to lexeme ids, and selected term values
//! specialize into symbol lexemes the same way lexer symbols do.

use std::collections::HashMap;

use crate::error::{PatternError, Result};
use crate::lexem::Lexem;
use crate::lexer::MAX_LEXEM_ID;

/// One externally tokenized input term.
#[derive(Debug, Clone, Copy)]
pub struct InputTerm<'a> {
    pub type_name: &'a str,
    pub value: &'a str,
    pub ordpos: u32,
    pub segment: u32,
    pub offset: usize,
    pub size: usize,
}

/// Construction side of the feeder.
#[derive(Debug, Default)]
pub struct TermFeederBuilder {
    types: HashMap<String, u32>,
    symbols: HashMap<(u32, String), u32>,
}

impl TermFeederBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a term type name (case-insensitive) to a lexeme id.
    pub fn define_lexem(&mut self, id: u32, type_name: &str) -> Result<()> {
        if id == 0 {
            return Err(PatternError::definition(
                "lexem id 0 is reserved for unmatched input",
            ));
        }
        if id >= MAX_LEXEM_ID {
            return Err(PatternError::Capacity("lexem id above ceiling"));
        }
        let key = type_name.to_lowercase();
        if self.types.insert(key, id).is_some() {
            return Err(PatternError::definition(format!(
                "duplicate term type definition '{type_name}'"
            )));
        }
        Ok(())
    }

    /// Declare a term value of the given lexeme as a distinct symbol id.
    pub fn define_symbol(&mut self, id: u32, lexem_id: u32, name: &str) -> Result<()> {
        if id == 0 || lexem_id == 0 {
            return Err(PatternError::definition(
                "symbol and lexem ids must be non-zero",
            ));
        }
        let key = (lexem_id, name.to_string());
        if self.symbols.insert(key, id).is_some() {
            return Err(PatternError::definition(format!(
                "duplicate symbol definition '{name}'"
            )));
        }
        Ok(())
    }

    /// Freeze the definitions.
    pub fn compile(self) -> TermFeeder {
        TermFeeder {
            types: self.types,
            symbols: self.symbols,
        }
    }
}

/// Immutable term-to-lexeme mapping.
#[derive(Debug)]
pub struct TermFeeder {
    types: HashMap<String, u32>,
    symbols: HashMap<(u32, String), u32>,
}

impl TermFeeder {
    /// Lexeme id for a term type name, or `None` for an undeclared type.
    pub fn get_lexem(&self, type_name: &str) -> Option<u32> {
        self.types.get(&type_name.to_lowercase()).copied()
    }

    /// All declared term type names.
    pub fn lexem_types(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    /// Symbol id for a term value under the given lexeme, if declared.
    pub fn get_symbol(&self, lexem_id: u32, name: &str) -> Option<u32> {
        self.symbols.get(&(lexem_id, name.to_string())).copied()
    }

    /// Map one input term to its lexemes. An undeclared type yields
    /// nothing; a declared type yields its generic lexeme, preceded by a
    /// symbol lexeme when the value is a declared symbol.
    pub fn feed(&self, term: InputTerm<'_>) -> Vec<Lexem> {
        let Some(lexem_id) = self.get_lexem(term.type_name) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(2);
        if let Some(symbol_id) = self.get_symbol(lexem_id, term.value) {
            out.push(Lexem::new(
                symbol_id,
                term.ordpos,
                term.segment,
                term.offset,
                term.size,
            ));
        }
        out.push(Lexem::new(
            lexem_id,
            term.ordpos,
            term.segment,
            term.offset,
            term.size,
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(type_name: &'static str, value: &'static str, ordpos: u32) -> InputTerm<'static> {
        InputTerm {
            type_name,
            value,
            ordpos,
            segment: 0,
            offset: 0,
            size: value.len(),
        }
    }

    #[test]
    fn type_lookup_is_case_insensitive() {
        let mut b = TermFeederBuilder::new();
        b.define_lexem(1, "Word").unwrap();
        let feeder = b.compile();
        assert_eq!(feeder.get_lexem("word"), Some(1));
        assert_eq!(feeder.get_lexem("WORD"), Some(1));
        assert_eq!(feeder.get_lexem("number"), None);
    }

    #[test]
    fn zero_ids_are_rejected() {
        let mut b = TermFeederBuilder::new();
        assert!(b.define_lexem(0, "word").is_err());
        b.define_lexem(1, "word").unwrap();
        assert!(b.define_symbol(0, 1, "if").is_err());
        assert!(b.define_symbol(100, 0, "if").is_err());
    }

    #[test]
    fn duplicate_definitions_are_rejected() {
        let mut b = TermFeederBuilder::new();
        b.define_lexem(1, "word").unwrap();
        assert!(b.define_lexem(2, "WORD").is_err());
        b.define_symbol(100, 1, "if").unwrap();
        assert!(b.define_symbol(101, 1, "if").is_err());
    }

    #[test]
    fn feed_declared_type() {
        let mut b = TermFeederBuilder::new();
        b.define_lexem(1, "word").unwrap();
        let feeder = b.compile();
        let out = feeder.feed(term("word", "tree", 4));
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].id, out[0].ordpos), (1, 4));
    }

    #[test]
    fn feed_symbol_precedes_generic() {
        let mut b = TermFeederBuilder::new();
        b.define_lexem(1, "word").unwrap();
        b.define_symbol(100, 1, "if").unwrap();
        let feeder = b.compile();
        let out = feeder.feed(term("word", "if", 2));
        let ids: Vec<u32> = out.iter().map(|lx| lx.id).collect();
        assert_eq!(ids, vec![100, 1]);
        assert!(out.iter().all(|lx| lx.ordpos == 2));
    }

    #[test]
    fn feed_undeclared_type_is_empty() {
        let feeder = TermFeederBuilder::new().compile();
        assert!(feeder.feed(term("word", "tree", 1)).is_empty());
    }

    #[test]
    fn symbols_are_value_sensitive() {
        let mut b = TermFeederBuilder::new();
        b.define_lexem(1, "word").unwrap();
        b.define_symbol(100, 1, "if").unwrap();
        let feeder = b.compile();
        assert_eq!(feeder.get_symbol(1, "if"), Some(100));
        assert_eq!(feeder.get_symbol(1, "If"), None);
        assert_eq!(feeder.get_symbol(2, "if"), None);
    }
}
