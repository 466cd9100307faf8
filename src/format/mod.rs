//! Result format strings.
//!
//! Compiles templates containing literal text and `{name}` /
//! `{name|separator}` placeholders, and applies them against captured
//! items. Items captured without a formatted value print as an encoded
//! source-span reference that [`FormatChunks`] can decode again, so a
//! downstream markup stage can splice original document text into the
//! produced values.

pub mod result_map;

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::error::{PatternError, Result};
use crate::lexem::Address;

/// Ceiling for the variable-name namespace.
pub const MAX_VARIABLES: usize = 1 << 20;

/// Interned variable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub(crate) u32);

/// Intern table for variable names. Format elements and captured items
/// reference variables by `VarId` so repeated bindings compare cheaply.
#[derive(Debug, Default)]
pub struct VariableMap {
    names: Vec<String>,
    index: HashMap<String, VarId>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<VarId> {
        self.index.get(name).copied()
    }

    pub fn get_or_create(&mut self, name: &str) -> Result<VarId> {
        if let Some(id) = self.index.get(name) {
            return Ok(*id);
        }
        if self.names.len() >= MAX_VARIABLES {
            return Err(PatternError::Capacity("too many variables"));
        }
        let id = VarId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn name(&self, id: VarId) -> &str {
        &self.names[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FormatElement {
    Literal(String),
    Variable { var: VarId, separator: String },
}

/// A compiled format string: a sequence of literal and variable chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultFormat {
    elements: Vec<FormatElement>,
}

impl ResultFormat {
    /// Compile a template. Placeholders are `{name}` or `{name|separator}`;
    /// the escapes `\{`, `\}`, `\\`, `\n`, `\t`, `\r`, `\b` are recognized
    /// in literal text. Variable names are interned into `vars` on sight.
    ///
    /// Fails on unmatched braces, a trailing backslash, or an empty or
    /// malformed variable name.
    pub fn parse(src: &str, vars: &mut VariableMap) -> Result<ResultFormat> {
        let mut elements = Vec::new();
        let mut literal = String::new();
        let mut chars = src.chars();

        while let Some(ch) = chars.next() {
            match ch {
                '\\' => {
                    let esc = chars.next().ok_or_else(|| {
                        PatternError::definition("unexpected end of format string after '\\'")
                    })?;
                    literal.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        'b' => '\u{8}',
                        other => other,
                    });
                }
                '}' => {
                    return Err(PatternError::definition(format!(
                        "unmatched '}}' in format string '{src}'"
                    )));
                }
                '{' => {
                    if !literal.is_empty() {
                        elements.push(FormatElement::Literal(std::mem::take(&mut literal)));
                    }
                    let (name, separator) = parse_variable(&mut chars, src)?;
                    let var = vars.get_or_create(&name)?;
                    elements.push(FormatElement::Variable { var, separator });
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            elements.push(FormatElement::Literal(literal));
        }
        Ok(ResultFormat { elements })
    }

    /// An empty format produces the constant empty string.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Parse the body of a `{name}` / `{name|separator}` placeholder, with the
/// opening brace already consumed.
fn parse_variable(chars: &mut std::str::Chars<'_>, src: &str) -> Result<(String, String)> {
    let mut name = String::new();
    let mut separator = String::new();
    let mut in_separator = false;
    for ch in chars.by_ref() {
        match ch {
            '}' => {
                if name.is_empty() {
                    return Err(PatternError::definition(format!(
                        "empty variable name in format string '{src}'"
                    )));
                }
                if !in_separator || separator.is_empty() {
                    // The default separator for repeated bindings is a blank.
                    separator = " ".to_string();
                }
                return Ok((name, separator));
            }
            '|' if !in_separator => in_separator = true,
            '{' | '\\' => {
                return Err(PatternError::definition(format!(
                    "malformed variable reference in format string '{src}'"
                )));
            }
            other if in_separator => separator.push(other),
            other => name.push(other),
        }
    }
    Err(PatternError::definition(format!(
        "unmatched '{{' in format string '{src}'"
    )))
}

/// One captured item as seen by the formatter: a variable binding with
/// either an already-formatted value or a raw source span.
#[derive(Debug, Clone, Copy)]
pub struct CapturedItem<'a> {
    pub var: VarId,
    pub value: Option<&'a str>,
    pub start: Address,
    pub end: Address,
}

/// Per-document formatting state: meters the total bytes of produced
/// values against a budget so one degenerate document cannot exhaust the
/// process. Exhaustion yields `OutOfMemory` and abandons only that document.
#[derive(Debug)]
pub struct FormatContext {
    budget: usize,
    used: usize,
}

impl FormatContext {
    pub fn new(budget: usize) -> Self {
        Self { budget, used: 0 }
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Apply a compiled format against a set of captured items.
    ///
    /// Repeated bindings of the same variable are joined with the element's
    /// separator. Items without a value print as encoded span references.
    /// The buffer grows amortized; there is no two-pass length computation.
    pub fn map(&mut self, fmt: &ResultFormat, items: &[CapturedItem<'_>]) -> Result<String> {
        if fmt.is_empty() {
            return Ok(String::new());
        }
        let mut out = String::new();
        for element in &fmt.elements {
            match element {
                FormatElement::Literal(text) => out.push_str(text),
                FormatElement::Variable { var, separator } => {
                    let mut bound = 0;
                    for item in items.iter().filter(|item| item.var == *var) {
                        if bound > 0 {
                            out.push_str(separator);
                        }
                        match item.value {
                            Some(value) => out.push_str(value),
                            None => encode_span_ref(&mut out, item.start, item.end),
                        }
                        bound += 1;
                    }
                }
            }
        }
        self.used += out.len();
        if self.used > self.budget {
            return Err(PatternError::OutOfMemory("formatted value budget exhausted"));
        }
        Ok(out)
    }
}

/// Marker introducing a same-segment span reference.
const REF_SAME_SEG: char = '\u{1}';
/// Marker introducing a cross-segment span reference.
const REF_CROSS_SEG: char = '\u{2}';

/// Append an encoded source-span reference: `\u{1}seg off len\u{1}` for a
/// same-segment span, `\u{2}sseg soff eseg eoff\u{2}` otherwise.
pub fn encode_span_ref(out: &mut String, start: Address, end: Address) {
    if start.segment == end.segment && end.offset > start.offset {
        let _ = write!(
            out,
            "{REF_SAME_SEG}{} {} {}{REF_SAME_SEG}",
            start.segment,
            start.offset,
            end.offset - start.offset
        );
    } else {
        let _ = write!(
            out,
            "{REF_CROSS_SEG}{} {} {} {}{REF_CROSS_SEG}",
            start.segment, start.offset, end.segment, end.offset
        );
    }
}

/// One decoded chunk of a formatted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatChunk<'a> {
    /// Printable text between span references.
    Text(&'a str),
    /// A reference into the original source.
    Span { start: Address, end: Address },
}

/// Iterator decoding a formatted value into text and span-reference chunks.
#[derive(Debug, Clone)]
pub struct FormatChunks<'a> {
    rest: &'a str,
}

impl<'a> FormatChunks<'a> {
    pub fn new(value: &'a str) -> Self {
        Self { rest: value }
    }
}

impl<'a> Iterator for FormatChunks<'a> {
    type Item = FormatChunk<'a>;

    fn next(&mut self) -> Option<FormatChunk<'a>> {
        let marker = self.rest.chars().next()?;
        if marker == REF_SAME_SEG || marker == REF_CROSS_SEG {
            let body = &self.rest[1..];
            if let Some(close) = body.find(marker) {
                let fields: Vec<&str> = body[..close].split(' ').collect();
                let span = decode_span(marker, &fields);
                if let Some(span) = span {
                    self.rest = &body[close + 1..];
                    return Some(span);
                }
            }
            // Malformed reference: surface the remainder as text.
            let text = self.rest;
            self.rest = "";
            return Some(FormatChunk::Text(text));
        }
        let end = self
            .rest
            .find([REF_SAME_SEG, REF_CROSS_SEG])
            .unwrap_or(self.rest.len());
        let text = &self.rest[..end];
        self.rest = &self.rest[end..];
        Some(FormatChunk::Text(text))
    }
}

fn decode_span(marker: char, fields: &[&str]) -> Option<FormatChunk<'static>> {
    if marker == REF_SAME_SEG {
        if let [seg, off, len] = fields {
            let seg: u32 = seg.parse().ok()?;
            let off: usize = off.parse().ok()?;
            let len: usize = len.parse().ok()?;
            return Some(FormatChunk::Span {
                start: Address::new(seg, off),
                end: Address::new(seg, off + len),
            });
        }
        return None;
    }
    if let [sseg, soff, eseg, eoff] = fields {
        let sseg: u32 = sseg.parse().ok()?;
        let soff: usize = soff.parse().ok()?;
        let eseg: u32 = eseg.parse().ok()?;
        let eoff: usize = eoff.parse().ok()?;
        return Some(FormatChunk::Span {
            start: Address::new(sseg, soff),
            end: Address::new(eseg, eoff),
        });
    }
    None
}
