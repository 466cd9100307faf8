//! Output templates over whole pattern matches.
//!
//! While the parent module formats captured variables of a single match,
//! this one renders the match records themselves through a fixed set of
//! builtin variables: `ordpos`, `ordlen`, `ordend`, `startseg`,
//! `startpos`, `endseg`, `endpos`, `name` and `value`.

use super::{
    CapturedItem, FormatContext, FormatElement, ResultFormat, VarId, VariableMap,
};
use crate::error::{PatternError, Result};
use crate::lexem::Address;
use crate::matcher::{MatchItem, PatternMatch};

const BUILTIN_NAMES: [&str; 9] = [
    "ordpos", "ordlen", "ordend", "startseg", "startpos", "endseg", "endpos", "name", "value",
];

const ORDPOS: VarId = VarId(0);
const ORDLEN: VarId = VarId(1);
const ORDEND: VarId = VarId(2);
const STARTSEG: VarId = VarId(3);
const STARTPOS: VarId = VarId(4);
const ENDSEG: VarId = VarId(5);
const ENDPOS: VarId = VarId(6);
const NAME: VarId = VarId(7);
const VALUE: VarId = VarId(8);

fn builtin_vars() -> VariableMap {
    let mut vars = VariableMap::new();
    for name in BUILTIN_NAMES {
        // The namespace ceiling is far above nine entries.
        let _ = vars.get_or_create(name);
    }
    vars
}

/// Templates for rendering matches and their captured items as text.
#[derive(Debug)]
pub struct ResultFormatMap {
    vars: VariableMap,
    match_fmt: ResultFormat,
    item_fmt: ResultFormat,
}

impl ResultFormatMap {
    /// Compile match and item templates. Only the builtin variables are
    /// permitted; any other placeholder name is a definition error.
    pub fn new(match_src: &str, item_src: &str) -> Result<Self> {
        let mut vars = builtin_vars();
        let match_fmt = ResultFormat::parse(match_src, &mut vars)?;
        let item_fmt = ResultFormat::parse(item_src, &mut vars)?;
        if vars.len() > BUILTIN_NAMES.len() {
            let unknown: Vec<&str> = (BUILTIN_NAMES.len()..vars.len())
                .map(|idx| vars.name(VarId(idx as u32)))
                .collect();
            return Err(PatternError::definition(format!(
                "unknown result variables: {}",
                unknown.join(", ")
            )));
        }
        Ok(Self {
            vars,
            match_fmt,
            item_fmt,
        })
    }

    /// Render one match record.
    pub fn map_match(&self, m: &PatternMatch) -> Result<String> {
        self.render(
            &self.match_fmt,
            &m.name,
            m.value.as_deref(),
            m.start_ordpos,
            m.end_ordpos,
            m.start,
            m.end,
        )
    }

    /// Render one captured item of a match.
    pub fn map_item(&self, item: &MatchItem) -> Result<String> {
        self.render(
            &self.item_fmt,
            &item.name,
            item.value.as_deref(),
            item.start_ordpos,
            item.end_ordpos,
            item.start,
            item.end,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn render(
        &self,
        fmt: &ResultFormat,
        name: &str,
        value: Option<&str>,
        start_ordpos: u32,
        end_ordpos: u32,
        start: Address,
        end: Address,
    ) -> Result<String> {
        let ordpos = start_ordpos.to_string();
        let ordlen = (end_ordpos - start_ordpos).to_string();
        let ordend = end_ordpos.to_string();
        let startseg = start.segment.to_string();
        let startpos = start.offset.to_string();
        let endseg = end.segment.to_string();
        let endpos = end.offset.to_string();
        fn bind<'a>(var: VarId, value: Option<&'a str>, start: Address, end: Address) -> CapturedItem<'a> {
            CapturedItem {
                var,
                value,
                start,
                end,
            }
        }
        let items = [
            bind(ORDPOS, Some(&ordpos), start, end),
            bind(ORDLEN, Some(&ordlen), start, end),
            bind(ORDEND, Some(&ordend), start, end),
            bind(STARTSEG, Some(&startseg), start, end),
            bind(STARTPOS, Some(&startpos), start, end),
            bind(ENDSEG, Some(&endseg), start, end),
            bind(ENDPOS, Some(&endpos), start, end),
            bind(NAME, Some(name), start, end),
            // An absent value renders as an encoded source-span reference,
            // resolved against the document by the output stage.
            bind(VALUE, value, start, end),
        ];
        // Rendering charges no per-document budget.
        FormatContext::new(usize::MAX).map(fmt, &items)
    }
}

/// The stock templates used by the text output: one line per match, one
/// indented line per captured item.
impl Default for ResultFormatMap {
    fn default() -> Self {
        let var = |id: VarId| FormatElement::Variable {
            var: id,
            separator: " ".to_string(),
        };
        let lit = |text: &str| FormatElement::Literal(text.to_string());
        Self {
            vars: builtin_vars(),
            match_fmt: ResultFormat {
                elements: vec![
                    var(NAME),
                    lit(" ["),
                    var(ORDPOS),
                    lit(".."),
                    var(ORDEND),
                    lit("] "),
                    var(VALUE),
                ],
            },
            item_fmt: ResultFormat {
                elements: vec![var(NAME), lit("="), var(VALUE)],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatChunk;
    use crate::format::FormatChunks;

    fn sample_match(value: Option<&str>) -> PatternMatch {
        PatternMatch {
            name: "city".to_string(),
            value: value.map(str::to_string),
            start_ordpos: 3,
            end_ordpos: 5,
            start: Address::new(0, 10),
            end: Address::new(0, 24),
            items: Vec::new(),
        }
    }

    #[test]
    fn default_match_template() {
        let map = ResultFormatMap::default();
        let out = map.map_match(&sample_match(Some("Dublin"))).unwrap();
        assert_eq!(out, "city [3..5] Dublin");
    }

    #[test]
    fn absent_value_renders_span_reference() {
        let map = ResultFormatMap::default();
        let out = map.map_match(&sample_match(None)).unwrap();
        let chunks: Vec<FormatChunk<'_>> = FormatChunks::new(&out).collect();
        let expected = FormatChunk::Span {
            start: Address::new(0, 10),
            end: Address::new(0, 24),
        };
        assert!(chunks.contains(&expected), "{chunks:?}");
    }

    #[test]
    fn custom_templates() {
        let map = ResultFormatMap::new("{name}@{startseg}:{startpos}-{endpos}", "{name}").unwrap();
        let out = map.map_match(&sample_match(Some("x"))).unwrap();
        assert_eq!(out, "city@0:10-24");
    }

    #[test]
    fn item_template() {
        let map = ResultFormatMap::default();
        let item = MatchItem {
            name: "who".to_string(),
            value: Some("Ada".to_string()),
            start_ordpos: 1,
            end_ordpos: 2,
            start: Address::new(0, 0),
            end: Address::new(0, 3),
        };
        assert_eq!(map.map_item(&item).unwrap(), "who=Ada");
    }

    #[test]
    fn unknown_variable_is_rejected() {
        let err = ResultFormatMap::new("{nonsense}", "{name}").unwrap_err();
        assert!(err.to_string().contains("nonsense"), "{err}");
    }

    #[test]
    fn ordlen_is_derived() {
        let map = ResultFormatMap::new("{ordlen}", "").unwrap();
        assert_eq!(map.map_match(&sample_match(Some("v"))).unwrap(), "2");
    }
}
