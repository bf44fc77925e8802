//! Named-placeholder statement templates.
//!
//! A template is SQL text with `{name}` placeholders; `{{` and `}}` stand for
//! literal braces. Rendering checks the supplied parameters against the
//! declared placeholders before anything is substituted, so a typo in a
//! parameter name fails loudly instead of producing broken SQL.

use std::collections::{BTreeMap, BTreeSet};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::char,
    combinator::{all_consuming, map},
    multi::many0,
    sequence::delimited,
    IResult,
};

use super::common::identifier;
use crate::core::{HelperError, Result};

/// Placeholder name → substituted text.
pub type Params = BTreeMap<String, String>;

/// Builds a [`Params`] map: `params! { "table" => name, "fraction" => 0.1 }`.
#[macro_export]
macro_rules! params {
    () => { $crate::parser::template::Params::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::parser::template::Params::new();
        $( map.insert(($key).to_string(), ($value).to_string()); )+
        map
    }};
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

fn segment(input: &str) -> IResult<&str, Segment> {
    alt((
        map(tag("{{"), |_| Segment::Literal("{".to_string())),
        map(tag("}}"), |_| Segment::Literal("}".to_string())),
        map(delimited(char('{'), identifier, char('}')), |name: &str| {
            Segment::Placeholder(name.to_string())
        }),
        map(take_till1(|c| c == '{' || c == '}'), |text: &str| {
            Segment::Literal(text.to_string())
        }),
    ))(input)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTemplate {
    source: String,
    segments: Vec<Segment>,
    placeholders: BTreeSet<String>,
}

impl StatementTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let (_, segments) = all_consuming(many0(segment))(source).map_err(|_| {
            HelperError::Template(format!("unbalanced braces in template: {source}"))
        })?;
        let placeholders = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect();
        Ok(Self {
            source: source.to_string(),
            segments,
            placeholders,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub const fn placeholders(&self) -> &BTreeSet<String> {
        &self.placeholders
    }

    pub fn render(&self, params: &Params) -> Result<String> {
        let missing: Vec<&str> = self
            .placeholders
            .iter()
            .filter(|p| !params.contains_key(*p))
            .map(String::as_str)
            .collect();
        let unknown: Vec<&str> = params
            .keys()
            .filter(|k| !self.placeholders.contains(*k))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() || !unknown.is_empty() {
            return Err(HelperError::Template(format!(
                "parameters do not match template (missing: {missing:?}, unknown: {unknown:?})"
            )));
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => out.push_str(&params[name]),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_placeholders() {
        let t = StatementTemplate::parse("DROP TABLE IF EXISTS {table} PURGE").unwrap();
        assert_eq!(t.placeholders().iter().collect::<Vec<_>>(), vec!["table"]);
    }

    #[test]
    fn test_render_substitutes_every_occurrence() {
        let t = StatementTemplate::parse("SELECT {group}, x FROM {table} GROUP BY {group}").unwrap();
        let sql = t.render(&params! { "group" => "periodo", "table" => "t" }).unwrap();
        assert_eq!(sql, "SELECT periodo, x FROM t GROUP BY periodo");
    }

    #[test]
    fn test_render_rejects_missing_and_unknown() {
        let t = StatementTemplate::parse("SELECT * FROM {table}").unwrap();
        assert!(matches!(t.render(&params! {}), Err(HelperError::Template(_))));
        let extra = params! { "table" => "t", "tabel" => "t" };
        assert!(matches!(t.render(&extra), Err(HelperError::Template(_))));
    }

    #[test]
    fn test_escaped_braces() {
        let t = StatementTemplate::parse("SELECT '{{x}}' FROM {t}").unwrap();
        assert_eq!(t.render(&params! { "t" => "tab" }).unwrap(), "SELECT '{x}' FROM tab");
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(StatementTemplate::parse("SELECT { FROM t").is_err());
        assert!(StatementTemplate::parse("SELECT } FROM t").is_err());
    }
}
