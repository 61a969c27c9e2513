// src/label/mod.rs
//! Split composite labels ("Erststimmen 2021 Anteil") into named parts.
//!
//! Templates are tried in order; the first one that matches the whole input
//! wins. An input no template matches is an error, never a silent
//! fall-through.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Template {
    name: String,
    regex: Regex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMatch {
    /// Name of the template that matched.
    pub pattern: String,
    /// Named capture groups that took part in the match.
    pub fields: BTreeMap<String, String>,
}

impl LabelMatch {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LabelParser {
    templates: Vec<Template>,
}

impl LabelParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a template. `pattern` is anchored at both ends; its named groups
    /// become the match fields.
    pub fn with_pattern(mut self, name: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| Error::Recipe(format!("label pattern {:?}: {}", name, e)))?;
        self.templates.push(Template {
            name: name.to_string(),
            regex,
        });
        Ok(self)
    }

    pub fn parse(&self, input: &str) -> Result<LabelMatch> {
        for template in &self.templates {
            if let Some(caps) = template.regex.captures(input) {
                let fields = template
                    .regex
                    .capture_names()
                    .flatten()
                    .filter_map(|n| caps.name(n).map(|m| (n.to_string(), m.as_str().to_string())))
                    .collect();
                return Ok(LabelMatch {
                    pattern: template.name.clone(),
                    fields,
                });
            }
        }
        Err(Error::NoMatch {
            input: input.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> LabelParser {
        LabelParser::new()
            .with_pattern("vote_year_measure", r"(?P<vote>[a-z]+)_(?P<year>\d{4})_(?P<measure>[a-z]+)")
            .unwrap()
            .with_pattern("vote_measure", r"(?P<vote>[a-z]+)_(?P<measure>[a-z]+)")
            .unwrap()
            .with_pattern("vote", r"(?P<vote>[a-z]+)")
            .unwrap()
    }

    #[test]
    fn first_matching_template_wins() {
        let m = parser().parse("erststimmen_2021_anzahl").unwrap();
        assert_eq!(m.pattern, "vote_year_measure");
        assert_eq!(m.get("year"), Some("2021"));

        let m = parser().parse("zweitstimmen_gultig").unwrap();
        assert_eq!(m.pattern, "vote_measure");
        assert_eq!(m.get("measure"), Some("gultig"));
        assert_eq!(m.get("year"), None);

        assert_eq!(parser().parse("gebiet").unwrap().pattern, "vote");
    }

    #[test]
    fn templates_are_anchored() {
        let err = parser().parse("Gebiet Nr. 1").unwrap_err();
        assert!(matches!(err, Error::NoMatch { ref input } if input == "Gebiet Nr. 1"));
    }

    #[test]
    fn empty_parser_matches_nothing() {
        assert!(matches!(
            LabelParser::new().parse("a"),
            Err(Error::NoMatch { .. })
        ));
    }

    #[test]
    fn bad_pattern_is_rejected() {
        assert!(LabelParser::new().with_pattern("broken", "(").is_err());
    }
}
