//! Catalog of named statement templates.
//!
//! The built-in catalog ships inside the binary (`templates.json`); callers
//! can load their own file to adapt the SQL dialect without recompiling.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::core::{HelperError, Result};
use crate::parser::script::split_statements;
use crate::parser::template::{Params, StatementTemplate};

const BUILTIN_TEMPLATES: &str = include_str!("templates.json");

#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: HashMap<String, StatementTemplate>,
}

impl TemplateCatalog {
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_TEMPLATES)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(text)?;
        let templates = raw
            .into_iter()
            .map(|(name, source)| {
                StatementTemplate::parse(&source)
                    .map(|t| (name.clone(), t))
                    .map_err(|e| HelperError::Template(format!("template '{name}': {e}")))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { templates })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn get(&self, name: &str) -> Result<&StatementTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| HelperError::Template(format!("no template named '{name}'")))
    }

    pub fn render(&self, name: &str, params: &Params) -> Result<String> {
        self.get(name)?.render(params)
    }

    /// Renders a template that may hold several `;`-separated statements.
    pub fn statements(&self, name: &str, params: &Params) -> Result<Vec<String>> {
        Ok(split_statements(&self.render(name, params)?))
    }
}
