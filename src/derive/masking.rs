use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DerivedTables, normalize_columns};
use crate::core::{HelperError, Result};
use crate::params;

const TEXT_SALT_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TEXT_SALT_LENGTH: usize = 10;
const MAX_INT_SALT: u128 = 1_000_000;

/// Salts handed to the engine's masking functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskSalts {
    pub integer: i64,
    pub text: String,
}

impl MaskSalts {
    /// Fills in random salts where none were supplied.
    #[must_use]
    pub fn resolve(integer: Option<i64>, text: Option<String>) -> Self {
        let entropy = Uuid::new_v4().as_u128();
        let integer = integer.unwrap_or_else(|| {
            // bounded by MAX_INT_SALT, so the cast cannot truncate
            (entropy % (MAX_INT_SALT + 1)) as i64
        });
        let text = text.unwrap_or_else(|| {
            let mut bits = Uuid::new_v4().as_u128();
            (0..TEXT_SALT_LENGTH)
                .map(|_| {
                    let index = (bits % TEXT_SALT_ALPHABET.len() as u128) as usize;
                    bits /= TEXT_SALT_ALPHABET.len() as u128;
                    char::from(TEXT_SALT_ALPHABET[index])
                })
                .collect()
        });
        Self { integer, text }
    }
}

impl DerivedTables<'_> {
    /// Copies `table` into `<table>_mask` with the selected columns masked.
    ///
    /// Integer columns go through `mask_int` and text columns through
    /// `mask_text`; other types cannot be masked and are copied unchanged.
    pub fn mask(&mut self, table: &str, variables: &[&str], salts: MaskSalts) -> Result<MaskSalts> {
        if variables.is_empty() {
            return Err(HelperError::InvalidArgument("masking needs at least one column".into()));
        }
        let variables = normalize_columns(variables)?;
        info!(table, ?variables, "masking columns");
        info!(integer_salt = salts.integer, text_salt = %salts.text, "masking salts");

        let mut fields = Vec::new();
        for column in self.describe(table)? {
            if !variables.contains(&column.name.to_lowercase()) {
                fields.push(column.name);
                continue;
            }
            let field = if column.column_type.is_integral() {
                self.catalog
                    .render("mask_int", &params! { "column" => &column.name, "salt" => salts.integer })?
            } else if column.column_type.is_textual() {
                self.catalog
                    .render("mask_text", &params! { "column" => &column.name, "salt" => &salts.text })?
            } else {
                warn!(column = %column.name, column_type = ?column.column_type, "column cannot be masked, copied as is");
                column.name
            };
            fields.push(field);
        }

        self.derive(
            &format!("{table}_mask"),
            "mask",
            &params! { "table" => table, "columns" => fields.join(", ") },
        )?;
        Ok(salts)
    }
}

impl DerivedTables<'_> {
    /// Masks through one truth table per column, `<column>_<table>_truth`,
    /// pairing each distinct value with a replacement no longer than it.
    ///
    /// With `reuse_from`, columns that already have a truth table built for
    /// that table keep its pairs, so tables masked from the same source stay
    /// joinable. Returns the truth tables the masked copy was joined with.
    pub fn mask_keeping_length(
        &mut self,
        table: &str,
        variables: &[&str],
        salts: &MaskSalts,
        reuse_from: Option<&str>,
    ) -> Result<Vec<String>> {
        if variables.is_empty() {
            return Err(HelperError::InvalidArgument("masking needs at least one column".into()));
        }
        let variables = normalize_columns(variables)?;
        info!(table, ?variables, reuse_from, "masking columns through truth tables");

        let described = self.describe(table)?;
        let mut truths: Vec<(String, String)> = Vec::new();
        for column in &described {
            let name = column.name.to_lowercase();
            if !variables.contains(&name) {
                continue;
            }
            let template = if column.column_type.is_integral() {
                "mask_truth_int"
            } else if column.column_type.is_textual() {
                "mask_truth_text"
            } else {
                warn!(column = %column.name, column_type = ?column.column_type, "column cannot be masked, copied as is");
                continue;
            };

            if let Some(source) = reuse_from {
                let kept = format!("{name}_{source}_truth");
                if self.table_exists(&kept)? {
                    debug!(column = %name, truth = %kept, "reusing truth table");
                    truths.push((name, kept));
                    continue;
                }
            }
            let truth = format!("{name}_{table}_truth");
            let salt = if template == "mask_truth_int" { salts.integer.to_string() } else { salts.text.clone() };
            self.derive(
                &truth,
                template,
                &params! { "truth" => &truth, "column" => &name, "salt" => salt, "table" => table },
            )?;
            truths.push((name, truth));
        }
        if truths.is_empty() {
            return Err(HelperError::InvalidArgument(format!("no maskable column among {variables:?}")));
        }

        let mut fields = Vec::with_capacity(described.len());
        for column in &described {
            let name = column.name.to_lowercase();
            match truths.iter().position(|(c, _)| *c == name) {
                Some(index) => fields.push(
                    self.catalog
                        .render("mask_truth_field", &params! { "index" => index, "column" => &name })?,
                ),
                None => fields.push(format!("x.{}", column.name)),
            }
        }
        let joins = truths
            .iter()
            .enumerate()
            .map(|(index, (column, truth))| {
                self.catalog.render(
                    "mask_truth_join",
                    &params! { "truth" => truth, "index" => index, "column" => column },
                )
            })
            .collect::<Result<Vec<_>>>()?;

        self.derive(
            &format!("{table}_mask"),
            "mask_truth",
            &params! { "table" => table, "columns" => fields.join(", "), "joins" => joins.join(" ") },
        )?;
        Ok(truths.into_iter().map(|(_, truth)| truth).collect())
    }

    fn table_exists(&mut self, table: &str) -> Result<bool> {
        let statement = self.catalog.render("table_exists", &params! { "table" => table })?;
        Ok(!self.executor.query(&statement)?.rows.is_empty())
    }
}
