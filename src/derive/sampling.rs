use tracing::info;

use super::{DerivedTables, normalize_columns};
use crate::core::{HelperError, Result};
use crate::params;

fn check_fraction(fraction: f64) -> Result<()> {
    if fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(HelperError::InvalidArgument(format!(
            "sample fraction must be in (0, 1], got {fraction}"
        )))
    }
}

impl DerivedTables<'_> {
    /// Simple random sample into `<table>_muestra`. Returns the new table's name.
    pub fn sample(&mut self, table: &str, fraction: f64) -> Result<String> {
        check_fraction(fraction)?;
        info!(table, percent = fraction * 100.0, "simple random sample");
        let columns = self.describe(table)?;
        let names = columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ");

        let target = format!("{table}_muestra");
        self.derive(
            &target,
            "sample",
            &params! { "table" => table, "columns" => names, "fraction" => fraction },
        )?;
        Ok(target)
    }

    /// Samples `fraction` of every stratum into `<table>_muestra_est`.
    pub fn stratified_sample(&mut self, table: &str, strata: &[&str], fraction: f64) -> Result<String> {
        check_fraction(fraction)?;
        if strata.is_empty() {
            return Err(HelperError::InvalidArgument("stratified sample needs at least one stratum column".into()));
        }
        let strata = normalize_columns(strata)?;
        info!(table, ?strata, percent = fraction * 100.0, "stratified random sample");
        let columns = self.describe(table)?;
        let names = columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ");

        let target = format!("{table}_muestra_est");
        self.derive(
            &target,
            "stratified_sample",
            &params! {
                "table" => table,
                "columns" => names,
                "strata" => strata.join(", "),
                "fraction" => fraction,
            },
        )?;
        Ok(target)
    }
}
