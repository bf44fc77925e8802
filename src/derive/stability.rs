//! Variable stability analysis.
//!
//! Per-period statistics (null rate, mean, approximate median) are compared
//! against the table-wide reference values. A period is flagged for a
//! variable when its statistic leaves the control band
//! `reference ± z · stderr`, with `n` the number of distinct periods:
//!
//! * null rate: `stderr = sqrt(p · (1 − p) / n)`
//! * mean and median: `stderr = sd / sqrt(n)`
//!
//! The flag tables are summed into `<table>_alerta` and read back into
//! three reports.

use std::fmt;

use tracing::{debug, info};

use super::{DerivedTables, normalize_columns};
use crate::core::{HelperError, QueryResult, Result, Row, Value};
use crate::params;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfidenceLevel {
    P90,
    P95,
    P99,
}

impl ConfidenceLevel {
    pub const ALL: [Self; 3] = [Self::P90, Self::P95, Self::P99];

    /// One-sided normal quantile used as the band width.
    #[must_use]
    pub const fn z(self) -> f64 {
        match self {
            Self::P90 => 1.2816,
            Self::P95 => 1.6449,
            Self::P99 => 2.3263,
        }
    }

    /// Suffix used in table names (`90`, `95`, `99`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::P90 => "90",
            Self::P95 => "95",
            Self::P99 => "99",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Standard error of a proportion `p` over `n` periods.
#[must_use]
pub fn proportion_stderr(p: f64, n: f64) -> f64 {
    (p * (1.0 - p) / n).sqrt()
}

/// Standard error of a mean with standard deviation `sd` over `n` periods.
#[must_use]
pub fn mean_stderr(sd: f64, n: f64) -> f64 {
    sd / n.sqrt()
}

/// Whether `observed` lies outside `reference ± z · stderr`.
#[must_use]
pub fn exceeds(observed: f64, reference: f64, z: f64, stderr: f64) -> bool {
    (observed - reference).abs() > z * stderr
}

/// Which columns of the table are analysed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableSelection {
    Include(Vec<String>),
    /// Every column except these and the grouping columns.
    Exclude(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StabilityReport {
    /// `tabla, periodo, variables`: flagged variables per table and period.
    pub by_period: QueryResult,
    /// `tabla, variable, periodos`: flagged periods per table and variable.
    pub by_variable: QueryResult,
    /// `variable, pmiss, min, p1, p10, p25, p50, p75, p90, p99, max`.
    pub summary: QueryResult,
}

/// Limit kinds, in the order their tables are built.
const LIMIT_KINDS: [&str; 2] = ["med", "av"];

pub const SUMMARY_COLUMNS: [&str; 11] =
    ["variable", "pmiss", "min", "p1", "p10", "p25", "p50", "p75", "p90", "p99", "max"];

/// Suffixes of the flag tables, in report order.
#[must_use]
pub fn alert_suffixes() -> Vec<String> {
    let completeness = ConfidenceLevel::ALL.iter().map(|c| format!("comp_{c}"));
    let limits = ConfidenceLevel::ALL
        .iter()
        .flat_map(|c| ["av", "med"].into_iter().map(move |kind| format!("lcm_{c}_{kind}")));
    completeness.chain(limits).collect()
}

fn is_flagged(value: &Value) -> bool {
    value.as_f64().is_some_and(|v| v != 0.0)
}

fn period_label(group: &[String], row: &Row, separator: &str) -> String {
    group
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let value = row.get(i).map(ToString::to_string).unwrap_or_default();
            format!("{g}{separator}{value}")
        })
        .collect::<Vec<_>>()
        .join(" , ")
}

/// Rows of the by-period report for one flag table.
///
/// `flags` holds the grouping columns followed by one 0/1 column per variable.
#[must_use]
pub fn alerts_by_period(table: &str, group: &[String], variables: &[String], flags: &QueryResult) -> Vec<Row> {
    flags
        .rows
        .iter()
        .filter_map(|row| {
            let flagged: Vec<&str> = variables
                .iter()
                .enumerate()
                .filter(|(j, _)| row.get(group.len() + j).is_some_and(is_flagged))
                .map(|(_, v)| v.as_str())
                .collect();
            (!flagged.is_empty()).then(|| {
                Row::new(vec![
                    Value::from(table),
                    Value::Text(period_label(group, row, ": ")),
                    Value::Text(flagged.join(" , ")),
                ])
            })
        })
        .collect()
}

/// Rows of the by-variable report for one flag table.
#[must_use]
pub fn alerts_by_variable(table: &str, group: &[String], variables: &[String], flags: &QueryResult) -> Vec<Row> {
    let periods: Vec<String> = flags.rows.iter().map(|row| period_label(group, row, "=")).collect();
    variables
        .iter()
        .enumerate()
        .filter_map(|(j, variable)| {
            let flagged: Vec<&str> = flags
                .rows
                .iter()
                .zip(&periods)
                .filter(|(row, _)| row.get(group.len() + j).is_some_and(is_flagged))
                .map(|(_, period)| period.as_str())
                .collect();
            (!flagged.is_empty()).then(|| {
                Row::new(vec![
                    Value::from(table),
                    Value::Text(variable.clone()),
                    Value::Text(flagged.join(" -- ")),
                ])
            })
        })
        .collect()
}

impl DerivedTables<'_> {
    /// Runs the full stability analysis of `table` by `group` periods.
    pub fn stability(
        &mut self,
        table: &str,
        group: &[&str],
        selection: &VariableSelection,
    ) -> Result<StabilityReport> {
        if group.is_empty() {
            return Err(HelperError::InvalidArgument("stability needs grouping columns".into()));
        }
        let group = normalize_columns(group)?;
        let variables = self.stability_variables(table, &group, selection)?;
        info!(table, variables = variables.len(), "variable stability analysis");

        let group_list = group.join(", ");
        for (template, suffix) in [
            ("stability_missing", "miss"),
            ("stability_average", "av"),
            ("stability_median", "med"),
        ] {
            let columns = self.render_each(&format!("{template}_column"), &variables, ", ", |v| {
                params! { "var" => v }
            })?;
            self.derive(
                &format!("{table}_{suffix}"),
                template,
                &params! { "table" => table, "group" => &group_list, "columns" => columns },
            )?;
        }

        let totals = self.render_each("stability_totals_column", &variables, ", ", |v| params! { "var" => v })?;
        self.derive(&format!("{table}_full"), "stability_totals", &params! { "table" => table, "columns" => totals })?;

        let periods = self.period_count(table, &group_list)?;
        debug!(table, periods, "distinct periods");

        for level in ConfidenceLevel::ALL {
            let z = level.z();
            let columns = self.render_each("stability_completeness_column", &variables, ", ", |v| {
                params! { "var" => v, "z" => z, "periods" => periods }
            })?;
            self.derive(
                &format!("{table}_comp_{level}"),
                "stability_completeness",
                &params! { "table" => table, "level" => level, "group" => &group_list, "columns" => columns },
            )?;

            for kind in LIMIT_KINDS {
                let columns = self.render_each("stability_limit_column", &variables, ", ", |v| {
                    params! { "kind" => kind, "periods" => periods, "var" => v, "z" => z }
                })?;
                self.derive(
                    &format!("{table}_lcm_{level}_{kind}"),
                    "stability_limit",
                    &params! {
                        "table" => table,
                        "level" => level,
                        "kind" => kind,
                        "group" => &group_list,
                        "columns" => columns,
                    },
                )?;
            }
        }

        let suffixes = alert_suffixes();
        let hits = variables.join(" + ");
        let sources = self.render_each("stability_alerts_source", &suffixes, " UNION ALL ", |s| {
            params! { "group" => &group_list, "suffix" => s, "hits" => &hits, "table" => table }
        })?;
        let columns = self.render_each("stability_alerts_column", &suffixes, ", ", |s| params! { "suffix" => s })?;
        self.derive(
            &format!("{table}_alerta"),
            "stability_alerts",
            &params! { "table" => table, "group" => &group_list, "columns" => columns, "sources" => sources },
        )?;

        let mut by_period = QueryResult::empty(vec!["tabla".into(), "periodo".into(), "variables".into()]);
        let mut by_variable = QueryResult::empty(vec!["tabla".into(), "variable".into(), "periodos".into()]);
        let vars = variables.join(", ");
        for suffix in &suffixes {
            let flag_table = format!("{table}_{suffix}");
            let statement = self.catalog.render(
                "stability_flags",
                &params! { "group" => &group_list, "vars" => &vars, "table" => &flag_table },
            )?;
            let flags = self.executor.query(&statement)?;
            for row in alerts_by_period(&flag_table, &group, &variables, &flags) {
                by_period.push(row)?;
            }
            for row in alerts_by_variable(&flag_table, &group, &variables, &flags) {
                by_variable.push(row)?;
            }
        }

        let summary = self.stability_summary(table, &variables)?;
        info!(
            table,
            alerts = by_period.len(),
            "variable stability analysis finished"
        );
        Ok(StabilityReport { by_period, by_variable, summary })
    }

    fn stability_variables(
        &mut self,
        table: &str,
        group: &[String],
        selection: &VariableSelection,
    ) -> Result<Vec<String>> {
        let variables = match selection {
            VariableSelection::Include(names) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                normalize_columns(&names)?
            }
            VariableSelection::Exclude(names) => {
                let excluded: Vec<String> = names.iter().map(|n| n.trim().to_lowercase()).collect();
                self.describe(table)?
                    .into_iter()
                    .map(|c| c.name.to_lowercase())
                    .filter(|name| !group.contains(name) && !excluded.contains(name))
                    .collect()
            }
        };
        if variables.is_empty() {
            return Err(HelperError::InvalidArgument(format!("no variables selected from {table}")));
        }
        Ok(variables)
    }

    fn period_count(&mut self, table: &str, group_list: &str) -> Result<u64> {
        let statement = self
            .catalog
            .render("stability_periods", &params! { "group" => group_list, "table" => table })?;
        let result = self.executor.query(&statement)?;
        let count = result
            .scalar()
            .and_then(Value::as_f64)
            .ok_or_else(|| HelperError::Parse(format!("period count of {table} is not a number")))?;
        if count < 1.0 {
            return Err(HelperError::InvalidArgument(format!("{table} has no periods")));
        }
        Ok(count as u64)
    }

    fn stability_summary(&mut self, table: &str, variables: &[String]) -> Result<QueryResult> {
        let mut summary = QueryResult::empty(SUMMARY_COLUMNS.iter().map(|c| (*c).to_string()).collect());
        for variable in variables {
            let statement = self
                .catalog
                .render("stability_summary", &params! { "var" => variable, "table" => table })?;
            let result = self.executor.query(&statement)?;
            let row = result
                .rows
                .into_iter()
                .next()
                .ok_or_else(|| HelperError::Parse(format!("no summary row for {variable}")))?;
            summary.push(row)?;
        }
        Ok(summary)
    }
}
