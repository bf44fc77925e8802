use std::time::Instant;
use tracing::{debug, error};

use super::error::Result;

/// Runs `f`, logging failures with the operation name and elapsed time
/// before handing the error back.
pub fn timed<T>(operation: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let started = Instant::now();
    let outcome = f();
    let elapsed_ms = started.elapsed().as_millis();
    match &outcome {
        Ok(_) => debug!(operation, elapsed_ms, "completed"),
        Err(e) => error!(operation, elapsed_ms, error = %e, "failed"),
    }
    outcome
}

/// One-line preview of a statement for log messages.
#[must_use]
pub fn preview(statement: &str, max_chars: usize) -> String {
    let flat: String = statement
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let flat = flat.trim();
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut} ...")
    } else {
        flat.to_string()
    }
}
