//! Maintainability index and technical-debt ratio.
//!
//! Maintainability model (version [`MI_MODEL_VERSION`]):
//!
//! ```text
//! raw = 171 - 0.23 * CC - 16.2 * ln(LOC) + 50 * sin(sqrt(2.4 * r))
//! MI  = clamp(raw * 100 / 171, 0, 100)
//! ```
//!
//! where `CC` is cyclomatic complexity, `LOC` code lines and `r` the share of
//! comment lines among code and comment lines. Empty bodies score 100.
//! The model has no Halstead volume term; Halstead counts are reported on
//! their own.

use crate::types::Symbol;

/// Version of the maintainability formula above.
pub const MI_MODEL_VERSION: u32 = 1;

pub fn maintainability_index(cyclomatic: u32, code_lines: u32, comment_lines: u32) -> f64 {
    if code_lines == 0 {
        return 100.0;
    }
    let ratio = comment_lines as f64 / (code_lines + comment_lines) as f64;
    let raw = 171.0 - 0.23 * cyclomatic as f64 - 16.2 * (code_lines as f64).ln()
        + 50.0 * (2.4 * ratio).sqrt().sin();
    (raw * 100.0 / 171.0).clamp(0.0, 100.0)
}

/// Share of symbols (module symbols excluded) above the complexity threshold.
pub fn technical_debt_ratio<'a>(symbols: impl IntoIterator<Item = &'a Symbol>, threshold: u32) -> f64 {
    let mut total = 0u32;
    let mut flagged = 0u32;
    for symbol in symbols {
        if symbol.is_file_module() {
            continue;
        }
        total += 1;
        if symbol.metrics.cyclomatic > threshold {
            flagged += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        flagged as f64 / total as f64
    }
}
