//! Text and JSON rendering of an [`AnalysisResult`].

use std::fmt::Write as _;

use cohort_core::error::Result;
use cohort_core::formatting::{format_count, format_elapsed, format_segments, percentage};

use crate::analysis::AnalysisResult;

/// One line per cohort followed by a totals line.
///
/// ```text
/// 2015-06-29  cohort 2321  5 customers  35410-35414
/// 1 cohorts, 1 segments, 5 customers read (0 duplicates, 0%) in 1.2ms
/// ```
pub fn format_text(result: &AnalysisResult) -> String {
    let mut out = String::new();
    for cohort in &result.cohorts {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{}  cohort {}  {} customers  {}",
            cohort.week_start,
            cohort.cohort_id,
            format_count(cohort.customers),
            format_segments(&cohort.segments)
        );
    }

    let meta = &result.metadata;
    let duplicate_share = percentage(
        meta.duplicates_skipped as f64,
        meta.customers_read as f64,
        1,
    );
    let _ = writeln!(
        out,
        "{} cohorts, {} segments, {} customers read ({} duplicates, {}%) in {}",
        format_count(meta.cohorts as u64),
        format_count(meta.segments as u64),
        format_count(meta.customers_read),
        format_count(meta.duplicates_skipped),
        duplicate_share,
        format_elapsed(meta.build_time_seconds)
    );
    out
}

/// Pretty-printed JSON of the whole result.
pub fn format_json(result: &AnalysisResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
