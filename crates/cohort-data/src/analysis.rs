//! Main analysis pipeline.
//!
//! Reads a customers file, builds one segment tree per weekly cohort and
//! returns an [`AnalysisResult`] ready for rendering.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use cohort_core::error::Result;
use cohort_core::models::{CohortId, Segment};
use cohort_core::time_utils::{week_start, TargetTimezone};
use serde::Serialize;
use tracing::info;

use crate::builder::{BuildSummary, TreeBuilder};
use crate::reader::CustomersReader;
use crate::segment_tree::CohortTree;

// ── Public types ──────────────────────────────────────────────────────────────

/// Flattened view of one cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortReport {
    pub cohort_id: CohortId,
    /// Monday that opens the cohort's week.
    pub week_start: NaiveDate,
    /// Number of distinct customer ids in the cohort.
    pub customers: u64,
    /// `[lowest, highest]` id of the cohort.
    pub subtree_range: Option<Segment>,
    pub segments: Vec<Segment>,
}

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this result was generated.
    pub generated_at: String,
    /// Where the customers came from.
    pub source: String,
    /// Timezone used to bucket signups.
    pub timezone: String,
    pub customers_read: u64,
    pub duplicates_skipped: u64,
    pub cohorts: usize,
    /// Total segments across all cohorts.
    pub segments: usize,
    /// Wall-clock seconds spent reading and building.
    pub build_time_seconds: f64,
}

/// The complete output of [`analyze_customers`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// Cohorts in ascending id order.
    pub cohorts: Vec<CohortReport>,
    pub metadata: AnalysisMetadata,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full pipeline over the customers file at `path`.
///
/// 1. Open the file and stream its rows through [`CustomersReader`].
/// 2. Build and flatten one tree per cohort with [`TreeBuilder`].
/// 3. Convert every tree into a [`CohortReport`].
pub fn analyze_customers(path: &Path, timezone: TargetTimezone) -> Result<AnalysisResult> {
    let reader = CustomersReader::open(path, timezone)?;
    analyze_reader(reader, &path.display().to_string(), timezone)
}

/// Same as [`analyze_customers`] for an already opened reader; `source` only
/// labels the metadata.
pub fn analyze_reader<R: Read>(
    reader: CustomersReader<R>,
    source: &str,
    timezone: TargetTimezone,
) -> Result<AnalysisResult> {
    let build_start = Instant::now();
    let mut builder = TreeBuilder::new(reader);
    let summary = builder.build()?;
    let build_time = build_start.elapsed().as_secs_f64();

    let cohorts = cohort_reports(builder.cohorts());
    let metadata = metadata_for(&summary, &cohorts, source, timezone, build_time);

    info!(
        "Analyzed {} customers into {} cohorts and {} segments",
        metadata.customers_read, metadata.cohorts, metadata.segments
    );

    Ok(AnalysisResult { cohorts, metadata })
}

/// One report per cohort, in ascending cohort order.
pub fn cohort_reports(cohorts: &BTreeMap<CohortId, CohortTree>) -> Vec<CohortReport> {
    cohorts
        .iter()
        .map(|(&cohort_id, tree)| CohortReport {
            cohort_id,
            week_start: week_start(cohort_id),
            customers: tree.customer_count(),
            subtree_range: tree.subtree_range(),
            segments: tree.segments.clone(),
        })
        .collect()
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn metadata_for(
    summary: &BuildSummary,
    cohorts: &[CohortReport],
    source: &str,
    timezone: TargetTimezone,
    build_time: f64,
) -> AnalysisMetadata {
    AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        source: source.to_string(),
        timezone: timezone.to_string(),
        customers_read: summary.customers_read,
        duplicates_skipped: summary.duplicates_skipped,
        cohorts: cohorts.len(),
        segments: cohorts.iter().map(|c| c.segments.len()).sum(),
        build_time_seconds: build_time,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
