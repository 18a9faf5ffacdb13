//! Builds one [`CohortTree`] per signup week from a stream of customers.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use cohort_core::error::Result;
use cohort_core::models::{CohortId, Customer, CustomerId};
use cohort_core::time_utils::calculate_week_id;
use serde::Serialize;
use tracing::{debug, info};

use crate::segment_tree::CohortTree;

/// Counters collected while building.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    /// Customer rows consumed from the source.
    pub customers_read: u64,
    /// Rows whose id was already present in their cohort.
    pub duplicates_skipped: u64,
    /// Distinct cohorts seen.
    pub cohorts: usize,
}

/// Consumes a customer source and groups ids into per-cohort trees.
///
/// The cohort map lives as long as the builder: it is filled by
/// [`build`](Self::build) and read afterwards through
/// [`cohorts`](Self::cohorts).
pub struct TreeBuilder<I, F = fn(NaiveDate) -> CohortId> {
    source: I,
    key_fn: F,
    cohorts: BTreeMap<CohortId, CohortTree>,
    summary: BuildSummary,
}

impl<I> TreeBuilder<I>
where
    I: Iterator<Item = Result<Customer>>,
{
    /// Builder keyed by signup week.
    pub fn new(source: I) -> Self {
        Self::with_key_fn(source, calculate_week_id)
    }
}

impl<I, F> TreeBuilder<I, F>
where
    I: Iterator<Item = Result<Customer>>,
    F: Fn(NaiveDate) -> CohortId,
{
    /// Builder with a custom date-to-cohort mapping.
    pub fn with_key_fn(source: I, key_fn: F) -> Self {
        Self {
            source,
            key_fn,
            cohorts: BTreeMap::new(),
            summary: BuildSummary::default(),
        }
    }

    /// Consume the whole source, then flatten every cohort.
    ///
    /// The first source error aborts the build and is returned unchanged.
    pub fn build(&mut self) -> Result<BuildSummary> {
        for row in self.source.by_ref() {
            let customer = row?;
            let cohort_id = (self.key_fn)(customer.signup_date());
            record(&mut self.cohorts, &mut self.summary, cohort_id, customer.id);
        }

        self.flatten();

        info!(
            "Built {} cohorts from {} customers ({} duplicates skipped)",
            self.summary.cohorts, self.summary.customers_read, self.summary.duplicates_skipped
        );
        Ok(self.summary.clone())
    }

    /// Insert one customer into its cohort's tree.
    pub fn add_customer(&mut self, customer: &Customer) {
        let cohort_id = (self.key_fn)(customer.signup_date());
        record(&mut self.cohorts, &mut self.summary, cohort_id, customer.id);
    }

    /// Rebuild the segment list of every cohort.
    pub fn flatten(&mut self) {
        for (cohort_id, tree) in self.cohorts.iter_mut() {
            tree.flatten();
            debug_assert!(
                tree.root_node
                    .as_ref()
                    .map_or(Ok(()), |root| root.check_invariants())
                    .is_ok(),
                "cohort {} violates tree invariants",
                cohort_id
            );
            debug!(
                "Cohort {}: {} segments covering {} customers",
                cohort_id,
                tree.segments.len(),
                tree.customer_count()
            );
        }
    }

    pub fn cohorts(&self) -> &BTreeMap<CohortId, CohortTree> {
        &self.cohorts
    }

    pub fn into_cohorts(self) -> BTreeMap<CohortId, CohortTree> {
        self.cohorts
    }

    pub fn summary(&self) -> &BuildSummary {
        &self.summary
    }
}

fn record(
    cohorts: &mut BTreeMap<CohortId, CohortTree>,
    summary: &mut BuildSummary,
    cohort_id: CohortId,
    id: CustomerId,
) {
    summary.customers_read += 1;
    let tree = cohorts.entry(cohort_id).or_insert_with(|| {
        debug!("New cohort {}", cohort_id);
        CohortTree::new()
    });
    if !tree.add_id(id) {
        summary.duplicates_skipped += 1;
        debug!("Customer {} already present in cohort {}", id, cohort_id);
    }
    summary.cohorts = cohorts.len();
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::reader::CustomersReader;
    use crate::segment_tree::SegmentTreeNode;
    use chrono::{Datelike, Duration, FixedOffset, TimeZone as _};
    use cohort_core::error::CohortError;
    use cohort_core::models::Segment;
    use cohort_core::time_utils::parse_timezone;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn builder_for(csv: &str) -> TreeBuilder<CustomersReader<&[u8]>> {
        let tz = parse_timezone("-0500").unwrap();
        TreeBuilder::new(CustomersReader::from_reader(csv.as_bytes(), tz))
    }

    fn built(csv: &str) -> BTreeMap<CohortId, CohortTree> {
        let mut builder = builder_for(csv);
        builder.build().unwrap();
        builder.into_cohorts()
    }

    fn customer(id: CustomerId, date: NaiveDate) -> Customer {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let created = offset
            .from_local_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
            .unwrap();
        Customer::new(id, created)
    }

    fn root(cohorts: &BTreeMap<CohortId, CohortTree>, cohort_id: CohortId) -> &SegmentTreeNode {
        cohorts[&cohort_id].root_node.as_ref().unwrap()
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn test_new_builder_has_no_cohorts() {
        let builder = builder_for(fixtures::ONE_ROW);
        assert!(builder.cohorts().is_empty());
        assert_eq!(builder.summary(), &BuildSummary::default());
    }

    // ── add_customer ──────────────────────────────────────────────────────────

    #[test]
    fn test_add_customer_builds_cohort_tree() {
        let date = NaiveDate::from_ymd_opt(2019, 12, 21).unwrap();
        let cohort_id = calculate_week_id(date);
        let mut builder = builder_for(fixtures::ONE_ROW);

        builder.add_customer(&customer(10, date));
        assert_eq!(root(builder.cohorts(), cohort_id), &SegmentTreeNode::new(10));

        builder.add_customer(&customer(11, date));
        assert_eq!(
            root(builder.cohorts(), cohort_id).subtree_range(),
            Segment::new(10, 11)
        );

        builder.add_customer(&customer(9, date));
        assert_eq!(
            root(builder.cohorts(), cohort_id).subtree_range(),
            Segment::new(9, 11)
        );

        builder.add_customer(&customer(13, date));
        let node = root(builder.cohorts(), cohort_id);
        assert_eq!(node.subtree_range(), Segment::new(9, 13));
        assert_eq!(node.subtree.len(), 1);

        builder.add_customer(&customer(7, date));
        let node = root(builder.cohorts(), cohort_id);
        assert_eq!(node.segment, Segment::single(7));
        assert_eq!(node.subtree_range(), Segment::new(7, 13));
        assert_eq!(node.subtree.len(), 2);

        assert_eq!(builder.cohorts().len(), 1);
        assert_eq!(builder.summary().customers_read, 5);
    }

    #[test]
    fn test_add_customer_counts_duplicates() {
        let date = NaiveDate::from_ymd_opt(2019, 12, 21).unwrap();
        let mut builder = builder_for(fixtures::ONE_ROW);
        builder.add_customer(&customer(10, date));
        builder.add_customer(&customer(10, date));
        assert_eq!(builder.summary().duplicates_skipped, 1);
        assert_eq!(builder.summary().customers_read, 2);
    }

    #[test]
    fn test_same_id_in_two_cohorts_is_not_a_duplicate() {
        let first = NaiveDate::from_ymd_opt(2019, 12, 21).unwrap();
        let second = first + Duration::days(14);
        let mut builder = builder_for(fixtures::ONE_ROW);
        builder.add_customer(&customer(10, first));
        builder.add_customer(&customer(10, second));
        assert_eq!(builder.summary().duplicates_skipped, 0);
        assert_eq!(builder.cohorts().len(), 2);
    }

    // ── build ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_build_first_row() {
        let cohorts = built(fixtures::ONE_ROW);
        assert_eq!(cohorts.len(), 1);
        assert_eq!(cohorts[&2321].segments, vec![Segment::single(35410)]);
    }

    #[test]
    fn test_build_reports_summary() {
        let mut builder = builder_for(fixtures::FIVE_ROWS);
        let summary = builder.build().unwrap();
        assert_eq!(
            summary,
            BuildSummary {
                customers_read: 5,
                duplicates_skipped: 0,
                cohorts: 1,
            }
        );
    }

    #[test]
    fn test_build_five_rows_one_cohort() {
        let cohorts = built(fixtures::FIVE_ROWS_ONE_COHORT);
        assert_eq!(cohorts.len(), 1);
        let tree = cohorts.values().next().unwrap();
        assert_eq!(tree.subtree_range(), Some(Segment::new(35410, 35414)));
        assert_eq!(tree.segments, vec![Segment::new(35410, 35414)]);
    }

    #[test]
    fn test_build_five_rows_two_cohorts() {
        let cohorts = built(fixtures::FIVE_ROWS_TWO_COHORTS);
        assert_eq!(cohorts.len(), 2);
        assert_eq!(root(&cohorts, 2321).subtree_range(), Segment::new(35410, 35411));
        assert_eq!(root(&cohorts, 2326).subtree_range(), Segment::new(35412, 35414));
        assert_eq!(cohorts[&2321].segments, vec![Segment::new(35410, 35411)]);
        assert_eq!(cohorts[&2326].segments, vec![Segment::new(35412, 35414)]);
    }

    #[test]
    fn test_build_five_rows_two_timezone_cohorts() {
        let cohorts = built(fixtures::FIVE_ROWS_TWO_TIMEZONE_COHORTS);
        assert_eq!(cohorts.len(), 2);
        assert_eq!(root(&cohorts, 2321).subtree_range(), Segment::new(35410, 35411));
        assert_eq!(root(&cohorts, 2322).subtree_range(), Segment::new(35412, 35414));
    }

    #[test]
    fn test_build_timezone_changes_cohort_assignment() {
        let tz = parse_timezone("-0800").unwrap();
        let reader =
            CustomersReader::from_reader(fixtures::FIVE_ROWS_TWO_TIMEZONE_COHORTS.as_bytes(), tz);
        let mut builder = TreeBuilder::new(reader);
        builder.build().unwrap();

        // At -08:00 the late rows fall back into Sunday.
        assert_eq!(builder.cohorts().len(), 1);
        assert_eq!(builder.cohorts()[&2321].segments, vec![Segment::new(35410, 35414)]);
    }

    #[test]
    fn test_build_five_rows_two_overlapping_cohorts() {
        let cohorts = built(fixtures::FIVE_ROWS_TWO_OVERLAPPING_COHORTS);
        assert_eq!(cohorts.len(), 2);

        let first = root(&cohorts, 2321);
        assert_eq!(first.subtree_range(), Segment::new(35410, 35413));
        assert_eq!(first.subtree.len(), 1);
        assert_eq!(first.subtree[0].subtree_range(), Segment::single(35413));

        let second = root(&cohorts, 2327);
        assert_eq!(second.subtree_range(), Segment::new(35411, 35414));
        assert_eq!(second.subtree.len(), 1);
        assert_eq!(second.subtree[0].subtree_range(), Segment::single(35414));

        assert_eq!(
            cohorts[&2327].segments,
            vec![Segment::new(35411, 35412), Segment::single(35414)]
        );
    }

    #[test]
    fn test_build_five_rows_one_merged_cohort() {
        let cohorts = built(fixtures::FIVE_ROWS_ONE_COHORT_MULTI_SEGMENTS);
        assert_eq!(cohorts.len(), 1);
        let node = root(&cohorts, 2321);
        assert_eq!(node.subtree_range(), Segment::new(35410, 35414));
        assert!(node.subtree.is_empty());
    }

    #[test]
    fn test_build_propagates_malformed_row() {
        let mut builder = builder_for(fixtures::BROKEN_ROW);
        let err = builder.build().unwrap_err();
        match err {
            CohortError::MalformedRow { line, .. } => assert_eq!(line, 4),
            other => panic!("expected malformed row, got {:?}", other),
        }
        assert_eq!(builder.summary().customers_read, 2);
    }

    #[test]
    fn test_build_with_custom_key_fn() {
        let tz = parse_timezone("-0500").unwrap();
        let reader = CustomersReader::from_reader(fixtures::FIVE_ROWS_TWO_COHORTS.as_bytes(), tz);
        let mut builder = TreeBuilder::with_key_fn(reader, |date: NaiveDate| {
            CohortId::from(date.year()) * 100 + CohortId::from(date.month())
        });
        builder.build().unwrap();

        let keys: Vec<CohortId> = builder.cohorts().keys().copied().collect();
        assert_eq!(keys, vec![201507, 201508]);
    }

    #[test]
    fn test_flatten_twice_keeps_segments() {
        let mut builder = builder_for(fixtures::FIVE_ROWS_TWO_OVERLAPPING_COHORTS);
        builder.build().unwrap();
        let before = builder.cohorts().clone();
        builder.flatten();
        assert_eq!(builder.cohorts(), &before);
    }

    // ── Full stream ───────────────────────────────────────────────────────────

    /// Near-sorted signups over many weeks: ids mostly increase with time,
    /// some rows arrive late and a share of ids never appears.
    fn synthetic_customers_csv() -> String {
        let mut csv = String::from("id,created\n");
        let start = chrono::Utc.with_ymd_and_hms(2015, 1, 5, 0, 0, 0).unwrap();
        let mut state: u64 = 17;
        for n in 0..3_000u64 {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let roll = state >> 33;
            if roll % 7 == 0 {
                continue;
            }
            let jitter = (roll % 5) as i64 * 600 - 1_200;
            let created = start + Duration::minutes(n as i64 * 40) + Duration::seconds(jitter);
            let id = if roll % 11 == 0 { n + 3 } else { n };
            csv.push_str(&format!("{},{}\n", 40_000 + id, created.format("%Y-%m-%d %H:%M:%S")));
        }
        csv
    }

    #[test]
    fn test_full_stream_trees_keep_invariants() {
        let cohorts = built(&synthetic_customers_csv());
        assert!(cohorts.len() > 5);
        for (cohort_id, tree) in &cohorts {
            let root = tree.root_node.as_ref().unwrap();
            root.check_invariants()
                .unwrap_or_else(|e| panic!("cohort {cohort_id}: {e}"));
            assert_eq!(root.subtree_range().low, root.segment.low);
        }
    }

    #[test]
    fn test_full_stream_segments_are_disjoint_and_cover_range() {
        let cohorts = built(&synthetic_customers_csv());
        for (cohort_id, tree) in &cohorts {
            let range = tree.subtree_range().unwrap();
            let first = tree.segments.first().unwrap();
            let last = tree.segments.last().unwrap();
            assert_eq!((first.low, last.high), (range.low, range.high), "cohort {cohort_id}");
            for pair in tree.segments.windows(2) {
                assert!(
                    pair[0].high + 1 < pair[1].low,
                    "cohort {cohort_id}: {:?} touches {:?}",
                    pair[0],
                    pair[1]
                );
            }
        }
    }
}
