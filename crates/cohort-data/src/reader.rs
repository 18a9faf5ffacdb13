//! CSV customer loading.
//!
//! Reads `id,created` rows (after a header row) and turns them into
//! [`Customer`] values whose signup timestamps are normalized into the
//! target timezone. Malformed rows are reported, never skipped.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use cohort_core::error::{CohortError, Result};
use cohort_core::models::{Customer, CustomerId};
use cohort_core::time_utils::{TargetTimezone, TimezoneHandler};
use csv::StringRecord;
use tracing::debug;

const ID_COLUMN: usize = 0;
const CREATED_COLUMN: usize = 1;

// ── CustomersReader ───────────────────────────────────────────────────────────

/// Iterator over the customers of a CSV source, in file order.
pub struct CustomersReader<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    timezone: TimezoneHandler,
}

impl CustomersReader<File> {
    /// Open the customers file at `path`.
    pub fn open(path: &Path, timezone: TargetTimezone) -> Result<Self> {
        let file = File::open(path).map_err(|source| CohortError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Reading customers from {}", path.display());
        Ok(Self::from_reader(file, timezone))
    }
}

impl<R: Read> CustomersReader<R> {
    /// Wrap any byte source holding CSV text with a header row.
    pub fn from_reader(reader: R, timezone: TargetTimezone) -> Self {
        let records = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader)
            .into_records();
        Self {
            records,
            timezone: TimezoneHandler::with_target(timezone),
        }
    }

    fn parse_record(&self, record: &StringRecord) -> Result<Customer> {
        let line = record.position().map_or(0, |p| p.line());
        let malformed = |reason: String| CohortError::MalformedRow { line, reason };

        let raw_id = record
            .get(ID_COLUMN)
            .ok_or_else(|| malformed("missing customer id".to_string()))?;
        let id: CustomerId = raw_id
            .parse()
            .map_err(|_| malformed(format!("customer id {:?} is not an unsigned integer", raw_id)))?;

        let raw_created = record
            .get(CREATED_COLUMN)
            .ok_or_else(|| malformed("missing signup timestamp".to_string()))?;
        let created_at = self
            .timezone
            .parse_timestamp(raw_created)
            .map_err(|e| malformed(e.to_string()))?;

        Ok(Customer::new(id, created_at))
    }
}

impl<R: Read> Iterator for CustomersReader<R> {
    type Item = Result<Customer>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(
            record
                .map_err(CohortError::from)
                .and_then(|record| self.parse_record(&record)),
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
