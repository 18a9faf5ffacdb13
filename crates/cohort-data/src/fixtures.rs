//! Customer CSV snippets shared by the unit tests.
//!
//! Timestamps are UTC unless they carry an offset. With a `-0500` target,
//! week 2321 opens on Monday 2015-06-29.

pub const ONE_ROW: &str = "\
id,created
35410,2015-07-03 22:01:11
";

pub const FIVE_ROWS: &str = "\
id,created
35410,2015-07-03 22:01:11
35411,2015-07-03 22:02:23
35412,2015-07-03 22:08:40
35413,2015-07-03 22:15:02
35414,2015-07-03 22:21:55
";

/// Same week, ids in a single run.
pub const FIVE_ROWS_ONE_COHORT: &str = FIVE_ROWS;

/// Weeks 2321 and 2326.
pub const FIVE_ROWS_TWO_COHORTS: &str = "\
id,created
35410,2015-07-03 22:01:11
35411,2015-07-03 22:02:23
35412,2015-08-04 14:08:40
35413,2015-08-04 15:15:02
35414,2015-08-05 09:21:55
";

/// Weeks 2321 and 2322; the last three rows only reach Monday once
/// normalized from -0700 to -0500.
pub const FIVE_ROWS_TWO_TIMEZONE_COHORTS: &str = "\
id,created
35410,2015-07-03 22:01:11
35411,2015-07-03 22:02:23
35412,2015-07-05 23:30:00-0700
35413,2015-07-05 23:41:12-0700
35414,2015-07-05 23:59:59-0700
";

/// Weeks 2321 and 2327 with interleaved ids.
pub const FIVE_ROWS_TWO_OVERLAPPING_COHORTS: &str = "\
id,created
35410,2015-07-03 22:01:11
35411,2015-08-11 10:02:23
35412,2015-08-11 10:08:40
35413,2015-07-03 22:15:02
35414,2015-08-12 11:21:55
";

/// One week, ids arriving out of order and merging into one run.
pub const FIVE_ROWS_ONE_COHORT_MULTI_SEGMENTS: &str = "\
id,created
35410,2015-07-03 22:01:11
35412,2015-07-03 22:02:23
35414,2015-07-03 22:08:40
35411,2015-07-03 22:15:02
35413,2015-07-03 22:21:55
";

/// Malformed id on the fourth line.
pub const BROKEN_ROW: &str = "\
id,created
35410,2015-07-03 22:01:11
35411,2015-07-03 22:02:23
oops,2015-07-03 22:08:40
35413,2015-07-03 22:15:02
";
