use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a customer at signup.
pub type CustomerId = u64;

/// Integer key of a weekly signup cohort.
pub type CohortId = i64;

/// A single customer row read from the customers file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer identifier.
    pub id: CustomerId,
    /// Signup timestamp, already normalized to the target timezone.
    pub created_at: DateTime<FixedOffset>,
}

impl Customer {
    pub fn new(id: CustomerId, created_at: DateTime<FixedOffset>) -> Self {
        Self { id, created_at }
    }

    /// Calendar date of the signup in the customer's (normalized) timezone.
    pub fn signup_date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

/// Inclusive range of customer identifiers, `low <= high`.
///
/// Serialized as a two-element array `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(CustomerId, CustomerId)", into = "(CustomerId, CustomerId)")]
pub struct Segment {
    pub low: CustomerId,
    pub high: CustomerId,
}

impl Segment {
    pub fn new(low: CustomerId, high: CustomerId) -> Self {
        debug_assert!(low <= high, "segment bounds reversed: ({low}, {high})");
        Self { low, high }
    }

    /// Segment holding a single identifier.
    pub fn single(id: CustomerId) -> Self {
        Self { low: id, high: id }
    }

    pub fn contains(&self, id: CustomerId) -> bool {
        self.low <= id && id <= self.high
    }

    /// Number of identifiers covered by the segment.
    pub fn len(&self) -> u64 {
        self.high - self.low + 1
    }

    /// A segment always covers at least one identifier.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `id == low - 1`.
    pub fn is_left_adjacent(&self, id: CustomerId) -> bool {
        self.low.checked_sub(1) == Some(id)
    }

    /// `id == high + 1`.
    pub fn is_right_adjacent(&self, id: CustomerId) -> bool {
        self.high.checked_add(1) == Some(id)
    }

    /// `id < low - 1`: the identifier lies before the segment with at least
    /// one missing identifier in between.
    pub fn is_before_with_gap(&self, id: CustomerId) -> bool {
        self.low.checked_sub(1).is_some_and(|edge| id < edge)
    }

    /// `id > high + 1`.
    pub fn is_after_with_gap(&self, id: CustomerId) -> bool {
        self.high.checked_add(1).is_some_and(|edge| id > edge)
    }

    /// `self.high + 1 < next.low`: at least one identifier separates the two.
    pub fn has_gap_before(&self, next: &Segment) -> bool {
        self.high
            .checked_add(1)
            .is_some_and(|edge| edge < next.low)
    }
}

impl From<(CustomerId, CustomerId)> for Segment {
    fn from((low, high): (CustomerId, CustomerId)) -> Self {
        Self::new(low, high)
    }
}

impl From<Segment> for (CustomerId, CustomerId) {
    fn from(segment: Segment) -> Self {
        (segment.low, segment.high)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}-{}", self.low, self.high)
        }
    }
}
