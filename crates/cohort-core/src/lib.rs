//! Shared types for cohort segment building.
//!
//! Customer and segment models, the error type, timezone handling and weekly
//! cohort keys, command-line settings and report formatting helpers.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{CohortError, Result};
