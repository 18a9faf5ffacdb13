//! Data layer for cohort segment building.
//!
//! Reads customer CSV files, groups customers into weekly cohorts, keeps one
//! segment tree per cohort and turns the flattened trees into reports.

pub mod analysis;
pub mod builder;
pub mod reader;
pub mod report;
pub mod segment_tree;

#[cfg(test)]
mod fixtures;

pub use cohort_core as core;
