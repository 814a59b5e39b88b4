//! Grouped usage statistics.
//!
//! This module folds the deduplicated, classified readings into three
//! independent tables (by date, by station and by hour of day), each
//! carrying mean, sample standard deviation and standard error of the
//! usage percentage, and drives the end-to-end pipeline run.

pub mod aggregate;
pub mod analyzer;
pub mod calendar;
pub mod types;
pub mod utility;
