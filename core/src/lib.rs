//! Two-tier suspicious activity review.
//!
//! Pipeline: `normalizer` → `rules` → `workflow` → `report`.
//! A [`workflow::WorkflowSession`] owns one loaded batch and every piece of
//! review state derived from it.

pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod normalizer;
pub mod report;
pub mod rules;
pub mod types;
pub mod workflow;
