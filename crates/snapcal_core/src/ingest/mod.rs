//! Meal photo ingestion.
//!
//! # Responsibility
//! - Decode model answers into meal items (`answer`).
//! - Orchestrate photo → model → store submissions (`pipeline`).

pub mod answer;
pub mod pipeline;
