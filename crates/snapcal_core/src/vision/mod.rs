//! Hosted vision-language model access.
//!
//! # Responsibility
//! - Define the single-call client contract used by ingestion.
//! - Provide the Gemini `generateContent` implementation.

pub mod client;
pub mod gemini;
