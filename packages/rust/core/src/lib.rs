//! Token list reconciliation and publishing.
//!
//! Reads the token registry, repairs and classifies its records, decides the
//! next semantic version against the published list, and publishes only when
//! something changed. [`pipeline::run_pipeline`] sequences the stages; every
//! external system sits behind a trait in [`sources`].

pub mod assembler;
pub mod badges;
pub mod decimals;
pub mod dedup;
pub mod logos;
pub mod pipeline;
pub mod publisher;
pub mod sources;
pub mod validation;
pub mod versioning;

#[cfg(test)]
pub(crate) mod testing;
