//! The reconciliation engine: job classification, result normalization,
//! history merging and the batch driver tying them together.

pub mod classifier;
pub mod ingest;
pub mod merger;
pub mod normalizer;
