//! Shared primitives: the data model, its JSON codec, configuration, errors
//! and output helpers.

pub mod codec;
pub mod config;
pub mod dataset;
pub mod error;
pub mod output;
pub mod time;
