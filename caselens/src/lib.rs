//! Similar-case retrieval and evidence assembly for clinical imaging review.
//!
//! Studies are sampled into representative frames, anonymized under a
//! content-derived case id and indexed next to chunked guideline text. A
//! review embeds the report once, searches both collections, votes on the
//! neighbours' labels and hands the assembled evidence to a vision-capable
//! reasoning model.

pub mod anonymize;
pub mod config;
pub mod context;
pub mod dataset;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod frames;
pub mod llm;
pub mod models;
pub mod processing;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::CaseLensContext;
pub use error::{CaseLensError, Result};
