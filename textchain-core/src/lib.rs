//! Word-level Markov chain text generation library.
//!
//! This crate provides the chain-building and persistence engine:
//! - Lazy text sources (uploaded files, SQL query results) and their merging
//! - A growing token vocabulary and sliding-window transition counting
//! - Interchangeable in-memory and SQLite model stores
//! - Seeded, weighted sampling of new text from a compiled model
//! - An advisory-lock message stack for reporting progress to a caller

/// Chain-building core: encoder, transition table, models, generation.
pub mod model;

/// Named model storage backends.
pub mod store;

/// Training pipeline from sources to stored models.
pub mod train;

/// Lazy concatenation of text sources.
pub mod merger;

/// Text source providers.
pub mod source;

/// Raw chunk tokenization.
pub mod text;

/// SQL sanitization into parameterized statements.
pub mod sanitize;

/// Connection and training configuration.
pub mod config;

/// Progress message stack shared with the request layer.
pub mod request_stack;

pub mod error;

/// File helpers (snapshots, uploads).
///
/// Not exposed
pub(crate) mod io;

pub use error::{ChainError, Result};
