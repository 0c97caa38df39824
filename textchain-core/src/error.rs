//! Error type shared by every component of the crate.

use thiserror::Error;

use crate::model::Code;

/// Errors raised while training, storing, or sampling a chain.
///
/// Lookup and validation errors (`UnknownToken`, `UnknownCode`,
/// `UnknownSeedState`, `Configuration`) mean the caller broke a contract and
/// are never retried. `Storage` errors are surfaced as-is; retry policy
/// belongs to the caller.
#[derive(Debug, Error)]
pub enum ChainError {
	/// The token has no code assigned by the encoder.
	#[error("unknown token: {0:?}")]
	UnknownToken(String),

	/// The code was never assigned by the encoder.
	#[error("unknown code: {0}")]
	UnknownCode(Code),

	/// Generation was asked to start from a state the model never saw.
	#[error("unknown seed state: {0:?}")]
	UnknownSeedState(Vec<Code>),

	/// `pop` on an empty request stack.
	#[error("request stack is empty")]
	EmptyStack,

	/// Missing or invalid connection/training parameters.
	#[error("configuration error: {0}")]
	Configuration(String),

	/// Connectivity or write failure in the persistent backend.
	#[error("storage error: {0}")]
	Storage(#[from] rusqlite::Error),

	/// Persisted rows that break the schema invariants.
	#[error("corrupt store: {0}")]
	CorruptStore(String),

	/// No model is stored under this name.
	#[error("model not found: {0}")]
	NotFound(String),

	/// Two models with different window sizes cannot be merged.
	#[error("state size mismatch: expected {expected}, got {actual}")]
	StateSizeMismatch { expected: usize, actual: usize },

	/// A text source failed while being read.
	#[error("text source failed: {0}")]
	Source(#[from] std::io::Error),

	/// Uploaded bytes are not valid UTF-8.
	#[error("invalid UTF-8 in text source: {0}")]
	InvalidUtf8(#[from] std::string::FromUtf8Error),

	/// Snapshot encoding or decoding failed.
	#[error("serialization failed: {0}")]
	Serialization(#[from] postcard::Error),
}

pub type Result<T> = std::result::Result<T, ChainError>;
