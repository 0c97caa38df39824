//! Named model storage.
//!
//! Two interchangeable backends implement [`ModelStore`]:
//! - [`MemoryStore`]: models live in process memory for the life of the
//!   handle, with optional postcard snapshots on disk
//! - [`SqliteStore`]: models live in a relational database, keyed by name,
//!   and every write is one transaction

use crate::error::Result;
use crate::model::markov_model::MarkovModel;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Capability set shared by every storage backend.
///
/// Models stored under different names never share mutable data, so
/// independent handles may train different names concurrently. Training one
/// name from two operations at once is the caller's responsibility.
pub trait ModelStore {
	/// Loads the model stored under `name`.
	///
	/// # Errors
	/// Returns `NotFound` if no such model exists.
	fn load(&self, name: &str) -> Result<MarkovModel>;

	/// Replaces whatever is stored under `name` with `model`.
	fn save(&mut self, name: &str, model: &MarkovModel) -> Result<()>;

	/// Adds the vocabulary and counts of `partial` to the model stored under
	/// `name`, creating it if needed.
	///
	/// Tokens already known keep their stored code; unseen ones get new
	/// codes. Fails with `StateSizeMismatch` if window sizes differ.
	fn merge_into(&mut self, name: &str, partial: &MarkovModel) -> Result<()>;

	/// Removes the model stored under `name`. Returns whether it existed.
	fn delete(&mut self, name: &str) -> Result<bool>;

	/// Names of all stored models, sorted.
	fn names(&self) -> Result<Vec<String>>;
}
