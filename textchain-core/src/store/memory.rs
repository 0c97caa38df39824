use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::ModelStore;
use crate::error::{ChainError, Result};
use crate::io;
use crate::model::markov_model::MarkovModel;

/// Ephemeral backend: every model lives in process memory.
///
/// Models can be written to and read back from postcard `.bin` snapshots,
/// one file per model, named after the model.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
	models: HashMap<String, MarkovModel>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Loads every `.bin` snapshot found directly inside `dir`.
	///
	/// # Errors
	/// Returns an error if `dir` is not a readable directory or a snapshot
	/// fails to decode.
	pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
		let mut store = Self::new();
		for path in io::list_files(&dir, io::SNAPSHOT_EXTENSION)? {
			store.load_snapshot(&path)?;
		}
		info!("Loaded {} snapshot(s) from {}", store.models.len(), dir.as_ref().display());
		Ok(store)
	}

	/// Writes the model stored under `name` to `dir/<name>.bin`.
	pub fn save_snapshot<P: AsRef<Path>>(&self, name: &str, dir: P) -> Result<PathBuf> {
		let model = self.models.get(name).ok_or_else(|| ChainError::NotFound(name.to_owned()))?;
		let path = io::snapshot_path(dir, name)?;
		let bytes = postcard::to_stdvec(model)?;
		std::fs::write(&path, bytes)?;
		debug!("Wrote snapshot {}", path.display());
		Ok(path)
	}

	/// Reads a snapshot and stores it under its file stem, replacing any
	/// model of the same name. Returns that name.
	pub fn load_snapshot<P: AsRef<Path>>(&mut self, path: P) -> Result<String> {
		let name = io::get_filename(&path)?;
		let bytes = io::read_bytes(&path)?;
		let model: MarkovModel = postcard::from_bytes(&bytes)?;
		self.models.insert(name.clone(), model);
		Ok(name)
	}
}

impl ModelStore for MemoryStore {
	fn load(&self, name: &str) -> Result<MarkovModel> {
		self.models.get(name).cloned().ok_or_else(|| ChainError::NotFound(name.to_owned()))
	}

	fn save(&mut self, name: &str, model: &MarkovModel) -> Result<()> {
		self.models.insert(name.to_owned(), model.clone());
		Ok(())
	}

	fn merge_into(&mut self, name: &str, partial: &MarkovModel) -> Result<()> {
		match self.models.get_mut(name) {
			Some(existing) => existing.merge(partial),
			None => {
				let mut model = MarkovModel::new(partial.state_size())?;
				model.merge(partial)?;
				self.models.insert(name.to_owned(), model);
				Ok(())
			}
		}
	}

	fn delete(&mut self, name: &str) -> Result<bool> {
		Ok(self.models.remove(name).is_some())
	}

	fn names(&self) -> Result<Vec<String>> {
		let mut names: Vec<String> = self.models.keys().cloned().collect();
		names.sort();
		Ok(names)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::Code;
	use crate::model::chain::accumulate;
	use crate::model::encoder::WordsEncoder;

	fn model(words: &[&str], state_size: usize) -> MarkovModel {
		let mut encoder = WordsEncoder::new();
		let codes: Vec<Code> = words.iter().map(|w| encoder.fit(w)).collect();
		MarkovModel::from_parts(encoder, accumulate(codes, state_size).unwrap()).unwrap()
	}

	#[test]
	fn test_load_missing_is_not_found() {
		let store = MemoryStore::new();
		assert!(matches!(store.load("ghost"), Err(ChainError::NotFound(n)) if n == "ghost"));
	}

	#[test]
	fn test_save_then_load() {
		let mut store = MemoryStore::new();
		let m = model(&["a", "b", "c", "a", "b"], 2);
		store.save("abc", &m).unwrap();
		assert_eq!(store.load("abc").unwrap().token_table().unwrap(), m.token_table().unwrap());
		assert_eq!(store.names().unwrap(), vec!["abc"]);
	}

	#[test]
	fn test_merge_into_accumulates() {
		let mut store = MemoryStore::new();
		store.merge_into("m", &model(&["x", "y"], 1)).unwrap();
		store.merge_into("m", &model(&["y", "x", "y"], 1)).unwrap();
		let table = store.load("m").unwrap().token_table().unwrap();
		assert_eq!(table[&vec!["x".to_owned()]]["y"], 2);
		assert_eq!(table[&vec!["y".to_owned()]]["x"], 1);

		assert!(matches!(
			store.merge_into("m", &model(&["x", "y", "z"], 2)),
			Err(ChainError::StateSizeMismatch { .. })
		));
	}

	#[test]
	fn test_names_are_independent() {
		let mut store = MemoryStore::new();
		store.merge_into("one", &model(&["a", "b"], 1)).unwrap();
		store.merge_into("two", &model(&["c", "d"], 1)).unwrap();
		assert_eq!(store.load("one").unwrap().encoder().len(), 2);
		assert!(store.delete("one").unwrap());
		assert!(!store.delete("one").unwrap());
		assert_eq!(store.names().unwrap(), vec!["two"]);
	}

	#[test]
	fn test_snapshot_round_trip() {
		let dir = std::env::temp_dir().join(format!("textchain-snapshots-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();

		let mut store = MemoryStore::new();
		let m = model(&["to", "be", "or", "not", "to", "be"], 1);
		store.save("hamlet", &m).unwrap();
		let path = store.save_snapshot("hamlet", &dir).unwrap();
		assert!(path.ends_with("hamlet.bin"));

		let reloaded = MemoryStore::load_dir(&dir).unwrap();
		assert_eq!(reloaded.load("hamlet").unwrap(), m);

		std::fs::remove_dir_all(&dir).unwrap();
	}

	#[test]
	fn test_snapshots_of_dotted_names_stay_apart() {
		let dir = std::env::temp_dir().join(format!("textchain-dotted-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();

		let mut store = MemoryStore::new();
		let v1 = model(&["a", "b", "a"], 1);
		let v2 = model(&["x", "y", "z", "x"], 1);
		store.save("habr.v1", &v1).unwrap();
		store.save("habr.v2", &v2).unwrap();
		let first = store.save_snapshot("habr.v1", &dir).unwrap();
		let second = store.save_snapshot("habr.v2", &dir).unwrap();
		assert_ne!(first, second);

		let reloaded = MemoryStore::load_dir(&dir).unwrap();
		assert_eq!(reloaded.names().unwrap(), vec!["habr.v1", "habr.v2"]);
		assert_eq!(reloaded.load("habr.v1").unwrap(), v1);
		assert_eq!(reloaded.load("habr.v2").unwrap(), v2);

		std::fs::remove_dir_all(&dir).unwrap();
	}
}
