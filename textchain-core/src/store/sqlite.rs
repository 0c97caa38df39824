use std::collections::HashMap;

use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, Transaction, params};

use super::ModelStore;
use crate::config::ConnectionSettings;
use crate::error::{ChainError, Result};
use crate::model::Code;
use crate::model::chain::Chain;
use crate::model::encoder::WordsEncoder;
use crate::model::markov_model::MarkovModel;

const SCHEMA: &str = "
	CREATE TABLE IF NOT EXISTS models (
		name TEXT PRIMARY KEY,
		state_size INTEGER NOT NULL
	);
	CREATE TABLE IF NOT EXISTS vocabulary (
		model_name TEXT NOT NULL REFERENCES models(name) ON DELETE CASCADE,
		code INTEGER NOT NULL,
		token TEXT NOT NULL,
		PRIMARY KEY (model_name, code),
		UNIQUE (model_name, token)
	);
	CREATE TABLE IF NOT EXISTS transitions (
		model_name TEXT NOT NULL REFERENCES models(name) ON DELETE CASCADE,
		state BLOB NOT NULL,
		next_code INTEGER NOT NULL,
		count INTEGER NOT NULL CHECK (count > 0),
		PRIMARY KEY (model_name, state, next_code)
	);
";

/// Persistent backend: models stored in SQLite, keyed by name.
///
/// Each `save`, `merge_into` and `delete` runs inside one transaction, so a
/// reader sees a model's vocabulary and transitions either fully updated or
/// not at all. A state is stored as the postcard encoding of its codes.
#[derive(Debug)]
pub struct SqliteStore {
	conn: Connection,
}

impl SqliteStore {
	/// Opens the database named by validated connection settings.
	pub fn open(settings: &ConnectionSettings) -> Result<Self> {
		info!("Opening model store {}@{}:{}/{}", settings.user, settings.host, settings.port, settings.dbname);
		Self::from_connection(Connection::open(&settings.dbname)?)
	}

	/// Private in-memory database, gone when the store is dropped.
	pub fn in_memory() -> Result<Self> {
		Self::from_connection(Connection::open_in_memory()?)
	}

	/// Uses an already open connection, creating the schema if missing.
	pub fn from_connection(conn: Connection) -> Result<Self> {
		conn.execute_batch("PRAGMA foreign_keys = ON;")?;
		conn.execute_batch(SCHEMA)?;
		Ok(Self { conn })
	}

	fn stored_state_size(tx: &Transaction, name: &str) -> Result<Option<usize>> {
		let size: Option<i64> = tx
			.query_row("SELECT state_size FROM models WHERE name = ?1", params![name], |row| row.get(0))
			.optional()?;
		size.map(|s| usize::try_from(s).map_err(|_| ChainError::CorruptStore(format!("negative state_size for {name:?}"))))
			.transpose()
	}

	fn load_encoder(conn: &Connection, name: &str) -> Result<WordsEncoder> {
		let mut stmt = conn.prepare("SELECT code, token FROM vocabulary WHERE model_name = ?1")?;
		let rows = stmt
			.query_map(params![name], |row| Ok((row.get::<_, Code>(0)?, row.get::<_, String>(1)?)))?
			.collect::<rusqlite::Result<Vec<_>>>()?;
		WordsEncoder::from_entries(rows)
	}

	fn insert_transitions(tx: &Transaction, name: &str, chain: &Chain, remap: Option<&HashMap<Code, Code>>) -> Result<usize> {
		let mut stmt = tx.prepare(
			"INSERT INTO transitions (model_name, state, next_code, count) VALUES (?1, ?2, ?3, ?4)
			 ON CONFLICT (model_name, state, next_code) DO UPDATE SET count = count + excluded.count",
		)?;
		let translate = |code: Code| -> Result<Code> {
			match remap {
				Some(remap) => remap.get(&code).copied().ok_or(ChainError::UnknownCode(code)),
				None => Ok(code),
			}
		};

		let mut written = 0;
		for state in chain.states() {
			let key = state.key().iter().map(|code| translate(*code)).collect::<Result<Vec<_>>>()?;
			let blob = postcard::to_stdvec(&key)?;
			for (next, count) in state.transitions() {
				let count = i64::try_from(count)
					.map_err(|_| ChainError::CorruptStore(format!("count {count} does not fit storage")))?;
				stmt.execute(params![name, blob, translate(next)?, count])?;
				written += 1;
			}
		}
		Ok(written)
	}
}

impl ModelStore for SqliteStore {
	fn load(&self, name: &str) -> Result<MarkovModel> {
		let state_size: i64 = self
			.conn
			.query_row("SELECT state_size FROM models WHERE name = ?1", params![name], |row| row.get(0))
			.optional()?
			.ok_or_else(|| ChainError::NotFound(name.to_owned()))?;
		let state_size = usize::try_from(state_size)
			.map_err(|_| ChainError::CorruptStore(format!("negative state_size for {name:?}")))?;

		let encoder = Self::load_encoder(&self.conn, name)?;

		let mut chain = Chain::new(state_size)?;
		let mut stmt = self
			.conn
			.prepare("SELECT state, next_code, count FROM transitions WHERE model_name = ?1")?;
		let mut rows = stmt.query(params![name])?;
		while let Some(row) = rows.next()? {
			let blob: Vec<u8> = row.get(0)?;
			let key: Vec<Code> = postcard::from_bytes(&blob)?;
			let next: Code = row.get(1)?;
			let count: i64 = row.get(2)?;
			let count = u64::try_from(count)
				.map_err(|_| ChainError::CorruptStore(format!("negative count in {name:?}")))?;
			chain
				.add(&key, next, count)
				.map_err(|e| ChainError::CorruptStore(format!("{name:?}: {e}")))?;
		}

		debug!("Loaded model {:?}: {} tokens, {} states", name, encoder.len(), chain.len());
		MarkovModel::from_parts(encoder, chain)
	}

	fn save(&mut self, name: &str, model: &MarkovModel) -> Result<()> {
		let tx = self.conn.transaction()?;
		tx.execute("DELETE FROM models WHERE name = ?1", params![name])?;
		tx.execute(
			"INSERT INTO models (name, state_size) VALUES (?1, ?2)",
			params![name, model.state_size() as i64],
		)?;
		{
			let mut stmt = tx.prepare("INSERT INTO vocabulary (model_name, code, token) VALUES (?1, ?2, ?3)")?;
			for (code, token) in model.encoder().entries() {
				stmt.execute(params![name, code, token])?;
			}
		}
		let written = Self::insert_transitions(&tx, name, model.chain(), None)?;
		tx.commit()?;
		info!("Saved model {:?}: {} tokens, {} transitions", name, model.encoder().len(), written);
		Ok(())
	}

	fn merge_into(&mut self, name: &str, partial: &MarkovModel) -> Result<()> {
		let tx = self.conn.transaction()?;

		match Self::stored_state_size(&tx, name)? {
			Some(size) if size != partial.state_size() => {
				return Err(ChainError::StateSizeMismatch { expected: size, actual: partial.state_size() });
			}
			Some(_) => (),
			None => {
				tx.execute(
					"INSERT INTO models (name, state_size) VALUES (?1, ?2)",
					params![name, partial.state_size() as i64],
				)?;
			}
		}

		// Reconcile codes against the stored vocabulary, minting new ones
		// after the current maximum.
		let mut encoder = Self::load_encoder(&tx, name)?;
		let known = encoder.len();
		let mut remap = HashMap::with_capacity(partial.encoder().len());
		{
			let mut stmt = tx.prepare("INSERT INTO vocabulary (model_name, code, token) VALUES (?1, ?2, ?3)")?;
			for (code, token) in partial.encoder().entries() {
				let stored = match encoder.encode(token) {
					Ok(stored) => stored,
					Err(_) => {
						let minted = encoder.fit(token);
						stmt.execute(params![name, minted, token])?;
						minted
					}
				};
				remap.insert(code, stored);
			}
		}

		let written = Self::insert_transitions(&tx, name, partial.chain(), Some(&remap))?;
		tx.commit()?;
		info!(
			"Merged into model {:?}: {} new tokens, {} transitions",
			name,
			encoder.len() - known,
			written
		);
		Ok(())
	}

	fn delete(&mut self, name: &str) -> Result<bool> {
		let tx = self.conn.transaction()?;
		tx.execute("DELETE FROM transitions WHERE model_name = ?1", params![name])?;
		tx.execute("DELETE FROM vocabulary WHERE model_name = ?1", params![name])?;
		let removed = tx.execute("DELETE FROM models WHERE name = ?1", params![name])?;
		tx.commit()?;
		Ok(removed > 0)
	}

	fn names(&self) -> Result<Vec<String>> {
		let mut stmt = self.conn.prepare("SELECT name FROM models ORDER BY name")?;
		let names = stmt
			.query_map([], |row| row.get(0))?
			.collect::<rusqlite::Result<Vec<String>>>()?;
		Ok(names)
	}
}
