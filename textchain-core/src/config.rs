//! Connection and training configuration.

use std::collections::HashMap;
use std::env;

use serde::Deserialize;

use crate::error::{ChainError, Result};

/// Prefix of the environment variables read by [`ConnectionConfig::from_env`].
pub const ENV_PREFIX: &str = "TEXTCHAIN_DB";

/// Connection parameters as supplied, every field optional.
///
/// Comes either from process-wide configuration (internally owned storage)
/// or from a single request (user-supplied external database). Call
/// [`validate`](Self::validate) before connecting.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
	pub host: Option<String>,
	pub port: Option<String>,
	pub user: Option<String>,
	pub password: Option<String>,
	pub dbname: Option<String>,
}

/// Connection parameters with every field present and checked.
///
/// The SQLite driver opens `dbname` as a database file (`:memory:` for a
/// private in-memory database); the network fields are kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
	pub host: String,
	pub port: u16,
	pub user: String,
	pub password: String,
	pub dbname: String,
}

impl ConnectionConfig {
	/// Reads `TEXTCHAIN_DB_HOST`, `_PORT`, `_USER`, `_PASSWORD` and `_NAME`.
	pub fn from_env() -> Self {
		let var = |suffix: &str| env::var(format!("{ENV_PREFIX}_{suffix}")).ok();
		Self {
			host: var("HOST"),
			port: var("PORT"),
			user: var("USER"),
			password: var("PASSWORD"),
			dbname: var("NAME"),
		}
	}

	/// Reads `db_host`, `db_port`, `db_user`, `db_password` and `db_name`
	/// from request fields.
	pub fn from_request(fields: &HashMap<String, String>) -> Self {
		let field = |key: &str| fields.get(key).cloned();
		Self {
			host: field("db_host"),
			port: field("db_port"),
			user: field("db_user"),
			password: field("db_password"),
			dbname: field("db_name"),
		}
	}

	/// Checks that every field is present and that the port is a number.
	///
	/// # Errors
	/// Returns a `Configuration` error naming every missing or invalid field.
	pub fn validate(&self) -> Result<ConnectionSettings> {
		let mut problems = Vec::new();
		let mut require = |name: &str, value: &Option<String>| -> String {
			match value.as_deref().map(str::trim) {
				Some(v) if !v.is_empty() => v.to_owned(),
				_ => {
					problems.push(format!("missing {name}"));
					String::new()
				}
			}
		};

		let host = require("host", &self.host);
		let port = require("port", &self.port);
		let user = require("user", &self.user);
		let password = require("password", &self.password);
		let dbname = require("dbname", &self.dbname);

		let port = match port.parse::<u16>() {
			Ok(p) => p,
			Err(_) => {
				if !port.is_empty() {
					problems.push(format!("invalid port {port:?}"));
				}
				0
			}
		};

		if !problems.is_empty() {
			return Err(ChainError::Configuration(problems.join(", ")));
		}
		Ok(ConnectionSettings { host, port, user, password, dbname })
	}
}

/// Parameters of one training run.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TrainingOptions {
	/// Number of tokens in a state window.
	pub state_size: usize,
	/// A progress message is pushed every this many tokens (0 disables).
	pub progress_interval: usize,
	/// Rows fetched per round trip by query sources.
	pub page_size: usize,
}

impl Default for TrainingOptions {
	fn default() -> Self {
		Self { state_size: 3, progress_interval: 10_000, page_size: 500 }
	}
}

impl TrainingOptions {
	pub fn validate(&self) -> Result<()> {
		if self.state_size == 0 {
			return Err(ChainError::Configuration("state_size must be >= 1".to_owned()));
		}
		if self.page_size == 0 {
			return Err(ChainError::Configuration("page_size must be >= 1".to_owned()));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn full() -> ConnectionConfig {
		ConnectionConfig {
			host: Some("localhost".into()),
			port: Some("5432".into()),
			user: Some("chain".into()),
			password: Some("secret".into()),
			dbname: Some(":memory:".into()),
		}
	}

	#[test]
	fn test_validate_complete() {
		let settings = full().validate().unwrap();
		assert_eq!(settings.port, 5432);
		assert_eq!(settings.dbname, ":memory:");
	}

	#[test]
	fn test_validate_reports_every_missing_field() {
		let config = ConnectionConfig { host: None, password: Some("  ".into()), ..full() };
		match config.validate() {
			Err(ChainError::Configuration(msg)) => {
				assert!(msg.contains("missing host"));
				assert!(msg.contains("missing password"));
				assert!(!msg.contains("user"));
			}
			other => panic!("unexpected: {other:?}"),
		}
	}

	#[test]
	fn test_validate_rejects_bad_port() {
		let config = ConnectionConfig { port: Some("http".into()), ..full() };
		assert!(matches!(config.validate(), Err(ChainError::Configuration(msg)) if msg.contains("invalid port")));
	}

	#[test]
	fn test_from_request() {
		let fields: HashMap<String, String> = [
			("db_host", "db.local"),
			("db_port", "5433"),
			("db_user", "u"),
			("db_password", "p"),
			("db_name", "corpus.sqlite"),
		]
		.into_iter()
		.map(|(k, v)| (k.to_owned(), v.to_owned()))
		.collect();
		let settings = ConnectionConfig::from_request(&fields).validate().unwrap();
		assert_eq!(settings.host, "db.local");
		assert_eq!(settings.dbname, "corpus.sqlite");

		assert!(ConnectionConfig::from_request(&HashMap::new()).validate().is_err());
	}

	#[test]
	fn test_training_options() {
		assert!(TrainingOptions::default().validate().is_ok());
		let bad = TrainingOptions { state_size: 0, ..TrainingOptions::default() };
		assert!(matches!(bad.validate(), Err(ChainError::Configuration(_))));
	}
}
