//! Lazy producers of raw text chunks.
//!
//! Every source is an iterator of `Result<String>`: a read failure is yielded
//! once, in place, and the source ends right after it.

use std::collections::VecDeque;
use std::path::Path;

use log::debug;
use rusqlite::{Connection, OpenFlags, params_from_iter};

use crate::config::ConnectionSettings;
use crate::error::{ChainError, Result};
use crate::io;
use crate::sanitize::{SanitizedQuery, sanitize_query};

/// A boxed lazy stream of text chunks or tokens.
pub type TextStream<'a> = Box<dyn Iterator<Item = Result<String>> + 'a>;

/// Wraps an in-memory collection as a source.
pub fn from_strings<'a, I, S>(chunks: I) -> TextStream<'a>
where
	I: IntoIterator<Item = S> + 'a,
	I::IntoIter: 'a,
	S: Into<String> + 'a,
{
	Box::new(chunks.into_iter().map(|chunk| Ok(chunk.into())))
}

/// Uploaded text cut on a caller-supplied separator.
///
/// The text is decoded once; pieces are handed out one at a time. A missing
/// or empty separator splits on whitespace runs.
#[derive(Debug)]
pub struct UploadSource {
	text: String,
	separator: Option<String>,
	cursor: usize,
}

impl UploadSource {
	/// # Errors
	/// Returns `InvalidUtf8` if `bytes` is not UTF-8.
	pub fn from_bytes(bytes: Vec<u8>, separator: Option<&str>) -> Result<Self> {
		let text = String::from_utf8(bytes)?;
		let separator = separator.filter(|s| !s.is_empty()).map(str::to_owned);
		Ok(Self { text, separator, cursor: 0 })
	}

	pub fn from_path<P: AsRef<Path>>(path: P, separator: Option<&str>) -> Result<Self> {
		Self::from_bytes(io::read_bytes(path)?, separator)
	}

	fn next_piece(&mut self) -> Option<String> {
		if self.cursor > self.text.len() {
			return None;
		}
		let rest = &self.text[self.cursor..];
		match &self.separator {
			Some(sep) => {
				// Same as `str::split`: the tail after the last separator
				// is a piece too, possibly empty.
				let (piece, advance) = match rest.find(sep.as_str()) {
					Some(at) => (&rest[..at], at + sep.len()),
					None => (rest, rest.len() + 1),
				};
				let piece = piece.to_owned();
				self.cursor += advance;
				Some(piece)
			}
			None => {
				let trimmed = rest.trim_start();
				if trimmed.is_empty() {
					self.cursor = self.text.len() + 1;
					return None;
				}
				let start = self.text.len() - trimmed.len();
				let end = trimmed.find(char::is_whitespace).map_or(self.text.len(), |at| start + at);
				self.cursor = end;
				Some(self.text[start..end].to_owned())
			}
		}
	}
}

impl Iterator for UploadSource {
	type Item = Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		self.next_piece().map(Ok)
	}
}

/// Rows of a sanitized query, first column only, fetched page by page.
///
/// Each page is a `LIMIT/OFFSET` window over the query, so at most
/// `page_size` rows are held at once. NULL values are skipped.
///
/// Every page re-runs the query, and rows only come out in a stable order
/// when the query has an `ORDER BY`; without one, a page may repeat or skip
/// rows of the previous one.
pub struct QuerySource {
	conn: Connection,
	query: SanitizedQuery,
	page_size: usize,
	offset: usize,
	buffer: VecDeque<String>,
	finished: bool,
}

impl QuerySource {
	/// Sanitizes `raw_query` and opens the database named by `settings`.
	///
	/// The database is opened read-only and must already exist.
	pub fn connect(settings: &ConnectionSettings, raw_query: &str, page_size: usize) -> Result<Self> {
		debug!("Opening query source {}@{}:{}/{}", settings.user, settings.host, settings.port, settings.dbname);
		let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI;
		let conn = Connection::open_with_flags(&settings.dbname, flags)?;
		Self::new(conn, sanitize_query(raw_query), page_size)
	}

	pub fn new(conn: Connection, query: SanitizedQuery, page_size: usize) -> Result<Self> {
		if page_size == 0 {
			return Err(ChainError::Configuration("page_size must be >= 1".to_owned()));
		}
		Ok(Self { conn, query, page_size, offset: 0, buffer: VecDeque::new(), finished: false })
	}

	fn fetch_page(&mut self) -> Result<()> {
		let sql = format!("SELECT * FROM ({}) LIMIT {} OFFSET {}", self.query.sql, self.page_size, self.offset);
		let mut stmt = self.conn.prepare(&sql)?;
		let mut rows = stmt.query(params_from_iter(self.query.params.iter()))?;

		let mut fetched = 0;
		while let Some(row) = rows.next()? {
			fetched += 1;
			if let Some(text) = row.get::<_, Option<String>>(0)? {
				self.buffer.push_back(text);
			}
		}

		debug!("Fetched {} rows at offset {}", fetched, self.offset);
		self.offset += fetched;
		if fetched < self.page_size {
			self.finished = true;
		}
		Ok(())
	}
}

impl Iterator for QuerySource {
	type Item = Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(text) = self.buffer.pop_front() {
				return Some(Ok(text));
			}
			if self.finished {
				return None;
			}
			if let Err(e) = self.fetch_page() {
				self.finished = true;
				return Some(Err(e));
			}
		}
	}
}
