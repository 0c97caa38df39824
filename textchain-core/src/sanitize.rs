//! Turning a raw, user-typed SQL string into a parameterized statement.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Any character outside words, `,.=><'()"` and space.
static FORBIDDEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[^\w,.=><'()" ]"#).unwrap());

/// A single-quoted literal, non-greedy.
static LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'(.*?)'").unwrap());

/// SQL text with `?N` placeholders plus the literals they stand for.
///
/// The pair must be executed as a parameterized statement, never spliced
/// back into a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedQuery {
	pub sql: String,
	pub params: Vec<String>,
}

/// Sanitizes `raw`:
/// 1. strips every character outside `[\w,.=><'()" ]`
/// 2. extracts single-quoted literals, in order of occurrence
/// 3. replaces each literal with a 1-based positional placeholder
///
/// Quotes are removed from the extracted values. A dangling quote with no
/// closing partner is left in the SQL text.
pub fn sanitize_query(raw: &str) -> SanitizedQuery {
	let stripped = FORBIDDEN.replace_all(raw, "");

	let mut params = Vec::new();
	let sql = LITERAL
		.replace_all(&stripped, |caps: &Captures| {
			params.push(caps[1].to_owned());
			format!("?{}", params.len())
		})
		.into_owned();

	SanitizedQuery { sql, params }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_literals_become_placeholders() {
		let q = sanitize_query("SELECT text FROM posts WHERE hub = 'rust' AND tag = 'async'");
		assert_eq!(q.sql, "SELECT text FROM posts WHERE hub = ?1 AND tag = ?2");
		assert_eq!(q.params, vec!["rust", "async"]);
	}

	#[test]
	fn test_forbidden_characters_stripped() {
		let q = sanitize_query("SELECT text FROM posts; DROP TABLE posts; --");
		assert_eq!(q.sql, "SELECT text FROM posts DROP TABLE posts ");
		assert!(q.params.is_empty());

		let q = sanitize_query("SELECT * FROM t WHERE a = ?");
		assert_eq!(q.sql, "SELECT  FROM t WHERE a = ");
	}

	#[test]
	fn test_injection_stays_inside_parameter() {
		let q = sanitize_query("SELECT text FROM posts WHERE title = 'x'' OR ''1''=''1'");
		assert_eq!(q.sql, "SELECT text FROM posts WHERE title = ?1?2?3?4?5");
		assert_eq!(q.params, vec!["x", " OR ", "1", "=", "1"]);
	}

	#[test]
	fn test_empty_literal() {
		let q = sanitize_query("SELECT text FROM t WHERE a = ''");
		assert_eq!(q.sql, "SELECT text FROM t WHERE a = ?1");
		assert_eq!(q.params, vec![""]);
	}
}
