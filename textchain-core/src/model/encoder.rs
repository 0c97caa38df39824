use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Code;
use crate::error::{ChainError, Result};

/// Bidirectional mapping between word tokens and integer codes.
///
/// Codes are minted in first-seen order, starting at `0`, and are never
/// reused or reassigned: the vocabulary only grows.
///
/// ## Invariants
/// - `token_to_code` and `code_to_token` are inverse maps (bijection)
/// - Every assigned code is strictly lower than `next_code`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct WordsEncoder {
	token_to_code: HashMap<String, Code>,
	code_to_token: HashMap<Code, String>,
	next_code: Code,
}

impl WordsEncoder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Rebuilds an encoder from persisted `(code, token)` rows.
	///
	/// # Errors
	/// Returns `CorruptStore` if a code or a token appears twice, or if a
	/// code leaves no room to mint another one.
	pub fn from_entries<I>(entries: I) -> Result<Self>
	where
		I: IntoIterator<Item = (Code, String)>,
	{
		let mut encoder = Self::new();
		for (code, token) in entries {
			if encoder.code_to_token.contains_key(&code) {
				return Err(ChainError::CorruptStore(format!("code {code} assigned twice")));
			}
			if encoder.token_to_code.contains_key(&token) {
				return Err(ChainError::CorruptStore(format!("token {token:?} assigned twice")));
			}
			if code == Code::MAX {
				return Err(ChainError::CorruptStore(format!("code {code} is out of range")));
			}
			encoder.next_code = encoder.next_code.max(code + 1);
			encoder.token_to_code.insert(token.clone(), code);
			encoder.code_to_token.insert(code, token);
		}
		Ok(encoder)
	}

	/// Number of tokens in the vocabulary.
	pub fn len(&self) -> usize {
		self.code_to_token.len()
	}

	pub fn is_empty(&self) -> bool {
		self.code_to_token.is_empty()
	}

	/// Returns the code of `token`, minting a new one if it was never seen.
	pub fn fit(&mut self, token: &str) -> Code {
		if let Some(code) = self.token_to_code.get(token) {
			return *code;
		}
		let code = self.next_code;
		self.next_code += 1;
		self.token_to_code.insert(token.to_owned(), code);
		self.code_to_token.insert(code, token.to_owned());
		code
	}

	/// Lazily encodes a token stream, growing the vocabulary as it goes.
	///
	/// Each pulled token yields exactly one code. Errors from the upstream
	/// stream are forwarded untouched. Several calls may feed the same
	/// encoder one after another.
	pub fn fit_encode<I>(&mut self, tokens: I) -> FitEncode<'_, I::IntoIter>
	where
		I: IntoIterator<Item = Result<String>>,
	{
		FitEncode { encoder: self, tokens: tokens.into_iter() }
	}

	/// Read-only lookup of a token's code.
	pub fn encode(&self, token: &str) -> Result<Code> {
		self.token_to_code
			.get(token)
			.copied()
			.ok_or_else(|| ChainError::UnknownToken(token.to_owned()))
	}

	pub fn decode(&self, code: Code) -> Result<&str> {
		self.code_to_token
			.get(&code)
			.map(String::as_str)
			.ok_or(ChainError::UnknownCode(code))
	}

	/// Iterates over every `(code, token)` pair, in no particular order.
	pub fn entries(&self) -> impl Iterator<Item = (Code, &str)> {
		self.code_to_token.iter().map(|(code, token)| (*code, token.as_str()))
	}
}

/// Iterator returned by [`WordsEncoder::fit_encode`].
pub struct FitEncode<'a, I> {
	encoder: &'a mut WordsEncoder,
	tokens: I,
}

impl<I> Iterator for FitEncode<'_, I>
where
	I: Iterator<Item = Result<String>>,
{
	type Item = Result<Code>;

	fn next(&mut self) -> Option<Self::Item> {
		let token = self.tokens.next()?;
		Some(token.map(|token| self.encoder.fit(&token)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ok_tokens(words: &[&str]) -> Vec<Result<String>> {
		words.iter().map(|w| Ok(w.to_string())).collect()
	}

	#[test]
	fn test_fit_encode_first_seen_order() {
		let mut encoder = WordsEncoder::new();
		let codes: Vec<Code> = encoder
			.fit_encode(ok_tokens(&["the", "cat", "the", "mat"]))
			.collect::<Result<_>>()
			.unwrap();
		assert_eq!(codes, vec![0, 1, 0, 2]);
		assert_eq!(encoder.len(), 3);
	}

	#[test]
	fn test_bijection() {
		let words = ["a", "b", "c", "a", ",", "d", "b"];
		let mut encoder = WordsEncoder::new();
		let codes: Vec<Code> = encoder.fit_encode(ok_tokens(&words)).collect::<Result<_>>().unwrap();

		for (word, code) in words.iter().zip(&codes) {
			assert_eq!(encoder.decode(*code).unwrap(), *word);
			assert_eq!(encoder.encode(word).unwrap(), *code);
		}
		for a in &words {
			for b in &words {
				if a != b {
					assert_ne!(encoder.encode(a).unwrap(), encoder.encode(b).unwrap());
				}
			}
		}
	}

	#[test]
	fn test_vocabulary_grows_across_calls() {
		let mut encoder = WordsEncoder::new();
		let first: Vec<Code> = encoder.fit_encode(ok_tokens(&["x", "y"])).collect::<Result<_>>().unwrap();
		let second: Vec<Code> = encoder.fit_encode(ok_tokens(&["y", "z"])).collect::<Result<_>>().unwrap();
		assert_eq!(first, vec![0, 1]);
		assert_eq!(second, vec![1, 2]);
	}

	#[test]
	fn test_lookup_misses() {
		let encoder = WordsEncoder::new();
		assert!(matches!(encoder.encode("nope"), Err(ChainError::UnknownToken(t)) if t == "nope"));
		assert!(matches!(encoder.decode(7), Err(ChainError::UnknownCode(7))));
	}

	#[test]
	fn test_fit_encode_forwards_errors() {
		let mut encoder = WordsEncoder::new();
		let tokens = vec![
			Ok("a".to_owned()),
			Err(ChainError::Configuration("boom".to_owned())),
			Ok("b".to_owned()),
		];
		let mut codes = encoder.fit_encode(tokens);
		assert_eq!(codes.next().unwrap().unwrap(), 0);
		assert!(codes.next().unwrap().is_err());
	}

	#[test]
	fn test_from_entries_rejects_duplicates() {
		let encoder = WordsEncoder::from_entries(vec![(0, "a".to_owned()), (4, "b".to_owned())]).unwrap();
		assert_eq!(encoder.decode(4).unwrap(), "b");

		let mut encoder = encoder;
		assert_eq!(encoder.fit("c"), 5);

		let dup = WordsEncoder::from_entries(vec![(0, "a".to_owned()), (1, "a".to_owned())]);
		assert!(matches!(dup, Err(ChainError::CorruptStore(_))));
	}

	#[test]
	fn test_from_entries_rejects_last_code() {
		let err = WordsEncoder::from_entries(vec![(Code::MAX, "a".to_owned())]);
		assert!(matches!(err, Err(ChainError::CorruptStore(_))));

		let encoder = WordsEncoder::from_entries(vec![(Code::MAX - 1, "a".to_owned())]).unwrap();
		assert_eq!(encoder.decode(Code::MAX - 1).unwrap(), "a");
	}
}
