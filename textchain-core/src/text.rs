//! Splitting raw text chunks into tokens.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;

/// A word, or a single punctuation character.
static WORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	// Constant pattern, always valid.
	Regex::new(r"\w+|[^\w\s]").unwrap()
});

/// How a raw chunk of text is cut into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tokenizer {
	/// Words and punctuation units, whitespace dropped.
	#[default]
	Words,
	/// Pieces between occurrences of a literal separator; empty pieces are
	/// dropped.
	Separator(String),
}

impl Tokenizer {
	/// Tokens of one chunk, in order.
	pub fn split(&self, chunk: &str) -> Vec<String> {
		match self {
			Self::Words => WORD_PATTERN.find_iter(chunk).map(|m| m.as_str().to_owned()).collect(),
			Self::Separator(sep) if sep.is_empty() => chunk.split_whitespace().map(str::to_owned).collect(),
			Self::Separator(sep) => chunk
				.split(sep.as_str())
				.filter(|piece| !piece.is_empty())
				.map(str::to_owned)
				.collect(),
		}
	}

	/// Lazily tokenizes a stream of chunks.
	///
	/// Only the tokens of the chunk being consumed are buffered; the next
	/// chunk is pulled when they run out.
	pub fn tokenize<I>(&self, chunks: I) -> Tokens<'_, I::IntoIter>
	where
		I: IntoIterator<Item = Result<String>>,
	{
		Tokens { tokenizer: self, chunks: chunks.into_iter(), pending: VecDeque::new() }
	}
}

/// Iterator returned by [`Tokenizer::tokenize`].
pub struct Tokens<'a, I> {
	tokenizer: &'a Tokenizer,
	chunks: I,
	pending: VecDeque<String>,
}

impl<I> Iterator for Tokens<'_, I>
where
	I: Iterator<Item = Result<String>>,
{
	type Item = Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(token) = self.pending.pop_front() {
				return Some(Ok(token));
			}
			match self.chunks.next()? {
				Ok(chunk) => self.pending.extend(self.tokenizer.split(&chunk)),
				Err(e) => return Some(Err(e)),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_words_and_punctuation() {
		let tokens = Tokenizer::Words.split("Hello, world! It's  fine.");
		assert_eq!(tokens, vec!["Hello", ",", "world", "!", "It", "'", "s", "fine", "."]);
	}

	#[test]
	fn test_unicode_words() {
		assert_eq!(Tokenizer::Words.split("Привет мир"), vec!["Привет", "мир"]);
	}

	#[test]
	fn test_separator() {
		let tokenizer = Tokenizer::Separator("|".to_owned());
		assert_eq!(tokenizer.split("a|b||c|"), vec!["a", "b", "c"]);
		assert_eq!(Tokenizer::Separator(String::new()).split(" a  b "), vec!["a", "b"]);
	}

	#[test]
	fn test_tokenize_is_lazy_across_chunks() {
		let chunks = vec![Ok("a b".to_owned()), Ok(String::new()), Ok("c".to_owned())];
		let tokens: Vec<String> = Tokenizer::Words.tokenize(chunks).collect::<Result<_>>().unwrap();
		assert_eq!(tokens, vec!["a", "b", "c"]);
	}
}
