use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::Code;
use super::chain::Chain;
use super::encoder::WordsEncoder;
use crate::error::{ChainError, Result};

/// Code-independent view of a model: token window -> next token -> count.
pub type TokenTable = HashMap<Vec<String>, HashMap<String, u64>>;

/// A trained model: the vocabulary together with the transition table
/// built under it.
///
/// # Invariants
/// - Every code in `chain` (keys and successors) is assigned by `encoder`
/// - `chain.state_size()` is fixed for the life of the model
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MarkovModel {
	encoder: WordsEncoder,
	chain: Chain,
}

impl MarkovModel {
	/// Returns an empty model with windows of `state_size` tokens.
	pub fn new(state_size: usize) -> Result<Self> {
		Ok(Self { encoder: WordsEncoder::new(), chain: Chain::new(state_size)? })
	}

	/// Pairs an encoder with a chain trained under it.
	///
	/// # Errors
	/// Returns `UnknownCode` if the chain refers to a code the encoder never
	/// assigned.
	pub fn from_parts(encoder: WordsEncoder, chain: Chain) -> Result<Self> {
		for state in chain.states() {
			for code in state.key().iter().copied().chain(state.transitions().map(|(next, _)| next)) {
				encoder.decode(code)?;
			}
		}
		Ok(Self { encoder, chain })
	}

	pub fn state_size(&self) -> usize {
		self.chain.state_size()
	}

	pub fn encoder(&self) -> &WordsEncoder {
		&self.encoder
	}

	pub fn chain(&self) -> &Chain {
		&self.chain
	}

	/// Merges a model trained under another encoder into this one.
	///
	/// Codes of `other` are reconciled first: a token already known keeps this
	/// model's code, an unseen token gets a newly minted one. Counts are then
	/// summed state by state.
	///
	/// # Errors
	/// Returns `StateSizeMismatch` if the window sizes differ.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.state_size() != other.state_size() {
			return Err(ChainError::StateSizeMismatch {
				expected: self.state_size(),
				actual: other.state_size(),
			});
		}

		let remap = self.reconcile(&other.encoder);
		let mut remapped = Chain::new(self.state_size())?;
		for state in other.chain.states() {
			let key = remap_codes(&remap, state.key())?;
			for (next, count) in state.transitions() {
				remapped.add(&key, remap_code(&remap, next)?, count)?;
			}
		}
		self.chain.merge(&remapped)
	}

	/// Fits every token of `other` into this encoder and returns the
	/// `other code -> own code` mapping.
	pub(crate) fn reconcile(&mut self, other: &WordsEncoder) -> HashMap<Code, Code> {
		other
			.entries()
			.map(|(code, token)| (code, self.encoder.fit(token)))
			.collect()
	}

	/// Decodes the whole transition table into tokens.
	///
	/// Two models hold the same content if their token tables are equal, even
	/// when their codes were assigned in a different order.
	pub fn token_table(&self) -> Result<TokenTable> {
		let mut table = TokenTable::new();
		for state in self.chain.states() {
			let key = state
				.key()
				.iter()
				.map(|code| self.encoder.decode(*code).map(str::to_owned))
				.collect::<Result<Vec<_>>>()?;
			let nexts = table.entry(key).or_default();
			for (next, count) in state.transitions() {
				*nexts.entry(self.encoder.decode(next)?.to_owned()).or_insert(0) += count;
			}
		}
		Ok(table)
	}
}

fn remap_code(remap: &HashMap<Code, Code>, code: Code) -> Result<Code> {
	remap.get(&code).copied().ok_or(ChainError::UnknownCode(code))
}

fn remap_codes(remap: &HashMap<Code, Code>, codes: &[Code]) -> Result<Vec<Code>> {
	codes.iter().map(|code| remap_code(remap, *code)).collect()
}
