use std::collections::HashMap;

use rand::Rng;

use serde::{Deserialize, Serialize};

use super::Code;

/// A node of the Markov chain.
///
/// A `State` corresponds to a fixed window of `state_size` codes (`key`) and
/// stores every observed transition from this window to the next code.
///
/// ## Invariants
/// - All transitions belong to the same `key`
/// - Each transition occurrence count is strictly positive
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct State {
	/// Window of codes identifying the state.
	key: Vec<Code>,
	/// Outgoing transitions indexed by the next code.
	/// Example: { 12 => 42, 7 => 3 }
	transitions: HashMap<Code, u64>,
}

impl State {
	/// Creates a new empty state for the given window.
	pub fn new(key: &[Code]) -> Self {
		Self {
			key: key.to_vec(),
			transitions: HashMap::new(),
		}
	}

	pub fn key(&self) -> &[Code] {
		&self.key
	}

	/// Records one occurrence of a transition toward `next`.
	pub fn add_transition(&mut self, next: Code) {
		self.add_count(next, 1);
	}

	/// Records `count` occurrences of a transition toward `next`.
	///
	/// A zero count is ignored so that no transition is ever stored at 0.
	pub fn add_count(&mut self, next: Code, count: u64) {
		if count == 0 {
			return;
		}
		*self.transitions.entry(next).or_insert(0) += count;
	}

	/// Occurrence count of `key -> next`, 0 if never observed.
	pub fn count(&self, next: Code) -> u64 {
		self.transitions.get(&next).copied().unwrap_or(0)
	}

	pub fn transitions(&self) -> impl Iterator<Item = (Code, u64)> + '_ {
		self.transitions.iter().map(|(next, count)| (*next, *count))
	}

	pub fn is_empty(&self) -> bool {
		self.transitions.is_empty()
	}

	/// Merges another state into this one, summing occurrence counts.
	///
	/// # Errors
	/// Returns an error if the state keys do not match.
	pub fn merge(&mut self, other: &Self) -> Result<(), String> {
		if self.key != other.key {
			return Err("Key mismatch".to_owned());
		}

		for (next, occurrence) in &other.transitions {
			*self.transitions.entry(*next).or_insert(0) += *occurrence;
		}

		Ok(())
	}

	/// Builds the cumulative-weight layout used for sampling.
	///
	/// Codes are laid out in ascending order so that compiling the same state
	/// twice always yields the same layout.
	pub fn compile(&self) -> CompiledState {
		let mut pairs: Vec<(Code, u64)> = self.transitions().collect();
		pairs.sort_unstable_by_key(|(code, _)| *code);

		let mut codes = Vec::with_capacity(pairs.len());
		let mut cumulative = Vec::with_capacity(pairs.len());
		let mut total = 0;
		for (code, count) in pairs {
			total += count;
			codes.push(code);
			cumulative.push(total);
		}
		CompiledState { codes, cumulative }
	}
}

/// Sampling layout of one state: `cumulative[i]` is the sum of the counts of
/// `codes[0..=i]`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CompiledState {
	codes: Vec<Code>,
	cumulative: Vec<u64>,
}

impl CompiledState {
	/// Sum of all outgoing counts.
	pub fn total(&self) -> u64 {
		self.cumulative.last().copied().unwrap_or(0)
	}

	pub fn codes(&self) -> &[Code] {
		&self.codes
	}

	pub fn cumulative(&self) -> &[u64] {
		&self.cumulative
	}

	/// A state with no recorded outgoing transition.
	pub fn is_dead_end(&self) -> bool {
		self.codes.is_empty()
	}

	/// Picks the next code with probability proportional to its count.
	///
	/// O(log k) binary search over the cumulative weights.
	/// Returns `None` for a dead end.
	pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Code> {
		let total = self.total();
		if total == 0 {
			return None;
		}
		let r = rng.random_range(0..total);
		let index = self.cumulative.partition_point(|&bound| bound <= r);
		self.codes.get(index).copied()
	}
}
