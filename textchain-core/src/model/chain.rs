use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::Code;
use super::state::State;
use crate::error::{ChainError, Result};

/// Transition table of a Markov chain over codes.
///
/// The `Chain` maps each window of `state_size` consecutive codes to the
/// state that counts which code followed it.
///
/// # Invariants
/// - `state_size` is always >= 1 and never changes
/// - Each key of `states` has exactly `state_size` codes
/// - Every stored state has at least one transition
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Chain {
	/// Number of codes in a state window.
	state_size: usize,

	/// Mapping from a window to its corresponding state
	states: HashMap<Vec<Code>, State>,
}

impl Chain {
	/// Creates an empty chain with windows of `state_size` codes.
	///
	/// # Errors
	/// Returns a `Configuration` error if `state_size == 0`.
	pub fn new(state_size: usize) -> Result<Self> {
		if state_size == 0 {
			return Err(ChainError::Configuration("state_size must be >= 1".to_owned()));
		}
		Ok(Self { state_size, states: HashMap::new() })
	}

	pub fn state_size(&self) -> usize {
		self.state_size
	}

	/// Number of distinct states with outgoing transitions.
	pub fn len(&self) -> usize {
		self.states.len()
	}

	pub fn is_empty(&self) -> bool {
		self.states.is_empty()
	}

	pub fn get(&self, key: &[Code]) -> Option<&State> {
		self.states.get(key)
	}

	pub fn states(&self) -> impl Iterator<Item = &State> {
		self.states.values()
	}

	/// Adds `count` observations of `key -> next`.
	///
	/// # Errors
	/// Returns `StateSizeMismatch` if `key` is not `state_size` codes long.
	pub fn add(&mut self, key: &[Code], next: Code, count: u64) -> Result<()> {
		if key.len() != self.state_size {
			return Err(ChainError::StateSizeMismatch { expected: self.state_size, actual: key.len() });
		}
		if count == 0 {
			return Ok(());
		}
		self.states
			.entry(key.to_vec())
			.or_insert_with(|| State::new(key))
			.add_count(next, count);
		Ok(())
	}

	/// Merges another chain trained under the same encoder into this one.
	///
	/// # Notes
	/// - Both chains must have the same `state_size`.
	/// - Occurrence counts for matching states and transitions are summed.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.state_size != other.state_size {
			return Err(ChainError::StateSizeMismatch { expected: self.state_size, actual: other.state_size });
		}

		for (key, state) in &other.states {
			if let Some(existing) = self.states.get_mut(key) {
				existing.merge(state).map_err(ChainError::CorruptStore)?;
			} else {
				self.states.insert(key.clone(), state.clone());
			}
		}

		Ok(())
	}
}

/// Builds a [`Chain`] from a stream of codes with a sliding window.
///
/// The first `state_size` codes only fill the window; from then on, each new
/// code is recorded as a successor of the current window, which then drops
/// its oldest code and appends the new one.
#[derive(Debug)]
pub struct Accumulator {
	window: VecDeque<Code>,
	chain: Chain,
}

impl Accumulator {
	pub fn new(state_size: usize) -> Result<Self> {
		Ok(Self {
			window: VecDeque::with_capacity(state_size),
			chain: Chain::new(state_size)?,
		})
	}

	/// Observes one code.
	pub fn push(&mut self, code: Code) {
		let state_size = self.chain.state_size;
		if self.window.len() == state_size {
			let key: Vec<Code> = self.window.iter().copied().collect();
			self.chain
				.states
				.entry(key)
				.or_insert_with_key(|key| State::new(key))
				.add_transition(code);
			self.window.pop_front();
		}
		self.window.push_back(code);
	}

	/// Pulls every code out of `codes`, one at a time.
	///
	/// Stops at the first error and returns it; transitions recorded before
	/// the failure stay in the chain. Returns the number of codes consumed.
	pub fn accumulate<I>(&mut self, codes: I) -> Result<usize>
	where
		I: IntoIterator<Item = Result<Code>>,
	{
		let mut consumed = 0;
		for code in codes {
			self.push(code?);
			consumed += 1;
		}
		Ok(consumed)
	}

	pub fn chain(&self) -> &Chain {
		&self.chain
	}

	pub fn into_chain(self) -> Chain {
		self.chain
	}
}

/// Builds the transition table of an infallible code stream.
pub fn accumulate<I>(codes: I, state_size: usize) -> Result<Chain>
where
	I: IntoIterator<Item = Code>,
{
	let mut accumulator = Accumulator::new(state_size)?;
	for code in codes {
		accumulator.push(code);
	}
	Ok(accumulator.into_chain())
}
