use std::collections::HashMap;

use rand::Rng;
use rand::prelude::IteratorRandom;

use super::Code;
use super::encoder::WordsEncoder;
use super::markov_model::MarkovModel;
use super::state::CompiledState;
use crate::error::{ChainError, Result};

/// A model with precomputed sampling layouts, ready for generation.
///
/// # Responsibilities
/// - Hold one cumulative-weight layout per state with outgoing transitions
/// - Record dead ends: windows reachable as successors that never had a
///   successor themselves
/// - Decode sampled codes back into tokens
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModel {
	state_size: usize,
	encoder: WordsEncoder,
	states: HashMap<Vec<Code>, CompiledState>,
}

impl CompiledModel {
	/// Precomputes the sampling layout of every state of `model`.
	pub fn compile(model: &MarkovModel) -> Self {
		let mut states: HashMap<Vec<Code>, CompiledState> = model
			.chain()
			.states()
			.map(|state| (state.key().to_vec(), state.compile()))
			.collect();

		// Successor windows never seen as a key are dead ends.
		for state in model.chain().states() {
			for (next, _) in state.transitions() {
				let successor = advance(state.key(), next);
				states.entry(successor).or_default();
			}
		}

		Self { state_size: model.state_size(), encoder: model.encoder().clone(), states }
	}

	pub fn state_size(&self) -> usize {
		self.state_size
	}

	pub fn encoder(&self) -> &WordsEncoder {
		&self.encoder
	}

	/// Sampling layout of `key`, dead ends included.
	pub fn state(&self, key: &[Code]) -> Option<&CompiledState> {
		self.states.get(key)
	}

	/// Picks a random state having at least one outgoing transition.
	pub fn random_seed<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec<Code>> {
		let mut keys: Vec<&Vec<Code>> = self
			.states
			.iter()
			.filter(|(_, state)| !state.is_dead_end())
			.map(|(key, _)| key)
			.collect();
		// Sorted so that a seeded rng always picks the same state.
		keys.sort_unstable();
		keys.into_iter().choose(rng).cloned()
	}

	/// Starts a generation run from `seed`.
	///
	/// The returned iterator yields at most `max_tokens` tokens and stops
	/// early on a dead end. Dropping it cancels the run.
	///
	/// # Errors
	/// Returns `UnknownSeedState` if `seed` is not a state of the model.
	pub fn generate<'a, R: Rng + ?Sized>(
		&'a self,
		seed: &[Code],
		max_tokens: usize,
		rng: &'a mut R,
	) -> Result<Generated<'a, R>> {
		if !self.states.contains_key(seed) {
			return Err(ChainError::UnknownSeedState(seed.to_vec()));
		}
		Ok(Generated { model: self, window: seed.to_vec(), remaining: max_tokens, rng })
	}

	/// Same as [`generate`](Self::generate) with a seed given as tokens.
	///
	/// # Errors
	/// Returns `UnknownToken` if a seed token is not in the vocabulary.
	pub fn generate_from_tokens<'a, R, S>(
		&'a self,
		seed: &[S],
		max_tokens: usize,
		rng: &'a mut R,
	) -> Result<Generated<'a, R>>
	where
		R: Rng + ?Sized,
		S: AsRef<str>,
	{
		let codes = seed
			.iter()
			.map(|token| self.encoder.encode(token.as_ref()))
			.collect::<Result<Vec<_>>>()?;
		self.generate(&codes, max_tokens, rng)
	}

	/// Generates a whole run from `seed` and joins it with spaces.
	pub fn generate_text<R: Rng + ?Sized>(&self, seed: &[Code], max_tokens: usize, rng: &mut R) -> Result<String> {
		let tokens = self.generate(seed, max_tokens, rng)?.collect::<Result<Vec<_>>>()?;
		Ok(tokens.join(" "))
	}
}

impl MarkovModel {
	pub fn compile(&self) -> CompiledModel {
		CompiledModel::compile(self)
	}
}

/// Lazy token stream returned by [`CompiledModel::generate`].
pub struct Generated<'a, R: ?Sized> {
	model: &'a CompiledModel,
	window: Vec<Code>,
	remaining: usize,
	rng: &'a mut R,
}

impl<R: Rng + ?Sized> Iterator for Generated<'_, R> {
	type Item = Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.remaining == 0 {
			return None;
		}
		let next = self.model.states.get(&self.window)?.sample(&mut *self.rng)?;
		self.remaining -= 1;
		self.window = advance(&self.window, next);
		Some(self.model.encoder.decode(next).map(str::to_owned))
	}
}

/// Drops the oldest code of `window` and appends `next`.
fn advance(window: &[Code], next: Code) -> Vec<Code> {
	let mut successor = Vec::with_capacity(window.len());
	successor.extend_from_slice(&window[1..]);
	successor.push(next);
	successor
}
