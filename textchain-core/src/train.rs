//! Training pipeline: sources -> corpus -> tokens -> codes -> chain.
//!
//! Every stage is a pull-based iterator, so memory stays proportional to the
//! vocabulary and the window, not to the corpus.

use log::{info, warn};
use serde_json::Value;

use crate::config::TrainingOptions;
use crate::error::Result;
use crate::merger::merge;
use crate::model::chain::Accumulator;
use crate::model::encoder::WordsEncoder;
use crate::model::generator::CompiledModel;
use crate::model::markov_model::MarkovModel;
use crate::request_stack::{Message, RequestStack, status_message};
use crate::source::TextStream;
use crate::store::ModelStore;
use crate::text::Tokenizer;

/// Incrementally trains one model from any number of token streams.
///
/// # Responsibilities
/// - Encode tokens with a single growing vocabulary
/// - Feed the codes to the sliding-window accumulator
/// - Report progress on the request stack
pub struct Trainer {
	encoder: WordsEncoder,
	accumulator: Accumulator,
	options: TrainingOptions,
	messages: RequestStack,
	tokens_seen: usize,
}

impl Trainer {
	pub fn new(options: TrainingOptions, messages: RequestStack) -> Result<Self> {
		options.validate()?;
		Ok(Self {
			encoder: WordsEncoder::new(),
			accumulator: Accumulator::new(options.state_size)?,
			options,
			messages,
			tokens_seen: 0,
		})
	}

	/// Total number of tokens consumed so far.
	pub fn tokens_seen(&self) -> usize {
		self.tokens_seen
	}

	/// Pulls every token of `tokens` through the encoder into the chain.
	///
	/// Stops at the first error. Everything consumed before it stays in the
	/// model (no rollback). Returns the number of tokens consumed by this
	/// call.
	pub fn feed<I>(&mut self, tokens: I) -> Result<usize>
	where
		I: IntoIterator<Item = Result<String>>,
	{
		let interval = self.options.progress_interval;
		let mut consumed = 0;
		for code in self.encoder.fit_encode(tokens) {
			self.accumulator.push(code?);
			consumed += 1;
			self.tokens_seen += 1;
			if interval > 0 && self.tokens_seen % interval == 0 {
				self.messages.push(progress_message(self.tokens_seen, self.accumulator.chain().len()));
			}
		}
		Ok(consumed)
	}

	/// Ends training and returns the model built so far.
	pub fn into_model(self) -> Result<MarkovModel> {
		MarkovModel::from_parts(self.encoder, self.accumulator.into_chain())
	}
}

fn progress_message(tokens: usize, states: usize) -> Message {
	let mut msg = status_message("progress", format!("{tokens} tokens processed"));
	msg.insert("tokens".to_owned(), Value::from(tokens));
	msg.insert("states".to_owned(), Value::from(states));
	msg
}

/// Trains a model entirely in memory from `sources`, merged in the given
/// order, and compiles it for generation.
///
/// A failing source aborts the run and its error is returned.
pub fn train_in_memory<'a, I>(
	sources: I,
	tokenizer: &Tokenizer,
	options: &TrainingOptions,
	messages: &RequestStack,
) -> Result<CompiledModel>
where
	I: IntoIterator<Item = TextStream<'a>>,
{
	messages.push(status_message("started", "training in-memory model"));
	let mut trainer = Trainer::new(options.clone(), messages.clone())?;
	if let Err(e) = trainer.feed(tokenizer.tokenize(merge(sources))) {
		messages.push(status_message("error", e.to_string()));
		return Err(e);
	}
	let model = trainer.into_model()?;
	info!("Trained in-memory model: {} tokens, {} states", model.encoder().len(), model.chain().len());
	messages.push(status_message("done", "model compiled"));
	Ok(model.compile())
}

/// Trains on `sources` and merges the result into the model stored under
/// `name`, creating it on first use.
///
/// If a source fails mid-stream, the transitions gathered before the failure
/// are still merged into the store as one batch, and the source error is
/// returned afterwards. Callers must treat such a run as partial training.
pub fn train_named<'a, S, I>(
	store: &mut S,
	name: &str,
	sources: I,
	tokenizer: &Tokenizer,
	options: &TrainingOptions,
	messages: &RequestStack,
) -> Result<()>
where
	S: ModelStore + ?Sized,
	I: IntoIterator<Item = TextStream<'a>>,
{
	messages.push(status_message("started", format!("training model {name:?}")));
	let mut trainer = Trainer::new(options.clone(), messages.clone())?;
	let fed = trainer.feed(tokenizer.tokenize(merge(sources)));
	let tokens = trainer.tokens_seen();
	let partial = trainer.into_model()?;

	if let Err(e) = fed {
		warn!("Source failed after {} tokens, committing partial model {:?}: {}", tokens, name, e);
		messages.push(status_message("error", format!("partial training after {tokens} tokens: {e}")));
		if !partial.chain().is_empty() {
			store.merge_into(name, &partial)?;
		}
		return Err(e);
	}

	store.merge_into(name, &partial)?;
	info!("Trained model {:?} on {} tokens", name, tokens);
	messages.push(status_message("done", format!("model {name:?} updated")));
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ChainError;
	use crate::source::from_strings;
	use crate::store::{MemoryStore, SqliteStore};
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn options(state_size: usize) -> TrainingOptions {
		TrainingOptions { state_size, progress_interval: 2, ..TrainingOptions::default() }
	}

	fn failing_source<'a>(before: &[&str]) -> TextStream<'a> {
		let mut items: Vec<Result<String>> = before.iter().map(|s| Ok(s.to_string())).collect();
		items.push(Err(ChainError::Source(std::io::Error::other("connection reset"))));
		Box::new(items.into_iter())
	}

	#[test]
	fn test_train_in_memory_merges_sources() {
		let messages = RequestStack::new();
		let posts = from_strings(["the cat sat"]);
		let articles = from_strings(["on the mat ."]);
		let compiled = train_in_memory([posts, articles], &Tokenizer::Words, &options(1), &messages).unwrap();

		let mut rng = StdRng::seed_from_u64(2);
		let sat = compiled.encoder().encode("sat").unwrap();
		// "sat" is followed by "on" across the source boundary.
		let next: Vec<String> = compiled.generate(&[sat], 1, &mut rng).unwrap().collect::<Result<_>>().unwrap();
		assert_eq!(next, vec!["on"]);

		assert_eq!(messages.pop().unwrap()["status"], "done");
	}

	#[test]
	fn test_progress_messages() {
		let messages = RequestStack::new();
		let mut trainer = Trainer::new(options(1), messages.clone()).unwrap();
		let tokens = ["a", "b", "c", "d", "e"].map(|t| Ok(t.to_owned()));
		assert_eq!(trainer.feed(tokens).unwrap(), 5);
		assert_eq!(messages.len(), 2);
		let last = messages.pop().unwrap();
		assert_eq!(last["tokens"], 4);
	}

	#[test]
	fn test_short_corpus_gives_empty_model() {
		let compiled =
			train_in_memory([from_strings(["one two"])], &Tokenizer::Words, &options(3), &RequestStack::new()).unwrap();
		let mut rng = StdRng::seed_from_u64(0);
		assert!(compiled.random_seed(&mut rng).is_none());
	}

	#[test]
	fn test_train_named_twice_accumulates() {
		let mut store = SqliteStore::in_memory().unwrap();
		let messages = RequestStack::new();
		for _ in 0..2 {
			train_named(&mut store, "m", [from_strings(["a b a"])], &Tokenizer::Words, &options(1), &messages).unwrap();
		}
		let table = store.load("m").unwrap().token_table().unwrap();
		assert_eq!(table[&vec!["a".to_owned()]]["b"], 2);
		assert_eq!(table[&vec!["b".to_owned()]]["a"], 2);
	}

	#[test]
	fn test_train_named_commits_partial_on_failure() {
		let mut store = MemoryStore::new();
		let messages = RequestStack::new();
		let result = train_named(
			&mut store,
			"partial",
			[failing_source(&["x y z"]), from_strings(["never read"])],
			&Tokenizer::Words,
			&options(1),
			&messages,
		);
		assert!(matches!(result, Err(ChainError::Source(_))));

		let model = store.load("partial").unwrap();
		assert!(model.encoder().encode("z").is_ok());
		assert!(model.encoder().encode("never").is_err());
		assert_eq!(messages.pop().unwrap()["status"], "error");
	}

	#[test]
	fn test_train_in_memory_surfaces_failure() {
		let messages = RequestStack::new();
		let result = train_in_memory([failing_source(&[])], &Tokenizer::Words, &options(1), &messages);
		assert!(matches!(result, Err(ChainError::Source(_))));
	}

	#[test]
	fn test_invalid_options_rejected() {
		let bad = TrainingOptions { state_size: 0, ..TrainingOptions::default() };
		assert!(matches!(Trainer::new(bad, RequestStack::new()), Err(ChainError::Configuration(_))));
	}
}
