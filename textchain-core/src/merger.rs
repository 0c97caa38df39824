//! Concatenation of independent text sources into one lazy corpus.

use std::collections::VecDeque;

use crate::error::Result;
use crate::source::TextStream;

/// Lazily concatenates several sources.
///
/// Each source is drained completely, in the given order, before the next
/// one is touched; nothing is read ahead of the consumer. The first error
/// ends the merge: it is yielded once and every later pull returns `None`.
/// Items already yielded before the failure are not retracted.
pub struct CorpusMerger<'a> {
	sources: VecDeque<TextStream<'a>>,
	failed: bool,
}

impl<'a> CorpusMerger<'a> {
	pub fn new<I>(sources: I) -> Self
	where
		I: IntoIterator<Item = TextStream<'a>>,
	{
		Self { sources: sources.into_iter().collect(), failed: false }
	}

	/// Sources not yet exhausted, the current one included.
	pub fn remaining_sources(&self) -> usize {
		self.sources.len()
	}
}

impl Iterator for CorpusMerger<'_> {
	type Item = Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed {
			return None;
		}
		loop {
			let current = self.sources.front_mut()?;
			match current.next() {
				Some(Ok(item)) => return Some(Ok(item)),
				Some(Err(e)) => {
					self.failed = true;
					self.sources.clear();
					return Some(Err(e));
				}
				None => {
					self.sources.pop_front();
				}
			}
		}
	}
}

/// Merges `sources` into one corpus. See [`CorpusMerger`].
pub fn merge<'a, I>(sources: I) -> CorpusMerger<'a>
where
	I: IntoIterator<Item = TextStream<'a>>,
{
	CorpusMerger::new(sources)
}
