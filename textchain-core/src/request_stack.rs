//! Progress and status messages exchanged with the request layer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use crate::error::{ChainError, Result};

/// Opaque key-value payload.
pub type Message = Map<String, Value>;

/// Builds a `{"status": status, "message": text}` payload.
pub fn status_message(status: &str, text: impl Into<String>) -> Message {
	let mut msg = Message::new();
	msg.insert("status".to_owned(), Value::from(status));
	msg.insert("message".to_owned(), Value::from(text.into()));
	msg
}

#[derive(Debug, Default)]
struct Inner {
	stack: Vec<Message>,
	locked: bool,
}

/// LIFO buffer of messages produced by a long-running operation and drained
/// by the request layer.
///
/// Cloning yields another handle on the same stack. Create one at process
/// start and pass it to whatever produces or consumes messages.
///
/// The `locked` flag is advisory: `push`, `pop` and `clear` work whatever
/// its value. Callers check [`is_locked`](Self::is_locked) before starting
/// a training run on a model; the stack does not enforce exclusion.
#[derive(Debug, Clone, Default)]
pub struct RequestStack {
	inner: Arc<Mutex<Inner>>,
}

impl RequestStack {
	pub fn new() -> Self {
		Self::default()
	}

	fn inner(&self) -> MutexGuard<'_, Inner> {
		// A panic while holding the guard leaves a plain Vec and bool behind,
		// both still valid.
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn push(&self, msg: Message) {
		self.inner().stack.push(msg);
	}

	/// Removes and returns the most recently pushed message.
	///
	/// # Errors
	/// Returns `EmptyStack` if there is nothing to pop.
	pub fn pop(&self) -> Result<Message> {
		self.inner().stack.pop().ok_or(ChainError::EmptyStack)
	}

	pub fn clear(&self) {
		self.inner().stack.clear();
	}

	pub fn lock(&self) {
		self.inner().locked = true;
	}

	pub fn unlock(&self) {
		self.inner().locked = false;
	}

	pub fn is_locked(&self) -> bool {
		self.inner().locked
	}

	pub fn len(&self) -> usize {
		self.inner().stack.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner().stack.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pop_returns_last_push() {
		let stack = RequestStack::new();
		stack.push(status_message("started", "one"));
		let msg = status_message("progress", "two");
		stack.push(msg.clone());
		assert_eq!(stack.pop().unwrap(), msg);
		assert_eq!(stack.pop().unwrap()["message"], "one");
	}

	#[test]
	fn test_pop_after_clear_fails() {
		let stack = RequestStack::new();
		stack.push(status_message("started", ""));
		stack.clear();
		assert!(matches!(stack.pop(), Err(ChainError::EmptyStack)));
		assert!(stack.is_empty());
	}

	#[test]
	fn test_lock_is_advisory() {
		let stack = RequestStack::new();
		assert!(!stack.is_locked());
		stack.lock();
		assert!(stack.is_locked());
		stack.push(status_message("progress", "still allowed"));
		assert_eq!(stack.len(), 1);
		stack.pop().unwrap();
		stack.unlock();
		assert!(!stack.is_locked());
	}

	#[test]
	fn test_clones_share_state() {
		let stack = RequestStack::new();
		let handle = stack.clone();
		handle.push(status_message("done", "from another handle"));
		assert_eq!(stack.len(), 1);
	}
}
