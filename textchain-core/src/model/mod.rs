//! Chain-building core: vocabulary, transition table, and sampling.
//!
//! - Token <-> code mapping (`WordsEncoder`)
//! - Sliding-window transition counting (`Chain`, `Accumulator`)
//! - Trained models and their merging (`MarkovModel`)
//! - Precomputed sampling structures and generation (`CompiledModel`)

/// Integer identifier assigned to a token by the encoder.
pub type Code = u32;

/// Bidirectional token/code vocabulary that grows as new tokens are seen.
pub mod encoder;

/// Transition table keyed by windows of codes, and the accumulator that
/// fills it from a code stream.
pub mod chain;

/// Encoder and transition table bundled as one mergeable model.
pub mod markov_model;

/// Compiled models and lazy, seeded generation.
pub mod generator;

/// Single chain node with its outgoing transition counts.
pub mod state;
