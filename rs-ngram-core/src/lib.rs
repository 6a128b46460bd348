//! Word n-gram language model library.
//!
//! This crate provides a trainable n-gram model including:
//! - Incremental training with durable, replayable logs
//! - Exact n-gram counts for every order 1..=N
//! - Freezing counts to compact per-order record files
//! - Bounded-memory counting of large corpora
//! - Reply generation by bidirectional random walk
//!
//! Everything is synchronous and single-threaded. Logging goes through the
//! `log` facade; the host installs a logger.

/// Crate error type.
pub mod error;

/// Append-only line logs and file helpers.
pub mod io;

/// Wall-clock budget for unbounded iterators.
pub mod iter;

/// The n-gram model, its storage and reply generation.
pub mod model;

/// Bounded-memory external counting and sorting.
pub mod counter;

/// Binary search over sorted textual n-gram files.
pub mod ngram_file;

/// Ordered map used as the hot count buffer.
pub mod skiplist;

/// Text to token splitting strategies.
pub mod tokenizer;

/// LEB128 variable-length integers.
pub mod varint;

pub use error::{Error, Result};
pub use model::config::ModelConfig;
pub use model::generator::Generator;
pub use model::ngram_model::{END_TOKEN, Model, START_TOKEN};
pub use model::registry::TokenId;
pub use tokenizer::{MegaHalTokenizer, PunctuationTokenizer, Tokenizer, WhitespaceTokenizer};
