//! Error type shared by every component of the crate.

use std::time::Duration;

use thiserror::Error;

use crate::model::registry::TokenId;

/// Errors surfaced by the registry, the model, the counters and the readers.
///
/// Writers never retry: an `Io` error while appending to a log is fatal for
/// the current operation and the caller decides what to do next.
#[derive(Debug, Error)]
pub enum Error {
	/// A log or frozen file contains a record that violates its invariants.
	#[error("corrupt data: {0}")]
	Corruption(String),

	#[error("unknown token id: {0}")]
	UnknownId(TokenId),

	#[error("unknown token: {0:?}")]
	UnknownToken(String),

	/// Tokens are stored one per line, n-grams are TAB joined and counted
	/// keys are NUL joined, so none of these may appear inside a token.
	#[error("invalid token {0:?}: tokens must not contain newline, tab or NUL")]
	InvalidToken(String),

	#[error("n-gram order {order} out of range 1..={max}")]
	OrderOutOfRange { order: usize, max: usize },

	/// `logprob` on an n-gram (or context) that was never counted.
	#[error("unseen n-gram: {0}")]
	Unseen(String),

	#[error("no pivot n-gram found for the input")]
	NoPivot,

	#[error("time budget of {0:?} exceeded")]
	BudgetExceeded(Duration),

	#[error("truncated varint stream")]
	Truncated,

	#[error("value does not fit in a frozen record: {0}")]
	RecordOverflow(u64),

	#[error("model was created with order {found}, requested order {expected}")]
	OrderMismatch { expected: usize, found: usize },

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Config(#[from] confy::ConfyError),
}

pub type Result<T> = std::result::Result<T, Error>;
