use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the configuration file kept in every model directory.
pub const CONFIG_FILE: &str = "model.toml";

/// Resource limits of the [`MergeCounter`](crate::counter::MergeCounter).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CounterConfig {
	/// Soft cap on the bytes of keys buffered in memory before spilling.
	pub max_bytes: usize,

	/// Maximum number of spill files kept open at once.
	pub max_fds: usize,

	/// Where spill files are created. The system temp dir when unset.
	pub spill_dir: Option<PathBuf>,
}

impl Default for CounterConfig {
	fn default() -> Self {
		Self { max_bytes: 4_000_000, max_fds: 32, spill_dir: None }
	}
}

/// Limits applied while generating replies.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReplyConfig {
	/// Wall-clock budget for collecting replies, in milliseconds.
	pub budget_ms: u64,

	/// Search queue high-water mark; the worst entries are dropped above it.
	pub max_queue: usize,

	/// Expansions a single search may perform before giving up.
	pub max_steps: usize,
}

impl ReplyConfig {
	pub fn budget(&self) -> Duration {
		Duration::from_millis(self.budget_ms)
	}
}

impl Default for ReplyConfig {
	fn default() -> Self {
		Self { budget_ms: 500, max_queue: 100_000, max_steps: 1_000_000 }
	}
}

/// Per-model settings, persisted as `model.toml` in the model directory.
///
/// # Invariants
/// - `order` never changes once a model directory exists, since the
///   n-gram log stores n-grams of exactly that order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelConfig {
	pub order: usize,
	pub counter: CounterConfig,
	pub reply: ReplyConfig,
}

impl Default for ModelConfig {
	fn default() -> Self {
		Self { order: 3, counter: CounterConfig::default(), reply: ReplyConfig::default() }
	}
}

impl ModelConfig {
	pub fn with_order(order: usize) -> Self {
		Self { order, ..Self::default() }
	}

	/// Loads the configuration stored in `dir`, or writes `requested` there if
	/// the directory has none yet.
	///
	/// # Errors
	/// - `OrderMismatch` if the stored order differs from `requested.order`.
	/// - `Config` if the file cannot be parsed or written.
	pub fn load_or_store<P: AsRef<Path>>(dir: P, requested: ModelConfig) -> Result<Self> {
		let path = dir.as_ref().join(CONFIG_FILE);
		if !path.exists() {
			confy::store_path(&path, &requested)?;
			return Ok(requested);
		}

		let stored: ModelConfig = confy::load_path(&path)?;
		if stored.order != requested.order {
			return Err(Error::OrderMismatch { expected: requested.order, found: stored.order });
		}
		Ok(stored)
	}

	pub fn store<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
		confy::store_path(dir.as_ref().join(CONFIG_FILE), self)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_first_open_stores_config() {
		let dir = tempfile::tempdir().unwrap();

		let config = ModelConfig::load_or_store(dir.path(), ModelConfig::with_order(4)).unwrap();
		assert_eq!(4, config.order);
		assert!(dir.path().join(CONFIG_FILE).exists());
	}

	#[test]
	fn test_stored_settings_win() {
		let dir = tempfile::tempdir().unwrap();

		let mut config = ModelConfig::with_order(2);
		config.reply.budget_ms = 42;
		config.store(dir.path()).unwrap();

		let loaded = ModelConfig::load_or_store(dir.path(), ModelConfig::with_order(2)).unwrap();
		assert_eq!(config, loaded);
	}

	#[test]
	fn test_order_mismatch() {
		let dir = tempfile::tempdir().unwrap();
		ModelConfig::load_or_store(dir.path(), ModelConfig::with_order(3)).unwrap();

		let err = ModelConfig::load_or_store(dir.path(), ModelConfig::with_order(2)).unwrap_err();
		assert!(matches!(err, Error::OrderMismatch { expected: 2, found: 3 }));
	}
}
