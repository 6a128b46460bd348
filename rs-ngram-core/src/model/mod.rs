//! Trainable word n-gram model and the machinery around it.
//!
//! - Token registry (`TokenRegistry`)
//! - The model itself, its logs and count tables (`Model`)
//! - Frozen per-order record files (`FreezeWriter`, `FrozenStore`)
//! - Best-first graph search (`Search`) and reply generation (`Generator`)
//! - Per-model settings (`ModelConfig`)

/// Per-model settings stored as `model.toml`.
pub mod config;

/// Frozen per-order record files.
///
/// Written once by `freeze`, then read through memory maps.
pub mod frozen;

/// Reply generation: pivot choice, bidirectional search, path joining.
pub mod generator;

/// Fixed-order word n-gram model (`1 <= N <= MAX_ORDER`).
///
/// Handles training, log replay, count queries and freezing.
pub mod ngram_model;

/// Token to id mapping with an append-only log.
pub mod registry;

/// Best-first search over the n-gram graph with pluggable costs.
pub mod search;
