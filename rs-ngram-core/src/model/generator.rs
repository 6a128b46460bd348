use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use crate::error::{Error, Result};
use crate::iter::TimeBudgetExt;
use crate::model::config::ReplyConfig;
use crate::model::ngram_model::Model;
use crate::model::registry::TokenId;
use crate::model::search::{Cost, Direction, RandomWalk, Search};

/// Tokens of a reply from the two halves of a bidirectional search.
///
/// Both paths start with the same pivot n-gram. The reverse path is walked
/// back to front without that shared n-gram, followed by the forward path;
/// each n-gram contributes its leading token, and the last one all of its
/// tokens.
///
/// For the pivot `(jumps, over)`:
/// - `fwd`: `(jumps, over) (over, the) (the, dog) (dog, </∅>)`
/// - `rev`: `(jumps, over) (fox, jumps) (<∅>, fox)`
/// - result: `<∅> fox jumps over the dog </∅>`
pub fn join(fwd: &[Box<[TokenId]>], rev: &[Box<[TokenId]>]) -> Vec<TokenId> {
	let shared = rev.get(1..).unwrap_or_default();
	let mut tokens = Vec::new();
	let mut last: Option<&[TokenId]> = None;

	for ngram in shared.iter().rev().chain(fwd) {
		tokens.extend(ngram.first());
		last = Some(&ngram[..]);
	}
	if let Some(tail) = last.and_then(|ngram| ngram.get(1..)) {
		tokens.extend_from_slice(tail);
	}
	tokens
}

/// Generates replies by random-walking a model's n-gram graph.
///
/// # Responsibilities
/// - Pick a pivot n-gram from the input text
/// - Run a forward and a reverse search from it
/// - Join and spell the paths, keeping the first reply that differs from
///   the input
pub struct Generator<'a> {
	model: &'a Model,
	config: ReplyConfig,
}

impl<'a> Generator<'a> {
	pub fn new(model: &'a Model) -> Self {
		Self { model, config: model.config().reply.clone() }
	}

	pub fn with_config(model: &'a Model, config: ReplyConfig) -> Self {
		Self { model, config }
	}

	/// Chooses a pivot n-gram for `text`.
	///
	/// The pivot token is drawn uniformly from the input tokens that start at
	/// least one N-gram, then one of those N-grams is drawn uniformly.
	///
	/// # Errors
	/// `NoPivot` if no input token starts an N-gram.
	pub fn pivot<R: Rng>(&self, text: &str, rng: &mut R) -> Result<&'a [TokenId]> {
		let model = self.model;
		let candidates: Vec<TokenId> = model
			.tokenizer()
			.split(text)
			.iter()
			.filter_map(|token| model.registry().find(token))
			.filter(|&id| !model.pivots(id).is_empty())
			.collect();

		let &token = candidates.choose(rng).ok_or(Error::NoPivot)?;
		let ngram = model.pivots(token).choose(rng).ok_or(Error::NoPivot)?;

		log::debug!("pivot {:?}", model.spell(ngram)?);
		Ok(&ngram[..])
	}

	/// Endless random-walk replies to `text`.
	pub fn replies<R: Rng>(&self, text: &str, rng: &mut R) -> Result<Replies<'a, RandomWalk<StdRng>, RandomWalk<StdRng>>> {
		let pivot = self.pivot(text, rng)?;
		let fwd = RandomWalk::new(StdRng::from_rng(rng));
		let rev = RandomWalk::new(StdRng::from_rng(rng));
		Ok(self.replies_from(pivot, fwd, rev))
	}

	/// Replies through `pivot`, searching with the given costs.
	pub fn replies_from<F: Cost, B: Cost>(&self, pivot: &[TokenId], fwd_cost: F, rev_cost: B) -> Replies<'a, F, B> {
		let model = self.model;
		let (max_queue, max_steps) = (self.config.max_queue, self.config.max_steps);

		let fwd = Search::new(model.successors(), Direction::Forward, model.end_id(), pivot, fwd_cost)
			.with_limits(max_queue, max_steps);
		let rev = Search::new(model.predecessors(), Direction::Reverse, model.start_id(), pivot, rev_cost)
			.with_limits(max_queue, max_steps);

		Replies { model, fwd, rev }
	}

	/// Generates replies to `text` within the configured time budget.
	///
	/// Returns the first reply that differs from `text`, or the last one
	/// generated if they are all the same. Empty if the searches found no path.
	///
	/// # Errors
	/// `NoPivot` if the model knows nothing about `text`.
	pub fn reply<R: Rng>(&self, text: &str, rng: &mut R) -> Result<String> {
		let mut last = None;
		for reply in self.replies(text, rng)?.time_budget(self.config.budget()) {
			let reply = reply?;
			if !reply.trim().eq_ignore_ascii_case(text.trim()) {
				return Ok(reply);
			}
			last = Some(reply);
		}

		if last.is_none() {
			log::warn!("no reply found for {text:?}");
		}
		Ok(last.unwrap_or_default())
	}
}

/// Iterator over the replies of one pivot, see [`Generator::replies_from`].
///
/// The n-th reply pairs the n-th forward path with the n-th reverse path.
pub struct Replies<'a, F, B> {
	model: &'a Model,
	fwd: Search<'a, F>,
	rev: Search<'a, B>,
}

impl<F: Cost, B: Cost> Iterator for Replies<'_, F, B> {
	type Item = Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		let fwd = self.fwd.next()?;
		let rev = self.rev.next()?;

		let (start, end) = (self.model.start_id(), self.model.end_id());
		let ids: Vec<TokenId> = join(&fwd, &rev).into_iter().filter(|&id| id != start && id != end).collect();

		Some(self.model.spell(&ids).map(|tokens| self.model.tokenizer().join(&tokens)))
	}
}

impl Model {
	pub fn generator(&self) -> Generator<'_> {
		Generator::new(self)
	}

	/// Replies to `text` with a random walk, see [`Generator::reply`].
	pub fn reply(&self, text: &str) -> Result<String> {
		self.generator().reply(text, &mut rand::rng())
	}
}
