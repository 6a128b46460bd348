//! Best-first search over the n-gram graph.
//!
//! Nodes are order-N n-grams. Walking forward, `(t1..tN)` leads to every
//! `(t2..tN, x)` the model has seen; walking in reverse it leads to every
//! `(x, t1..tN-1)`. The graph is cyclic, so a search can yield forever.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

use rand::Rng;

use crate::model::ngram_model::Model;
use crate::model::registry::TokenId;

/// Which way a search walks the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
	/// Follow successors until an n-gram ends with the end sentinel.
	Forward,
	/// Follow predecessors until an n-gram starts with the start sentinel.
	Reverse,
}

impl Direction {
	/// The (N-1)-gram `ngram` shares with its neighbours in this direction.
	fn overlap(self, ngram: &[TokenId]) -> &[TokenId] {
		match self {
			Direction::Forward => &ngram[1..],
			Direction::Reverse => &ngram[..ngram.len() - 1],
		}
	}
}

/// Cost of moving from one n-gram to a neighbour.
///
/// Lower is better. `None` prunes the edge.
pub trait Cost {
	fn cost(&mut self, ngram: &[TokenId], next: &[TokenId]) -> Option<f64>;
}

impl<F> Cost for F
where
	F: FnMut(&[TokenId], &[TokenId]) -> Option<f64>,
{
	fn cost(&mut self, ngram: &[TokenId], next: &[TokenId]) -> Option<f64> {
		self(ngram, next)
	}
}

/// Uniformly random edge costs in `[0, 1)`, which turns the search into a
/// random walk.
pub struct RandomWalk<R> {
	rng: R,
}

impl<R: Rng> RandomWalk<R> {
	pub fn new(rng: R) -> Self {
		Self { rng }
	}
}

impl<R: Rng> Cost for RandomWalk<R> {
	fn cost(&mut self, _ngram: &[TokenId], _next: &[TokenId]) -> Option<f64> {
		Some(self.rng.random::<f64>())
	}
}

/// Information content of each step: `-log2 P(added token | overlap)`.
///
/// Favors the most likely continuations, so the first result is the most
/// probable path.
pub struct InformationCost<'a> {
	model: &'a Model,
	direction: Direction,
}

impl<'a> InformationCost<'a> {
	pub fn new(model: &'a Model, direction: Direction) -> Self {
		Self { model, direction }
	}
}

impl Cost for InformationCost<'_> {
	fn cost(&mut self, ngram: &[TokenId], next: &[TokenId]) -> Option<f64> {
		let context = self.model.count_ids(self.direction.overlap(ngram));
		let count = self.model.count_ids(next);
		if context == 0 || count == 0 {
			return None;
		}
		Some((context as f64).log2() - (count as f64).log2())
	}
}

/// A path is a linked list from the newest n-gram back to the start.
struct PathNode {
	ngram: Box<[TokenId]>,
	parent: Option<Rc<PathNode>>,
}

impl PathNode {
	fn to_vec(&self) -> Vec<Box<[TokenId]>> {
		let mut path = vec![self.ngram.clone()];
		let mut node = self.parent.as_deref();
		while let Some(n) = node {
			path.push(n.ngram.clone());
			node = n.parent.as_deref();
		}
		path.reverse();
		path
	}
}

struct Pending {
	cost: f64,
	seq: u64,
	path: Rc<PathNode>,
}

// `BinaryHeap` pops the greatest element: the greatest `Pending` is the one
// with the lowest cost, then the earliest insertion.
impl Ord for Pending {
	fn cmp(&self, other: &Self) -> Ordering {
		other.cost.total_cmp(&self.cost).then_with(|| other.seq.cmp(&self.seq))
	}
}

impl PartialOrd for Pending {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl PartialEq for Pending {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for Pending {}

/// Best-first search yielding every path to the goal in ascending cost.
///
/// Each item is the sequence of n-grams visited, starting with the initial
/// n-gram. Equal costs come out in insertion order.
///
/// # Limits
/// - When the queue grows beyond `max_queue`, it is cut down to its best half.
/// - After `max_steps` expansions the search ends.
pub struct Search<'a, C> {
	adjacency: &'a HashMap<Vec<TokenId>, Vec<TokenId>>,
	direction: Direction,
	goal: TokenId,
	cost: C,
	queue: BinaryHeap<Pending>,
	seq: u64,
	steps: usize,
	max_queue: usize,
	max_steps: usize,
}

impl<'a, C: Cost> Search<'a, C> {
	/// Starts a search from `start` over `adjacency`, which maps an (N-1)-gram
	/// to the sorted tokens seen after it (forward) or before it (reverse).
	pub fn new(
		adjacency: &'a HashMap<Vec<TokenId>, Vec<TokenId>>,
		direction: Direction,
		goal: TokenId,
		start: &[TokenId],
		cost: C,
	) -> Self {
		let mut queue = BinaryHeap::new();
		queue.push(Pending {
			cost: 0.0,
			seq: 0,
			path: Rc::new(PathNode { ngram: start.into(), parent: None }),
		});

		Self {
			adjacency,
			direction,
			goal,
			cost,
			queue,
			seq: 1,
			steps: 0,
			max_queue: usize::MAX,
			max_steps: usize::MAX,
		}
	}

	pub fn with_limits(mut self, max_queue: usize, max_steps: usize) -> Self {
		self.max_queue = max_queue.max(1);
		self.max_steps = max_steps;
		self
	}

	fn is_goal(&self, ngram: &[TokenId]) -> bool {
		let edge = match self.direction {
			Direction::Forward => ngram.last(),
			Direction::Reverse => ngram.first(),
		};
		edge == Some(&self.goal)
	}

	fn neighbours(&self, ngram: &[TokenId]) -> Vec<Box<[TokenId]>> {
		if ngram.is_empty() {
			return Vec::new();
		}
		let overlap = self.direction.overlap(ngram);
		let Some(tokens) = self.adjacency.get(overlap) else {
			return Vec::new();
		};

		tokens
			.iter()
			.map(|&token| {
				let mut next = Vec::with_capacity(ngram.len());
				match self.direction {
					Direction::Forward => {
						next.extend_from_slice(overlap);
						next.push(token);
					}
					Direction::Reverse => {
						next.push(token);
						next.extend_from_slice(overlap);
					}
				}
				next.into_boxed_slice()
			})
			.collect()
	}

	fn trim(&mut self) {
		let keep = (self.max_queue / 2).max(1);
		let mut entries = std::mem::take(&mut self.queue).into_vec();
		entries.sort_unstable_by(|a, b| b.cmp(a));
		entries.truncate(keep);
		log::debug!("search queue trimmed to {keep} entries");
		self.queue = BinaryHeap::from(entries);
	}
}

impl<C: Cost> Iterator for Search<'_, C> {
	type Item = Vec<Box<[TokenId]>>;

	fn next(&mut self) -> Option<Self::Item> {
		while let Some(Pending { cost, path, .. }) = self.queue.pop() {
			if self.is_goal(&path.ngram) {
				return Some(path.to_vec());
			}

			if self.steps >= self.max_steps {
				log::debug!("search gave up after {} steps", self.steps);
				self.queue.clear();
				return None;
			}
			self.steps += 1;

			for next in self.neighbours(&path.ngram) {
				let Some(step) = self.cost.cost(&path.ngram, &next) else {
					continue;
				};
				self.queue.push(Pending {
					cost: cost + step,
					seq: self.seq,
					path: Rc::new(PathNode { ngram: next, parent: Some(Rc::clone(&path)) }),
				});
				self.seq += 1;
			}

			if self.queue.len() > self.max_queue {
				self.trim();
			}
		}
		None
	}
}
