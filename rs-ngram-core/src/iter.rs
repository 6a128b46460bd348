//! Wall-clock budget for unbounded iterators.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Yields items from an iterator until a time budget has passed.
///
/// The first item is always yielded. Every later item is pulled from the inner
/// iterator and then yielded only if the deadline has not been reached yet;
/// an item that arrives late is dropped and iteration stops. Nothing
/// interrupts a slow `next()` on the inner iterator.
///
/// This is the cancellation mechanism for reply generation, whose searches
/// can go on forever on a cyclic n-gram graph.
pub struct TimeBudget<I> {
	inner: I,
	budget: Duration,
	/// `None` when the budget is too large to be represented.
	deadline: Option<Instant>,
	yielded: bool,
	done: bool,
}

impl<I: Iterator> TimeBudget<I> {
	pub fn new(inner: I, budget: Duration) -> Self {
		Self {
			inner,
			budget,
			deadline: Instant::now().checked_add(budget),
			yielded: false,
			done: false,
		}
	}

	pub fn expired(&self) -> bool {
		self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
	}

	/// Fails with `BudgetExceeded` once the deadline has passed.
	pub fn check(&self) -> Result<()> {
		if self.expired() {
			Err(Error::BudgetExceeded(self.budget))
		} else {
			Ok(())
		}
	}
}

impl<I: Iterator> Iterator for TimeBudget<I> {
	type Item = I::Item;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		let item = self.inner.next()?;
		if self.yielded && self.expired() {
			self.done = true;
			return None;
		}
		self.yielded = true;
		Some(item)
	}
}

/// Adds [`time_budget`](TimeBudgetExt::time_budget) to every iterator.
pub trait TimeBudgetExt: Iterator + Sized {
	fn time_budget(self, budget: Duration) -> TimeBudget<Self> {
		TimeBudget::new(self, budget)
	}
}

impl<I: Iterator> TimeBudgetExt for I {}
