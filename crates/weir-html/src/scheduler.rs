//! Schedulers the driver can cooperate with.
//!
//! Both keep their state behind an `Rc`, so the embedder holds a clone to
//! drain posted continuations while the parser owns the original.

use core::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::collaborators::{ContinuationId, Scheduler};

#[derive(Debug, Default)]
struct BudgetState {
    spent: usize,
    posted: VecDeque<ContinuationId>,
}

/// Yields after every `budget` tokens.
#[derive(Debug, Clone)]
pub struct TokenBudgetScheduler {
    budget: usize,
    state: Rc<RefCell<BudgetState>>,
}

impl TokenBudgetScheduler {
    /// Yield every `budget` tokens. A budget of 0 never yields.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            state: Rc::default(),
        }
    }

    /// The oldest continuation posted and not yet taken.
    #[must_use]
    pub fn take_continuation(&self) -> Option<ContinuationId> {
        self.state.borrow_mut().posted.pop_front()
    }
}

impl Scheduler for TokenBudgetScheduler {
    fn should_yield_for_higher_priority_work(&mut self) -> bool {
        if self.budget == 0 {
            return false;
        }
        let mut state = self.state.borrow_mut();
        state.spent += 1;
        if state.spent < self.budget {
            return false;
        }
        state.spent = 0;
        true
    }

    fn post_continuation(&mut self, id: ContinuationId) {
        self.state.borrow_mut().posted.push_back(id);
    }
}

#[derive(Debug, Default)]
struct ManualState {
    should_yield: bool,
    location_change_pending: bool,
    posted: VecDeque<ContinuationId>,
}

/// A scheduler driven entirely by its owner. It never yields unless told to.
#[derive(Debug, Default, Clone)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualState>>,
}

impl ManualScheduler {
    /// A scheduler that never yields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the pump yield after every token (or stop doing so).
    pub fn set_should_yield(&self, should_yield: bool) {
        self.state.borrow_mut().should_yield = should_yield;
    }

    /// Simulate a pending navigation away from the document.
    pub fn set_location_change_pending(&self, pending: bool) {
        self.state.borrow_mut().location_change_pending = pending;
    }

    /// The oldest continuation posted and not yet taken.
    #[must_use]
    pub fn take_continuation(&self) -> Option<ContinuationId> {
        self.state.borrow_mut().posted.pop_front()
    }

    /// Number of continuations posted and not yet taken.
    #[must_use]
    pub fn posted_count(&self) -> usize {
        self.state.borrow().posted.len()
    }
}

impl Scheduler for ManualScheduler {
    fn should_yield_for_higher_priority_work(&mut self) -> bool {
        self.state.borrow().should_yield
    }

    fn post_continuation(&mut self, id: ContinuationId) {
        self.state.borrow_mut().posted.push_back(id);
    }

    fn location_change_pending(&self) -> bool {
        self.state.borrow().location_change_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_yields_every_n_tokens() {
        let mut scheduler = TokenBudgetScheduler::new(3);
        let yields: Vec<bool> = (0..7)
            .map(|_| scheduler.should_yield_for_higher_priority_work())
            .collect();
        assert_eq!(yields, vec![false, false, true, false, false, true, false]);
    }

    #[test]
    fn test_zero_budget_never_yields() {
        let mut scheduler = TokenBudgetScheduler::new(0);
        assert!((0..100).all(|_| !scheduler.should_yield_for_higher_priority_work()));
    }
}
