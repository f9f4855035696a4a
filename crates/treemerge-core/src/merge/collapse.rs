//! Field collapse rule.
//!
//! For one field of one entry, the leaves that changed the field are
//! reduced to a single outcome:
//!
//! | Distinct new values | Outcome | Field value |
//! |---------------------|---------|-------------|
//! | 0 | [`Outcome::Unchanged`] | seeded value |
//! | 1 | [`Outcome::Agreed`] | the agreed value |
//! | 2+ | [`Outcome::Divergent`] | seeded value (content: cleared) |
//!
//! Independently of the count, if any leaf deleted the entry while at least
//! one leaf changed the field, the field also gets its `DeleteVs*` cause.

use crate::model::conflict::{Causes, ConflictCause, Leaf, ValueChoices};

/// Result of collapsing one field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    /// No leaf changed the field.
    Unchanged,
    /// Every leaf that changed the field chose this value.
    Agreed(T),
    /// Leaves chose different values.
    Divergent,
}

/// Accumulates the values leaves changed one field to.
#[derive(Clone, Debug)]
pub struct Collapse<T: Ord> {
    choices: ValueChoices<T>,
}

impl<T: Ord> Default for Collapse<T> {
    fn default() -> Self {
        Self {
            choices: ValueChoices::new(),
        }
    }
}

impl<T: Ord + Clone> Collapse<T> {
    /// An empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `leaf` changed the field to `value`.
    pub fn record(&mut self, leaf: Leaf, value: T) {
        let leaves = self.choices.entry(value).or_default();
        if !leaves.contains(&leaf) {
            leaves.push(leaf);
        }
    }

    /// `true` if at least one leaf changed the field.
    #[must_use]
    pub fn touched(&self) -> bool {
        !self.choices.is_empty()
    }

    /// Number of distinct values recorded.
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.choices.len()
    }

    /// Apply the collapse rule.
    #[must_use]
    pub fn outcome(&self) -> Outcome<T> {
        let mut values = self.choices.keys();
        match (values.next(), values.next()) {
            (None, _) => Outcome::Unchanged,
            (Some(v), None) => Outcome::Agreed(v.clone()),
            (Some(_), Some(_)) => Outcome::Divergent,
        }
    }

    /// Resolve the field against its seeded value, raising causes.
    ///
    /// Returns the value the composed entry should carry (the seed when
    /// unchanged or divergent) and whether the field diverged.
    pub fn resolve(
        &self,
        seed: T,
        any_deleted: bool,
        divergent: Option<ConflictCause>,
        delete_vs: Option<ConflictCause>,
        causes: &mut Causes,
    ) -> (T, bool) {
        if any_deleted
            && self.touched()
            && let Some(cause) = delete_vs
        {
            causes.insert(cause);
        }
        match self.outcome() {
            Outcome::Unchanged => (seed, false),
            Outcome::Agreed(v) => (v, false),
            Outcome::Divergent => {
                if let Some(cause) = divergent {
                    causes.insert(cause);
                }
                (seed, true)
            }
        }
    }

    /// The recorded choices if the field diverged or met a delete.
    #[must_use]
    pub fn choices_if(self, keep: bool) -> ValueChoices<T> {
        if keep {
            self.choices
        } else {
            ValueChoices::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
