//! Full / partial / none assessment shared by allocation and pickup aggregation.

use serde::{Deserialize, Serialize};

/// How much of a requirement has been met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub done: i64,
    pub required: i64,
}

impl Progress {
    pub fn new(done: i64, required: i64) -> Self {
        Self { done, required }
    }

    /// Items with nothing required are excluded from the "every item complete" check.
    pub fn is_applicable(&self) -> bool {
        self.required > 0
    }

    pub fn is_complete(&self) -> bool {
        self.is_applicable() && self.done >= self.required
    }

    pub fn is_started(&self) -> bool {
        self.done > 0
    }
}

/// Aggregate coverage across a set of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    None,
    Partial,
    Full,
}

impl Coverage {
    /// `Full` when every applicable item is complete (and there is at least one),
    /// `Partial` when anything has progress, `None` otherwise.
    pub fn assess<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Progress>,
    {
        let mut applicable = 0usize;
        let mut all_complete = true;
        let mut any_started = false;

        for p in items {
            any_started |= p.is_started();
            if p.is_applicable() {
                applicable += 1;
                all_complete &= p.is_complete();
            }
        }

        if applicable > 0 && all_complete {
            Coverage::Full
        } else if any_started {
            Coverage::Partial
        } else {
            Coverage::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_applicable_item_complete_is_full() {
        let c = Coverage::assess([Progress::new(5, 5), Progress::new(12, 10)]);
        assert_eq!(c, Coverage::Full);
    }

    #[test]
    fn zero_required_items_are_ignored() {
        let c = Coverage::assess([Progress::new(5, 5), Progress::new(0, 0)]);
        assert_eq!(c, Coverage::Full);
    }

    #[test]
    fn some_progress_is_partial() {
        let c = Coverage::assess([Progress::new(5, 5), Progress::new(0, 3)]);
        assert_eq!(c, Coverage::Partial);

        let c = Coverage::assess([Progress::new(1, 5)]);
        assert_eq!(c, Coverage::Partial);
    }

    #[test]
    fn nothing_started_is_none() {
        assert_eq!(Coverage::assess([Progress::new(0, 5)]), Coverage::None);
        assert_eq!(Coverage::assess(Vec::<Progress>::new()), Coverage::None);
        assert_eq!(Coverage::assess([Progress::new(0, 0)]), Coverage::None);
    }
}
