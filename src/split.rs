use serde::{Deserialize, Serialize};

use crate::error::TimerError;

/// One named segment of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub title: String,
    pub time_ms: Option<u64>,
    pub order: usize,
}

impl Split {
    /// Create an unrecorded split. An empty title falls back to the order number.
    pub fn new(title: impl Into<String>, order: usize) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            order.to_string()
        } else {
            title
        };

        Self {
            title,
            time_ms: None,
            order,
        }
    }

    pub fn is_recorded(&self) -> bool {
        self.time_ms.is_some()
    }
}

/// A named split list definition, as produced by the run editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub name: String,
    pub splits: Vec<Split>,
}

impl Run {
    pub fn new<S: AsRef<str>>(name: impl Into<String>, titles: &[S]) -> Self {
        Self {
            name: name.into(),
            splits: titles
                .iter()
                .enumerate()
                .map(|(order, title)| Split::new(title.as_ref(), order))
                .collect(),
        }
    }
}

/// Copy of `splits` where only the entry with the given `order` has its time replaced
pub fn with_time(splits: &[Split], order: usize, time_ms: Option<u64>) -> Vec<Split> {
    splits
        .iter()
        .map(|s| {
            if s.order == order {
                Split {
                    time_ms,
                    ..s.clone()
                }
            } else {
                s.clone()
            }
        })
        .collect()
}

/// Copy of `splits` with every recorded time cleared
pub fn cleared(splits: &[Split]) -> Vec<Split> {
    splits
        .iter()
        .map(|s| Split {
            time_ms: None,
            ..s.clone()
        })
        .collect()
}

/// Splits sorted by their `order`, for display
pub fn in_order(splits: &[Split]) -> Vec<&Split> {
    let mut sorted: Vec<&Split> = splits.iter().collect();
    sorted.sort_by_key(|s| s.order);
    sorted
}

/// Check that the orders form the contiguous range `[0, len)` with no duplicates
pub fn validate_orders(splits: &[Split]) -> Result<(), TimerError> {
    let mut seen = vec![false; splits.len()];
    for split in splits {
        match seen.get_mut(split.order) {
            Some(slot) if !*slot => *slot = true,
            _ => {
                return Err(TimerError::InvalidOperation(format!(
                    "split order {} is duplicated or outside 0..{}",
                    split.order,
                    splits.len()
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn abc() -> Vec<Split> {
        Run::new("any%", &["A", "B", "C"]).splits
    }

    #[test]
    fn test_split_new_defaults_title_to_order() {
        let split = Split::new("", 3);
        assert_eq!(split.title, "3");
        assert_eq!(split.time_ms, None);
        assert!(!split.is_recorded());
    }

    #[test]
    fn test_run_new_assigns_contiguous_orders() {
        let run = Run::new("any%", &["A", "B", "C"]);
        let orders: Vec<usize> = run.splits.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(validate_orders(&run.splits).is_ok());
    }

    #[test]
    fn test_with_time_touches_only_matching_order() {
        let splits = abc();
        let updated = with_time(&splits, 1, Some(2500));

        assert_eq!(updated[0], splits[0]);
        assert_eq!(updated[1].time_ms, Some(2500));
        assert_eq!(updated[1].title, "B");
        assert_eq!(updated[2], splits[2]);
        // original untouched
        assert_eq!(splits[1].time_ms, None);
    }

    #[test]
    fn test_with_time_locates_by_order_not_position() {
        let mut splits = abc();
        splits.reverse();
        let updated = with_time(&splits, 0, Some(10));

        assert_eq!(updated[2].title, "A");
        assert_eq!(updated[2].time_ms, Some(10));
        assert_eq!(updated[0].time_ms, None);
    }

    #[test]
    fn test_cleared_resets_all_times() {
        let splits = with_time(&with_time(&abc(), 0, Some(1)), 1, Some(2));
        assert!(cleared(&splits).iter().all(|s| s.time_ms.is_none()));
    }

    #[test]
    fn test_in_order_sorts_by_order() {
        let mut splits = abc();
        splits.swap(0, 2);
        let titles: Vec<&str> = in_order(&splits).iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_validate_orders_rejects_gaps_and_duplicates() {
        let mut splits = abc();
        splits[2].order = 5;
        assert_matches!(validate_orders(&splits), Err(TimerError::InvalidOperation(_)));

        let mut splits = abc();
        splits[2].order = 0;
        assert_matches!(validate_orders(&splits), Err(TimerError::InvalidOperation(_)));
    }

    #[test]
    fn test_duplicate_titles_are_allowed() {
        let run = Run::new("loop", &["Boss", "Boss"]);
        assert!(validate_orders(&run.splits).is_ok());
    }
}
