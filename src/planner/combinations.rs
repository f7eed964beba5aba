//! Lazy cross-product enumeration
//!
//! Set-membership restrictions multiply into a cross-product of key
//! combinations. The product is enumerated lazily and can be restarted;
//! capping oversized enumerations is a caller policy decision, not enforced
//! here.

use crate::expr::Value;

/// A lazy, finite, restartable cross-product over per-axis candidate tuples.
///
/// Each axis contributes a list of candidate tuples (one or more values per
/// tuple); a combination is the concatenation of one tuple per axis. Axes
/// advance last-first, so combinations come out in lexicographic axis order.
/// With zero axes, a single empty combination is produced.
#[derive(Debug, Clone)]
pub struct Combinations {
    axes: Vec<Vec<Vec<Value>>>,
    cursor: Vec<usize>,
    exhausted: bool,
}

impl Combinations {
    /// Creates the product over the given axes
    pub fn new(axes: Vec<Vec<Vec<Value>>>) -> Self {
        let exhausted = axes.iter().any(Vec::is_empty);
        let cursor = vec![0; axes.len()];
        Self {
            axes,
            cursor,
            exhausted,
        }
    }

    /// Rewinds the enumeration to the first combination
    pub fn restart(&mut self) {
        for slot in &mut self.cursor {
            *slot = 0;
        }
        self.exhausted = self.axes.iter().any(Vec::is_empty);
    }

    /// Total number of combinations
    pub fn count_total(&self) -> usize {
        self.axes.iter().map(Vec::len).product()
    }
}

impl Iterator for Combinations {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let combination: Vec<Value> = self
            .cursor
            .iter()
            .zip(self.axes.iter())
            .flat_map(|(&i, axis)| axis[i].iter().cloned())
            .collect();

        // advance, last axis fastest
        let mut pos = self.axes.len();
        loop {
            if pos == 0 {
                self.exhausted = true;
                break;
            }
            pos -= 1;
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.axes[pos].len() {
                break;
            }
            self.cursor[pos] = 0;
        }

        Some(combination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(values: &[i64]) -> Vec<Vec<Value>> {
        values.iter().map(|&v| vec![Value::Int(v)]).collect()
    }

    #[test]
    fn test_full_product_in_order() {
        let combos: Vec<_> = Combinations::new(vec![axis(&[1, 2]), axis(&[10, 20])]).collect();
        assert_eq!(
            combos,
            vec![
                vec![Value::Int(1), Value::Int(10)],
                vec![Value::Int(1), Value::Int(20)],
                vec![Value::Int(2), Value::Int(10)],
                vec![Value::Int(2), Value::Int(20)],
            ]
        );
    }

    #[test]
    fn test_empty_axis_yields_nothing() {
        let combos: Vec<_> = Combinations::new(vec![axis(&[1, 2]), vec![]]).collect();
        assert!(combos.is_empty());
    }

    #[test]
    fn test_zero_axes_yield_one_empty_combination() {
        let combos: Vec<_> = Combinations::new(vec![]).collect();
        assert_eq!(combos, vec![Vec::<Value>::new()]);
    }

    #[test]
    fn test_restart() {
        let mut product = Combinations::new(vec![axis(&[1, 2])]);
        assert_eq!(product.by_ref().count(), 2);
        assert_eq!(product.next(), None);
        product.restart();
        assert_eq!(product.next(), Some(vec![Value::Int(1)]));
    }

    #[test]
    fn test_tuple_axes() {
        let tuples = vec![
            vec![Value::Int(1), Value::Int(2)],
            vec![Value::Int(3), Value::Int(4)],
        ];
        let combos: Vec<_> = Combinations::new(vec![tuples, axis(&[9])]).collect();
        assert_eq!(
            combos,
            vec![
                vec![Value::Int(1), Value::Int(2), Value::Int(9)],
                vec![Value::Int(3), Value::Int(4), Value::Int(9)],
            ]
        );
    }

    #[test]
    fn test_count_total() {
        let product = Combinations::new(vec![axis(&[1, 2, 3]), axis(&[1, 2])]);
        assert_eq!(product.count_total(), 6);
    }
}
