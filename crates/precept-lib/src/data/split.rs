//! Seeded train/test partitioning

use crate::error::{PreceptError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Disjoint row indices of the training and test partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split `rows` row indices into train and test partitions.
///
/// The assignment depends only on `rows`, `test_split` and `seed`, never on
/// the data itself. Indices are sorted within each partition.
pub fn split_indices(rows: usize, test_split: f64, seed: u64) -> Result<Partition> {
    if !(0.0..1.0).contains(&test_split) {
        return Err(PreceptError::Configuration(format!(
            "test split {} must be within [0, 1)",
            test_split
        )));
    }

    let num_test = (rows as f64 * test_split).round() as usize;
    if rows == 0 || num_test >= rows {
        return Err(PreceptError::Configuration(format!(
            "{} rows leave no training data at test split {}",
            rows, test_split
        )));
    }

    let mut indices: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut test = indices[..num_test].to_vec();
    let mut train = indices[num_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();

    Ok(Partition { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_partition() {
        let a = split_indices(1000, 0.2, 666).unwrap();
        let b = split_indices(1000, 0.2, 666).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.test.len(), 200);
        assert_eq!(a.train.len(), 800);
    }

    #[test]
    fn test_different_seed_different_partition() {
        let a = split_indices(1000, 0.2, 1).unwrap();
        let b = split_indices(1000, 0.2, 2).unwrap();
        assert_ne!(a.test, b.test);
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let p = split_indices(97, 0.3, 7).unwrap();
        let mut all: Vec<usize> = p.train.iter().chain(p.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..97).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_split_keeps_everything_for_training() {
        let p = split_indices(10, 0.0, 0).unwrap();
        assert_eq!(p.train.len(), 10);
        assert!(p.test.is_empty());
    }

    #[test]
    fn test_invalid_split() {
        assert!(split_indices(10, 1.0, 0).is_err());
        assert!(split_indices(10, -0.1, 0).is_err());
        assert!(split_indices(0, 0.2, 0).is_err());
        // Rounds to every row in the test partition
        assert!(split_indices(1, 0.6, 0).is_err());
    }
}
