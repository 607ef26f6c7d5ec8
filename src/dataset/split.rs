//! Random holdout split of an interaction matrix.
//!
//! Interactions are sampled globally (not per user) into disjoint train and
//! test matrices over the same user/item index space, mirroring a global
//! random-holdout procedure. A seed makes the split reproducible.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::info;

use crate::error::{MedleyError, Result};
use crate::matrix::CsrMatrix;

/// Split a URM into disjoint train/test matrices with the same shape.
///
/// `train_fraction` of the stored interactions (rounded down) go to the
/// train matrix, the rest to the test matrix.
pub fn split_holdout(
    urm: &CsrMatrix,
    train_fraction: f64,
    seed: u64,
) -> Result<(CsrMatrix, CsrMatrix)> {
    if !(0.0..=1.0).contains(&train_fraction) {
        return Err(MedleyError::invalid_argument(format!(
            "train fraction {train_fraction} is outside [0, 1]"
        )));
    }

    let mut triplets: Vec<(u32, u32, f64)> = urm.iter_triplets().collect();
    let mut rng = StdRng::seed_from_u64(seed);
    triplets.shuffle(&mut rng);

    let train_count = (triplets.len() as f64 * train_fraction) as usize;
    let train = CsrMatrix::from_triplets(urm.num_rows(), urm.num_cols(), &triplets[..train_count])?;
    let test = CsrMatrix::from_triplets(urm.num_rows(), urm.num_cols(), &triplets[train_count..])?;

    info!(
        train_nnz = train.nnz(),
        test_nnz = test.nnz(),
        seed,
        "split interactions into holdout"
    );
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_urm() -> CsrMatrix {
        let mut triplets = Vec::new();
        for user in 0..10u32 {
            for item in 0..10u32 {
                if (user + item) % 2 == 0 {
                    triplets.push((user, item, 1.0 + item as f64));
                }
            }
        }
        CsrMatrix::from_triplets(10, 10, &triplets).unwrap()
    }

    #[test]
    fn test_split_is_disjoint_and_complete() {
        let urm = sample_urm();
        let (train, test) = split_holdout(&urm, 0.8, 42).unwrap();

        assert_eq!(train.num_rows(), urm.num_rows());
        assert_eq!(test.num_cols(), urm.num_cols());
        assert_eq!(train.nnz() + test.nnz(), urm.nnz());

        // No coordinate appears in both splits.
        let train_coords: Vec<(u32, u32)> =
            train.iter_triplets().map(|(r, c, _)| (r, c)).collect();
        for (row, col, _) in test.iter_triplets() {
            assert!(!train_coords.contains(&(row, col)));
        }
    }

    #[test]
    fn test_split_is_reproducible() {
        let urm = sample_urm();
        let (train_a, test_a) = split_holdout(&urm, 0.8, 7).unwrap();
        let (train_b, test_b) = split_holdout(&urm, 0.8, 7).unwrap();
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);

        let (train_c, _) = split_holdout(&urm, 0.8, 8).unwrap();
        assert_ne!(train_a, train_c);
    }

    #[test]
    fn test_split_fraction_bounds() {
        let urm = sample_urm();
        assert!(split_holdout(&urm, 1.5, 0).is_err());
        assert!(split_holdout(&urm, -0.1, 0).is_err());

        let (train, test) = split_holdout(&urm, 1.0, 0).unwrap();
        assert_eq!(train.nnz(), urm.nnz());
        assert_eq!(test.nnz(), 0);
    }
}
