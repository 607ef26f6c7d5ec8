//! User segmentation by profile length for sliced evaluation.
//!
//! Users are ranked by their interaction count ("profile length") and cut
//! into contiguous equal-size blocks; evaluating one block at a time shows
//! how a recommender behaves for cold users versus heavy users. The
//! complement of a segment is the ignore set handed to the evaluator.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MedleyError, Result};
use crate::matrix::CsrMatrix;

/// One profile-length band of the user population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSegment {
    /// Which block of the partition this is.
    pub index: usize,
    /// Users in the segment, ordered by ascending profile length (ties by
    /// ascending user id).
    pub users: Vec<u32>,
    /// Every user not in the segment, used as an evaluation ignore set.
    pub complement: Vec<u32>,
}

/// Interaction count per user row of a URM.
pub fn profile_lengths(urm: &CsrMatrix) -> Vec<usize> {
    (0..urm.num_rows()).map(|user| urm.row_nnz(user)).collect()
}

/// Partition the user population into `num_segments` profile-length bands
/// and return the band at `segment_index`.
///
/// Users are sorted ascending by profile length with a stable tie-break on
/// user id, then cut into contiguous blocks of equal size; the last block
/// absorbs the remainder. Blocks are disjoint and their union is the full
/// user set. Users with zero interactions are valid and sort first.
pub fn segment_users(
    urm: &CsrMatrix,
    num_segments: usize,
    segment_index: usize,
) -> Result<UserSegment> {
    if num_segments == 0 {
        return Err(MedleyError::invalid_argument(
            "num_segments must be at least 1",
        ));
    }
    if segment_index >= num_segments {
        return Err(MedleyError::invalid_argument(format!(
            "segment index {segment_index} out of range for {num_segments} segments"
        )));
    }
    let num_users = urm.num_rows();
    if num_segments > num_users {
        return Err(MedleyError::invalid_argument(format!(
            "cannot cut {num_users} users into {num_segments} segments"
        )));
    }

    let lengths = profile_lengths(urm);
    let mut sorted_users: Vec<u32> = (0..num_users as u32).collect();
    // Stable sort over ascending ids keeps ties in ascending id order.
    sorted_users.sort_by_key(|&user| lengths[user as usize]);

    let block_size = num_users / num_segments;
    let start = segment_index * block_size;
    let end = if segment_index + 1 == num_segments {
        num_users
    } else {
        start + block_size
    };

    let users = sorted_users[start..end].to_vec();
    let complement: Vec<u32> = sorted_users[..start]
        .iter()
        .chain(sorted_users[end..].iter())
        .copied()
        .collect();

    let segment_lengths: Vec<usize> = users.iter().map(|&user| lengths[user as usize]).collect();
    info!(
        segment_index,
        num_segments,
        users = users.len(),
        min_profile = segment_lengths.first().copied().unwrap_or(0),
        max_profile = segment_lengths.last().copied().unwrap_or(0),
        mean_profile = segment_lengths.iter().sum::<usize>() as f64
            / segment_lengths.len().max(1) as f64,
        "segmented users by profile length"
    );

    Ok(UserSegment {
        index: segment_index,
        users,
        complement,
    })
}
