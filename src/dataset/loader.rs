//! Flat-file dataset loading.
//!
//! Interaction and content datasets arrive as headered CSV:
//! `UserID,ItemID,Data` for the URM, `ItemID,FeatureID,Data` for an ICM,
//! and a single `UserID` column for target-user lists. Ids are reindexed
//! into a zero-based dense range by taking `max id + 1` as the dimension.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::error::{MedleyError, Result};
use crate::matrix::CsrMatrix;

/// A loaded interaction dataset: the sparse matrix plus the unique ids
/// observed in the file, sorted ascending.
#[derive(Debug, Clone)]
pub struct InteractionData {
    pub urm: CsrMatrix,
    pub user_ids: Vec<u32>,
    pub item_ids: Vec<u32>,
}

/// Load a `UserID,ItemID,Data` CSV into an interaction matrix.
pub fn load_interactions(path: impl AsRef<Path>) -> Result<InteractionData> {
    let path = path.as_ref();
    let triplets = parse_triplets(path)?;
    if triplets.is_empty() {
        return Err(MedleyError::dataset(format!(
            "'{}' contains no interactions",
            path.display()
        )));
    }

    let num_rows = triplets.iter().map(|t| t.0).max().unwrap_or(0) as usize + 1;
    let num_cols = triplets.iter().map(|t| t.1).max().unwrap_or(0) as usize + 1;
    let urm = CsrMatrix::from_triplets(num_rows, num_cols, &triplets)?;

    let user_ids = unique_sorted(triplets.iter().map(|t| t.0));
    let item_ids = unique_sorted(triplets.iter().map(|t| t.1));
    info!(
        path = %path.display(),
        users = user_ids.len(),
        items = item_ids.len(),
        interactions = urm.nnz(),
        "loaded interaction matrix"
    );

    Ok(InteractionData {
        urm,
        user_ids,
        item_ids,
    })
}

/// Load an `ItemID,FeatureID,Data` CSV into a content matrix, with every
/// feature value multiplied by `weight`.
pub fn load_content(path: impl AsRef<Path>, weight: f64) -> Result<CsrMatrix> {
    let path = path.as_ref();
    let mut triplets = parse_triplets(path)?;
    for triplet in triplets.iter_mut() {
        triplet.2 *= weight;
    }

    let num_rows = triplets.iter().map(|t| t.0).max().unwrap_or(0) as usize + 1;
    let num_cols = triplets.iter().map(|t| t.1).max().unwrap_or(0) as usize + 1;
    let icm = CsrMatrix::from_triplets(num_rows.max(1), num_cols.max(1), &triplets)?;
    info!(
        path = %path.display(),
        items = icm.num_rows(),
        features = icm.num_cols(),
        "loaded content matrix"
    );
    Ok(icm)
}

/// Load a one-column target user list, deduplicated and sorted.
pub fn load_target_users(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut users = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line_number == 0 || line.trim().is_empty() {
            // Header or trailing blank.
            continue;
        }
        let user: u32 = line.trim().parse().map_err(|_| {
            MedleyError::dataset(format!(
                "'{}' line {}: invalid user id '{}'",
                path.display(),
                line_number + 1,
                line.trim()
            ))
        })?;
        users.push(user);
    }

    users.sort();
    users.dedup();
    Ok(users)
}

fn parse_triplets(path: &Path) -> Result<Vec<(u32, u32, f64)>> {
    let reader = BufReader::new(File::open(path)?);
    let mut triplets = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line_number == 0 || line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split(',');
        let row = parse_field::<u32>(&mut fields, path, line_number)?;
        let col = parse_field::<u32>(&mut fields, path, line_number)?;
        let value = parse_field::<f64>(&mut fields, path, line_number)?;
        triplets.push((row, col, value));
    }

    Ok(triplets)
}

fn parse_field<T: std::str::FromStr>(
    fields: &mut std::str::Split<'_, char>,
    path: &Path,
    line_number: usize,
) -> Result<T> {
    fields
        .next()
        .map(str::trim)
        .and_then(|field| field.parse().ok())
        .ok_or_else(|| {
            MedleyError::dataset(format!(
                "'{}' line {}: malformed record",
                path.display(),
                line_number + 1
            ))
        })
}

fn unique_sorted(values: impl Iterator<Item = u32>) -> Vec<u32> {
    let mut values: Vec<u32> = values.collect();
    values.sort();
    values.dedup();
    values
}
