//! Top-K recommendation export.
//!
//! One CSV per run under `<root>/<algorithm-name>/`, named with the run
//! timestamp: a `user_id,item_list` header, then one line per target user
//! with the user id and the space-separated ordered top-K item ids.
//! Train-seen items are removed before ranking.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::info;

use crate::error::{MedleyError, Result};
use crate::matrix::{CsrMatrix, top_k};
use crate::recommender::Recommender;

/// User batch size per scoring call.
const EXPORT_BATCH_SIZE: usize = 1000;

/// Writer for top-K recommendation result files.
#[derive(Debug, Clone)]
pub struct RecommendationWriter {
    root: PathBuf,
}

impl RecommendationWriter {
    /// Create a writer rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(RecommendationWriter { root })
    }

    /// Export top-`cutoff` recommendations for every target user.
    ///
    /// Returns the path of the written file. Users outside the training
    /// matrix are an error; an empty target list is an error.
    pub fn export(
        &self,
        model: &dyn Recommender,
        train: &Arc<CsrMatrix>,
        target_users: &[u32],
        cutoff: usize,
    ) -> Result<PathBuf> {
        if target_users.is_empty() {
            return Err(MedleyError::invalid_argument("no target users to export"));
        }
        if cutoff == 0 {
            return Err(MedleyError::invalid_argument("cutoff must be positive"));
        }

        let dir = self.root.join(model.name());
        std::fs::create_dir_all(&dir)?;
        let file_name = format!("results_{}.csv", Local::now().format("%b%d_%H-%M-%S"));
        let path = dir.join(file_name);

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "user_id,item_list")?;

        for batch in target_users.chunks(EXPORT_BATCH_SIZE) {
            let scores = model.compute_scores(batch, None)?;
            for (row, &user) in batch.iter().enumerate() {
                let (seen, _) = train.row(user as usize);
                let ranked = top_k(scores.row(row), cutoff, seen);
                let items: Vec<String> = ranked.iter().map(u32::to_string).collect();
                writeln!(writer, "{}, {}", user, items.join(" "))?;
            }
        }
        writer.flush()?;

        info!(
            model = model.name(),
            users = target_users.len(),
            cutoff,
            path = %path.display(),
            "exported recommendations"
        );
        Ok(path)
    }
}
