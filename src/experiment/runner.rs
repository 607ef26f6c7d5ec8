//! Batch experiment driver with per-entry failure containment.
//!
//! The runner walks a static list of experiment entries through
//! `Pending → Fitting → {Evaluated | Exported} → Done`, or
//! `Pending → Failed → Done` when anything inside one entry's
//! instantiate/fit/evaluate/export sequence goes wrong. A failed entry is
//! logged and never aborts the batch; the run log is flushed after every
//! entry so partial progress survives a crash.
//!
//! The parallel variant dispatches independent entries to short-lived
//! workers: at most `max_workers` in flight, one freshly spawned thread per
//! entry, joined and discarded after a single unit of work, so no model
//! state leaks between heterogeneous algorithms. Only the read-only
//! context and configuration cross thread boundaries.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crossbeam_channel::bounded;
use tracing::{error, info};

use crate::error::Result;
use crate::eval::Evaluator;
use crate::experiment::config::{
    EntryOutcome, EntryStatus, ExperimentContext, ExperimentEntry, HyperparamTable,
};
use crate::experiment::export::RecommendationWriter;
use crate::experiment::log::RunLog;

/// What the runner does with each fitted model.
pub enum ExperimentTask {
    /// Run the evaluator over a held-out split.
    Evaluate(Box<dyn Evaluator>),
    /// Write top-K recommendations for a target user list.
    Export {
        writer: RecommendationWriter,
        target_users: Vec<u32>,
        cutoff: usize,
    },
}

/// Sequential (and optionally parallel) driver over an experiment list.
pub struct ExperimentRunner {
    context: ExperimentContext,
    table: HyperparamTable,
    task: ExperimentTask,
    log: Arc<RunLog>,
}

impl ExperimentRunner {
    /// Create a runner owning its log sink for the duration of the run.
    pub fn new(
        context: ExperimentContext,
        table: HyperparamTable,
        task: ExperimentTask,
        log: RunLog,
    ) -> Self {
        ExperimentRunner {
            context,
            table,
            task,
            log: Arc::new(log),
        }
    }

    /// Path of the append-only run log.
    pub fn log_path(&self) -> &std::path::Path {
        self.log.path()
    }

    /// Run every entry in order, one at a time.
    ///
    /// Returns one outcome per entry, in entry order. The only errors that
    /// propagate are run-log I/O failures; everything that happens inside
    /// an entry is contained and logged.
    pub fn run(&self, entries: Vec<ExperimentEntry>) -> Result<Vec<EntryOutcome>> {
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            let outcome = self.run_entry(&entry);
            self.log_outcome(&outcome)?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Run independent entries across short-lived workers.
    ///
    /// Pool width defaults to the available parallelism. Each worker thread
    /// executes exactly one entry and is then joined and discarded.
    /// Outcomes arrive in completion order, which is not guaranteed to
    /// match entry order; run-log lines are individually atomic appends.
    pub fn run_parallel(
        &self,
        entries: Vec<ExperimentEntry>,
        max_workers: Option<usize>,
    ) -> Result<Vec<EntryOutcome>> {
        let width = max_workers.unwrap_or_else(num_cpus::get).max(1);
        let (permit_tx, permit_rx) = bounded::<()>(width);
        let (outcome_tx, outcome_rx) = bounded::<EntryOutcome>(entries.len().max(1));

        info!(entries = entries.len(), width, "starting parallel run");
        std::thread::scope(|scope| {
            for entry in &entries {
                // Blocks until a worker slot frees up.
                let _ = permit_tx.send(());
                let permit_rx = permit_rx.clone();
                let outcome_tx = outcome_tx.clone();
                scope.spawn(move || {
                    let outcome = self.run_entry(entry);
                    if let Err(log_error) = self.log_outcome(&outcome) {
                        error!(
                            algorithm = %outcome.id,
                            %log_error,
                            "failed to append run-log entry"
                        );
                    }
                    let _ = outcome_tx.send(outcome);
                    let _ = permit_rx.recv();
                });
            }
            drop(outcome_tx);

            let mut outcomes = Vec::with_capacity(entries.len());
            while let Ok(outcome) = outcome_rx.recv() {
                outcomes.push(outcome);
            }
            Ok(outcomes)
        })
    }

    /// Execute one entry with full failure containment, including panics.
    fn run_entry(&self, entry: &ExperimentEntry) -> EntryOutcome {
        let mut status = EntryStatus::Pending;
        info!(algorithm = %entry.id, "running experiment entry");

        let execution = catch_unwind(AssertUnwindSafe(|| self.execute_entry(entry, &mut status)));
        match execution {
            Ok(Ok(detail)) => EntryOutcome {
                id: entry.id.clone(),
                status,
                detail,
            },
            Ok(Err(err)) => EntryOutcome {
                id: entry.id.clone(),
                status: EntryStatus::Failed,
                detail: err.to_string(),
            },
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic during experiment entry".to_string());
                EntryOutcome {
                    id: entry.id.clone(),
                    status: EntryStatus::Failed,
                    detail: message,
                }
            }
        }
    }

    fn execute_entry(&self, entry: &ExperimentEntry, status: &mut EntryStatus) -> Result<String> {
        let mut model = (entry.factory)(&self.context)?;
        let params = self.table.params_for(&entry.id);

        *status = EntryStatus::Fitting;
        model.fit(&params)?;

        let detail = match &self.task {
            ExperimentTask::Evaluate(evaluator) => {
                let report = evaluator.evaluate(model.as_ref())?;
                *status = EntryStatus::Evaluated;
                report.to_string()
            }
            ExperimentTask::Export {
                writer,
                target_users,
                cutoff,
            } => {
                let path = writer.export(model.as_ref(), &self.context.train, target_users, *cutoff)?;
                *status = EntryStatus::Exported;
                path.display().to_string()
            }
        };
        Ok(detail)
    }

    fn log_outcome(&self, outcome: &EntryOutcome) -> Result<()> {
        let algorithm = outcome.id.to_string();
        match outcome.status {
            EntryStatus::Failed => self.log.append_failure(&algorithm, &outcome.detail),
            _ => self.log.append_success(&algorithm, &outcome.detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MedleyError;
    use crate::eval::HoldoutEvaluator;
    use crate::experiment::config::AlgorithmId;
    use crate::matrix::CsrMatrix;
    use crate::recommender::{Recommender, TopPop};

    fn context() -> ExperimentContext {
        let train = CsrMatrix::from_triplets(
            3,
            3,
            &[(0, 0, 1.0), (0, 1, 1.0), (1, 1, 1.0), (2, 2, 1.0)],
        )
        .unwrap();
        ExperimentContext {
            train: Arc::new(train),
            icm: None,
        }
    }

    fn evaluate_runner(dir: &std::path::Path) -> ExperimentRunner {
        let context = context();
        let test = Arc::new(
            CsrMatrix::from_triplets(3, 3, &[(0, 2, 1.0), (1, 0, 1.0), (2, 1, 1.0)]).unwrap(),
        );
        let evaluator =
            HoldoutEvaluator::new(context.train.clone(), test, vec![2]).unwrap();
        let log = RunLog::open(dir.join("run.txt")).unwrap();
        ExperimentRunner::new(
            context,
            HyperparamTable::new(),
            ExperimentTask::Evaluate(Box::new(evaluator)),
            log,
        )
    }

    fn top_pop_entry(tag: &str) -> ExperimentEntry {
        ExperimentEntry::new(AlgorithmId::Custom(tag.to_string()), |ctx| {
            Ok(Box::new(TopPop::new(ctx.train.clone())) as Box<dyn Recommender>)
        })
    }

    fn failing_entry(tag: &str) -> ExperimentEntry {
        ExperimentEntry::new(AlgorithmId::Custom(tag.to_string()), |_ctx| {
            Err(MedleyError::experiment("cannot instantiate"))
        })
    }

    #[test]
    fn test_failure_isolation_across_three_entries() {
        let dir = tempfile::tempdir().unwrap();
        let runner = evaluate_runner(dir.path());

        let entries = vec![
            top_pop_entry("First"),
            failing_entry("Second"),
            top_pop_entry("Third"),
        ];
        let outcomes = runner.run(entries).unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].status, EntryStatus::Evaluated);
        assert_eq!(outcomes[1].status, EntryStatus::Failed);
        assert_eq!(outcomes[2].status, EntryStatus::Evaluated);

        let content = std::fs::read_to_string(runner.log_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("First: "));
        assert!(lines[1].starts_with("Second - Exception: "));
        assert!(lines[1].contains("cannot instantiate"));
        assert!(lines[2].starts_with("Third: "));
    }

    #[test]
    fn test_panic_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let runner = evaluate_runner(dir.path());

        let entries = vec![
            ExperimentEntry::new(AlgorithmId::Custom("Panics".to_string()), |_ctx| {
                panic!("boom");
            }),
            top_pop_entry("Survivor"),
        ];
        let outcomes = runner.run(entries).unwrap();

        assert_eq!(outcomes[0].status, EntryStatus::Failed);
        assert!(outcomes[0].detail.contains("boom"));
        assert_eq!(outcomes[1].status, EntryStatus::Evaluated);
    }

    #[test]
    fn test_export_task() {
        let dir = tempfile::tempdir().unwrap();
        let context = context();
        let writer = RecommendationWriter::new(dir.path().join("csv")).unwrap();
        let log = RunLog::open(dir.path().join("run.txt")).unwrap();
        let runner = ExperimentRunner::new(
            context,
            HyperparamTable::new(),
            ExperimentTask::Export {
                writer,
                target_users: vec![0, 1, 2],
                cutoff: 2,
            },
            log,
        );

        let outcomes = runner.run(vec![top_pop_entry("TopPopExport")]).unwrap();
        assert_eq!(outcomes[0].status, EntryStatus::Exported);
        assert!(std::path::Path::new(&outcomes[0].detail).exists());
    }

    #[test]
    fn test_parallel_run_logs_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let runner = evaluate_runner(dir.path());

        let entries = vec![
            top_pop_entry("A"),
            failing_entry("B"),
            top_pop_entry("C"),
            top_pop_entry("D"),
        ];
        let outcomes = runner.run_parallel(entries, Some(2)).unwrap();

        assert_eq!(outcomes.len(), 4);
        let failed = outcomes
            .iter()
            .filter(|o| o.status == EntryStatus::Failed)
            .count();
        assert_eq!(failed, 1);

        let content = std::fs::read_to_string(runner.log_path()).unwrap();
        assert_eq!(content.lines().count(), 4);
        // Each line is intact regardless of completion order.
        for line in content.lines() {
            assert!(line.contains(": ") || line.contains(" - Exception: "));
        }
    }

    #[test]
    fn test_hyperparams_resolved_by_algorithm_id() {
        use crate::recommender::{FitParams, ItemKnn};

        let dir = tempfile::tempdir().unwrap();
        let context = context();
        let test = Arc::new(CsrMatrix::from_triplets(3, 3, &[(0, 2, 1.0)]).unwrap());
        let evaluator = HoldoutEvaluator::new(context.train.clone(), test, vec![1]).unwrap();
        let log = RunLog::open(dir.path().join("run.txt")).unwrap();
        let table = HyperparamTable::new().with(
            AlgorithmId::ItemKnn,
            FitParams::new().with("top_k", 1),
        );
        let runner = ExperimentRunner::new(
            context,
            table,
            ExperimentTask::Evaluate(Box::new(evaluator)),
            log,
        );

        let entries = vec![ExperimentEntry::new(AlgorithmId::ItemKnn, |ctx| {
            Ok(Box::new(ItemKnn::new(ctx.train.clone())) as Box<dyn Recommender>)
        })];
        let outcomes = runner.run(entries).unwrap();
        assert_eq!(outcomes[0].status, EntryStatus::Evaluated);
    }
}
