//! Parallel extraction of every task into a [`ClimateTable`].

use std::path::PathBuf;

use anyhow::Result;
use futures::{stream, StreamExt};
use tokio::task;
use tracing::{debug, error, info};

use crate::{
    cli::create_progress_bar,
    config::PipelineConfig,
    error::PipelineResult,
    reading::{enumerate_tasks, extract_task, Task},
    table::{ClimateTable, TableKey, YearSlice},
};

/// Result of one worker.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: Task,
    pub result: PipelineResult<Vec<YearSlice>>,
}

/// A task that produced nothing; its slots stay empty.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedTask {
    pub description: String,
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub table: ClimateTable,
    pub failures: Vec<FailedTask>,
}

/// Extracts every (experiment, site, interval, variable) task on a pool of
/// `config.worker_count()` blocking workers and merges the results.
pub async fn extract_table(config: &PipelineConfig) -> Result<Extraction> {
    let tasks = enumerate_tasks(config);
    let workers = config.worker_count();
    info!(tasks = tasks.len(), workers, "extracting CMIP sources");

    let progress_bar = create_progress_bar(tasks.len() as u64, "Extracting sources".to_string());

    let outcomes: Vec<TaskOutcome> = stream::iter(tasks)
        .map(|task| {
            let pb = progress_bar.clone();
            async move {
                debug!(task = %task.describe(), path = %task.path.display(), "dispatched");
                let fallback = task.clone();
                let outcome = task::spawn_blocking(move || {
                    let result = extract_task(&task);
                    TaskOutcome { task, result }
                })
                .await
                .unwrap_or_else(|e| TaskOutcome {
                    task: fallback,
                    result: Err(std::io::Error::other(format!("worker panicked: {e}")).into()),
                });
                pb.inc(1);
                outcome
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    progress_bar.finish_with_message("Extraction complete");

    let extraction = merge(outcomes)?;
    info!(
        slots = extraction.table.len(),
        failed = extraction.failures.len(),
        "merged extraction results"
    );

    Ok(extraction)
}

/// Folds worker results into the table. Failed tasks are logged and
/// recorded; a slot written twice aborts the merge.
pub fn merge(outcomes: Vec<TaskOutcome>) -> PipelineResult<Extraction> {
    let mut extraction = Extraction::default();

    for TaskOutcome { task, result } in outcomes {
        match result {
            Ok(slices) => {
                for slice in slices {
                    let key = TableKey::new(
                        task.experiment_index,
                        task.site_index,
                        slice.year(),
                        task.variable,
                    );
                    extraction.table.insert(key, slice)?;
                }
            }
            Err(e) => {
                error!(
                    task = %task.describe(),
                    path = %task.path.display(),
                    "task failed: {e}"
                );
                extraction.failures.push(FailedTask {
                    description: task.describe(),
                    path: task.path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(extraction)
}

// -- Tests -------------------------------------------------------------------
