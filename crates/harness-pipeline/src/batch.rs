//! C8: `BatchRunner` — fans a set of target directories across a bounded
//! worker pool, one `Pipeline` instance per worker (spec §4.8).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use harness_types::config::HarnessConfig;
use harness_types::context::HarnessContext;
use harness_types::records::{BatchRecord, PipelineRecord};

use crate::pipeline::Pipeline;

/// One unit of batch work: a target directory and the binary name the
/// pipeline should build/run for it.
#[derive(Debug, Clone)]
pub struct BatchTarget {
    pub path: PathBuf,
    pub binary_name: String,
}

/// Run `targets` through independent `Pipeline` instances, sequentially or
/// fanned across up to `config.worker_pool_cap` workers, depending on
/// `config.parallel_stages`.
pub async fn run_batch(ctx: &HarnessContext, config: &HarnessConfig, targets: Vec<BatchTarget>, stop_on_failure: bool) -> BatchRecord {
    let total = targets.len();
    let mut record = BatchRecord::new(total);

    let results = if !config.parallel_stages || config.worker_pool_cap <= 1 {
        run_sequential(ctx, config, targets, stop_on_failure).await
    } else {
        run_fanned(ctx, config, targets, stop_on_failure, config.worker_pool_cap).await
    };

    aggregate(&mut record, results);
    record
}

async fn run_sequential(
    ctx: &HarnessContext,
    config: &HarnessConfig,
    targets: Vec<BatchTarget>,
    stop_on_failure: bool,
) -> Vec<(PathBuf, PipelineRecord)> {
    let mut out = Vec::with_capacity(targets.len());
    for target in targets {
        if ctx.is_cancelled() {
            break;
        }
        let pipeline = Pipeline::new(config.clone());
        let record = pipeline.run(ctx, &target.path, &target.binary_name).await;
        let failed = !record.success;
        out.push((target.path, record));
        if failed && stop_on_failure {
            ctx.cancel();
            break;
        }
    }
    out
}

async fn run_fanned(
    ctx: &HarnessContext,
    config: &HarnessConfig,
    targets: Vec<BatchTarget>,
    stop_on_failure: bool,
    worker_cap: usize,
) -> Vec<(PathBuf, PipelineRecord)> {
    let worker_count = worker_cap.min(targets.len().max(1));
    let (task_tx, task_rx) = mpsc::channel::<BatchTarget>(worker_count.max(1));
    let task_rx = Arc::new(tokio::sync::Mutex::new(task_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<(PathBuf, PipelineRecord)>(targets.len().max(1));

    let mut workers = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let task_rx = Arc::clone(&task_rx);
        let result_tx = result_tx.clone();
        let worker_ctx = ctx.child();
        let worker_config = config.clone();
        workers.push(tokio::spawn(async move {
            loop {
                let next = {
                    let mut rx = task_rx.lock().await;
                    rx.recv().await
                };
                let Some(target) = next else { break };
                if worker_ctx.is_cancelled() {
                    break;
                }
                debug!(worker_id, target = %target.path.display(), "pipeline worker picked up target");
                let pipeline = Pipeline::new(worker_config.clone());
                let record = pipeline.run(&worker_ctx, &target.path, &target.binary_name).await;
                if result_tx.send((target.path.clone(), record)).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(result_tx);

    let feeder_ctx = ctx.clone();
    let feeder = tokio::spawn(async move {
        for target in targets {
            if feeder_ctx.is_cancelled() {
                break;
            }
            if task_tx.send(target).await.is_err() {
                break;
            }
        }
    });

    let mut out = Vec::new();
    while let Some((path, record)) = result_rx.recv().await {
        let failed = !record.success;
        out.push((path, record));
        if failed && stop_on_failure {
            ctx.cancel();
        }
    }

    let _ = feeder.await;
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "pipeline worker task panicked");
        }
    }

    out
}

fn aggregate(record: &mut BatchRecord, results: Vec<(PathBuf, PipelineRecord)>) {
    let mut durations = Vec::with_capacity(results.len());
    let mut failure_counts: HashMap<String, usize> = HashMap::new();
    let mut stage_totals: HashMap<String, (usize, usize)> = HashMap::new();

    for (path, pipeline_record) in results {
        durations.push(pipeline_record.elapsed);
        if pipeline_record.success {
            record.completed_tests += 1;
        } else {
            record.failed_tests += 1;
            for error in &pipeline_record.errors {
                *failure_counts.entry(error.clone()).or_insert(0) += 1;
            }
            if let Some(test_record) = &pipeline_record.test_record {
                for error in &test_record.errors {
                    *failure_counts.entry(error.clone()).or_insert(0) += 1;
                }
            }
        }

        for (stage_name, stage_record) in &pipeline_record.stages {
            let entry = stage_totals.entry(stage_name.clone()).or_insert((0, 0));
            entry.1 += 1;
            if stage_record.success {
                entry.0 += 1;
            }
        }

        record.pipelines.insert(path, pipeline_record);
    }

    record.skipped_tests = record.total_servers.saturating_sub(record.completed_tests + record.failed_tests);

    if !durations.is_empty() {
        let sum: Duration = durations.iter().sum();
        record.average_duration = sum / durations.len() as u32;
        record.fastest_duration = *durations.iter().min().unwrap();
        record.slowest_duration = *durations.iter().max().unwrap();
    }

    record.success_rate = if record.total_servers == 0 {
        0.0
    } else {
        (record.completed_tests as f64 / record.total_servers as f64) * 100.0
    };

    let mut most_common: Vec<(String, usize)> = failure_counts.into_iter().collect();
    most_common.sort_by(|a, b| b.1.cmp(&a.1));
    record.most_common_failures = most_common;

    record.per_stage_success_rate = stage_totals
        .into_iter()
        .map(|(name, (successes, runs))| {
            let rate = if runs == 0 { 0.0 } else { (successes as f64 / runs as f64) * 100.0 };
            (name, rate)
        })
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_batch_with_no_targets_is_empty_but_valid() {
        let ctx = HarnessContext::background();
        let record = run_batch(&ctx, &HarnessConfig::default(), Vec::new(), false).await;
        assert_eq!(record.total_servers, 0);
        assert_eq!(record.completed_tests, 0);
        assert_eq!(record.success_rate, 0.0);
    }

    #[tokio::test]
    async fn sequential_batch_counts_missing_targets_as_failed() {
        let ctx = HarnessContext::background();
        let dir = tempfile::tempdir().unwrap();
        let targets = vec![BatchTarget {
            path: dir.path().to_path_buf(),
            binary_name: "does-not-exist".to_string(),
        }];
        let record = run_batch(&ctx, &HarnessConfig::default(), targets, false).await;
        assert_eq!(record.total_servers, 1);
        assert_eq!(record.failed_tests, 1);
        assert_eq!(record.success_rate, 0.0);
    }
}
