//! Memory-aware admission scheduling of per-chromosome workers
//!
//! Deliberately written as an explicit admission loop rather than a
//! generic thread pool: the decision of whether a task may start is a
//! function of the workspace's unallocated byte count, the size of the
//! task's file and the R-factors the running tasks will leave behind.

mod sync;
mod worker;

pub use sync::{Event, TaskSync, WorkerFailure};
pub use worker::TriWorker;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

use crate::tri::Triangular;
use crate::variants::{Chromosome, MafCutoff, VariantFile};
use crate::workspace::{SharedWorkspace, ELEM_SIZE};
use crate::{Result, TriError};

/// A prepared worker with its whole-file workspace footprint
#[derive(Debug)]
pub struct Task<F: VariantFile> {
    /// Bytes the task's entire file would occupy at once
    pub required_size: usize,
    worker: TriWorker<F>,
}

#[derive(Debug)]
struct RunningWorker {
    chromosome: Chromosome,
    handle: JoinHandle<()>,
}

/// How long each scheduler iteration waits on running workers, and the
/// grace period granted during teardown
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Triangularize every autosome in `chromosomes`, reusing pre-existing
/// artifacts where their sample sets still match, and return the output
/// path per chromosome.
///
/// Workers are admitted largest-first while the workspace can hold
/// their whole file next to the R-factors of everything already
/// running; once a candidate does not fit, admissions pause until the
/// current batch has drained. Chromosome X is always skipped.
pub fn calc_tri<F>(
    chromosomes: &[Chromosome],
    mut variant_files: BTreeMap<Chromosome, F>,
    output_directory: &Path,
    workspace: Arc<SharedWorkspace>,
    tri_paths: &[PathBuf],
    maf_cutoff: f64,
) -> Result<BTreeMap<Chromosome, PathBuf>>
where
    F: VariantFile + Send + 'static,
{
    let predicate = MafCutoff::new(maf_cutoff)?;
    let mut paths_by_chromosome: BTreeMap<Chromosome, PathBuf> = BTreeMap::new();

    // Load artifacts supplied through `--tri`.
    for path in tri_paths {
        adopt_existing(path, &workspace, &variant_files, &mut paths_by_chromosome);
    }

    let sync = Arc::new(TaskSync::new());
    // The first task may start immediately.
    sync.can_run.set();
    let (failure_tx, failure_rx) = crossbeam_channel::unbounded();

    let mut tasks: Vec<Task<F>> = Vec::new();
    for &chromosome in chromosomes {
        if chromosome == Chromosome::X {
            // Null-model estimation only uses the autosomes.
            continue;
        }
        if paths_by_chromosome.contains_key(&chromosome) {
            continue;
        }
        let tri_path = output_directory.join(Triangular::file_name(chromosome));
        if adopt_existing(&tri_path, &workspace, &variant_files, &mut paths_by_chromosome) {
            continue;
        }
        let Some(file) = variant_files.remove(&chromosome) else {
            warn!("no variant file supplied for chromosome {chromosome}; skipping");
            continue;
        };

        let worker = TriWorker::new(
            file,
            Arc::clone(&workspace),
            predicate,
            tri_path.clone(),
            Arc::clone(&sync),
            failure_tx.clone(),
        );
        paths_by_chromosome.insert(chromosome, tri_path);
        tasks.push(Task {
            required_size: worker.required_size(),
            worker,
        });
    }

    // Ascending by size so the largest tasks are popped first; big jobs
    // must not queue behind many small ones.
    tasks.sort_by_key(|task| task.required_size);
    debug!("will run {} triangularize tasks", tasks.len());

    let mut running: Vec<RunningWorker> = Vec::new();
    let outcome = admission_loop(&mut tasks, &mut running, &sync, &failure_rx, &workspace);

    // Teardown runs on every path and never raises.
    sync.should_exit.set();
    tasks.clear();
    for worker in running.drain(..) {
        let deadline = Instant::now() + POLL_INTERVAL;
        while !worker.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(25));
        }
        if worker.handle.is_finished() {
            let _ = worker.handle.join();
        } else {
            // The thread analogue of terminate-then-kill: the worker
            // observes should_exit at its next block boundary.
            warn!(
                "detaching worker for chromosome {} after the grace period",
                worker.chromosome
            );
        }
    }

    outcome?;

    // A failed chromosome leaves no file; turn that into an error that
    // names the missing path.
    for path in paths_by_chromosome.values() {
        if !path.is_file() {
            return Err(TriError::MissingOutput { path: path.clone() });
        }
    }
    Ok(paths_by_chromosome)
}

/// Adopt `path` for its chromosome when it holds a readable artifact
/// whose samples match the variant file's; report whether it did.
fn adopt_existing<F: VariantFile>(
    path: &Path,
    workspace: &Arc<SharedWorkspace>,
    variant_files: &BTreeMap<Chromosome, F>,
    paths_by_chromosome: &mut BTreeMap<Chromosome, PathBuf>,
) -> bool {
    if !path.is_file() {
        return false;
    }
    let tri = match Triangular::from_file(path, workspace) {
        Ok(tri) => tri,
        Err(error) => {
            warn!(
                "will re-calculate {} because it could not be read: {error}",
                path.display()
            );
            return false;
        }
    };
    let chromosome = tri.chromosome();

    let adopted = match variant_files.get(&chromosome) {
        Some(file) => {
            // Cache reuse is order-insensitive: a permutation of the
            // same samples still matches.
            let stored: HashSet<&String> = tri.samples().iter().collect();
            let current: HashSet<&String> = file.samples().iter().collect();
            if stored == current {
                debug!(
                    "using existing triangularized file {} for chromosome {chromosome}",
                    path.display()
                );
                paths_by_chromosome.insert(chromosome, path.to_path_buf());
                true
            } else {
                warn!(
                    "will re-calculate {} because its samples do not match",
                    path.display()
                );
                false
            }
        }
        None => {
            warn!(
                "ignoring {} because chromosome {chromosome} has no variant file",
                path.display()
            );
            false
        }
    };
    tri.free();
    adopted
}

fn admission_loop<F: VariantFile + Send + 'static>(
    tasks: &mut Vec<Task<F>>,
    running: &mut Vec<RunningWorker>,
    sync: &TaskSync,
    failures: &Receiver<WorkerFailure>,
    workspace: &SharedWorkspace,
) -> Result<()> {
    // Once a candidate does not fit, the barrier stays down until every
    // running worker has exited, giving the next batch a clean slate.
    let mut barrier = true;
    loop {
        // Surface the first worker failure and tear down.
        if let Ok(failure) = failures.try_recv() {
            return Err(TriError::Worker {
                chromosome: failure.chromosome,
                source: Box::new(failure.error),
            });
        }

        // Wait out the poll interval while anything is still running,
        // then sweep up finished workers.
        if running.iter().any(|worker| !worker.handle.is_finished()) {
            thread::sleep(POLL_INTERVAL);
        }
        let mut alive = Vec::with_capacity(running.len());
        for worker in running.drain(..) {
            if worker.handle.is_finished() {
                let _ = worker.handle.join();
            } else {
                alive.push(worker);
            }
        }
        *running = alive;

        if running.is_empty() && tasks.is_empty() {
            // All tasks have been completed.
            return Ok(());
        }
        if running.is_empty() {
            // The previous batch has drained entirely.
            barrier = true;
        }
        if !sync.can_run.is_set() {
            // The most recently admitted worker has not yet claimed its
            // first allocation.
            continue;
        }
        let Some(next) = tasks.last() else {
            continue;
        };
        if !barrier {
            continue;
        }

        // Admitting this task must leave room for its whole file plus
        // one retained S×S factor per concurrent job.
        let unallocated = workspace.unallocated_size();
        let extra = (running.len() + 1) * ELEM_SIZE * next.worker.sample_count().pow(2);
        let needed = next.required_size + extra;
        debug!(
            "{unallocated} bytes are unallocated; the next task needs {needed} to run in parallel"
        );
        if unallocated < needed && !running.is_empty() {
            debug!("waiting for running tasks to complete before starting the next batch");
            barrier = false;
            continue;
        }

        if let Some(task) = tasks.pop() {
            let chromosome = task.worker.chromosome();
            let handle = task.worker.spawn()?;
            running.push(RunningWorker { chromosome, handle });
            // Hold further admissions until this worker has sized its
            // first block.
            sync.can_run.clear();
        }
    }
}
