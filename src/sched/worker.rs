use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::info;

use super::sync::{TaskSync, WorkerFailure};
use crate::tsqr::TallSkinnyQr;
use crate::variants::{Chromosome, MafCutoff, VariantFile};
use crate::workspace::SharedWorkspace;
use crate::Result;

/// One chromosome's triangularization job.
///
/// Runs the map-reduce driver on its own thread, persists the result
/// and signals `can_run` so the scheduler may admit the next task. Any
/// error travels to the scheduler through the failure channel instead
/// of being logged and swallowed.
pub struct TriWorker<F: VariantFile> {
    file: F,
    workspace: Arc<SharedWorkspace>,
    predicate: MafCutoff,
    tri_path: PathBuf,
    sync: Arc<TaskSync>,
    failures: Sender<WorkerFailure>,
}

impl<F: VariantFile> std::fmt::Debug for TriWorker<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriWorker")
            .field("chromosome", &self.file.chromosome())
            .field("tri_path", &self.tri_path)
            .finish()
    }
}

impl<F: VariantFile + Send + 'static> TriWorker<F> {
    /// Bundle everything one worker thread needs
    pub fn new(
        file: F,
        workspace: Arc<SharedWorkspace>,
        predicate: MafCutoff,
        tri_path: PathBuf,
        sync: Arc<TaskSync>,
        failures: Sender<WorkerFailure>,
    ) -> Self {
        Self {
            file,
            workspace,
            predicate,
            tri_path,
            sync,
            failures,
        }
    }

    /// Chromosome this worker is responsible for
    pub fn chromosome(&self) -> Chromosome {
        self.file.chromosome()
    }

    /// Sample count of the underlying variant file
    pub fn sample_count(&self) -> usize {
        self.file.sample_count()
    }

    /// Workspace bytes the whole file would occupy at once
    pub fn required_size(&self) -> usize {
        crate::workspace::ELEM_SIZE * self.file.sample_count() * self.file.variant_count()
    }

    /// Start the worker on a named thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        let name = format!("tri-worker-chr{}", self.file.chromosome());
        thread::Builder::new().name(name).spawn(move || self.run())
    }

    fn run(mut self) {
        let chromosome = self.file.chromosome();
        info!("triangularizing chromosome {chromosome}");

        if let Err(error) = self.map_reduce_to_file() {
            // The spawning end may already be gone during teardown.
            let _ = self.failures.send(WorkerFailure { chromosome, error });
        }
    }

    fn map_reduce_to_file(&mut self) -> Result<()> {
        let tri = TallSkinnyQr::new(
            &mut self.file,
            Arc::clone(&self.workspace),
            self.predicate,
        )
        .with_sync(Arc::clone(&self.sync))
        .map_reduce()?;

        tri.to_file(&self.tri_path)?;
        tri.free();
        // This task is done, so another one can take its place.
        self.sync.can_run.set();
        Ok(())
    }
}
