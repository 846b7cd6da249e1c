//! Startup worker for non-blocking model preparation.
//!
//! Loading cohorts and training forests can take a while, so it runs on a
//! background thread while the TUI keeps drawing the loading screen.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::adapters::csv::CsvCohortSource;
use crate::adapters::JsonModelStore;
use crate::application::{RiskContext, StartupStep};
use crate::config::Config;

/// Progress updates from the startup worker.
#[derive(Debug, Clone)]
pub enum StartupProgress {
    /// A preparation step has started
    Step(StartupStep),
    /// Context is ready for submissions
    Ready(Arc<RiskContext>),
    /// Startup failed
    Error(String),
}

/// Handle to a running startup worker.
pub struct StartupWorkerHandle {
    /// Receiver for progress updates
    pub progress_rx: Receiver<StartupProgress>,
    /// Thread handle (for joining)
    _handle: JoinHandle<()>,
}

impl StartupWorkerHandle {
    /// Try to receive the next progress update (non-blocking).
    #[must_use]
    pub fn try_recv(&self) -> Option<StartupProgress> {
        self.progress_rx.try_recv().ok()
    }
}

/// Worker that builds the [`RiskContext`] in the background.
pub struct StartupWorker;

impl StartupWorker {
    /// Spawn the startup task.
    ///
    /// Returns a handle to receive progress updates.
    pub fn spawn(config: Config) -> StartupWorkerHandle {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            Self::run_with_progress(&config, &tx);
        });

        StartupWorkerHandle {
            progress_rx: rx,
            _handle: handle,
        }
    }

    fn run_with_progress(config: &Config, tx: &Sender<StartupProgress>) {
        let source = CsvCohortSource::new(&config.data_dir);
        let store = JsonModelStore::new(&config.model_dir);

        let result = RiskContext::bootstrap(&source, &store, config, |step| {
            tracing::info!("{step}");
            let _ = tx.send(StartupProgress::Step(step));
        });

        match result {
            Ok(context) => {
                let _ = tx.send(StartupProgress::Ready(Arc::new(context)));
            }
            Err(e) => {
                tracing::error!(error = %e, "Startup failed");
                let _ = tx.send(StartupProgress::Error(e.to_string()));
            }
        }
    }
}
