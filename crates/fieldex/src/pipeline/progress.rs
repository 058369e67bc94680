use std::sync::atomic::{AtomicUsize, Ordering};

use log::{info, warn};

/// Events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    BatchStarted {
        total: usize,
    },
    DocumentStarted {
        document: String,
    },
    DocumentFinished {
        document: String,
        problems: usize,
    },
    Phase {
        message: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes progress to the log as "[n/total] document".
#[derive(Default)]
pub struct LogProgress {
    total: AtomicUsize,
    done: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BatchStarted { total } => {
                self.total.store(total, Ordering::Relaxed);
                self.done.store(0, Ordering::Relaxed);
                info!("Processing {} document(s)", total);
            }
            ProgressEvent::DocumentStarted { .. } => {}
            ProgressEvent::DocumentFinished { document, problems } => {
                let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
                let total = self.total.load(Ordering::Relaxed);
                if problems > 0 {
                    warn!("[{}/{}] {} ({} problem(s))", done, total, document, problems);
                } else {
                    info!("[{}/{}] {}", done, total, document);
                }
            }
            ProgressEvent::Phase { message } => info!("{}", message),
        }
    }
}
