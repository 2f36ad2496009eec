//! Enrichment workers
//!
//! A worker is a long-lived task fed lines by the dispatcher. Each line runs
//! as its own task through the worker's [`EnrichmentPipeline`], so many
//! records are in flight at once; the pipeline's throttle bounds how many of
//! them are talking to the API. Every finished record is reported back to the
//! dispatcher as a [`WorkerEvent`].

use crate::pipeline::{EnrichmentPipeline, RecordOutcome};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info};

/// Dispatcher to worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    Line(String),
    /// Stop accepting lines, finish in-flight ones, then exit
    Shutdown,
}

/// Worker to dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// One line finished, whatever its outcome
    TaskCompleted { worker_id: usize },
    EmailsExtracted {
        worker_id: usize,
        name: String,
        emails: Vec<String>,
    },
}

/// Per-outcome counts for one worker's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub lines_received: u64,
    pub enriched: u64,
    pub parse_dropped: u64,
    pub validation_dropped: u64,
    pub exhausted: u64,
    pub write_failed: u64,
    /// Record tasks that panicked
    pub aborted: u64,
}

impl WorkerReport {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Self::default()
        }
    }

    pub fn tally(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Enriched { .. } => self.enriched += 1,
            RecordOutcome::ParseDrop => self.parse_dropped += 1,
            RecordOutcome::ValidationDrop(_) => self.validation_dropped += 1,
            RecordOutcome::Exhausted { .. } => self.exhausted += 1,
            RecordOutcome::WriteFailed(_) => self.write_failed += 1,
        }
    }

    /// Lines that reached a final outcome
    pub fn completed(&self) -> u64 {
        self.enriched
            + self.parse_dropped
            + self.validation_dropped
            + self.exhausted
            + self.write_failed
            + self.aborted
    }
}

/// Dispatcher-side handle to a running worker
#[derive(Debug)]
pub struct WorkerHandle {
    id: usize,
    sender: mpsc::UnboundedSender<WorkerMessage>,
    join: JoinHandle<WorkerReport>,
}

impl WorkerHandle {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Queue a line. Returns `false` if the worker has already exited.
    pub fn send_line(&self, line: String) -> bool {
        self.sender.send(WorkerMessage::Line(line)).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(WorkerMessage::Shutdown);
    }

    /// Wait for the worker to drain and exit.
    pub async fn join(self) -> Result<WorkerReport, JoinError> {
        self.join.await
    }
}

/// Start a worker task around `pipeline`.
pub fn spawn_worker(
    id: usize,
    pipeline: Arc<EnrichmentPipeline>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) -> WorkerHandle {
    let (sender, inbox) = mpsc::unbounded_channel();
    let join = tokio::spawn(run_worker(id, pipeline, inbox, events));
    WorkerHandle { id, sender, join }
}

async fn run_worker(
    id: usize,
    pipeline: Arc<EnrichmentPipeline>,
    mut inbox: mpsc::UnboundedReceiver<WorkerMessage>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) -> WorkerReport {
    let mut report = WorkerReport::new(id);
    let mut tasks: JoinSet<RecordOutcome> = JoinSet::new();
    let mut accepting = true;

    info!(worker = id, "Worker started");

    while accepting {
        tokio::select! {
            message = inbox.recv() => match message {
                Some(WorkerMessage::Line(line)) => {
                    report.lines_received += 1;
                    debug!(worker = id, in_flight = tasks.len() + 1, "Worker received a line");
                    let pipeline = Arc::clone(&pipeline);
                    tasks.spawn(async move { pipeline.process_line(&line).await });
                },
                Some(WorkerMessage::Shutdown) | None => accepting = false,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                finish_task(id, joined, &mut report, &events);
            },
        }
    }

    debug!(worker = id, remaining = tasks.len(), "Worker draining");
    while let Some(joined) = tasks.join_next().await {
        finish_task(id, joined, &mut report, &events);
    }

    info!(
        worker = id,
        lines = report.lines_received,
        enriched = report.enriched,
        exhausted = report.exhausted,
        "Worker finished"
    );
    report
}

fn finish_task(
    id: usize,
    joined: Result<RecordOutcome, JoinError>,
    report: &mut WorkerReport,
    events: &mpsc::UnboundedSender<WorkerEvent>,
) {
    match joined {
        Ok(outcome) => {
            report.tally(&outcome);
            if let RecordOutcome::Enriched { name, emails } = outcome {
                let _ = events.send(WorkerEvent::EmailsExtracted {
                    worker_id: id,
                    name,
                    emails,
                });
            }
        },
        Err(e) => {
            report.aborted += 1;
            error!(worker = id, error = %e, "Record task failed");
        },
    }

    // The dispatcher may already be gone during shutdown.
    let _ = events.send(WorkerEvent::TaskCompleted { worker_id: id });
}
