//! Line dispatcher
//!
//! Reads the input stream line by line and hands each line to the worker
//! with the fewest pending tasks. Completion events from the workers are
//! consumed in the same loop, so pending counts stay current while input
//! is still being read. At end of input every worker is told to shut down
//! and the dispatcher waits for all of them to drain.

use crate::mailbox;
use crate::pipeline::{EnrichmentPipeline, PipelineSettings};
use crate::sink::OutputSink;
use crate::worker::{spawn_worker, WorkerEvent, WorkerHandle, WorkerReport};
use enrich_common::types::Credential;
use enrich_common::{EnrichError, Result};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{CpuRefreshKind, RefreshKind, System};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Default host load the worker pool is sized for.
pub const DEFAULT_TARGET_LOAD: f64 = 0.8;

/// Number of workers for a host with `cpu_count` CPUs and a one-minute load
/// average of `load`: `round(cpus * target / max(load, 1))`, within `[1, cpus]`.
pub fn desired_worker_count(cpu_count: usize, load: f64, target_load: f64) -> usize {
    let cpus = cpu_count.max(1);
    let raw = (cpus as f64 * target_load / load.max(1.0)).round();
    if !raw.is_finite() || raw < 1.0 {
        return 1;
    }
    (raw as usize).clamp(1, cpus)
}

/// Host CPU count and load average at startup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostLoad {
    pub cpu_count: usize,
    pub load_one: f64,
}

impl HostLoad {
    pub fn sample() -> Self {
        let system =
            System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::new()));
        let cpu_count = match system.cpus().len() {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };

        Self {
            cpu_count,
            load_one: System::load_average().one,
        }
    }

    pub fn worker_count(&self, target_load: f64) -> usize {
        desired_worker_count(self.cpu_count, self.load_one, target_load)
    }
}

#[derive(Debug)]
struct DispatchEntry<H> {
    handle: H,
    pending: usize,
}

/// Workers and their pending task counts.
///
/// Assignment always picks the smallest pending count; ties go to the
/// earliest entry.
#[derive(Debug)]
pub struct DispatchTable<H> {
    entries: Vec<DispatchEntry<H>>,
}

impl<H> Default for DispatchTable<H> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<H> DispatchTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: H) {
        self.entries.push(DispatchEntry { handle, pending: 0 });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the least-loaded entry
    pub fn least_loaded(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| entry.pending)
            .map(|(index, _)| index)
    }

    /// Pick the least-loaded entry and count one more pending task on it.
    pub fn assign(&mut self) -> Option<(usize, &H)> {
        let index = self.least_loaded()?;
        let entry = &mut self.entries[index];
        entry.pending += 1;
        Some((index, &entry.handle))
    }

    /// Count one task finished on entry `index`.
    pub fn complete(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.pending = entry.pending.saturating_sub(1);
        }
    }

    pub fn pending(&self, index: usize) -> Option<usize> {
        self.entries.get(index).map(|entry| entry.pending)
    }

    pub fn total_pending(&self) -> usize {
        self.entries.iter().map(|entry| entry.pending).sum()
    }

    pub fn handles(&self) -> impl Iterator<Item = &H> {
        self.entries.iter().map(|entry| &entry.handle)
    }

    pub fn into_handles(self) -> impl Iterator<Item = H> {
        self.entries.into_iter().map(|entry| entry.handle)
    }
}

/// Result of one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub lines_dispatched: u64,
    pub workers: usize,
    pub enriched: u64,
    pub parse_dropped: u64,
    pub validation_dropped: u64,
    pub exhausted: u64,
    pub write_failed: u64,
    pub aborted: u64,
    pub elapsed: Duration,
}

impl Summary {
    fn absorb(&mut self, report: &WorkerReport) {
        self.enriched += report.enriched;
        self.parse_dropped += report.parse_dropped;
        self.validation_dropped += report.validation_dropped;
        self.exhausted += report.exhausted;
        self.write_failed += report.write_failed;
        self.aborted += report.aborted;
    }
}

/// Open the input file, reporting a missing file as [`EnrichError::InputNotFound`].
pub async fn open_input(path: &Path) -> Result<BufReader<File>> {
    if !path.exists() {
        return Err(EnrichError::InputNotFound(path.to_path_buf()));
    }
    let file = File::open(path).await?;
    Ok(BufReader::new(file))
}

pub struct Dispatcher {
    settings: PipelineSettings,
    credentials: Arc<[Credential]>,
    sink: Arc<OutputSink>,
    worker_count: usize,
}

impl Dispatcher {
    pub fn new(
        settings: PipelineSettings,
        credentials: Vec<Credential>,
        sink: Arc<OutputSink>,
        worker_count: usize,
    ) -> Self {
        Self {
            settings,
            credentials: Arc::from(credentials),
            sink,
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Dispatch every line of `input` and wait for all of them to finish.
    pub async fn run<R>(&self, input: R) -> Result<Summary>
    where
        R: AsyncBufRead + Unpin,
    {
        let started = Instant::now();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let mut table = DispatchTable::new();
        for id in 0..self.worker_count {
            let pipeline = EnrichmentPipeline::new(
                id,
                self.settings.clone(),
                Arc::clone(&self.credentials),
                Arc::clone(&self.sink),
            )?;
            table.push(spawn_worker(id, Arc::new(pipeline), events_tx.clone()));
        }
        // Only workers hold senders now; the channel closes once they all exit.
        drop(events_tx);

        info!(workers = self.worker_count, "Starting with {} workers", self.worker_count);

        let mut lines = input.lines();
        let mut dispatched: u64 = 0;

        loop {
            tokio::select! {
                biased;

                Some(event) = events_rx.recv() => handle_event(&mut table, event),

                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        dispatched += 1;
                        dispatch_line(&mut table, line, dispatched)?;
                    },
                    Ok(None) => break,
                    Err(e) => {
                        error!(line = dispatched + 1, error = %e, "Failed to read input; stopping dispatch");
                        break;
                    },
                },
            }
        }

        info!(lines = dispatched, "All lines dispatched; waiting for workers to drain");
        for handle in table.handles() {
            handle.shutdown();
        }

        while let Some(event) = events_rx.recv().await {
            handle_event(&mut table, event);
        }

        let mut summary = Summary {
            lines_dispatched: dispatched,
            workers: table.len(),
            ..Summary::default()
        };

        let joins = table.into_handles().map(|handle| {
            let id = handle.id();
            async move { (id, handle.join().await) }
        });
        for (id, joined) in join_all(joins).await {
            match joined {
                Ok(report) => {
                    debug!(worker = id, report = ?report, "Worker report");
                    summary.absorb(&report);
                },
                Err(e) => error!(worker = id, error = %e, "Worker task failed"),
            }
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}

fn dispatch_line(
    table: &mut DispatchTable<WorkerHandle>,
    line: String,
    number: u64,
) -> Result<()> {
    let (index, handle) = table
        .assign()
        .ok_or_else(|| EnrichError::config("no workers available for dispatch"))?;

    if !handle.send_line(line) {
        warn!(worker = handle.id(), line = number, "Worker is gone; line dropped");
        table.complete(index);
        return Ok(());
    }

    debug!(
        worker = index,
        line = number,
        pending = table.pending(index).unwrap_or_default(),
        "Assigned line to worker"
    );
    Ok(())
}

fn handle_event(table: &mut DispatchTable<WorkerHandle>, event: WorkerEvent) {
    match event {
        WorkerEvent::TaskCompleted { worker_id } => {
            table.complete(worker_id);
            debug!(
                worker = worker_id,
                remaining = table.pending(worker_id).unwrap_or_default(),
                "Worker completed a task"
            );
        },
        WorkerEvent::EmailsExtracted {
            worker_id,
            name,
            emails,
        } => mailbox::report(worker_id, &name, &emails),
    }
}
