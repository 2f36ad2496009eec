//! Contact enrichment ingest library
//!
//! Reads a `;`-separated file of people, spreads the lines over a pool of
//! workers, enriches every record through the contact enrichment API and
//! appends the merged result to an output file in the same line format.
//!
//! # Components
//!
//! - **dispatcher**: sizes the worker pool and hands lines to the least-loaded worker
//! - **worker**: runs each line as a task through its pipeline
//! - **pipeline**: parse, validate, enrich with retries, merge, persist
//! - **throttle**: per-worker adaptive limit on concurrent API calls
//!
//! # Example
//!
//! ```no_run
//! use enrich_ingest::config::IngestConfig;
//! use enrich_ingest::dispatcher::{open_input, Dispatcher};
//! use enrich_ingest::sink::OutputSink;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::load()?;
//!     config.validate()?;
//!
//!     let sink = Arc::new(OutputSink::open(&config.output_path).await?);
//!     let dispatcher = Dispatcher::new(
//!         config.pipeline_settings(),
//!         config.credentials.clone(),
//!         sink,
//!         4,
//!     );
//!     let summary = dispatcher.run(open_input(Path::new("people.txt")).await?).await?;
//!     println!("{} lines in {:?}", summary.lines_dispatched, summary.elapsed);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod mailbox;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod throttle;
pub mod validation;
pub mod worker;

pub use dispatcher::{Dispatcher, Summary};
pub use pipeline::{EnrichmentPipeline, RecordOutcome};
