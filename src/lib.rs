//! Balloonpipe: batch 3D coordinate generation with an order-preserving worker pipeline.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod store;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use error::{ConversionError, ItemError, PipelineError, StoreError};
pub use types::*;

use log::debug;
use std::path::Path;
use std::sync::Arc;

use engine::converter::Converter;
use pipeline::{PipelineTuning, RunHooks, RunOutcome};
use store::{ItemStore, RecordSink};
use utils::tempfiles::ArtifactDir;

/// Convert every record of `source` with `converter` and append the results to `sink` in input order.
///
/// Artifacts live in a fresh scratch directory under the system temp dir for the
/// duration of the run. Use [`pipeline::run_pipeline`] directly to choose the directory.
///
/// ```ignore
/// let store = Arc::new(SdfStore::new());
/// let sink = SdfWriter::create(Path::new("out.sdf"))?;
/// let tool = Arc::new(BalloonRunner::new("balloon", 60));
/// let tuning = PipelineTuning { num_workers: 4, ..Default::default() };
/// let outcome = balloonpipe::convert_collection(Path::new("in.sdf"), store, sink, tool, &tuning, &RunHooks::default())?;
/// println!("{} failed", outcome.report.failures.len());
/// ```
pub fn convert_collection<S, W, C>(
    source: &Path,
    store: Arc<S>,
    sink: W,
    converter: Arc<C>,
    tuning: &PipelineTuning,
    hooks: &RunHooks,
) -> Result<RunOutcome<W>, PipelineError>
where
    S: ItemStore,
    W: RecordSink<S::Record>,
    C: Converter + ?Sized,
{
    debug!(
        "{} TUNING:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        tuning
    );
    let artifacts = Arc::new(ArtifactDir::new()?);
    pipeline::run_pipeline(source, store, sink, converter, artifacts, tuning, hooks)
}
