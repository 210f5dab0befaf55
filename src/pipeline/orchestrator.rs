use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::engine::converter::Converter;
use crate::error::PipelineError;
use crate::pipeline;
use crate::pipeline::{FIRST_POSITION, PipelineTuning, Reassembler, RunHooks};
use crate::store::{ItemStore, RecordSink};
use crate::types::RunReport;
use crate::utils::tempfiles::ArtifactDir;

/// Report plus the output sink, handed back once the collection is finalized.
pub struct RunOutcome<W> {
    pub report: RunReport,
    pub sink: W,
}

const WORKER_POLL: Duration = Duration::from_millis(10);

/// Poll until `handle` finishes or `deadline` passes. True if it finished.
fn finished_by<T>(handle: &JoinHandle<T>, deadline: Instant) -> bool {
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(WORKER_POLL);
    }
    handle.is_finished()
}

/// Wait up to `grace` for workers to exit, join those that did, and detach the rest.
/// Returns the number of abandoned workers.
pub fn shutdown_workers(worker_handles: Vec<JoinHandle<()>>, grace: Duration) -> usize {
    let deadline = Instant::now() + grace;
    while worker_handles.iter().any(|h| !h.is_finished()) && Instant::now() < deadline {
        std::thread::sleep(WORKER_POLL);
    }
    let mut abandoned = 0;
    for h in worker_handles {
        if h.is_finished() {
            if h.join().is_err() {
                warn!("a converter worker panicked");
            }
        } else {
            abandoned += 1;
        }
    }
    if abandoned > 0 {
        warn!(
            "{} workers still running after {:?}; abandoning them",
            abandoned, grace
        );
    }
    debug!("{} worker threads still alive", abandoned);
    abandoned
}

/// Run the whole pipeline over `source`:
/// producer → input channel → workers (converter) → output channel → reassembler → `sink`.
///
/// Per-item failures are recorded in the report; the run fails only when the tuning is invalid,
/// the source cannot be opened or read, or the output cannot be written.
pub fn run_pipeline<S, W, C>(
    source: &Path,
    store: Arc<S>,
    sink: W,
    converter: Arc<C>,
    artifacts: Arc<ArtifactDir>,
    tuning: &PipelineTuning,
    hooks: &RunHooks,
) -> Result<RunOutcome<W>, PipelineError>
where
    S: ItemStore,
    W: RecordSink<S::Record>,
    C: Converter + ?Sized,
{
    tuning.validate()?;
    let total = store.count(source);
    debug!(
        "pipeline: {} workers, channel cap {}, {} records expected",
        tuning.num_workers,
        tuning.channel_cap,
        total.map_or_else(|| "?".to_string(), |t| t.to_string())
    );

    let channels = pipeline::create_pipeline_channels::<S::Annotations>(tuning.channel_cap);

    // Held until the workers are joined: the directory goes away with the last reference.
    let scratch = Arc::clone(&artifacts);
    let producer_handle = pipeline::spawn_producer(
        Arc::clone(&store),
        source.to_path_buf(),
        artifacts,
        channels.input_tx,
        tuning.num_workers,
        hooks.cancel.clone(),
    );

    let worker_handles = pipeline::spawn_converter_workers(
        channels.input_rx,
        &channels.output_tx,
        converter,
        tuning.num_workers,
        tuning.conformers,
        &hooks.cancel,
    );

    // Only worker senders remain, so the reassembler sees exactly one marker per worker.
    drop(channels.output_tx);

    let reassembler_handle = pipeline::spawn_reassembler(
        Reassembler {
            store,
            sink,
            num_workers: tuning.num_workers,
            first_position: FIRST_POSITION,
            conformers: tuning.conformers,
            total,
            cancel: hooks.cancel.clone(),
            grace_period: tuning.grace_period,
            progress: hooks.progress.clone(),
        },
        channels.output_rx,
    );

    let reassembled = reassembler_handle
        .join()
        .map_err(|_| PipelineError::Thread("reassembler"))?;

    // The reassembler already spent the grace period on stuck workers; do not wait twice.
    let grace = if reassembled.report.abandoned_workers > 0 {
        Duration::ZERO
    } else {
        tuning.grace_period
    };
    let deadline = Instant::now() + grace;
    let produced = if finished_by(&producer_handle, deadline) {
        Some(
            producer_handle
                .join()
                .map_err(|_| PipelineError::Thread("producer"))?,
        )
    } else {
        warn!("producer still blocked after {:?}; abandoning it", grace);
        None
    };
    let abandoned = shutdown_workers(
        worker_handles,
        deadline.saturating_duration_since(Instant::now()),
    );
    drop(scratch);

    let mut report = reassembled.report;
    match produced {
        Some(p) => {
            if let Some(e) = p.stream_error {
                return Err(PipelineError::Stream(e));
            }
            report.total = p.produced;
        }
        // Only the positions the reassembler accounted for are known.
        None => report.total = report.converted + report.empty + report.failures.len() as u64,
    }
    if let Some(e) = reassembled.output_error {
        return Err(PipelineError::Output(e));
    }
    report.cancelled = hooks.cancel.is_cancelled();
    report.abandoned_workers = report.abandoned_workers.max(abandoned);
    info!(
        "converted {}/{} records ({} failed, {} empty{})",
        report.converted,
        report.total,
        report.failures.len(),
        report.empty,
        if report.cancelled { ", cancelled" } else { "" }
    );
    Ok(RunOutcome {
        report,
        sink: reassembled.sink,
    })
}
