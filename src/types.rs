//! Public and internal types for the balloonpipe API and pipeline.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ItemError;
use crate::utils::config::{ChannelConsts, ShutdownConsts, ToolConsts};
use crate::utils::tempfiles::Artifact;

/// What one positioned item carries. Exactly one variant is live.
#[derive(Debug)]
pub enum Payload<T> {
    Value(T),
    /// Intentionally empty (e.g. a blank record in the source). Skipped without a report entry.
    Empty,
    Failure(ItemError),
}

/// A payload tagged with its input position. Positions start at 1 and are dense.
#[derive(Debug)]
pub struct PositionedItem<T> {
    pub position: u64,
    pub payload: Payload<T>,
}

impl<T> PositionedItem<T> {
    pub fn value(position: u64, value: T) -> Self {
        Self {
            position,
            payload: Payload::Value(value),
        }
    }

    pub fn empty(position: u64) -> Self {
        Self {
            position,
            payload: Payload::Empty,
        }
    }

    pub fn failure(position: u64, err: impl Into<ItemError>) -> Self {
        Self {
            position,
            payload: Payload::Failure(err.into()),
        }
    }
}

/// Channel message: a work item or the end-of-work marker of one stage instance.
#[derive(Debug)]
pub enum Message<T> {
    Item(PositionedItem<T>),
    EndOfWork,
}

/// Value flowing through the pipeline: a temporary artifact plus the data to restore on it.
#[derive(Debug)]
pub struct Job<A> {
    pub artifact: Artifact,
    pub annotations: A,
}

/// Outcome of one pipeline run.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    /// Output collection path, when the caller wrote to a file.
    pub output: Option<PathBuf>,
    /// Positions produced from the source.
    pub total: u64,
    /// Positions whose converted records were appended.
    pub converted: u64,
    /// Records appended (greater than `converted` when several conformers are kept).
    pub records_written: u64,
    /// Positions skipped as empty.
    pub empty: u64,
    /// Position → reason for every failed item.
    #[serde(serialize_with = "serialize_failures")]
    pub failures: BTreeMap<u64, ItemError>,
    pub cancelled: bool,
    /// Largest reorder-buffer size seen during the run.
    pub peak_buffered: usize,
    /// Workers still running after the grace period.
    pub abandoned_workers: usize,
}

impl RunReport {
    pub fn failed_positions(&self) -> Vec<u64> {
        self.failures.keys().copied().collect()
    }
}

#[derive(Serialize)]
struct FailureEntry<'a> {
    position: u64,
    kind: &'a str,
    reason: String,
}

fn serialize_failures<S>(failures: &BTreeMap<u64, ItemError>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;
    let mut seq = s.serialize_seq(Some(failures.len()))?;
    for (position, err) in failures {
        seq.serialize_element(&FailureEntry {
            position: *position,
            kind: err.kind(),
            reason: err.to_string(),
        })?;
    }
    seq.end()
}

/// Full options (CLI, config file and environment merged).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Output path. When None, derived from the input name (`<stem>_3d.<ext>`, never overwriting).
    pub output: Option<PathBuf>,
    /// External converter executable.
    pub tool: PathBuf,
    /// Target conformers per record.
    pub conformers: u32,
    /// Override worker count. When None, available parallelism capped by the FD limit.
    pub num_workers: Option<usize>,
    /// Capacity of each pipeline channel.
    pub channel_cap: usize,
    /// Per-conversion timeout in seconds (0 = default).
    pub timeout_secs: u64,
    /// How long to wait for lingering workers after the run is otherwise done.
    pub grace_period: Duration,
    /// Write the failure report as JSON here.
    pub report_path: Option<PathBuf>,
    /// Debug logging and progress bar.
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            output: None,
            tool: PathBuf::from(ToolConsts::DEFAULT_PROGRAM),
            conformers: ToolConsts::DEFAULT_CONFORMERS,
            num_workers: None,
            channel_cap: ChannelConsts::DEFAULT_CAP,
            timeout_secs: ToolConsts::DEFAULT_TIMEOUT_SECS,
            grace_period: ShutdownConsts::GRACE_PERIOD,
            report_path: None,
            verbose: false,
        }
    }
}
