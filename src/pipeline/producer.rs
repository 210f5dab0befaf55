//! Producer: streams records from the item store into the input channel, one position per record.

use crossbeam_channel::Sender;
use log::{debug, error, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{ItemError, StoreError};
use crate::store::ItemStore;
use crate::types::{Job, Message, PositionedItem};
use crate::utils::tempfiles::ArtifactDir;

use super::context::{CancelToken, MarkerGuard, discard_message};

/// Position given to the first record.
pub const FIRST_POSITION: u64 = 1;

/// What the producer did: positions sent, and the stream-level error that stopped it, if any.
#[derive(Debug, Default)]
pub struct ProducerOutcome {
    pub produced: u64,
    pub stream_error: Option<StoreError>,
}

/// Build the positioned item for one record read from the stream.
fn positioned_item<S: ItemStore>(
    store: &S,
    artifacts: &ArtifactDir,
    position: u64,
    read: Result<S::Record, StoreError>,
) -> PositionedItem<Job<S::Annotations>> {
    let record = match read {
        Ok(record) => record,
        Err(e) => {
            warn!("record {}: {}", position, e);
            return PositionedItem::failure(position, ItemError::Read(e.to_string()));
        }
    };
    if store.is_empty(&record) {
        debug!("record {} is empty", position);
        return PositionedItem::empty(position);
    }
    match store.materialize(&record, artifacts) {
        Ok(artifact) => PositionedItem::value(
            position,
            Job {
                artifact,
                annotations: store.annotations(&record),
            },
        ),
        Err(e) => {
            error!("record {}: {}", position, e);
            PositionedItem::failure(position, ItemError::Materialize(e.to_string()))
        }
    }
}

/// Run the producer: Streaming until the source ends or cancellation, then Draining (one marker
/// per worker, sent by the guard), then Done. Per-record failures travel as `Failure` items;
/// a source that cannot be opened or read ends the stream with `stream_error`.
pub fn run_producer_loop<S: ItemStore>(
    store: &S,
    source: &Path,
    artifacts: &ArtifactDir,
    input_tx: Sender<Message<Job<S::Annotations>>>,
    num_workers: usize,
    cancel: &CancelToken,
) -> ProducerOutcome {
    let markers = MarkerGuard::new(input_tx, num_workers);
    let mut outcome = ProducerOutcome::default();

    let mut records = match store.open(source) {
        Ok(records) => records,
        Err(e) => {
            error!("cannot open {}: {}", source.display(), e);
            outcome.stream_error = Some(e);
            return outcome;
        }
    };

    let mut position = FIRST_POSITION - 1;
    while !cancel.is_cancelled() {
        let read = match records.next() {
            None => break,
            // The reader itself failed; nothing after this point can be trusted.
            Some(Err(e @ StoreError::Io { .. })) => {
                error!("reading {} failed after record {}: {}", source.display(), position, e);
                outcome.stream_error = Some(e);
                break;
            }
            Some(read) => read,
        };
        position += 1;
        let item = positioned_item(store, artifacts, position, read);
        if let Err(e) = markers.sender().send(Message::Item(item)) {
            // Every worker is gone; nothing will consume further items.
            warn!("input channel closed at record {}", position);
            discard_message(e.into_inner());
            break;
        }
        outcome.produced = position;
    }
    if cancel.is_cancelled() {
        debug!("producer: cancelled after {} records", outcome.produced);
    } else {
        debug!("producer: source exhausted, {} records", outcome.produced);
    }
    outcome
}

/// Spawn the producer thread. Markers are always sent before the thread ends.
pub fn spawn_producer<S: ItemStore>(
    store: Arc<S>,
    source: PathBuf,
    artifacts: Arc<ArtifactDir>,
    input_tx: Sender<Message<Job<S::Annotations>>>,
    num_workers: usize,
    cancel: CancelToken,
) -> JoinHandle<ProducerOutcome> {
    thread::spawn(move || {
        run_producer_loop(&*store, &source, &artifacts, input_tx, num_workers, &cancel)
    })
}
