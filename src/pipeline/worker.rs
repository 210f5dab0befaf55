//! Converter workers: take items from the input channel, run the converter, push results downstream.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::engine::converter::Converter;
use crate::types::{Job, Message, Payload, PositionedItem};
use crate::utils::tempfiles::Artifact;

use super::context::{CancelToken, MarkerGuard, discard_item, discard_message};

/// Convert one item. `Failure` and `Empty` pass through untouched; a converter error becomes a
/// `Failure` at the same position. The input artifact is consumed either way.
pub fn process_item<A, C: Converter + ?Sized>(
    item: PositionedItem<Job<A>>,
    converter: &C,
    conformers: u32,
    cancel: &CancelToken,
) -> PositionedItem<Job<A>> {
    let position = item.position;
    let Job {
        artifact,
        annotations,
    } = match item.payload {
        Payload::Value(job) => job,
        payload => return PositionedItem { position, payload },
    };

    let output = artifact.output_path(conformers);
    let result = converter.convert(artifact.path(), &output, conformers, cancel);
    artifact.discard();
    match result {
        Ok(()) => PositionedItem::value(
            position,
            Job {
                artifact: Artifact::adopt(output),
                annotations,
            },
        ),
        Err(e) => {
            warn!("item {} failed: {}", position, e);
            Artifact::adopt(output).discard();
            PositionedItem::failure(position, e)
        }
    }
}

/// Single worker: loop until this worker's end-of-work marker. Once cancellation is seen, remaining
/// items are drained and their artifacts removed without converting. One marker goes downstream on exit.
fn converter_worker_loop<A, C: Converter + ?Sized>(
    worker_id: usize,
    input_rx: Receiver<Message<Job<A>>>,
    output_tx: Sender<Message<Job<A>>>,
    converter: &C,
    conformers: u32,
    cancel: &CancelToken,
) {
    let marker = MarkerGuard::new(output_tx, 1);
    let mut draining = false;
    let mut converted = 0_u64;
    while let Ok(msg) = input_rx.recv() {
        let item = match msg {
            Message::EndOfWork => break,
            Message::Item(item) => item,
        };
        if draining {
            discard_item(item);
            continue;
        }
        let result = process_item(item, converter, conformers, cancel);
        converted += 1;
        if let Err(e) = marker.sender().send(Message::Item(result)) {
            warn!("worker {}: output channel closed", worker_id);
            discard_message(e.into_inner());
            draining = true;
        }
        if cancel.is_cancelled() && !draining {
            debug!("worker {}: cancellation observed, draining", worker_id);
            draining = true;
        }
    }
    debug!("worker {}: exiting after {} items", worker_id, converted);
}

/// Spawn `num_workers` converter workers sharing `input_rx`. Caller must drop its own `output_tx`
/// after this so the reassembler only counts worker markers.
pub fn spawn_converter_workers<A, C>(
    input_rx: Receiver<Message<Job<A>>>,
    output_tx: &Sender<Message<Job<A>>>,
    converter: Arc<C>,
    num_workers: usize,
    conformers: u32,
    cancel: &CancelToken,
) -> Vec<JoinHandle<()>>
where
    A: Send + 'static,
    C: Converter + ?Sized,
{
    (0..num_workers)
        .map(|worker_id| {
            let input_rx = input_rx.clone();
            let output_tx = output_tx.clone();
            let converter = Arc::clone(&converter);
            let cancel = cancel.clone();
            thread::spawn(move || {
                converter_worker_loop(
                    worker_id,
                    input_rx,
                    output_tx,
                    &*converter,
                    conformers,
                    &cancel,
                )
            })
        })
        .collect()
}
