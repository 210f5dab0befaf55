//! Reassembler: restores input order from out-of-order worker results and writes the output collection.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::engine::progress::{ProgressClock, ProgressSink};
use crate::error::{ItemError, StoreError};
use crate::store::{ItemStore, RecordSink};
use crate::types::{Job, Message, Payload, PositionedItem, RunReport};
use crate::utils::config::ShutdownConsts;

use super::context::{CancelToken, discard_item};

/// Out-of-order holding area keyed by position, plus end-of-work marker accounting.
///
/// Its size is unbounded in the worst case (every worker but the one holding `next` keeps
/// finishing); `peak` records the largest size seen.
///
/// With [`ReorderBuffer::with_shutdown`], markers are only awaited for a grace period once
/// cancellation is seen; markers still missing then count as abandoned workers.
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, PositionedItem<T>>,
    markers_seen: usize,
    expected_markers: usize,
    peak: usize,
    shutdown: Option<(CancelToken, Duration)>,
    deadline: Option<Instant>,
    abandoned: usize,
}

impl<T> ReorderBuffer<T> {
    pub fn new(first_position: u64, expected_markers: usize) -> Self {
        Self {
            next: first_position,
            pending: BTreeMap::new(),
            markers_seen: 0,
            expected_markers,
            peak: 0,
            shutdown: None,
            deadline: None,
            abandoned: 0,
        }
    }

    pub fn with_shutdown(mut self, cancel: CancelToken, grace: Duration) -> Self {
        self.shutdown = Some((cancel, grace));
        self
    }

    pub fn next_position(&self) -> u64 {
        self.next
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn markers_seen(&self) -> usize {
        self.markers_seen
    }

    /// Markers given up on after the grace period.
    pub fn abandoned(&self) -> usize {
        self.abandoned
    }

    fn receive(&mut self, rx: &Receiver<Message<T>>) -> Result<Message<T>, RecvTimeoutError> {
        loop {
            let (cancelled, grace) = match &self.shutdown {
                None => return rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                Some((cancel, grace)) => (cancel.is_cancelled(), *grace),
            };
            if cancelled && self.deadline.is_none() {
                self.deadline = Some(Instant::now() + grace);
            }
            match self.deadline {
                Some(deadline) => return rx.recv_deadline(deadline),
                None => match rx.recv_timeout(ShutdownConsts::CANCEL_POLL) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    other => return other,
                },
            }
        }
    }

    /// Next item in position order, pulling from `rx` as needed. Buffered items are preferred
    /// over blocking on the channel. Returns None once every marker is in and the buffer is empty.
    pub fn next_in_order(&mut self, rx: &Receiver<Message<T>>) -> Option<PositionedItem<T>> {
        loop {
            if let Some(item) = self.pending.remove(&self.next) {
                self.next += 1;
                return Some(item);
            }
            if self.markers_seen >= self.expected_markers {
                // Nothing more can arrive; whatever is left sits behind a gap.
                let (&pos, _) = self.pending.first_key_value()?;
                warn!("position {} never arrived; resuming at {}", self.next, pos);
                self.next = pos;
                continue;
            }
            match self.receive(rx) {
                Ok(Message::EndOfWork) => self.markers_seen += 1,
                Ok(Message::Item(item)) if item.position == self.next => {
                    self.next += 1;
                    return Some(item);
                }
                Ok(Message::Item(item)) => {
                    debug_assert!(item.position > self.next, "position {} repeated", item.position);
                    self.pending.insert(item.position, item);
                    self.peak = self.peak.max(self.pending.len());
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.abandoned = self.expected_markers - self.markers_seen;
                    warn!(
                        "{} workers did not stop within the grace period",
                        self.abandoned
                    );
                    self.markers_seen = self.expected_markers;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    error!(
                        "output channel closed after {}/{} markers",
                        self.markers_seen, self.expected_markers
                    );
                    self.markers_seen = self.expected_markers;
                }
            }
        }
    }
}

/// What the reassembler hands back: the sink, its part of the report, and a fatal write error.
pub struct ReassemblyOutcome<W> {
    pub sink: W,
    pub report: RunReport,
    pub output_error: Option<StoreError>,
}

/// Everything the reassembler thread owns.
pub struct Reassembler<S: ItemStore, W> {
    pub store: Arc<S>,
    pub sink: W,
    pub num_workers: usize,
    pub first_position: u64,
    pub conformers: u32,
    pub total: Option<u64>,
    pub cancel: CancelToken,
    /// How long to wait for worker markers once the run is cancelled.
    pub grace_period: Duration,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl<S, W> Reassembler<S, W>
where
    S: ItemStore,
    W: RecordSink<S::Record>,
{
    /// Append one converted item. All conformers are kept when more than one was requested.
    fn write_value(
        &mut self,
        position: u64,
        job: Job<S::Annotations>,
        report: &mut RunReport,
    ) -> Result<(), StoreError> {
        let Job {
            artifact,
            annotations,
        } = job;
        let loaded = self.store.load(artifact.path());
        artifact.discard();
        let mut records = match loaded {
            Ok(records) => records,
            Err(e) => {
                warn!("item {} failed: {}", position, e);
                report
                    .failures
                    .insert(position, ItemError::Load(e.to_string()));
                return Ok(());
            }
        };
        if self.conformers == 1 {
            records.truncate(1);
        }
        for record in &mut records {
            self.store.annotate(record, &annotations);
            self.sink.append(record)?;
            report.records_written += 1;
        }
        report.converted += 1;
        Ok(())
    }

    fn emit(
        &mut self,
        item: PositionedItem<Job<S::Annotations>>,
        report: &mut RunReport,
    ) -> Result<(), StoreError> {
        let position = item.position;
        match item.payload {
            Payload::Value(job) => self.write_value(position, job, report)?,
            Payload::Empty => report.empty += 1,
            Payload::Failure(err) => {
                warn!("item {} failed: {}", position, err);
                report.failures.insert(position, err);
            }
        }
        Ok(())
    }

    /// Drain the output channel until every worker marker is in. After cancellation (or a write
    /// error, which raises cancellation) items are discarded instead of emitted.
    pub fn run(mut self, output_rx: Receiver<Message<Job<S::Annotations>>>) -> ReassemblyOutcome<W> {
        let mut order = ReorderBuffer::new(self.first_position, self.num_workers)
            .with_shutdown(self.cancel.clone(), self.grace_period);
        let mut report = RunReport::default();
        let mut output_error: Option<StoreError> = None;
        let clock = ProgressClock::start();
        let mut done = 0_u64;

        while let Some(item) = order.next_in_order(&output_rx) {
            if self.cancel.is_cancelled() {
                discard_item(item);
                continue;
            }
            if let Err(e) = self.emit(item, &mut report) {
                error!("write failed: {}", e);
                output_error = Some(e);
                self.cancel.cancel();
                continue;
            }
            done += 1;
            if let Some(progress) = &self.progress {
                progress.report(done, self.total, clock.remaining(done, self.total));
            }
        }
        debug!(
            "reassembler: {} markers, {} emitted, peak reorder buffer {}",
            order.markers_seen(),
            done,
            order.peak()
        );

        if let Err(e) = self.sink.finish() {
            error!("finalizing output failed: {}", e);
            output_error.get_or_insert(e);
        }
        report.peak_buffered = order.peak();
        report.abandoned_workers = order.abandoned();
        ReassemblyOutcome {
            sink: self.sink,
            report,
            output_error,
        }
    }
}

/// Spawn the reassembler thread; it returns the sink once the output collection is finalized.
pub fn spawn_reassembler<S, W>(
    reassembler: Reassembler<S, W>,
    output_rx: Receiver<Message<Job<S::Annotations>>>,
) -> JoinHandle<ReassemblyOutcome<W>>
where
    S: ItemStore,
    W: RecordSink<S::Record>,
{
    thread::spawn(move || reassembler.run(output_rx))
}
