//! Pipeline context and tuning: channels, cancellation, and the hooks passed into every stage.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::engine::progress::ProgressSink;
use crate::error::PipelineError;
use crate::types::{Job, Message, Payload, PositionedItem};
use crate::utils::config::{ChannelConsts, ShutdownConsts, ToolConsts};

/// Shared cooperative cancellation flag. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Worker count, channel capacity, conformers per record, and shutdown grace period.
#[derive(Clone, Debug)]
pub struct PipelineTuning {
    pub num_workers: usize,
    pub channel_cap: usize,
    pub conformers: u32,
    pub grace_period: Duration,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            num_workers: 1,
            channel_cap: ChannelConsts::DEFAULT_CAP,
            conformers: ToolConsts::DEFAULT_CONFORMERS,
            grace_period: ShutdownConsts::GRACE_PERIOD,
        }
    }
}

impl PipelineTuning {
    /// Reject configurations that cannot run. Checked before any thread starts.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.num_workers == 0 {
            return Err(PipelineError::InvalidArgument(
                "worker count must be at least 1".into(),
            ));
        }
        if self.channel_cap == 0 {
            return Err(PipelineError::InvalidArgument(
                "channel capacity must be at least 1".into(),
            ));
        }
        if self.conformers == 0 {
            return Err(PipelineError::InvalidArgument(
                "conformer count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Cancellation and progress collaborators shared by all stages.
#[derive(Clone, Default)]
pub struct RunHooks {
    pub cancel: CancelToken,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl RunHooks {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Both bounded channels. Producer gets `input_tx`, workers share `input_rx` and `output_tx`,
/// the reassembler owns `output_rx`.
pub struct PipelineChannels<A> {
    pub input_tx: Sender<Message<Job<A>>>,
    pub input_rx: Receiver<Message<Job<A>>>,
    pub output_tx: Sender<Message<Job<A>>>,
    pub output_rx: Receiver<Message<Job<A>>>,
}

pub fn create_pipeline_channels<A>(channel_cap: usize) -> PipelineChannels<A> {
    let (input_tx, input_rx) = bounded::<Message<Job<A>>>(channel_cap);
    let (output_tx, output_rx) = bounded::<Message<Job<A>>>(channel_cap);
    PipelineChannels {
        input_tx,
        input_rx,
        output_tx,
        output_rx,
    }
}

/// Sends `count` end-of-work markers when dropped, so every exit path of a stage (including a
/// panic while converting) still releases its downstream consumers.
pub struct MarkerGuard<T> {
    tx: Sender<Message<T>>,
    count: usize,
}

impl<T> MarkerGuard<T> {
    pub fn new(tx: Sender<Message<T>>, count: usize) -> Self {
        Self { tx, count }
    }

    pub fn sender(&self) -> &Sender<Message<T>> {
        &self.tx
    }
}

impl<T> Drop for MarkerGuard<T> {
    fn drop(&mut self) {
        for _ in 0..self.count {
            if self.tx.send(Message::EndOfWork).is_err() {
                break;
            }
        }
    }
}

/// Drop an item that will never be emitted, removing the artifact it owns.
pub fn discard_item<A>(item: PositionedItem<Job<A>>) {
    if let Payload::Value(job) = item.payload {
        job.artifact.discard();
    }
}

/// Same as [`discard_item`] for a raw channel message.
pub fn discard_message<A>(msg: Message<Job<A>>) {
    if let Message::Item(item) = msg {
        discard_item(item);
    }
}
