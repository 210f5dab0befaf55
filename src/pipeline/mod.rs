//! Pipeline components: context, producer, converter workers, reassembler, driver.

pub mod context;
pub mod error_handler;
pub mod orchestrator;
pub mod producer;
pub mod reassembler;
pub mod worker;

pub use context::{
    CancelToken, MarkerGuard, PipelineChannels, PipelineTuning, RunHooks,
    create_pipeline_channels, discard_item, discard_message,
};
pub use error_handler::{log_failure_report, write_failure_report};
pub use orchestrator::{RunOutcome, run_pipeline, shutdown_workers};
pub use producer::{FIRST_POSITION, ProducerOutcome, run_producer_loop, spawn_producer};
pub use reassembler::{Reassembler, ReassemblyOutcome, ReorderBuffer, spawn_reassembler};
pub use worker::{process_item, spawn_converter_workers};
