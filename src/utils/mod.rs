pub mod balloonpipe_toml;
pub mod config;
pub mod fd_limit;
pub mod logger;
pub mod tempfiles;
pub mod tool_env;

pub use config::*;
pub use fd_limit::{FDS_PER_WORKER, max_open_fds, max_workers_by_fd_limit, resolve_worker_count};
pub use logger::setup_logging;
pub use tempfiles::{Artifact, ArtifactDir};
pub use tool_env::tool_from_env;
