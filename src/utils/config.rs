//! Application configuration constants.
//! Tuning and defaults in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    tool_env_var: String,
    scratch_prefix: String,
    artifact_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                tool_env_var: format!("{}_TOOL", pkg.to_uppercase()),
                scratch_prefix: format!("{pkg}-run-"),
                artifact_prefix: "balloon".to_string(),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable naming the external tool (e.g. `BALLOONPIPE_TOOL`).
    pub fn tool_env_var(&self) -> &str {
        &self.tool_env_var
    }

    pub fn scratch_prefix(&self) -> &str {
        &self.scratch_prefix
    }

    pub fn artifact_prefix(&self) -> &str {
        &self.artifact_prefix
    }
}

// ---- Worker threads ----

/// Thread limits for the converter pool.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from rayon.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available threads (from rayon); set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Minimum worker count.
    pub floor: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0,
            floor: Self::FLOOR_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const FLOOR_THREADS: usize = 1;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }
}

// ---- Channels ----

pub struct ChannelConsts;

impl ChannelConsts {
    /// Slots in each of the input and output channels.
    pub const DEFAULT_CAP: usize = 10;
}

// ---- External tool ----

pub struct ToolConsts;

impl ToolConsts {
    /// Executable looked up on PATH when nothing else is configured.
    pub const DEFAULT_PROGRAM: &'static str = "balloon";
    /// Per-conversion timeout (seconds) used when none, or zero, is configured.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
    /// How often a running child is polled for exit, timeout and cancellation.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(20);
    pub const DEFAULT_CONFORMERS: u32 = 1;
}

/// Effective per-conversion timeout; zero means "use the default".
pub fn effective_timeout(secs: u64) -> Duration {
    match secs {
        0 => Duration::from_secs(ToolConsts::DEFAULT_TIMEOUT_SECS),
        s => Duration::from_secs(s),
    }
}

// ---- Shutdown / progress ----

pub struct ShutdownConsts;

impl ShutdownConsts {
    /// How long the driver waits for workers after producer and reassembler are done.
    pub const GRACE_PERIOD: Duration = Duration::from_secs(5);
    /// How often a blocked reassembler looks at the cancellation flag.
    pub const CANCEL_POLL: Duration = Duration::from_millis(20);
}

pub struct ProgressConsts;

impl ProgressConsts {
    /// Log a remaining-time estimate every this many emitted items.
    pub const ETA_LOG_EVERY: u64 = 5;
}
