//! Load `.balloonpipe.toml` from a directory (CLI only). Lib callers pass options directly.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Deserialize)]
pub struct BalloonpipeToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    tool: Option<String>,
    conformers: Option<u32>,
    workers: Option<usize>,
    channel_cap: Option<usize>,
    timeout: Option<u64>,
    grace_period: Option<u64>,
    report: Option<String>,
    verbose: Option<bool>,
}

/// Load the config file from `dir` if present. Returns None if missing or unreadable.
pub fn load_balloonpipe_toml(dir: &Path) -> Option<BalloonpipeToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_balloonpipe_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub fn parse_balloonpipe_toml(s: &str) -> Result<BalloonpipeToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($set:expr, $opts:expr, $set_field:ident => $opts_field:ident) => {
        if let Some(v) = $set.$set_field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying env and CLI.
pub fn apply_file_to_opts(file: &BalloonpipeToml, opts: &mut Opts) {
    let set = &file.settings;
    if let Some(ref p) = set.tool {
        opts.tool = PathBuf::from(p);
    }
    apply_file_opt!(set, opts, conformers => conformers);
    if let Some(n) = set.workers {
        opts.num_workers = Some(n);
    }
    apply_file_opt!(set, opts, channel_cap => channel_cap);
    apply_file_opt!(set, opts, timeout => timeout_secs);
    if let Some(secs) = set.grace_period {
        opts.grace_period = Duration::from_secs(secs);
    }
    if let Some(ref p) = set.report {
        opts.report_path = Some(PathBuf::from(p));
    }
    apply_file_opt!(set, opts, verbose => verbose);
}

