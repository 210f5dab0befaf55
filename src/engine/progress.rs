//! Progress reporting: the sink the reassembler reports to, ETA math, and a kdam-backed bar.

use kdam::{Animation, Bar, BarExt};
use log::debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::utils::config::ProgressConsts;

/// Receives `(items_done, items_total, estimated_time_remaining)` after every emitted item.
pub trait ProgressSink: Send + Sync {
    fn report(&self, done: u64, total: Option<u64>, remaining: Option<Duration>);
}

impl<F> ProgressSink for F
where
    F: Fn(u64, Option<u64>, Option<Duration>) + Send + Sync,
{
    fn report(&self, done: u64, total: Option<u64>, remaining: Option<Duration>) {
        self(done, total, remaining)
    }
}

/// Linear extrapolation of the time left from the average time per item so far.
pub fn estimate_remaining(elapsed: Duration, done: u64, total: u64) -> Option<Duration> {
    if done == 0 || done > total {
        return None;
    }
    let per_item = elapsed.as_secs_f64() / done as f64;
    Some(Duration::from_secs_f64(per_item * (total - done) as f64))
}

/// Human-readable remaining time, e.g. `about 2 min 5 sec remaining`.
pub fn format_remaining(remaining: Option<Duration>) -> String {
    match remaining {
        None => "unknown time remaining".to_string(),
        Some(d) => {
            let secs = d.as_secs();
            match (secs / 3600, (secs % 3600) / 60, secs % 60) {
                (0, 0, s) => format!("about {s} sec remaining"),
                (0, m, s) => format!("about {m} min {s} sec remaining"),
                (h, m, _) => format!("about {h} h {m} min remaining"),
            }
        }
    }
}

/// Tracks the run start so the reassembler can attach an ETA to each report.
pub struct ProgressClock {
    started: Instant,
}

impl Default for ProgressClock {
    fn default() -> Self {
        Self::start()
    }
}

impl ProgressClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn remaining(&self, done: u64, total: Option<u64>) -> Option<Duration> {
        total.and_then(|t| estimate_remaining(self.started.elapsed(), done, t))
    }
}

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a progress bar; `total` of 0 shows a plain counter.
pub fn create_progress_bar(total: usize, desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = total,
        desc = desc,
        animation = Animation::Classic,
        unit = " records"
    )))
}

/// Force a refresh of the bar (e.g. so it shows 0 immediately).
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}

/// Terminal progress sink. Uses try_lock so a contended bar never stalls the reassembler.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(total: Option<u64>) -> Self {
        let bar = create_progress_bar(total.unwrap_or(0) as usize, "Generating 3D");
        refresh_bar(&bar);
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, done: u64, total: Option<u64>, remaining: Option<Duration>) {
        if let Ok(mut bar) = self.bar.try_lock() {
            let _ = bar.update_to(done as usize);
        }
        if done.is_multiple_of(ProgressConsts::ETA_LOG_EVERY) {
            match total {
                Some(t) => debug!("Done {}/{} ({})", done, t, format_remaining(remaining)),
                None => debug!("Done {}", done),
            }
        }
    }
}
