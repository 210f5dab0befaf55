//! env_logger setup: the crate logs at Info (Debug when verbose), dependencies at Warn.

use colored::{ColoredString, Colorize};
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Level for the crate's own modules.
pub fn crate_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Coloured tag for levels that get one; Info and Trace print bare.
fn level_tag(level: Level) -> Option<ColoredString> {
    match level {
        Level::Error => Some("ERROR".red().bold()),
        Level::Warn => Some("WARN".yellow()),
        Level::Debug => Some("debug".dimmed()),
        _ => None,
    }
}

/// Module path below the crate root, e.g. `pipeline::worker`.
pub fn short_target<'a>(target: &'a str, pkg: &str) -> &'a str {
    match target.strip_prefix(pkg) {
        Some("") => target,
        Some(rest) => rest.trim_start_matches("::"),
        None => target,
    }
}

/// Install the logger. Repeated calls keep the first configuration.
pub fn setup_logging(verbose: bool) {
    let pkg = env!("CARGO_PKG_NAME");
    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(pkg, crate_level(verbose))
        .format(move |buf, record| {
            let name = pkg.cyan();
            match level_tag(record.level()) {
                // Warnings and errors name the stage that raised them.
                Some(tag) if record.level() <= Level::Warn => writeln!(
                    buf,
                    "[{} {} {}] {}",
                    name,
                    tag,
                    short_target(record.target(), pkg).white(),
                    record.args()
                ),
                Some(tag) => writeln!(buf, "[{} {}] {}", name, tag, record.args()),
                None => writeln!(buf, "[{}] {}", name, record.args()),
            }
        })
        .try_init();
}
