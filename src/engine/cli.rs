//! CLI command handler: SD files go through the pipeline, other inputs through single-file mode.

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::Opts;
use crate::engine::arg_parser::Cli;
use crate::engine::converter::BalloonRunner;
use crate::engine::naming::{construct_output_path, is_collection};
use crate::engine::progress::BarProgress;
use crate::engine::single::{convert_file, convert_files};
use crate::error::PipelineError;
use crate::pipeline::{self, CancelToken, PipelineTuning, RunHooks};
use crate::store::{ItemStore, SdfStore, SdfWriter};
use crate::utils::balloonpipe_toml::{apply_file_to_opts, load_balloonpipe_toml};
use crate::utils::config::WorkerThreadLimits;
use crate::utils::{ArtifactDir, resolve_worker_count, setup_logging, tool_from_env};

fn config_dir(cli: &Cli) -> PathBuf {
    cli.inputs
        .first()
        .and_then(|p| p.parent())
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Merge defaults < config file < environment < command line.
fn setup_opts(cli: &Cli) -> Opts {
    let dir = config_dir(cli);
    let mut opts = Opts::default();
    let file = load_balloonpipe_toml(&dir);
    if let Some(ref f) = file {
        apply_file_to_opts(f, &mut opts);
    }
    if let Some(v) = cli.verbose {
        opts.verbose = v;
    }
    setup_logging(opts.verbose);
    if file.is_some() {
        debug!("Loaded config from {}", dir.display());
    }

    if let Some(tool) = tool_from_env(&dir) {
        opts.tool = tool;
    }
    if let Some(ref tool) = cli.tool {
        opts.tool = tool.clone();
    }
    opts.output = cli.output.clone();
    if let Some(n) = cli.conformers {
        opts.conformers = n;
    }
    if cli.workers.is_some() {
        opts.num_workers = cli.workers;
    }
    if let Some(t) = cli.timeout {
        opts.timeout_secs = t;
    }
    if let Some(c) = cli.channel_cap {
        opts.channel_cap = c;
    }
    if let Some(g) = cli.grace_period {
        opts.grace_period = Duration::from_secs(g);
    }
    if cli.report.is_some() {
        opts.report_path = cli.report.clone();
    }
    opts
}

/// Run the pipeline over one SD file and write `<output>` plus the optional report.
fn run_collection(
    input: &Path,
    opts: &Opts,
    converter: Arc<BalloonRunner>,
    cancel: &CancelToken,
) -> Result<()> {
    let output = opts
        .output
        .clone()
        .unwrap_or_else(|| construct_output_path(input, opts.conformers));
    if output == input {
        return Err(PipelineError::InvalidArgument(format!(
            "output must differ from input ({})",
            input.display()
        ))
        .into());
    }

    let tuning = PipelineTuning {
        num_workers: resolve_worker_count(
            opts.num_workers,
            WorkerThreadLimits::current().all_threads,
        ),
        channel_cap: opts.channel_cap,
        conformers: opts.conformers,
        grace_period: opts.grace_period,
    };
    tuning.validate()?;

    let store = Arc::new(SdfStore::new());
    let mut hooks = RunHooks::new(cancel.clone());
    if opts.verbose {
        hooks = hooks.with_progress(Arc::new(BarProgress::new(store.count(input))));
    }
    let artifacts = Arc::new(ArtifactDir::new()?);
    let sink = SdfWriter::create(&output).map_err(PipelineError::Output)?;

    info!("{} -> {}", input.display(), output.display());
    let outcome = match pipeline::run_pipeline(
        input, store, sink, converter, artifacts, &tuning, &hooks,
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            if matches!(e, PipelineError::Stream(_)) {
                let _ = std::fs::remove_file(&output);
            }
            return Err(e).with_context(|| format!("converting {}", input.display()));
        }
    };

    let mut report = outcome.report;
    report.output = Some(output.clone());
    pipeline::log_failure_report(&report, opts.verbose);
    if let Some(ref path) = opts.report_path {
        pipeline::write_failure_report(&report, path)?;
        info!("Report written to {}", path.display());
    }
    if report.cancelled {
        warn!(
            "Cancelled: {} wrote {} of {} records",
            output.display(),
            report.records_written,
            report.total
        );
    } else {
        info!("Wrote {}", output.display());
    }
    Ok(())
}

/// Convert every input. SD files (`.sdf`) go through the pipeline first; other types then run the tool once each.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli);
    if cli.inputs.len() > 1 && (opts.output.is_some() || opts.report_path.is_some()) {
        bail!("--output and --report need a single input");
    }
    debug!("{} CONFIG:{:#?}", env!("CARGO_PKG_NAME").to_uppercase(), opts);

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            warn!("Cancellation requested; finishing in-flight records");
            cancel.cancel();
        })
        .context("install Ctrl-C handler")?;
    }

    let converter = Arc::new(BalloonRunner::new(&opts.tool, opts.timeout_secs));
    let (collections, singles): (Vec<PathBuf>, Vec<PathBuf>) =
        cli.inputs.iter().cloned().partition(|p| is_collection(p));
    for input in &collections {
        if cancel.is_cancelled() {
            break;
        }
        run_collection(input, &opts, Arc::clone(&converter), &cancel)?;
    }
    if singles.is_empty() || cancel.is_cancelled() {
        return Ok(());
    }

    // An explicit output implies a single input (checked above).
    let written = match opts.output.as_deref() {
        Some(output) => vec![
            convert_file(&singles[0], Some(output), opts.conformers, &*converter, &cancel)
                .with_context(|| format!("converting {}", singles[0].display()))?,
        ],
        None => convert_files(&singles, opts.conformers, &*converter, &cancel)
            .context("converting single-file inputs")?,
    };
    for path in &written {
        info!("Wrote {}", path.display());
    }
    Ok(())
}
