use anyhow::{anyhow, Context, Result};
use core_affinity::CoreId;
use crossbeam::thread;
use log::{debug, error, info, warn};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Config;
use crate::processing::process_case::{process_case, CaseReport};
use crate::utils::panic_message;

/// Problems detected before anything is dispatched.
#[derive(Debug, Error, PartialEq)]
pub enum OrchestrationError {
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("no cases to process")]
    NoCases,
}

#[derive(Debug)]
pub struct CaseOutcome {
    pub case_dir: PathBuf,
    /// The case report, or the fatal error that stopped the case.
    pub result: std::result::Result<CaseReport, String>,
}

/// Outcomes of a whole run, in case-list order.
#[derive(Debug)]
pub struct RunReport {
    pub n_chunks: usize,
    pub outcomes: Vec<CaseOutcome>,
}

impl RunReport {
    pub fn failed(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Exported cases where at least one enrichment step failed.
    pub fn incomplete(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(&o.result, Ok(report) if !report.is_complete()))
    }
}

/// Every subdirectory of `root`, sorted by path.
pub fn discover_cases<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let mut cases = Vec::new();
    for entry in std::fs::read_dir(root)
        .with_context(|| format!("failed to list case directory {}", root.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            cases.push(path);
        }
    }
    cases.sort();
    Ok(cases)
}

/// Number of dispatch rounds needed for `n_cases` on `workers` slots.
pub fn n_chunks(n_cases: usize, workers: usize) -> usize {
    n_cases.div_ceil(workers)
}

/// Splits `items` into `n` contiguous chunks whose sizes differ by at most
/// one; the first `len % n` chunks take the extra item.
pub fn split_in_chunks<T>(items: &[T], n: usize) -> Vec<&[T]> {
    if n == 0 {
        return Vec::new();
    }
    let (k, m) = (items.len() / n, items.len() % n);
    (0..n)
        .map(|i| &items[i * k + i.min(m)..(i + 1) * k + (i + 1).min(m)])
        .collect()
}

/// Processes every case under `config`, `config.workers` at a time.
pub fn split_and_run(cases: &[PathBuf], config: &Config) -> Result<RunReport> {
    split_and_run_with(cases, config.workers, &config.failure_log, |dir| {
        process_case(dir, config)
    })
}

/// Orchestration core, generic over the per-case work.
///
/// * `workers == 1`: cases run one after another on the calling thread.
/// * all cases fit in one round: they run at once, one pinned worker each.
/// * otherwise: balanced chunks run as successive rounds. Each round's case
///   list is appended to `failure_log` before the round starts. The log is
///   opened before the first round; failing to open it aborts the run before
///   any case is dispatched.
pub fn split_and_run_with<F>(
    cases: &[PathBuf],
    workers: usize,
    failure_log: &Path,
    process: F,
) -> Result<RunReport>
where
    F: Fn(&Path) -> Result<CaseReport> + Sync,
{
    if workers == 0 {
        return Err(OrchestrationError::NoWorkers.into());
    }
    if cases.is_empty() {
        return Err(OrchestrationError::NoCases.into());
    }

    let n_chunks = n_chunks(cases.len(), workers);
    info!("TOT CASES: {}", cases.len());
    info!("TOT CPUs selected: {}", workers);
    info!("-----> DATA WILL BE SPLIT INTO {} chunks", n_chunks);

    let outcomes: Vec<CaseOutcome> = if workers == 1 {
        cases
            .iter()
            .map(|case| CaseOutcome {
                case_dir: case.clone(),
                result: process(case.as_path()).map_err(|e| format!("{:#}", e)),
            })
            .collect()
    } else if n_chunks <= 1 {
        run_round(cases, &process)?
    } else {
        let mut log = open_failure_log(failure_log)?;
        let mut outcomes = Vec::with_capacity(cases.len());
        for chunk in split_in_chunks(cases, n_chunks) {
            // finished rounds are kept even if the log stops accepting writes
            if let Err(e) = record_chunk(&mut log, chunk) {
                error!("{}: {:#}", failure_log.display(), e);
            }
            outcomes.extend(run_round(chunk, &process)?);
        }
        outcomes
    };

    let report = RunReport { n_chunks, outcomes };
    for outcome in report.failed() {
        if let Err(e) = &outcome.result {
            error!("{}: case failed: {}", outcome.case_dir.display(), e);
        }
    }
    info!(
        "{} cases processed, {} failed, {} with incomplete enrichment",
        report.outcomes.len(),
        report.failed().count(),
        report.incomplete().count()
    );
    Ok(report)
}

/// Opens the triage log for appending, creating its directory if needed.
fn open_failure_log(failure_log: &Path) -> Result<File> {
    if let Some(parent) = failure_log.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Could not create log directory: {:?}", parent))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(failure_log)
        .with_context(|| format!("failed to open {}", failure_log.display()))
}

/// Appends the cases of the next round to the triage log.
fn record_chunk<W: Write>(log: &mut W, chunk: &[PathBuf]) -> Result<()> {
    writeln!(log, "In this chunk, cases: {:?}", chunk).context("failed to append chunk")?;
    log.flush().context("failed to flush chunk")?;
    Ok(())
}

/// Runs one round: a scoped thread per case, slot `i` pinned to core
/// `i mod n_cores`. Returns once every case of the round has finished.
fn run_round<F>(cases: &[PathBuf], process: &F) -> Result<Vec<CaseOutcome>>
where
    F: Fn(&Path) -> Result<CaseReport> + Sync,
{
    let cores = core_affinity::get_core_ids().unwrap_or_default();

    thread::scope(|s| {
        let handles: Vec<_> = cases
            .iter()
            .enumerate()
            .map(|(slot, case)| {
                let core = (!cores.is_empty()).then(|| cores[slot % cores.len()]);
                s.spawn(move |_| {
                    pin_worker(slot, core);
                    process(case.as_path())
                })
            })
            .collect();

        // a panicking case only loses its own result
        handles
            .into_iter()
            .zip(cases)
            .map(|(handle, case)| {
                let result = match handle.join() {
                    Ok(Ok(report)) => Ok(report),
                    Ok(Err(e)) => Err(format!("{:#}", e)),
                    Err(payload) => {
                        Err(format!("worker panicked: {}", panic_message(&*payload)))
                    }
                };
                CaseOutcome {
                    case_dir: case.clone(),
                    result,
                }
            })
            .collect::<Vec<_>>()
    })
    .map_err(|e| anyhow!("Thread execution failed: {:?}", e))
}

/// Best effort: a worker that cannot be pinned still runs its case.
fn pin_worker(slot: usize, core: Option<CoreId>) {
    match core {
        Some(core) if core_affinity::set_for_current(core) => {
            debug!("worker slot {} pinned to core {}", slot, core.id)
        }
        Some(core) => warn!("could not pin worker slot {} to core {}", slot, core.id),
        None => debug!("no core ids available, worker slot {} left unpinned", slot),
    }
}
