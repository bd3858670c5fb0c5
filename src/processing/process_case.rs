use log::{info, warn};
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use super::apex::find_apex_landmark;
use super::septum::{find_timeframe_septum, find_timeframe_septum_inserts};
use super::valves::reclassify_valve_landmarks;
use super::StepError;
use crate::config::Config;
use crate::io::{export_case, load_case, CaseFiles, ContourStore};

/// The best-effort enrichment steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStep {
    Septum,
    SeptumInserts,
    Apex,
    ValveLandmarks,
}

impl EnrichmentStep {
    pub const ALL: [EnrichmentStep; 4] = [
        EnrichmentStep::Septum,
        EnrichmentStep::SeptumInserts,
        EnrichmentStep::Apex,
        EnrichmentStep::ValveLandmarks,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EnrichmentStep::Septum => "septum",
            EnrichmentStep::SeptumInserts => "inserts",
            EnrichmentStep::Apex => "apex",
            EnrichmentStep::ValveLandmarks => "valve landmarks",
        }
    }

    fn run(&self, store: &mut ContourStore, ctx: &StepContext) -> Result<(), StepError> {
        match self {
            EnrichmentStep::Septum => {
                find_timeframe_septum(store, &ctx.frames, ctx.septum_distance_mm)
            }
            EnrichmentStep::SeptumInserts => find_timeframe_septum_inserts(store, &ctx.frames),
            EnrichmentStep::Apex => find_apex_landmark(store, &ctx.frames),
            EnrichmentStep::ValveLandmarks => reclassify_valve_landmarks(store, &ctx.frames),
        }
    }
}

impl fmt::Display for EnrichmentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs shared by all enrichment steps of one case.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub frames: BTreeSet<u32>,
    pub septum_distance_mm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub step: EnrichmentStep,
    /// `None` on success, otherwise the failure reason.
    pub error: Option<String>,
}

/// What happened to one case that made it to export.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseReport {
    pub case: String,
    pub steps: Vec<StepOutcome>,
}

impl CaseReport {
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.error.is_some())
    }

    pub fn is_complete(&self) -> bool {
        self.failed_steps().next().is_none()
    }
}

/// Runs `step` against `store` behind an error boundary.
///
/// Errors and panics are both turned into a `StepError`; in either case the
/// store is put back to its state before the call.
pub fn run_guarded<F>(store: &mut ContourStore, step: F) -> Result<(), StepError>
where
    F: FnOnce(&mut ContourStore) -> Result<(), StepError>,
{
    let snapshot = store.clone();
    let result = panic::catch_unwind(AssertUnwindSafe(|| step(&mut *store)))
        .unwrap_or_else(|payload| Err(StepError::from_panic(payload)));
    if result.is_err() {
        *store = snapshot;
    }
    result
}

/// Runs every enrichment step in order. A failing step is logged and
/// recorded, never propagated.
pub fn run_enrichment(
    case_name: &str,
    store: &mut ContourStore,
    ctx: &StepContext,
) -> Vec<StepOutcome> {
    EnrichmentStep::ALL
        .iter()
        .map(|step| {
            let result = run_guarded(store, |s| step.run(s, ctx));
            if let Err(e) = &result {
                warn!("{}\tFail\tComputing {}: {}", case_name, step, e);
            }
            StepOutcome {
                step: *step,
                error: result.err().map(|e| e.to_string()),
            }
        })
        .collect()
}

/// Loads, enriches and exports one case directory.
///
/// Load and export errors are fatal for the case and returned; enrichment
/// failures only show up in the report.
pub fn process_case(case_dir: &Path, config: &Config) -> anyhow::Result<CaseReport> {
    let files = CaseFiles::new(case_dir, config);
    let mut case = load_case(&files)?;

    let frames = config
        .time_frames
        .clone()
        .unwrap_or_else(|| case.store.time_frames());
    let ctx = StepContext {
        frames,
        septum_distance_mm: config.septum_distance_mm,
    };

    let steps = run_enrichment(&case.name, &mut case.store, &ctx);
    export_case(&case, &files)?;

    let report = CaseReport {
        case: case.name,
        steps,
    };
    info!(
        "{}: exported ({}/{} enrichment steps succeeded)",
        report.case,
        report.steps.len() - report.failed_steps().count(),
        report.steps.len()
    );
    Ok(report)
}
