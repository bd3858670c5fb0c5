//! Post-processing of cardiac GP contour files before biventricular fitting.
//!
//! Each case directory holds a GP file (labelled contour/landmark points per
//! slice and time frame) and a SliceInfo file. A case is loaded into a
//! [`io::ContourStore`], cleaned, enriched with derived landmarks (septum, RV
//! inserts, apex, mitral/tricuspid valve points) and written back out.
//! [`entry::split_and_run`] spreads many cases over a bounded pool of pinned
//! workers.
//!
//! ```no_run
//! use gpcleanrs::{discover_cases, split_and_run, Config};
//!
//! let config = Config { workers: 6, ..Config::default() };
//! let cases = discover_cases(&config.root_dir).unwrap();
//! let report = split_and_run(&cases, &config).unwrap();
//! println!("{} failed", report.failed().count());
//! ```

pub mod config;
pub mod entry;
pub mod io;
pub mod processing;
mod utils;

pub use config::Config;
pub use entry::{discover_cases, split_and_run, split_in_chunks, RunReport};
pub use io::ContourStore;
pub use processing::process_case::{process_case, CaseReport};
pub use processing::valves::reclassify_valve_landmarks;
