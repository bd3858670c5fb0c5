pub mod apex;
pub mod process_case;
pub mod septum;
pub mod valves;

use std::any::Any;
use thiserror::Error;

use crate::utils::panic_message;

/// Failure of a single enrichment step. Never fatal for the case.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("required label {0} is missing")]
    MissingLabel(&'static str),
    #[error("no {0} candidates in the requested time frames")]
    NoCandidates(&'static str),
    #[error("step panicked: {0}")]
    Panicked(String),
}

impl StepError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        StepError::Panicked(panic_message(&*payload))
    }
}
