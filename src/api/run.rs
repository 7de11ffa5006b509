//! Purpose: Drive an initialized session from its current time to its end time.
//! Exports: `RunOptions`, `StepMode`, `RunSummary`, `run_to_end`.
//! Role: Shared stepping loop for the CLI `run` command and embedders.
//! Invariants: The loop only advances while `current_time < end_time`.
//! Invariants: Non-converged steps are recorded, not raised; kernel rejections propagate.

use crate::core::error::Error;
use crate::core::session::Session;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    /// One `update` per step; the kernel iterates internally.
    Update,
    /// The prepare/solve/finalize cycle, at most `max_iter` outer iterations per sub-component.
    Solve { max_iter: u32 },
}

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub mode: StepMode,
    pub max_steps: Option<u64>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self {
            mode: StepMode::Update,
            max_steps: None,
        }
    }

    pub fn with_mode(mut self, mode: StepMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub mode: StepMode,
    pub steps: u64,
    pub start_time: f64,
    pub end_time: f64,
    pub final_time: f64,
    /// 1-based step numbers where some sub-component did not converge.
    pub nonconverged_steps: Vec<u64>,
}

impl RunSummary {
    pub fn converged(&self) -> bool {
        self.nonconverged_steps.is_empty()
    }
}

pub fn run_to_end(session: &mut Session, options: &RunOptions) -> Result<RunSummary, Error> {
    let start_time = session.get_current_time()?;
    let end_time = session.get_end_time()?;
    let mut summary = RunSummary {
        mode: options.mode,
        steps: 0,
        start_time,
        end_time,
        final_time: start_time,
        nonconverged_steps: Vec::new(),
    };

    let mut current = start_time;
    while current < end_time {
        if options.max_steps.is_some_and(|max| summary.steps >= max) {
            break;
        }
        match options.mode {
            StepMode::Update => session.update()?,
            StepMode::Solve { max_iter } => {
                let report = session.solve_time_step(max_iter)?;
                if !report.converged() {
                    summary.nonconverged_steps.push(summary.steps + 1);
                }
            }
        }
        summary.steps += 1;
        current = session.get_current_time()?;
        tracing::info!(step = summary.steps, time = current, "time step complete");
    }

    summary.final_time = current;
    Ok(summary)
}
