//! Purpose: Hold top-level CLI command dispatch for `xmi`.
//! Exports: `dispatch_command`, `execute`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Each command initializes its own session and finalizes it explicitly,
//!   so finalize failures surface as errors instead of drop-time warnings.
//! Invariants: Output envelopes are single JSON documents on stdout.

use super::*;
use xmi::api::{GridSummary, ModelSummary, RunOptions, StepMode, run_to_end};

pub(super) fn dispatch_command(
    command: Command,
    kernel: &KernelArgs,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    let mut session = open_session(kernel)?;
    let output = execute(command, &mut session)?;
    emit_json(output, color_mode);
    Ok(RunOutcome::ok())
}

/// Run one command against an opened, uninitialized session and build its envelope.
pub(super) fn execute(command: Command, session: &mut Session) -> Result<Value, Error> {
    match command {
        Command::Info { config } => {
            session.initialize(config.as_deref().unwrap_or(""))?;
            let summary = ModelSummary::collect(session)?;
            session.finalize()?;
            to_json(&summary)
        }
        Command::Run {
            config,
            max_iter,
            max_steps,
        } => {
            session.initialize(config.as_deref().unwrap_or(""))?;
            let mut options = RunOptions::new();
            if let Some(max_iter) = max_iter {
                options = options.with_mode(StepMode::Solve { max_iter });
            }
            if let Some(max_steps) = max_steps {
                options = options.with_max_steps(max_steps);
            }
            let summary = run_to_end(session, &options)?;
            let timing = session
                .timing_enabled()
                .then(|| session.report_timing_totals())
                .transpose()?;
            session.finalize()?;

            let mut value = to_json(&summary)?;
            if let (Some(total), Value::Object(map)) = (timing, &mut value) {
                map.insert("timing_total_seconds".to_string(), json!(total.as_secs_f64()));
            }
            Ok(value)
        }
        Command::Get { var, after_steps } => {
            let address = session.get_var_address(&var.var, &var.component, &var.subcomponent)?;
            session.initialize(var.config.as_deref().unwrap_or(""))?;
            for _ in 0..after_steps {
                session.update()?;
            }
            let info = session.var_info(&address)?;
            let value = session.get_value(&address)?;
            let time = session.get_current_time()?;
            session.finalize()?;
            Ok(json!({
                "address": address.as_str(),
                "time": time,
                "info": info.to_json(),
                "value": value.to_json(),
            }))
        }
        Command::Grid { var } => {
            let address = session.get_var_address(&var.var, &var.component, &var.subcomponent)?;
            session.initialize(var.config.as_deref().unwrap_or(""))?;
            let grid = session.get_var_grid(&address)?;
            let summary = GridSummary::collect(session, grid)?;
            session.finalize()?;
            let mut value = to_json(&summary)?;
            if let Value::Object(map) = &mut value {
                map.insert("address".to_string(), json!(address.as_str()));
            }
            Ok(value)
        }
    }
}

fn to_json(value: &impl serde::Serialize) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode output")
            .with_source(err)
    })
}
