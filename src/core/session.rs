//! Purpose: Lifecycle state machine and XMI time-step/convergence protocol for one kernel.
//! Exports: `Session`, `SessionOptions`, `State`, `StepReport`, `SolveReport`.
//! Role: Exclusive owner of a `NativeLibrary`; every native call is issued from a `Session`.
//! Invariants: `initialize` only from `Uninitialized`, `finalize` only from `Initialized`;
//!   out-of-turn calls are `ErrorKind::Input` and never reach native code.
//! Invariants: Every native call runs inside the library's working directory.
//! Invariants: State-changing calls take `&mut self`, so no zero-copy view can outlive them.
//! Invariants: Dropping an initialized session finalizes it best-effort.
//!
//! A session is not thread-safe: the working-directory switch around native
//! calls is process-wide, so two sessions must never call into native code
//! concurrently, even when they load different libraries.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::core::buffer::CharBuffer;
use crate::core::error::{Error, ErrorKind};
use crate::core::library::{LoadOptions, NativeLibrary};
use crate::core::status::Kernel;
use crate::core::sys;
use crate::core::timer::Timer;

/// Sub-component id to pass when the kernel reports a single numerical solution.
pub const DEFAULT_SUBCOMPONENT: i32 = 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    Uninitialized,
    Initialized,
}

#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    load: LoadOptions,
    timing: bool,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dependency_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.load = self.load.with_dependency_dir(dir);
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.load = self.load.with_working_directory(dir);
        self
    }

    /// Time every native call; totals via `Session::report_timing_totals`.
    pub fn with_timing(mut self, timing: bool) -> Self {
        self.timing = timing;
        self
    }

    pub fn load_options(&self) -> &LoadOptions {
        &self.load
    }

    pub fn timing(&self) -> bool {
        self.timing
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct SolveReport {
    pub subcomponent: i32,
    pub iterations: u32,
    pub converged: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StepReport {
    pub subcomponents: Vec<SolveReport>,
}

impl StepReport {
    pub fn converged(&self) -> bool {
        self.subcomponents.iter().all(|report| report.converged)
    }
}

pub struct Session {
    kernel: Kernel,
    state: State,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("library", self.kernel.library())
            .field("state", &self.state)
            .finish()
    }
}

impl Session {
    /// Load the kernel at `lib_path` and bind a session to it.
    pub fn open(lib_path: impl AsRef<Path>, options: SessionOptions) -> Result<Self, Error> {
        let library = NativeLibrary::load(lib_path, options.load_options())?;
        Ok(Self::new(library, options.timing()))
    }

    /// Bind a session to an already loaded library, timing every native call
    /// when `timing` is set.
    pub fn new(library: NativeLibrary, timing: bool) -> Self {
        Self {
            kernel: Kernel::new(library, timing),
            state: State::Uninitialized,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == State::Initialized
    }

    pub fn library(&self) -> &NativeLibrary {
        self.kernel.library()
    }

    pub(crate) fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn get_constant_int(&self, name: &str) -> Result<i32, Error> {
        self.kernel.library().constant_int(name)
    }

    /// Write an exported integer knob, e.g. `ISTDOUTTOFILE`.
    pub fn set_int(&self, name: &str, value: i32) -> Result<(), Error> {
        self.kernel.library().set_constant_int(name, value)
    }

    /// `config_file` is handed to the kernel verbatim; `""` selects its default.
    pub fn initialize(&mut self, config_file: &str) -> Result<(), Error> {
        self.require_state(State::Uninitialized, "the library is already initialized")?;
        let config = crate::core::buffer::c_string(config_file)?;
        unsafe {
            self.kernel
                .invoke::<sys::FnInitialize>("initialize", "", |f| f(config.as_ptr()))
        }?;
        self.state = State::Initialized;
        tracing::info!(library = self.library().name(), "kernel initialized");
        Ok(())
    }

    pub fn initialize_mpi(&mut self, comm: i32) -> Result<(), Error> {
        self.require_state(State::Uninitialized, "the library is already initialized")?;
        unsafe { self.kernel.invoke::<sys::FnIntIn>("initialize_mpi", "", |f| f(&comm)) }?;
        self.state = State::Initialized;
        tracing::info!(library = self.library().name(), comm, "kernel initialized (mpi)");
        Ok(())
    }

    /// Advance one full time step.
    pub fn update(&mut self) -> Result<(), Error> {
        unsafe { self.kernel.invoke::<sys::FnNoArgs>("update", "", |f| f()) }
    }

    /// Forwarded to the kernel, which does not support it and reports failure.
    pub fn update_until(&mut self, time: f64) -> Result<(), Error> {
        let detail = format!("until {time}");
        unsafe { self.kernel.invoke::<sys::FnUpdateUntil>("update_until", &detail, |f| f(time)) }
    }

    pub fn finalize(&mut self) -> Result<(), Error> {
        self.require_state(State::Initialized, "the library is not initialized yet")?;
        unsafe { self.kernel.invoke::<sys::FnNoArgs>("finalize", "", |f| f()) }?;
        self.state = State::Uninitialized;
        tracing::info!(library = self.library().name(), "kernel finalized");
        Ok(())
    }

    pub fn get_current_time(&self) -> Result<f64, Error> {
        self.time("get_current_time")
    }

    pub fn get_start_time(&self) -> Result<f64, Error> {
        self.time("get_start_time")
    }

    pub fn get_end_time(&self) -> Result<f64, Error> {
        self.time("get_end_time")
    }

    pub fn get_time_step(&self) -> Result<f64, Error> {
        self.time("get_time_step")
    }

    pub fn get_time_units(&self) -> Result<String, Error> {
        Err(Error::not_implemented("get_time_units"))
    }

    pub fn get_component_name(&self) -> Result<String, Error> {
        self.text(sys::BMI_LENCOMPONENTNAME, "get_component_name")
    }

    pub fn get_version(&self) -> Result<String, Error> {
        self.text(sys::BMI_LENVERSION, "get_version")
    }

    /// Read inputs and compute the step length; `dt` is passed through but the
    /// kernel derives its own step length.
    pub fn prepare_time_step(&mut self, dt: f64) -> Result<(), Error> {
        unsafe { self.kernel.invoke::<sys::FnDoubleIn>("prepare_time_step", "", |f| f(&dt)) }
    }

    /// Build and solve the current step to completion (prepare/solve/finalize
    /// for every sub-component, done by the kernel).
    pub fn do_time_step(&mut self) -> Result<(), Error> {
        unsafe { self.kernel.invoke::<sys::FnNoArgs>("do_time_step", "", |f| f()) }
    }

    pub fn finalize_time_step(&mut self) -> Result<(), Error> {
        unsafe { self.kernel.invoke::<sys::FnNoArgs>("finalize_time_step", "", |f| f()) }
    }

    pub fn get_subcomponent_count(&self) -> Result<i32, Error> {
        let mut count = 0;
        unsafe {
            self.kernel
                .invoke::<sys::FnIntOut>("get_subcomponent_count", "", |f| f(&mut count))
        }?;
        Ok(count)
    }

    pub fn prepare_solve(&mut self, subcomponent: i32) -> Result<(), Error> {
        let detail = subcomponent_detail(subcomponent);
        unsafe {
            self.kernel.invoke::<sys::FnIntIn>("prepare_solve", &detail, |f| f(&subcomponent))
        }
    }

    /// One outer iteration; returns whether the sub-component converged.
    pub fn solve(&mut self, subcomponent: i32) -> Result<bool, Error> {
        let detail = subcomponent_detail(subcomponent);
        let mut converged = 0;
        unsafe {
            self.kernel
                .invoke::<sys::FnSolve>("solve", &detail, |f| f(&subcomponent, &mut converged))
        }?;
        Ok(converged == 1)
    }

    /// The kernel rejects this with `ErrorKind::Kernel` when the sub-component
    /// has not converged.
    pub fn finalize_solve(&mut self, subcomponent: i32) -> Result<(), Error> {
        let detail = subcomponent_detail(subcomponent);
        unsafe {
            self.kernel.invoke::<sys::FnIntIn>("finalize_solve", &detail, |f| f(&subcomponent))
        }
    }

    /// Run one step through the fine-grained cycle, iterating every sub-component
    /// up to `max_iter` times. Non-convergence is reported, not raised; a kernel
    /// rejection of `finalize_solve` still propagates.
    pub fn solve_time_step(&mut self, max_iter: u32) -> Result<StepReport, Error> {
        let dt = self.get_time_step()?;
        self.prepare_time_step(dt)?;

        let mut report = StepReport::default();
        for subcomponent in 1..=self.get_subcomponent_count()? {
            self.prepare_solve(subcomponent)?;
            let mut iterations = 0;
            let mut converged = false;
            while iterations < max_iter && !converged {
                converged = self.solve(subcomponent)?;
                iterations += 1;
            }
            if !converged {
                tracing::warn!(subcomponent, iterations, "sub-component did not converge");
            }
            self.finalize_solve(subcomponent)?;
            report.subcomponents.push(SolveReport {
                subcomponent,
                iterations,
                converged,
            });
        }

        self.finalize_time_step()?;
        Ok(report)
    }

    pub fn timing_enabled(&self) -> bool {
        self.kernel.timer().is_some()
    }

    /// Snapshot of the per-call totals so far; `None` unless timing was enabled.
    pub fn timer(&self) -> Option<Timer> {
        self.kernel.timer().map(|timer| timer.borrow().clone())
    }

    /// Log per-call totals and return their sum.
    pub fn report_timing_totals(&self) -> Result<Duration, Error> {
        let timer = self
            .kernel
            .timer()
            .ok_or_else(|| Error::new(ErrorKind::Timer).with_message("timing not activated"))?;
        let total = timer.borrow().report_totals();
        tracing::info!(
            "total elapsed time for {}: {:.4} seconds",
            self.library().name(),
            total.as_secs_f64()
        );
        Ok(total)
    }

    fn require_state(&self, expected: State, message: &str) -> Result<(), Error> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::Input).with_message(message))
        }
    }

    fn time(&self, function: &str) -> Result<f64, Error> {
        let mut value = 0.0;
        unsafe {
            self.kernel
                .invoke::<sys::FnDoubleOut>(function, "", |f| f(&mut value))
        }?;
        Ok(value)
    }

    fn text(&self, len_name: &str, function: &str) -> Result<String, Error> {
        let mut out = CharBuffer::with_len(self.get_constant_int(len_name)?)?;
        unsafe {
            self.kernel
                .invoke::<sys::FnStringOut>(function, "", |f| f(out.as_mut_ptr()))
        }?;
        Ok(out.to_string_lossy())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == State::Initialized {
            if let Err(err) = self.finalize() {
                tracing::warn!(error = %err, "implicit finalize failed");
            }
        }
    }
}

fn subcomponent_detail(subcomponent: i32) -> String {
    format!("for subcomponent {subcomponent}")
}
