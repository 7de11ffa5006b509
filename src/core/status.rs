//! Purpose: Turn native status codes into structured errors, timing every call.
//! Exports: `Kernel` (crate-internal call gate over a `NativeLibrary`).
//! Role: Single choke point every native entry point passes through.
//! Invariants: Status 0 is success; any other value is `ErrorKind::Kernel`.
//! Invariants: Every native call, diagnostic fetches included, runs inside the
//!   library's working directory.
//! Invariants: Diagnostic fetches use raw symbol access and never fail the primary error.
//! Invariants: A timed scope is stopped whether the call succeeded, failed, or unwound.
use std::cell::RefCell;

use libc::c_int;

use crate::core::buffer::CharBuffer;
use crate::core::error::{Error, ErrorKind};
use crate::core::library::NativeLibrary;
use crate::core::sys;
use crate::core::timer::Timer;

pub(crate) struct Kernel {
    library: NativeLibrary,
    timer: Option<RefCell<Timer>>,
}

impl Kernel {
    pub(crate) fn new(library: NativeLibrary, timing: bool) -> Self {
        let timer = timing.then(|| RefCell::new(Timer::new(library.name())));
        Self { library, timer }
    }

    pub(crate) fn library(&self) -> &NativeLibrary {
        &self.library
    }

    pub(crate) fn timer(&self) -> Option<&RefCell<Timer>> {
        self.timer.as_ref()
    }

    /// Resolve `function`, run `call` with it, and check the returned status.
    ///
    /// # Safety
    /// `F` must be the `core::sys` alias matching the kernel's signature for
    /// `function`, and `call` must pass pointers valid for what the kernel writes.
    pub(crate) unsafe fn invoke<F: Copy>(
        &self,
        function: &str,
        detail: &str,
        call: impl FnOnce(F) -> c_int,
    ) -> Result<(), Error> {
        let native = unsafe { self.library.function::<F>(function) }?;
        tracing::debug!(function, detail, "kernel call");

        let _cwd = self.library.enter_working_directory()?;
        let status = {
            let _scope = TimedScope::start(self.timer.as_ref(), function);
            call(native)
        };

        if status == sys::STATUS_SUCCESS {
            Ok(())
        } else {
            Err(self.kernel_error(function, detail, status))
        }
    }

    fn kernel_error(&self, function: &str, detail: &str, status: c_int) -> Error {
        let mut err = Error::new(ErrorKind::Kernel)
            .with_message(format!("BMI exception (status {status})"))
            .with_function(function)
            .with_detail(detail);

        let message = self.last_error_message();
        let component = self.component_name();
        match (&message, &component) {
            (Some(message), Some(component)) => {
                tracing::warn!("--- Kernel message ({component}) ---\n=> {message}");
            }
            (Some(message), None) => tracing::warn!("--- Kernel message ---\n=> {message}"),
            _ => tracing::warn!("--- Kernel message ---\n=> no details ..."),
        }
        if let Some(message) = message {
            err = err.with_kernel_message(message);
        }
        if let Some(component) = component {
            err = err.with_component(component);
        }
        err
    }

    fn last_error_message(&self) -> Option<String> {
        self.raw_string(sys::BMI_LENERRMESSAGE, "get_last_bmi_error")
    }

    fn component_name(&self) -> Option<String> {
        self.raw_string(sys::BMI_LENCOMPONENTNAME, "get_component_name")
    }

    // Bypasses `invoke` so a failing diagnostic call cannot recurse into error reporting.
    fn raw_string(&self, len_name: &str, function: &str) -> Option<String> {
        let len = self.library.constant_int(len_name).ok()?;
        let mut buf = CharBuffer::with_len(len).ok()?;
        let native = unsafe { self.library.function::<sys::FnStringOut>(function) }.ok()?;
        // SAFETY: the buffer holds `len + 1` bytes, the capacity the kernel advertises.
        let status = unsafe { native(buf.as_mut_ptr()) };
        if status != sys::STATUS_SUCCESS {
            return None;
        }
        let text = buf.to_string_lossy();
        (!text.is_empty()).then_some(text)
    }
}

/// Convert a length, count, or rank reported by the kernel; negative values are kernel errors.
pub(crate) fn to_usize(value: i32) -> Result<usize, Error> {
    usize::try_from(value).map_err(|_| {
        Error::new(ErrorKind::Kernel).with_message(format!("kernel reported negative size {value}"))
    })
}

// Timing is skipped, with a warning, when the scope cannot be started:
// a nested call under the same name or a timer borrowed elsewhere.
struct TimedScope<'a> {
    timer: Option<&'a RefCell<Timer>>,
    scope: &'a str,
}

impl<'a> TimedScope<'a> {
    fn start(timer: Option<&'a RefCell<Timer>>, scope: &'a str) -> Self {
        let started = timer.filter(|timer| match timer.try_borrow_mut() {
            Ok(mut timer) => match timer.start(scope) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(error = %err, "call not timed");
                    false
                }
            },
            Err(_) => {
                tracing::warn!(scope, "timer is borrowed; call not timed");
                false
            }
        });
        Self {
            timer: started,
            scope,
        }
    }
}

impl Drop for TimedScope<'_> {
    fn drop(&mut self) {
        let Some(timer) = self.timer else {
            return;
        };
        match timer.try_borrow_mut() {
            Ok(mut timer) => {
                if let Err(err) = timer.stop(self.scope) {
                    tracing::warn!(error = %err, "timer scope was not running");
                }
            }
            Err(_) => tracing::warn!(scope = self.scope, "timer is borrowed; scope left running"),
        }
    }
}
