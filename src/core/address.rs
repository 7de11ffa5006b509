//! Purpose: Canonical variable addresses and the kernel calls that produce or list them.
//! Exports: `VarAddress`; `Session::{get_var_address, get_input_var_names, get_output_var_names}`.
//! Role: The kernel owns the address grammar; this module only upper-cases and delegates.
//! Invariants: Address text is whatever the kernel's `get_var_address` writes, cut at the first NUL.
//! Invariants: No local validation; unknown names fail later as `ErrorKind::Kernel`.
use std::fmt;

use crate::core::buffer::{CharBuffer, c_string, split_slots};
use crate::core::error::Error;
use crate::core::session::Session;
use crate::core::status::to_usize;
use crate::core::sys;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct VarAddress(String);

impl VarAddress {
    /// Wrap an address that is already in canonical form (e.g. taken from
    /// `get_output_var_names`).
    pub fn from_canonical(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into the component prefix and the variable name at the last `/`.
    pub fn split(&self) -> (Option<&str>, &str) {
        match self.0.rsplit_once('/') {
            Some((prefix, name)) => (Some(prefix), name),
            None => (None, &self.0),
        }
    }
}

impl fmt::Display for VarAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VarAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<VarAddress> for String {
    fn from(address: VarAddress) -> Self {
        address.0
    }
}

impl Session {
    /// Canonical address of `var_name` inside `component_name` (and optionally
    /// `subcomponent_name`, pass `""` for none), as formatted by the kernel.
    pub fn get_var_address(
        &self,
        var_name: &str,
        component_name: &str,
        subcomponent_name: &str,
    ) -> Result<VarAddress, Error> {
        let component = c_string(&component_name.to_uppercase())?;
        let subcomponent = c_string(&subcomponent_name.to_uppercase())?;
        let var = c_string(&var_name.to_uppercase())?;

        let len = self.get_constant_int(sys::BMI_LENVARADDRESS)?;
        let mut out = CharBuffer::with_len(len)?;
        // SAFETY: inputs are NUL-terminated; `out` holds BMI_LENVARADDRESS + 1 bytes.
        unsafe {
            self.kernel().invoke::<sys::FnVarAddress>("get_var_address", "", |f| {
                f(
                    component.as_ptr(),
                    subcomponent.as_ptr(),
                    var.as_ptr(),
                    out.as_mut_ptr(),
                )
            })
        }?;
        Ok(VarAddress(out.to_string_lossy()))
    }

    pub fn get_input_item_count(&self) -> Result<i32, Error> {
        self.count("get_input_item_count")
    }

    pub fn get_output_item_count(&self) -> Result<i32, Error> {
        self.count("get_output_item_count")
    }

    pub fn get_input_var_names(&self) -> Result<Vec<VarAddress>, Error> {
        let count = self.get_input_item_count()?;
        self.var_names("get_input_var_names", count)
    }

    pub fn get_output_var_names(&self) -> Result<Vec<VarAddress>, Error> {
        let count = self.get_output_item_count()?;
        self.var_names("get_output_var_names", count)
    }

    fn count(&self, function: &str) -> Result<i32, Error> {
        let mut count = 0;
        // SAFETY: single `int` out-parameter.
        unsafe { self.kernel().invoke::<sys::FnIntOut>(function, "", |f| f(&mut count)) }?;
        Ok(count)
    }

    // The kernel writes `count` NUL-terminated names into slots of BMI_LENVARADDRESS bytes.
    fn var_names(&self, function: &str, count: i32) -> Result<Vec<VarAddress>, Error> {
        let width = to_usize(self.get_constant_int(sys::BMI_LENVARADDRESS)?)?;
        let count = to_usize(count)?;
        let mut names = CharBuffer::new(width * count);
        // SAFETY: `names` holds `count * width` (+1) bytes.
        unsafe {
            self.kernel()
                .invoke::<sys::FnStringOut>(function, "", |f| f(names.as_mut_ptr()))
        }?;
        Ok(split_slots(names.as_bytes(), width, count)
            .into_iter()
            .map(VarAddress)
            .collect())
    }
}
