//! Purpose: Marshal kernel variables as zero-copy views or owned copies, and write them back.
//! Exports: `Element`, `ValueView`, `Value`, `VarInfo`; `Session` variable queries and accessors.
//! Role: Typed bridge between ndarray buffers and the kernel's value entry points.
//! Invariants: Every array crossing the boundary is row-major (C order); caller buffers in
//!   any other layout are rejected with `ErrorKind::Input` before native code runs.
//! Invariants: Scalars are one-element arrays and go through the same pointer entry points.
//! Invariants: Views borrow the session mutably, so they cannot outlive `finalize`, `update`,
//!   or any other call that may free or reallocate kernel memory.
//! Invariants: String variables are read-only; index-based access is permanently unsupported.
use std::ffi::CString;
use std::fmt;
use std::ptr::{self, NonNull};

use libc::c_char;
use ndarray::{ArrayBase, ArrayD, ArrayViewD, ArrayViewMutD, Data, DataMut, Dimension, IxDyn};
use serde_json::{Value as JsonValue, json};

use crate::core::buffer::{CharBuffer, c_string, decode_padded};
use crate::core::error::{Error, ErrorKind};
use crate::core::session::Session;
use crate::core::status::to_usize;
use crate::core::sys;
use crate::core::vartype::VarType;

mod private {
    pub trait Sealed {}
    impl Sealed for f64 {}
    impl Sealed for f32 {}
    impl Sealed for i32 {}
}

/// Element types the kernel can expose through a pointer.
pub trait Element: Copy + Default + fmt::Debug + private::Sealed + 'static {
    const NAME: &'static str;
    #[doc(hidden)]
    const PTR_FN: &'static str;
    #[doc(hidden)]
    const GET_FN: Option<&'static str>;
    #[doc(hidden)]
    const SET_FN: Option<&'static str>;

    fn matches(var_type: &VarType) -> bool;
}

impl Element for f64 {
    const NAME: &'static str = "float64";
    const PTR_FN: &'static str = "get_value_ptr_double";
    const GET_FN: Option<&'static str> = Some("get_value_double");
    const SET_FN: Option<&'static str> = Some("set_value_double");

    fn matches(var_type: &VarType) -> bool {
        *var_type == VarType::Double
    }
}

impl Element for f32 {
    const NAME: &'static str = "float32";
    const PTR_FN: &'static str = "get_value_ptr_float";
    const GET_FN: Option<&'static str> = None;
    const SET_FN: Option<&'static str> = None;

    fn matches(var_type: &VarType) -> bool {
        *var_type == VarType::Float
    }
}

impl Element for i32 {
    const NAME: &'static str = "int32";
    const PTR_FN: &'static str = "get_value_ptr_int";
    const GET_FN: Option<&'static str> = Some("get_value_int");
    const SET_FN: Option<&'static str> = Some("set_value_int");

    fn matches(var_type: &VarType) -> bool {
        *var_type == VarType::Int
    }
}

/// Zero-copy view of kernel memory; see the module invariants for its validity.
#[derive(Debug)]
pub enum ValueView<'a> {
    Double(ArrayViewMutD<'a, f64>),
    Float(ArrayViewMutD<'a, f32>),
    Int(ArrayViewMutD<'a, i32>),
}

impl ValueView<'_> {
    pub fn shape(&self) -> &[usize] {
        match self {
            ValueView::Double(view) => view.shape(),
            ValueView::Float(view) => view.shape(),
            ValueView::Int(view) => view.shape(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ValueView::Double(view) => view.len(),
            ValueView::Float(view) => view.len(),
            ValueView::Int(view) => view.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_value(&self) -> Value {
        match self {
            ValueView::Double(view) => Value::Double(view.to_owned()),
            ValueView::Float(view) => Value::Float(view.to_owned()),
            ValueView::Int(view) => Value::Int(view.to_owned()),
        }
    }
}

/// Owned snapshot of a kernel variable.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Double(ArrayD<f64>),
    Float(ArrayD<f32>),
    Int(ArrayD<i32>),
    String(Vec<String>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Double(_) => "double",
            Value::Float(_) => "float",
            Value::Int(_) => "int",
            Value::String(_) => "string",
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Value::Double(array) => array.shape().to_vec(),
            Value::Float(array) => array.shape().to_vec(),
            Value::Int(array) => array.shape().to_vec(),
            Value::String(items) => vec![items.len()],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Double(array) => array.len(),
            Value::Float(array) => array.len(),
            Value::Int(array) => array.len(),
            Value::String(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f64(&self) -> Option<&ArrayD<f64>> {
        match self {
            Value::Double(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Value::Float(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&ArrayD<i32>> {
        match self {
            Value::Int(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Value::String(items) => Some(items),
            _ => None,
        }
    }

    /// `{"type", "shape", "data"}` with `data` flattened in row-major order.
    pub fn to_json(&self) -> JsonValue {
        let data: JsonValue = match self {
            Value::Double(array) => array.iter().copied().collect(),
            Value::Float(array) => array.iter().copied().collect(),
            Value::Int(array) => array.iter().copied().collect(),
            Value::String(items) => items.iter().cloned().collect(),
        };
        json!({
            "type": self.type_name(),
            "shape": self.shape(),
            "data": data,
        })
    }
}

/// Descriptor recomputed from the kernel on every call.
#[derive(Clone, Debug, PartialEq)]
pub struct VarInfo {
    pub address: String,
    pub raw_type: String,
    pub var_type: VarType,
    pub rank: usize,
    pub shape: Vec<usize>,
    pub item_size: usize,
    pub nbytes: usize,
}

impl VarInfo {
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "address": self.address,
            "type": self.raw_type,
            "rank": self.rank,
            "shape": self.shape,
            "itemsize": self.item_size,
            "nbytes": self.nbytes,
        })
    }
}

struct VarName {
    c_name: CString,
    detail: String,
}

impl VarName {
    fn new(name: &str) -> Result<Self, Error> {
        Ok(Self {
            c_name: c_string(name)?,
            detail: format!("for variable {name}"),
        })
    }

    fn as_ptr(&self) -> *const c_char {
        self.c_name.as_ptr()
    }
}

impl Session {
    /// Raw type tag as reported by the kernel, e.g. `DOUBLE (90)`.
    pub fn get_var_type(&self, name: impl AsRef<str>) -> Result<String, Error> {
        let var = VarName::new(name.as_ref())?;
        self.raw_var_type(&var)
    }

    pub fn var_type(&self, name: impl AsRef<str>) -> Result<VarType, Error> {
        self.get_var_type(name).map(|raw| VarType::parse(&raw))
    }

    pub fn get_var_rank(&self, name: impl AsRef<str>) -> Result<i32, Error> {
        let var = VarName::new(name.as_ref())?;
        self.var_int(&var, "get_var_rank")
    }

    /// Dimension sizes, exactly `rank` entries.
    pub fn get_var_shape(&self, name: impl AsRef<str>) -> Result<Vec<i32>, Error> {
        let var = VarName::new(name.as_ref())?;
        self.raw_shape(&var)
    }

    pub fn get_var_itemsize(&self, name: impl AsRef<str>) -> Result<i32, Error> {
        let var = VarName::new(name.as_ref())?;
        self.var_int(&var, "get_var_itemsize")
    }

    pub fn get_var_nbytes(&self, name: impl AsRef<str>) -> Result<i32, Error> {
        let var = VarName::new(name.as_ref())?;
        self.var_int(&var, "get_var_nbytes")
    }

    /// Grid id of a variable; grid-less variables fail as `ErrorKind::Kernel`.
    pub fn get_var_grid(&self, name: impl AsRef<str>) -> Result<i32, Error> {
        let var = VarName::new(name.as_ref())?;
        self.var_int(&var, "get_var_grid")
    }

    pub fn get_var_units(&self, _name: impl AsRef<str>) -> Result<String, Error> {
        Err(Error::not_implemented("get_var_units"))
    }

    pub fn get_var_location(&self, _name: impl AsRef<str>) -> Result<String, Error> {
        Err(Error::not_implemented("get_var_location"))
    }

    pub fn var_info(&self, name: impl AsRef<str>) -> Result<VarInfo, Error> {
        let name = name.as_ref();
        let var = VarName::new(name)?;
        let raw_type = self.raw_var_type(&var)?;
        let shape = to_usize_shape(&self.raw_shape(&var)?)?;
        Ok(VarInfo {
            address: name.to_string(),
            var_type: VarType::parse(&raw_type),
            raw_type,
            rank: shape.len(),
            shape,
            item_size: to_usize(self.var_int(&var, "get_var_itemsize")?)?,
            nbytes: to_usize(self.var_int(&var, "get_var_nbytes")?)?,
        })
    }

    /// Zero-copy view of the variable's kernel memory.
    pub fn get_value_ptr(&mut self, name: impl AsRef<str>) -> Result<ValueView<'_>, Error> {
        let var = VarName::new(name.as_ref())?;
        let var_type = VarType::parse(&self.raw_var_type(&var)?);
        let shape = self.pointer_shape(&var)?;
        // SAFETY: the element type of each arm matches the kernel's reported type.
        unsafe {
            match var_type {
                VarType::Double => Ok(ValueView::Double(self.pointer_view(&var, &shape)?)),
                VarType::Float => Ok(ValueView::Float(self.pointer_view(&var, &shape)?)),
                VarType::Int => Ok(ValueView::Int(self.pointer_view(&var, &shape)?)),
                other => Err(unsupported(&var, &other)),
            }
        }
    }

    /// Typed zero-copy view; fails with `ErrorKind::Input` when `T` does not
    /// match the variable's element type.
    pub fn get_value_ptr_as<T: Element>(
        &mut self,
        name: impl AsRef<str>,
    ) -> Result<ArrayViewMutD<'_, T>, Error> {
        let var = VarName::new(name.as_ref())?;
        let var_type = VarType::parse(&self.raw_var_type(&var)?);
        if !var_type.is_numeric() {
            return Err(unsupported(&var, &var_type));
        }
        if !T::matches(&var_type) {
            return Err(dtype_mismatch::<T>(&var, &var_type));
        }
        let shape = self.pointer_shape(&var)?;
        // SAFETY: `T` checked against the kernel's type above.
        unsafe { self.pointer_view(&var, &shape) }
    }

    /// Owned copy of the variable.
    pub fn get_value(&self, name: impl AsRef<str>) -> Result<Value, Error> {
        let var = VarName::new(name.as_ref())?;
        let var_type = VarType::parse(&self.raw_var_type(&var)?);
        let rank = self.var_int(&var, "get_var_rank")?;

        match var_type {
            VarType::String { .. } => self.copy_strings(&var, rank).map(Value::String),
            VarType::Double => self.copy_numeric::<f64>(&var, rank).map(Value::Double),
            VarType::Float => self.copy_numeric::<f32>(&var, rank).map(Value::Float),
            VarType::Int => self.copy_numeric::<i32>(&var, rank).map(Value::Int),
            other => Err(unsupported(&var, &other)),
        }
    }

    /// Copy the variable into a caller-owned, row-major array of matching shape.
    pub fn get_value_into<T, S, D>(
        &self,
        name: impl AsRef<str>,
        dest: &mut ArrayBase<S, D>,
    ) -> Result<(), Error>
    where
        T: Element,
        S: DataMut<Elem = T>,
        D: Dimension,
    {
        if !dest.is_standard_layout() {
            return Err(layout_error());
        }
        let var = VarName::new(name.as_ref())?;
        let var_type = VarType::parse(&self.raw_var_type(&var)?);
        if !var_type.is_numeric() {
            return Err(unsupported(&var, &var_type));
        }
        if !T::matches(&var_type) {
            return Err(dtype_mismatch::<T>(&var, &var_type));
        }
        let shape = self.pointer_shape(&var)?;
        check_shape(&var, &shape, dest.shape())?;

        let rank = self.var_int(&var, "get_var_rank")?;
        match T::GET_FN {
            Some(function) if rank > 0 => {
                let mut out = dest.as_mut_ptr();
                // SAFETY: `dest` is contiguous with exactly the variable's element count.
                unsafe {
                    self.kernel().invoke::<sys::FnGetValue<T>>(function, &var.detail, |f| {
                        f(var.as_ptr(), &mut out)
                    })
                }
            }
            _ => {
                // SAFETY: `T` checked above; the copy completes before returning.
                let src = unsafe { self.copy_pointer::<T>(&var, &shape) }?;
                let src = src.as_slice().ok_or_else(layout_error)?;
                let out = dest.as_slice_mut().ok_or_else(layout_error)?;
                out.copy_from_slice(src);
                Ok(())
            }
        }
    }

    /// Write a row-major array into a double or int variable of the same shape.
    pub fn set_value<T, S, D>(
        &mut self,
        name: impl AsRef<str>,
        values: &ArrayBase<S, D>,
    ) -> Result<(), Error>
    where
        T: Element,
        S: Data<Elem = T>,
        D: Dimension,
    {
        if !values.is_standard_layout() {
            return Err(layout_error());
        }
        let var = VarName::new(name.as_ref())?;
        let var_type = VarType::parse(&self.raw_var_type(&var)?);
        if !matches!(var_type, VarType::Double | VarType::Int) {
            return Err(unsupported(&var, &var_type));
        }
        let Some(function) = T::SET_FN.filter(|_| T::matches(&var_type)) else {
            return Err(dtype_mismatch::<T>(&var, &var_type));
        };
        let shape = self.pointer_shape(&var)?;
        check_shape(&var, &shape, values.shape())?;

        let src = values.as_ptr();
        // SAFETY: `values` is contiguous with exactly the variable's element count.
        unsafe {
            self.kernel()
                .invoke::<sys::FnSetValue<T>>(function, &var.detail, |f| f(var.as_ptr(), &src))
        }
    }

    pub fn get_value_at_indices<T: Element>(
        &self,
        _name: impl AsRef<str>,
        _dest: &mut [T],
        _indices: &[i32],
    ) -> Result<(), Error> {
        Err(Error::not_implemented("get_value_at_indices"))
    }

    pub fn set_value_at_indices<T: Element>(
        &mut self,
        _name: impl AsRef<str>,
        _indices: &[i32],
        _src: &[T],
    ) -> Result<(), Error> {
        Err(Error::not_implemented("set_value_at_indices"))
    }

    fn raw_var_type(&self, var: &VarName) -> Result<String, Error> {
        let mut out = CharBuffer::with_len(self.get_constant_int(sys::BMI_LENVARTYPE)?)?;
        unsafe {
            self.kernel()
                .invoke::<sys::FnVarStringOut>("get_var_type", &var.detail, |f| {
                    f(var.as_ptr(), out.as_mut_ptr())
                })
        }?;
        Ok(out.to_string_lossy())
    }

    fn var_int(&self, var: &VarName, function: &str) -> Result<i32, Error> {
        let mut value = 0;
        unsafe {
            self.kernel()
                .invoke::<sys::FnVarIntOut>(function, &var.detail, |f| f(var.as_ptr(), &mut value))
        }?;
        Ok(value)
    }

    fn raw_shape(&self, var: &VarName) -> Result<Vec<i32>, Error> {
        let rank = to_usize(self.var_int(var, "get_var_rank")?)?;
        let mut shape = vec![0i32; rank];
        if rank == 0 {
            return Ok(shape);
        }
        // SAFETY: the kernel fills exactly `rank` ints.
        unsafe {
            self.kernel()
                .invoke::<sys::FnVarIntOut>("get_var_shape", &var.detail, |f| {
                    f(var.as_ptr(), shape.as_mut_ptr())
                })
        }?;
        Ok(shape)
    }

    // Scalars are exposed as one-element arrays.
    fn pointer_shape(&self, var: &VarName) -> Result<Vec<usize>, Error> {
        let shape = to_usize_shape(&self.raw_shape(var)?)?;
        Ok(if shape.is_empty() { vec![1] } else { shape })
    }

    /// # Safety
    /// `T` must match the variable's element type.
    unsafe fn pointer_view<T: Element>(
        &mut self,
        var: &VarName,
        shape: &[usize],
    ) -> Result<ArrayViewMutD<'_, T>, Error> {
        let ptr = unsafe { self.value_pointer::<T>(var, shape) }?;
        // SAFETY: the kernel owns `product(shape)` contiguous row-major elements at `ptr`,
        // valid until it frees or reallocates them, which requires `&mut self`.
        Ok(unsafe { ArrayViewMutD::from_shape_ptr(IxDyn(shape), ptr.as_ptr()) })
    }

    /// # Safety
    /// `T` must match the variable's element type.
    unsafe fn copy_pointer<T: Element>(
        &self,
        var: &VarName,
        shape: &[usize],
    ) -> Result<ArrayD<T>, Error> {
        let ptr = unsafe { self.value_pointer::<T>(var, shape) }?;
        // SAFETY: as in `pointer_view`; the view is dropped before `self` is released.
        let view = unsafe { ArrayViewD::from_shape_ptr(IxDyn(shape), ptr.as_ptr()) };
        Ok(view.to_owned())
    }

    unsafe fn value_pointer<T: Element>(
        &self,
        var: &VarName,
        shape: &[usize],
    ) -> Result<NonNull<T>, Error> {
        let mut raw: *mut T = ptr::null_mut();
        unsafe {
            self.kernel()
                .invoke::<sys::FnGetValuePtr<T>>(T::PTR_FN, &var.detail, |f| {
                    f(var.as_ptr(), &mut raw)
                })
        }?;
        if shape.iter().product::<usize>() == 0 {
            return Ok(NonNull::dangling());
        }
        let ptr = NonNull::new(raw).ok_or_else(|| {
            Error::new(ErrorKind::Kernel)
                .with_message("kernel returned a null pointer")
                .with_function(T::PTR_FN)
                .with_detail(var.detail.clone())
        })?;
        if !ptr.as_ptr().is_aligned() {
            return Err(Error::new(ErrorKind::Kernel)
                .with_message("kernel returned a misaligned pointer")
                .with_function(T::PTR_FN)
                .with_detail(var.detail.clone()));
        }
        Ok(ptr)
    }

    fn copy_numeric<T: Element>(&self, var: &VarName, rank: i32) -> Result<ArrayD<T>, Error> {
        let shape = self.pointer_shape(var)?;
        match T::GET_FN {
            Some(function) if rank > 0 => {
                let mut dest = ArrayD::<T>::default(IxDyn(&shape));
                let mut out = dest.as_mut_ptr();
                // SAFETY: `dest` is a fresh standard-layout array of the variable's shape.
                unsafe {
                    self.kernel()
                        .invoke::<sys::FnGetValue<T>>(function, &var.detail, |f| {
                            f(var.as_ptr(), &mut out)
                        })
                }?;
                Ok(dest)
            }
            // Scalars and types without a copying getter are read through the pointer.
            _ => unsafe { self.copy_pointer::<T>(var, &shape) },
        }
    }

    fn copy_strings(&self, var: &VarName, rank: i32) -> Result<Vec<String>, Error> {
        let count = if rank == 0 {
            1
        } else {
            let shape = to_usize_shape(&self.raw_shape(var)?)?;
            match shape.first() {
                Some(0) | None => return Ok(Vec::new()),
                Some(count) => *count,
            }
        };
        let nbytes = to_usize(self.var_int(var, "get_var_nbytes")?)?;
        let width = nbytes / count + 1;
        let mut buf = vec![0u8; width * count];
        let mut out: *mut c_char = buf.as_mut_ptr().cast();
        // SAFETY: `count` slots of `nbytes / count` characters plus a terminator each.
        unsafe {
            self.kernel()
                .invoke::<sys::FnGetValueString>("get_value_string", &var.detail, |f| {
                    f(var.as_ptr(), &mut out)
                })
        }?;
        Ok(decode_padded(&buf, width, count))
    }
}

fn to_usize_shape(shape: &[i32]) -> Result<Vec<usize>, Error> {
    shape.iter().map(|dim| to_usize(*dim)).collect()
}

fn check_shape(var: &VarName, expected: &[usize], actual: &[usize]) -> Result<(), Error> {
    let scalar = expected == [1] && actual.is_empty();
    if expected == actual || scalar {
        return Ok(());
    }
    Err(Error::new(ErrorKind::Input)
        .with_message(format!("array shape {actual:?} does not match {expected:?}"))
        .with_detail(var.detail.clone()))
}

fn layout_error() -> Error {
    Error::new(ErrorKind::Input).with_message("array should have C layout")
}

fn dtype_mismatch<T: Element>(var: &VarName, var_type: &VarType) -> Error {
    Error::new(ErrorKind::Input)
        .with_message(format!(
            "array should have {} elements for a {var_type} variable",
            expected_element(var_type).unwrap_or(T::NAME)
        ))
        .with_detail(var.detail.clone())
}

fn expected_element(var_type: &VarType) -> Option<&'static str> {
    match var_type {
        VarType::Double => Some(f64::NAME),
        VarType::Float => Some(f32::NAME),
        VarType::Int => Some(i32::NAME),
        _ => None,
    }
}

fn unsupported(var: &VarName, var_type: &VarType) -> Error {
    Error::new(ErrorKind::UnsupportedType)
        .with_message(format!("unsupported value type {var_type}"))
        .with_detail(var.detail.clone())
}
