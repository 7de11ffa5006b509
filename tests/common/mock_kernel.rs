//! In-process groundwater kernel exporting the XMI C interface.
//!
//! One or three layers of 9 x 10 cells, two stress periods `(6.0, 2, 1.0)` and
//! `(6.0, 3, 1.0)`, constant heads of 1.0 and 0.0 at flat cells 20 and 68 of
//! every layer, and a solver that converges on its third outer iteration.
//! State is thread-local: every test thread drives its own kernel.
//!
//! String values are written in slots of `itemsize + 1` bytes, space padded and
//! NUL terminated.
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::ffi::{CStr, c_void};
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};

use libc::{c_char, c_double, c_int};
use xmi::api::{NativeLibrary, SymbolSource};

pub const COMPONENT_NAME: &str = "MODFLOW 6";
pub const VERSION: &str = "6.4.0";
pub const NROW: usize = 9;
pub const NCOL: usize = 10;
pub const CELL_SIZE: f64 = 10.0;
pub const CONVERGE_AFTER: u32 = 3;
pub const CHD_CELLS: [(usize, f64); 2] = [(20, 1.0), (68, 0.0)];
pub const INTERIOR_HEAD: f64 = 0.5;
pub const THREE_LAYER_CONFIG: &str = "mfsim_3lay.nam";
pub const MISSING_CONFIG: &str = "missing.nam";

// (perlen, nstp, tsmult)
const PERIODS: [(f64, u32, f64); 2] = [(6.0, 2, 1.0), (6.0, 3, 1.0)];
const STRING_WIDTH: usize = 16;

thread_local! {
    static KERNEL: RefCell<State> = RefCell::new(State::default());
    static LENVARADDRESS: Cell<c_int> = const { Cell::new(48) };
    static LENVARTYPE: Cell<c_int> = const { Cell::new(51) };
    static LENGRIDTYPE: Cell<c_int> = const { Cell::new(17) };
    static LENCOMPONENTNAME: Cell<c_int> = const { Cell::new(256) };
    static LENVERSION: Cell<c_int> = const { Cell::new(256) };
    static LENERRMESSAGE: Cell<c_int> = const { Cell::new(1025) };
    static ISTDOUTTOFILE: Cell<c_int> = const { Cell::new(1) };
}

#[derive(Default)]
struct State {
    model: Option<Model>,
    config: Option<String>,
    comm: Option<i32>,
    init_dir: Option<PathBuf>,
    last_error: String,
    calls: Vec<(&'static str, Option<PathBuf>)>,
}

enum Data {
    Double(Vec<f64>),
    Float(Vec<f32>),
    Int(Vec<i32>),
    Text(Vec<String>),
    Logical(Vec<i32>),
}

struct Var {
    address: String,
    shape: Vec<usize>,
    data: Data,
    input: bool,
    grid: Option<i32>,
}

impl Var {
    fn new(address: &str, shape: &[usize], data: Data) -> Self {
        Self {
            address: address.to_string(),
            shape: shape.to_vec(),
            data,
            input: false,
            grid: None,
        }
    }

    fn input(mut self) -> Self {
        self.input = true;
        self
    }

    fn on_grid(mut self, grid: i32) -> Self {
        self.grid = Some(grid);
        self
    }

    fn count(&self) -> usize {
        self.shape.iter().product()
    }

    fn item_size(&self) -> usize {
        match self.data {
            Data::Double(_) => 8,
            Data::Text(_) => STRING_WIDTH,
            Data::Float(_) | Data::Int(_) | Data::Logical(_) => 4,
        }
    }

    fn type_tag(&self) -> String {
        let base = match self.data {
            Data::Double(_) => "DOUBLE".to_string(),
            Data::Float(_) => "FLOAT".to_string(),
            Data::Int(_) => "INTEGER".to_string(),
            Data::Text(_) => format!("STRING LEN={STRING_WIDTH}"),
            Data::Logical(_) => "LOGICAL".to_string(),
        };
        if self.shape.is_empty() {
            base
        } else {
            let dims: Vec<String> = self.shape.iter().map(ToString::to_string).collect();
            format!("{base} ({})", dims.join(","))
        }
    }
}

struct Model {
    nlay: usize,
    vars: Vec<Var>,
    step: usize,
    current_time: f64,
    time_step: f64,
    iteration: u32,
    converged: bool,
}

impl Model {
    fn new(nlay: usize) -> Self {
        let ncell = nlay * NROW * NCOL;
        let mut ibound = vec![1; ncell];
        for layer in 0..nlay {
            for (cell, _) in CHD_CELLS {
                ibound[layer * NROW * NCOL + cell] = -1;
            }
        }
        let vars = vec![
            Var::new("SLN_1/X", &[ncell], Data::Double(vec![0.0; ncell]))
                .input()
                .on_grid(1),
            Var::new("SLN_1/MXITER", &[], Data::Int(vec![25])).input(),
            Var::new("TDIS/DELT", &[], Data::Double(vec![0.0])),
            Var::new("TDIS/TOTIM", &[], Data::Double(vec![0.0])),
            Var::new(
                "TEST_MODEL/DIS/TOP",
                &[NROW, NCOL],
                Data::Double((0..NROW * NCOL).map(|i| 10.0 + i as f64).collect()),
            )
            .on_grid(1),
            Var::new("TEST_MODEL/IBOUND", &[ncell], Data::Int(ibound))
                .input()
                .on_grid(1),
            Var::new("TEST_MODEL/STO/SY", &[ncell], Data::Float(vec![0.2; ncell])).input(),
            Var::new(
                "TEST_MODEL/PACKAGE_NAMES",
                &[3],
                Data::Text(vec!["DIS".into(), "NPF".into(), "CHD_0".into()]),
            ),
            Var::new("TEST_MODEL/MODEL_TYPE", &[], Data::Text(vec!["GWF6".into()])),
            Var::new("TEST_MODEL/CHD_0/AUXVAR", &[0], Data::Double(Vec::new())),
            Var::new("TEST_MODEL/CHD_0/NAMES", &[0], Data::Text(Vec::new())),
            Var::new("TEST_MODEL/NPF/IWETDRY", &[ncell], Data::Logical(vec![0; ncell])),
        ];
        Self {
            nlay,
            vars,
            step: 0,
            current_time: 0.0,
            time_step: step_lengths()[0],
            iteration: 0,
            converged: false,
        }
    }

    fn var(&self, name: &str) -> Result<&Var, String> {
        self.vars
            .iter()
            .find(|var| var.address == name)
            .ok_or_else(|| format!("unknown variable {name}"))
    }

    fn var_mut(&mut self, name: &str) -> Result<&mut Var, String> {
        self.vars
            .iter_mut()
            .find(|var| var.address == name)
            .ok_or_else(|| format!("unknown variable {name}"))
    }

    fn set_scalar(&mut self, name: &str, value: f64) {
        if let Ok(Var {
            data: Data::Double(values),
            ..
        }) = self.var_mut(name)
        {
            values[0] = value;
        }
    }

    fn prepare_time_step(&mut self) -> Result<(), String> {
        let dt = *step_lengths()
            .get(self.step)
            .ok_or_else(|| "simulation is already at its end time".to_string())?;
        self.time_step = dt;
        self.set_scalar("TDIS/DELT", dt);
        Ok(())
    }

    fn prepare_solve(&mut self, id: i32) -> Result<(), String> {
        check_solution(id)?;
        self.iteration = 0;
        self.converged = false;
        Ok(())
    }

    fn solve(&mut self, id: i32) -> Result<bool, String> {
        check_solution(id)?;
        self.iteration += 1;
        if self.iteration >= CONVERGE_AFTER && !self.converged {
            self.converged = true;
            self.apply_heads();
        }
        Ok(self.converged)
    }

    fn finalize_solve(&self, id: i32) -> Result<(), String> {
        check_solution(id)?;
        if self.converged {
            Ok(())
        } else {
            Err(format!(
                "solution 1 did not converge after {} iterations",
                self.iteration
            ))
        }
    }

    fn finalize_time_step(&mut self) {
        self.current_time += self.time_step;
        self.step += 1;
        let time = self.current_time;
        self.set_scalar("TDIS/TOTIM", time);
    }

    fn full_step(&mut self) -> Result<(), String> {
        self.prepare_time_step()?;
        self.prepare_solve(1)?;
        while !self.solve(1)? {}
        self.finalize_solve(1)?;
        self.finalize_time_step();
        Ok(())
    }

    fn apply_heads(&mut self) {
        let nlay = self.nlay;
        if let Ok(Var {
            data: Data::Double(heads),
            ..
        }) = self.var_mut("SLN_1/X")
        {
            for layer in 0..nlay {
                let base = layer * NROW * NCOL;
                heads[base..base + NROW * NCOL].fill(INTERIOR_HEAD);
                for (cell, head) in CHD_CELLS {
                    heads[base + cell] = head;
                }
            }
        }
    }

    fn grid_shape(&self, grid: i32) -> Result<Vec<usize>, String> {
        if grid != 1 {
            return Err(format!("invalid grid id {grid}"));
        }
        Ok(if self.nlay == 1 {
            vec![NROW, NCOL]
        } else {
            vec![self.nlay, NROW, NCOL]
        })
    }
}

fn step_lengths() -> Vec<f64> {
    PERIODS
        .iter()
        .flat_map(|(perlen, nstp, _tsmult)| {
            std::iter::repeat_n(perlen / f64::from(*nstp), *nstp as usize)
        })
        .collect()
}

fn check_solution(id: i32) -> Result<(), String> {
    if id == 1 {
        Ok(())
    } else {
        Err(format!("invalid solution id {id}"))
    }
}

fn entry(function: &'static str, body: impl FnOnce(&mut State) -> Result<(), String>) -> c_int {
    KERNEL.with(|kernel| {
        let mut state = kernel.borrow_mut();
        state.calls.push((function, std::env::current_dir().ok()));
        match body(&mut state) {
            Ok(()) => 0,
            Err(message) => {
                state.last_error = message;
                1
            }
        }
    })
}

fn model(state: &mut State) -> Result<&mut Model, String> {
    state
        .model
        .as_mut()
        .ok_or_else(|| "the model is not initialized".to_string())
}

unsafe fn read_c(ptr: *const c_char) -> String {
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

unsafe fn write_c(out: *mut c_char, text: &str) {
    unsafe {
        ptr::copy_nonoverlapping(text.as_ptr().cast::<c_char>(), out, text.len());
        *out.add(text.len()) = 0;
    }
}

unsafe extern "C" fn initialize(config: *const c_char) -> c_int {
    let config = unsafe { read_c(config) };
    entry("initialize", |state| {
        if config.ends_with(MISSING_CONFIG) {
            return Err(format!("could not open simulation file {config}"));
        }
        let nlay = if config == THREE_LAYER_CONFIG { 3 } else { 1 };
        state.model = Some(Model::new(nlay));
        state.init_dir = std::env::current_dir().ok();
        state.config = Some(config);
        Ok(())
    })
}

unsafe extern "C" fn initialize_mpi(comm: *const c_int) -> c_int {
    let comm = unsafe { *comm };
    entry("initialize_mpi", |state| {
        state.model = Some(Model::new(1));
        state.init_dir = std::env::current_dir().ok();
        state.comm = Some(comm);
        Ok(())
    })
}

unsafe extern "C" fn finalize() -> c_int {
    entry("finalize", |state| {
        model(state)?;
        state.model = None;
        Ok(())
    })
}

unsafe extern "C" fn update() -> c_int {
    entry("update", |state| model(state)?.full_step())
}

unsafe extern "C" fn update_until(_time: c_double) -> c_int {
    entry("update_until", |_| Err("update_until is not supported".to_string()))
}

unsafe extern "C" fn prepare_time_step(_dt: *const c_double) -> c_int {
    entry("prepare_time_step", |state| model(state)?.prepare_time_step())
}

unsafe extern "C" fn do_time_step() -> c_int {
    entry("do_time_step", |state| {
        let model = model(state)?;
        model.prepare_solve(1)?;
        while !model.solve(1)? {}
        model.finalize_solve(1)
    })
}

unsafe extern "C" fn finalize_time_step() -> c_int {
    entry("finalize_time_step", |state| {
        model(state)?.finalize_time_step();
        Ok(())
    })
}

unsafe extern "C" fn get_subcomponent_count(count: *mut c_int) -> c_int {
    entry("get_subcomponent_count", |state| {
        model(state)?;
        unsafe { *count = 1 };
        Ok(())
    })
}

unsafe extern "C" fn prepare_solve(id: *const c_int) -> c_int {
    let id = unsafe { *id };
    entry("prepare_solve", |state| model(state)?.prepare_solve(id))
}

unsafe extern "C" fn solve(id: *const c_int, converged: *mut c_int) -> c_int {
    let id = unsafe { *id };
    entry("solve", |state| {
        let done = model(state)?.solve(id)?;
        unsafe { *converged = c_int::from(done) };
        Ok(())
    })
}

unsafe extern "C" fn finalize_solve(id: *const c_int) -> c_int {
    let id = unsafe { *id };
    entry("finalize_solve", |state| model(state)?.finalize_solve(id))
}

unsafe fn time_entry(
    function: &'static str,
    out: *mut c_double,
    read: impl FnOnce(&Model) -> f64,
) -> c_int {
    entry(function, |state| {
        let value = read(&*model(state)?);
        unsafe { *out = value };
        Ok(())
    })
}

unsafe extern "C" fn get_start_time(out: *mut c_double) -> c_int {
    unsafe { time_entry("get_start_time", out, |_| 0.0) }
}

unsafe extern "C" fn get_end_time(out: *mut c_double) -> c_int {
    unsafe { time_entry("get_end_time", out, |_| step_lengths().iter().sum()) }
}

unsafe extern "C" fn get_current_time(out: *mut c_double) -> c_int {
    unsafe { time_entry("get_current_time", out, |model| model.current_time) }
}

unsafe extern "C" fn get_time_step(out: *mut c_double) -> c_int {
    unsafe { time_entry("get_time_step", out, |model| model.time_step) }
}

unsafe extern "C" fn get_component_name(out: *mut c_char) -> c_int {
    entry("get_component_name", |_| {
        unsafe { write_c(out, COMPONENT_NAME) };
        Ok(())
    })
}

unsafe extern "C" fn get_version(out: *mut c_char) -> c_int {
    entry("get_version", |_| {
        unsafe { write_c(out, VERSION) };
        Ok(())
    })
}

unsafe extern "C" fn get_last_bmi_error(out: *mut c_char) -> c_int {
    entry("get_last_bmi_error", |state| {
        unsafe { write_c(out, &state.last_error) };
        Ok(())
    })
}

unsafe extern "C" fn get_var_address(
    component: *const c_char,
    subcomponent: *const c_char,
    var: *const c_char,
    out: *mut c_char,
) -> c_int {
    let (component, subcomponent, var) =
        unsafe { (read_c(component), read_c(subcomponent), read_c(var)) };
    entry("get_var_address", |_| {
        if component.is_empty() || var.is_empty() {
            return Err("component and variable names are required".to_string());
        }
        let address = if subcomponent.is_empty() {
            format!("{component}/{var}")
        } else {
            format!("{component}/{subcomponent}/{var}")
        };
        unsafe { write_c(out, &address) };
        Ok(())
    })
}

unsafe fn count_entry(function: &'static str, out: *mut c_int, inputs_only: bool) -> c_int {
    entry(function, |state| {
        let model = model(state)?;
        let count = model.vars.iter().filter(|var| var.input || !inputs_only).count();
        unsafe { *out = count as c_int };
        Ok(())
    })
}

unsafe fn names_entry(function: &'static str, out: *mut c_char, inputs_only: bool) -> c_int {
    let width = LENVARADDRESS.with(Cell::get) as usize;
    entry(function, |state| {
        let model = model(state)?;
        let vars = model.vars.iter().filter(|var| var.input || !inputs_only);
        for (slot, var) in vars.enumerate() {
            unsafe { write_c(out.add(slot * width), &var.address) };
        }
        Ok(())
    })
}

unsafe extern "C" fn get_input_item_count(out: *mut c_int) -> c_int {
    unsafe { count_entry("get_input_item_count", out, true) }
}

unsafe extern "C" fn get_output_item_count(out: *mut c_int) -> c_int {
    unsafe { count_entry("get_output_item_count", out, false) }
}

unsafe extern "C" fn get_input_var_names(out: *mut c_char) -> c_int {
    unsafe { names_entry("get_input_var_names", out, true) }
}

unsafe extern "C" fn get_output_var_names(out: *mut c_char) -> c_int {
    unsafe { names_entry("get_output_var_names", out, false) }
}

unsafe fn var_entry(
    function: &'static str,
    name: *const c_char,
    body: impl FnOnce(&mut Var) -> Result<(), String>,
) -> c_int {
    let name = unsafe { read_c(name) };
    entry(function, |state| body(model(state)?.var_mut(&name)?))
}

unsafe extern "C" fn get_var_type(name: *const c_char, out: *mut c_char) -> c_int {
    unsafe {
        var_entry("get_var_type", name, |var| {
            write_c(out, &var.type_tag());
            Ok(())
        })
    }
}

unsafe extern "C" fn get_var_rank(name: *const c_char, out: *mut c_int) -> c_int {
    unsafe {
        var_entry("get_var_rank", name, |var| {
            *out = var.shape.len() as c_int;
            Ok(())
        })
    }
}

unsafe extern "C" fn get_var_shape(name: *const c_char, out: *mut c_int) -> c_int {
    unsafe {
        var_entry("get_var_shape", name, |var| {
            for (i, dim) in var.shape.iter().enumerate() {
                *out.add(i) = *dim as c_int;
            }
            Ok(())
        })
    }
}

unsafe extern "C" fn get_var_itemsize(name: *const c_char, out: *mut c_int) -> c_int {
    unsafe {
        var_entry("get_var_itemsize", name, |var| {
            *out = var.item_size() as c_int;
            Ok(())
        })
    }
}

unsafe extern "C" fn get_var_nbytes(name: *const c_char, out: *mut c_int) -> c_int {
    unsafe {
        var_entry("get_var_nbytes", name, |var| {
            *out = (var.item_size() * var.count().max(1)) as c_int;
            Ok(())
        })
    }
}

unsafe extern "C" fn get_var_grid(name: *const c_char, out: *mut c_int) -> c_int {
    unsafe {
        var_entry("get_var_grid", name, |var| {
            *out = var
                .grid
                .ok_or_else(|| format!("variable {} has no grid", var.address))?;
            Ok(())
        })
    }
}

fn wrong_type(address: &str, wanted: &str) -> String {
    format!("variable {address} is not of type {wanted}")
}

unsafe extern "C" fn get_value_ptr_double(name: *const c_char, out: *mut *mut f64) -> c_int {
    unsafe {
        var_entry("get_value_ptr_double", name, |var| match &mut var.data {
            Data::Double(values) => {
                *out = values.as_mut_ptr();
                Ok(())
            }
            _ => Err(wrong_type(&var.address, "double")),
        })
    }
}

unsafe extern "C" fn get_value_ptr_float(name: *const c_char, out: *mut *mut f32) -> c_int {
    unsafe {
        var_entry("get_value_ptr_float", name, |var| match &mut var.data {
            Data::Float(values) => {
                *out = values.as_mut_ptr();
                Ok(())
            }
            _ => Err(wrong_type(&var.address, "float")),
        })
    }
}

unsafe extern "C" fn get_value_ptr_int(name: *const c_char, out: *mut *mut i32) -> c_int {
    unsafe {
        var_entry("get_value_ptr_int", name, |var| match &mut var.data {
            Data::Int(values) => {
                *out = values.as_mut_ptr();
                Ok(())
            }
            _ => Err(wrong_type(&var.address, "int")),
        })
    }
}

unsafe extern "C" fn get_value_double(name: *const c_char, dest: *mut *mut f64) -> c_int {
    unsafe {
        var_entry("get_value_double", name, |var| match &var.data {
            Data::Double(values) => {
                ptr::copy_nonoverlapping(values.as_ptr(), *dest, values.len());
                Ok(())
            }
            _ => Err(wrong_type(&var.address, "double")),
        })
    }
}

unsafe extern "C" fn get_value_int(name: *const c_char, dest: *mut *mut i32) -> c_int {
    unsafe {
        var_entry("get_value_int", name, |var| match &var.data {
            Data::Int(values) => {
                ptr::copy_nonoverlapping(values.as_ptr(), *dest, values.len());
                Ok(())
            }
            _ => Err(wrong_type(&var.address, "int")),
        })
    }
}

unsafe extern "C" fn set_value_double(name: *const c_char, src: *const *const f64) -> c_int {
    unsafe {
        var_entry("set_value_double", name, |var| match &mut var.data {
            Data::Double(values) => {
                ptr::copy_nonoverlapping(*src, values.as_mut_ptr(), values.len());
                Ok(())
            }
            _ => Err(wrong_type(&var.address, "double")),
        })
    }
}

unsafe extern "C" fn set_value_int(name: *const c_char, src: *const *const i32) -> c_int {
    unsafe {
        var_entry("set_value_int", name, |var| match &mut var.data {
            Data::Int(values) => {
                ptr::copy_nonoverlapping(*src, values.as_mut_ptr(), values.len());
                Ok(())
            }
            _ => Err(wrong_type(&var.address, "int")),
        })
    }
}

unsafe extern "C" fn get_value_string(name: *const c_char, dest: *mut *mut c_char) -> c_int {
    unsafe {
        var_entry("get_value_string", name, |var| match &var.data {
            Data::Text(items) => {
                let width = STRING_WIDTH;
                for (i, item) in items.iter().enumerate() {
                    let padded = format!("{item:<width$}");
                    write_c((*dest).add(i * (width + 1)), &padded);
                }
                Ok(())
            }
            _ => Err(wrong_type(&var.address, "string")),
        })
    }
}

unsafe fn grid_entry(
    function: &'static str,
    grid: *const c_int,
    body: impl FnOnce(&Model, i32) -> Result<(), String>,
) -> c_int {
    let grid = unsafe { *grid };
    entry(function, |state| {
        let model = &*model(state)?;
        model.grid_shape(grid)?;
        body(model, grid)
    })
}

unsafe extern "C" fn get_grid_rank(grid: *const c_int, out: *mut c_int) -> c_int {
    unsafe {
        grid_entry("get_grid_rank", grid, |model, grid| {
            *out = model.grid_shape(grid)?.len() as c_int;
            Ok(())
        })
    }
}

unsafe extern "C" fn get_grid_size(grid: *const c_int, out: *mut c_int) -> c_int {
    unsafe {
        grid_entry("get_grid_size", grid, |model, grid| {
            *out = model.grid_shape(grid)?.iter().product::<usize>() as c_int;
            Ok(())
        })
    }
}

unsafe extern "C" fn get_grid_shape(grid: *const c_int, out: *mut c_int) -> c_int {
    unsafe {
        grid_entry("get_grid_shape", grid, |model, grid| {
            for (i, dim) in model.grid_shape(grid)?.iter().enumerate() {
                *out.add(i) = *dim as c_int;
            }
            Ok(())
        })
    }
}

unsafe extern "C" fn get_grid_type(grid: *const c_int, out: *mut c_char) -> c_int {
    unsafe {
        grid_entry("get_grid_type", grid, |_, _| {
            write_c(out, "rectilinear");
            Ok(())
        })
    }
}

unsafe extern "C" fn get_grid_x(grid: *const c_int, out: *mut c_double) -> c_int {
    unsafe {
        grid_entry("get_grid_x", grid, |_, _| {
            for i in 0..=NCOL {
                *out.add(i) = i as f64 * CELL_SIZE;
            }
            Ok(())
        })
    }
}

unsafe extern "C" fn get_grid_y(grid: *const c_int, out: *mut c_double) -> c_int {
    unsafe {
        grid_entry("get_grid_y", grid, |_, _| {
            for i in 0..=NROW {
                *out.add(i) = (NROW - i) as f64 * CELL_SIZE;
            }
            Ok(())
        })
    }
}

unsafe extern "C" fn get_grid_node_count(grid: *const c_int, _out: *mut c_int) -> c_int {
    unsafe {
        grid_entry("get_grid_node_count", grid, |_, _| {
            Err("node count is not available for rectilinear grids".to_string())
        })
    }
}

/// Symbol table standing in for the shared library.
pub struct MockKernel {
    missing: HashSet<String>,
}

impl MockKernel {
    /// Fresh kernel state for the calling thread.
    pub fn new() -> Self {
        KERNEL.with(|kernel| *kernel.borrow_mut() = State::default());
        ISTDOUTTOFILE.with(|knob| knob.set(1));
        LENVARADDRESS.with(|len| len.set(48));
        Self {
            missing: HashSet::new(),
        }
    }

    /// Hide an exported symbol, as a kernel built without it would.
    pub fn without(mut self, name: &str) -> Self {
        self.missing.insert(name.to_string());
        self
    }

    pub fn into_library(self, working_directory: &Path) -> NativeLibrary {
        NativeLibrary::from_symbols("libmock_mf6", self, working_directory)
    }
}

impl SymbolSource for MockKernel {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        if self.missing.contains(name) {
            return None;
        }
        let ptr: *mut c_void = match name {
            "initialize" => initialize as *mut c_void,
            "initialize_mpi" => initialize_mpi as *mut c_void,
            "finalize" => finalize as *mut c_void,
            "update" => update as *mut c_void,
            "update_until" => update_until as *mut c_void,
            "prepare_time_step" => prepare_time_step as *mut c_void,
            "do_time_step" => do_time_step as *mut c_void,
            "finalize_time_step" => finalize_time_step as *mut c_void,
            "get_subcomponent_count" => get_subcomponent_count as *mut c_void,
            "prepare_solve" => prepare_solve as *mut c_void,
            "solve" => solve as *mut c_void,
            "finalize_solve" => finalize_solve as *mut c_void,
            "get_start_time" => get_start_time as *mut c_void,
            "get_end_time" => get_end_time as *mut c_void,
            "get_current_time" => get_current_time as *mut c_void,
            "get_time_step" => get_time_step as *mut c_void,
            "get_component_name" => get_component_name as *mut c_void,
            "get_version" => get_version as *mut c_void,
            "get_last_bmi_error" => get_last_bmi_error as *mut c_void,
            "get_var_address" => get_var_address as *mut c_void,
            "get_input_item_count" => get_input_item_count as *mut c_void,
            "get_output_item_count" => get_output_item_count as *mut c_void,
            "get_input_var_names" => get_input_var_names as *mut c_void,
            "get_output_var_names" => get_output_var_names as *mut c_void,
            "get_var_type" => get_var_type as *mut c_void,
            "get_var_rank" => get_var_rank as *mut c_void,
            "get_var_shape" => get_var_shape as *mut c_void,
            "get_var_itemsize" => get_var_itemsize as *mut c_void,
            "get_var_nbytes" => get_var_nbytes as *mut c_void,
            "get_var_grid" => get_var_grid as *mut c_void,
            "get_value_ptr_double" => get_value_ptr_double as *mut c_void,
            "get_value_ptr_float" => get_value_ptr_float as *mut c_void,
            "get_value_ptr_int" => get_value_ptr_int as *mut c_void,
            "get_value_double" => get_value_double as *mut c_void,
            "get_value_int" => get_value_int as *mut c_void,
            "set_value_double" => set_value_double as *mut c_void,
            "set_value_int" => set_value_int as *mut c_void,
            "get_value_string" => get_value_string as *mut c_void,
            "get_grid_rank" => get_grid_rank as *mut c_void,
            "get_grid_size" => get_grid_size as *mut c_void,
            "get_grid_shape" => get_grid_shape as *mut c_void,
            "get_grid_type" => get_grid_type as *mut c_void,
            "get_grid_x" => get_grid_x as *mut c_void,
            "get_grid_y" => get_grid_y as *mut c_void,
            "get_grid_node_count" => get_grid_node_count as *mut c_void,
            "BMI_LENVARADDRESS" => LENVARADDRESS.with(Cell::as_ptr).cast(),
            "BMI_LENVARTYPE" => LENVARTYPE.with(Cell::as_ptr).cast(),
            "BMI_LENGRIDTYPE" => LENGRIDTYPE.with(Cell::as_ptr).cast(),
            "BMI_LENCOMPONENTNAME" => LENCOMPONENTNAME.with(Cell::as_ptr).cast(),
            "BMI_LENVERSION" => LENVERSION.with(Cell::as_ptr).cast(),
            "BMI_LENERRMESSAGE" => LENERRMESSAGE.with(Cell::as_ptr).cast(),
            "ISTDOUTTOFILE" => ISTDOUTTOFILE.with(Cell::as_ptr).cast(),
            _ => return None,
        };
        NonNull::new(ptr)
    }
}

/// How often `function` was entered on this thread since `MockKernel::new`.
pub fn calls_to(function: &str) -> usize {
    KERNEL.with(|kernel| {
        kernel
            .borrow()
            .calls
            .iter()
            .filter(|(call, _)| *call == function)
            .count()
    })
}

/// Working directory seen by every call the kernel received so far.
pub fn call_dirs() -> Vec<(&'static str, Option<PathBuf>)> {
    KERNEL.with(|kernel| kernel.borrow().calls.clone())
}

pub fn init_dir() -> Option<PathBuf> {
    KERNEL.with(|kernel| kernel.borrow().init_dir.clone())
}

pub fn config() -> Option<String> {
    KERNEL.with(|kernel| kernel.borrow().config.clone())
}

pub fn mpi_comm() -> Option<i32> {
    KERNEL.with(|kernel| kernel.borrow().comm)
}

pub fn stdout_to_file() -> c_int {
    ISTDOUTTOFILE.with(Cell::get)
}

pub fn is_initialized() -> bool {
    KERNEL.with(|kernel| kernel.borrow().model.is_some())
}
