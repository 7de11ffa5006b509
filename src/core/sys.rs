// C signatures of the XMI/BMI entry points and the names of exported length constants.
use libc::{c_char, c_double, c_int};

pub const BMI_LENVARADDRESS: &str = "BMI_LENVARADDRESS";
pub const BMI_LENVARTYPE: &str = "BMI_LENVARTYPE";
pub const BMI_LENGRIDTYPE: &str = "BMI_LENGRIDTYPE";
pub const BMI_LENCOMPONENTNAME: &str = "BMI_LENCOMPONENTNAME";
pub const BMI_LENVERSION: &str = "BMI_LENVERSION";
pub const BMI_LENERRMESSAGE: &str = "BMI_LENERRMESSAGE";

pub const STATUS_SUCCESS: c_int = 0;

/// `update`, `finalize`, `do_time_step`, `finalize_time_step`.
pub type FnNoArgs = unsafe extern "C" fn() -> c_int;
/// `initialize(config_file)`.
pub type FnInitialize = unsafe extern "C" fn(*const c_char) -> c_int;
/// `initialize_mpi(&comm)`, `prepare_solve(&id)`, `finalize_solve(&id)`.
pub type FnIntIn = unsafe extern "C" fn(*const c_int) -> c_int;
pub type FnUpdateUntil = unsafe extern "C" fn(c_double) -> c_int;
/// `get_*_time`, `get_time_step`.
pub type FnDoubleOut = unsafe extern "C" fn(*mut c_double) -> c_int;
pub type FnDoubleIn = unsafe extern "C" fn(*const c_double) -> c_int;
/// `get_*_item_count`, `get_subcomponent_count`.
pub type FnIntOut = unsafe extern "C" fn(*mut c_int) -> c_int;
/// `get_component_name`, `get_version`, `get_*_var_names`, `get_last_bmi_error`.
pub type FnStringOut = unsafe extern "C" fn(*mut c_char) -> c_int;
pub type FnSolve = unsafe extern "C" fn(*const c_int, *mut c_int) -> c_int;

/// `get_var_grid`, `get_var_rank`, `get_var_shape`, `get_var_itemsize`, `get_var_nbytes`.
pub type FnVarIntOut = unsafe extern "C" fn(*const c_char, *mut c_int) -> c_int;
pub type FnVarStringOut = unsafe extern "C" fn(*const c_char, *mut c_char) -> c_int;

/// `get_value_ptr_double` / `_float` / `_int`: the kernel writes the address of its array.
pub type FnGetValuePtr<T> = unsafe extern "C" fn(*const c_char, *mut *mut T) -> c_int;

// The copying getters/setters take the caller's buffer address by reference.
/// `get_value_double` / `get_value_int`.
pub type FnGetValue<T> = unsafe extern "C" fn(*const c_char, *mut *mut T) -> c_int;
/// `set_value_double` / `set_value_int`.
pub type FnSetValue<T> = unsafe extern "C" fn(*const c_char, *const *const T) -> c_int;
pub type FnGetValueString = unsafe extern "C" fn(*const c_char, *mut *mut c_char) -> c_int;

/// `get_grid_rank`, `get_grid_size`, `get_grid_node_count`, `get_grid_face_count`,
/// `get_grid_shape`, `get_grid_face_nodes`, `get_grid_nodes_per_face`.
pub type FnGridIntOut = unsafe extern "C" fn(*const c_int, *mut c_int) -> c_int;
/// `get_grid_x`, `get_grid_y`, `get_grid_z`.
pub type FnGridDoubleOut = unsafe extern "C" fn(*const c_int, *mut c_double) -> c_int;
pub type FnGridStringOut = unsafe extern "C" fn(*const c_int, *mut c_char) -> c_int;

/// `get_var_address(component, subcomponent, var_name, out)`.
pub type FnVarAddress =
    unsafe extern "C" fn(*const c_char, *const c_char, *const c_char, *mut c_char) -> c_int;
