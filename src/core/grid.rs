//! Purpose: Grid geometry and topology queries keyed by integer grid id.
//! Exports: `GridType`; `Session` grid accessors.
//! Role: Thin typed layer over the kernel's `get_grid_*` entry points.
//! Invariants: Every query is forwarded unchanged; ids are never validated locally.
//! Invariants: Coordinate and connectivity fills trust the caller's buffer length,
//!   because the kernel does not report how many entries it writes.
use std::fmt;

use libc::c_int;

use crate::core::buffer::CharBuffer;
use crate::core::error::{Error, ErrorKind};
use crate::core::session::Session;
use crate::core::status::to_usize;
use crate::core::sys;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GridType {
    Rectilinear,
    Unstructured,
    Points,
    Scalar,
    Other(String),
}

impl GridType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "rectilinear" => GridType::Rectilinear,
            "unstructured" => GridType::Unstructured,
            "points" => GridType::Points,
            "scalar" => GridType::Scalar,
            _ => GridType::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GridType::Rectilinear => "rectilinear",
            GridType::Unstructured => "unstructured",
            GridType::Points => "points",
            GridType::Scalar => "scalar",
            GridType::Other(raw) => raw,
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Session {
    pub fn get_grid_rank(&self, grid: i32) -> Result<i32, Error> {
        self.grid_int("get_grid_rank", grid)
    }

    pub fn get_grid_size(&self, grid: i32) -> Result<i32, Error> {
        self.grid_int("get_grid_size", grid)
    }

    /// Raw grid type text, e.g. `rectilinear`.
    pub fn get_grid_type(&self, grid: i32) -> Result<String, Error> {
        let mut out = CharBuffer::with_len(self.get_constant_int(sys::BMI_LENGRIDTYPE)?)?;
        unsafe {
            self.kernel()
                .invoke::<sys::FnGridStringOut>("get_grid_type", &grid_detail(grid), |f| {
                    f(&grid, out.as_mut_ptr())
                })
        }?;
        Ok(out.to_string_lossy())
    }

    pub fn grid_type(&self, grid: i32) -> Result<GridType, Error> {
        self.get_grid_type(grid).map(|raw| GridType::parse(&raw))
    }

    pub fn get_grid_node_count(&self, grid: i32) -> Result<i32, Error> {
        self.grid_int("get_grid_node_count", grid)
    }

    pub fn get_grid_face_count(&self, grid: i32) -> Result<i32, Error> {
        self.grid_int("get_grid_face_count", grid)
    }

    /// Fill `shape` with the grid's dimensions (row-major); needs room for `rank` entries.
    pub fn get_grid_shape(&self, grid: i32, shape: &mut [i32]) -> Result<(), Error> {
        let rank = self.get_grid_rank(grid)?;
        let needed = to_usize(rank)?;
        if shape.len() < needed {
            return Err(Error::new(ErrorKind::Input)
                .with_message(format!(
                    "shape buffer holds {} entries, grid rank is {rank}",
                    shape.len()
                ))
                .with_function("get_grid_shape")
                .with_detail(grid_detail(grid)));
        }
        // SAFETY: `shape` holds at least `rank` ints.
        unsafe { self.grid_fill_int("get_grid_shape", grid, shape) }
    }

    /// # Safety
    /// `x` must hold every coordinate the kernel writes for this grid.
    pub unsafe fn get_grid_x(&self, grid: i32, x: &mut [f64]) -> Result<(), Error> {
        unsafe { self.grid_fill_double("get_grid_x", grid, x) }
    }

    /// # Safety
    /// See `get_grid_x`.
    pub unsafe fn get_grid_y(&self, grid: i32, y: &mut [f64]) -> Result<(), Error> {
        unsafe { self.grid_fill_double("get_grid_y", grid, y) }
    }

    /// # Safety
    /// See `get_grid_x`.
    pub unsafe fn get_grid_z(&self, grid: i32, z: &mut [f64]) -> Result<(), Error> {
        unsafe { self.grid_fill_double("get_grid_z", grid, z) }
    }

    /// # Safety
    /// `face_nodes` must hold the sum of `nodes_per_face` entries.
    pub unsafe fn get_grid_face_nodes(&self, grid: i32, face_nodes: &mut [i32]) -> Result<(), Error> {
        unsafe { self.grid_fill_int("get_grid_face_nodes", grid, face_nodes) }
    }

    /// # Safety
    /// `nodes_per_face` must hold one entry per face.
    pub unsafe fn get_grid_nodes_per_face(
        &self,
        grid: i32,
        nodes_per_face: &mut [i32],
    ) -> Result<(), Error> {
        unsafe { self.grid_fill_int("get_grid_nodes_per_face", grid, nodes_per_face) }
    }

    pub fn get_grid_edge_count(&self, _grid: i32) -> Result<i32, Error> {
        Err(Error::not_implemented("get_grid_edge_count"))
    }

    pub fn get_grid_edge_nodes(&self, _grid: i32, _edge_nodes: &mut [i32]) -> Result<(), Error> {
        Err(Error::not_implemented("get_grid_edge_nodes"))
    }

    pub fn get_grid_face_edges(&self, _grid: i32, _face_edges: &mut [i32]) -> Result<(), Error> {
        Err(Error::not_implemented("get_grid_face_edges"))
    }

    pub fn get_grid_spacing(&self, _grid: i32, _spacing: &mut [f64]) -> Result<(), Error> {
        Err(Error::not_implemented("get_grid_spacing"))
    }

    pub fn get_grid_origin(&self, _grid: i32, _origin: &mut [f64]) -> Result<(), Error> {
        Err(Error::not_implemented("get_grid_origin"))
    }

    fn grid_int(&self, function: &str, grid: i32) -> Result<i32, Error> {
        let mut value: c_int = 0;
        unsafe {
            self.kernel()
                .invoke::<sys::FnGridIntOut>(function, &grid_detail(grid), |f| f(&grid, &mut value))
        }?;
        Ok(value)
    }

    unsafe fn grid_fill_int(&self, function: &str, grid: i32, out: &mut [i32]) -> Result<(), Error> {
        unsafe {
            self.kernel()
                .invoke::<sys::FnGridIntOut>(function, &grid_detail(grid), |f| {
                    f(&grid, out.as_mut_ptr())
                })
        }
    }

    unsafe fn grid_fill_double(
        &self,
        function: &str,
        grid: i32,
        out: &mut [f64],
    ) -> Result<(), Error> {
        unsafe {
            self.kernel()
                .invoke::<sys::FnGridDoubleOut>(function, &grid_detail(grid), |f| {
                    f(&grid, out.as_mut_ptr())
                })
        }
    }
}

fn grid_detail(grid: i32) -> String {
    format!("for id {grid}")
}
