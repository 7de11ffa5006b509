//! Purpose: Serializable snapshots of model and grid metadata.
//! Exports: `ModelSummary`, `GridSummary`.
//! Role: Keep the CLI's `info`/`grid` JSON envelopes consistent for every entry point.
//! Invariants: Optional kernel queries (version, grid counts) degrade to `None`, never fail.

use crate::core::address::VarAddress;
use crate::core::error::{Error, ErrorKind};
use crate::core::grid::GridType;
use crate::core::session::Session;
use crate::core::status::to_usize;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelSummary {
    pub component: String,
    pub version: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub current_time: f64,
    pub time_step: f64,
    pub subcomponents: i32,
    pub input_vars: Vec<String>,
    pub output_vars: Vec<String>,
}

impl ModelSummary {
    pub fn collect(session: &Session) -> Result<Self, Error> {
        Ok(Self {
            component: session.get_component_name()?,
            version: optional(session.get_version())?,
            start_time: session.get_start_time()?,
            end_time: session.get_end_time()?,
            current_time: session.get_current_time()?,
            time_step: session.get_time_step()?,
            subcomponents: session.get_subcomponent_count()?,
            input_vars: names(session.get_input_var_names()?),
            output_vars: names(session.get_output_var_names()?),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridSummary {
    pub id: i32,
    #[serde(rename = "type")]
    pub grid_type: String,
    pub rank: i32,
    pub size: i32,
    pub shape: Vec<i32>,
    pub node_count: Option<i32>,
    pub face_count: Option<i32>,
    /// Column edge coordinates, rectilinear grids only.
    pub x: Option<Vec<f64>>,
    /// Row edge coordinates, rectilinear grids only.
    pub y: Option<Vec<f64>>,
}

impl GridSummary {
    pub fn collect(session: &Session, grid: i32) -> Result<Self, Error> {
        let rank = session.get_grid_rank(grid)?;
        let mut shape = vec![0; to_usize(rank)?];
        session.get_grid_shape(grid, &mut shape)?;
        let grid_type = session.grid_type(grid)?;
        let (x, y) = if grid_type == GridType::Rectilinear {
            rectilinear_edges(session, grid, &shape)?
        } else {
            (None, None)
        };
        Ok(Self {
            id: grid,
            grid_type: grid_type.to_string(),
            rank,
            size: session.get_grid_size(grid)?,
            shape,
            node_count: optional(session.get_grid_node_count(grid))?,
            face_count: optional(session.get_grid_face_count(grid))?,
            x,
            y,
        })
    }
}

// Shape is row-major, so columns are last and rows second to last; the kernel
// writes one more edge than cells along each axis.
fn rectilinear_edges(
    session: &Session,
    grid: i32,
    shape: &[i32],
) -> Result<(Option<Vec<f64>>, Option<Vec<f64>>), Error> {
    let edges = |dim: Option<&i32>| -> Result<Option<Vec<f64>>, Error> {
        dim.map(|n| Ok(vec![0.0; to_usize(*n)? + 1])).transpose()
    };
    let mut x = edges(shape.last())?;
    let mut y = edges(shape.len().checked_sub(2).and_then(|i| shape.get(i)))?;
    if let Some(x) = x.as_mut() {
        // SAFETY: sized to ncol + 1 edges.
        unsafe { session.get_grid_x(grid, x) }?;
    }
    if let Some(y) = y.as_mut() {
        // SAFETY: sized to nrow + 1 edges.
        unsafe { session.get_grid_y(grid, y) }?;
    }
    Ok((x, y))
}

// Kernel and lookup failures mean "not provided"; anything else is a real error.
fn optional<T>(result: Result<T, Error>) -> Result<Option<T>, Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if matches!(err.kind(), ErrorKind::Kernel | ErrorKind::Lookup) => Ok(None),
        Err(err) => Err(err),
    }
}

fn names(addresses: Vec<VarAddress>) -> Vec<String> {
    addresses.into_iter().map(String::from).collect()
}
