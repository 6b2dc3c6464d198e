//! Staff-to-slot assignment as a mixed-integer linear program.
//!
//! A request flows through four stages: leave selections are encoded into an
//! unavailability matrix ([`leave`]), the assignment program is built
//! ([`model`]), a MILP backend solves it ([`solver`]) and the raw values are
//! rounded and checked into an assignment grid ([`decode`]).

pub mod config;
pub mod data;
pub mod decode;
pub mod error;
pub mod export;
pub mod leave;
pub mod model;
pub mod program;
pub mod server;
pub mod solver;

use log::info;

pub use config::{ServiceConfig, SolverOptions};
pub use data::{
    Assignment, LeaveMode, LeavePreferences, PenaltyConfig, ScheduleSummary, ShiftRequest, Slot,
    SolveResult, SolveStatus, Staff, StaffDeviation,
};
pub use error::{IntegrityError, ReferenceError, ShiftError, ValidationError};
pub use solver::{HighsSolver, MilpSolver};

/// Runs one optimization request end to end.
pub fn optimize(
    request: &ShiftRequest,
    solver: &impl MilpSolver,
) -> Result<SolveResult, ShiftError> {
    request.validate()?;
    let unavailable = leave::encode(&request.staff, &request.slots, &request.leave)?;
    let model = model::build(
        &request.staff,
        &request.slots,
        &unavailable,
        &request.penalties,
        request.leave_mode,
    )?;
    let solved = solver::solve(model, solver, request.time_limit()?);
    let result = decode::decode(solved)?;
    info!("Optimization finished: {}", result.status);
    Ok(result)
}
