use good_lp::{
    ResolutionError, Solution, SolutionStatus, SolverModel, Variable, default_solver,
};
use log::{info, trace, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::SolverOptions;
use crate::data::SolveStatus;
use crate::model::ShiftModel;
use crate::program::LinearProgram;

/// What a backend hands back: a mapped status and, when it has one, a value per variable.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSolution {
    pub status: SolveStatus,
    pub values: Option<HashMap<Variable, f64>>,
}

impl RawSolution {
    pub fn without_values(status: SolveStatus) -> Self {
        Self {
            status,
            values: None,
        }
    }
}

/// Anything that can minimise a [`LinearProgram`].
///
/// Implementations make exactly one solver call per invocation and map every
/// native outcome onto [`SolveStatus`]. A run that stops early with an
/// incumbent reports `NotSolved` together with the incumbent's values.
pub trait MilpSolver {
    fn solve(&self, program: &LinearProgram, time_limit: Option<Duration>) -> RawSolution;
}

/// HiGHS through `good_lp`.
///
/// HiGHS answers `Optimal` even when it stopped on a positive relative MIP gap;
/// `good_lp` reports that as `GapLimit`, and it is mapped to `NotSolved` here
/// the same way as a time limit.
#[derive(Debug, Clone, Default)]
pub struct HighsSolver {
    options: SolverOptions,
}

impl HighsSolver {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }
}

impl MilpSolver for HighsSolver {
    fn solve(&self, program: &LinearProgram, time_limit: Option<Duration>) -> RawSolution {
        let handles = program.handles();
        let mut model = program
            .variables()
            .clone()
            .minimise(program.objective())
            .using(default_solver)
            .set_option("threads", self.options.threads)
            .set_option("random_seed", self.options.random_seed)
            .set_option(
                "log_to_console",
                if self.options.log_to_console { "true" } else { "false" },
            );
        if let Some(limit) = time_limit.or(self.options.time_limit) {
            trace!("HiGHS time limit set to {:.2?}", limit);
            model = model.set_option("time_limit", limit.as_secs_f64());
        }

        for constraint in program.constraints() {
            model.add_constraint(constraint.clone());
        }

        map_outcome(model.solve(), &handles)
    }
}

/// Maps a `good_lp` outcome onto exactly one [`SolveStatus`].
fn map_outcome<S: Solution>(
    outcome: Result<S, ResolutionError>,
    handles: &[Variable],
) -> RawSolution {
    match outcome {
        Ok(solution) => {
            let status = match solution.status() {
                SolutionStatus::Optimal => SolveStatus::Optimal,
                // time or gap limit: keep the incumbent, but flag it
                SolutionStatus::TimeLimit | SolutionStatus::GapLimit => SolveStatus::NotSolved,
            };
            let values = handles.iter().map(|&v| (v, solution.value(v))).collect();
            RawSolution {
                status,
                values: Some(values),
            }
        }
        Err(ResolutionError::Infeasible) => RawSolution::without_values(SolveStatus::Infeasible),
        Err(ResolutionError::Unbounded) => RawSolution::without_values(SolveStatus::Unbounded),
        // includes HiGHS stopping on a limit before it has any feasible point
        Err(e) => {
            warn!("Solver stopped without a solution: {}", e);
            RawSolution::without_values(SolveStatus::NotSolved)
        }
    }
}

/// A model plus the raw answer for it, ready for decoding.
#[derive(Debug, Clone)]
pub struct SolvedModel {
    pub model: ShiftModel,
    pub solution: RawSolution,
    pub elapsed: Duration,
}

/// Runs one solve of `model`. No retries; callers wanting more time re-invoke
/// with a longer limit.
pub fn solve(
    model: ShiftModel,
    solver: &impl MilpSolver,
    time_limit: Option<Duration>,
) -> SolvedModel {
    info!("Starting MILP solver...");
    let start_time = Instant::now();
    let solution = solver.solve(model.program(), time_limit);
    let elapsed = start_time.elapsed();
    info!("Solver finished with status {} in {:.2?}", solution.status, elapsed);

    SolvedModel {
        model,
        solution,
        elapsed,
    }
}
