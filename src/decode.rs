//! Turns raw solver values into a checked assignment grid.

use good_lp::Variable;
use log::{debug, info, warn};
use std::collections::HashMap;

use crate::data::{
    Assignment, LeaveMode, ScheduleSummary, SolveResult, SolveStatus, StaffDeviation,
};
use crate::error::{DeviationKind, IntegrityError};
use crate::model::ShiftModel;
use crate::solver::SolvedModel;

/// Values above this round to 1.
pub const ROUNDING_THRESHOLD: f64 = 0.5;
/// How far outside [0, 1] an assignment value may drift before it counts as corrupt.
pub const INTEGRALITY_EPSILON: f64 = 1e-5;
/// Allowed gap between solver-reported and recomputed deviation values.
pub const DEVIATION_TOLERANCE: f64 = 1e-4;

/// Decodes a solved model.
///
/// Optimal solutions that fail any check are an error. A `NotSolved`
/// incumbent that fails a check is dropped and reported without an assignment.
pub fn decode(solved: SolvedModel) -> Result<SolveResult, IntegrityError> {
    let SolvedModel {
        model,
        solution,
        elapsed,
    } = solved;
    let status = solution.status;

    let values = match (status, solution.values) {
        (SolveStatus::Infeasible | SolveStatus::Unbounded, _) => {
            info!("No assignment: model is {}", status);
            return Ok(SolveResult::without_assignment(status));
        }
        (SolveStatus::NotSolved, None) => {
            info!("No assignment: solver stopped without an incumbent");
            return Ok(SolveResult::without_assignment(status));
        }
        (SolveStatus::Optimal, None) => {
            return Err(IntegrityError::MissingValues {
                expected: model.program().variables().len(),
                actual: 0,
            });
        }
        (_, Some(values)) => values,
    };

    let checked = check_solution(&model, &values, status == SolveStatus::Optimal);
    let (assignment, deviations) = match (status, checked) {
        (_, Ok(ok)) => ok,
        (SolveStatus::NotSolved, Err(e)) => {
            warn!("Discarding incumbent that fails integrity checks: {}", e);
            return Ok(SolveResult::without_assignment(status));
        }
        (_, Err(e)) => return Err(e),
    };

    let objective = objective_of(&model, &deviations);
    let is_leader: Vec<bool> = model.staff.iter().map(|s| s.is_leader).collect();
    let summary = ScheduleSummary {
        staff_totals: assignment.staff_totals(),
        slot_totals: assignment.slot_totals(),
        leader_totals: assignment.leader_totals(&is_leader),
        deviations,
    };
    if status == SolveStatus::NotSolved {
        info!("Using non-optimal incumbent with objective {} after {:.2?}", objective, elapsed);
    } else {
        info!("Decoded optimal assignment with objective {}", objective);
    }

    Ok(SolveResult {
        status,
        objective: Some(objective),
        assignment: Some(assignment),
        summary: Some(summary),
    })
}

fn check_solution(
    model: &ShiftModel,
    values: &HashMap<Variable, f64>,
    optimal: bool,
) -> Result<(Assignment, Vec<StaffDeviation>), IntegrityError> {
    let handles = model.program().handles();
    let present = handles.iter().filter(|&v| values.contains_key(v)).count();
    if present < handles.len() {
        return Err(IntegrityError::MissingValues {
            expected: handles.len(),
            actual: present,
        });
    }

    let assignment = round_grid(model, values)?;
    check_hard_constraints(model, &assignment)?;
    let deviations = recompute_deviations(model, &assignment);
    compare_deviations(model, values, &deviations, optimal)?;
    Ok((assignment, deviations))
}

fn round_grid(
    model: &ShiftModel,
    values: &HashMap<Variable, f64>,
) -> Result<Assignment, IntegrityError> {
    let mut grid = Vec::with_capacity(model.staff.len());
    for (s, member) in model.staff.iter().enumerate() {
        let mut row = Vec::with_capacity(model.slots.len());
        for (d, slot) in model.slots.iter().enumerate() {
            let value = values[&model.assignment_var(s, d)];
            if !(value >= -INTEGRALITY_EPSILON && value <= 1.0 + INTEGRALITY_EPSILON) {
                return Err(IntegrityError::OutOfRange {
                    staff: member.id.clone(),
                    slot: slot.id.clone(),
                    value,
                });
            }
            row.push(value > ROUNDING_THRESHOLD);
        }
        grid.push(row);
    }

    Ok(Assignment {
        staff_ids: model.staff.iter().map(|s| s.id.clone()).collect(),
        slot_ids: model.slots.iter().map(|d| d.id.clone()).collect(),
        grid,
    })
}

fn check_hard_constraints(
    model: &ShiftModel,
    assignment: &Assignment,
) -> Result<(), IntegrityError> {
    let is_leader: Vec<bool> = model.staff.iter().map(|s| s.is_leader).collect();
    let assigned = assignment.slot_totals();
    let leaders = assignment.leader_totals(&is_leader);

    for (d, slot) in model.slots.iter().enumerate() {
        if assigned[d] < slot.required_staff_count {
            return Err(IntegrityError::CoverageViolated {
                slot: slot.id.clone(),
                assigned: assigned[d],
                required: slot.required_staff_count,
            });
        }
        if leaders[d] < slot.required_leader_count {
            return Err(IntegrityError::LeaderCoverageViolated {
                slot: slot.id.clone(),
                assigned: leaders[d],
                required: slot.required_leader_count,
            });
        }
    }

    if model.leave_mode == LeaveMode::Hard {
        for (s, member) in model.staff.iter().enumerate() {
            for (d, slot) in model.slots.iter().enumerate() {
                if model.unavailable.get(s, d) && assignment.grid[s][d] {
                    return Err(IntegrityError::HardLeaveViolated {
                        staff: member.id.clone(),
                        slot: slot.id.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn recompute_deviations(model: &ShiftModel, assignment: &Assignment) -> Vec<StaffDeviation> {
    model
        .staff
        .iter()
        .zip(assignment.staff_totals())
        .enumerate()
        .map(|(s, (member, assigned))| StaffDeviation {
            staff_id: member.id.clone(),
            assigned,
            under: (member.min_desired_shifts - assigned).max(0),
            over: (assigned - member.max_desired_shifts).max(0),
            leave_violations: assignment.grid[s]
                .iter()
                .enumerate()
                .filter(|&(d, &on)| on && model.unavailable.get(s, d))
                .count() as i64,
        })
        .collect()
}

fn compare_deviations(
    model: &ShiftModel,
    values: &HashMap<Variable, f64>,
    deviations: &[StaffDeviation],
    optimal: bool,
) -> Result<(), IntegrityError> {
    for (s, deviation) in deviations.iter().enumerate() {
        let checks = [
            (
                DeviationKind::Under,
                values[&model.under_var(s)],
                deviation.under,
                optimal && model.penalties.under > 0.0,
            ),
            (
                DeviationKind::Over,
                values[&model.over_var(s)],
                deviation.over,
                optimal && model.penalties.over > 0.0,
            ),
        ];
        for (kind, reported, recomputed, tight) in checks {
            check_deviation(&deviation.staff_id, kind, reported, recomputed, tight)?;
        }

        // an equality in the model, so always tight
        if let Some(var) = model.leave_violation_var(s) {
            check_deviation(
                &deviation.staff_id,
                DeviationKind::LeaveViolation,
                values[&var],
                deviation.leave_violations,
                true,
            )?;
        }
    }
    debug!("Deviation values match the rounded grid for {} staff", deviations.len());
    Ok(())
}

// Slack variables with zero weight (or in a non-optimal incumbent) only have to
// bound the true value from above.
fn check_deviation(
    staff: &str,
    kind: DeviationKind,
    reported: f64,
    recomputed: i64,
    tight: bool,
) -> Result<(), IntegrityError> {
    let recomputed_f = recomputed as f64;
    let ok = if tight {
        (reported - recomputed_f).abs() <= DEVIATION_TOLERANCE
    } else {
        reported >= recomputed_f - DEVIATION_TOLERANCE
    };
    if ok {
        Ok(())
    } else {
        Err(IntegrityError::DeviationMismatch {
            staff: staff.to_string(),
            kind,
            reported,
            recomputed: recomputed_f,
        })
    }
}

fn objective_of(model: &ShiftModel, deviations: &[StaffDeviation]) -> f64 {
    deviations
        .iter()
        .zip(&model.leave_weights)
        .map(|(dev, &leave_weight)| {
            let leave = match model.leave_mode {
                LeaveMode::Soft => leave_weight * dev.leave_violations as f64,
                LeaveMode::Hard => 0.0,
            };
            model.penalties.under * dev.under as f64
                + model.penalties.over * dev.over as f64
                + leave
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PenaltyConfig, Slot, Staff};
    use crate::leave::Unavailability;
    use crate::model::build;
    use crate::program::LinearProgram;
    use crate::solver::{MilpSolver, RawSolution, solve};
    use rstest::rstest;
    use std::time::Duration;

    /// Hands back a fixed answer, whatever the program.
    struct Scripted(RawSolution);

    impl MilpSolver for Scripted {
        fn solve(&self, _program: &LinearProgram, _time_limit: Option<Duration>) -> RawSolution {
            self.0.clone()
        }
    }

    type Values = HashMap<Variable, f64>;

    fn model(mode: LeaveMode, penalties: PenaltyConfig) -> ShiftModel {
        let staff = vec![Staff::new("lead", true, 1, 1), Staff::new("crew", false, 1, 2)];
        let slots = vec![Slot::new("d1", 1, 1), Slot::new("d2", 1, 0)];
        // crew asked for d1 off
        let off = Unavailability::from_rows(vec![vec![false, false], vec![true, false]]);
        build(&staff, &slots, &off, &penalties, mode).unwrap()
    }

    fn zeros(model: &ShiftModel) -> Values {
        model.program().handles().into_iter().map(|v| (v, 0.0)).collect()
    }

    /// Values consistent with `grid`, with tight deviation slacks.
    fn values_for(model: &ShiftModel, grid: [[f64; 2]; 2]) -> Values {
        let mut values = zeros(model);
        for s in 0..2 {
            let mut total = 0.0;
            let mut off = 0.0;
            for d in 0..2 {
                values.insert(model.assignment_var(s, d), grid[s][d]);
                total += grid[s][d].round();
                if model.unavailable.get(s, d) {
                    off += grid[s][d].round();
                }
            }
            let staff = &model.staff()[s];
            let under = (staff.min_desired_shifts as f64 - total).max(0.0);
            let over = (total - staff.max_desired_shifts as f64).max(0.0);
            values.insert(model.under_var(s), under);
            values.insert(model.over_var(s), over);
            if let Some(var) = model.leave_violation_var(s) {
                values.insert(var, off);
            }
        }
        values
    }

    fn run(
        model: ShiftModel,
        status: SolveStatus,
        values: Option<Values>,
    ) -> Result<SolveResult, IntegrityError> {
        decode(solve(model, &Scripted(RawSolution { status, values }), None))
    }

    #[test]
    fn decodes_optimal_grid_with_summary() {
        let model = model(LeaveMode::Soft, PenaltyConfig::new(1.0, 1.0, 10.0));
        let values = values_for(&model, [[1.0, 0.0], [0.0, 0.999_999_9]]);
        let result = run(model, SolveStatus::Optimal, Some(values)).unwrap();

        assert!(result.is_optimal());
        assert_eq!(result.objective, Some(0.0));
        let assignment = result.assignment.unwrap();
        assert_eq!(assignment.staff_ids, ["lead", "crew"]);
        assert_eq!(assignment.slot_ids, ["d1", "d2"]);
        assert_eq!(assignment.grid, vec![vec![true, false], vec![false, true]]);

        let summary = result.summary.unwrap();
        assert_eq!(summary.staff_totals, vec![1, 1]);
        assert_eq!(summary.slot_totals, vec![1, 1]);
        assert_eq!(summary.leader_totals, vec![1, 0]);
        assert!(summary.deviations.iter().all(|d| d.under == 0 && d.over == 0));
    }

    #[test]
    fn soft_leave_violation_is_priced_into_objective() {
        let model = model(LeaveMode::Soft, PenaltyConfig::new(1.0, 1.0, 10.0));
        // crew works d1 (requested off) and d2; lead works d1
        let values = values_for(&model, [[1.0, 0.0], [1.0, 1.0]]);
        let result = run(model, SolveStatus::Optimal, Some(values)).unwrap();

        let summary = result.summary.unwrap();
        assert_eq!(summary.deviations[1].leave_violations, 1);
        assert_eq!(result.objective, Some(10.0));
    }

    // lead's d2 cell near the rounding boundary; overage is unweighted
    #[rstest]
    #[case::exactly_half(0.5, false)]
    #[case::just_above_half(0.500_001, true)]
    #[case::slightly_negative(-1e-6, false)]
    #[case::slightly_above_one(1.0 + 1e-6, true)]
    fn rounding_boundary(#[case] value: f64, #[case] assigned: bool) {
        let model = model(LeaveMode::Soft, PenaltyConfig::new(1.0, 0.0, 1.0));
        let mut values = values_for(&model, [[1.0, 0.0], [0.0, 1.0]]);
        values.insert(model.assignment_var(0, 1), value);
        if assigned {
            values.insert(model.over_var(0), 1.0);
        }

        let result = run(model, SolveStatus::Optimal, Some(values)).unwrap();
        assert_eq!(result.assignment.unwrap().grid[0][1], assigned);
    }

    #[rstest]
    #[case::above_one(1.3)]
    #[case::below_zero(-0.01)]
    #[case::nan(f64::NAN)]
    fn value_outside_unit_interval_is_corruption(#[case] value: f64) {
        let model = model(LeaveMode::Soft, PenaltyConfig::default());
        let mut values = values_for(&model, [[1.0, 0.0], [0.0, 1.0]]);
        values.insert(model.assignment_var(0, 0), value);

        assert!(matches!(
            run(model, SolveStatus::Optimal, Some(values)),
            Err(IntegrityError::OutOfRange { staff, slot, .. }) if staff == "lead" && slot == "d1"
        ));
    }

    #[test]
    fn rounding_that_breaks_coverage_is_fatal() {
        let model = model(LeaveMode::Soft, PenaltyConfig::default());
        let mut values = values_for(&model, [[1.0, 0.0], [0.0, 1.0]]);
        values.insert(model.assignment_var(1, 1), 0.4);

        assert_eq!(
            run(model, SolveStatus::Optimal, Some(values)),
            Err(IntegrityError::CoverageViolated {
                slot: "d2".into(),
                assigned: 0,
                required: 1,
            })
        );
    }

    #[test]
    fn reported_slack_must_match_recomputed() {
        let model = model(LeaveMode::Soft, PenaltyConfig::new(1.0, 1.0, 1.0));
        let mut values = values_for(&model, [[1.0, 0.0], [0.0, 1.0]]);
        values.insert(model.over_var(1), 1.0);

        assert!(matches!(
            run(model, SolveStatus::Optimal, Some(values)),
            Err(IntegrityError::DeviationMismatch { kind: DeviationKind::Over, .. })
        ));
    }

    #[test]
    fn zero_weight_slack_only_needs_to_bound_from_above() {
        let model = model(LeaveMode::Soft, PenaltyConfig::new(1.0, 0.0, 1.0));
        let mut values = values_for(&model, [[1.0, 0.0], [0.0, 1.0]]);
        values.insert(model.over_var(1), 3.0);

        let result = run(model, SolveStatus::Optimal, Some(values)).unwrap();
        assert_eq!(result.summary.unwrap().deviations[1].over, 0);
    }

    #[test]
    fn hard_leave_breach_is_fatal() {
        let model = model(LeaveMode::Hard, PenaltyConfig::default());
        let values = values_for(&model, [[1.0, 0.0], [1.0, 1.0]]);

        assert_eq!(
            run(model, SolveStatus::Optimal, Some(values)),
            Err(IntegrityError::HardLeaveViolated {
                staff: "crew".into(),
                slot: "d1".into(),
            })
        );
    }

    #[test]
    fn usable_incumbent_is_kept_and_flagged() {
        let model = model(LeaveMode::Soft, PenaltyConfig::new(1.0, 1.0, 1.0));
        let values = values_for(&model, [[1.0, 1.0], [0.0, 0.0]]);
        let result = run(model, SolveStatus::NotSolved, Some(values)).unwrap();

        assert!(result.is_incumbent());
        assert!(!result.is_optimal());
        // lead over by one, crew under by one
        assert_eq!(result.objective, Some(2.0));
    }

    #[test]
    fn broken_incumbent_is_dropped() {
        let model = model(LeaveMode::Soft, PenaltyConfig::default());
        let values = zeros(&model);
        let result = run(model, SolveStatus::NotSolved, Some(values)).unwrap();

        assert_eq!(result.status, SolveStatus::NotSolved);
        assert!(result.assignment.is_none());
        assert!(result.objective.is_none());
    }

    #[test]
    fn infeasible_has_no_assignment_even_with_values() {
        let model = model(LeaveMode::Soft, PenaltyConfig::default());
        let values = model.program().handles().into_iter().map(|v| (v, 0.5)).collect();
        let result = run(model, SolveStatus::Infeasible, Some(values)).unwrap();

        assert_eq!(result, SolveResult::without_assignment(SolveStatus::Infeasible));
    }

    #[test]
    fn missing_values_are_an_error() {
        let model = model(LeaveMode::Soft, PenaltyConfig::default());
        assert!(matches!(
            run(model.clone(), SolveStatus::Optimal, None),
            Err(IntegrityError::MissingValues { actual: 0, .. })
        ));

        let mut values = values_for(&model, [[1.0, 0.0], [0.0, 1.0]]);
        values.remove(&model.under_var(1));
        assert!(matches!(
            run(model, SolveStatus::Optimal, Some(values)),
            Err(IntegrityError::MissingValues { expected: 10, actual: 9 })
        ));
    }
}
