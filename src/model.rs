use good_lp::{Expression, Variable, variable};
use log::{debug, info};

use crate::data::{LeaveMode, PenaltyConfig, Slot, Staff, validate_inputs};
use crate::error::ValidationError;
use crate::leave::Unavailability;
use crate::program::LinearProgram;

/// A built shift-assignment program together with the inputs it was built from.
///
/// Owns copies of the staff and slot lists so the decoder can check the
/// solution against them after the solver returns.
#[derive(Debug, Clone)]
pub struct ShiftModel {
    pub(crate) program: LinearProgram,
    pub(crate) staff: Vec<Staff>,
    pub(crate) slots: Vec<Slot>,
    pub(crate) unavailable: Unavailability,
    pub(crate) leave_mode: LeaveMode,
    pub(crate) penalties: PenaltyConfig,
    pub(crate) leave_weights: Vec<f64>,
    // x[s][d] = 1 if staff s works slot d
    pub(crate) x: Vec<Vec<Variable>>,
    pub(crate) under: Vec<Variable>,
    pub(crate) over: Vec<Variable>,
    // soft mode only
    pub(crate) leave_violation: Option<Vec<Variable>>,
}

impl ShiftModel {
    pub fn program(&self) -> &LinearProgram {
        &self.program
    }

    pub fn staff(&self) -> &[Staff] {
        &self.staff
    }

    pub fn assignment_var(&self, staff: usize, slot: usize) -> Variable {
        self.x[staff][slot]
    }

    pub fn under_var(&self, staff: usize) -> Variable {
        self.under[staff]
    }

    pub fn over_var(&self, staff: usize) -> Variable {
        self.over[staff]
    }

    pub fn leave_violation_var(&self, staff: usize) -> Option<Variable> {
        self.leave_violation.as_ref().map(|vars| vars[staff])
    }
}

/// Builds the assignment program.
///
/// Deviation from the desired range is linearised with one-sided slack
/// variables; minimisation keeps them at the true shortfall/overage as long as
/// their weights are positive.
pub fn build(
    staff: &[Staff],
    slots: &[Slot],
    unavailable: &Unavailability,
    penalties: &PenaltyConfig,
    leave_mode: LeaveMode,
) -> Result<ShiftModel, ValidationError> {
    validate_inputs(staff, slots, penalties)?;
    check_shape(unavailable, staff.len(), slots.len())?;

    info!(
        "Setting up shift model with {} staff, {} slots, {:?} leave...",
        staff.len(),
        slots.len(),
        leave_mode
    );
    let mut program = LinearProgram::new();

    // decision variables
    let x: Vec<Vec<Variable>> = staff
        .iter()
        .map(|s| {
            slots
                .iter()
                .map(|d| {
                    program.add_variable(variable().binary().name(format!("x[{},{}]", s.id, d.id)))
                })
                .collect()
        })
        .collect();
    let under: Vec<Variable> = staff
        .iter()
        .map(|s| program.add_variable(variable().min(0.0).name(format!("under[{}]", s.id))))
        .collect();
    let over: Vec<Variable> = staff
        .iter()
        .map(|s| program.add_variable(variable().min(0.0).name(format!("over[{}]", s.id))))
        .collect();
    let leave_violation: Option<Vec<Variable>> = match leave_mode {
        LeaveMode::Soft => Some(
            staff
                .iter()
                .map(|s| {
                    program.add_variable(
                        variable().min(0.0).name(format!("leaveViolation[{}]", s.id)),
                    )
                })
                .collect(),
        ),
        LeaveMode::Hard => None,
    };

    // coverage
    for (d, slot) in slots.iter().enumerate() {
        let assigned: Expression = x.iter().map(|row| row[d]).sum();
        program.add_constraint(
            format!("coverage[{}]", slot.id),
            assigned.geq(slot.required_staff_count as f64),
        );
    }

    // leadership coverage
    let has_leaders = staff.iter().any(|s| s.is_leader);
    for (d, slot) in slots.iter().enumerate() {
        if !has_leaders && slot.required_leader_count == 0 {
            continue;
        }
        let leaders: Expression = staff
            .iter()
            .zip(&x)
            .filter(|(s, _)| s.is_leader)
            .map(|(_, row)| row[d])
            .sum();
        program.add_constraint(
            format!("leaders[{}]", slot.id),
            leaders.geq(slot.required_leader_count as f64),
        );
    }

    // shift-count deviation
    for (s, member) in staff.iter().enumerate() {
        // min - Σx <= under  <=>  Σx + under >= min
        let mut shortfall: Expression = x[s].iter().sum();
        shortfall += under[s];
        program.add_constraint(
            format!("under[{}]", member.id),
            shortfall.geq(member.min_desired_shifts as f64),
        );

        // Σx - max <= over  <=>  Σx - over <= max
        let mut overage: Expression = x[s].iter().sum();
        overage -= over[s];
        program.add_constraint(
            format!("over[{}]", member.id),
            overage.leq(member.max_desired_shifts as f64),
        );
    }

    // leave
    match &leave_violation {
        None => {
            for (s, member) in staff.iter().enumerate() {
                for (d, slot) in slots.iter().enumerate() {
                    if unavailable.get(s, d) {
                        program.add_constraint(
                            format!("leave[{},{}]", member.id, slot.id),
                            Expression::from(x[s][d]).eq(0.0),
                        );
                    }
                }
            }
        }
        Some(violation) => {
            for (s, member) in staff.iter().enumerate() {
                // leaveViolation[s] = Σ_d unavailable[s][d]·x[s][d]
                let mut worked_off: Expression = (0..slots.len())
                    .filter(|&d| unavailable.get(s, d))
                    .map(|d| x[s][d])
                    .sum();
                worked_off -= violation[s];
                program.add_constraint(
                    format!("leaveViolation[{}]", member.id),
                    worked_off.eq(0.0),
                );
            }
        }
    }

    // objective
    let leave_weights: Vec<f64> = staff.iter().map(|s| penalties.leave_weight_for(s)).collect();
    let mut objective = Expression::with_capacity(3 * staff.len());
    for s in 0..staff.len() {
        objective.add_mul(penalties.under, under[s]);
        objective.add_mul(penalties.over, over[s]);
        if let Some(violation) = &leave_violation {
            objective.add_mul(leave_weights[s], violation[s]);
        }
    }
    program.set_objective(objective);

    debug!(
        "Shift model has {} variables ({} binary) and {} constraints.",
        program.variables().len(),
        program.integer_count(),
        program.constraints().len()
    );

    Ok(ShiftModel {
        program,
        staff: staff.to_vec(),
        slots: slots.to_vec(),
        unavailable: unavailable.clone(),
        leave_mode,
        penalties: penalties.clone(),
        leave_weights,
        x,
        under,
        over,
        leave_violation,
    })
}

fn check_shape(
    unavailable: &Unavailability,
    staff: usize,
    slots: usize,
) -> Result<(), ValidationError> {
    let rows = unavailable.staff_count();
    let bad_row = (0..rows).find(|&s| unavailable.row(s).len() != slots);
    if rows != staff || bad_row.is_some() {
        return Err(ValidationError::MatrixShape {
            rows,
            cols: bad_row.map_or(slots, |s| unavailable.row(s).len()),
            staff,
            slots,
        });
    }
    Ok(())
}
