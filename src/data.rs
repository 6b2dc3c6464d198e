use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::Duration;

use itertools::Itertools;

use crate::error::ValidationError;

// Type aliases for clarity
pub type StaffId = String;
pub type SlotId = String;

/// A staff member and their desired working-day range.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub id: StaffId,
    pub is_leader: bool,
    pub min_desired_shifts: i64,
    pub max_desired_shifts: i64,
    /// Weight for assigning this person on a requested day off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leave_penalty: Option<f64>,
}

impl Staff {
    pub fn new(id: impl Into<StaffId>, is_leader: bool, min: i64, max: i64) -> Self {
        Self {
            id: id.into(),
            is_leader,
            min_desired_shifts: min,
            max_desired_shifts: max,
            leave_penalty: None,
        }
    }

    pub fn with_leave_penalty(mut self, weight: f64) -> Self {
        self.leave_penalty = Some(weight);
        self
    }
}

/// A schedulable time unit with its staffing requirements.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: SlotId,
    pub required_staff_count: i64,
    pub required_leader_count: i64,
}

impl Slot {
    pub fn new(id: impl Into<SlotId>, staff: i64, leaders: i64) -> Self {
        Self {
            id: id.into(),
            required_staff_count: staff,
            required_leader_count: leaders,
        }
    }
}

/// Requested days off, keyed by staff id. Absent or empty means no preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct LeavePreferences {
    days_off: BTreeMap<StaffId, Vec<SlotId>>,
}

impl LeavePreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_day_off(mut self, staff: impl Into<StaffId>, slot: impl Into<SlotId>) -> Self {
        self.request(staff, slot);
        self
    }

    pub fn request(&mut self, staff: impl Into<StaffId>, slot: impl Into<SlotId>) {
        self.days_off
            .entry(staff.into())
            .or_default()
            .push(slot.into());
    }

    pub fn days_off(&self, staff: &str) -> &[SlotId] {
        self.days_off.get(staff).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StaffId, &Vec<SlotId>)> {
        self.days_off.iter()
    }
}

/// How requested days off enter the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LeaveMode {
    /// Requested days off are forbidden outright.
    Hard,
    /// Requested days off may be worked at a penalty.
    #[default]
    Soft,
}

/// Objective weights.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PenaltyConfig {
    pub under: f64,
    pub over: f64,
    pub leave_violation: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub leave_overrides: BTreeMap<StaffId, f64>,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            under: 50.0,
            over: 50.0,
            leave_violation: 50.0,
            leave_overrides: BTreeMap::new(),
        }
    }
}

impl PenaltyConfig {
    pub fn new(under: f64, over: f64, leave_violation: f64) -> Self {
        Self {
            under,
            over,
            leave_violation,
            leave_overrides: BTreeMap::new(),
        }
    }

    pub fn with_leave_override(mut self, staff: impl Into<StaffId>, weight: f64) -> Self {
        self.leave_overrides.insert(staff.into(), weight);
        self
    }

    /// Leave weight for one staff member: explicit override, then the staff's
    /// own weight, then the scalar.
    pub fn leave_weight_for(&self, staff: &Staff) -> f64 {
        self.leave_overrides
            .get(&staff.id)
            .copied()
            .or(staff.leave_penalty)
            .unwrap_or(self.leave_violation)
    }
}

/// The complete input for one optimization run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftRequest {
    pub staff: Vec<Staff>,
    pub slots: Vec<Slot>,
    #[serde(default)]
    pub leave: LeavePreferences,
    #[serde(default)]
    pub penalties: PenaltyConfig,
    #[serde(default)]
    pub leave_mode: LeaveMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<f64>,
}

impl ShiftRequest {
    pub fn new(staff: Vec<Staff>, slots: Vec<Slot>) -> Self {
        Self {
            staff,
            slots,
            leave: LeavePreferences::default(),
            penalties: PenaltyConfig::default(),
            leave_mode: LeaveMode::default(),
            time_limit_secs: None,
        }
    }

    pub fn with_leave(mut self, leave: LeavePreferences) -> Self {
        self.leave = leave;
        self
    }

    pub fn with_penalties(mut self, penalties: PenaltyConfig) -> Self {
        self.penalties = penalties;
        self
    }

    pub fn with_leave_mode(mut self, mode: LeaveMode) -> Self {
        self.leave_mode = mode;
        self
    }

    pub fn with_time_limit_secs(mut self, secs: f64) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }

    /// Checks everything that can be checked without a solver.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_inputs(&self.staff, &self.slots, &self.penalties)?;
        self.time_limit()?;
        Ok(())
    }

    pub fn time_limit(&self) -> Result<Option<Duration>, ValidationError> {
        match self.time_limit_secs {
            None => Ok(None),
            Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|_| ValidationError::InvalidTimeLimit(secs)),
            Some(secs) => Err(ValidationError::InvalidTimeLimit(secs)),
        }
    }
}

pub(crate) fn validate_inputs(
    staff: &[Staff],
    slots: &[Slot],
    penalties: &PenaltyConfig,
) -> Result<(), ValidationError> {
    if staff.is_empty() {
        return Err(ValidationError::EmptyStaff);
    }
    if slots.is_empty() {
        return Err(ValidationError::EmptySlots);
    }
    if let Some(id) = staff.iter().map(|s| &s.id).duplicates().next() {
        return Err(ValidationError::DuplicateStaff(id.clone()));
    }
    if let Some(id) = slots.iter().map(|d| &d.id).duplicates().next() {
        return Err(ValidationError::DuplicateSlot(id.clone()));
    }

    for s in staff {
        for (field, value) in [
            ("min desired shifts", s.min_desired_shifts),
            ("max desired shifts", s.max_desired_shifts),
        ] {
            if value < 0 {
                return Err(ValidationError::NegativeStaffCount {
                    staff: s.id.clone(),
                    field,
                    value,
                });
            }
        }
        if s.min_desired_shifts > s.max_desired_shifts {
            return Err(ValidationError::DesiredRangeInverted {
                staff: s.id.clone(),
                min: s.min_desired_shifts,
                max: s.max_desired_shifts,
            });
        }
        if let Some(weight) = s.leave_penalty {
            check_weight(format!("leave penalty of '{}'", s.id), weight)?;
        }
    }

    for d in slots {
        for (field, value) in [
            ("required staff count", d.required_staff_count),
            ("required leader count", d.required_leader_count),
        ] {
            if value < 0 {
                return Err(ValidationError::NegativeSlotCount {
                    slot: d.id.clone(),
                    field,
                    value,
                });
            }
        }
    }

    check_weight("under".to_string(), penalties.under)?;
    check_weight("over".to_string(), penalties.over)?;
    check_weight("leaveViolation".to_string(), penalties.leave_violation)?;
    let known: HashSet<&str> = staff.iter().map(|s| s.id.as_str()).collect();
    for (id, weight) in &penalties.leave_overrides {
        if !known.contains(id.as_str()) {
            return Err(ValidationError::UnknownOverrideStaff(id.clone()));
        }
        check_weight(format!("leave override of '{id}'"), *weight)?;
    }
    Ok(())
}

fn check_weight(name: String, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidPenalty { name, value })
    }
}

/// Terminal state of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    NotSolved,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimal => write!(f, "Optimal"),
            Self::Infeasible => write!(f, "Infeasible"),
            Self::Unbounded => write!(f, "Unbounded"),
            Self::NotSolved => write!(f, "NotSolved"),
        }
    }
}

/// Staff x slot assignment grid, both axes in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub staff_ids: Vec<StaffId>,
    pub slot_ids: Vec<SlotId>,
    pub grid: Vec<Vec<bool>>,
}

impl Assignment {
    pub fn is_assigned(&self, staff: &str, slot: &str) -> Option<bool> {
        let s = self.staff_ids.iter().position(|id| id == staff)?;
        let d = self.slot_ids.iter().position(|id| id == slot)?;
        Some(self.grid[s][d])
    }

    pub fn row(&self, staff: &str) -> Option<&[bool]> {
        let s = self.staff_ids.iter().position(|id| id == staff)?;
        Some(&self.grid[s])
    }

    /// Number of slots each staff member works.
    pub fn staff_totals(&self) -> Vec<i64> {
        self.grid
            .iter()
            .map(|row| row.iter().filter(|&&x| x).count() as i64)
            .collect()
    }

    /// Number of staff working each slot.
    pub fn slot_totals(&self) -> Vec<i64> {
        (0..self.slot_ids.len())
            .map(|d| self.grid.iter().filter(|row| row[d]).count() as i64)
            .collect()
    }

    /// Number of leaders working each slot; `is_leader` is parallel to the staff axis.
    pub fn leader_totals(&self, is_leader: &[bool]) -> Vec<i64> {
        (0..self.slot_ids.len())
            .map(|d| {
                self.grid
                    .iter()
                    .zip(is_leader)
                    .filter(|(row, leader)| **leader && row[d])
                    .count() as i64
            })
            .collect()
    }
}

/// How far one staff member ended up from their preferences.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffDeviation {
    pub staff_id: StaffId,
    pub assigned: i64,
    pub under: i64,
    pub over: i64,
    pub leave_violations: i64,
}

/// Totals derived from a decoded assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSummary {
    pub staff_totals: Vec<i64>,
    pub slot_totals: Vec<i64>,
    pub leader_totals: Vec<i64>,
    pub deviations: Vec<StaffDeviation>,
}

/// The final output of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResult {
    pub status: SolveStatus,
    pub objective: Option<f64>,
    pub assignment: Option<Assignment>,
    pub summary: Option<ScheduleSummary>,
}

impl SolveResult {
    pub(crate) fn without_assignment(status: SolveStatus) -> Self {
        Self {
            status,
            objective: None,
            assignment: None,
            summary: None,
        }
    }

    /// True when an assignment exists but optimality was not proven.
    pub fn is_incumbent(&self) -> bool {
        self.status == SolveStatus::NotSolved && self.assignment.is_some()
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}
