use thiserror::Error;

use crate::data::{SlotId, StaffId};

/// Malformed or inconsistent input, rejected before a model is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("staff list is empty")]
    EmptyStaff,
    #[error("slot list is empty")]
    EmptySlots,
    #[error("duplicate staff id '{0}'")]
    DuplicateStaff(StaffId),
    #[error("duplicate slot id '{0}'")]
    DuplicateSlot(SlotId),
    #[error("staff '{staff}' has min desired shifts {min} above max {max}")]
    DesiredRangeInverted { staff: StaffId, min: i64, max: i64 },
    #[error("staff '{staff}' has negative {field} ({value})")]
    NegativeStaffCount {
        staff: StaffId,
        field: &'static str,
        value: i64,
    },
    #[error("slot '{slot}' has negative {field} ({value})")]
    NegativeSlotCount {
        slot: SlotId,
        field: &'static str,
        value: i64,
    },
    #[error("penalty '{name}' must be a finite non-negative number, got {value}")]
    InvalidPenalty { name: String, value: f64 },
    #[error("penalty override names unknown staff '{0}'")]
    UnknownOverrideStaff(StaffId),
    #[error("time limit must be a positive number of seconds within range, got {0}")]
    InvalidTimeLimit(f64),
    #[error("unavailability matrix is {rows}x{cols}, expected {staff}x{slots}")]
    MatrixShape {
        rows: usize,
        cols: usize,
        staff: usize,
        slots: usize,
    },
}

/// A leave selection that points at something which does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("leave selection for staff '{staff}' names unknown slot '{slot}'")]
    UnknownSlot { staff: StaffId, slot: SlotId },
    #[error("leave selection names unknown staff '{0}'")]
    UnknownStaff(StaffId),
}

/// Which deviation quantity failed the post-solve comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviationKind {
    Under,
    Over,
    LeaveViolation,
}

impl std::fmt::Display for DeviationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Under => write!(f, "under"),
            Self::Over => write!(f, "over"),
            Self::LeaveViolation => write!(f, "leaveViolation"),
        }
    }
}

/// The solver returned values that cannot be turned into a trustworthy assignment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityError {
    #[error("assignment value for staff '{staff}' on slot '{slot}' is {value}, outside [0, 1]")]
    OutOfRange {
        staff: StaffId,
        slot: SlotId,
        value: f64,
    },
    #[error("solver returned {actual} values for a model with {expected} variables")]
    MissingValues { expected: usize, actual: usize },
    #[error("{kind} for staff '{staff}' reported as {reported}, recomputed as {recomputed}")]
    DeviationMismatch {
        staff: StaffId,
        kind: DeviationKind,
        reported: f64,
        recomputed: f64,
    },
    #[error("slot '{slot}' has {assigned} staff after rounding, needs {required}")]
    CoverageViolated {
        slot: SlotId,
        assigned: i64,
        required: i64,
    },
    #[error("slot '{slot}' has {assigned} leaders after rounding, needs {required}")]
    LeaderCoverageViolated {
        slot: SlotId,
        assigned: i64,
        required: i64,
    },
    #[error("staff '{staff}' assigned to slot '{slot}' despite hard leave")]
    HardLeaveViolated { staff: StaffId, slot: SlotId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("environment variable {key} has invalid value '{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Every way an optimization request can fail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShiftError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),
    #[error("solver integrity error: {0}")]
    Integrity(#[from] IntegrityError),
}
