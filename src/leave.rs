//! Turns requested days off into a staff x slot unavailability matrix.

use std::collections::HashMap;

use log::trace;

use crate::data::{LeavePreferences, Slot, Staff};
use crate::error::ReferenceError;

/// `unavailable[s][d]` is set when staff `s` asked for slot `d` off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unavailability {
    rows: Vec<Vec<bool>>,
}

impl Unavailability {
    /// All-zero matrix.
    pub fn none(staff_count: usize, slot_count: usize) -> Self {
        Self {
            rows: vec![vec![false; slot_count]; staff_count],
        }
    }

    pub fn from_rows(rows: Vec<Vec<bool>>) -> Self {
        Self { rows }
    }

    pub fn get(&self, staff: usize, slot: usize) -> bool {
        self.rows
            .get(staff)
            .and_then(|row| row.get(slot))
            .copied()
            .unwrap_or(false)
    }

    pub fn row(&self, staff: usize) -> &[bool] {
        self.rows.get(staff).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn staff_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of requested days off for one staff member.
    pub fn count(&self, staff: usize) -> usize {
        self.row(staff).iter().filter(|&&off| off).count()
    }
}

/// Encodes leave selections against the staff and slot lists.
///
/// A selection naming a slot or staff id that is not in the lists fails; it is
/// never treated as "no preference".
pub fn encode(
    staff: &[Staff],
    slots: &[Slot],
    leave: &LeavePreferences,
) -> Result<Unavailability, ReferenceError> {
    let staff_index: HashMap<&str, usize> = staff
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();
    let slot_index: HashMap<&str, usize> = slots
        .iter()
        .enumerate()
        .map(|(j, d)| (d.id.as_str(), j))
        .collect();

    let mut matrix = Unavailability::none(staff.len(), slots.len());
    for (staff_id, days_off) in leave.iter() {
        let Some(&s) = staff_index.get(staff_id.as_str()) else {
            return Err(ReferenceError::UnknownStaff(staff_id.clone()));
        };
        for slot_id in days_off {
            let Some(&d) = slot_index.get(slot_id.as_str()) else {
                return Err(ReferenceError::UnknownSlot {
                    staff: staff_id.clone(),
                    slot: slot_id.clone(),
                });
            };
            matrix.rows[s][d] = true;
        }
        trace!("staff '{}' requested {} day(s) off", staff_id, matrix.count(s));
    }
    Ok(matrix)
}
