use std::io;

use crate::data::Assignment;

/// Writes the grid as delimited text: a `staff_id` header followed by the slot
/// ids, then one `0/1` row per staff member, in input order.
pub fn write_delimited<W: io::Write>(
    assignment: &Assignment,
    delimiter: u8,
    writer: W,
) -> Result<(), csv::Error> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    let header = std::iter::once("staff_id").chain(assignment.slot_ids.iter().map(String::as_str));
    out.write_record(header)?;

    for (staff_id, row) in assignment.staff_ids.iter().zip(&assignment.grid) {
        let cells = row.iter().map(|&on| if on { "1" } else { "0" });
        out.write_record(std::iter::once(staff_id.as_str()).chain(cells))?;
    }
    out.flush()?;
    Ok(())
}

pub fn to_csv_string(assignment: &Assignment) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_delimited(assignment, b',', &mut buf)?;
    // every field is valid UTF-8 already
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment() -> Assignment {
        Assignment {
            staff_ids: vec!["alice".into(), "bob".into()],
            slot_ids: vec!["2024-04-01".into(), "2024-04-02".into()],
            grid: vec![vec![true, false], vec![true, true]],
        }
    }

    #[test]
    fn csv_keeps_input_order() {
        let text = to_csv_string(&assignment()).unwrap();
        assert_eq!(
            text,
            "staff_id,2024-04-01,2024-04-02\nalice,1,0\nbob,1,1\n"
        );
    }

    #[test]
    fn custom_delimiter() {
        let mut buf = Vec::new();
        write_delimited(&assignment(), b'\t', &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("staff_id\t2024-04-01\t2024-04-02\n"));
    }
}
