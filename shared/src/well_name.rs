//! Well naming: letter rows (`A`..`Z`, then `a`..`h`) and 1-based numeric columns.
//!
//! Row 0 is `A`, row 25 is `Z`, row 26 is `a`, row 33 is `h`. Columns are
//! written zero-padded to two digits (`A01`, `P24`, `h48`).

const UPPER_ROWS: u8 = 26;
const LOWER_ROWS: u8 = 8;

/// Number of rows the naming scheme can address.
pub const MAX_ROWS: usize = (UPPER_ROWS + LOWER_ROWS) as usize;

pub fn row_letter(row: usize) -> Option<char> {
    let row = u8::try_from(row).ok()?;
    if row < UPPER_ROWS {
        Some(char::from(b'A' + row))
    } else if row < UPPER_ROWS + LOWER_ROWS {
        Some(char::from(b'a' + row - UPPER_ROWS))
    } else {
        None
    }
}

/// Zero-based row index of a well name such as `"B07"` or `"c12"`.
pub fn row_index(well: &str) -> Option<usize> {
    let first = well.chars().next()?;
    match first {
        'A'..='Z' => Some(first as usize - 'A' as usize),
        'a'..='h' => Some(UPPER_ROWS as usize + first as usize - 'a' as usize),
        _ => None,
    }
}

/// One-based column number parsed from the trailing digits of a well name.
pub fn col_number(well: &str) -> Option<usize> {
    let digits = well.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|col| *col > 0)
}

/// Canonical name for a zero-based row and one-based column.
pub fn well_name(row: usize, col: usize) -> Option<String> {
    if col == 0 {
        return None;
    }
    row_letter(row).map(|letter| format!("{letter}{col:02}"))
}

/// `(row, col)` pair, row zero-based and column one-based.
pub fn parse_well(well: &str) -> Option<(usize, usize)> {
    Some((row_index(well)?, col_number(well)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_over_full_naming_range() {
        for row in 0..MAX_ROWS {
            for col in 1..=48 {
                let name = well_name(row, col).unwrap();
                assert_eq!(row_index(&name), Some(row), "row of {name}");
                assert_eq!(col_number(&name), Some(col), "col of {name}");
            }
        }
    }

    #[test]
    fn names_are_zero_padded() {
        assert_eq!(well_name(0, 1).as_deref(), Some("A01"));
        assert_eq!(well_name(7, 12).as_deref(), Some("H12"));
        assert_eq!(well_name(26, 3).as_deref(), Some("a03"));
        assert_eq!(well_name(33, 48).as_deref(), Some("h48"));
    }

    #[test]
    fn out_of_range_rows_are_rejected() {
        assert_eq!(well_name(34, 1), None);
        assert_eq!(well_name(0, 0), None);
        assert_eq!(row_index("i01"), None);
        assert_eq!(row_index(""), None);
    }

    #[test]
    fn malformed_columns_are_rejected() {
        assert_eq!(col_number("A"), None);
        assert_eq!(col_number("A1x"), None);
        assert_eq!(col_number("A00"), None);
        assert_eq!(col_number("A7"), Some(7));
    }
}
