//! Spreadsheet-style cell reference helpers.
//!
//! Columns are numbered with the bijective base-26 system used by spreadsheets:
//! `A` = 1, `B` = 2, ..., `Z` = 26, `AA` = 27, `AB` = 28, ..., `ZZ` = 702, `AAA` = 703.
use crate::query::arguments::ArgumentsError;
use regex::Regex;
use std::sync::LazyLock;

static CELL_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{1,3}[0-9]{1,7}$").expect("Hardcode regex pattern"));

/// Converts a 1-based column index to its letter name.
///
/// # Arguments
///
/// * `index` - The 1-based column index
///
/// # Returns
///
/// * `Result<String, ArgumentsError>` - The letter name, or an invalid argument error
///   for any index less than 1
pub fn column_name(index: i64) -> Result<String, ArgumentsError> {
    if index < 1 {
        Err(ArgumentsError::InvalidArgument(format!(
            "Column index {index} should be a positive integer"
        )))?
    }
    let mut column = index as u64;
    let mut name = String::new();
    while column > 0 {
        column -= 1;
        name.insert(0, char::from(b'A' + (column % 26) as u8));
        column /= 26;
    }
    Ok(name)
}

/// Converts column letters (case-insensitive) to the 1-based column index.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|char| char.is_ascii_alphabetic()) {
        return None;
    }
    letters
        .to_ascii_uppercase()
        .bytes()
        .map(|byte| (byte - b'A') as usize + 1)
        .try_fold(0usize, |index, digit| index.checked_mul(26)?.checked_add(digit))
}

/// Returns true if the value is a single cell reference such as `A1` or `xfd1048576`.
fn is_cell_reference(value: &str) -> bool {
    CELL_REFERENCE.is_match(value)
}

/// Parses a cell reference into a 0-based `(row, column)` pair. Row `0` is rejected.
pub(crate) fn parse_cell_reference(value: &str) -> Option<(usize, usize)> {
    if !is_cell_reference(value) {
        return None;
    }
    let split = value.find(|char: char| char.is_ascii_digit())?;
    let column = column_index(&value[..split])?;
    let row = value[split..].parse::<usize>().ok().filter(|row| *row > 0)?;
    Some((row - 1, column - 1))
}

/// Formats a 0-based `(row, column)` pair as a cell reference, e.g. `(0, 0)` is `A1`.
pub fn cell_reference(row: usize, column: usize) -> String {
    let mut reference = column_name(column as i64 + 1).unwrap_or_default();
    reference.push_str(&(row + 1).to_string());
    reference
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_follow_bijective_base26() {
        let expected = [
            (1, "A"),
            (2, "B"),
            (3, "C"),
            (25, "Y"),
            (26, "Z"),
            (27, "AA"),
            (28, "AB"),
            (51, "AY"),
            (52, "AZ"),
            (53, "BA"),
            (54, "BB"),
            (701, "ZY"),
            (702, "ZZ"),
            (703, "AAA"),
            (704, "AAB"),
        ];
        for (index, name) in expected {
            assert_eq!(column_name(index).unwrap(), name);
        }
    }

    #[test]
    fn column_name_rejects_non_positive_index() {
        assert!(matches!(column_name(0), Err(ArgumentsError::InvalidArgument(_))));
        assert!(matches!(column_name(-1), Err(ArgumentsError::InvalidArgument(_))));
    }

    #[test]
    fn column_index_inverts_column_name() {
        for index in 1..=2000 {
            let name = column_name(index).unwrap();
            assert_eq!(column_index(&name), Some(index as usize));
        }
        assert_eq!(column_index("ab"), Some(28));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn column_names_preserve_order() {
        let names: Vec<String> = (1..=800).map(|index| column_name(index).unwrap()).collect();
        for pair in names.windows(2) {
            let (left, right) = (&pair[0], &pair[1]);
            assert!(left.len() < right.len() || (left.len() == right.len() && left < right));
        }
    }

    #[test]
    fn cell_references() {
        assert!(is_cell_reference("A1"));
        assert!(is_cell_reference("xfd1048576"));
        assert!(!is_cell_reference("ABCD1"));
        assert!(!is_cell_reference("A12345678"));
        assert!(!is_cell_reference("1A"));
        assert_eq!(parse_cell_reference("B3"), Some((2, 1)));
        assert_eq!(parse_cell_reference("A0"), None);
        assert_eq!(cell_reference(7, 3), "D8");
    }
}
