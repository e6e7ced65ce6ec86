//! Custom assertion helpers for common database testing patterns.

use common::{DbError, DbResult, ResultSet, Row};
use types::Value;

/// Asserts that `result` contains exactly `expected` rows, compared
/// column-major (so row `i`'s values are `columns[..].get(i)`).
pub fn assert_result_rows(result: &ResultSet, expected: &[Row]) {
    assert_eq!(
        result.row_count,
        expected.len(),
        "row count mismatch: expected {}, got {}",
        expected.len(),
        result.row_count
    );

    for (i, expected_row) in expected.iter().enumerate() {
        let actual: Vec<Value> = result
            .columns
            .iter()
            .map(|col| col.get(i).cloned().unwrap_or(Value::Null))
            .collect();
        assert_eq!(
            actual, expected_row.values,
            "row {} mismatch: expected {:?}, got {:?}",
            i, expected_row.values, actual
        );
    }
}

/// Asserts that a query's result set is empty (zero rows).
pub fn assert_empty(result: &ResultSet) {
    assert_eq!(result.row_count, 0, "expected no rows, got {}", result.row_count);
}

/// Asserts that `result` is an `Err` whose message contains `expected_msg`.
pub fn assert_error_contains<T>(result: DbResult<T>, expected_msg: &str) {
    match result {
        Ok(_) => panic!("expected error containing '{}', got Ok", expected_msg),
        Err(e) => {
            let message = e.to_string();
            assert!(
                message.contains(expected_msg),
                "expected error to contain '{}', got: {}",
                expected_msg,
                message
            );
        }
    }
}

/// Asserts that `result` fails with a specific `DbError` variant, compared
/// by discriminant (the variant's payload is ignored).
pub fn assert_error_variant<T>(result: DbResult<T>, expected: &DbError) {
    match result {
        Ok(_) => panic!("expected error {:?}, got Ok", expected),
        Err(actual) => {
            assert_eq!(
                std::mem::discriminant(&actual),
                std::mem::discriminant(expected),
                "expected error {:?}, got {:?}",
                expected,
                actual
            );
        }
    }
}

/// Asserts that two rows hold equal values.
pub fn assert_rows_equal(actual: &Row, expected: &Row) {
    assert_eq!(
        actual.values, expected.values,
        "rows not equal: expected {:?}, got {:?}",
        expected.values, actual.values
    );
}

/// Asserts that two row sets are equal, in order.
pub fn assert_row_sets_equal(actual: &[Row], expected: &[Row]) {
    assert_eq!(actual.len(), expected.len(), "row count mismatch");
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(a.values, e.values, "row {} mismatch", i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::int_row;
    use types::SqlType;

    #[test]
    fn assert_result_rows_matches_column_major_data() {
        let result = ResultSet::from_rows(
            vec![("id".to_string(), SqlType::Int)],
            vec![int_row(&[1]), int_row(&[2])],
        );
        assert_result_rows(&result, &[int_row(&[1]), int_row(&[2])]);
    }

    #[test]
    #[should_panic(expected = "row count mismatch")]
    fn assert_result_rows_fails_on_count_mismatch() {
        let result = ResultSet::from_rows(vec![("id".to_string(), SqlType::Int)], vec![int_row(&[1])]);
        assert_result_rows(&result, &[int_row(&[1]), int_row(&[2])]);
    }

    #[test]
    fn assert_empty_accepts_a_zero_row_result() {
        assert_empty(&ResultSet::empty());
    }

    #[test]
    fn assert_error_contains_matches_substring() {
        let result: DbResult<()> = Err(DbError::TableNotFound("users".into()));
        assert_error_contains(result, "users");
    }

    #[test]
    fn assert_error_variant_ignores_payload() {
        let result: DbResult<()> = Err(DbError::TableNotFound("users".into()));
        assert_error_variant(result, &DbError::TableNotFound("orders".into()));
    }

    #[test]
    fn assert_rows_equal_passes_for_identical_rows() {
        assert_rows_equal(&int_row(&[1, 2]), &int_row(&[1, 2]));
    }
}
