//! Property-based generators for the workspace's core value types.

use common::Row;
use proptest::prelude::*;
use types::{SqlType, Value};

/// A mix of `Int`, `Float`, `Text`, `Bool`, and `Null` values.
pub fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(Value::Float),
        "[a-z]{1,20}".prop_map(Value::Text),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ]
}

/// Rows of 1-10 columns of mixed-type values.
pub fn arb_row() -> impl Strategy<Value = Row> {
    prop::collection::vec(arb_value(), 1..10).prop_map(Row::new)
}

/// Rows with exactly `len` columns of mixed-type values.
pub fn arb_row_with_len(len: usize) -> impl Strategy<Value = Row> {
    prop::collection::vec(arb_value(), len).prop_map(Row::new)
}

/// One of the three declarable column types.
pub fn arb_sql_type() -> impl Strategy<Value = SqlType> {
    prop_oneof![Just(SqlType::Int), Just(SqlType::Text), Just(SqlType::Bool)]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn arb_row_is_never_empty(row in arb_row()) {
            assert!(!row.values.is_empty());
            assert!(row.values.len() <= 10);
        }

        #[test]
        fn arb_row_with_len_matches_requested_length(row in arb_row_with_len(5)) {
            assert_eq!(row.values.len(), 5);
        }

        #[test]
        fn arb_value_equality_is_reflexive(value in arb_value()) {
            assert_eq!(value, value);
        }

        #[test]
        fn arb_row_clone_round_trips(row in arb_row()) {
            let cloned = row.clone();
            assert_eq!(row.values, cloned.values);
        }
    }
}
