//! Integration tests exercising the testsupport helpers together, the
//! way a caller outside the workspace would use them.

use testsupport::prelude::*;
use types::Value;

#[test]
fn run_sql_script_creates_and_queries_a_table() {
    let output = run_sql_script(
        r#"
        CREATE TABLE users (id INT, name TEXT, age INT);
        INSERT INTO users VALUES (1, 'Alice', 30);
        INSERT INTO users VALUES (2, 'Bob', 25);
        SELECT * FROM users;
    "#,
    )
    .unwrap();

    assert!(output.contains("table users created"));
    assert!(output.contains("1 row inserted into users"));
    assert!(output.contains("Alice"));
    assert!(output.contains("Bob"));
}

#[test]
fn run_sql_script_applies_a_where_filter() {
    let output = run_sql_script(
        r#"
        CREATE TABLE users (id INT, name TEXT, age INT);
        INSERT INTO users VALUES (1, 'Alice', 30);
        INSERT INTO users VALUES (2, 'Bob', 25);
        INSERT INTO users VALUES (3, 'Charlie', 35);
        SELECT * FROM users WHERE age > 25;
    "#,
    )
    .unwrap();

    assert!(output.contains("Alice"));
    assert!(!output.contains("Bob"));
    assert!(output.contains("Charlie"));
}

#[test]
fn test_contexts_are_isolated_from_each_other() {
    let mut ctx1 = TestContext::new().unwrap();
    let ctx2 = TestContext::new().unwrap();

    ctx1.database_mut()
        .execute("CREATE TABLE users (id INT, name TEXT)")
        .unwrap();

    assert!(ctx1.database().catalog().lookup("users").is_some());
    assert!(ctx2.database().catalog().lookup("users").is_none());
}

#[test]
fn fixtures_and_assertions_compose() {
    let rows = vec![
        mixed_row(vec![Value::Int(1), Value::Text("Alice".into()), Value::Int(30)]),
        mixed_row(vec![Value::Int(2), Value::Text("Bob".into()), Value::Int(25)]),
    ];

    assert_rows_equal(&rows[0], &rows[0]);
    assert_row_sets_equal(&rows, &rows);

    let result = common::ResultSet::from_rows(
        vec![
            ("id".to_string(), types::SqlType::Int),
            ("name".to_string(), types::SqlType::Text),
            ("age".to_string(), types::SqlType::Int),
        ],
        rows.clone(),
    );
    assert_result_rows(&result, &rows);
}

#[test]
fn row_builders_produce_expected_values() {
    let int_r = int_row(&[1, 2, 3]);
    assert_eq!(int_r.values, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);

    let text_r = text_row(&["a", "b", "c"]);
    assert_eq!(text_r.values.len(), 3);
    assert_eq!(text_r.values[0], Value::Text("a".into()));

    let bool_r = bool_row(&[true, false]);
    assert_eq!(bool_r.values[0], Value::Bool(true));

    let null_r = null_row(3);
    assert_eq!(null_r.values, vec![Value::Null, Value::Null, Value::Null]);
}

#[test]
fn sample_data_matches_sample_schemas() {
    use testsupport::fixtures::{data, schemas};

    assert_eq!(data::sample_users().len(), 3);
    assert_eq!(schemas::users_columns().len(), 3);

    assert_eq!(data::sample_products().len(), 3);
    assert_eq!(schemas::products_columns().len(), 3);

    assert_eq!(data::sample_orders().len(), 3);
    assert_eq!(schemas::orders_columns().len(), 4);
}

#[test]
fn error_assertions_match_table_not_found() {
    let result: Result<(), common::DbError> = Err(common::DbError::TableNotFound("users".into()));
    assert_error_contains(result, "users");

    let result2: Result<(), common::DbError> = Err(common::DbError::TableNotFound("orders".into()));
    assert_error_variant(result2, &common::DbError::TableNotFound("users".into()));
}

#[test]
fn scripts_reuse_state_across_calls_against_the_same_context() {
    let mut ctx = TestContext::new().unwrap();

    let output1 = run_sql_script_with_context("CREATE TABLE users (id INT, name TEXT);", &mut ctx)
        .unwrap();
    assert!(output1.contains("table users created"));

    let output2 =
        run_sql_script_with_context("INSERT INTO users VALUES (1, 'Alice');", &mut ctx).unwrap();
    assert!(output2.contains("1 row inserted into users"));

    let output3 = run_sql_script_with_context("SELECT * FROM users;", &mut ctx).unwrap();
    assert!(output3.contains("Alice"));
}

#[cfg(test)]
mod proptest_tests {
    use proptest::prelude::*;
    use testsupport::proptest_generators::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn row_clone_preserves_values(row in arb_row()) {
            let cloned = row.clone();
            assert_eq!(row.values, cloned.values);
        }

        #[test]
        fn value_equality_is_reflexive(value in arb_value()) {
            assert_eq!(value, value);
        }

        #[test]
        fn row_with_len_has_the_requested_length(len in 1usize..20) {
            let strategy = arb_row_with_len(len);
            proptest!(|(row in strategy)| {
                prop_assert_eq!(row.values.len(), len);
            });
        }
    }
}
