use super::*;
use catalog::{Catalog, Column, IndexMeta};
use common::index::IndexKind;
use parser::parse_sql;
use pretty_assertions::assert_eq;
use types::SqlType;

fn int_col(name: &str) -> Column {
    Column {
        name: name.to_string(),
        ty: SqlType::Int,
    }
}

fn text_col(name: &str) -> Column {
    Column {
        name: name.to_string(),
        ty: SqlType::Text,
    }
}

fn sample_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .create_table("users", vec![int_col("id"), text_col("name"), int_col("age")])
        .unwrap();
    catalog
        .register_index(IndexMeta {
            name: "idx_users_id".into(),
            table: "users".into(),
            column: "id".into(),
            kind: IndexKind::OrderedTree,
        })
        .unwrap();
    catalog
}

fn select(sql: &str) -> Statement {
    parse_sql(sql).unwrap().remove(0)
}

#[test]
fn select_star_lowers_directly_to_table_scan() {
    // `SELECT *` needs no projection, so the physical root is the
    // `TableScan` itself — no no-op `Project` wrapping it.
    let catalog = sample_catalog();
    let config = Config::builder().data_dir(std::path::PathBuf::from("/tmp/x")).build();
    let plan = Planner::optimize(&select("SELECT * FROM users"), &catalog, &config, None).unwrap();

    assert!(matches!(plan.kind, PhysicalKind::TableScan { .. }));
}

#[test]
fn select_with_explicit_columns_still_gets_a_project() {
    let catalog = sample_catalog();
    let config = Config::builder().data_dir(std::path::PathBuf::from("/tmp/x")).build();
    let plan = Planner::optimize(&select("SELECT id, name FROM users"), &catalog, &config, None).unwrap();

    match plan.kind {
        PhysicalKind::Project { input, columns } => {
            assert_eq!(columns, Some(vec!["id".to_string(), "name".to_string()]));
            assert!(matches!(input.kind, PhysicalKind::TableScan { .. }));
        }
        other => panic!("expected Project, got {other:?}"),
    }
}

#[test]
fn equality_on_indexed_column_lowers_to_index_seek() {
    // §8 scenario 4: the physical root for an indexed equality predicate
    // is the `IndexSeek` (modulo the `Filter` the spec explicitly keeps
    // around a pushed-down predicate, per "duplication is acceptable
    // since filters are idempotent").
    let catalog = sample_catalog();
    let config = Config::builder().data_dir(std::path::PathBuf::from("/tmp/x")).build();
    let stmt = select("SELECT * FROM users WHERE id = 42");

    let plan = Planner::optimize(&stmt, &catalog, &config, None).unwrap();

    let PhysicalKind::Filter { input, .. } = plan.kind else {
        panic!("expected Filter");
    };
    match input.kind {
        PhysicalKind::IndexSeek { index, table, .. } => {
            assert_eq!(index, "idx_users_id");
            assert_eq!(table, "users");
        }
        other => panic!("expected IndexSeek, got {other:?}"),
    }
    assert_eq!(input.meta.access_method, AccessMethod::IndexSeek);
}

#[test]
fn predicate_on_unindexed_column_lowers_to_table_scan() {
    let catalog = sample_catalog();
    let config = Config::builder().data_dir(std::path::PathBuf::from("/tmp/x")).build();
    let stmt = select("SELECT * FROM users WHERE name = 'alice'");

    let plan = Planner::optimize(&stmt, &catalog, &config, None).unwrap();

    let PhysicalKind::Filter { input, .. } = plan.kind else {
        panic!("expected Filter");
    };
    assert!(matches!(input.kind, PhysicalKind::TableScan { .. }));
}

#[test]
fn range_predicate_on_indexed_column_lowers_to_index_range_scan() {
    let mut catalog = sample_catalog();
    catalog
        .register_index(IndexMeta {
            name: "idx_users_age".into(),
            table: "users".into(),
            column: "age".into(),
            kind: IndexKind::OrderedTree,
        })
        .unwrap();
    let config = Config::builder().data_dir(std::path::PathBuf::from("/tmp/x")).build();
    let stmt = select("SELECT * FROM users WHERE age > 30");

    let plan = Planner::optimize(&stmt, &catalog, &config, None).unwrap();

    let PhysicalKind::Filter { input, .. } = plan.kind else {
        panic!("expected Filter");
    };
    match input.kind {
        PhysicalKind::IndexRangeScan { index, .. } => assert_eq!(index, "idx_users_age"),
        other => panic!("expected IndexRangeScan, got {other:?}"),
    }
}

#[test]
fn non_select_statements_are_rejected() {
    let stmt = select("INSERT INTO users VALUES (1, 'a', 2)");
    let result = build_logical_plan(&stmt);
    assert!(matches!(result, Err(DbError::UnsupportedQueryType(_))));
}

#[test]
fn planner_is_deterministic() {
    let catalog = sample_catalog();
    let config = Config::builder().data_dir(std::path::PathBuf::from("/tmp/x")).build();
    let stmt = select("SELECT name FROM users WHERE id = 42");

    let first = Planner::optimize(&stmt, &catalog, &config, None).unwrap();
    let second = Planner::optimize(&stmt, &catalog, &config, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn predicate_pushdown_moves_qualified_predicate_into_scan() {
    let stmt = select("SELECT * FROM users WHERE users.id = 1");
    let logical = build_logical_plan(&stmt).unwrap();
    let pushed = pushdown_predicates(logical);

    let LogicalPlan::Filter { input, .. } = pushed else {
        panic!("expected Filter");
    };
    match *input {
        LogicalPlan::Scan { predicates, .. } => assert_eq!(predicates.len(), 1),
        other => panic!("expected Scan, got {other:?}"),
    }
}

#[test]
fn join_reorder_puts_smaller_table_on_left() {
    let mut catalog = Catalog::new();
    catalog.create_table("big", vec![int_col("id")]).unwrap();
    catalog.create_table("small", vec![int_col("id")]).unwrap();
    catalog.set_stats(
        "big",
        catalog::TableStats {
            row_count: 1_000_000,
            row_size_estimate: 0,
            columns: Default::default(),
        },
    );
    catalog.set_stats(
        "small",
        catalog::TableStats {
            row_count: 10,
            row_size_estimate: 0,
            columns: Default::default(),
        },
    );

    let join = LogicalPlan::Join {
        left: Box::new(LogicalPlan::Scan {
            table: "big".into(),
            predicates: Vec::new(),
        }),
        right: Box::new(LogicalPlan::Scan {
            table: "small".into(),
            predicates: Vec::new(),
        }),
        condition: None,
    };

    let reordered = reorder_joins(join, &catalog);
    assert_eq!(reordered.table_name(), Some("small"));
}

#[test]
fn selectivity_falls_back_to_half_without_stats() {
    let predicate = Expr::Binary {
        left: Box::new(Expr::column("id")),
        op: BinaryOp::Eq,
        right: Box::new(Expr::Literal(types::Value::Int(1))),
    };
    assert_eq!(selectivity(&predicate, None), 0.5);
}

#[test]
fn selectivity_uses_distinct_count_for_equality() {
    let predicate = Expr::Binary {
        left: Box::new(Expr::column("id")),
        op: BinaryOp::Eq,
        right: Box::new(Expr::Literal(types::Value::Int(1))),
    };
    let stats = ColumnStats {
        distinct_count: 100,
        min: None,
        max: None,
        null_count: 0,
        histogram: None,
    };
    assert_eq!(selectivity(&predicate, Some(&stats)), 0.01);
}

#[test]
fn range_and_in_and_like_selectivity_constants() {
    let range = Expr::Between {
        expr: Box::new(Expr::column("age")),
        low: Box::new(Expr::Literal(types::Value::Int(1))),
        high: Box::new(Expr::Literal(types::Value::Int(10))),
        negated: false,
    };
    assert_eq!(selectivity(&range, None), 0.3);

    let in_list = Expr::InList {
        expr: Box::new(Expr::column("id")),
        list: vec![Expr::Literal(types::Value::Int(1))],
        negated: false,
    };
    assert_eq!(selectivity(&in_list, None), 0.2);

    let like = Expr::Like {
        expr: Box::new(Expr::column("name")),
        pattern: Box::new(Expr::Literal(types::Value::Text("a%".into()))),
        negated: false,
    };
    assert_eq!(selectivity(&like, None), 0.1);
}

#[test]
fn parallelism_assigned_above_threshold() {
    let mut catalog = Catalog::new();
    catalog.create_table("users", vec![int_col("id")]).unwrap();
    catalog.set_stats(
        "users",
        catalog::TableStats {
            row_count: 50_000,
            row_size_estimate: 0,
            columns: Default::default(),
        },
    );
    let config = Config::builder()
        .data_dir(std::path::PathBuf::from("/tmp/x"))
        .parallel_threshold(10_000)
        .max_parallel_degree(4)
        .build();

    let plan = Planner::optimize(&select("SELECT * FROM users"), &catalog, &config, None).unwrap();
    assert!(matches!(plan.kind, PhysicalKind::TableScan { .. }));
    assert_eq!(plan.meta.parallel_degree, 4);
    assert_eq!(plan.meta.fragments.len(), 4);
}

#[test]
fn parallelism_stays_single_degree_below_threshold() {
    let catalog = sample_catalog();
    let config = Config::builder().data_dir(std::path::PathBuf::from("/tmp/x")).build();
    let plan = Planner::optimize(&select("SELECT * FROM users"), &catalog, &config, None).unwrap();
    assert!(matches!(plan.kind, PhysicalKind::TableScan { .. }));
    assert_eq!(plan.meta.parallel_degree, 1);
}

#[test]
fn gpu_hint_is_off_when_unavailable() {
    let catalog = sample_catalog();
    let config = Config::builder().data_dir(std::path::PathBuf::from("/tmp/x")).build();
    let plan = Planner::optimize(&select("SELECT * FROM users"), &catalog, &config, None).unwrap();
    assert!(!plan.meta.use_gpu);
}

#[test]
fn gpu_hint_forced_propagates_to_every_node() {
    let catalog = sample_catalog();
    let config = Config::builder()
        .data_dir(std::path::PathBuf::from("/tmp/x"))
        .gpu_available(true)
        .gpu_force_enabled(true)
        .build();
    let plan = Planner::optimize(&select("SELECT * FROM users WHERE name = 'alice'"), &catalog, &config, None)
        .unwrap();
    assert!(plan.meta.use_gpu);
    let PhysicalKind::Filter { input, .. } = plan.kind else {
        panic!("expected Filter");
    };
    assert!(input.meta.use_gpu);
}

#[test]
fn index_scan_selected_when_no_equality_or_range_predicate_matches() {
    let catalog = sample_catalog();
    let config = Config::builder().data_dir(std::path::PathBuf::from("/tmp/x")).build();
    let stmt = select("SELECT * FROM users WHERE id IN (1, 2, 3)");

    let plan = Planner::optimize(&stmt, &catalog, &config, None).unwrap();
    let PhysicalKind::Filter { input, .. } = plan.kind else {
        panic!("expected Filter")
    };
    match input.kind {
        PhysicalKind::IndexScan { index, .. } => assert_eq!(index, "idx_users_id"),
        other => panic!("expected IndexScan, got {other:?}"),
    }
}
