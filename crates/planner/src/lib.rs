//! Cost-aware query planner: builds a [`LogicalPlan`] from a parsed
//! `SELECT`, then runs the deterministic optimization pipeline from
//! spec.md §4.6 — predicate pushdown, join reordering, physical lowering
//! (with index selection), optional parallel-fragment assignment, and a
//! GPU cost hint — to produce a [`PhysicalNode`] the executor can run.

#[cfg(test)]
mod tests;

use catalog::{Catalog, ColumnStats, IndexMeta};
use common::{index::IndexKind, Config, DbError, DbResult};
use expr::{BinaryOp, Expr};
use parser::{SelectItem, Statement};

/// A tree of relational operators, independent of execution strategy.
#[derive(Clone, Debug, PartialEq)]
pub enum LogicalPlan {
    Scan {
        table: String,
        predicates: Vec<Expr>,
    },
    Filter {
        input: Box<LogicalPlan>,
        predicate: Expr,
    },
    Project {
        input: Box<LogicalPlan>,
        /// `None` means `*`.
        columns: Option<Vec<String>>,
    },
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        condition: Option<Expr>,
    },
    Sort {
        input: Box<LogicalPlan>,
        order_by: Vec<(String, bool)>,
    },
    Limit {
        input: Box<LogicalPlan>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Aggregate {
        input: Box<LogicalPlan>,
    },
}

impl LogicalPlan {
    /// The table this node (or its left-most descendant) scans, used by
    /// predicate pushdown and join reordering to decide where a qualified
    /// predicate belongs.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            LogicalPlan::Scan { table, .. } => Some(table),
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Aggregate { input } => input.table_name(),
            LogicalPlan::Join { left, .. } => left.table_name(),
        }
    }
}

/// Builds the logical plan for a `SELECT` statement. Other statement kinds
/// are handled directly by the database façade (CREATE/INSERT) or rejected
/// with `UnsupportedQueryType` (pass-through stubs) before reaching the
/// planner.
pub fn build_logical_plan(stmt: &Statement) -> DbResult<LogicalPlan> {
    let Statement::Select {
        columns,
        table,
        selection,
    } = stmt
    else {
        return Err(DbError::UnsupportedQueryType(format!("{stmt:?}")));
    };

    let mut plan = LogicalPlan::Scan {
        table: table.clone(),
        predicates: Vec::new(),
    };

    if let Some(predicate) = selection.clone() {
        plan = LogicalPlan::Filter {
            input: Box::new(plan),
            predicate,
        };
    }

    // `SELECT *` needs no projection node at all: wrapping it in a no-op
    // `Project { columns: None }` would push the physical root down a level
    // (e.g. `Project` over an `IndexSeek` rather than `IndexSeek` itself),
    // which disagrees with scenario 4's "physical root node is IndexSeek"
    // wording. An explicit column list still gets a real `Project`.
    if let SelectItem::Columns(cols) = columns {
        let projected_columns = cols
            .iter()
            .map(|(table, name)| match table {
                Some(t) => format!("{t}.{name}"),
                None => name.clone(),
            })
            .collect();
        plan = LogicalPlan::Project {
            input: Box::new(plan),
            columns: Some(projected_columns),
        };
    }

    Ok(plan)
}

// ---------------------------------------------------------------------
// 1. Predicate pushdown
// ---------------------------------------------------------------------

/// Copies any predicate qualified `table.col` into the child scan whose
/// `table_name` matches, rewritten to the unqualified column name. The
/// original predicate is retained on the parent `Filter` — duplication is
/// acceptable since filters are idempotent.
pub fn pushdown_predicates(plan: LogicalPlan) -> LogicalPlan {
    match plan {
        LogicalPlan::Filter { input, predicate } => {
            let input = pushdown_predicates(*input);
            let pushed = push_one(input, &predicate);
            LogicalPlan::Filter {
                input: Box::new(pushed),
                predicate,
            }
        }
        LogicalPlan::Project { input, columns } => LogicalPlan::Project {
            input: Box::new(pushdown_predicates(*input)),
            columns,
        },
        LogicalPlan::Sort { input, order_by } => LogicalPlan::Sort {
            input: Box::new(pushdown_predicates(*input)),
            order_by,
        },
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => LogicalPlan::Limit {
            input: Box::new(pushdown_predicates(*input)),
            limit,
            offset,
        },
        LogicalPlan::Aggregate { input } => LogicalPlan::Aggregate {
            input: Box::new(pushdown_predicates(*input)),
        },
        LogicalPlan::Join {
            left,
            right,
            condition,
        } => LogicalPlan::Join {
            left: Box::new(pushdown_predicates(*left)),
            right: Box::new(pushdown_predicates(*right)),
            condition,
        },
        scan @ LogicalPlan::Scan { .. } => scan,
    }
}

fn push_one(plan: LogicalPlan, predicate: &Expr) -> LogicalPlan {
    let Some((Some(qualifier), _)) = predicate.predicate_column() else {
        return plan;
    };

    match plan {
        LogicalPlan::Scan { table, predicates } if table == *qualifier => {
            let mut predicates = predicates;
            predicates.push(predicate.unqualify(&table));
            LogicalPlan::Scan { table, predicates }
        }
        LogicalPlan::Filter { input, predicate: p } => LogicalPlan::Filter {
            input: Box::new(push_one(*input, predicate)),
            predicate: p,
        },
        LogicalPlan::Project { input, columns } => LogicalPlan::Project {
            input: Box::new(push_one(*input, predicate)),
            columns,
        },
        LogicalPlan::Join {
            left,
            right,
            condition,
        } => LogicalPlan::Join {
            left: Box::new(push_one(*left, predicate)),
            right: Box::new(push_one(*right, predicate)),
            condition,
        },
        other => other,
    }
}

// ---------------------------------------------------------------------
// 2. Join reordering
// ---------------------------------------------------------------------

/// For binary joins, swaps children when statistics indicate the right
/// child has fewer rows than the left; ties keep input order. Applied
/// recursively bottom-up.
pub fn reorder_joins(plan: LogicalPlan, catalog: &Catalog) -> LogicalPlan {
    match plan {
        LogicalPlan::Join {
            left,
            right,
            condition,
        } => {
            let left = Box::new(reorder_joins(*left, catalog));
            let right = Box::new(reorder_joins(*right, catalog));

            let left_rows = left
                .table_name()
                .map(|t| catalog.row_count(t))
                .unwrap_or(u64::MAX);
            let right_rows = right
                .table_name()
                .map(|t| catalog.row_count(t))
                .unwrap_or(u64::MAX);

            if right_rows < left_rows {
                LogicalPlan::Join {
                    left: right,
                    right: left,
                    condition,
                }
            } else {
                LogicalPlan::Join {
                    left,
                    right,
                    condition,
                }
            }
        }
        LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter {
            input: Box::new(reorder_joins(*input, catalog)),
            predicate,
        },
        LogicalPlan::Project { input, columns } => LogicalPlan::Project {
            input: Box::new(reorder_joins(*input, catalog)),
            columns,
        },
        LogicalPlan::Sort { input, order_by } => LogicalPlan::Sort {
            input: Box::new(reorder_joins(*input, catalog)),
            order_by,
        },
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => LogicalPlan::Limit {
            input: Box::new(reorder_joins(*input, catalog)),
            limit,
            offset,
        },
        LogicalPlan::Aggregate { input } => LogicalPlan::Aggregate {
            input: Box::new(reorder_joins(*input, catalog)),
        },
        scan @ LogicalPlan::Scan { .. } => scan,
    }
}

// ---------------------------------------------------------------------
// Physical plan
// ---------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMethod {
    TableScan,
    IndexScan,
    IndexSeek,
    IndexRangeScan,
    None,
}

/// One fragment of a parallelized scan: a slice index and the total degree
/// it is one of, used by implementations that do add worker threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParallelFragment {
    pub fragment_id: u64,
    pub degree: u64,
}

/// Metadata carried by every physical node: access method, resolved index
/// reference, GPU hint, and parallelism.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalMeta {
    pub access_method: AccessMethod,
    pub index_ref: Option<String>,
    pub use_gpu: bool,
    pub parallel_degree: u64,
    pub fragments: Vec<ParallelFragment>,
}

impl Default for PhysicalMeta {
    fn default() -> Self {
        Self {
            access_method: AccessMethod::None,
            index_ref: None,
            use_gpu: false,
            parallel_degree: 1,
            fragments: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PhysicalKind {
    TableScan {
        table: String,
    },
    IndexScan {
        table: String,
        index: String,
    },
    IndexSeek {
        table: String,
        index: String,
        predicate: Expr,
    },
    IndexRangeScan {
        table: String,
        index: String,
        predicate: Expr,
    },
    Filter {
        input: Box<PhysicalNode>,
        predicate: Expr,
    },
    Project {
        input: Box<PhysicalNode>,
        columns: Option<Vec<String>>,
    },
    NestedLoopJoin {
        left: Box<PhysicalNode>,
        right: Box<PhysicalNode>,
    },
    HashJoin {
        left: Box<PhysicalNode>,
        right: Box<PhysicalNode>,
    },
    Sort {
        input: Box<PhysicalNode>,
        order_by: Vec<(String, bool)>,
    },
    Limit {
        input: Box<PhysicalNode>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Aggregate {
        input: Box<PhysicalNode>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalNode {
    pub kind: PhysicalKind,
    pub meta: PhysicalMeta,
}

impl PhysicalNode {
    fn leaf(kind: PhysicalKind, access_method: AccessMethod, index_ref: Option<String>) -> Self {
        Self {
            kind,
            meta: PhysicalMeta {
                access_method,
                index_ref,
                ..Default::default()
            },
        }
    }

    fn wrap(kind: PhysicalKind) -> Self {
        Self {
            kind,
            meta: PhysicalMeta::default(),
        }
    }

    pub fn scan_table(&self) -> Option<&str> {
        match &self.kind {
            PhysicalKind::TableScan { table }
            | PhysicalKind::IndexScan { table, .. }
            | PhysicalKind::IndexSeek { table, .. }
            | PhysicalKind::IndexRangeScan { table, .. } => Some(table),
            PhysicalKind::Filter { input, .. }
            | PhysicalKind::Project { input, .. }
            | PhysicalKind::Sort { input, .. }
            | PhysicalKind::Limit { input, .. }
            | PhysicalKind::Aggregate { input } => input.scan_table(),
            PhysicalKind::NestedLoopJoin { left, .. } | PhysicalKind::HashJoin { left, .. } => {
                left.scan_table()
            }
        }
    }
}

fn is_range_op(op: BinaryOp) -> bool {
    matches!(op, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
}

/// Picks the first predicate (input order preserved) that is an equality
/// against an integer literal, for `IndexSeek` eligibility.
fn first_eq_integer_predicate(predicates: &[Expr]) -> Option<&Expr> {
    predicates.iter().find(|p| {
        matches!(
            p,
            Expr::Binary { op: BinaryOp::Eq, left, right }
                if matches!(&**left, Expr::Literal(types::Value::Int(_)))
                    || matches!(&**right, Expr::Literal(types::Value::Int(_)))
        )
    })
}

fn first_range_predicate(predicates: &[Expr]) -> Option<&Expr> {
    predicates.iter().find(|p| match p {
        Expr::Binary { op, .. } => is_range_op(*op),
        Expr::Between { .. } => true,
        _ => false,
    })
}

/// 3. Physical lowering: `Scan` becomes `IndexSeek` if any predicate is an
/// integer equality on an indexed column; `IndexRangeScan` if any
/// predicate is `<`/`<=`/`>`/`>=`/`BETWEEN` on such a column;
/// `IndexScan` otherwise when a registered index merely covers a
/// predicate column; `TableScan` otherwise. `Join` lowers to
/// `NestedLoopJoin`; all other nodes map one-to-one.
pub fn lower_to_physical(plan: &LogicalPlan, catalog: &Catalog) -> PhysicalNode {
    match plan {
        LogicalPlan::Scan { table, predicates } => lower_scan(table, predicates, catalog),
        LogicalPlan::Filter { input, predicate } => PhysicalNode::wrap(PhysicalKind::Filter {
            input: Box::new(lower_to_physical(input, catalog)),
            predicate: predicate.clone(),
        }),
        LogicalPlan::Project { input, columns } => PhysicalNode::wrap(PhysicalKind::Project {
            input: Box::new(lower_to_physical(input, catalog)),
            columns: columns.clone(),
        }),
        LogicalPlan::Join { left, right, .. } => PhysicalNode::wrap(PhysicalKind::NestedLoopJoin {
            left: Box::new(lower_to_physical(left, catalog)),
            right: Box::new(lower_to_physical(right, catalog)),
        }),
        LogicalPlan::Sort { input, order_by } => PhysicalNode::wrap(PhysicalKind::Sort {
            input: Box::new(lower_to_physical(input, catalog)),
            order_by: order_by.clone(),
        }),
        LogicalPlan::Limit {
            input,
            limit,
            offset,
        } => PhysicalNode::wrap(PhysicalKind::Limit {
            input: Box::new(lower_to_physical(input, catalog)),
            limit: *limit,
            offset: *offset,
        }),
        LogicalPlan::Aggregate { input } => PhysicalNode::wrap(PhysicalKind::Aggregate {
            input: Box::new(lower_to_physical(input, catalog)),
        }),
    }
}

fn lower_scan(table: &str, predicates: &[Expr], catalog: &Catalog) -> PhysicalNode {
    if let Some(predicate) = first_eq_integer_predicate(predicates) {
        if let Some((_, column)) = predicate.predicate_column() {
            if let Some(index) = catalog.index_for_column(table, column) {
                return PhysicalNode::leaf(
                    PhysicalKind::IndexSeek {
                        table: table.to_string(),
                        index: index.name.clone(),
                        predicate: predicate.clone(),
                    },
                    AccessMethod::IndexSeek,
                    Some(index.name.clone()),
                );
            }
        }
    }

    if let Some(predicate) = first_range_predicate(predicates) {
        if let Some((_, column)) = predicate.predicate_column() {
            if let Some(index) = catalog.index_for_column(table, column) {
                return PhysicalNode::leaf(
                    PhysicalKind::IndexRangeScan {
                        table: table.to_string(),
                        index: index.name.clone(),
                        predicate: predicate.clone(),
                    },
                    AccessMethod::IndexRangeScan,
                    Some(index.name.clone()),
                );
            }
        }
    }

    for predicate in predicates {
        if let Some((_, column)) = predicate.predicate_column() {
            if let Some(index) = catalog.index_for_column(table, column) {
                return PhysicalNode::leaf(
                    PhysicalKind::IndexScan {
                        table: table.to_string(),
                        index: index.name.clone(),
                    },
                    AccessMethod::IndexScan,
                    Some(index.name.clone()),
                );
            }
        }
    }

    PhysicalNode::leaf(
        PhysicalKind::TableScan {
            table: table.to_string(),
        },
        AccessMethod::TableScan,
        None,
    )
}

/// 4. Parallelism: for `TableScan`/`IndexScan`/`IndexRangeScan`, sets
/// `parallel_degree = min(row_count / threshold, max_degree)` when the
/// table's row count exceeds `parallel_threshold`; degree 1 otherwise.
/// `IndexSeek` is never parallelized. Degree propagates to children.
pub fn apply_parallelism(node: PhysicalNode, catalog: &Catalog, config: &Config) -> PhysicalNode {
    let PhysicalNode { kind, mut meta } = node;

    let kind = match kind {
        PhysicalKind::TableScan { table } => {
            assign_degree(&mut meta, &table, catalog, config);
            PhysicalKind::TableScan { table }
        }
        PhysicalKind::IndexScan { table, index } => {
            assign_degree(&mut meta, &table, catalog, config);
            PhysicalKind::IndexScan { table, index }
        }
        PhysicalKind::IndexRangeScan {
            table,
            index,
            predicate,
        } => {
            assign_degree(&mut meta, &table, catalog, config);
            PhysicalKind::IndexRangeScan {
                table,
                index,
                predicate,
            }
        }
        PhysicalKind::IndexSeek {
            table,
            index,
            predicate,
        } => PhysicalKind::IndexSeek {
            table,
            index,
            predicate,
        },
        PhysicalKind::Filter { input, predicate } => PhysicalKind::Filter {
            input: Box::new(apply_parallelism(*input, catalog, config)),
            predicate,
        },
        PhysicalKind::Project { input, columns } => PhysicalKind::Project {
            input: Box::new(apply_parallelism(*input, catalog, config)),
            columns,
        },
        PhysicalKind::NestedLoopJoin { left, right } => PhysicalKind::NestedLoopJoin {
            left: Box::new(apply_parallelism(*left, catalog, config)),
            right: Box::new(apply_parallelism(*right, catalog, config)),
        },
        PhysicalKind::HashJoin { left, right } => PhysicalKind::HashJoin {
            left: Box::new(apply_parallelism(*left, catalog, config)),
            right: Box::new(apply_parallelism(*right, catalog, config)),
        },
        PhysicalKind::Sort { input, order_by } => PhysicalKind::Sort {
            input: Box::new(apply_parallelism(*input, catalog, config)),
            order_by,
        },
        PhysicalKind::Limit {
            input,
            limit,
            offset,
        } => PhysicalKind::Limit {
            input: Box::new(apply_parallelism(*input, catalog, config)),
            limit,
            offset,
        },
        PhysicalKind::Aggregate { input } => PhysicalKind::Aggregate {
            input: Box::new(apply_parallelism(*input, catalog, config)),
        },
    };

    PhysicalNode { kind, meta }
}

fn assign_degree(meta: &mut PhysicalMeta, table: &str, catalog: &Catalog, config: &Config) {
    let row_count = catalog.row_count(table);
    let degree = if row_count > config.parallel_threshold {
        (row_count / config.parallel_threshold).clamp(1, config.max_parallel_degree)
    } else {
        1
    };
    meta.parallel_degree = degree;
    meta.fragments = (0..degree)
        .map(|id| ParallelFragment {
            fragment_id: id,
            degree,
        })
        .collect();
}

/// A cost hook deciding whether a physical node should be marked
/// `use_gpu`, mirroring spec.md's advisory `shouldUseGpu(plan)` callout.
pub type GpuCostHook = fn(&PhysicalNode) -> bool;

fn default_gpu_cost_hook(_: &PhysicalNode) -> bool {
    false
}

/// 5. GPU hint: advisory only, never affects correctness. If a GPU is
/// declared available and not force-enabled, the cost hook decides node by
/// node; if force-enabled, every node is marked; otherwise every node is
/// left `false`.
pub fn apply_gpu_hint(node: PhysicalNode, config: &Config, hook: Option<GpuCostHook>) -> PhysicalNode {
    if !config.gpu_available {
        return node;
    }

    let use_gpu = if config.gpu_force_enabled {
        true
    } else {
        (hook.unwrap_or(default_gpu_cost_hook))(&node)
    };

    map_nodes(node, &mut |mut n| {
        n.meta.use_gpu = use_gpu || config.gpu_force_enabled;
        n
    })
}

fn map_nodes(node: PhysicalNode, f: &mut impl FnMut(PhysicalNode) -> PhysicalNode) -> PhysicalNode {
    let PhysicalNode { kind, meta } = node;
    let kind = match kind {
        PhysicalKind::Filter { input, predicate } => PhysicalKind::Filter {
            input: Box::new(map_nodes(*input, f)),
            predicate,
        },
        PhysicalKind::Project { input, columns } => PhysicalKind::Project {
            input: Box::new(map_nodes(*input, f)),
            columns,
        },
        PhysicalKind::NestedLoopJoin { left, right } => PhysicalKind::NestedLoopJoin {
            left: Box::new(map_nodes(*left, f)),
            right: Box::new(map_nodes(*right, f)),
        },
        PhysicalKind::HashJoin { left, right } => PhysicalKind::HashJoin {
            left: Box::new(map_nodes(*left, f)),
            right: Box::new(map_nodes(*right, f)),
        },
        PhysicalKind::Sort { input, order_by } => PhysicalKind::Sort {
            input: Box::new(map_nodes(*input, f)),
            order_by,
        },
        PhysicalKind::Limit {
            input,
            limit,
            offset,
        } => PhysicalKind::Limit {
            input: Box::new(map_nodes(*input, f)),
            limit,
            offset,
        },
        PhysicalKind::Aggregate { input } => PhysicalKind::Aggregate {
            input: Box::new(map_nodes(*input, f)),
        },
        leaf => leaf,
    };
    f(PhysicalNode { kind, meta })
}

/// Estimated fraction of rows satisfying `predicate`, per spec.md's
/// selectivity heuristics: equality → 1/distinct; not-equal →
/// 1 − 1/distinct; range (`<`,`<=`,`>`,`>=`,`BETWEEN`) → 0.3; `IN` → 0.2;
/// `LIKE` → 0.1; missing stats → 0.5.
pub fn selectivity(predicate: &Expr, stats: Option<&ColumnStats>) -> f64 {
    let distinct = stats.map(|s| s.distinct_count).filter(|d| *d > 0);

    match predicate {
        Expr::Binary {
            op: BinaryOp::Eq, ..
        } => distinct.map(|d| 1.0 / d as f64).unwrap_or(0.5),
        Expr::Binary {
            op: BinaryOp::Ne, ..
        } => distinct.map(|d| 1.0 - 1.0 / d as f64).unwrap_or(0.5),
        Expr::Binary { op, .. } if is_range_op(*op) => 0.3,
        Expr::Between { .. } => 0.3,
        Expr::InList { .. } => 0.2,
        Expr::Like { .. } => 0.1,
        _ => 0.5,
    }
}

/// Runs the full deterministic pipeline (§4.6 steps 1-5) over `stmt`,
/// producing the physical plan the executor runs. Same inputs always
/// produce the same output (planner determinism).
pub struct Planner;

impl Planner {
    pub fn optimize(
        stmt: &Statement,
        catalog: &Catalog,
        config: &Config,
        gpu_hook: Option<GpuCostHook>,
    ) -> DbResult<PhysicalNode> {
        let logical = build_logical_plan(stmt)?;
        let logical = pushdown_predicates(logical);
        let logical = reorder_joins(logical, catalog);
        let physical = lower_to_physical(&logical, catalog);
        let physical = apply_parallelism(physical, catalog, config);
        Ok(apply_gpu_hint(physical, config, gpu_hook))
    }
}

/// Resolves index metadata by name, used by the executor's `IndexSeek`
/// dispatch. Kept here (rather than in `catalog`) since it is planner/
/// executor-facing lookup convenience, not catalog state itself.
pub fn resolve_index<'a>(catalog: &'a Catalog, name: &str) -> Option<&'a IndexMeta> {
    catalog.index_by_name(name)
}

pub fn index_kind(meta: &IndexMeta) -> IndexKind {
    meta.kind
}
