//! Query executor: runs a [`planner::PhysicalNode`] tree against a
//! [`Catalog`] and the live secondary-index registry, per spec.md §4.7, and
//! carries the INSERT/CREATE TABLE write paths that the database façade's
//! "direct catalog path" calls without going through the planner.


use catalog::Column;
use common::{index::Index, DbError, DbResult, Row, TxnId};
use expr::{BinaryOp, EvalContext, Expr};
use parser::ColumnDef;
use planner::{PhysicalKind, PhysicalNode};
use types::{SqlType, Value};
use wal::Wal;

/// Owns the live index structures referenced by name from `catalog::IndexMeta`.
/// Kept separate from the catalog (which only remembers that an index
/// exists) per the "type-erased index registry" design note: a tagged
/// variant over the two index kinds exposing the shared `Index` contract.
#[derive(Default)]
pub struct IndexRegistry {
    indexes: std::collections::HashMap<String, Box<dyn Index>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, index: Box<dyn Index>) {
        self.indexes.insert(index.name().to_string(), index);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Index> {
        self.indexes.get(name).map(|b| b.as_ref())
    }
}

/// Read-only handles the executor needs to run a physical plan.
pub struct ExecutionContext<'a> {
    pub catalog: &'a catalog::Catalog,
    pub indexes: &'a IndexRegistry,
    pub config: &'a common::Config,
}

/// Whether a write is being applied live or replayed from the WAL during
/// recovery. Threaded explicitly (rather than an ambient `is_recovering`
/// flag) so replay can suppress WAL re-writes without hidden state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    Normal,
    Recovery,
}

/// Demo rows returned by `TableScan` for a handful of well-known table
/// names when the table does not exist in the catalog (§8 scenario 5). A
/// `Config::demo_fallback_enabled` flag gates this entirely, per the
/// "DatabaseContext flag" design note, rather than hard-coding the
/// behavior unconditionally.
fn demo_fallback(table: &str) -> Option<(Vec<(String, SqlType)>, Vec<Row>)> {
    match table {
        "users" => Some((
            vec![
                ("id".into(), SqlType::Int),
                ("name".into(), SqlType::Text),
                ("email".into(), SqlType::Text),
            ],
            vec![
                Row::new(vec![
                    Value::Int(1),
                    Value::Text("Alice".into()),
                    Value::Text("alice@example.com".into()),
                ]),
                Row::new(vec![
                    Value::Int(2),
                    Value::Text("Bob".into()),
                    Value::Text("bob@example.com".into()),
                ]),
                Row::new(vec![
                    Value::Int(3),
                    Value::Text("Charlie".into()),
                    Value::Text("charlie@example.com".into()),
                ]),
            ],
        )),
        "products" => Some((
            vec![
                ("id".into(), SqlType::Int),
                ("name".into(), SqlType::Text),
                ("price".into(), SqlType::Float),
            ],
            vec![
                Row::new(vec![Value::Int(1), Value::Text("Widget".into()), Value::Float(9.99)]),
                Row::new(vec![Value::Int(2), Value::Text("Gadget".into()), Value::Float(19.99)]),
            ],
        )),
        "orders" => Some((
            vec![
                ("id".into(), SqlType::Int),
                ("user_id".into(), SqlType::Int),
                ("total".into(), SqlType::Float),
            ],
            vec![
                Row::new(vec![Value::Int(1), Value::Int(1), Value::Float(29.98)]),
                Row::new(vec![Value::Int(2), Value::Int(2), Value::Float(9.99)]),
            ],
        )),
        _ => None,
    }
}

/// Runs a physical plan, dispatching by node kind (§4.7). `TableScan` and
/// `IndexSeek` are fully implemented; `Filter` and `Project` are extended
/// beyond the documented minimum since they are needed to make the
/// `TableScan` demo-fallback contract observable end to end through a
/// full `SELECT`, which the spec explicitly permits ("implementers may
/// extend while preserving inputs' ownership contract"). `IndexRangeScan`,
/// `IndexScan`, `Sort`, `Limit`, `Aggregate`, and the join nodes keep the
/// documented minimal implementation: an empty `ResultSet`.
pub fn execute(node: &PhysicalNode, ctx: &ExecutionContext) -> DbResult<common::ResultSet> {
    match &node.kind {
        PhysicalKind::TableScan { table } => execute_table_scan(table, ctx),
        PhysicalKind::IndexSeek { index, predicate, .. } => execute_index_seek(index, predicate, ctx),
        PhysicalKind::IndexRangeScan { .. }
        | PhysicalKind::IndexScan { .. }
        | PhysicalKind::Sort { .. }
        | PhysicalKind::Limit { .. }
        | PhysicalKind::Aggregate { .. }
        | PhysicalKind::NestedLoopJoin { .. }
        | PhysicalKind::HashJoin { .. } => Ok(common::ResultSet::empty()),
        PhysicalKind::Filter { input, predicate } => execute_filter(input, predicate, ctx),
        PhysicalKind::Project { input, columns } => execute_project(input, columns, ctx),
    }
}

fn execute_table_scan(table: &str, ctx: &ExecutionContext) -> DbResult<common::ResultSet> {
    if let Some(meta) = ctx.catalog.lookup(table) {
        let columns: Vec<(String, SqlType)> = meta
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.ty.clone()))
            .collect();
        let rows = ctx.catalog.iterate(table)?;
        return Ok(common::ResultSet::from_rows(columns, rows));
    }

    if ctx.config.demo_fallback_enabled {
        if let Some((columns, rows)) = demo_fallback(table) {
            return Ok(common::ResultSet::from_rows(columns, rows));
        }
    }

    Ok(common::ResultSet::message(format!("Table not found: {table}")))
}

fn execute_index_seek(index_name: &str, predicate: &Expr, ctx: &ExecutionContext) -> DbResult<common::ResultSet> {
    if predicate.predicate_column().is_none() {
        return Err(DbError::InvalidPlan(
            "IndexSeek requires a single-column predicate".into(),
        ));
    }

    let Expr::Binary {
        op: BinaryOp::Eq,
        left,
        right,
    } = predicate
    else {
        return Err(DbError::MissingPredicate);
    };

    let literal = match (left.as_ref(), right.as_ref()) {
        (Expr::Literal(v), Expr::Column { .. }) | (Expr::Column { .. }, Expr::Literal(v)) => v,
        _ => return Err(DbError::MissingPredicate),
    };

    let Value::Int(key) = literal else {
        return Err(DbError::UnsupportedKeyType);
    };

    let index = ctx
        .indexes
        .get(index_name)
        .ok_or_else(|| DbError::IndexNotFound(index_name.to_string()))?;

    match index.get(*key) {
        Some(row_id) => Ok(common::ResultSet::single_column(
            "row_id",
            SqlType::Int,
            vec![Value::Int(row_id as i64)],
        )),
        None => Ok(common::ResultSet::empty()),
    }
}

fn execute_filter(input: &PhysicalNode, predicate: &Expr, ctx: &ExecutionContext) -> DbResult<common::ResultSet> {
    let input_rs = execute(input, ctx)?;
    let (names, types, rows) = decompose(&input_rs);

    let eval = EvalContext { schema: &names };
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        if eval.eval(predicate, &row)?.as_bool().unwrap_or(false) {
            kept.push(row);
        }
    }

    let columns = names.into_iter().zip(types).collect();
    Ok(common::ResultSet::from_rows(columns, kept))
}

fn execute_project(
    input: &PhysicalNode,
    columns: &Option<Vec<String>>,
    ctx: &ExecutionContext,
) -> DbResult<common::ResultSet> {
    let input_rs = execute(input, ctx)?;
    let Some(wanted) = columns else {
        return Ok(input_rs);
    };

    let (names, types, rows) = decompose(&input_rs);
    let indices: Vec<usize> = wanted
        .iter()
        .map(|w| {
            resolve_column_index(&names, w)
                .ok_or_else(|| DbError::InvalidPlan(format!("unknown column '{w}'")))
        })
        .collect::<DbResult<_>>()?;

    let out_columns: Vec<(String, SqlType)> = indices
        .iter()
        .map(|&i| (names[i].clone(), types[i].clone()))
        .collect();
    let out_rows: Vec<Row> = rows
        .into_iter()
        .map(|row| Row::new(indices.iter().map(|&i| row.values[i].clone()).collect()))
        .collect();

    Ok(common::ResultSet::from_rows(out_columns, out_rows))
}

fn decompose(rs: &common::ResultSet) -> (Vec<String>, Vec<SqlType>, Vec<Row>) {
    let names: Vec<String> = rs.columns.iter().map(|c| c.name.clone()).collect();
    let types: Vec<SqlType> = rs.columns.iter().map(|c| c.data_type.clone()).collect();
    let rows = (0..rs.row_count)
        .map(|r| Row::new(rs.columns.iter().map(|c| c.bytes[r].clone()).collect()))
        .collect();
    (names, types, rows)
}

/// Resolves a projection item (possibly `table.col`) against a schema of
/// plain or `table.col`-qualified names, mirroring `EvalContext`'s column
/// lookup so projection and predicate evaluation agree on matching rules.
fn resolve_column_index(schema: &[String], wanted: &str) -> Option<usize> {
    if let Some((table, name)) = wanted.split_once('.') {
        let full = format!("{table}.{name}");
        schema.iter().position(|c| c.eq_ignore_ascii_case(&full))
    } else {
        schema.iter().position(|c| {
            c.eq_ignore_ascii_case(wanted)
                || c.to_lowercase().ends_with(&format!(".{}", wanted.to_lowercase()))
        })
    }
}

fn literal_value(expr: &Expr) -> DbResult<Value> {
    match expr {
        Expr::Literal(v @ (Value::Int(_) | Value::Text(_))) => Ok(v.clone()),
        _ => Err(DbError::InvalidSyntax(
            "VALUES accepts only integer and text literals".into(),
        )),
    }
}

/// Writes (INSERT): resolves the target table, parses the VALUES tuple,
/// appends the row, and — outside of recovery — appends a WAL record whose
/// payload is `INSERT:<table>:<full original query text>`. On a WAL
/// failure after the row has already been appended, the append is
/// reverted before returning.
pub fn execute_insert(
    table: &str,
    values: &[Expr],
    original_query: &str,
    txn_id: TxnId,
    catalog: &mut catalog::Catalog,
    wal: &mut Wal,
    mode: ExecutionMode,
) -> DbResult<()> {
    let resolved: Vec<Value> = values.iter().map(literal_value).collect::<DbResult<_>>()?;
    catalog.append_row(table, resolved, txn_id)?;

    if mode == ExecutionMode::Normal {
        let payload = format!("INSERT:{table}:{original_query}");
        if let Err(e) = wal.log_transaction(txn_id, payload.as_bytes()) {
            catalog.remove_last_row(table)?;
            return Err(e);
        }
    }

    Ok(())
}

/// DDL (CREATE TABLE): parses the column list, creates the table, and —
/// outside recovery — appends a WAL record whose payload is
/// `CREATE_TABLE:<table>:<full original query text>`. Reverts the table
/// creation if the WAL write fails.
pub fn execute_create_table(
    name: &str,
    columns: &[ColumnDef],
    original_query: &str,
    txn_id: TxnId,
    catalog: &mut catalog::Catalog,
    wal: &mut Wal,
    mode: ExecutionMode,
) -> DbResult<()> {
    let columns = columns
        .iter()
        .map(|c| {
            let ty = SqlType::from_keyword(&c.ty)
                .ok_or_else(|| DbError::InvalidSyntax(format!("unsupported column type: {}", c.ty)))?;
            Ok(Column {
                name: c.name.clone(),
                ty,
            })
        })
        .collect::<DbResult<Vec<_>>>()?;

    catalog.create_table(name, columns)?;

    if mode == ExecutionMode::Normal {
        let payload = format!("CREATE_TABLE:{name}:{original_query}");
        if let Err(e) = wal.log_transaction(txn_id, payload.as_bytes()) {
            catalog.drop_table(name)?;
            return Err(e);
        }
    }

    Ok(())
}
