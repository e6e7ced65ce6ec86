//! Tokenizes and parses the supported DML/DDL subset (spec.md §4.6) into
//! the internal [`Statement`] AST, on top of the `sqlparser` crate's
//! tokenizer/grammar — restricting its much larger grammar down to: `SELECT`
//! with `*` or a column list, `FROM` one table, an optional simple `WHERE`;
//! `INSERT INTO t VALUES (...)`; `CREATE TABLE t (col type, ...)`; and
//! pass-through stubs for `UPDATE`, `DELETE`, `DROP`, `ALTER`, `CREATE
//! INDEX`. Keywords are case-insensitive; text literals are single-quoted.

mod ast;

pub use ast::*;

use common::{DbError, DbResult};
use expr::{BinaryOp, Expr, UnaryOp};
use sqlparser::ast as sqlast;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser as SqlParser;
use types::Value;

/// Parses `sql` into zero or more statements. An empty (whitespace-only)
/// query fails with `EmptyQuery`; anything the grammar rejects, or that
/// this subset does not recognize, fails with `InvalidSyntax`.
pub fn parse_sql(sql: &str) -> DbResult<Vec<Statement>> {
    if sql.trim().is_empty() {
        return Err(DbError::EmptyQuery);
    }

    let dialect = GenericDialect {};
    let stmts = SqlParser::parse_sql(&dialect, sql)
        .map_err(|e| DbError::InvalidSyntax(e.to_string()))?;

    if stmts.is_empty() {
        return Err(DbError::EmptyQuery);
    }

    stmts.into_iter().map(map_statement).collect()
}

fn map_statement(stmt: sqlast::Statement) -> DbResult<Statement> {
    use sqlast::Statement as SqlStatement;

    match stmt {
        SqlStatement::CreateTable { name, columns, .. } => {
            let table = normalize_object_name(&name)?;
            let columns = columns
                .into_iter()
                .map(|col| ColumnDef {
                    name: normalize_ident_owned(col.name),
                    ty: col.data_type.to_string().to_uppercase(),
                })
                .collect();
            Ok(Statement::CreateTable {
                name: table,
                columns,
            })
        }
        SqlStatement::Insert {
            table_name, source, ..
        } => {
            let table = normalize_object_name(&table_name)?;
            let source =
                source.ok_or_else(|| DbError::InvalidSyntax("INSERT requires VALUES".into()))?;
            let values = extract_values(*source)?;
            Ok(Statement::Insert { table, values })
        }
        SqlStatement::Query(query) => map_select(*query),
        SqlStatement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            let table = table_name_from_with_joins(&table)?;
            let assignments = assignments
                .into_iter()
                .map(|assign| {
                    let ident = assign
                        .id
                        .last()
                        .ok_or_else(|| DbError::InvalidSyntax("invalid assignment target".into()))?;
                    Ok((normalize_ident(ident), map_expr(assign.value)?))
                })
                .collect::<DbResult<Vec<_>>>()?;
            let selection = selection.map(map_expr).transpose()?;
            Ok(Statement::Update {
                table,
                assignments,
                selection,
            })
        }
        SqlStatement::Delete {
            from, selection, ..
        } => {
            if from.is_empty() {
                return Err(DbError::InvalidSyntax("DELETE requires FROM".into()));
            }
            if from.len() > 1 {
                return Err(DbError::InvalidSyntax("multi-table DELETE not supported".into()));
            }
            let table = table_name_from_with_joins(&from[0])?;
            let selection = selection.map(map_expr).transpose()?;
            Ok(Statement::Delete { table, selection })
        }
        SqlStatement::Drop {
            object_type, names, ..
        } => {
            let name = first_name(names)?;
            match object_type {
                sqlast::ObjectType::Table => Ok(Statement::DropTable { name }),
                _ => Err(DbError::InvalidSyntax(format!(
                    "unsupported DROP target: {object_type:?}"
                ))),
            }
        }
        SqlStatement::AlterTable { name, .. } => Ok(Statement::AlterTable {
            name: normalize_object_name(&name)?,
        }),
        SqlStatement::CreateIndex {
            name,
            table_name,
            columns,
            ..
        } => {
            let index_name = normalize_object_name(
                &name.ok_or_else(|| DbError::InvalidSyntax("index name required".into()))?,
            )?;
            let table = normalize_object_name(&table_name)?;
            let column = map_index_column(columns.first())?;
            Ok(Statement::CreateIndex {
                name: index_name,
                table,
                column,
            })
        }
        other => Err(DbError::InvalidSyntax(format!(
            "unsupported statement: {other:?}"
        ))),
    }
}

fn map_select(query: sqlast::Query) -> DbResult<Statement> {
    use sqlast::SetExpr;

    let select = match *query.body {
        SetExpr::Select(select) => select,
        _ => return Err(DbError::InvalidSyntax("only plain SELECT is supported".into())),
    };

    let sqlast::Select {
        projection,
        from,
        selection,
        ..
    } = *select;

    if from.is_empty() {
        return Err(DbError::InvalidSyntax("SELECT requires FROM".into()));
    }
    if from.len() > 1 {
        return Err(DbError::InvalidSyntax("joins are out of scope".into()));
    }
    let table = table_name_from_with_joins(&from[0])?;
    let columns = map_projection(projection)?;
    let selection = selection.map(map_expr).transpose()?;

    Ok(Statement::Select {
        columns,
        table,
        selection,
    })
}

fn map_projection(projection: Vec<sqlast::SelectItem>) -> DbResult<SelectItem> {
    if projection.len() == 1 && matches!(projection[0], sqlast::SelectItem::Wildcard(_)) {
        return Ok(SelectItem::Wildcard);
    }

    let columns = projection
        .into_iter()
        .map(|item| match item {
            sqlast::SelectItem::UnnamedExpr(sqlast::Expr::Identifier(ident)) => {
                Ok((None, normalize_ident_owned(ident)))
            }
            sqlast::SelectItem::UnnamedExpr(sqlast::Expr::CompoundIdentifier(parts))
                if parts.len() == 2 =>
            {
                Ok((Some(normalize_ident(&parts[0])), normalize_ident(&parts[1])))
            }
            other => Err(DbError::InvalidSyntax(format!(
                "unsupported select item: {other:?}"
            ))),
        })
        .collect::<DbResult<Vec<_>>>()?;

    Ok(SelectItem::Columns(columns))
}

fn extract_values(query: sqlast::Query) -> DbResult<Vec<Expr>> {
    match *query.body {
        sqlast::SetExpr::Values(values) => {
            let mut rows = values.rows.into_iter();
            let row = rows
                .next()
                .ok_or_else(|| DbError::InvalidSyntax("INSERT requires a VALUES row".into()))?;
            if rows.next().is_some() {
                return Err(DbError::InvalidSyntax("multi-row INSERT not supported".into()));
            }
            row.into_iter().map(map_expr).collect()
        }
        _ => Err(DbError::InvalidSyntax("INSERT expects a VALUES list".into())),
    }
}

fn map_expr(expr: sqlast::Expr) -> DbResult<Expr> {
    use sqlast::Expr as SqlExpr;

    match expr {
        SqlExpr::Identifier(ident) => Ok(Expr::column(normalize_ident_owned(ident))),
        SqlExpr::CompoundIdentifier(parts) if parts.len() == 2 => Ok(Expr::qualified_column(
            normalize_ident(&parts[0]),
            normalize_ident(&parts[1]),
        )),
        SqlExpr::CompoundIdentifier(parts) => {
            let ident = parts
                .last()
                .ok_or_else(|| DbError::InvalidSyntax("invalid identifier".into()))?;
            Ok(Expr::column(normalize_ident(ident)))
        }
        SqlExpr::Value(value) => Ok(Expr::Literal(map_value(value)?)),
        SqlExpr::BinaryOp { left, op, right } => Ok(Expr::Binary {
            left: Box::new(map_expr(*left)?),
            op: map_binary_op(op)?,
            right: Box::new(map_expr(*right)?),
        }),
        SqlExpr::UnaryOp { op, expr } => Ok(Expr::Unary {
            op: map_unary_op(op)?,
            expr: Box::new(map_expr(*expr)?),
        }),
        SqlExpr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Expr::Between {
            expr: Box::new(map_expr(*expr)?),
            low: Box::new(map_expr(*low)?),
            high: Box::new(map_expr(*high)?),
            negated,
        }),
        SqlExpr::InList {
            expr,
            list,
            negated,
        } => Ok(Expr::InList {
            expr: Box::new(map_expr(*expr)?),
            list: list.into_iter().map(map_expr).collect::<DbResult<_>>()?,
            negated,
        }),
        SqlExpr::Like {
            negated,
            expr,
            pattern,
            ..
        } => Ok(Expr::Like {
            expr: Box::new(map_expr(*expr)?),
            pattern: Box::new(map_expr(*pattern)?),
            negated,
        }),
        SqlExpr::Nested(expr) => map_expr(*expr),
        other => Err(DbError::InvalidSyntax(format!("unsupported expression: {other:?}"))),
    }
}

fn map_value(value: sqlast::Value) -> DbResult<Value> {
    use sqlast::Value as SqlValue;

    match value {
        SqlValue::Number(num, _) => {
            if let Ok(i) = num.parse::<i64>() {
                Ok(Value::Int(i))
            } else {
                num.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| DbError::InvalidSyntax(format!("invalid numeric literal: {num}")))
            }
        }
        SqlValue::SingleQuotedString(s) => Ok(Value::Text(s)),
        SqlValue::Boolean(b) => Ok(Value::Bool(b)),
        SqlValue::Null => Ok(Value::Null),
        other => Err(DbError::InvalidSyntax(format!("unsupported literal: {other:?}"))),
    }
}

fn map_binary_op(op: sqlast::BinaryOperator) -> DbResult<BinaryOp> {
    use sqlast::BinaryOperator as SqlBinary;

    Ok(match op {
        SqlBinary::Eq => BinaryOp::Eq,
        SqlBinary::NotEq => BinaryOp::Ne,
        SqlBinary::Lt => BinaryOp::Lt,
        SqlBinary::LtEq => BinaryOp::Le,
        SqlBinary::Gt => BinaryOp::Gt,
        SqlBinary::GtEq => BinaryOp::Ge,
        SqlBinary::And => BinaryOp::And,
        SqlBinary::Or => BinaryOp::Or,
        other => return Err(DbError::InvalidSyntax(format!("unsupported operator: {other:?}"))),
    })
}

fn map_unary_op(op: sqlast::UnaryOperator) -> DbResult<UnaryOp> {
    match op {
        sqlast::UnaryOperator::Not => Ok(UnaryOp::Not),
        other => Err(DbError::InvalidSyntax(format!(
            "unsupported unary operator: {other:?}"
        ))),
    }
}

fn normalize_ident(ident: &sqlast::Ident) -> String {
    ident.value.to_lowercase()
}

fn normalize_ident_owned(ident: sqlast::Ident) -> String {
    ident.value.to_lowercase()
}

fn normalize_object_name(name: &sqlast::ObjectName) -> DbResult<String> {
    name.0
        .first()
        .map(|ident| ident.value.to_lowercase())
        .ok_or_else(|| DbError::InvalidSyntax("invalid object name".into()))
}

fn first_name(mut names: Vec<sqlast::ObjectName>) -> DbResult<String> {
    if names.is_empty() {
        return Err(DbError::InvalidSyntax("DROP requires a target".into()));
    }
    normalize_object_name(&names.remove(0))
}

fn table_name_from_with_joins(table: &sqlast::TableWithJoins) -> DbResult<String> {
    if !table.joins.is_empty() {
        return Err(DbError::InvalidSyntax("joins are out of scope".into()));
    }
    match &table.relation {
        sqlast::TableFactor::Table { name, .. } => normalize_object_name(name),
        _ => Err(DbError::InvalidSyntax("unsupported table factor".into())),
    }
}

fn map_index_column(column: Option<&sqlast::OrderByExpr>) -> DbResult<String> {
    let column = column.ok_or_else(|| DbError::InvalidSyntax("index column required".into()))?;
    match &column.expr {
        sqlast::Expr::Identifier(ident) => Ok(normalize_ident(ident)),
        other => Err(DbError::InvalidSyntax(format!(
            "unsupported index column: {other:?}"
        ))),
    }
}
