//! SQL script execution for snapshot-style testing: run a multi-statement
//! script against a fresh (or caller-supplied) `TestContext` and capture
//! one pretty-printed, `insta`-friendly string per statement.

use crate::context::TestContext;
use common::{DbResult, ResultSet};
use tabled::builder::Builder;
use tabled::settings::Style;
use types::Value;

/// Runs `sql` against a fresh, isolated database and returns the
/// concatenated output of every statement, one paragraph per statement.
pub fn run_sql_script(sql: &str) -> DbResult<String> {
    let mut ctx = TestContext::new()?;
    run_sql_script_with_context(sql, &mut ctx)
}

/// Runs `sql` against `ctx`'s database, so callers can chain scripts
/// against the same accumulated state.
pub fn run_sql_script_with_context(sql: &str, ctx: &mut TestContext) -> DbResult<String> {
    let statements = split_statements(sql);
    let mut paragraphs = Vec::with_capacity(statements.len());

    for statement in statements {
        let rendered = match ctx.database_mut().execute(statement) {
            Ok(result) => render_result_set(&result),
            Err(err) => format!("Error: {}", err),
        };
        paragraphs.push(rendered);
    }

    Ok(paragraphs.join("\n"))
}

/// Splits a script into individual statements on `;` boundaries, dropping
/// blank statements left by trailing semicolons or whitespace-only lines.
fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn render_result_set(result: &ResultSet) -> String {
    if result.columns.is_empty() {
        return format!("{} row(s) affected.", result.row_count);
    }

    let mut builder = Builder::default();
    builder.push_record(result.columns.iter().map(|c| c.name.clone()));

    for row in 0..result.row_count {
        let cells = result
            .columns
            .iter()
            .map(|col| render_cell(col.get(row).ok()))
            .collect::<Vec<_>>();
        builder.push_record(cells);
    }

    builder.build().with(Style::modern()).to_string()
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::Int(i)) => i.to_string(),
        Some(Value::Float(f)) => f.to_string(),
        Some(Value::Text(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_table_and_selects_inserted_rows() {
        let output = run_sql_script(
            r#"
            CREATE TABLE users (id INT, name TEXT, age INT);
            INSERT INTO users VALUES (1, 'Alice', 30);
            INSERT INTO users VALUES (2, 'Bob', 25);
            SELECT * FROM users;
        "#,
        )
        .unwrap();

        assert!(output.contains("Alice"));
        assert!(output.contains("Bob"));
    }

    #[test]
    fn surfaces_errors_inline_rather_than_aborting_the_script() {
        // A table scan against an unregistered name is not an error (it
        // falls through to an informational message); an UPDATE is, since
        // the planner only lowers SELECT.
        let output = run_sql_script(
            r#"
            CREATE TABLE users (id INT, name TEXT);
            UPDATE users SET name = 'x';
        "#,
        )
        .unwrap();

        assert!(output.contains("Error"));
    }

    #[test]
    fn reuses_state_across_scripts_against_the_same_context() {
        let mut ctx = TestContext::new().unwrap();

        run_sql_script_with_context("CREATE TABLE users (id INT, name TEXT);", &mut ctx).unwrap();

        let output =
            run_sql_script_with_context("INSERT INTO users VALUES (1, 'Alice');", &mut ctx)
                .unwrap();
        assert!(output.contains("1 row inserted into users"));
    }
}
