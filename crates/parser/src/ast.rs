use expr::Expr;

/// A parsed statement in the supported dialect (§4.6): `SELECT`, `INSERT`,
/// `CREATE TABLE`, plus pass-through stubs for `UPDATE`, `DELETE`, `DROP`,
/// `ALTER`, and `CREATE INDEX` that parse successfully but are not lowered
/// by the planner/executor (see the Open Question resolution in
/// `DESIGN.md`: all five surface `UnsupportedQueryType` at execution time).
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    CreateTable {
        name: String,
        columns: Vec<ColumnDef>,
    },
    Insert {
        table: String,
        values: Vec<Expr>,
    },
    Select {
        columns: SelectItem,
        table: String,
        selection: Option<Expr>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Expr)>,
        selection: Option<Expr>,
    },
    Delete {
        table: String,
        selection: Option<Expr>,
    },
    DropTable {
        name: String,
    },
    AlterTable {
        name: String,
    },
    CreateIndex {
        name: String,
        table: String,
        column: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: String,
}

/// The projection list of a `SELECT`: either `*` or an explicit,
/// comma-separated column list (possibly qualified `table.col`).
#[derive(Clone, Debug, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Columns(Vec<(Option<String>, String)>),
}
