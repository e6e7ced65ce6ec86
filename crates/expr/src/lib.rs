//! WHERE-clause expression tree shared by the parser, planner, and executor.
//!
//! Expressions are evaluated against a row given its schema (an ordered list
//! of column names, possibly qualified as `table.column`). The planner also
//! inspects the tree directly (without evaluating it) to drive predicate
//! pushdown and index selection — see `planner`.


use common::{DbError, DbResult, Row};
use types::Value;

/// Binary comparison and logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        !matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Unary operators (currently just logical NOT).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Not,
}

/// Expression abstract syntax tree covering the WHERE-clause subset named in
/// the supported dialect: `=`, `!=`, `<`, `<=`, `>`, `>=`, `BETWEEN`, `IN`,
/// `LIKE`, over a qualified or unqualified column.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Literal(Value),
    /// Column reference, optionally qualified by table name or alias.
    Column {
        table: Option<String>,
        name: String,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// The column this predicate constrains, if it is a simple
    /// `column <op> literal`-shaped comparison (or `BETWEEN`/`IN`/`LIKE`
    /// against a column). Returns `None` for conjunctions and anything not
    /// shaped as a single-column predicate — the planner only pushes down
    /// and selects indexes for predicates of this shape.
    pub fn predicate_column(&self) -> Option<(&Option<String>, &str)> {
        match self {
            Expr::Binary { left, op, right } if op.is_comparison() => match (&**left, &**right) {
                (Expr::Column { table, name }, _) => Some((table, name.as_str())),
                (_, Expr::Column { table, name }) => Some((table, name.as_str())),
                _ => None,
            },
            Expr::Between { expr, .. } | Expr::InList { expr, .. } | Expr::Like { expr, .. } => {
                match &**expr {
                    Expr::Column { table, name } => Some((table, name.as_str())),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Rewrites every column reference qualified with `table` to an
    /// unqualified reference to the same name, leaving other qualifiers and
    /// unqualified references untouched. Used by predicate pushdown to move
    /// a `table.col` predicate into that table's own scan.
    pub fn unqualify(&self, table: &str) -> Expr {
        match self {
            Expr::Literal(v) => Expr::Literal(v.clone()),
            Expr::Column { table: t, name } => {
                if t.as_deref() == Some(table) {
                    Expr::column(name.clone())
                } else {
                    Expr::Column {
                        table: t.clone(),
                        name: name.clone(),
                    }
                }
            }
            Expr::Unary { op, expr } => Expr::Unary {
                op: *op,
                expr: Box::new(expr.unqualify(table)),
            },
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(left.unqualify(table)),
                op: *op,
                right: Box::new(right.unqualify(table)),
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Expr::Between {
                expr: Box::new(expr.unqualify(table)),
                low: Box::new(low.unqualify(table)),
                high: Box::new(high.unqualify(table)),
                negated: *negated,
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr: Box::new(expr.unqualify(table)),
                list: list.iter().map(|e| e.unqualify(table)).collect(),
                negated: *negated,
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => Expr::Like {
                expr: Box::new(expr.unqualify(table)),
                pattern: Box::new(pattern.unqualify(table)),
                negated: *negated,
            },
        }
    }
}

/// Evaluation context: the row schema (column names in order, as they
/// appear in a `ResultSet`/executor row — either plain or `table.column`).
pub struct EvalContext<'a> {
    pub schema: &'a [String],
}

impl<'a> EvalContext<'a> {
    pub fn eval(&self, expr: &Expr, row: &Row) -> DbResult<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Column { table, name } => {
                let idx = self.find_column(table.as_deref(), name)?;
                Ok(row.values[idx].clone())
            }
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, row)?;
                match op {
                    UnaryOp::Not => {
                        let b = v
                            .as_bool()
                            .ok_or_else(|| DbError::InvalidPlan(format!("NOT expects bool, got {v:?}")))?;
                        Ok(Value::Bool(!b))
                    }
                }
            }
            Expr::Binary { left, op, right } => {
                let lv = self.eval(left, row)?;
                let rv = self.eval(right, row)?;
                self.eval_binary(&lv, *op, &rv)
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let v = self.eval(expr, row)?;
                let lo = self.eval(low, row)?;
                let hi = self.eval(high, row)?;
                let ge_lo = v.cmp_same_type(&lo).map(|o| o != std::cmp::Ordering::Less);
                let le_hi = v.cmp_same_type(&hi).map(|o| o != std::cmp::Ordering::Greater);
                let (ge_lo, le_hi) = (
                    ge_lo.ok_or_else(|| DbError::InvalidPlan("BETWEEN type mismatch".into()))?,
                    le_hi.ok_or_else(|| DbError::InvalidPlan("BETWEEN type mismatch".into()))?,
                );
                let result = ge_lo && le_hi;
                Ok(Value::Bool(result != *negated))
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let v = self.eval(expr, row)?;
                let mut found = false;
                for item in list {
                    let iv = self.eval(item, row)?;
                    if v.eq_same_type(&iv).unwrap_or(false) {
                        found = true;
                        break;
                    }
                }
                Ok(Value::Bool(found != *negated))
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let v = self.eval(expr, row)?;
                let p = self.eval(pattern, row)?;
                let (Value::Text(v), Value::Text(p)) = (&v, &p) else {
                    return Err(DbError::InvalidPlan("LIKE expects text operands".into()));
                };
                let result = like_matches(v, p);
                Ok(Value::Bool(result != *negated))
            }
        }
    }

    fn eval_binary(&self, l: &Value, op: BinaryOp, r: &Value) -> DbResult<Value> {
        use BinaryOp::*;

        if matches!(op, And | Or) {
            let lb = l
                .as_bool()
                .ok_or_else(|| DbError::InvalidPlan(format!("AND/OR expects bools, got {l:?}")))?;
            let rb = r
                .as_bool()
                .ok_or_else(|| DbError::InvalidPlan(format!("AND/OR expects bools, got {r:?}")))?;
            return Ok(Value::Bool(match op {
                And => lb && rb,
                Or => lb || rb,
                _ => unreachable!(),
            }));
        }

        let ord = l
            .cmp_same_type(r)
            .ok_or_else(|| DbError::InvalidPlan(format!("incompatible types for {op:?}: {l:?}, {r:?}")))?;

        let result = match op {
            Eq => ord == std::cmp::Ordering::Equal,
            Ne => ord != std::cmp::Ordering::Equal,
            Lt => ord == std::cmp::Ordering::Less,
            Le => ord != std::cmp::Ordering::Greater,
            Gt => ord == std::cmp::Ordering::Greater,
            Ge => ord != std::cmp::Ordering::Less,
            And | Or => unreachable!(),
        };

        Ok(Value::Bool(result))
    }

    /// Finds a column by name, supporting qualified (`table.col`) and
    /// unqualified references. An unqualified reference matches a plain
    /// name or the suffix `.col` of a qualified schema entry.
    fn find_column(&self, table: Option<&str>, name: &str) -> DbResult<usize> {
        if let Some(qualifier) = table {
            let full_name = format!("{qualifier}.{name}");
            self.schema
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&full_name))
                .ok_or_else(|| DbError::InvalidPlan(format!("unknown column '{qualifier}.{name}'")))
        } else {
            self.schema
                .iter()
                .position(|c| {
                    c.eq_ignore_ascii_case(name)
                        || c.to_lowercase().ends_with(&format!(".{}", name.to_lowercase()))
                })
                .ok_or_else(|| DbError::InvalidPlan(format!("unknown column '{name}'")))
        }
    }
}

/// `%`/`_` SQL LIKE matching (`%` = any run of characters, `_` = exactly one).
fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    like_rec(&text, &pattern)
}

fn like_rec(text: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('%') => like_rec(text, &pattern[1..]) || (!text.is_empty() && like_rec(&text[1..], pattern)),
        Some('_') => !text.is_empty() && like_rec(&text[1..], &pattern[1..]),
        Some(c) => text.first() == Some(c) && like_rec(&text[1..], &pattern[1..]),
    }
}
