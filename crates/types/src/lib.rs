use std::cmp::Ordering;

/// A column's declared SQL type, kept as the literal keyword text seen in
/// `CREATE TABLE` so the catalog can echo back exactly what the user wrote.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    Int,
    Float,
    Text,
    Bool,
}

impl SqlType {
    /// The uppercase keyword spelling stored in catalog metadata.
    pub fn keyword(&self) -> &'static str {
        match self {
            SqlType::Int => "INTEGER",
            SqlType::Float => "FLOAT",
            SqlType::Text => "TEXT",
            SqlType::Bool => "BOOLEAN",
        }
    }

    /// Parses a `CREATE TABLE` column type keyword, case-insensitively,
    /// accepting both the canonical spelling and common synonyms (`INT`,
    /// `VARCHAR`, `BOOL`). Returns `None` for anything else.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" => Some(SqlType::Int),
            "FLOAT" | "DOUBLE" | "REAL" => Some(SqlType::Float),
            "TEXT" | "VARCHAR" | "STRING" => Some(SqlType::Text),
            "BOOLEAN" | "BOOL" => Some(SqlType::Bool),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_same_type(other).unwrap_or(false)
    }
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Compares two values of the same logical family. `Int` and `Float`
    /// are considered the same family: the integer side is promoted to
    /// `f64` before comparing. Any other cross-type pair returns `None`.
    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Float(_), Value::Float(_))
            | (Value::Int(_), Value::Float(_))
            | (Value::Float(_), Value::Int(_)) => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                Some(a.total_cmp(&b))
            }
            _ => None,
        }
    }

    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        self.cmp_same_type(other).map(|o| o == Ordering::Equal)
    }
}
