use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::{postgres::PgRow, FromRow, Postgres};

/// A value destined for a positional placeholder.
///
/// Every user-supplied value reaches SQL through one of these; fragment
/// strings only ever carry identifiers and placeholder tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Float(f64),
    Text(String),
    TextArray(Vec<String>),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Json(Value),
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::BigInt(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<Vec<String>> for SqlValue {
    fn from(v: Vec<String>) -> Self {
        SqlValue::TextArray(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<Value> for SqlValue {
    fn from(v: Value) -> Self {
        SqlValue::Json(v)
    }
}

/// Allocates `$N` placeholders over an append-only parameter list.
///
/// The token returned by [`ParamBinder::bind`] always names the 1-based
/// position of the value just appended, so tokens never alias and stay
/// aligned with the argument list whatever order clauses are added in.
#[derive(Debug, Clone, Default)]
pub struct ParamBinder {
    params: Vec<SqlValue>,
}

impl ParamBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, value: impl Into<SqlValue>) -> String {
        self.params.push(value.into());
        format!("${}", self.params.len())
    }

    pub fn bind_all<I, V>(&mut self, values: I) -> Vec<String>
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        values.into_iter().map(|v| self.bind(v)).collect()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn into_params(self) -> Vec<SqlValue> {
        self.params
    }
}

/// Final SQL text plus its positionally aligned arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

pub(crate) fn bind_query_as<'q, O>(
    mut q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    params: &[SqlValue],
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    for p in params {
        q = match p.clone() {
            SqlValue::Bool(b) => q.bind(b),
            SqlValue::Int(i) => q.bind(i),
            SqlValue::BigInt(i) => q.bind(i),
            SqlValue::Float(f) => q.bind(f),
            SqlValue::Text(s) => q.bind(s),
            SqlValue::TextArray(v) => q.bind(v),
            SqlValue::Timestamp(t) => q.bind(t),
            SqlValue::Date(d) => q.bind(d),
            SqlValue::Json(v) => q.bind(v),
        };
    }
    q
}

pub(crate) fn bind_query_scalar<'q, O>(
    mut q: sqlx::query::QueryScalar<'q, Postgres, O, PgArguments>,
    params: &[SqlValue],
) -> sqlx::query::QueryScalar<'q, Postgres, O, PgArguments> {
    for p in params {
        q = match p.clone() {
            SqlValue::Bool(b) => q.bind(b),
            SqlValue::Int(i) => q.bind(i),
            SqlValue::BigInt(i) => q.bind(i),
            SqlValue::Float(f) => q.bind(f),
            SqlValue::Text(s) => q.bind(s),
            SqlValue::TextArray(v) => q.bind(v),
            SqlValue::Timestamp(t) => q.bind(t),
            SqlValue::Date(d) => q.bind(d),
            SqlValue::Json(v) => q.bind(v),
        };
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_follow_list_length() {
        let mut binder = ParamBinder::new();
        assert_eq!(binder.bind("a"), "$1");
        assert_eq!(binder.bind(2), "$2");
        assert_eq!(binder.bind_all(vec!["x", "y"]), vec!["$3", "$4"]);
        assert_eq!(binder.len(), 4);
        assert_eq!(binder.params()[2], SqlValue::Text("x".to_string()));
    }

    #[test]
    fn bind_all_of_nothing_allocates_nothing() {
        let mut binder = ParamBinder::new();
        let tokens = binder.bind_all(Vec::<i32>::new());
        assert!(tokens.is_empty());
        assert!(binder.is_empty());
        assert_eq!(binder.bind(true), "$1");
    }
}
