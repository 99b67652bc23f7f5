// Query Request / Result Set Domain Model

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Positional parameter or column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One logical statement submitted to the executor
///
/// `timeout` and `max_retries` fall back to the executor defaults
/// (15s / 2 retries) when unset.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub sql: String,
    pub params: Vec<Value>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            timeout: None,
            max_retries: None,
        }
    }

    /// Append a positional parameter
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Rows returned by a successful statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at (row, column name), if both exist
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder_keeps_param_order() {
        let req = QueryRequest::new("SELECT * FROM t WHERE a = ? AND b = ?")
            .bind(7)
            .bind("x")
            .bind(None::<i64>)
            .with_max_retries(0);

        assert_eq!(
            req.params,
            vec![Value::Integer(7), Value::Text("x".into()), Value::Null]
        );
        assert_eq!(req.max_retries, Some(0));
        assert_eq!(req.timeout, None);
    }

    #[test]
    fn test_untagged_values_from_json() {
        let params: Vec<Value> =
            serde_json::from_str(r#"[null, true, 42, 1.5, "hello"]"#).unwrap();
        assert_eq!(
            params,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Integer(42),
                Value::Real(1.5),
                Value::Text("hello".into()),
            ]
        );
    }

    #[test]
    fn test_result_set_lookup_by_column() {
        let rs = ResultSet::new(
            vec!["id".into(), "name".into()],
            vec![vec![Value::Integer(1), Value::Text("alice".into())]],
        );
        assert_eq!(rs.get(0, "name"), Some(&Value::Text("alice".into())));
        assert_eq!(rs.get(0, "missing"), None);
        assert_eq!(rs.get(1, "id"), None);
    }
}
