//! The seam between capability probes and whatever reaches a backend node.
//!
//! Connection pooling, wire protocol, and master/replica routing live behind
//! [`NodeConnection`]. Probes only see rows of optional text cells and SQL
//! errors carrying SQLSTATE, vendor code, and message.

use thiserror::Error;

/// Which replica a query may be served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadRoute {
    /// Must hit the primary (version and lower-case mode are read here).
    Master,
    /// Any replica will do.
    Any,
}

impl std::fmt::Display for ReadRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadRoute::Master => write!(f, "master"),
            ReadRoute::Any => write!(f, "any"),
        }
    }
}

/// One result row. `None` cells are SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    cells: Vec<Option<String>>,
}

impl Row {
    pub fn new(cells: Vec<Option<String>>) -> Self {
        Row { cells }
    }

    /// Build a row with no NULL cells.
    pub fn from_strs<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Row {
            cells: cells.into_iter().map(|c| Some(c.into())).collect(),
        }
    }

    /// Zero-based cell access. Out-of-range and NULL both yield `None`.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).and_then(|c| c.as_deref())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A server-side SQL error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{sql_state}] ({vendor_code}) {message}")]
pub struct SqlError {
    pub sql_state: String,
    pub vendor_code: i32,
    pub message: String,
}

impl SqlError {
    pub fn new(sql_state: impl Into<String>, vendor_code: i32, message: impl Into<String>) -> Self {
        SqlError {
            sql_state: sql_state.into(),
            vendor_code,
            message: message.into(),
        }
    }

    /// SQLSTATE compared case-insensitively, code exactly, message by substring.
    pub fn matches(&self, sql_state: &str, vendor_code: i32, message_fragment: &str) -> bool {
        self.sql_state.eq_ignore_ascii_case(sql_state)
            && self.vendor_code == vendor_code
            && self.message.contains(message_fragment)
    }
}

/// Failure to execute a query on a node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("sql error {0}")]
    Sql(#[from] SqlError),

    #[error("connection lost: {0}")]
    ConnectionLost(String),
}

/// A live connection (or pool handle) to one backend node.
pub trait NodeConnection: Send + Sync {
    /// Run a read-only query and return every row.
    fn query(&self, sql: &str, route: ReadRoute) -> Result<Vec<Row>, ExecError>;
}

impl<T: NodeConnection + ?Sized> NodeConnection for std::sync::Arc<T> {
    fn query(&self, sql: &str, route: ReadRoute) -> Result<Vec<Row>, ExecError> {
        (**self).query(sql, route)
    }
}

impl<T: NodeConnection + ?Sized> NodeConnection for Box<T> {
    fn query(&self, sql: &str, route: ReadRoute) -> Result<Vec<Row>, ExecError> {
        (**self).query(sql, route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_access() {
        let row = Row::new(vec![Some("a".into()), None]);
        assert_eq!(row.get(0), Some("a"));
        assert_eq!(row.get(1), None);
        assert_eq!(row.get(2), None);
        assert_eq!(row.len(), 2);
        assert!(Row::default().is_empty());
    }

    #[test]
    fn test_sql_error_matches() {
        let err = SqlError::new(
            "42000",
            1305,
            "PROCEDURE dbms_admin.show_native_procedure does not exist",
        );
        assert!(err.matches("42000", 1305, "does not exist"));
        assert!(!err.matches("42000", 1306, "does not exist"));
        assert!(!err.matches("HY000", 1305, "does not exist"));
        assert!(!err.matches("42000", 1305, "not supported"));

        let lower = SqlError::new("hy000", 3130, "x");
        assert!(lower.matches("HY000", 3130, "x"));
    }

    #[test]
    fn test_exec_error_display() {
        let err = ExecError::from(SqlError::new("HY000", 2013, "Lost connection"));
        assert_eq!(err.to_string(), "sql error [HY000] (2013) Lost connection");
    }
}
