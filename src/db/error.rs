use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Failure reasons surfaced by every adapter operation.
///
/// Adapters never retry; each failure is returned once with its kind and the
/// engine's message attached.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Not connected to a database server")]
    NotConnected,

    #[error("No database selected")]
    NoDatabaseSelected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(QueryError),

    #[error("Operation timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Invalid connection parameters: {0}")]
    InvalidParameters(String),
}

/// Copyable discriminant of [`AdapterError`] for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotConnected,
    NoDatabaseSelected,
    ConnectionFailed,
    QueryFailed,
    Timeout,
    InvalidParameters,
}

impl AdapterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::NotConnected => ErrorKind::NotConnected,
            AdapterError::NoDatabaseSelected => ErrorKind::NoDatabaseSelected,
            AdapterError::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            AdapterError::QueryFailed(_) => ErrorKind::QueryFailed,
            AdapterError::Timeout(_) => ErrorKind::Timeout,
            AdapterError::InvalidParameters(_) => ErrorKind::InvalidParameters,
        }
    }

    pub fn query_failed(msg: impl Into<String>) -> Self {
        AdapterError::QueryFailed(QueryError::from_string(msg.into()))
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AdapterError::InvalidParameters(msg.into())
    }
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Categorized error types for SQL query failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Syntax errors (SQLSTATE 42601 / 42000)
    Syntax,
    /// Semantic errors (missing table/column, ambiguous reference)
    Semantic,
    /// Execution/runtime errors (division by zero, constraint violation)
    Execution,
    /// Transaction state errors (e.g., transaction aborted)
    Transaction,
    /// Connection/communication errors
    Connection,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Syntax => write!(f, "Syntax Error"),
            ErrorCategory::Semantic => write!(f, "Semantic Error"),
            ErrorCategory::Execution => write!(f, "Execution Error"),
            ErrorCategory::Transaction => write!(f, "Transaction Error"),
            ErrorCategory::Connection => write!(f, "Connection Error"),
            ErrorCategory::Unknown => write!(f, "Error"),
        }
    }
}

/// Engine error attached to [`AdapterError::QueryFailed`].
///
/// Both engines report SQLSTATE codes, so the category is derived the same
/// way for PostgreSQL and MySQL. Line/column are only known for PostgreSQL,
/// which reports the byte position of the offending token.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryError {
    pub category: ErrorCategory,
    /// SQLSTATE code (e.g., "42601"), empty when the driver reported none
    pub code: String,
    /// Primary error message, verbatim from the engine
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    /// 1-based line of the error position, if available
    pub line: Option<usize>,
    /// 1-based column of the error position, if available
    pub col: Option<usize>,
}

impl QueryError {
    /// Build from a tokio_postgres error, using the query text to turn the
    /// reported byte position into a line/column pair.
    pub fn from_pg_error(err: &tokio_postgres::Error, query: &str) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let code = db_err.code().code().to_string();
            let position = db_err.position().and_then(|p| match p {
                tokio_postgres::error::ErrorPosition::Original(pos) => Some(*pos),
                tokio_postgres::error::ErrorPosition::Internal { .. } => None,
            });
            let (line, col) = match position {
                Some(pos) => byte_offset_to_line_col(query, pos as usize),
                None => (None, None),
            };

            QueryError {
                category: categorize_sqlstate(&code),
                code,
                message: db_err.message().to_string(),
                detail: db_err.detail().map(|s| s.to_string()),
                hint: db_err.hint().map(|s| s.to_string()),
                line,
                col,
            }
        } else {
            // Non-database error (connection, protocol, etc.)
            let category = if err.source().is_some() {
                ErrorCategory::Connection
            } else {
                ErrorCategory::Unknown
            };
            QueryError {
                category,
                code: String::new(),
                message: err.to_string(),
                detail: err.source().map(|e| e.to_string()),
                hint: None,
                line: None,
                col: None,
            }
        }
    }

    pub fn from_sqlx_error(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
                QueryError {
                    category: categorize_sqlstate(&code),
                    code,
                    message: db_err.message().to_string(),
                    detail: None,
                    hint: None,
                    line: None,
                    col: None,
                }
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => QueryError {
                category: ErrorCategory::Connection,
                ..QueryError::from_string(err.to_string())
            },
            other => QueryError::from_string(other.to_string()),
        }
    }

    /// Create a simple error from a plain string (for non-database errors).
    pub fn from_string(msg: String) -> Self {
        QueryError {
            category: ErrorCategory::Unknown,
            code: String::new(),
            message: msg,
            detail: None,
            hint: None,
            line: None,
            col: None,
        }
    }

    /// Format as a rich multi-line string for a results panel.
    pub fn display_full(&self) -> String {
        let mut lines = vec![format!("{}: {}", self.category, self.message)];

        if let (Some(line), Some(col)) = (self.line, self.col) {
            lines.push(format!("  at line {}, column {}", line, col));
        }
        if !self.code.is_empty() {
            lines.push(format!("  SQLSTATE: {}", self.code));
        }
        if let Some(detail) = &self.detail {
            lines.push(format!("  Detail: {}", detail));
        }
        if let Some(hint) = &self.hint {
            lines.push(format!("  Hint: {}", hint));
        }

        lines.join("\n")
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Convert a 1-based byte offset in a query string to (line, column) both 1-based.
fn byte_offset_to_line_col(query: &str, byte_pos: usize) -> (Option<usize>, Option<usize>) {
    if byte_pos == 0 || query.is_empty() {
        return (Some(1), Some(1));
    }
    let target = (byte_pos - 1).min(query.len());
    let mut line = 1usize;
    let mut col = 1usize;
    for (i, ch) in query.char_indices() {
        if i >= target {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (Some(line), Some(col))
}

/// Categorize a SQLSTATE code into an ErrorCategory.
fn categorize_sqlstate(code: &str) -> ErrorCategory {
    if code.len() < 2 {
        return ErrorCategory::Unknown;
    }
    match &code[..2] {
        "42" => {
            if code == "42601" || code == "42000" {
                ErrorCategory::Syntax
            } else {
                ErrorCategory::Semantic
            }
        }
        "22" | "23" | "53" | "54" | "55" | "57" => ErrorCategory::Execution,
        "25" | "40" => ErrorCategory::Transaction,
        "08" => ErrorCategory::Connection,
        _ => ErrorCategory::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(AdapterError::NotConnected.kind(), ErrorKind::NotConnected);
        assert_eq!(
            AdapterError::NoDatabaseSelected.kind(),
            ErrorKind::NoDatabaseSelected
        );
        assert_eq!(
            AdapterError::ConnectionFailed("refused".into()).kind(),
            ErrorKind::ConnectionFailed
        );
        assert_eq!(
            AdapterError::query_failed("boom").kind(),
            ErrorKind::QueryFailed
        );
        assert_eq!(
            AdapterError::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            AdapterError::invalid("bad").kind(),
            ErrorKind::InvalidParameters
        );
    }

    #[test]
    fn test_error_messages_carry_engine_text() {
        let err = AdapterError::query_failed("relation \"users\" does not exist");
        assert_eq!(
            err.to_string(),
            "Query failed: relation \"users\" does not exist"
        );
        let err = AdapterError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Operation timed out after 1.5s");
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Syntax.to_string(), "Syntax Error");
        assert_eq!(ErrorCategory::Semantic.to_string(), "Semantic Error");
        assert_eq!(ErrorCategory::Connection.to_string(), "Connection Error");
        assert_eq!(ErrorCategory::Unknown.to_string(), "Error");
    }

    #[test]
    fn test_categorize_sqlstate() {
        assert_eq!(categorize_sqlstate("42601"), ErrorCategory::Syntax);
        // MySQL reports ER_PARSE_ERROR as 42000
        assert_eq!(categorize_sqlstate("42000"), ErrorCategory::Syntax);
        assert_eq!(categorize_sqlstate("42P01"), ErrorCategory::Semantic);
        assert_eq!(categorize_sqlstate("42S02"), ErrorCategory::Semantic);
        assert_eq!(categorize_sqlstate("23505"), ErrorCategory::Execution);
        assert_eq!(categorize_sqlstate("40001"), ErrorCategory::Transaction);
        assert_eq!(categorize_sqlstate("08006"), ErrorCategory::Connection);
        assert_eq!(categorize_sqlstate("XX000"), ErrorCategory::Unknown);
        assert_eq!(categorize_sqlstate(""), ErrorCategory::Unknown);
    }

    #[test]
    fn test_byte_offset_to_line_col() {
        let query = "SELECT *\nFROM users\nWHERE id = 1";
        assert_eq!(byte_offset_to_line_col(query, 1), (Some(1), Some(1)));
        assert_eq!(byte_offset_to_line_col(query, 10), (Some(2), Some(1)));
        assert_eq!(byte_offset_to_line_col(query, 21), (Some(3), Some(1)));
    }

    #[test]
    fn test_display_full() {
        let err = QueryError {
            category: ErrorCategory::Syntax,
            code: "42601".to_string(),
            message: "syntax error at or near \",\"".to_string(),
            detail: None,
            hint: Some("Remove trailing comma.".to_string()),
            line: Some(3),
            col: Some(1),
        };
        let full = err.display_full();
        assert!(full.starts_with("Syntax Error: syntax error"));
        assert!(full.contains("at line 3, column 1"));
        assert!(full.contains("SQLSTATE: 42601"));
        assert!(full.contains("Hint: Remove trailing comma."));
    }

    #[test]
    fn test_from_sqlx_non_database_error() {
        let err = QueryError::from_sqlx_error(&sqlx::Error::PoolClosed);
        assert_eq!(err.category, ErrorCategory::Connection);
        assert!(err.code.is_empty());
    }
}
