use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;

/// Coarse statement kind, decided from the leading keyword only.
///
/// Statements that are row-returning but start with another keyword (a CTE
/// opening with `WITH`, a bare `VALUES (...)`, PostgreSQL's `TABLE t`) are
/// `Unknown` and take the effect-only path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Show,
    Explain,
    Describe,
    Use,
    Unknown,
}

const KEYWORDS: &[(&str, QueryKind)] = &[
    ("SELECT", QueryKind::Select),
    ("INSERT", QueryKind::Insert),
    ("UPDATE", QueryKind::Update),
    ("DELETE", QueryKind::Delete),
    ("CREATE", QueryKind::Create),
    ("ALTER", QueryKind::Alter),
    ("DROP", QueryKind::Drop),
    ("SHOW", QueryKind::Show),
    ("EXPLAIN", QueryKind::Explain),
    ("DESCRIBE", QueryKind::Describe),
    ("DESC", QueryKind::Describe),
    ("USE", QueryKind::Use),
];

impl QueryKind {
    /// Whether statements of this kind go through the row-producing call.
    pub fn returns_rows(&self) -> bool {
        matches!(
            self,
            QueryKind::Select | QueryKind::Show | QueryKind::Explain | QueryKind::Describe
        )
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryKind::Select => "SELECT",
            QueryKind::Insert => "INSERT",
            QueryKind::Update => "UPDATE",
            QueryKind::Delete => "DELETE",
            QueryKind::Create => "CREATE",
            QueryKind::Alter => "ALTER",
            QueryKind::Drop => "DROP",
            QueryKind::Show => "SHOW",
            QueryKind::Explain => "EXPLAIN",
            QueryKind::Describe => "DESCRIBE",
            QueryKind::Use => "USE",
            QueryKind::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Classify raw SQL text by its leading keyword.
///
/// The keyword must be followed by a non-identifier character (or the end of
/// the text), so `SELECTION` or `USERS` do not match.
pub fn classify(sql: &str) -> QueryKind {
    let upper = sql.trim().to_uppercase();
    for (keyword, kind) in KEYWORDS {
        if let Some(rest) = upper.strip_prefix(keyword) {
            let boundary = rest
                .chars()
                .next()
                .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));
            if boundary {
                return *kind;
            }
        }
    }
    QueryKind::Unknown
}

/// Database named by a `USE <db>` statement, with quoting and a trailing
/// semicolon removed.
pub fn use_target(sql: &str) -> Option<String> {
    if classify(sql) != QueryKind::Use {
        return None;
    }
    let rest = sql.trim().get(3..)?.trim().trim_end_matches(';').trim();
    let name = rest
        .strip_prefix('`')
        .and_then(|r| r.strip_suffix('`'))
        .map(|r| r.replace("``", "`"))
        .or_else(|| {
            rest.strip_prefix('"')
                .and_then(|r| r.strip_suffix('"'))
                .map(|r| r.replace("\"\"", "\""))
        })
        .unwrap_or_else(|| rest.to_string());
    let quoted = rest.starts_with(['`', '"']);
    if name.is_empty() || (!quoted && name.chars().any(char::is_whitespace)) {
        return None;
    }
    Some(name)
}

/// A normalized cell value.
///
/// Driver-native nulls become [`CellValue::Null`] and byte buffers become
/// `Text` (either decoded or the binary placeholder); raw driver types never
/// leave the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
}

impl CellValue {
    pub fn display(&self) -> String {
        match self {
            CellValue::Null => "NULL".to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Int(i) => i.to_string(),
            CellValue::UInt(u) => u.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Decimal(d) => d.to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }
}

impl From<Option<Vec<u8>>> for CellValue {
    fn from(value: Option<Vec<u8>>) -> Self {
        match value {
            Some(bytes) => normalize_bytes(&bytes),
            None => CellValue::Null,
        }
    }
}

/// How many leading bytes the binary heuristic inspects.
const BINARY_SAMPLE_LEN: usize = 100;

/// Heuristic binary check: more than one sixth of the first 100 bytes are
/// control characters other than tab, CR and LF.
pub fn looks_binary(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(BINARY_SAMPLE_LEN)];
    if sample.is_empty() {
        return false;
    }
    let control = sample
        .iter()
        .filter(|&&b| b < 32 && !matches!(b, b'\t' | b'\r' | b'\n'))
        .count();
    control * 6 > sample.len()
}

/// Render a byte buffer either as text or as a `[BINARY DATA n bytes]` placeholder.
pub fn normalize_bytes(bytes: &[u8]) -> CellValue {
    if looks_binary(bytes) {
        CellValue::Text(format!("[BINARY DATA {} bytes]", bytes.len()))
    } else {
        CellValue::Text(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Column name used by effect-only results.
pub const EFFECT_COLUMN: &str = "Result";

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    /// Every row has exactly `columns.len()` cells.
    pub rows: Vec<Vec<CellValue>>,
    /// One-line summary, e.g. "12 rows returned" or "3 rows affected".
    pub message: String,
    pub execution_time: Duration,
    pub affected_rows: Option<u64>,
    pub last_insert_id: Option<u64>,
}

impl QueryResult {
    /// Result of a row-returning statement.
    pub fn rows(columns: Vec<String>, rows: Vec<Vec<CellValue>>, execution_time: Duration) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        let message = format!("{} returned", plural(rows.len() as u64));
        Self {
            columns,
            rows,
            message,
            execution_time,
            affected_rows: None,
            last_insert_id: None,
        }
    }

    /// Result of an effect-only statement: one row, one column holding the message.
    pub fn affected(
        affected: u64,
        last_insert_id: Option<u64>,
        execution_time: Duration,
    ) -> Self {
        let mut message = format!("{} affected", plural(affected));
        let last_insert_id = last_insert_id.filter(|id| *id > 0);
        if let Some(id) = last_insert_id {
            message.push_str(&format!(", last insert id {}", id));
        }
        Self::message_only(message, execution_time, Some(affected), last_insert_id)
    }

    /// One-row, one-column result carrying only a status message.
    pub fn status(message: impl Into<String>, execution_time: Duration) -> Self {
        Self::message_only(message.into(), execution_time, None, None)
    }

    fn message_only(
        message: String,
        execution_time: Duration,
        affected_rows: Option<u64>,
        last_insert_id: Option<u64>,
    ) -> Self {
        Self {
            columns: vec![EFFECT_COLUMN.to_string()],
            rows: vec![vec![CellValue::Text(message.clone())]],
            message,
            execution_time,
            affected_rows,
            last_insert_id,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn plural(n: u64) -> String {
    if n == 1 {
        "1 row".to_string()
    } else {
        format!("{} rows", n)
    }
}
