/// Normalized description of one table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Engine-native type name, e.g. `numeric`, `character varying`, `int`
    pub data_type: String,
    /// From the catalog's `IS_NULLABLE`, which is `NOT NULL` in both engines,
    /// so nullability is always known.
    pub is_nullable: bool,
    /// `None` when the column has no default; an empty-string default stays `Some("")`
    pub default_value: Option<String>,
    /// `(255)` for character length or `(10,2)` for precision/scale
    pub type_info: Option<String>,
    pub ordinal_position: i32,
    pub is_primary_key: bool,
}

impl ColumnInfo {
    /// Declared type with its annotation, e.g. `numeric(10,2)`.
    pub fn full_type(&self) -> String {
        match &self.type_info {
            Some(info) => format!("{}{}", self.data_type, info),
            None => self.data_type.clone(),
        }
    }
}

/// Derive the `(n)` / `(p,s)` annotation from catalog length and precision
/// columns.
///
/// Character length wins when present. Precision/scale is only shown for
/// exact numeric types; integer and float columns also report a precision in
/// the information schema, but it is implied by the type.
pub fn derive_type_info(
    data_type: &str,
    char_max_length: Option<i64>,
    numeric_precision: Option<i64>,
    numeric_scale: Option<i64>,
) -> Option<String> {
    if let Some(len) = char_max_length {
        return Some(format!("({})", len));
    }
    let base = data_type.trim().to_ascii_lowercase();
    if matches!(base.as_str(), "numeric" | "decimal") {
        if let Some(precision) = numeric_precision {
            return Some(format!("({},{})", precision, numeric_scale.unwrap_or(0)));
        }
    }
    None
}

/// Split `schema.table` into its parts; an unqualified name yields `None` for the schema.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, table)) if !schema.is_empty() && !table.is_empty() => (Some(schema), table),
        _ => (None, name),
    }
}

/// Parse the information schema's `YES` / `NO` nullability flag.
///
/// PostgreSQL and MySQL both declare `IS_NULLABLE` as a non-null `YES`/`NO`
/// column, so `None` only shows up if a catalog view breaks that contract. It
/// is read as nullable, the SQL default for a column without a NOT NULL
/// constraint.
pub fn parse_nullable(flag: Option<&str>) -> bool {
    !matches!(flag.map(str::trim), Some(f) if f.eq_ignore_ascii_case("NO"))
}
