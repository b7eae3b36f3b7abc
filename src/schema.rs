//! Schema vocabulary shared by desired specs and introspected live models.
//!
//! Both sides of a diff are expressed with these types: the desired document
//! is lowered into a [`TableSchema`] and the introspectors produce the same
//! shape, so the planner compares like with like.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column types supported by the declarative vocabulary.
///
/// The spec-facing token (`varchar(255)`, `decimal(10,2)`, ...) is the
/// canonical form; per-dialect native names live in the dialect modules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Small integer (16-bit).
    SmallInt,
    /// Unbounded text.
    Text,
    /// Variable-length character string.
    Varchar(u32),
    /// Fixed-length character string.
    Char(u32),
    /// Boolean.
    Boolean,
    /// Date and time without time zone.
    Timestamp,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Floating point (single precision).
    Real,
    /// Floating point (double precision).
    Double,
    /// Decimal with precision and scale.
    Decimal(u8, u8),
    /// Binary data.
    Blob,
    /// JSON data.
    Json,
    /// UUID.
    Uuid,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::BigInt => write!(f, "bigint"),
            Self::SmallInt => write!(f, "smallint"),
            Self::Text => write!(f, "text"),
            Self::Varchar(n) => write!(f, "varchar({})", n),
            Self::Char(n) => write!(f, "char({})", n),
            Self::Boolean => write!(f, "boolean"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Date => write!(f, "date"),
            Self::Time => write!(f, "time"),
            Self::Real => write!(f, "real"),
            Self::Double => write!(f, "double"),
            Self::Decimal(p, s) => write!(f, "decimal({},{})", p, s),
            Self::Blob => write!(f, "blob"),
            Self::Json => write!(f, "json"),
            Self::Uuid => write!(f, "uuid"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim().to_ascii_lowercase();
        let (base, args) = match token.find('(') {
            Some(open) => {
                let close = token.rfind(')').ok_or_else(|| {
                    Error::invalid_spec("", format!("malformed type token '{}'", s))
                })?;
                (&token[..open], Some(&token[open + 1..close]))
            }
            None => (token.as_str(), None),
        };

        let parse_len = |args: Option<&str>| -> Result<u32> {
            args.and_then(|a| a.trim().parse().ok()).ok_or_else(|| {
                Error::invalid_spec("", format!("type '{}' requires a length argument", s))
            })
        };

        match base {
            "integer" | "int" => Ok(Self::Integer),
            "bigint" => Ok(Self::BigInt),
            "smallint" => Ok(Self::SmallInt),
            "text" => Ok(Self::Text),
            "varchar" | "character varying" => Ok(Self::Varchar(parse_len(args)?)),
            "char" | "character" => Ok(Self::Char(parse_len(args)?)),
            "boolean" | "bool" => Ok(Self::Boolean),
            "timestamp" | "datetime" => Ok(Self::Timestamp),
            "date" => Ok(Self::Date),
            "time" => Ok(Self::Time),
            "real" | "float" => Ok(Self::Real),
            "double" | "double precision" => Ok(Self::Double),
            "decimal" | "numeric" => {
                let args = args.ok_or_else(|| {
                    Error::invalid_spec("", format!("type '{}' requires precision and scale", s))
                })?;
                let mut parts = args.split(',').map(str::trim);
                let precision = parts.next().and_then(|p| p.parse().ok());
                let scale = parts.next().and_then(|p| p.parse().ok());
                match (precision, scale) {
                    (Some(p), Some(sc)) => Ok(Self::Decimal(p, sc)),
                    _ => Err(Error::invalid_spec(
                        "",
                        format!("type '{}' requires precision and scale", s),
                    )),
                }
            }
            "blob" | "bytea" => Ok(Self::Blob),
            "json" | "jsonb" => Ok(Self::Json),
            "uuid" => Ok(Self::Uuid),
            _ => Err(Error::invalid_spec("", format!("unknown type '{}'", s))),
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.to_string()
    }
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "no action",
            Self::Restrict => "restrict",
            Self::Cascade => "cascade",
            Self::SetNull => "set null",
            Self::SetDefault => "set default",
        }
    }

    /// Parses the action from its introspected SQL form.
    #[must_use]
    pub fn from_sql(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "restrict" => Self::Restrict,
            "cascade" => Self::Cascade,
            "set null" => Self::SetNull,
            "set default" => Self::SetDefault,
            _ => Self::NoAction,
        }
    }
}

/// Definition of a single column, shared by desired specs and live models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type in the declarative vocabulary.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether the column allows NULL values.
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Default value as a raw SQL expression, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Column character set (MySQL only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    /// Column collation (MySQL only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ColumnDef {
    /// Creates a new nullable column with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
            charset: None,
            collation: None,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default value expression.
    #[must_use]
    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Sets the column character set (MySQL only).
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Sets the column collation (MySQL only).
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }
}

/// Definition of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDef {
    /// Index name; generated deterministically when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Ordered columns included in the index.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    #[serde(default)]
    pub is_unique: bool,
}

impl IndexDef {
    /// Creates an unnamed non-unique index on the given columns.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            name: None,
            columns,
            is_unique: false,
        }
    }

    /// Sets an explicit name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Makes this a unique index.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    /// Returns the explicit name, or the generated one for this table.
    #[must_use]
    pub fn effective_name(&self, table: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => generate_index_name(table, &self.columns),
        }
    }

    /// Returns true if the index shape (columns and uniqueness) matches.
    #[must_use]
    pub fn same_definition(&self, other: &IndexDef) -> bool {
        self.columns == other.columns && self.is_unique == other.is_unique
    }
}

/// Definition of a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyDef {
    /// Constraint name; generated deterministically when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Column(s) in the referencing table.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub references_table: String,
    /// Referenced column(s).
    pub references_columns: Vec<String>,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    #[serde(default)]
    pub on_update: ForeignKeyAction,
}

impl ForeignKeyDef {
    /// Creates a foreign key with default actions.
    #[must_use]
    pub fn new(
        columns: Vec<String>,
        references_table: impl Into<String>,
        references_columns: Vec<String>,
    ) -> Self {
        Self {
            name: None,
            columns,
            references_table: references_table.into(),
            references_columns,
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }

    /// Sets an explicit constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }

    /// Returns the explicit name, or the generated one for this table.
    #[must_use]
    pub fn effective_name(&self, table: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => generate_foreign_key_name(table, &self.columns),
        }
    }

    /// Identity key for matching unnamed foreign keys.
    #[must_use]
    pub fn identity(&self) -> (&[String], &str, &[String]) {
        (
            &self.columns,
            self.references_table.as_str(),
            &self.references_columns,
        )
    }

    /// Returns true if the action clauses match.
    #[must_use]
    pub fn same_actions(&self, other: &ForeignKeyDef) -> bool {
        self.on_delete == other.on_delete && self.on_update == other.on_update
    }
}

/// Normalized description of one table, used for both sides of a diff.
///
/// Introspectors rebuild this fresh on every planning run; nothing caches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Ordered column definitions.
    pub columns: Vec<ColumnDef>,
    /// Primary key columns, in key order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,
    /// Name of the live primary key constraint. Only introspectors set this;
    /// declarative documents never carry it.
    #[serde(skip)]
    pub primary_key_name: Option<String>,
    /// Secondary indexes (primary key excluded).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDef>,
    /// Foreign key constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKeyDef>,
    /// Table default character set (MySQL only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    /// Table collation (MySQL only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
}

impl TableSchema {
    /// Creates an empty table schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            primary_key_name: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            charset: None,
            collation: None,
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key(mut self, columns: Vec<String>) -> Self {
        self.primary_key = Some(columns);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKeyDef) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Generates a deterministic index name from the table and column list.
///
/// Must be a pure function of its inputs: re-planning an unnamed index
/// against an unchanged database must produce the same name, or the index
/// would be re-identified as new on every run.
#[must_use]
pub fn generate_index_name(table: &str, columns: &[String]) -> String {
    format!("idx_{}_{}", table, columns.join("_"))
}

/// Generates a deterministic foreign key constraint name.
#[must_use]
pub fn generate_foreign_key_name(table: &str, columns: &[String]) -> String {
    format!("{}_{}_fkey", table, columns.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_display_parse_round_trip() {
        let types = [
            ColumnType::Integer,
            ColumnType::BigInt,
            ColumnType::SmallInt,
            ColumnType::Text,
            ColumnType::Varchar(255),
            ColumnType::Char(12),
            ColumnType::Boolean,
            ColumnType::Timestamp,
            ColumnType::Date,
            ColumnType::Time,
            ColumnType::Real,
            ColumnType::Double,
            ColumnType::Decimal(10, 2),
            ColumnType::Blob,
            ColumnType::Json,
            ColumnType::Uuid,
        ];
        for t in types {
            let parsed: ColumnType = t.to_string().parse().unwrap();
            assert_eq!(parsed, t);
        }
    }

    #[test]
    fn test_column_type_aliases() {
        assert_eq!("int".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!(
            "character varying(64)".parse::<ColumnType>().unwrap(),
            ColumnType::Varchar(64)
        );
        assert_eq!(
            "numeric(8, 3)".parse::<ColumnType>().unwrap(),
            ColumnType::Decimal(8, 3)
        );
        assert_eq!("jsonb".parse::<ColumnType>().unwrap(), ColumnType::Json);
    }

    #[test]
    fn test_column_type_unknown_rejected() {
        assert!("geometry".parse::<ColumnType>().is_err());
        assert!("varchar".parse::<ColumnType>().is_err());
        assert!("decimal(10)".parse::<ColumnType>().is_err());
    }

    #[test]
    fn test_generated_index_name_is_stable() {
        let cols = vec!["customer_id".to_string(), "created_at".to_string()];
        let a = generate_index_name("orders", &cols);
        let b = generate_index_name("orders", &cols);
        assert_eq!(a, b);
        assert_eq!(a, "idx_orders_customer_id_created_at");
    }

    #[test]
    fn test_generated_index_names_do_not_collide() {
        let a = generate_index_name("orders", &["customer_id".to_string()]);
        let b = generate_index_name("orders", &["status".to_string()]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_index_effective_name() {
        let named = IndexDef::new(vec!["email".to_string()]).named("idx_email");
        assert_eq!(named.effective_name("users"), "idx_email");

        let unnamed = IndexDef::new(vec!["email".to_string()]);
        assert_eq!(unnamed.effective_name("users"), "idx_users_email");
    }

    #[test]
    fn test_foreign_key_identity_ignores_name_and_actions() {
        let a = ForeignKeyDef::new(
            vec!["customer_id".to_string()],
            "customers",
            vec!["id".to_string()],
        )
        .named("fk_a")
        .on_delete(ForeignKeyAction::Cascade);
        let b = ForeignKeyDef::new(
            vec!["customer_id".to_string()],
            "customers",
            vec!["id".to_string()],
        );
        assert_eq!(a.identity(), b.identity());
        assert!(!a.same_actions(&b));
    }

    #[test]
    fn test_table_schema_builder() {
        let table = TableSchema::new("users")
            .column(ColumnDef::new("id", ColumnType::BigInt).not_null())
            .column(ColumnDef::new("email", ColumnType::Varchar(255)))
            .primary_key(vec!["id".to_string()]);

        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.primary_key.as_deref(), Some(&["id".to_string()][..]));
        assert!(table.get_column("email").is_some());
        assert!(table.get_column("missing").is_none());
    }
}
