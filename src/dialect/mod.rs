//! Database dialect implementations.
//!
//! Each dialect knows how to render abstract schema operations into DDL for
//! that engine, and how to translate between the declarative type vocabulary
//! and the engine's native type names.

mod mysql;
mod postgres;

pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::operations::SchemaOp;
use crate::schema::{ColumnDef, ColumnType};

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// CockroachDB (Postgres wire and DDL surface).
    CockroachDb,
    /// MySQL / MariaDB.
    Mysql,
}

impl Dialect {
    /// Returns the canonical lowercase tag used in spec documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::CockroachDb => "cockroachdb",
            Self::Mysql => "mysql",
        }
    }

    /// Returns true for dialects that speak the Postgres DDL surface.
    #[must_use]
    pub fn is_postgres_family(&self) -> bool {
        matches!(self, Self::Postgres | Self::CockroachDb)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "cockroachdb" | "cockroach" => Ok(Self::CockroachDb),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            other => Err(Error::invalid_spec(
                "",
                format!("unknown dialect '{}'", other),
            )),
        }
    }
}

/// Trait for dialect-specific DDL rendering and type mapping.
///
/// Implementations are pure: no I/O, no connection handles. The only errors
/// are malformed operations (planner bugs) and changes the dialect cannot
/// express.
pub trait SqlDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Quotes an identifier (table name, column name, index name).
    fn quote_identifier(&self, name: &str) -> String;

    /// Maps a declarative type to the engine's native type name.
    fn type_to_sql(&self, column_type: &ColumnType) -> Result<String>;

    /// Maps an introspected native type name back to the declarative
    /// vocabulary. Must invert [`type_to_sql`](Self::type_to_sql) for every
    /// supported type.
    fn type_from_sql(&self, native: &str) -> Result<ColumnType>;

    /// Renders one abstract operation into DDL statements.
    ///
    /// Most operations render to exactly one statement. `CreateTable` may
    /// emit trailing `create index` statements where the dialect cannot
    /// declare secondary indexes inline.
    fn render(&self, op: &SchemaOp) -> Result<Vec<String>>;

    /// Renders the column definition fragment used in CREATE TABLE,
    /// ADD COLUMN and MODIFY COLUMN clauses.
    fn column_definition(&self, column: &ColumnDef) -> Result<String> {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_to_sql(&column.column_type)?,
        ];

        if !column.nullable {
            parts.push("not null".to_string());
        }

        if let Some(default) = &column.default {
            parts.push(format!("default {}", default));
        }

        Ok(parts.join(" "))
    }
}

/// Checks structural preconditions shared by every dialect's renderer.
pub(crate) fn check_operation(op: &SchemaOp) -> Result<()> {
    match op {
        SchemaOp::CreateTable { table } => {
            if table.columns.is_empty() {
                return Err(Error::InvalidOperation(format!(
                    "create table '{}' with no columns",
                    table.name
                )));
            }
        }
        SchemaOp::AddIndex { table, index } => {
            if index.columns.is_empty() {
                return Err(Error::InvalidOperation(format!(
                    "index on table '{}' has no columns",
                    table
                )));
            }
        }
        SchemaOp::SetPrimaryKey { table, columns, .. } => {
            if columns.is_empty() {
                return Err(Error::InvalidOperation(format!(
                    "primary key on table '{}' has no columns",
                    table
                )));
            }
        }
        SchemaOp::AddForeignKey { table, foreign_key } => {
            if foreign_key.columns.is_empty()
                || foreign_key.columns.len() != foreign_key.references_columns.len()
            {
                return Err(Error::InvalidOperation(format!(
                    "foreign key on table '{}' has mismatched column lists",
                    table
                )));
            }
        }
        SchemaOp::AlterColumn { table, changes, .. } => {
            if changes.is_empty() {
                return Err(Error::InvalidOperation(format!(
                    "alter column on table '{}' carries no changes",
                    table
                )));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IndexDef;

    #[test]
    fn test_dialect_parse() {
        assert_eq!("postgres".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!(
            "cockroachdb".parse::<Dialect>().unwrap(),
            Dialect::CockroachDb
        );
        assert_eq!("MySQL".parse::<Dialect>().unwrap(), Dialect::Mysql);
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_postgres_family() {
        assert!(Dialect::Postgres.is_postgres_family());
        assert!(Dialect::CockroachDb.is_postgres_family());
        assert!(!Dialect::Mysql.is_postgres_family());
    }

    #[test]
    fn test_check_operation_rejects_empty_index() {
        let op = SchemaOp::add_index("users", IndexDef::new(Vec::new()));
        assert!(matches!(
            check_operation(&op),
            Err(Error::InvalidOperation(_))
        ));
    }
}
