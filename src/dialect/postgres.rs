//! Postgres-family statement builder and type mapper.
//!
//! CockroachDB shares this implementation: it exposes the Postgres DDL
//! surface for everything this crate renders.

use crate::error::{Error, Result};
use crate::operations::{ColumnChanges, SchemaOp};
use crate::schema::{ColumnDef, ColumnType, ForeignKeyAction, ForeignKeyDef, TableSchema};

use super::{check_operation, SqlDialect};

/// Postgres migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new Postgres dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn create_table_sql(&self, table: &TableSchema) -> Result<Vec<String>> {
        let mut parts = Vec::new();
        for column in &table.columns {
            parts.push(self.column_definition(column)?);
        }

        if let Some(primary_key) = &table.primary_key {
            let quoted: Vec<String> = primary_key
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect();
            parts.push(format!("primary key ({})", quoted.join(", ")));
        }

        for fk in &table.foreign_keys {
            parts.push(format!(
                "constraint {} {}",
                self.quote_identifier(&fk.effective_name(&table.name)),
                self.foreign_key_clause(fk)
            ));
        }

        let mut statements = vec![format!(
            "create table {} ({})",
            self.quote_identifier(&table.name),
            parts.join(", ")
        )];

        // Secondary indexes cannot be declared inline.
        for index in &table.indexes {
            statements.push(self.create_index_sql(&table.name, index));
        }

        Ok(statements)
    }

    fn create_index_sql(&self, table: &str, index: &crate::schema::IndexDef) -> String {
        let unique = if index.is_unique { "unique " } else { "" };
        let quoted: Vec<String> = index
            .columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect();
        format!(
            "create {}index {} on {} ({})",
            unique,
            self.quote_identifier(&index.effective_name(table)),
            self.quote_identifier(table),
            quoted.join(", ")
        )
    }

    fn alter_column_sql(
        &self,
        table: &str,
        column: &ColumnDef,
        changes: &ColumnChanges,
    ) -> Result<String> {
        if changes.charset.is_some() || changes.collation.is_some() {
            return Err(Error::UnsupportedChange {
                dialect: self.name(),
                detail: format!(
                    "column '{}' charset/collation changes have no postgres rendering",
                    column.name
                ),
            });
        }

        let name = self.quote_identifier(&column.name);
        let mut clauses = Vec::new();

        if let Some(column_type) = &changes.column_type {
            clauses.push(format!(
                "alter column {} type {}",
                name,
                self.type_to_sql(column_type)?
            ));
        }
        if let Some(nullable) = changes.nullable {
            if nullable {
                clauses.push(format!("alter column {} drop not null", name));
            } else {
                clauses.push(format!("alter column {} set not null", name));
            }
        }
        match &changes.default {
            Some(Some(expr)) => {
                clauses.push(format!("alter column {} set default {}", name, expr));
            }
            Some(None) => clauses.push(format!("alter column {} drop default", name)),
            None => {}
        }

        Ok(format!(
            "alter table {} {}",
            self.quote_identifier(table),
            clauses.join(", ")
        ))
    }

    fn foreign_key_clause(&self, fk: &ForeignKeyDef) -> String {
        let columns: Vec<String> = fk.columns.iter().map(|c| self.quote_identifier(c)).collect();
        let referenced: Vec<String> = fk
            .references_columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect();

        let mut clause = format!(
            "foreign key ({}) references {} ({})",
            columns.join(", "),
            self.quote_identifier(&fk.references_table),
            referenced.join(", ")
        );
        if fk.on_delete != ForeignKeyAction::NoAction {
            clause.push_str(&format!(" on delete {}", fk.on_delete.as_sql()));
        }
        if fk.on_update != ForeignKeyAction::NoAction {
            clause.push_str(&format!(" on update {}", fk.on_update.as_sql()));
        }
        clause
    }
}

impl SqlDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn type_to_sql(&self, column_type: &ColumnType) -> Result<String> {
        Ok(match column_type {
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::Varchar(n) => format!("character varying({})", n),
            ColumnType::Char(n) => format!("character({})", n),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Timestamp => "timestamp without time zone".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Time => "time without time zone".to_string(),
            ColumnType::Real => "real".to_string(),
            ColumnType::Double => "double precision".to_string(),
            ColumnType::Decimal(p, s) => format!("numeric({},{})", p, s),
            ColumnType::Blob => "bytea".to_string(),
            ColumnType::Json => "jsonb".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
        })
    }

    fn type_from_sql(&self, native: &str) -> Result<ColumnType> {
        let token = native.trim().to_ascii_lowercase();
        let (base, args) = match token.find('(') {
            Some(open) => {
                let close = token.rfind(')').unwrap_or(token.len());
                (token[..open].trim(), Some(token[open + 1..close].trim()))
            }
            None => (token.as_str(), None),
        };

        let length = || -> Option<u32> { args.and_then(|a| a.parse().ok()) };
        let precision_scale = || -> Option<(u8, u8)> {
            let args = args?;
            let mut parts = args.split(',').map(str::trim);
            let p = parts.next()?.parse().ok()?;
            let s = parts.next().unwrap_or("0").parse().ok()?;
            Some((p, s))
        };

        match base {
            "integer" | "int" | "int4" => Ok(ColumnType::Integer),
            "bigint" | "int8" => Ok(ColumnType::BigInt),
            "smallint" | "int2" => Ok(ColumnType::SmallInt),
            "text" => Ok(ColumnType::Text),
            "character varying" | "varchar" => length()
                .map(ColumnType::Varchar)
                .ok_or_else(|| self.unmapped(native)),
            "character" | "char" | "bpchar" => length()
                .map(ColumnType::Char)
                .ok_or_else(|| self.unmapped(native)),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "timestamp" | "timestamp without time zone" => Ok(ColumnType::Timestamp),
            "date" => Ok(ColumnType::Date),
            "time" | "time without time zone" => Ok(ColumnType::Time),
            "real" | "float4" => Ok(ColumnType::Real),
            "double precision" | "float8" => Ok(ColumnType::Double),
            "numeric" | "decimal" => precision_scale()
                .map(|(p, s)| ColumnType::Decimal(p, s))
                .ok_or_else(|| self.unmapped(native)),
            "bytea" => Ok(ColumnType::Blob),
            "jsonb" | "json" => Ok(ColumnType::Json),
            "uuid" => Ok(ColumnType::Uuid),
            _ => Err(self.unmapped(native)),
        }
    }

    fn render(&self, op: &SchemaOp) -> Result<Vec<String>> {
        check_operation(op)?;

        match op {
            SchemaOp::CreateTable { table } => self.create_table_sql(table),

            SchemaOp::AddColumn { table, column } => Ok(vec![format!(
                "alter table {} add column {}",
                self.quote_identifier(table),
                self.column_definition(column)?
            )]),

            SchemaOp::AlterColumn {
                table,
                column,
                changes,
            } => Ok(vec![self.alter_column_sql(table, column, changes)?]),

            SchemaOp::DropColumn { table, column_name } => Ok(vec![format!(
                "alter table {} drop column {}",
                self.quote_identifier(table),
                self.quote_identifier(column_name)
            )]),

            SchemaOp::SetPrimaryKey {
                table,
                columns,
                drop_constraint,
            } => {
                let quoted: Vec<String> =
                    columns.iter().map(|c| self.quote_identifier(c)).collect();
                let add = format!("add primary key ({})", quoted.join(", "));
                let statement = match drop_constraint {
                    Some(constraint) => format!(
                        "alter table {} drop constraint if exists {}, {}",
                        self.quote_identifier(table),
                        self.quote_identifier(constraint),
                        add
                    ),
                    None => format!("alter table {} {}", self.quote_identifier(table), add),
                };
                Ok(vec![statement])
            }

            SchemaOp::AddIndex { table, index } => Ok(vec![self.create_index_sql(table, index)]),

            SchemaOp::DropIndex {
                name, is_unique, ..
            } => {
                // Unique indexes get the "if exists" form.
                let statement = if *is_unique {
                    format!("drop index if exists {}", self.quote_identifier(name))
                } else {
                    format!("drop index {}", self.quote_identifier(name))
                };
                Ok(vec![statement])
            }

            SchemaOp::RenameIndex { from, to, .. } => Ok(vec![format!(
                "alter index {} rename to {}",
                self.quote_identifier(from),
                self.quote_identifier(to)
            )]),

            SchemaOp::AddForeignKey { table, foreign_key } => Ok(vec![format!(
                "alter table {} add constraint {} {}",
                self.quote_identifier(table),
                self.quote_identifier(&foreign_key.effective_name(table)),
                self.foreign_key_clause(foreign_key)
            )]),

            SchemaOp::DropForeignKey { table, name } => Ok(vec![format!(
                "alter table {} drop constraint {}",
                self.quote_identifier(table),
                self.quote_identifier(name)
            )]),
        }
    }
}

impl PostgresDialect {
    fn unmapped(&self, native: &str) -> Error {
        Error::UnsupportedChange {
            dialect: self.name(),
            detail: format!("native type '{}' has no declarative mapping", native),
        }
    }
}
