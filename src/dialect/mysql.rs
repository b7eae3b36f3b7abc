//! MySQL-family statement builder and type mapper.

use crate::error::{Error, Result};
use crate::operations::SchemaOp;
use crate::schema::{ColumnDef, ColumnType, ForeignKeyAction, ForeignKeyDef, IndexDef, TableSchema};

use super::{check_operation, SqlDialect};

/// MySQL migration dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Creates a new MySQL dialect.
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

        // MySQL declares secondary indexes inline.
        for index in &table.indexes {
            let unique = if index.is_unique { "unique " } else { "" };
            let quoted: Vec<String> = index
                .columns
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect();
            parts.push(format!(
                "{}index {} ({})",
                unique,
                self.quote_identifier(&index.effective_name(&table.name)),
                quoted.join(", ")
            ));
        }

        for fk in &table.foreign_keys {
            parts.push(format!(
                "constraint {} {}",
                self.quote_identifier(&fk.effective_name(&table.name)),
                self.foreign_key_clause(fk)
            ));
        }

        let mut statement = format!(
            "create table {} ({})",
            self.quote_identifier(&table.name),
            parts.join(", ")
        );
        if let Some(charset) = &table.charset {
            statement.push_str(&format!(" default character set {}", charset));
        }
        if let Some(collation) = &table.collation {
            statement.push_str(&format!(" collate {}", collation));
        }

        Ok(vec![statement])
    }

    fn create_index_sql(&self, table: &str, index: &IndexDef) -> String {
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

impl SqlDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn type_to_sql(&self, column_type: &ColumnType) -> Result<String> {
        Ok(match column_type {
            ColumnType::Integer => "int".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::Varchar(n) => format!("varchar({})", n),
            ColumnType::Char(n) => format!("char({})", n),
            ColumnType::Boolean => "tinyint(1)".to_string(),
            ColumnType::Timestamp => "datetime".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Time => "time".to_string(),
            ColumnType::Real => "float".to_string(),
            ColumnType::Double => "double".to_string(),
            ColumnType::Decimal(p, s) => format!("decimal({},{})", p, s),
            ColumnType::Blob => "blob".to_string(),
            ColumnType::Json => "json".to_string(),
            ColumnType::Uuid => {
                return Err(Error::UnsupportedChange {
                    dialect: self.name(),
                    detail: "mysql has no native uuid type".to_string(),
                })
            }
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
            // Integer display widths ("int(11)") carry no type information.
            "int" | "integer" | "mediumint" => Ok(ColumnType::Integer),
            "bigint" => Ok(ColumnType::BigInt),
            "smallint" => Ok(ColumnType::SmallInt),
            "tinyint" => {
                if args == Some("1") || args.is_none() {
                    Ok(ColumnType::Boolean)
                } else {
                    Ok(ColumnType::SmallInt)
                }
            }
            "text" | "tinytext" | "mediumtext" | "longtext" => Ok(ColumnType::Text),
            "varchar" => length()
                .map(ColumnType::Varchar)
                .ok_or_else(|| self.unmapped(native)),
            "char" => length()
                .map(ColumnType::Char)
                .ok_or_else(|| self.unmapped(native)),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "datetime" | "timestamp" => Ok(ColumnType::Timestamp),
            "date" => Ok(ColumnType::Date),
            "time" => Ok(ColumnType::Time),
            "float" => Ok(ColumnType::Real),
            "double" | "double precision" => Ok(ColumnType::Double),
            "decimal" | "numeric" => precision_scale()
                .map(|(p, s)| ColumnType::Decimal(p, s))
                .ok_or_else(|| self.unmapped(native)),
            "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
                Ok(ColumnType::Blob)
            }
            "json" => Ok(ColumnType::Json),
            _ => Err(self.unmapped(native)),
        }
    }

    fn column_definition(&self, column: &ColumnDef) -> Result<String> {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_to_sql(&column.column_type)?,
        ];

        if let Some(charset) = &column.charset {
            parts.push(format!("character set {}", charset));
        }
        if let Some(collation) = &column.collation {
            parts.push(format!("collate {}", collation));
        }
        if !column.nullable {
            parts.push("not null".to_string());
        }
        if let Some(default) = &column.default {
            parts.push(format!("default {}", default));
        }

        Ok(parts.join(" "))
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

            // MySQL re-states the full column definition on change.
            SchemaOp::AlterColumn { table, column, .. } => Ok(vec![format!(
                "alter table {} modify column {}",
                self.quote_identifier(table),
                self.column_definition(column)?
            )]),

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
                // The live key is always named PRIMARY here; the constraint
                // name on the op only matters to the Postgres renderer.
                let clauses = if drop_constraint.is_some() {
                    format!("drop primary key, {}", add)
                } else {
                    add
                };
                Ok(vec![format!(
                    "alter table {} {}",
                    self.quote_identifier(table),
                    clauses
                )])
            }

            SchemaOp::AddIndex { table, index } => Ok(vec![self.create_index_sql(table, index)]),

            SchemaOp::DropIndex { table, name, .. } => Ok(vec![format!(
                "alter table {} drop index {}",
                self.quote_identifier(table),
                self.quote_identifier(name)
            )]),

            SchemaOp::RenameIndex { table, from, to } => Ok(vec![format!(
                "alter table {} rename index {} to {}",
                self.quote_identifier(table),
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
                "alter table {} drop foreign key {}",
                self.quote_identifier(table),
                self.quote_identifier(name)
            )]),
        }
    }
}

impl MysqlDialect {
    fn unmapped(&self, native: &str) -> Error {
        Error::UnsupportedChange {
            dialect: self.name(),
            detail: format!("native type '{}' has no declarative mapping", native),
        }
    }
}
