//! Abstract change operations produced by the planner.
//!
//! Each operation carries only the data needed to render it. Operations are
//! generated, ordered, rendered, and discarded within one planning run;
//! they are never persisted.

use crate::schema::{ColumnDef, ColumnType, ForeignKeyDef, IndexDef, TableSchema};

/// The delta between a live column and its desired definition.
///
/// Builders get both this and the full desired column: Postgres renders the
/// minimal clause list from the delta, MySQL re-states the whole column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnChanges {
    /// New data type (if changing).
    pub column_type: Option<ColumnType>,
    /// New nullability (if changing).
    pub nullable: Option<bool>,
    /// New default expression (if changing); `Some(None)` drops the default.
    pub default: Option<Option<String>>,
    /// New column character set (if changing); `Some(None)` reverts to the
    /// table default. MySQL only.
    pub charset: Option<Option<String>>,
    /// New column collation (if changing); `Some(None)` reverts to the
    /// table default. MySQL only.
    pub collation: Option<Option<String>>,
}

impl ColumnChanges {
    /// Creates empty column changes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no changes are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.column_type.is_none()
            && self.nullable.is_none()
            && self.default.is_none()
            && self.charset.is_none()
            && self.collation.is_none()
    }
}

/// A single abstract schema change, prior to dialect rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOp {
    /// Create the table from the entire desired schema.
    CreateTable {
        /// Full desired table definition.
        table: TableSchema,
    },

    /// Add a column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnDef,
    },

    /// Alter an existing column toward its desired definition.
    AlterColumn {
        /// Table name.
        table: String,
        /// Full desired column definition.
        column: ColumnDef,
        /// Which aspects actually changed.
        changes: ColumnChanges,
    },

    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column_name: String,
    },

    /// Replace the table's primary key with the given column list.
    SetPrimaryKey {
        /// Table name.
        table: String,
        /// Ordered key columns.
        columns: Vec<String>,
        /// Name of the live key constraint to drop first, if one exists.
        drop_constraint: Option<String>,
    },

    /// Create an index.
    AddIndex {
        /// Table name.
        table: String,
        /// Index definition.
        index: IndexDef,
    },

    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
        /// Whether the live index is unique (affects drop syntax).
        is_unique: bool,
    },

    /// Rename an index, keeping its definition.
    RenameIndex {
        /// Table name.
        table: String,
        /// Current live name.
        from: String,
        /// Desired name.
        to: String,
    },

    /// Add a foreign key constraint.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Foreign key definition.
        foreign_key: ForeignKeyDef,
    },

    /// Drop a foreign key constraint.
    DropForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },
}

impl SchemaOp {
    /// Creates an AddColumn operation.
    #[must_use]
    pub fn add_column(table: impl Into<String>, column: ColumnDef) -> Self {
        Self::AddColumn {
            table: table.into(),
            column,
        }
    }

    /// Creates a DropColumn operation.
    #[must_use]
    pub fn drop_column(table: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self::DropColumn {
            table: table.into(),
            column_name: column_name.into(),
        }
    }

    /// Creates an AddIndex operation.
    #[must_use]
    pub fn add_index(table: impl Into<String>, index: IndexDef) -> Self {
        Self::AddIndex {
            table: table.into(),
            index,
        }
    }

    /// Creates a DropIndex operation.
    #[must_use]
    pub fn drop_index(table: impl Into<String>, name: impl Into<String>, is_unique: bool) -> Self {
        Self::DropIndex {
            table: table.into(),
            name: name.into(),
            is_unique,
        }
    }

    /// Creates an AddForeignKey operation.
    #[must_use]
    pub fn add_foreign_key(table: impl Into<String>, foreign_key: ForeignKeyDef) -> Self {
        Self::AddForeignKey {
            table: table.into(),
            foreign_key,
        }
    }

    /// Creates a DropForeignKey operation.
    #[must_use]
    pub fn drop_foreign_key(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DropForeignKey {
            table: table.into(),
            name: name.into(),
        }
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable { table } => format!("Create table '{}'", table.name),
            Self::AddColumn { table, column } => {
                format!("Add column '{}' to table '{}'", column.name, table)
            }
            Self::AlterColumn { table, column, .. } => {
                format!("Alter column '{}' in table '{}'", column.name, table)
            }
            Self::DropColumn { table, column_name } => {
                format!("Drop column '{}' from table '{}'", column_name, table)
            }
            Self::SetPrimaryKey { table, columns, .. } => {
                format!("Set primary key ({}) on table '{}'", columns.join(", "), table)
            }
            Self::AddIndex { table, index } => format!(
                "Create index '{}' on table '{}'",
                index.effective_name(table),
                table
            ),
            Self::DropIndex { table, name, .. } => {
                format!("Drop index '{}' from table '{}'", name, table)
            }
            Self::RenameIndex { table, from, to } => {
                format!("Rename index '{}' to '{}' on table '{}'", from, to, table)
            }
            Self::AddForeignKey { table, foreign_key } => format!(
                "Add foreign key '{}' to table '{}'",
                foreign_key.effective_name(table),
                table
            ),
            Self::DropForeignKey { table, name } => {
                format!("Drop foreign key '{}' from table '{}'", name, table)
            }
        }
    }
}
