//! Desired-state table documents.
//!
//! A table spec is the declarative, user-authored description of a table's
//! intended schema. It arrives as a YAML document with an
//! `apiVersion`/`kind`/`metadata`/`spec` envelope and carries exactly one
//! dialect schema block. Specs are immutable inputs to a planning run.

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::schema::{ColumnDef, ForeignKeyDef, IndexDef, TableSchema};

/// API version written into generated documents.
pub const API_VERSION: &str = "schemas.schemaplan.dev/v1alpha1";

/// Document kind for table specs.
pub const KIND_TABLE: &str = "Table";

/// Schema block shared by the Postgres-family dialects.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlTableSchema {
    /// Primary key columns, in key order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    /// Ordered column definitions.
    pub columns: Vec<ColumnDef>,
    /// Secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDef>,
    /// Foreign key constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKeyDef>,
}

/// MySQL schema block: the shared shape plus engine options.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MysqlTableSchema {
    /// Columns, key, indexes and foreign keys.
    #[serde(flatten)]
    pub schema: SqlTableSchema,
    /// Table default character set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_charset: Option<String>,
    /// Table collation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
}

/// Exactly one dialect block must be populated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchemaBlock {
    /// MySQL-family schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql: Option<MysqlTableSchema>,
    /// PostgreSQL schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<SqlTableSchema>,
    /// CockroachDB schema (Postgres DDL surface).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cockroachdb: Option<SqlTableSchema>,
}

/// A declarative table spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    /// Database the table belongs to.
    pub database: String,
    /// Table name.
    pub name: String,
    /// Tables that must exist before this one. Dependency hints only;
    /// not enforced transactionally by the planner.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// The dialect schema block.
    pub schema: TableSchemaBlock,
}

impl TableSpec {
    /// Returns the dialect this spec targets.
    ///
    /// Errors if the spec declares no schema block or more than one.
    pub fn dialect(&self) -> Result<Dialect> {
        let blocks = [
            self.schema.mysql.is_some(),
            self.schema.postgres.is_some(),
            self.schema.cockroachdb.is_some(),
        ];
        match blocks.iter().filter(|present| **present).count() {
            0 => Err(Error::invalid_spec(&self.name, "no dialect schema block")),
            1 => {
                if self.schema.mysql.is_some() {
                    Ok(Dialect::Mysql)
                } else if self.schema.postgres.is_some() {
                    Ok(Dialect::Postgres)
                } else {
                    Ok(Dialect::CockroachDb)
                }
            }
            _ => Err(Error::invalid_spec(
                &self.name,
                "more than one dialect schema block",
            )),
        }
    }

    /// Returns the single populated schema block.
    fn dialect_block(&self) -> Result<&SqlTableSchema> {
        let block = match self.dialect()? {
            Dialect::Mysql => self.schema.mysql.as_ref().map(|m| &m.schema),
            Dialect::Postgres => self.schema.postgres.as_ref(),
            Dialect::CockroachDb => self.schema.cockroachdb.as_ref(),
        };
        block.ok_or_else(|| Error::invalid_spec(&self.name, "no dialect schema block"))
    }

    /// Lowers the spec into the normalized [`TableSchema`] shape the
    /// planner diffs against the live model.
    pub fn desired_table_schema(&self) -> Result<TableSchema> {
        self.validate()?;

        let schema = self.dialect_block()?;
        let (charset, collation) = match &self.schema.mysql {
            Some(block) => (block.default_charset.clone(), block.collation.clone()),
            None => (None, None),
        };

        let primary_key = if schema.primary_key.is_empty() {
            None
        } else {
            Some(schema.primary_key.clone())
        };

        Ok(TableSchema {
            name: self.name.clone(),
            columns: schema.columns.clone(),
            primary_key,
            primary_key_name: None,
            indexes: schema.indexes.clone(),
            foreign_keys: schema.foreign_keys.clone(),
            charset,
            collation,
        })
    }

    /// Validates the spec before any diffing happens.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_spec("", "table name is empty"));
        }

        let schema = self.dialect_block()?;

        if schema.columns.is_empty() {
            return Err(Error::invalid_spec(&self.name, "table has no columns"));
        }

        let mut seen = std::collections::HashSet::new();
        for column in &schema.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(Error::invalid_spec(
                    &self.name,
                    format!("duplicate column '{}'", column.name),
                ));
            }
        }
        let column_exists = |name: &str| schema.columns.iter().any(|c| c.name == name);

        for key_column in &schema.primary_key {
            if !column_exists(key_column) {
                return Err(Error::invalid_spec(
                    &self.name,
                    format!("primary key references unknown column '{}'", key_column),
                ));
            }
        }

        for index in &schema.indexes {
            if index.columns.is_empty() {
                return Err(Error::invalid_spec(&self.name, "index has no columns"));
            }
            for column in &index.columns {
                if !column_exists(column) {
                    return Err(Error::invalid_spec(
                        &self.name,
                        format!(
                            "index '{}' references unknown column '{}'",
                            index.effective_name(&self.name),
                            column
                        ),
                    ));
                }
            }
        }

        for fk in &schema.foreign_keys {
            if fk.columns.is_empty() {
                return Err(Error::invalid_spec(&self.name, "foreign key has no columns"));
            }
            if fk.columns.len() != fk.references_columns.len() {
                return Err(Error::invalid_spec(
                    &self.name,
                    format!(
                        "foreign key '{}' has {} columns but references {}",
                        fk.effective_name(&self.name),
                        fk.columns.len(),
                        fk.references_columns.len()
                    ),
                ));
            }
            for column in &fk.columns {
                if !column_exists(column) {
                    return Err(Error::invalid_spec(
                        &self.name,
                        format!(
                            "foreign key '{}' references unknown column '{}'",
                            fk.effective_name(&self.name),
                            column
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Resource name (table name with `_` replaced by `-`).
    pub name: String,
}

/// The full serialized envelope around a table spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDoc {
    /// API version of the document schema.
    pub api_version: String,
    /// Document kind; always `Table`.
    pub kind: String,
    /// Resource metadata.
    pub metadata: Metadata,
    /// The table spec itself.
    pub spec: TableSpec,
}

impl TableDoc {
    /// Wraps a spec in the document envelope.
    #[must_use]
    pub fn new(spec: TableSpec) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND_TABLE.to_string(),
            metadata: Metadata {
                name: sanitize_name(&spec.name),
            },
            spec,
        }
    }

    /// Parses a document from YAML.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let doc: Self = serde_yaml::from_str(contents)?;
        if doc.kind != KIND_TABLE {
            return Err(Error::invalid_spec(
                &doc.metadata.name,
                format!("unexpected document kind '{}'", doc.kind),
            ));
        }
        Ok(doc)
    }

    /// Serializes the document to YAML.
    ///
    /// Field order follows struct declaration, so output is byte-identical
    /// across runs for an unchanged schema.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Replaces `_` with `-` so table names are valid resource names.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn users_spec() -> TableSpec {
        TableSpec {
            database: "app".to_string(),
            name: "users".to_string(),
            requires: Vec::new(),
            schema: TableSchemaBlock {
                postgres: Some(SqlTableSchema {
                    primary_key: vec!["id".to_string()],
                    columns: vec![
                        ColumnDef::new("id", ColumnType::BigInt).not_null(),
                        ColumnDef::new("email", ColumnType::Varchar(255)).not_null(),
                    ],
                    indexes: vec![IndexDef::new(vec!["email".to_string()])
                        .unique()
                        .named("idx_email")],
                    foreign_keys: Vec::new(),
                }),
                ..TableSchemaBlock::default()
            },
        }
    }

    #[test]
    fn test_dialect_detection() {
        assert_eq!(users_spec().dialect().unwrap(), Dialect::Postgres);

        let mut no_block = users_spec();
        no_block.schema.postgres = None;
        assert!(matches!(
            no_block.dialect(),
            Err(Error::InvalidSpec { .. })
        ));

        let mut two_blocks = users_spec();
        two_blocks.schema.mysql = Some(MysqlTableSchema::default());
        assert!(matches!(
            two_blocks.dialect(),
            Err(Error::InvalidSpec { .. })
        ));
    }

    #[test]
    fn test_desired_table_schema() {
        let schema = users_spec().desired_table_schema().unwrap();
        assert_eq!(schema.name, "users");
        assert_eq!(schema.columns.len(), 2);
        assert_eq!(schema.primary_key.as_deref(), Some(&["id".to_string()][..]));
        assert_eq!(schema.indexes.len(), 1);
    }

    #[test]
    fn test_validate_rejects_unknown_pk_column() {
        let mut spec = users_spec();
        spec.schema.postgres.as_mut().unwrap().primary_key = vec!["missing".to_string()];
        assert!(matches!(spec.validate(), Err(Error::InvalidSpec { .. })));
    }

    #[test]
    fn test_validate_rejects_empty_columns() {
        let mut spec = users_spec();
        spec.schema.postgres.as_mut().unwrap().columns.clear();
        assert!(matches!(spec.validate(), Err(Error::InvalidSpec { .. })));
    }

    #[test]
    fn test_validate_rejects_mismatched_fk() {
        let mut spec = users_spec();
        spec.schema
            .postgres
            .as_mut()
            .unwrap()
            .foreign_keys
            .push(ForeignKeyDef::new(
                vec!["email".to_string()],
                "accounts",
                vec!["id".to_string(), "org".to_string()],
            ));
        assert!(matches!(spec.validate(), Err(Error::InvalidSpec { .. })));
    }

    #[test]
    fn test_yaml_round_trip() {
        let doc = TableDoc::new(users_spec());
        let yaml = doc.to_yaml().unwrap();
        let parsed = TableDoc::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_yaml_is_deterministic() {
        let doc = TableDoc::new(users_spec());
        assert_eq!(doc.to_yaml().unwrap(), doc.to_yaml().unwrap());
    }

    #[test]
    fn test_parse_hand_written_document() {
        let yaml = r#"
apiVersion: schemas.schemaplan.dev/v1alpha1
kind: Table
metadata:
  name: orders
spec:
  database: shop
  name: orders
  schema:
    postgres:
      primaryKey: [id]
      columns:
        - name: id
          type: bigint
          nullable: false
        - name: customer_id
          type: bigint
      indexes:
        - columns: [customer_id]
"#;
        let doc = TableDoc::from_yaml(yaml).unwrap();
        assert_eq!(doc.spec.name, "orders");
        let schema = doc.spec.desired_table_schema().unwrap();
        assert_eq!(schema.indexes[0].effective_name("orders"), "idx_orders_customer_id");
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("order_items"), "order-items");
    }
}
