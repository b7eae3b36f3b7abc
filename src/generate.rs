//! Reverse generation: declarative docs from a live database.
//!
//! Turns introspected tables back into the YAML documents a user would have
//! written by hand, so an existing database can be brought under declarative
//! management. Output is deterministic for an unchanged schema.

use serde::Serialize;
use tracing::info;

use crate::dialect::Dialect;
use crate::driver::SchemaDriver;
use crate::error::Result;
use crate::schema::TableSchema;
use crate::spec::{
    sanitize_name, MysqlTableSchema, SqlTableSchema, TableDoc, TableSchemaBlock, TableSpec,
};

/// One file produced by a generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// File name relative to the output directory.
    pub name: String,
    /// Full file contents.
    pub contents: String,
}

/// Builds the declarative document for one introspected table.
#[must_use]
pub fn table_doc(dialect: Dialect, database: &str, table: &TableSchema) -> TableDoc {
    let shared = SqlTableSchema {
        primary_key: table.primary_key.clone().unwrap_or_default(),
        columns: table.columns.clone(),
        indexes: table.indexes.clone(),
        foreign_keys: table.foreign_keys.clone(),
    };

    let schema = match dialect {
        Dialect::Mysql => TableSchemaBlock {
            mysql: Some(MysqlTableSchema {
                schema: shared,
                default_charset: table.charset.clone(),
                collation: table.collation.clone(),
            }),
            ..TableSchemaBlock::default()
        },
        Dialect::Postgres => TableSchemaBlock {
            postgres: Some(shared),
            ..TableSchemaBlock::default()
        },
        Dialect::CockroachDb => TableSchemaBlock {
            cockroachdb: Some(shared),
            ..TableSchemaBlock::default()
        },
    };

    TableDoc::new(TableSpec {
        database: database.to_string(),
        name: table.name.clone(),
        requires: Vec::new(),
        schema,
    })
}

/// Renders one table's document to a named YAML file.
pub fn render_doc(dialect: Dialect, database: &str, table: &TableSchema) -> Result<GeneratedFile> {
    let doc = table_doc(dialect, database, table);
    Ok(GeneratedFile {
        name: format!("{}.yaml", sanitize_name(&table.name)),
        contents: doc.to_yaml()?,
    })
}

#[derive(Serialize)]
struct Kustomization {
    resources: Vec<String>,
}

/// Builds the `kustomization.yaml` index listing every generated document.
pub fn kustomization(files: &[GeneratedFile]) -> Result<GeneratedFile> {
    let index = Kustomization {
        resources: files.iter().map(|f| f.name.clone()).collect(),
    };
    Ok(GeneratedFile {
        name: "kustomization.yaml".to_string(),
        contents: serde_yaml::to_string(&index).map_err(crate::error::Error::Yaml)?,
    })
}

/// Generates documents for every table in the connected database, plus the
/// `kustomization.yaml` index.
pub async fn generate_all(driver: &SchemaDriver, database: &str) -> Result<Vec<GeneratedFile>> {
    let tables = driver.list_tables().await?;
    let mut files = Vec::with_capacity(tables.len() + 1);

    for table in &tables {
        // list_tables just returned it; a miss here means a concurrent drop,
        // which we simply skip.
        let Some(schema) = driver.introspect_table(table).await? else {
            continue;
        };
        files.push(render_doc(driver.dialect(), database, &schema)?);
    }

    files.push(kustomization(&files)?);
    info!(files = files.len(), "generated table documents");
    Ok(files)
}
