//! MySQL catalog introspection.
//!
//! Everything comes from `information_schema`; `COLUMN_TYPE` is used instead
//! of `DATA_TYPE` because it carries the display width and precision
//! arguments (`varchar(255)`, `decimal(10,2)`) in one string.

use sqlx::MySqlPool;
use tracing::debug;

use crate::dialect::{MysqlDialect, SqlDialect};
use crate::error::{Error, Result};
use crate::schema::{ColumnDef, ForeignKeyAction, ForeignKeyDef, IndexDef, TableSchema};

/// Lists user tables in the current database, sorted by name.
pub async fn list_tables(pool: &MySqlPool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "select table_name from information_schema.tables \
         where table_schema = database() and table_type = 'BASE TABLE' \
         order by table_name",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| Error::introspection("*", e))?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Reads the live schema of one table, or `None` if the table does not exist.
pub async fn introspect_table(pool: &MySqlPool, table: &str) -> Result<Option<TableSchema>> {
    let Some((table_charset, table_collation)) = fetch_table_options(pool, table).await? else {
        debug!(table, "table not found");
        return Ok(None);
    };

    let mut schema = TableSchema::new(table);
    schema.columns = fetch_columns(pool, table, &table_charset, &table_collation).await?;
    let (primary_key, indexes) = fetch_keys(pool, table).await?;
    // MySQL names the primary key constraint PRIMARY unconditionally.
    schema.primary_key_name = primary_key.as_ref().map(|_| "PRIMARY".to_string());
    schema.primary_key = primary_key;
    schema.indexes = indexes;
    schema.foreign_keys = fetch_foreign_keys(pool, table).await?;
    schema.charset = Some(table_charset);
    schema.collation = Some(table_collation);

    debug!(
        table,
        columns = schema.columns.len(),
        indexes = schema.indexes.len(),
        foreign_keys = schema.foreign_keys.len(),
        "introspected table"
    );

    Ok(Some(schema))
}

async fn fetch_table_options(pool: &MySqlPool, table: &str) -> Result<Option<(String, String)>> {
    let row: Option<(String, String)> = sqlx::query_as(
        "select ccsa.character_set_name, t.table_collation \
         from information_schema.tables t \
         join information_schema.collation_character_set_applicability ccsa \
           on ccsa.collation_name = t.table_collation \
         where t.table_schema = database() and t.table_name = ?",
    )
    .bind(table)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::introspection(table, e))?;

    Ok(row)
}

async fn fetch_columns(
    pool: &MySqlPool,
    table: &str,
    table_charset: &str,
    table_collation: &str,
) -> Result<Vec<ColumnDef>> {
    type Row = (String, String, String, Option<String>, Option<String>, Option<String>);

    let rows: Vec<Row> = sqlx::query_as(
        "select column_name, column_type, is_nullable, column_default, \
                character_set_name, collation_name \
         from information_schema.columns \
         where table_schema = database() and table_name = ? \
         order by ordinal_position",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::introspection(table, e))?;

    let dialect = MysqlDialect::new();
    let mut columns = Vec::with_capacity(rows.len());
    for (name, column_type, is_nullable, default, charset, collation) in rows {
        let column_type = dialect.type_from_sql(&column_type)?;
        // Column charset/collation matching the table default is implicit.
        let charset = charset.filter(|c| c != table_charset);
        let collation = collation.filter(|c| c != table_collation);
        columns.push(ColumnDef {
            name,
            column_type,
            nullable: is_nullable == "YES",
            default,
            charset,
            collation,
        });
    }
    Ok(columns)
}

/// Reads the primary key and secondary indexes in one pass over
/// `information_schema.statistics`.
async fn fetch_keys(
    pool: &MySqlPool,
    table: &str,
) -> Result<(Option<Vec<String>>, Vec<IndexDef>)> {
    let rows: Vec<(String, i64, String)> = sqlx::query_as(
        "select index_name, non_unique, column_name \
         from information_schema.statistics \
         where table_schema = database() and table_name = ? \
         order by index_name, seq_in_index",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::introspection(table, e))?;

    let mut primary_key: Vec<String> = Vec::new();
    let mut indexes: Vec<IndexDef> = Vec::new();
    for (name, non_unique, column) in rows {
        if name == "PRIMARY" {
            primary_key.push(column);
            continue;
        }
        match indexes.iter_mut().find(|i| i.name.as_deref() == Some(&name)) {
            Some(index) => index.columns.push(column),
            None => indexes.push(IndexDef {
                name: Some(name),
                columns: vec![column],
                is_unique: non_unique == 0,
            }),
        }
    }

    let primary_key = if primary_key.is_empty() {
        None
    } else {
        Some(primary_key)
    };
    Ok((primary_key, indexes))
}

async fn fetch_foreign_keys(pool: &MySqlPool, table: &str) -> Result<Vec<ForeignKeyDef>> {
    type Row = (String, String, String, String, String, String);

    let rows: Vec<Row> = sqlx::query_as(
        "select kcu.constraint_name, kcu.column_name, \
                kcu.referenced_table_name, kcu.referenced_column_name, \
                rc.delete_rule, rc.update_rule \
         from information_schema.key_column_usage kcu \
         join information_schema.referential_constraints rc \
           on rc.constraint_name = kcu.constraint_name \
          and rc.constraint_schema = kcu.table_schema \
          and rc.table_name = kcu.table_name \
         where kcu.table_schema = database() and kcu.table_name = ? \
           and kcu.referenced_table_name is not null \
         order by kcu.constraint_name, kcu.ordinal_position",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::introspection(table, e))?;

    let mut foreign_keys: Vec<ForeignKeyDef> = Vec::new();
    for (name, column, ref_table, ref_column, delete_rule, update_rule) in rows {
        match foreign_keys
            .iter_mut()
            .find(|fk| fk.name.as_deref() == Some(&name))
        {
            Some(fk) => {
                fk.columns.push(column);
                fk.references_columns.push(ref_column);
            }
            None => foreign_keys.push(ForeignKeyDef {
                name: Some(name),
                columns: vec![column],
                references_table: ref_table,
                references_columns: vec![ref_column],
                on_delete: ForeignKeyAction::from_sql(&delete_rule),
                on_update: ForeignKeyAction::from_sql(&update_rule),
            }),
        }
    }
    Ok(foreign_keys)
}
