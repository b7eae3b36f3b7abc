//! Postgres catalog introspection.
//!
//! Column metadata comes from `information_schema`; index and foreign key
//! metadata come from `pg_index`/`pg_constraint` directly because
//! `information_schema` has no portable view of index column order and cannot
//! pair the columns of a composite foreign key.

use sqlx::PgPool;
use tracing::debug;

use crate::dialect::{PostgresDialect, SqlDialect};
use crate::error::{Error, Result};
use crate::schema::{ColumnDef, ForeignKeyAction, ForeignKeyDef, IndexDef, TableSchema};

/// Lists user tables in the public schema, sorted by name.
pub async fn list_tables(pool: &PgPool) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "select table_name from information_schema.tables \
         where table_schema = 'public' and table_type = 'BASE TABLE' \
         order by table_name",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| Error::introspection("*", e))?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

/// Reads the live schema of one table, or `None` if the table does not exist.
pub async fn introspect_table(pool: &PgPool, table: &str) -> Result<Option<TableSchema>> {
    let columns = fetch_columns(pool, table).await?;
    if columns.is_empty() {
        debug!(table, "table not found");
        return Ok(None);
    }

    let mut schema = TableSchema::new(table);
    schema.columns = columns;
    let (primary_key, primary_key_name) = fetch_primary_key(pool, table).await?;
    schema.primary_key = primary_key;
    schema.primary_key_name = primary_key_name;
    schema.indexes = fetch_indexes(pool, table).await?;
    schema.foreign_keys = fetch_foreign_keys(pool, table).await?;

    debug!(
        table,
        columns = schema.columns.len(),
        indexes = schema.indexes.len(),
        foreign_keys = schema.foreign_keys.len(),
        "introspected table"
    );

    Ok(Some(schema))
}

async fn fetch_columns(pool: &PgPool, table: &str) -> Result<Vec<ColumnDef>> {
    type Row = (String, String, String, Option<String>, Option<i32>, Option<i32>, Option<i32>);

    let rows: Vec<Row> = sqlx::query_as(
        "select column_name, data_type, is_nullable, column_default, \
                character_maximum_length, numeric_precision, numeric_scale \
         from information_schema.columns \
         where table_schema = 'public' and table_name = $1 \
         order by ordinal_position",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::introspection(table, e))?;

    let dialect = PostgresDialect::new();
    let mut columns = Vec::with_capacity(rows.len());
    for (name, data_type, is_nullable, default, char_len, precision, scale) in rows {
        let native = native_type(&data_type, char_len, precision, scale);
        let column_type = dialect.type_from_sql(&native)?;
        columns.push(ColumnDef {
            name,
            column_type,
            nullable: is_nullable == "YES",
            default,
            charset: None,
            collation: None,
        });
    }
    Ok(columns)
}

/// Rebuilds the parenthesized native type name from the split-out
/// `information_schema` columns.
fn native_type(
    data_type: &str,
    char_len: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> String {
    match data_type {
        "character varying" | "character" => match char_len {
            Some(len) => format!("{}({})", data_type, len),
            None => data_type.to_string(),
        },
        "numeric" | "decimal" => match (precision, scale) {
            (Some(p), Some(s)) => format!("{}({},{})", data_type, p, s),
            _ => data_type.to_string(),
        },
        _ => data_type.to_string(),
    }
}

async fn fetch_primary_key(
    pool: &PgPool,
    table: &str,
) -> Result<(Option<Vec<String>>, Option<String>)> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "select tc.constraint_name, kcu.column_name \
         from information_schema.table_constraints tc \
         join information_schema.key_column_usage kcu \
           on tc.constraint_name = kcu.constraint_name \
          and tc.constraint_schema = kcu.constraint_schema \
          and tc.table_name = kcu.table_name \
         where tc.table_schema = 'public' and tc.table_name = $1 \
           and tc.constraint_type = 'PRIMARY KEY' \
         order by kcu.ordinal_position",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::introspection(table, e))?;

    let mut name = None;
    let mut columns = Vec::with_capacity(rows.len());
    for (constraint, column) in rows {
        name.get_or_insert(constraint);
        columns.push(column);
    }
    if columns.is_empty() {
        return Ok((None, None));
    }
    Ok((Some(columns), name))
}

async fn fetch_indexes(pool: &PgPool, table: &str) -> Result<Vec<IndexDef>> {
    // Rows arrive ordered by (indexname, ordinality) so columns accumulate
    // in index key order.
    let rows: Vec<(String, bool, String)> = sqlx::query_as(
        "select i.relname, ix.indisunique, a.attname \
         from pg_class t \
         join pg_index ix on t.oid = ix.indrelid \
         join pg_class i on i.oid = ix.indexrelid \
         join lateral unnest(ix.indkey) with ordinality as ord(attnum, ordinality) on true \
         join pg_attribute a on a.attrelid = t.oid and a.attnum = ord.attnum \
         where t.relname = $1 and not ix.indisprimary \
         order by i.relname, ord.ordinality",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::introspection(table, e))?;

    let mut indexes: Vec<IndexDef> = Vec::new();
    for (name, is_unique, column) in rows {
        match indexes.iter_mut().find(|i| i.name.as_deref() == Some(&name)) {
            Some(index) => index.columns.push(column),
            None => indexes.push(IndexDef {
                name: Some(name),
                columns: vec![column],
                is_unique,
            }),
        }
    }
    Ok(indexes)
}

/// One (constraint, column pair) row of the foreign key query.
type ForeignKeyRow = (String, String, String, String, String, String);

async fn fetch_foreign_keys(pool: &PgPool, table: &str) -> Result<Vec<ForeignKeyDef>> {
    // pg_constraint keeps the referencing and referenced column arrays
    // position-for-position; unnesting both together is the only way to pair
    // the columns of a composite key correctly. information_schema loses the
    // pairing for multi-column constraints.
    let rows: Vec<ForeignKeyRow> = sqlx::query_as(
        "select con.conname, att.attname, ref.relname, fatt.attname, \
                con.confdeltype::text, con.confupdtype::text \
         from pg_constraint con \
         join pg_class t on t.oid = con.conrelid \
         join lateral unnest(con.conkey, con.confkey) \
              with ordinality as cols(attnum, fattnum, ordinality) on true \
         join pg_attribute att \
           on att.attrelid = con.conrelid and att.attnum = cols.attnum \
         join pg_class ref on ref.oid = con.confrelid \
         join pg_attribute fatt \
           on fatt.attrelid = con.confrelid and fatt.attnum = cols.fattnum \
         where con.contype = 'f' and t.relname = $1 \
           and t.relnamespace = 'public'::regnamespace \
         order by con.conname, cols.ordinality",
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::introspection(table, e))?;

    Ok(fold_foreign_keys(rows))
}

/// Accumulates ordered (constraint, column pair) rows into key definitions.
fn fold_foreign_keys(rows: Vec<ForeignKeyRow>) -> Vec<ForeignKeyDef> {
    let mut foreign_keys: Vec<ForeignKeyDef> = Vec::new();
    for (name, column, ref_table, ref_column, delete_code, update_code) in rows {
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
                on_delete: referential_action(&delete_code),
                on_update: referential_action(&update_code),
            }),
        }
    }
    foreign_keys
}

/// Maps a `pg_constraint.confdeltype`/`confupdtype` code to an action.
fn referential_action(code: &str) -> ForeignKeyAction {
    match code {
        "r" => ForeignKeyAction::Restrict,
        "c" => ForeignKeyAction::Cascade,
        "n" => ForeignKeyAction::SetNull,
        "d" => ForeignKeyAction::SetDefault,
        _ => ForeignKeyAction::NoAction,
    }
}
