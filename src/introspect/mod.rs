//! Live schema introspection.
//!
//! Reads table metadata out of the database catalogs and normalizes it into
//! the same [`TableSchema`](crate::schema::TableSchema) model the planner
//! diffs desired specs against. Each backend has its own module; both produce
//! indexes and foreign keys sorted by name so plans are deterministic.

mod mysql;
mod postgres;

pub use mysql::{introspect_table as mysql_introspect_table, list_tables as mysql_list_tables};
pub use postgres::{
    introspect_table as postgres_introspect_table, list_tables as postgres_list_tables,
};
