//! Declarative table schema reconciliation for SQL databases.
//!
//! `schemaplan` takes a YAML description of what a table should look like,
//! introspects what the table actually looks like, and produces the ordered
//! DDL that closes the gap:
//! - Desired state is declarative: columns, primary key, indexes, foreign keys
//! - Plans are deterministic and idempotent: a converged table plans nothing
//! - SQL generation is dialect-aware (PostgreSQL, CockroachDB, MySQL)
//! - Existing databases can be exported back into declarative documents
//!
//! # Architecture
//!
//! The reconciler consists of several components:
//!
//! - **Spec** - The YAML table document and its validation
//! - **Introspect** - Reads live schemas out of the database catalogs
//! - **Planner** - Diffs desired against live into abstract operations
//! - **Dialect** - Renders operations into database-specific DDL
//! - **Driver** - Ties a connection pool to plan, render and apply
//! - **Generate** - Exports live tables back into table documents
//!
//! # Example
//!
//! ```rust,ignore
//! use schemaplan::prelude::*;
//!
//! let doc = TableDoc::from_yaml(&std::fs::read_to_string("users.yaml")?)?;
//! let driver = SchemaDriver::connect(doc.spec.dialect()?, &database_url).await?;
//!
//! let plan = driver.plan_table(&doc.spec, PlannerOptions::default()).await?;
//! for statement in driver.render(&plan.ops)? {
//!     println!("{statement}");
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Print the DDL that would bring tables in line with their specs
//! schemaplan plan users.yaml orders.yaml
//!
//! # Apply it
//! schemaplan apply users.yaml orders.yaml
//!
//! # Export a live database into table documents
//! schemaplan generate --output-dir ./tables
//! ```

pub mod dialect;
pub mod driver;
pub mod error;
pub mod generate;
pub mod introspect;
pub mod operations;
pub mod planner;
pub mod schema;
pub mod spec;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{Dialect, MysqlDialect, PostgresDialect, SqlDialect};
    pub use crate::driver::SchemaDriver;
    pub use crate::error::{Error, Result};
    pub use crate::generate::{generate_all, table_doc, GeneratedFile};
    pub use crate::operations::{ColumnChanges, SchemaOp};
    pub use crate::planner::{Plan, Planner, PlannerOptions};
    pub use crate::schema::{
        ColumnDef, ColumnType, ForeignKeyAction, ForeignKeyDef, IndexDef, TableSchema,
    };
    pub use crate::spec::{TableDoc, TableSpec};
}
