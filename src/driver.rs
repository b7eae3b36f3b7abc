//! Database connection handling.
//!
//! [`SchemaDriver`] owns a connection pool for one target database and ties
//! together introspection, planning, rendering, and execution for it.

use sqlx::{MySqlPool, PgPool};
use tracing::{debug, info};

use crate::dialect::{Dialect, MysqlDialect, PostgresDialect, SqlDialect};
use crate::error::{Error, Result};
use crate::introspect;
use crate::operations::SchemaOp;
use crate::planner::{Plan, Planner, PlannerOptions};
use crate::schema::TableSchema;
use crate::spec::TableSpec;

/// A connected target database.
pub struct SchemaDriver {
    dialect: Dialect,
    pool: Pool,
}

enum Pool {
    Postgres(PgPool),
    Mysql(MySqlPool),
}

impl SchemaDriver {
    /// Connects to the database at `uri` using the pool type for `dialect`.
    ///
    /// CockroachDB speaks the Postgres wire protocol and shares its pool.
    pub async fn connect(dialect: Dialect, uri: &str) -> Result<Self> {
        let pool = if dialect.is_postgres_family() {
            Pool::Postgres(PgPool::connect(uri).await.map_err(Error::Connection)?)
        } else {
            Pool::Mysql(MySqlPool::connect(uri).await.map_err(Error::Connection)?)
        };
        info!(dialect = %dialect, "connected");
        Ok(Self { dialect, pool })
    }

    /// The dialect this driver was connected for.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn renderer(&self) -> &'static dyn SqlDialect {
        match self.pool {
            Pool::Postgres(_) => &PostgresDialect,
            Pool::Mysql(_) => &MysqlDialect,
        }
    }

    /// Lists user tables in the connected database.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        match &self.pool {
            Pool::Postgres(pool) => introspect::postgres_list_tables(pool).await,
            Pool::Mysql(pool) => introspect::mysql_list_tables(pool).await,
        }
    }

    /// Reads the live schema of `table`, or `None` if it does not exist.
    pub async fn introspect_table(&self, table: &str) -> Result<Option<TableSchema>> {
        match &self.pool {
            Pool::Postgres(pool) => introspect::postgres_introspect_table(pool, table).await,
            Pool::Mysql(pool) => introspect::mysql_introspect_table(pool, table).await,
        }
    }

    /// Validates `spec`, introspects the live table, and computes the plan.
    pub async fn plan_table(&self, spec: &TableSpec, options: PlannerOptions) -> Result<Plan> {
        spec.validate()?;
        let spec_dialect = spec.dialect()?;
        if spec_dialect.is_postgres_family() != self.dialect.is_postgres_family() {
            return Err(Error::invalid_spec(
                &spec.name,
                format!(
                    "spec targets {} but the connection is {}",
                    spec_dialect, self.dialect
                ),
            ));
        }

        let desired = spec.desired_table_schema()?;
        let live = self.introspect_table(&spec.name).await?;
        Planner::with_options(options).plan(&desired, live.as_ref())
    }

    /// Renders a plan's operations into executable DDL statements, in order.
    pub fn render(&self, ops: &[SchemaOp]) -> Result<Vec<String>> {
        let dialect = self.renderer();
        let mut statements = Vec::new();
        for op in ops {
            statements.extend(dialect.render(op)?);
        }
        Ok(statements)
    }

    /// Executes statements in order, stopping at the first failure.
    ///
    /// Statements already executed are not rolled back; DDL is not atomic on
    /// every backend, so a failed apply leaves the database in whatever state
    /// the completed statements produced. Replanning picks up from there.
    pub async fn execute(&self, statements: &[String]) -> Result<()> {
        for statement in statements {
            debug!(statement = %statement, "executing");
            let result = match &self.pool {
                Pool::Postgres(pool) => sqlx::query(statement).execute(pool).await.map(|_| ()),
                Pool::Mysql(pool) => sqlx::query(statement).execute(pool).await.map(|_| ()),
            };
            result.map_err(|e| Error::Execution {
                statement: statement.clone(),
                source: e,
            })?;
        }
        info!(statements = statements.len(), "applied");
        Ok(())
    }
}
