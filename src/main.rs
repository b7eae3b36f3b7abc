//! schemaplan CLI
//!
//! Command-line tool for reconciling declarative table schemas.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use serde::Serialize;

use schemaplan::prelude::*;

/// Machine-readable plan for one table (`plan --json`).
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanReport {
    table: String,
    statements: Vec<String>,
    warnings: Vec<String>,
}

/// Declarative table schema reconciliation.
#[derive(Parser)]
#[command(name = "schemaplan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string.
    #[arg(short, long, env = "DATABASE_URL")]
    database: String,

    /// Allow dropping live columns that are absent from the spec.
    #[arg(long)]
    allow_destructive: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the DDL that would bring tables in line with their specs.
    Plan {
        /// Table document files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Emit the plan as JSON instead of raw DDL.
        #[arg(long)]
        json: bool,
    },

    /// Compute and execute the DDL for each table document.
    Apply {
        /// Table document files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Export the live database into table documents.
    Generate {
        /// Directory the documents are written to; stdout when omitted.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Dialect of the target database.
        #[arg(long)]
        dialect: Dialect,

        /// Database name written into the generated documents.
        #[arg(long, default_value = "db")]
        database_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = PlannerOptions {
        allow_destructive_drops: cli.allow_destructive,
    };

    match cli.command {
        Commands::Plan { files, json } => {
            let docs = load_docs(&files)?;
            let driver = connect_for(&docs, &cli.database).await?;
            let mut reports = Vec::new();

            for doc in &docs {
                let plan = driver.plan_table(&doc.spec, options).await?;
                report_warnings(&plan);
                for op in &plan.ops {
                    debug!("{}", op.description());
                }

                let statements = driver.render(&plan.ops)?;
                if json {
                    reports.push(PlanReport {
                        table: doc.spec.name.clone(),
                        statements,
                        warnings: plan.warnings,
                    });
                } else if statements.is_empty() {
                    info!(table = %doc.spec.name, "already converged");
                } else {
                    for statement in &statements {
                        println!("{};", statement);
                    }
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
        }

        Commands::Apply { files } => {
            let docs = load_docs(&files)?;
            let driver = connect_for(&docs, &cli.database).await?;

            for doc in &docs {
                let plan = driver.plan_table(&doc.spec, options).await?;
                report_warnings(&plan);

                if plan.is_empty() {
                    info!(table = %doc.spec.name, "already converged");
                    continue;
                }
                for op in &plan.ops {
                    debug!("{}", op.description());
                }
                let statements = driver.render(&plan.ops)?;
                driver.execute(&statements).await?;
                info!(
                    table = %doc.spec.name,
                    statements = statements.len(),
                    "applied"
                );
            }
        }

        Commands::Generate {
            output_dir,
            dialect,
            database_name,
        } => {
            let driver = SchemaDriver::connect(dialect, &cli.database).await?;
            let files = generate_all(&driver, &database_name).await?;

            match output_dir {
                Some(dir) => {
                    std::fs::create_dir_all(&dir)
                        .with_context(|| format!("creating {}", dir.display()))?;
                    for file in &files {
                        let path = dir.join(&file.name);
                        std::fs::write(&path, &file.contents)
                            .with_context(|| format!("writing {}", path.display()))?;
                        info!("wrote {}", path.display());
                    }
                }
                None => {
                    // The kustomization index only makes sense on disk.
                    for file in files.iter().filter(|f| f.name != "kustomization.yaml") {
                        println!("---");
                        print!("{}", file.contents);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Loads and parses the given table documents, ordered so that each table's
/// `requires` dependencies come before it.
fn load_docs(files: &[PathBuf]) -> anyhow::Result<Vec<TableDoc>> {
    let mut docs = Vec::with_capacity(files.len());
    for path in files {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let doc = TableDoc::from_yaml(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        docs.push(doc);
    }
    Ok(order_by_requires(docs))
}

/// Orders documents so dependencies apply first. Cycles and references to
/// tables outside the given set fall back to input order.
fn order_by_requires(mut docs: Vec<TableDoc>) -> Vec<TableDoc> {
    let known: Vec<String> = docs.iter().map(|d| d.spec.name.clone()).collect();
    let mut ordered: Vec<TableDoc> = Vec::with_capacity(docs.len());

    while !docs.is_empty() {
        let placed: Vec<String> = ordered.iter().map(|d| d.spec.name.clone()).collect();
        let next = docs.iter().position(|doc| {
            doc.spec
                .requires
                .iter()
                .all(|dep| placed.contains(dep) || !known.contains(dep))
        });
        match next {
            Some(i) => ordered.push(docs.remove(i)),
            // Cycle: keep remaining input order.
            None => {
                ordered.append(&mut docs);
                break;
            }
        }
    }
    ordered
}

async fn connect_for(docs: &[TableDoc], database: &str) -> anyhow::Result<SchemaDriver> {
    let doc = docs.first().context("no table documents given")?;
    let dialect = doc.spec.dialect()?;
    Ok(SchemaDriver::connect(dialect, database).await?)
}

fn report_warnings(plan: &Plan) {
    for warning in &plan.warnings {
        warn!("{}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaplan::spec::{SqlTableSchema, TableSchemaBlock, TableSpec};

    fn doc(name: &str, requires: &[&str]) -> TableDoc {
        TableDoc::new(TableSpec {
            database: "app".to_string(),
            name: name.to_string(),
            requires: requires.iter().map(|s| s.to_string()).collect(),
            schema: TableSchemaBlock {
                postgres: Some(SqlTableSchema {
                    columns: vec![ColumnDef::new("id", ColumnType::BigInt).not_null()],
                    ..SqlTableSchema::default()
                }),
                ..TableSchemaBlock::default()
            },
        })
    }

    #[test]
    fn test_requires_ordering() {
        let ordered = order_by_requires(vec![
            doc("orders", &["customers"]),
            doc("order_items", &["orders"]),
            doc("customers", &[]),
        ]);
        let names: Vec<&str> = ordered.iter().map(|d| d.spec.name.as_str()).collect();
        assert_eq!(names, ["customers", "orders", "order_items"]);
    }

    #[test]
    fn test_requires_cycle_falls_back_to_input_order() {
        let ordered = order_by_requires(vec![doc("a", &["b"]), doc("b", &["a"])]);
        let names: Vec<&str> = ordered.iter().map(|d| d.spec.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn test_unknown_requires_are_ignored() {
        let ordered = order_by_requires(vec![doc("orders", &["not_managed_here"])]);
        assert_eq!(ordered.len(), 1);
    }
}
