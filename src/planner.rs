//! The dialect-agnostic diff/plan engine.
//!
//! Given a desired table schema and the introspected live schema, produces
//! the ordered list of abstract operations that brings the live table into
//! conformance. Rendering into DDL is the dialect's job; this module never
//! touches SQL.

use tracing::{debug, warn};

use crate::error::Result;
use crate::operations::{ColumnChanges, SchemaOp};
use crate::schema::{ColumnDef, ForeignKeyDef, IndexDef, TableSchema};

/// Options for the planner.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlannerOptions {
    /// Whether live columns absent from the desired spec are dropped.
    ///
    /// Off by default: such columns are reported as warnings instead of
    /// silently destroying data.
    pub allow_destructive_drops: bool,
}

/// The result of one planning run.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Ordered operations; empty when live already matches desired.
    pub ops: Vec<SchemaOp>,
    /// Divergences that were detected but not planned (e.g. skipped
    /// destructive drops). Never silently empty when something was skipped.
    pub warnings: Vec<String>,
}

impl Plan {
    /// Returns true if the plan has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Computes schema change plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct Planner {
    options: PlannerOptions,
}

impl Planner {
    /// Creates a planner with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a planner with custom options.
    #[must_use]
    pub fn with_options(options: PlannerOptions) -> Self {
        Self { options }
    }

    /// Diffs the desired schema against the live schema.
    ///
    /// `live` is `None` when the table does not exist; the plan is then a
    /// single `CreateTable` carrying the whole desired schema.
    pub fn plan(&self, desired: &TableSchema, live: Option<&TableSchema>) -> Result<Plan> {
        let Some(live) = live else {
            debug!(table = %desired.name, "table absent, planning create");
            return Ok(Plan {
                ops: vec![SchemaOp::CreateTable {
                    table: desired.clone(),
                }],
                warnings: Vec::new(),
            });
        };

        let mut plan = Plan::default();
        let table = &desired.name;

        let (add_columns, alter_columns, drop_columns) =
            self.diff_columns(table, desired, live, &mut plan.warnings);
        let set_primary_key = self.diff_primary_key(table, desired, live, &mut plan.warnings);
        let (drop_indexes, rename_indexes, add_indexes) =
            diff_indexes(table, &desired.indexes, &live.indexes);
        let (drop_fks, add_fks) =
            diff_foreign_keys(table, &desired.foreign_keys, &live.foreign_keys);

        if desired.charset.is_some() && desired.charset != live.charset {
            plan.warnings.push(format!(
                "table '{}': live charset {:?} differs from desired {:?}; \
                 table option changes are not planned",
                table, live.charset, desired.charset
            ));
        }

        // Ordering is a correctness requirement: constraint and index drops
        // must precede the column drops they depend on, column adds must
        // precede the index/key operations that reference them.
        plan.ops.extend(drop_fks);
        plan.ops.extend(drop_indexes);
        plan.ops.extend(add_columns);
        plan.ops.extend(alter_columns);
        plan.ops.extend(set_primary_key);
        plan.ops.extend(drop_columns);
        plan.ops.extend(rename_indexes);
        plan.ops.extend(add_indexes);
        plan.ops.extend(add_fks);

        debug!(
            table = %table,
            operations = plan.ops.len(),
            warnings = plan.warnings.len(),
            "plan computed"
        );

        Ok(plan)
    }

    fn diff_columns(
        &self,
        table: &str,
        desired: &TableSchema,
        live: &TableSchema,
        warnings: &mut Vec<String>,
    ) -> (Vec<SchemaOp>, Vec<SchemaOp>, Vec<SchemaOp>) {
        let mut adds = Vec::new();
        let mut alters = Vec::new();
        let mut drops = Vec::new();

        for column in &desired.columns {
            match live.columns.iter().find(|c| c.name == column.name) {
                None => adds.push(SchemaOp::add_column(table, column.clone())),
                Some(live_column) => {
                    let changes = diff_column(live_column, column, desired);
                    if !changes.is_empty() {
                        alters.push(SchemaOp::AlterColumn {
                            table: table.to_string(),
                            column: column.clone(),
                            changes,
                        });
                    }
                }
            }
        }

        for live_column in &live.columns {
            if desired.columns.iter().any(|c| c.name == live_column.name) {
                continue;
            }
            if self.options.allow_destructive_drops {
                drops.push(SchemaOp::drop_column(table, &live_column.name));
            } else {
                warn!(
                    table = %table,
                    column = %live_column.name,
                    "live column absent from spec; destructive drops are disabled"
                );
                warnings.push(format!(
                    "table '{}': column '{}' exists but is not in the spec; \
                     enable destructive drops to remove it",
                    table, live_column.name
                ));
            }
        }

        (adds, alters, drops)
    }

    fn diff_primary_key(
        &self,
        table: &str,
        desired: &TableSchema,
        live: &TableSchema,
        warnings: &mut Vec<String>,
    ) -> Option<SchemaOp> {
        match (&desired.primary_key, &live.primary_key) {
            (Some(want), Some(have)) if want == have => None,
            (Some(want), have) => {
                // Replace the live key under its real constraint name; fall
                // back to the conventional one when a model doesn't carry it.
                let drop_constraint = have.is_some().then(|| {
                    live.primary_key_name
                        .clone()
                        .unwrap_or_else(|| format!("{}_pkey", table))
                });
                Some(SchemaOp::SetPrimaryKey {
                    table: table.to_string(),
                    columns: want.clone(),
                    drop_constraint,
                })
            }
            (None, Some(_)) => {
                warnings.push(format!(
                    "table '{}': live table has a primary key but the spec declares none; \
                     leaving the key in place",
                    table
                ));
                None
            }
            (None, None) => None,
        }
    }
}

fn diff_column(live: &ColumnDef, desired: &ColumnDef, table: &TableSchema) -> ColumnChanges {
    let mut changes = ColumnChanges::new();

    if live.column_type != desired.column_type {
        changes.column_type = Some(desired.column_type.clone());
    }
    if live.nullable != desired.nullable {
        changes.nullable = Some(desired.nullable);
    }
    if normalized_default(live.default.as_deref()) != normalized_default(desired.default.as_deref())
    {
        changes.default = Some(desired.default.clone());
    }

    // Introspectors report a column charset only when it differs from the
    // table default; normalize the desired side the same way.
    let desired_charset = desired
        .charset
        .as_deref()
        .filter(|c| Some(*c) != table.charset.as_deref());
    if live.charset.as_deref() != desired_charset {
        changes.charset = Some(desired_charset.map(str::to_string));
    }
    let desired_collation = desired
        .collation
        .as_deref()
        .filter(|c| Some(*c) != table.collation.as_deref());
    if live.collation.as_deref() != desired_collation {
        changes.collation = Some(desired_collation.map(str::to_string));
    }

    changes
}

/// Normalizes a default expression for comparison.
///
/// Postgres reports defaults with a trailing type cast (`'a'::text`); the
/// cast carries no information the column type doesn't already have. Only a
/// `::` outside single-quoted literals starts a cast.
fn normalized_default(default: Option<&str>) -> Option<String> {
    let default = default?.trim();

    let bytes = default.as_bytes();
    let mut in_quote = false;
    let mut cast_pos = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b':' if !in_quote && bytes.get(i + 1) == Some(&b':') => {
                cast_pos = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    let stripped = match cast_pos {
        Some(pos) if pos > 0 => default[..pos].trim_end(),
        _ => default,
    };
    Some(stripped.to_string())
}

fn diff_indexes(
    table: &str,
    desired: &[IndexDef],
    live: &[IndexDef],
) -> (Vec<SchemaOp>, Vec<SchemaOp>, Vec<SchemaOp>) {
    let mut drops = Vec::new();
    let mut renames = Vec::new();
    let mut adds = Vec::new();

    let desired_names: Vec<String> = desired.iter().map(|i| i.effective_name(table)).collect();
    // Live indexes consumed by a rename; they must not also be dropped.
    let mut renamed_live: Vec<String> = Vec::new();

    for (index, name) in desired.iter().zip(&desired_names) {
        match live.iter().find(|l| &l.effective_name(table) == name) {
            Some(live_index) => {
                if !index.same_definition(live_index) {
                    // Index semantics vary too much across dialects to
                    // express an in-place alter; rebuild instead.
                    drops.push(SchemaOp::drop_index(table, name, live_index.is_unique));
                    adds.push(SchemaOp::add_index(table, index.clone()));
                }
            }
            None => {
                // Same definition under another live name is a rename, which
                // keeps the index and avoids the rebuild cost.
                let rename_source = live.iter().find(|l| {
                    let live_name = l.effective_name(table);
                    index.same_definition(l)
                        && !desired_names.contains(&live_name)
                        && !renamed_live.contains(&live_name)
                });
                match rename_source {
                    Some(live_index) => {
                        let live_name = live_index.effective_name(table);
                        renamed_live.push(live_name.clone());
                        renames.push(SchemaOp::RenameIndex {
                            table: table.to_string(),
                            from: live_name,
                            to: name.clone(),
                        });
                    }
                    None => adds.push(SchemaOp::add_index(table, index.clone())),
                }
            }
        }
    }

    for live_index in live {
        let live_name = live_index.effective_name(table);
        if desired_names.contains(&live_name) || renamed_live.contains(&live_name) {
            continue;
        }
        drops.push(SchemaOp::drop_index(table, live_name, live_index.is_unique));
    }

    (drops, renames, adds)
}

fn diff_foreign_keys(
    table: &str,
    desired: &[ForeignKeyDef],
    live: &[ForeignKeyDef],
) -> (Vec<SchemaOp>, Vec<SchemaOp>) {
    let mut drops = Vec::new();
    let mut adds = Vec::new();
    let mut matched_live: Vec<usize> = Vec::new();

    for fk in desired {
        // Named keys match by name; unnamed keys by column/target identity.
        let live_match = live.iter().enumerate().find(|(i, l)| {
            if matched_live.contains(i) {
                return false;
            }
            match &fk.name {
                Some(name) => l.effective_name(table) == *name,
                None => l.identity() == fk.identity(),
            }
        });

        match live_match {
            Some((i, live_fk)) => {
                matched_live.push(i);
                if live_fk.identity() != fk.identity() || !live_fk.same_actions(fk) {
                    drops.push(SchemaOp::drop_foreign_key(
                        table,
                        live_fk.effective_name(table),
                    ));
                    adds.push(SchemaOp::add_foreign_key(table, fk.clone()));
                }
            }
            None => adds.push(SchemaOp::add_foreign_key(table, fk.clone())),
        }
    }

    for (i, live_fk) in live.iter().enumerate() {
        if !matched_live.contains(&i) {
            drops.push(SchemaOp::drop_foreign_key(
                table,
                live_fk.effective_name(table),
            ));
        }
    }

    (drops, adds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnType, ForeignKeyAction};

    fn planner() -> Planner {
        Planner::new()
    }

    fn destructive_planner() -> Planner {
        Planner::with_options(PlannerOptions {
            allow_destructive_drops: true,
        })
    }

    fn users() -> TableSchema {
        TableSchema::new("users")
            .column(ColumnDef::new("id", ColumnType::BigInt).not_null())
            .column(ColumnDef::new("email", ColumnType::Varchar(255)).not_null())
            .primary_key(vec!["id".to_string()])
    }

    /// Applies a plan's operations to a live model, mimicking successful
    /// execution against the database.
    fn apply(live: Option<&TableSchema>, plan: &Plan) -> TableSchema {
        let mut table = live.cloned().unwrap_or_else(|| TableSchema::new(""));
        for op in &plan.ops {
            match op {
                SchemaOp::CreateTable { table: t } => table = t.clone(),
                SchemaOp::AddColumn { column, .. } => table.columns.push(column.clone()),
                SchemaOp::AlterColumn { column, .. } => {
                    let slot = table
                        .columns
                        .iter_mut()
                        .find(|c| c.name == column.name)
                        .expect("altered column exists");
                    *slot = column.clone();
                }
                SchemaOp::DropColumn { column_name, .. } => {
                    table.columns.retain(|c| c.name != *column_name);
                }
                SchemaOp::SetPrimaryKey { columns, .. } => {
                    table.primary_key = Some(columns.clone());
                    table.primary_key_name = None;
                }
                SchemaOp::AddIndex { index, .. } => {
                    let mut index = index.clone();
                    index.name = Some(index.effective_name(&table.name));
                    table.indexes.push(index);
                }
                SchemaOp::DropIndex { name, .. } => {
                    let table_name = table.name.clone();
                    table
                        .indexes
                        .retain(|i| i.effective_name(&table_name) != *name);
                }
                SchemaOp::RenameIndex { from, to, .. } => {
                    let table_name = table.name.clone();
                    let index = table
                        .indexes
                        .iter_mut()
                        .find(|i| i.effective_name(&table_name) == *from)
                        .expect("renamed index exists");
                    index.name = Some(to.clone());
                }
                SchemaOp::AddForeignKey { foreign_key, .. } => {
                    let mut fk = foreign_key.clone();
                    fk.name = Some(fk.effective_name(&table.name));
                    table.foreign_keys.push(fk);
                }
                SchemaOp::DropForeignKey { name, .. } => {
                    let table_name = table.name.clone();
                    table
                        .foreign_keys
                        .retain(|fk| fk.effective_name(&table_name) != *name);
                }
            }
        }
        table
    }

    #[test]
    fn test_absent_table_plans_single_create() {
        let plan = planner().plan(&users(), None).unwrap();
        assert_eq!(plan.ops.len(), 1);
        assert!(matches!(plan.ops[0], SchemaOp::CreateTable { .. }));
    }

    #[test]
    fn test_matching_schemas_plan_nothing() {
        let desired = users();
        let plan = planner().plan(&desired, Some(&desired)).unwrap();
        assert!(plan.is_empty());
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_new_column_planned() {
        let live = users();
        let desired = users().column(ColumnDef::new("created_at", ColumnType::Timestamp));

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert_eq!(plan.ops.len(), 1);
        match &plan.ops[0] {
            SchemaOp::AddColumn { column, .. } => assert_eq!(column.name, "created_at"),
            other => panic!("expected AddColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_removed_column_warns_by_default() {
        let live = users().column(ColumnDef::new("legacy", ColumnType::Text));
        let desired = users();

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("legacy"));
    }

    #[test]
    fn test_removed_column_dropped_when_allowed() {
        let live = users().column(ColumnDef::new("legacy", ColumnType::Text));
        let desired = users();

        let plan = destructive_planner().plan(&desired, Some(&live)).unwrap();
        assert_eq!(plan.ops.len(), 1);
        assert!(matches!(plan.ops[0], SchemaOp::DropColumn { .. }));
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn test_changed_column_planned_as_alter() {
        let live = users().column(ColumnDef::new("age", ColumnType::Integer));
        let desired = users().column(ColumnDef::new("age", ColumnType::BigInt).not_null());

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert_eq!(plan.ops.len(), 1);
        match &plan.ops[0] {
            SchemaOp::AlterColumn { changes, .. } => {
                assert_eq!(changes.column_type, Some(ColumnType::BigInt));
                assert_eq!(changes.nullable, Some(false));
                assert_eq!(changes.default, None);
            }
            other => panic!("expected AlterColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_default_cast_suffix_not_a_change() {
        let live = users().column(
            ColumnDef::new("status", ColumnType::Text).default_value("'active'::text"),
        );
        let desired =
            users().column(ColumnDef::new("status", ColumnType::Text).default_value("'active'"));

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_cast_inside_quoted_default_is_not_stripped() {
        let live = users().column(
            ColumnDef::new("status", ColumnType::Text).default_value("'a::c'::text"),
        );
        let desired =
            users().column(ColumnDef::new("status", ColumnType::Text).default_value("'a::b'"));

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert_eq!(plan.ops.len(), 1);
        match &plan.ops[0] {
            SchemaOp::AlterColumn { changes, .. } => {
                assert_eq!(changes.default, Some(Some("'a::b'".to_string())));
            }
            other => panic!("expected AlterColumn, got {:?}", other),
        }

        // The same literal differing only by the outer cast stays converged.
        let desired =
            users().column(ColumnDef::new("status", ColumnType::Text).default_value("'a::c'"));
        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_primary_key_order_change_is_one_set_op() {
        let live = users().primary_key(vec!["id".to_string(), "email".to_string()]);
        let desired = users().primary_key(vec!["email".to_string(), "id".to_string()]);

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert_eq!(plan.ops.len(), 1);
        match &plan.ops[0] {
            SchemaOp::SetPrimaryKey {
                columns,
                drop_constraint,
                ..
            } => {
                assert_eq!(columns, &["email".to_string(), "id".to_string()]);
                assert_eq!(drop_constraint.as_deref(), Some("users_pkey"));
            }
            other => panic!("expected SetPrimaryKey, got {:?}", other),
        }
    }

    #[test]
    fn test_primary_key_replacement_uses_live_constraint_name() {
        let mut live = users();
        live.primary_key_name = Some("users_custom_pk".to_string());
        let desired = users().primary_key(vec!["email".to_string()]);

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert_eq!(plan.ops.len(), 1);
        match &plan.ops[0] {
            SchemaOp::SetPrimaryKey {
                drop_constraint, ..
            } => assert_eq!(drop_constraint.as_deref(), Some("users_custom_pk")),
            other => panic!("expected SetPrimaryKey, got {:?}", other),
        }
    }

    #[test]
    fn test_column_charset_change_planned_as_alter() {
        let mut live = users().column(
            ColumnDef::new("name", ColumnType::Varchar(100)).charset("latin1"),
        );
        live.charset = Some("utf8mb4".to_string());
        let mut desired = users().column(
            ColumnDef::new("name", ColumnType::Varchar(100)).charset("utf8"),
        );
        desired.charset = Some("utf8mb4".to_string());

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert_eq!(plan.ops.len(), 1);
        match &plan.ops[0] {
            SchemaOp::AlterColumn { changes, .. } => {
                assert_eq!(changes.charset, Some(Some("utf8".to_string())));
                assert_eq!(changes.column_type, None);
            }
            other => panic!("expected AlterColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_column_charset_matching_table_default_is_not_a_change() {
        let mut live = users().column(ColumnDef::new("name", ColumnType::Varchar(100)));
        live.charset = Some("utf8mb4".to_string());
        // The live side reports no charset because it matches the table
        // default; an explicit matching charset in the spec is the same thing.
        let mut desired = users().column(
            ColumnDef::new("name", ColumnType::Varchar(100)).charset("utf8mb4"),
        );
        desired.charset = Some("utf8mb4".to_string());

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_new_index_planned() {
        let orders = TableSchema::new("orders")
            .column(ColumnDef::new("id", ColumnType::BigInt).not_null())
            .column(ColumnDef::new("customer_id", ColumnType::BigInt))
            .primary_key(vec!["id".to_string()]);
        let desired = orders
            .clone()
            .index(IndexDef::new(vec!["customer_id".to_string()]));

        let plan = planner().plan(&desired, Some(&orders)).unwrap();
        assert_eq!(plan.ops.len(), 1);
        match &plan.ops[0] {
            SchemaOp::AddIndex { index, .. } => {
                assert_eq!(index.effective_name("orders"), "idx_orders_customer_id");
                assert!(!index.is_unique);
            }
            other => panic!("expected AddIndex, got {:?}", other),
        }
    }

    #[test]
    fn test_omitted_index_planned_as_drop() {
        let live = users().index(
            IndexDef::new(vec!["email".to_string()])
                .unique()
                .named("idx_email"),
        );
        let desired = users();

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert_eq!(plan.ops.len(), 1);
        match &plan.ops[0] {
            SchemaOp::DropIndex {
                name, is_unique, ..
            } => {
                assert_eq!(name, "idx_email");
                assert!(is_unique);
            }
            other => panic!("expected DropIndex, got {:?}", other),
        }
    }

    #[test]
    fn test_changed_index_planned_as_drop_then_add() {
        let live = users().index(IndexDef::new(vec!["email".to_string()]).named("idx_email"));
        let desired = users().index(
            IndexDef::new(vec!["email".to_string()])
                .unique()
                .named("idx_email"),
        );

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert_eq!(plan.ops.len(), 2);
        assert!(matches!(plan.ops[0], SchemaOp::DropIndex { .. }));
        assert!(matches!(plan.ops[1], SchemaOp::AddIndex { .. }));
    }

    #[test]
    fn test_renamed_index_planned_as_rename_not_rebuild() {
        let live = users().index(IndexDef::new(vec!["email".to_string()]).unique());
        let desired = users().index(
            IndexDef::new(vec!["email".to_string()])
                .unique()
                .named("idx_users_email_unique"),
        );

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert_eq!(plan.ops.len(), 1);
        match &plan.ops[0] {
            SchemaOp::RenameIndex { from, to, .. } => {
                assert_eq!(from, "idx_users_email");
                assert_eq!(to, "idx_users_email_unique");
            }
            other => panic!("expected RenameIndex, got {:?}", other),
        }
    }

    #[test]
    fn test_foreign_key_action_change_is_drop_then_add() {
        let fk = ForeignKeyDef::new(
            vec!["customer_id".to_string()],
            "customers",
            vec!["id".to_string()],
        );
        let base = TableSchema::new("orders")
            .column(ColumnDef::new("id", ColumnType::BigInt).not_null())
            .column(ColumnDef::new("customer_id", ColumnType::BigInt));

        let live = base.clone().foreign_key(fk.clone().named("orders_customer_id_fkey"));
        let desired = base.foreign_key(fk.on_delete(ForeignKeyAction::Cascade));

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert_eq!(plan.ops.len(), 2);
        assert!(matches!(plan.ops[0], SchemaOp::DropForeignKey { .. }));
        assert!(matches!(plan.ops[1], SchemaOp::AddForeignKey { .. }));
    }

    #[test]
    fn test_unnamed_foreign_key_matches_by_identity() {
        let base = TableSchema::new("orders")
            .column(ColumnDef::new("id", ColumnType::BigInt).not_null())
            .column(ColumnDef::new("customer_id", ColumnType::BigInt));
        let live = base.clone().foreign_key(
            ForeignKeyDef::new(
                vec!["customer_id".to_string()],
                "customers",
                vec!["id".to_string()],
            )
            .named("fk_live_name"),
        );
        let desired = base.foreign_key(ForeignKeyDef::new(
            vec!["customer_id".to_string()],
            "customers",
            vec!["id".to_string()],
        ));

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_drop_ordering_invariant() {
        // Live table has an index and a foreign key on a column the spec
        // removed; their drops must precede the column drop.
        let live = users()
            .column(ColumnDef::new("customer_id", ColumnType::BigInt))
            .index(IndexDef::new(vec!["customer_id".to_string()]))
            .foreign_key(ForeignKeyDef::new(
                vec!["customer_id".to_string()],
                "customers",
                vec!["id".to_string()],
            ));
        let desired = users();

        let plan = destructive_planner().plan(&desired, Some(&live)).unwrap();
        let position = |pred: fn(&SchemaOp) -> bool| {
            plan.ops.iter().position(pred).expect("operation present")
        };
        let fk_drop = position(|op| matches!(op, SchemaOp::DropForeignKey { .. }));
        let index_drop = position(|op| matches!(op, SchemaOp::DropIndex { .. }));
        let column_drop = position(|op| matches!(op, SchemaOp::DropColumn { .. }));

        assert!(fk_drop < column_drop);
        assert!(index_drop < column_drop);
    }

    #[test]
    fn test_add_ordering_invariant() {
        // New column plus index/foreign key on it: adds must come after the
        // column, and the primary key change sits between.
        let live = users();
        let desired = users()
            .column(ColumnDef::new("customer_id", ColumnType::BigInt).not_null())
            .primary_key(vec!["id".to_string(), "customer_id".to_string()])
            .index(IndexDef::new(vec!["customer_id".to_string()]))
            .foreign_key(ForeignKeyDef::new(
                vec!["customer_id".to_string()],
                "customers",
                vec!["id".to_string()],
            ));

        let plan = planner().plan(&desired, Some(&live)).unwrap();
        let position = |pred: fn(&SchemaOp) -> bool| {
            plan.ops.iter().position(pred).expect("operation present")
        };
        let column_add = position(|op| matches!(op, SchemaOp::AddColumn { .. }));
        let set_pk = position(|op| matches!(op, SchemaOp::SetPrimaryKey { .. }));
        let index_add = position(|op| matches!(op, SchemaOp::AddIndex { .. }));
        let fk_add = position(|op| matches!(op, SchemaOp::AddForeignKey { .. }));

        assert!(column_add < set_pk);
        assert!(set_pk < index_add);
        assert!(column_add < fk_add);
    }

    #[test]
    fn test_plan_is_idempotent_after_apply() {
        let live = users().column(ColumnDef::new("legacy", ColumnType::Text));
        let desired = users()
            .column(ColumnDef::new("created_at", ColumnType::Timestamp))
            .index(
                IndexDef::new(vec!["email".to_string()])
                    .unique()
                    .named("idx_email"),
            )
            .foreign_key(ForeignKeyDef::new(
                vec!["email".to_string()],
                "accounts",
                vec!["email".to_string()],
            ));

        let planner = destructive_planner();
        let plan = planner.plan(&desired, Some(&live)).unwrap();
        assert!(!plan.is_empty());

        let applied = apply(Some(&live), &plan);
        let replan = planner.plan(&desired, Some(&applied)).unwrap();
        assert!(replan.is_empty(), "second plan not empty: {:?}", replan.ops);
    }

    #[test]
    fn test_create_then_plan_is_idempotent() {
        let desired = users()
            .index(IndexDef::new(vec!["email".to_string()]).unique())
            .foreign_key(ForeignKeyDef::new(
                vec!["email".to_string()],
                "accounts",
                vec!["email".to_string()],
            ));

        let plan = planner().plan(&desired, None).unwrap();
        let applied = apply(None, &plan);
        let replan = planner().plan(&desired, Some(&applied)).unwrap();
        assert!(replan.is_empty(), "second plan not empty: {:?}", replan.ops);
    }
}
