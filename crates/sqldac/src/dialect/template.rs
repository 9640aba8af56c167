//! Dialect templates.
//!
//! Each constructor renders one statement shape against the render context's
//! current-table key and returns a [`Template`]: the SQL text, the binding
//! plan (ordered record fields bound per entry), any write-back fields, and
//! arguments already collected from conditions or sub-queries.

use super::{Dialect, Method};
use crate::bind::FieldValue;
use crate::cond::{Arguments, Cond};
use crate::context::{table_sql_of, RenderCtx};
use crate::error::{DacError, DacResult};
use crate::expr::{GroupBy, Orders, QueryExpr};
use crate::spec::{Column, ColumnKind, LinkOrder, Specification};
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::{Arc, OnceLock};

/// Output of a template constructor.
#[derive(Debug, Clone)]
pub struct Template {
    pub method: Method,
    pub sql: String,
    /// Record fields bound per entry, in placeholder order, before `tail`.
    pub plan: Vec<String>,
    /// Record fields written back from RETURNING / LAST_INSERT_ID.
    pub returning: Vec<String>,
    /// Selected record fields in projection order (query shapes only).
    pub selected: Vec<String>,
    /// Arguments collected during rendering (conditions, sub-queries,
    /// explicit field values); appended after the plan-bound values.
    pub tail: Arguments,
}

impl Template {
    fn execute(sql: String) -> Self {
        Self {
            method: Method::Execute,
            sql,
            plan: Vec::new(),
            returning: Vec::new(),
            selected: Vec::new(),
            tail: Arguments::new(),
        }
    }
}

/// Query options shared by the query and view shapes.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub cond: Option<Cond>,
    pub orders: Orders,
    /// `(offset, limit)`; `None` omits the range clause.
    pub page: Option<(u64, u64)>,
}

/// View options: query options plus grouping.
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    pub query: QueryOptions,
    pub group: Option<GroupBy>,
}

fn insert_columns(spec: &Specification) -> Vec<&Column> {
    spec.columns.iter().filter(|c| c.in_insert_columns()).collect()
}

fn push_column_list(ctx: &RenderCtx, cols: &[&Column], sql: &mut String) {
    for (i, col) in cols.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        ctx.format_ident(&col.name, sql);
    }
}

/// VALUES groups; the version column slot emits a literal `1`, never a
/// placeholder.
fn push_values_groups(ctx: &mut RenderCtx, cols: &[&Column], rows: usize, sql: &mut String) {
    for row in 0..rows {
        if row > 0 {
            sql.push(',');
        }
        sql.push('(');
        for (i, col) in cols.iter().enumerate() {
            if i > 0 {
                sql.push(',');
            }
            if matches!(col.kind, ColumnKind::Version) {
                sql.push('1');
            } else {
                ctx.next_placeholder(sql);
            }
        }
        sql.push(')');
    }
}

fn insert_plan(cols: &[&Column]) -> Vec<String> {
    cols.iter()
        .filter(|c| c.in_insert_plan())
        .map(|c| c.field.clone())
        .collect()
}

/// `INSERT INTO t (cols) VALUES (…)[, (…)]*` with dialect conflict handling
/// and auto-increment write-back.
pub fn insert(ctx: &mut RenderCtx, rows: usize) -> DacResult<Template> {
    let spec = ctx.key().clone();
    if rows == 0 {
        return Err(DacError::invariant(
            spec.name.clone(),
            "insert requires at least one row",
        ));
    }
    let dialect = ctx.dialect_arc();
    dialect.validate_insert(&spec, rows)?;

    let cols = insert_columns(&spec);
    if cols.is_empty() {
        return Err(DacError::invariant(
            spec.name.clone(),
            "record has no insertable columns",
        ));
    }

    let mut sql = String::from("INSERT ");
    if !spec.conflicts.is_empty() {
        sql.push_str(dialect.insert_ignore_prefix());
    }
    sql.push_str("INTO ");
    sql.push_str(&ctx.table_sql());
    sql.push_str(" (");
    push_column_list(ctx, &cols, &mut sql);
    sql.push_str(") VALUES ");
    push_values_groups(ctx, &cols, rows, &mut sql);
    dialect.insert_conflict_suffix(ctx, &spec, &mut sql);

    let mut template = Template::execute(sql);
    template.plan = insert_plan(&cols);
    if let Some(pk) = spec.pk() {
        if matches!(pk.kind, ColumnKind::Pk { incr: true }) {
            if dialect.supports_returning() {
                template.sql.push_str(" RETURNING ");
                ctx.format_ident(&pk.name, &mut template.sql);
                template.method = Method::Query;
            }
            template.returning.push(pk.field.clone());
        }
    }
    Ok(template)
}

/// `INSERT … ON CONFLICT (cols) DO UPDATE …` / `… ON DUPLICATE KEY UPDATE …`.
pub fn upsert(ctx: &mut RenderCtx, rows: usize) -> DacResult<Template> {
    let spec = ctx.key().clone();
    if spec.conflicts.is_empty() {
        return Err(DacError::invariant(
            spec.name.clone(),
            "upsert requires a conflict key set",
        ));
    }
    if rows == 0 {
        return Err(DacError::invariant(
            spec.name.clone(),
            "upsert requires at least one row",
        ));
    }
    let dialect = ctx.dialect_arc();
    let cols = insert_columns(&spec);

    let mut sql = String::from("INSERT INTO ");
    sql.push_str(&ctx.table_sql());
    sql.push_str(" (");
    push_column_list(ctx, &cols, &mut sql);
    sql.push_str(") VALUES ");
    push_values_groups(ctx, &cols, rows, &mut sql);

    let mut plan = insert_plan(&cols);
    dialect.upsert_clause(ctx, &spec, rows, &mut sql, &mut plan)?;

    let mut template = Template::execute(sql);
    template.plan = plan;
    if let Some(pk) = spec.pk() {
        if matches!(pk.kind, ColumnKind::Pk { incr: true }) {
            if dialect.supports_returning() {
                // Conflict columns ride along so returned rows can be matched
                // back to their input records.
                template.sql.push_str(" RETURNING ");
                ctx.format_ident(&pk.name, &mut template.sql);
                for col in spec.conflict_columns() {
                    template.sql.push(',');
                    ctx.format_ident(&col.name, &mut template.sql);
                }
                template.method = Method::Query;
                template.returning.push(pk.field.clone());
                for col in spec.conflict_columns() {
                    template.returning.push(col.field.clone());
                }
            } else {
                template.returning.push(pk.field.clone());
            }
        }
    }
    Ok(template)
}

/// `INSERT INTO t (cols) SELECT … FROM (SELECT 1) tmp WHERE [NOT] EXISTS
/// (SELECT 1 FROM (⟨src⟩) src)`.
///
/// The VALUES slots are numbered before the source query renders, so the
/// source's own placeholders continue the sequence.
pub fn insert_when(ctx: &mut RenderCtx, when_exists: bool, source: &QueryExpr) -> DacResult<Template> {
    let spec = ctx.key().clone();
    let cols = insert_columns(&spec);
    if cols.is_empty() {
        return Err(DacError::invariant(
            spec.name.clone(),
            "record has no insertable columns",
        ));
    }

    let mut sql = String::from("INSERT INTO ");
    sql.push_str(&ctx.table_sql());
    sql.push_str(" (");
    push_column_list(ctx, &cols, &mut sql);
    sql.push_str(") SELECT ");
    for (i, col) in cols.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        if matches!(col.kind, ColumnKind::Version) {
            sql.push('1');
        } else {
            ctx.next_placeholder(&mut sql);
        }
    }
    sql.push_str(" FROM (SELECT 1) tmp WHERE ");
    if !when_exists {
        sql.push_str("NOT ");
    }
    sql.push_str("EXISTS (SELECT 1 FROM ");

    let mut tail = Arguments::new();
    source.render(ctx, &mut sql, &mut tail)?;
    sql.push_str(" src)");

    let mut template = Template::execute(sql);
    template.plan = insert_plan(&cols);
    template.tail = tail;
    Ok(template)
}

fn aol_assignment(ctx: &RenderCtx, aol: &Column, table_qualified: bool, sql: &mut String) {
    ctx.format_ident(&aol.name, sql);
    sql.push_str(" = ");
    if table_qualified {
        ctx.format_ident(&ctx.key().name, sql);
        sql.push('.');
    }
    ctx.format_ident(&aol.name, sql);
    sql.push_str("+1");
}

fn require_pk(spec: &Specification) -> DacResult<&Column> {
    spec.pk().ok_or_else(|| {
        DacError::invariant(spec.name.clone(), "operation requires a pk column")
    })
}

// Shapes whose SQL depends only on the specification and dialect are
// rendered once and reused.
static SHAPES: OnceLock<DashMap<(TypeId, &'static str, &'static str), Arc<Template>>> =
    OnceLock::new();

fn memoized(
    ctx: &mut RenderCtx,
    shape: &'static str,
    render: fn(&mut RenderCtx) -> DacResult<Template>,
) -> DacResult<Template> {
    let cache = SHAPES.get_or_init(DashMap::new);
    let key = (ctx.key().type_id, ctx.dialect().name(), shape);
    if let Some(t) = cache.get(&key) {
        return Ok(t.value().as_ref().clone());
    }
    let template = render(ctx)?;
    cache.insert(key, Arc::new(template.clone()));
    Ok(template)
}

/// `UPDATE t SET [aol = aol+1,] col = pN, … WHERE pk = pM [AND aol = pK]`.
///
/// Rendered once per (record type, dialect) and memoized.
pub fn update(ctx: &mut RenderCtx) -> DacResult<Template> {
    memoized(ctx, "update", render_update)
}

fn render_update(ctx: &mut RenderCtx) -> DacResult<Template> {
    let spec = ctx.key().clone();
    let pk = require_pk(&spec)?;
    let set_cols: Vec<&Column> = spec.columns.iter().filter(|c| c.in_update_set()).collect();
    if set_cols.is_empty() {
        return Err(DacError::invariant(
            spec.name.clone(),
            "record has no updatable columns",
        ));
    }

    let mut sql = String::from("UPDATE ");
    sql.push_str(&ctx.table_sql());
    sql.push_str(" SET ");
    let mut first = true;
    if let Some(aol) = spec.version() {
        aol_assignment(ctx, aol, false, &mut sql);
        first = false;
    }
    let mut plan = Vec::with_capacity(set_cols.len() + 2);
    for col in &set_cols {
        if !first {
            sql.push_str(", ");
        }
        first = false;
        ctx.format_ident(&col.name, &mut sql);
        sql.push_str(" = ");
        ctx.next_placeholder(&mut sql);
        plan.push(col.field.clone());
    }

    sql.push_str(" WHERE ");
    ctx.format_ident(&pk.name, &mut sql);
    sql.push_str(" = ");
    ctx.next_placeholder(&mut sql);
    plan.push(pk.field.clone());
    if let Some(aol) = spec.version() {
        sql.push_str(" AND ");
        ctx.format_ident(&aol.name, &mut sql);
        sql.push_str(" = ");
        ctx.next_placeholder(&mut sql);
        plan.push(aol.field.clone());
    }

    let mut template = Template::execute(sql);
    template.plan = plan;
    Ok(template)
}

/// `UPDATE t SET [aol = aol+1,] fieldCol = pN, … [WHERE cond]`.
///
/// Field values must already be validated and normalized by the caller; this
/// shape binds them directly rather than through a record plan.
pub fn update_fields(
    ctx: &mut RenderCtx,
    fields: &[FieldValue],
    cond: Option<&Cond>,
) -> DacResult<Template> {
    let spec = ctx.key().clone();
    if fields.is_empty() {
        return Err(DacError::invariant(
            spec.name.clone(),
            "update-fields requires at least one field",
        ));
    }

    let mut sql = String::from("UPDATE ");
    sql.push_str(&ctx.table_sql());
    sql.push_str(" SET ");
    let mut first = true;
    if let Some(aol) = spec.version() {
        aol_assignment(ctx, aol, false, &mut sql);
        first = false;
    }

    let mut tail = Arguments::new();
    for fv in fields {
        let Some(col) = spec.column_by_field(&fv.field) else {
            return Err(DacError::render_field(
                spec.name.clone(),
                fv.field.clone(),
                "field does not resolve to a column",
            ));
        };
        if !col.field_updatable() {
            return Err(DacError::invariant_field(
                spec.name.clone(),
                fv.field.clone(),
                format!("a {} column cannot be set through update-fields", col.kind.token()),
            ));
        }
        if !first {
            sql.push_str(", ");
        }
        first = false;
        ctx.format_ident(&col.name, &mut sql);
        sql.push_str(" = ");
        ctx.next_placeholder(&mut sql);
        tail.push(fv.value.clone());
    }

    if let Some(cond) = cond {
        sql.push_str(" WHERE ");
        cond.render(ctx, &mut sql, &mut tail)?;
    }

    let mut template = Template::execute(sql);
    template.tail = tail;
    Ok(template)
}

fn soft_delete_set(
    ctx: &mut RenderCtx,
    spec: &Specification,
    sql: &mut String,
    plan: &mut Vec<String>,
) {
    let mut first = true;
    if let Some(aol) = spec.version() {
        aol_assignment(ctx, aol, false, sql);
        first = false;
    }
    for col in [spec.deleted_by(), spec.deleted_at()].into_iter().flatten() {
        if !first {
            sql.push_str(", ");
        }
        first = false;
        ctx.format_ident(&col.name, sql);
        sql.push_str(" = ");
        ctx.next_placeholder(sql);
        plan.push(col.field.clone());
    }
}

/// Delete by primary key; soft-deletes become audit updates.
///
/// Rendered once per (record type, dialect) and memoized.
pub fn delete(ctx: &mut RenderCtx) -> DacResult<Template> {
    memoized(ctx, "delete", render_delete)
}

fn render_delete(ctx: &mut RenderCtx) -> DacResult<Template> {
    let spec = ctx.key().clone();
    let pk = require_pk(&spec)?;
    let mut sql;
    let mut plan = Vec::new();

    if spec.soft_delete() {
        sql = String::from("UPDATE ");
        sql.push_str(&ctx.table_sql());
        sql.push_str(" SET ");
        soft_delete_set(ctx, &spec, &mut sql, &mut plan);
    } else {
        sql = String::from("DELETE FROM ");
        sql.push_str(&ctx.table_sql());
    }

    sql.push_str(" WHERE ");
    ctx.format_ident(&pk.name, &mut sql);
    sql.push_str(" = ");
    ctx.next_placeholder(&mut sql);
    plan.push(pk.field.clone());
    if let Some(aol) = spec.version() {
        sql.push_str(" AND ");
        ctx.format_ident(&aol.name, &mut sql);
        sql.push_str(" = ");
        ctx.next_placeholder(&mut sql);
        plan.push(aol.field.clone());
    }

    let mut template = Template::execute(sql);
    template.plan = plan;
    Ok(template)
}

/// Delete by conditions. With soft-delete, audit values bind before the
/// condition's own placeholders.
pub fn delete_by(ctx: &mut RenderCtx, cond: &Cond, audit: &[FieldValue]) -> DacResult<Template> {
    let spec = ctx.key().clone();
    let mut sql;
    let mut tail = Arguments::new();

    if spec.soft_delete() {
        sql = String::from("UPDATE ");
        sql.push_str(&ctx.table_sql());
        sql.push_str(" SET ");
        let mut first = true;
        if let Some(aol) = spec.version() {
            aol_assignment(ctx, aol, false, &mut sql);
            first = false;
        }
        for fv in audit {
            let Some(col) = spec.column_by_field(&fv.field) else {
                return Err(DacError::render_field(
                    spec.name.clone(),
                    fv.field.clone(),
                    "field does not resolve to a column",
                ));
            };
            if !first {
                sql.push_str(", ");
            }
            first = false;
            ctx.format_ident(&col.name, &mut sql);
            sql.push_str(" = ");
            ctx.next_placeholder(&mut sql);
            tail.push(fv.value.clone());
        }
    } else {
        sql = String::from("DELETE FROM ");
        sql.push_str(&ctx.table_sql());
    }

    sql.push_str(" WHERE ");
    cond.render(ctx, &mut sql, &mut tail)?;

    let mut template = Template::execute(sql);
    template.tail = tail;
    Ok(template)
}

fn filtered_select(
    ctx: &mut RenderCtx,
    head: &str,
    cond: Option<&Cond>,
) -> DacResult<Template> {
    let mut sql = String::from(head);
    sql.push_str(&from_source(ctx)?);
    let mut tail = Arguments::new();
    if let Some(cond) = cond {
        sql.push_str(" WHERE ");
        cond.render(ctx, &mut sql, &mut tail)?;
    }
    let mut template = Template::execute(sql);
    template.method = Method::Query;
    template.tail = tail;
    Ok(template)
}

/// `SELECT 1 AS _exist FROM t [WHERE cond]`.
pub fn exist(ctx: &mut RenderCtx, cond: Option<&Cond>) -> DacResult<Template> {
    filtered_select(ctx, "SELECT 1 AS _exist FROM ", cond)
}

/// `SELECT COUNT(1) AS _count FROM t [WHERE cond]`.
pub fn count(ctx: &mut RenderCtx, cond: Option<&Cond>) -> DacResult<Template> {
    filtered_select(ctx, "SELECT COUNT(1) AS _count FROM ", cond)
}

/// `SELECT projections FROM t [WHERE cond] [ORDER BY …] [range]`.
pub fn query(ctx: &mut RenderCtx, opts: &QueryOptions) -> DacResult<Template> {
    query_shape(ctx, opts, None)
}

/// Query over a view: FROM is the declared view name or the base table, and
/// GROUP BY / HAVING are supported.
pub fn view(ctx: &mut RenderCtx, opts: &ViewOptions) -> DacResult<Template> {
    query_shape(ctx, &opts.query, opts.group.as_ref())
}

fn query_shape(
    ctx: &mut RenderCtx,
    opts: &QueryOptions,
    group: Option<&GroupBy>,
) -> DacResult<Template> {
    let mut sql = String::from("SELECT ");
    let mut selected = Vec::new();
    projection_list(ctx, &mut sql, &mut selected)?;
    sql.push_str(" FROM ");
    sql.push_str(&from_source(ctx)?);

    let mut tail = Arguments::new();
    if let Some(cond) = &opts.cond {
        sql.push_str(" WHERE ");
        cond.render(ctx, &mut sql, &mut tail)?;
    }
    if let Some(group) = group {
        if !group.is_empty() {
            sql.push(' ');
            group.render(ctx, &mut sql, &mut tail)?;
        }
    }
    if !opts.orders.is_empty() {
        sql.push(' ');
        opts.orders.render(ctx, &mut sql)?;
    }
    if let Some((offset, limit)) = opts.page {
        sql.push(' ');
        ctx.dialect().range_clause(offset, limit, &mut sql);
    }

    let mut template = Template::execute(sql);
    template.method = Method::Query;
    template.selected = selected;
    template.tail = tail;
    Ok(template)
}

/// FROM source of the current key: its own table name, or the base table for
/// projected views without one.
pub(crate) fn from_source(ctx: &RenderCtx) -> DacResult<String> {
    let key = ctx.key();
    if !key.name.is_empty() {
        return Ok(ctx.table_sql());
    }
    match key.base {
        Some(resolve) => {
            let base = resolve()?;
            Ok(table_sql_of(ctx.dialect(), &base))
        }
        None => Err(DacError::config(
            key.type_name,
            "specification has neither a table name nor a base",
        )),
    }
}

/// Top-level projection list: bare columns for scalar kinds, dialect JSON
/// shapes for virtual and relation kinds.
pub(crate) fn projection_list(
    ctx: &mut RenderCtx,
    out: &mut String,
    selected: &mut Vec<String>,
) -> DacResult<()> {
    let spec = ctx.key().clone();
    let dialect = ctx.dialect_arc();
    let mut visited = vec![spec.type_id];
    for (i, col) in spec.columns.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match &col.kind {
            ColumnKind::Virtual { .. } => dialect.virtual_projection(ctx, col, out)?,
            ColumnKind::Reference { .. } | ColumnKind::Link { .. } | ColumnKind::Links { .. } => {
                dialect.relation_projection(ctx, col, &mut visited, out)?
            }
            _ => ctx.format_ident(&col.name, out),
        }
        selected.push(col.field.clone());
    }
    Ok(())
}

/// Resolved pieces of a reference/link/links column.
pub(crate) struct Relation<'a> {
    pub target: Arc<Specification>,
    /// Column name on the host table.
    pub host_col: String,
    /// Column name on the target table.
    pub away_col: String,
    pub order: Option<&'a LinkOrder>,
    pub length: Option<u64>,
    pub many: bool,
}

pub(crate) fn relation_of<'a>(host: &Specification, col: &'a Column) -> DacResult<Relation<'a>> {
    let (host_field, away_field, order, length, many) = match &col.kind {
        ColumnKind::Reference { host, away } | ColumnKind::Link { host, away } => {
            (host, away, None, None, false)
        }
        ColumnKind::Links {
            host,
            away,
            order,
            length,
        } => (host, away, order.as_ref(), *length, true),
        _ => {
            return Err(DacError::render_field(
                host.name.clone(),
                col.field.clone(),
                "column is not a relation",
            ))
        }
    };
    let Some(target) = col.mapping_spec()? else {
        return Err(DacError::render_field(
            host.name.clone(),
            col.field.clone(),
            "relation column has no mapping",
        ));
    };
    let Some(host_col) = host.column_by_field(host_field) else {
        return Err(DacError::render_field(
            host.name.clone(),
            host_field.clone(),
            "host field does not resolve to a column",
        ));
    };
    let Some(away_col) = target.column_by_field(away_field) else {
        return Err(DacError::render_field(
            target.name.clone(),
            away_field.clone(),
            "away field does not resolve to a column",
        ));
    };
    let host_col = host_col.name.clone();
    let away_col = away_col.name.clone();
    Ok(Relation {
        target,
        host_col,
        away_col,
        order,
        length,
        many,
    })
}

/// `awayCol = "hostTable"."hostCol"` correlation predicate.
pub(crate) fn correlation(ctx: &RenderCtx, host_table: &str, rel: &Relation<'_>, out: &mut String) {
    ctx.format_ident(&rel.away_col, out);
    out.push_str(" = ");
    ctx.format_ident(host_table, out);
    out.push('.');
    ctx.format_ident(&rel.host_col, out);
}

/// ORDER BY over the relation target for links projections.
pub(crate) fn link_order_sql(
    ctx: &RenderCtx,
    target: &Specification,
    order: &LinkOrder,
    out: &mut String,
) -> DacResult<()> {
    let Some(col) = target.column_by_field(&order.field) else {
        return Err(DacError::render_field(
            target.name.clone(),
            order.field.clone(),
            "order field does not resolve to a column",
        ));
    };
    out.push_str("ORDER BY ");
    ctx.format_ident(&col.name, out);
    if order.desc {
        out.push_str(" DESC");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::dialect;
    use crate::model::{FieldDef, Model, SemanticType, TableInfo};
    use crate::spec::spec_of;
    use crate::value::Value;

    #[derive(Default)]
    struct Ticket {
        id: i64,
        title: String,
    }

    impl Model for Ticket {
        fn table() -> TableInfo {
            TableInfo::new("", "ticket")
        }

        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::new("Id", "id,pk", SemanticType::Int),
                FieldDef::new("Title", "title", SemanticType::Text),
            ]
        }

        fn get(&self, field: &str) -> DacResult<Value> {
            Ok(match field {
                "Id" => self.id.into(),
                "Title" => self.title.clone().into(),
                _ => Value::Null,
            })
        }

        fn set(&mut self, _field: &str, _value: Value) -> DacResult<()> {
            Ok(())
        }
    }

    fn ctx(name: &str) -> RenderCtx {
        RenderCtx::new(dialect(name).unwrap(), spec_of::<Ticket>().unwrap())
    }

    #[test]
    fn update_shape_is_rendered_once_per_dialect() {
        let first = update(&mut ctx("postgres")).unwrap();
        assert_eq!(first.sql, r#"UPDATE "ticket" SET "title" = $1 WHERE "id" = $2"#);
        assert_eq!(first.plan, vec!["Title".to_string(), "Id".to_string()]);

        // Second render comes from the cache and matches the first.
        let second = update(&mut ctx("postgres")).unwrap();
        assert_eq!(second.sql, first.sql);
        assert_eq!(second.plan, first.plan);

        // Each dialect keeps its own entry.
        let my = update(&mut ctx("mysql")).unwrap();
        assert_eq!(my.sql, "UPDATE `ticket` SET `title` = ? WHERE `id` = ?");
    }

    #[test]
    fn delete_shape_is_rendered_once() {
        let first = delete(&mut ctx("postgres")).unwrap();
        assert_eq!(first.sql, r#"DELETE FROM "ticket" WHERE "id" = $1"#);
        assert_eq!(first.plan, vec!["Id".to_string()]);

        let second = delete(&mut ctx("postgres")).unwrap();
        assert_eq!(second.sql, first.sql);
        assert_eq!(second.plan, first.plan);
    }
}
