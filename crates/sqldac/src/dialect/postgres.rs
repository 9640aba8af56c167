//! PostgreSQL dialect.

use super::template::{correlation, link_order_sql, relation_of};
use super::{quote_ident, Dialect};
use crate::cond::{Arguments, CmpOp, Operand};
use crate::context::{table_sql_of, RenderCtx};
use crate::error::{DacError, DacResult};
use crate::spec::{Column, ColumnKind, Specification, VirtualShape};
use std::any::TypeId;

pub struct Postgres;

fn aliased(ctx: &RenderCtx, col: &Column, out: &mut String) {
    ctx.format_ident(&col.name, out);
    out.push_str(" AS ");
    ctx.format_ident(&col.name, out);
}

fn wrap_parens(sql: &str, out: &mut String) {
    if sql.starts_with('(') {
        out.push_str(sql);
    } else {
        out.push('(');
        out.push_str(sql);
        out.push(')');
    }
}

impl Postgres {
    /// Inner select list of a relation target: scalar columns aliased, nested
    /// virtual and relation columns projected recursively. A back-edge to an
    /// already-visited type collapses to the target's pk column.
    fn inner_list(
        &self,
        ctx: &mut RenderCtx,
        visited: &mut Vec<TypeId>,
        out: &mut String,
    ) -> DacResult<()> {
        let spec = ctx.key().clone();
        let mut first = true;
        for col in &spec.columns {
            match &col.kind {
                ColumnKind::Virtual { .. } => {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    self.virtual_projection(ctx, col, out)?;
                }
                ColumnKind::Reference { .. } | ColumnKind::Link { .. } | ColumnKind::Links { .. } => {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    self.relation_projection(ctx, col, visited, out)?;
                }
                _ => {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    aliased(ctx, col, out);
                }
            }
        }
        Ok(())
    }
}

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn format_ident(&self, ident: &str, out: &mut String) {
        quote_ident(ident, '"', out);
    }

    fn placeholder(&self, n: usize, out: &mut String) {
        out.push('$');
        out.push_str(&n.to_string());
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn range_clause(&self, offset: u64, limit: u64, out: &mut String) {
        out.push_str("OFFSET ");
        out.push_str(&offset.to_string());
        out.push_str(" LIMIT ");
        out.push_str(&limit.to_string());
    }

    fn json_path_expr(&self, column: &str, path: &str, out: &mut String) {
        out.push_str(column);
        out.push_str("->>'");
        out.push_str(path);
        out.push('\'');
    }

    fn render_json_predicate(
        &self,
        column: &str,
        op: CmpOp,
        operand: &Operand,
        ctx: &mut RenderCtx,
        out: &mut String,
        args: &mut Arguments,
    ) -> DacResult<()> {
        let sym = match op {
            CmpOp::JsonContains => "@>",
            CmpOp::JsonHasKey => "?",
            CmpOp::JsonHasAnyKey => "?|",
            CmpOp::JsonHasAllKeys => "?&",
            _ => {
                return Err(DacError::render(
                    ctx.key().name.clone(),
                    "operator is not a JSON predicate",
                ))
            }
        };
        out.push_str(column);
        out.push(' ');
        out.push_str(sym);
        out.push(' ');
        match (op, operand) {
            (CmpOp::JsonContains | CmpOp::JsonHasKey, Operand::Arg(v)) => {
                ctx.next_placeholder(out);
                args.push(v.clone());
                Ok(())
            }
            (CmpOp::JsonHasAnyKey | CmpOp::JsonHasAllKeys, Operand::List(values)) => {
                out.push_str("ARRAY[");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    ctx.next_placeholder(out);
                    args.push(v.clone());
                }
                out.push(']');
                Ok(())
            }
            _ => Err(DacError::render(
                ctx.key().name.clone(),
                "malformed operand for JSON predicate",
            )),
        }
    }

    fn insert_conflict_suffix(&self, ctx: &RenderCtx, spec: &Specification, out: &mut String) {
        if spec.conflicts.is_empty() {
            return;
        }
        out.push_str(" ON CONFLICT (");
        for (i, col) in spec.conflict_columns().iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            ctx.format_ident(&col.name, out);
        }
        out.push_str(") DO NOTHING");
    }

    fn upsert_clause(
        &self,
        ctx: &mut RenderCtx,
        spec: &Specification,
        rows: usize,
        out: &mut String,
        plan: &mut Vec<String>,
    ) -> DacResult<()> {
        // The SET values re-bind fresh placeholders, which only lines up with
        // a single VALUES group.
        if rows > 1 {
            return Err(DacError::invariant(
                spec.name.clone(),
                "multi-row upsert is not supported by the postgres dialect",
            ));
        }
        out.push_str(" ON CONFLICT (");
        for (i, col) in spec.conflict_columns().iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            ctx.format_ident(&col.name, out);
        }
        out.push_str(") DO ");

        let set_cols: Vec<&Column> = spec
            .columns
            .iter()
            .filter(|c| c.in_update_set() && !spec.conflicts.contains(&c.field))
            .collect();
        if set_cols.is_empty() && spec.version().is_none() {
            out.push_str("NOTHING");
            return Ok(());
        }

        out.push_str("UPDATE SET ");
        let mut first = true;
        for col in set_cols {
            if !first {
                out.push_str(", ");
            }
            first = false;
            ctx.format_ident(&col.name, out);
            out.push_str(" = ");
            ctx.next_placeholder(out);
            plan.push(col.field.clone());
        }
        if let Some(aol) = spec.version() {
            if !first {
                out.push_str(", ");
            }
            ctx.format_ident(&aol.name, out);
            out.push_str(" = ");
            ctx.format_ident(&spec.name, out);
            out.push('.');
            ctx.format_ident(&aol.name, out);
            out.push_str("+1");
        }
        Ok(())
    }

    fn relation_projection(
        &self,
        ctx: &mut RenderCtx,
        col: &Column,
        visited: &mut Vec<TypeId>,
        out: &mut String,
    ) -> DacResult<()> {
        let host = ctx.key().clone();
        let rel = relation_of(&host, col)?;
        let back_edge = visited.contains(&rel.target.type_id);

        let mut inner = String::from("SELECT ");
        let target = rel.target.clone();
        ctx.with_key(target, |ctx| -> DacResult<()> {
            if back_edge {
                let Some(pk) = rel.target.pk() else {
                    return Err(DacError::invariant_field(
                        rel.target.name.clone(),
                        col.field.clone(),
                        "cyclic relation target has no pk column",
                    ));
                };
                aliased(ctx, pk, &mut inner);
            } else {
                visited.push(rel.target.type_id);
                let r = self.inner_list(ctx, visited, &mut inner);
                visited.pop();
                r?;
            }
            Ok(())
        })?;

        inner.push_str(" FROM ");
        inner.push_str(&table_sql_of(self, &rel.target));
        inner.push_str(" WHERE ");
        correlation(ctx, &host.name, &rel, &mut inner);

        if rel.many {
            if let Some(order) = rel.order {
                inner.push(' ');
                link_order_sql(ctx, &rel.target, order, &mut inner)?;
            }
            if let Some(len) = rel.length.filter(|l| *l > 0) {
                inner.push(' ');
                self.range_clause(0, len, &mut inner);
            }
            out.push_str("(SELECT to_json(ARRAY(SELECT row_to_json(src.*) FROM (");
            out.push_str(&inner);
            out.push_str(") src))) AS ");
        } else {
            inner.push(' ');
            self.range_clause(0, 1, &mut inner);
            out.push_str("(SELECT row_to_json(src.*) FROM (");
            out.push_str(&inner);
            out.push_str(") src) AS ");
        }
        ctx.format_ident(&col.name, out);
        Ok(())
    }

    fn virtual_projection(
        &self,
        ctx: &mut RenderCtx,
        col: &Column,
        out: &mut String,
    ) -> DacResult<()> {
        let ColumnKind::Virtual { sql, shape } = &col.kind else {
            return Err(DacError::render_field(
                ctx.key().name.clone(),
                col.field.clone(),
                "column is not virtual",
            ));
        };
        match shape {
            VirtualShape::Basic => {
                wrap_parens(sql, out);
                out.push_str(" AS ");
                ctx.format_ident(&col.name, out);
            }
            VirtualShape::Object => {
                out.push_str("(SELECT row_to_json(v.*) FROM ");
                wrap_parens(sql, out);
                out.push_str(" v LIMIT 1) AS ");
                ctx.format_ident(&col.name, out);
            }
            VirtualShape::Array => {
                out.push_str("(SELECT to_json(ARRAY(SELECT row_to_json(v.*) FROM ");
                wrap_parens(sql, out);
                out.push_str(" v))) AS ");
                ctx.format_ident(&col.name, out);
            }
            VirtualShape::Aggregate => {
                let (func, source) = sql.split_once(':').unwrap_or((sql.as_str(), ""));
                out.push_str(&func.to_ascii_uppercase());
                out.push('(');
                ctx.format_ident(source, out);
                out.push_str(") AS ");
                let alias = format!("{}_{}", col.name, func.to_ascii_lowercase());
                ctx.format_ident(&alias, out);
            }
        }
        Ok(())
    }
}
