//! MySQL dialect.

use super::template::{correlation, link_order_sql, relation_of};
use super::{quote_ident, Dialect};
use crate::cond::{Arguments, CmpOp, Operand};
use crate::context::{table_sql_of, RenderCtx};
use crate::error::{DacError, DacResult};
use crate::spec::{Column, ColumnKind, Specification, VirtualShape};
use crate::value::Value;
use std::any::TypeId;

pub struct MySql;

fn key_to_path(ctx: &RenderCtx, value: &Value) -> DacResult<Value> {
    match value.as_text() {
        Some(key) => Ok(Value::Text(format!("$.{key}"))),
        None => Err(DacError::render(
            ctx.key().name.clone(),
            "JSON key predicate requires a text key",
        )),
    }
}

impl MySql {
    /// `'name', `table`.`name`` pairs of a relation target, nested relations
    /// recursing as sub-query values. Back-edges collapse to the pk pair.
    fn object_pairs(
        &self,
        ctx: &mut RenderCtx,
        visited: &mut Vec<TypeId>,
        back_edge: bool,
        out: &mut String,
    ) -> DacResult<()> {
        let spec = ctx.key().clone();
        if back_edge {
            let Some(pk) = spec.pk() else {
                return Err(DacError::invariant(
                    spec.name.clone(),
                    "cyclic relation target has no pk column",
                ));
            };
            self.pair(ctx, &spec, pk, out);
            return Ok(());
        }
        let mut first = true;
        for col in &spec.columns {
            match &col.kind {
                ColumnKind::Virtual { .. } => continue,
                ColumnKind::Reference { .. } | ColumnKind::Link { .. } | ColumnKind::Links { .. } => {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    out.push('\'');
                    out.push_str(&col.name);
                    out.push_str("', ");
                    self.relation_subquery(ctx, col, visited, out)?;
                }
                _ => {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    self.pair(ctx, &spec, col, out);
                }
            }
        }
        Ok(())
    }

    fn pair(&self, ctx: &RenderCtx, spec: &Specification, col: &Column, out: &mut String) {
        out.push('\'');
        out.push_str(&col.name);
        out.push_str("', ");
        ctx.format_ident(&spec.name, out);
        out.push('.');
        ctx.format_ident(&col.name, out);
    }

    /// The parenthesized sub-query of a relation projection, without alias.
    fn relation_subquery(
        &self,
        ctx: &mut RenderCtx,
        col: &Column,
        visited: &mut Vec<TypeId>,
        out: &mut String,
    ) -> DacResult<()> {
        let host = ctx.key().clone();
        let rel = relation_of(&host, col)?;
        let back_edge = visited.contains(&rel.target.type_id);

        out.push_str("(SELECT ");
        if rel.many {
            out.push_str("JSON_ARRAYAGG(");
        }
        out.push_str("JSON_OBJECT(");
        let target = rel.target.clone();
        ctx.with_key(target, |ctx| -> DacResult<()> {
            if back_edge {
                self.object_pairs(ctx, visited, true, out)
            } else {
                visited.push(rel.target.type_id);
                let r = self.object_pairs(ctx, visited, false, out);
                visited.pop();
                r
            }
        })?;
        out.push(')');
        if rel.many {
            out.push(')');
        }

        out.push_str(" FROM ");
        out.push_str(&table_sql_of(self, &rel.target));
        out.push_str(" WHERE ");
        correlation(ctx, &host.name, &rel, out);

        if rel.many {
            if let Some(order) = rel.order {
                out.push(' ');
                link_order_sql(ctx, &rel.target, order, out)?;
            }
            if let Some(len) = rel.length.filter(|l| *l > 0) {
                out.push(' ');
                self.range_clause(0, len, out);
            }
        } else {
            out.push(' ');
            self.range_clause(0, 1, out);
        }
        out.push(')');
        Ok(())
    }
}

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn format_ident(&self, ident: &str, out: &mut String) {
        quote_ident(ident, '`', out);
    }

    fn placeholder(&self, _n: usize, out: &mut String) {
        out.push('?');
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn range_clause(&self, offset: u64, limit: u64, out: &mut String) {
        out.push_str("LIMIT ");
        if offset > 0 {
            out.push_str(&offset.to_string());
            out.push_str(", ");
        }
        out.push_str(&limit.to_string());
    }

    fn json_path_expr(&self, column: &str, path: &str, out: &mut String) {
        out.push_str(column);
        out.push_str("->>'$.");
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
        match (op, operand) {
            (CmpOp::JsonContains, Operand::Arg(v)) => {
                out.push_str("JSON_CONTAINS(");
                out.push_str(column);
                out.push_str(", ");
                ctx.next_placeholder(out);
                args.push(v.clone());
                out.push(')');
                Ok(())
            }
            (CmpOp::JsonHasKey, Operand::Arg(v)) => {
                let path = key_to_path(ctx, v)?;
                out.push_str("JSON_CONTAINS_PATH(");
                out.push_str(column);
                out.push_str(", 'one', ");
                ctx.next_placeholder(out);
                args.push(path);
                out.push(')');
                Ok(())
            }
            (CmpOp::JsonHasAnyKey | CmpOp::JsonHasAllKeys, Operand::List(values)) => {
                out.push_str("JSON_CONTAINS_PATH(");
                out.push_str(column);
                out.push_str(if op == CmpOp::JsonHasAnyKey {
                    ", 'one'"
                } else {
                    ", 'all'"
                });
                for v in values {
                    let path = key_to_path(ctx, v)?;
                    out.push_str(", ");
                    ctx.next_placeholder(out);
                    args.push(path);
                }
                out.push(')');
                Ok(())
            }
            _ => Err(DacError::render(
                ctx.key().name.clone(),
                "malformed operand for JSON predicate",
            )),
        }
    }

    fn validate_insert(&self, spec: &Specification, rows: usize) -> DacResult<()> {
        // IGNORE over several rows would silently drop an unknowable subset.
        if rows > 1 && !spec.conflicts.is_empty() {
            return Err(DacError::config(
                spec.name.clone(),
                "multi-row insert cannot combine with a conflict key set on mysql",
            ));
        }
        Ok(())
    }

    fn insert_ignore_prefix(&self) -> &'static str {
        "IGNORE "
    }

    fn upsert_clause(
        &self,
        ctx: &mut RenderCtx,
        spec: &Specification,
        _rows: usize,
        out: &mut String,
        _plan: &mut Vec<String>,
    ) -> DacResult<()> {
        let set_cols: Vec<&Column> = spec
            .columns
            .iter()
            .filter(|c| c.in_update_set() && !spec.conflicts.contains(&c.field))
            .collect();
        if set_cols.is_empty() && spec.version().is_none() {
            return Err(DacError::invariant(
                spec.name.clone(),
                "upsert has no columns to update on conflict",
            ));
        }
        out.push_str(" ON DUPLICATE KEY UPDATE ");
        let mut first = true;
        for col in set_cols {
            if !first {
                out.push_str(", ");
            }
            first = false;
            ctx.format_ident(&col.name, out);
            out.push_str(" = VALUES(");
            ctx.format_ident(&col.name, out);
            out.push(')');
        }
        if let Some(aol) = spec.version() {
            if !first {
                out.push_str(", ");
            }
            ctx.format_ident(&aol.name, out);
            out.push_str(" = ");
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
        self.relation_subquery(ctx, col, visited, out)?;
        out.push_str(" AS ");
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
                if sql.starts_with('(') {
                    out.push_str(sql);
                } else {
                    out.push('(');
                    out.push_str(sql);
                    out.push(')');
                }
                out.push_str(" AS ");
                ctx.format_ident(&col.name, out);
                Ok(())
            }
            VirtualShape::Aggregate => {
                let (func, source) = sql.split_once(':').unwrap_or((sql.as_str(), ""));
                out.push_str(&func.to_ascii_uppercase());
                out.push('(');
                ctx.format_ident(source, out);
                out.push_str(") AS ");
                let alias = format!("{}_{}", col.name, func.to_ascii_lowercase());
                ctx.format_ident(&alias, out);
                Ok(())
            }
            VirtualShape::Object | VirtualShape::Array => Err(DacError::render_field(
                ctx.key().name.clone(),
                col.field.clone(),
                "object and array virtual projections are not supported by the mysql dialect",
            )),
        }
    }
}
