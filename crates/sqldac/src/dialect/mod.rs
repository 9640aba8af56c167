//! Dialect providers.
//!
//! A [`Dialect`] supplies identifier quoting, placeholder syntax and the
//! dialect-divergent SQL shapes (conflict handling, JSON projections, range
//! clauses). Dialects are registered by name in a process-wide registry;
//! `postgres` and `mysql` are built in.

mod mysql;
mod postgres;
pub mod template;

pub use mysql::MySql;
pub use postgres::Postgres;

use crate::cond::{Arguments, CmpOp, Operand};
use crate::context::RenderCtx;
use crate::error::{DacError, DacResult};
use crate::spec::{Column, Specification};
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::{Arc, OnceLock};

/// How the caller should execute a built statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Expects rows back.
    Query,
    /// Expects an affected-row count (and possibly a last-insert id).
    Execute,
}

/// A fully built statement: SQL text, bound arguments, and the record fields
/// to write back from returned values.
#[derive(Debug)]
pub struct Statement {
    pub method: Method,
    pub query: String,
    pub args: Arguments,
    /// Field names populated from `RETURNING` rows or `LAST_INSERT_ID`.
    pub returning: Vec<String>,
    /// Selected record fields in projection order (query shapes only); the
    /// result reader maps rows back through this list.
    pub selected: Vec<String>,
}

/// Dialect-specific SQL behavior.
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Quote an identifier. Must be idempotent: already-quoted input passes
    /// through unchanged.
    fn format_ident(&self, ident: &str, out: &mut String);

    /// Emit the `n`th positional placeholder.
    fn placeholder(&self, n: usize, out: &mut String);

    /// Whether INSERT can carry a RETURNING clause. Without it,
    /// auto-increment keys are read back via `LAST_INSERT_ID`.
    fn supports_returning(&self) -> bool;

    /// Emit an OFFSET/LIMIT range clause (no leading space).
    fn range_clause(&self, offset: u64, limit: u64, out: &mut String);

    /// Emit a scalar JSON path extraction over a quoted column.
    fn json_path_expr(&self, column: &str, path: &str, out: &mut String);

    /// Render a JSON predicate (`containment`, `has key` variants) for a
    /// quoted column.
    fn render_json_predicate(
        &self,
        column: &str,
        op: CmpOp,
        operand: &Operand,
        ctx: &mut RenderCtx,
        out: &mut String,
        args: &mut Arguments,
    ) -> DacResult<()>;

    /// Reject insert shapes the dialect cannot express safely.
    fn validate_insert(&self, _spec: &Specification, _rows: usize) -> DacResult<()> {
        Ok(())
    }

    /// Statement prefix inserted between INSERT and INTO when a conflict set
    /// should suppress duplicate errors (`IGNORE ` on MySQL, nothing on
    /// PostgreSQL).
    fn insert_ignore_prefix(&self) -> &'static str {
        ""
    }

    /// Statement suffix handling a conflict set on plain INSERT
    /// (`ON CONFLICT (cols) DO NOTHING` on PostgreSQL, nothing on MySQL).
    fn insert_conflict_suffix(
        &self,
        _ctx: &RenderCtx,
        _spec: &Specification,
        _out: &mut String,
    ) {
    }

    /// Emit the upsert clause after the VALUES groups and extend the binding
    /// plan with any re-bound fields.
    fn upsert_clause(
        &self,
        ctx: &mut RenderCtx,
        spec: &Specification,
        rows: usize,
        out: &mut String,
        plan: &mut Vec<String>,
    ) -> DacResult<()>;

    /// Render a reference/link/links column as an embedded JSON projection,
    /// aliased to the column name.
    fn relation_projection(
        &self,
        ctx: &mut RenderCtx,
        col: &Column,
        visited: &mut Vec<TypeId>,
        out: &mut String,
    ) -> DacResult<()>;

    /// Render a virtual column projection, aliased to the column name.
    fn virtual_projection(&self, ctx: &mut RenderCtx, col: &Column, out: &mut String)
        -> DacResult<()>;
}

static REGISTRY: OnceLock<DashMap<String, Arc<dyn Dialect>>> = OnceLock::new();

fn registry() -> &'static DashMap<String, Arc<dyn Dialect>> {
    REGISTRY.get_or_init(|| {
        let map: DashMap<String, Arc<dyn Dialect>> = DashMap::new();
        map.insert("postgres".to_string(), Arc::new(Postgres));
        map.insert("mysql".to_string(), Arc::new(MySql));
        map
    })
}

/// Register a dialect provider under its own name, replacing any previous
/// registration.
pub fn register_dialect(dialect: Arc<dyn Dialect>) {
    registry().insert(dialect.name().to_string(), dialect);
}

/// Look up a registered dialect by name.
pub fn dialect(name: &str) -> DacResult<Arc<dyn Dialect>> {
    registry()
        .get(name)
        .map(|d| d.clone())
        .ok_or_else(|| DacError::config("", format!("unknown dialect '{name}'")))
}

/// Quote helper shared by the builtin dialects: wrap in `quote` unless the
/// identifier already starts with it.
pub(crate) fn quote_ident(ident: &str, quote: char, out: &mut String) {
    if ident.starts_with(quote) {
        out.push_str(ident);
        return;
    }
    out.push(quote);
    out.push_str(ident);
    out.push(quote);
}
