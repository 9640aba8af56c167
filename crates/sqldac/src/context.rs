//! Per-operation render state.
//!
//! A [`RenderCtx`] is created by a build call and owns the placeholder cursor
//! for every fragment rendered inside that call, including nested sub-query
//! fragments, so composed fragments share one numbering sequence. Forked
//! contexts (fresh cursor) exist only for isolated renders that are spliced
//! in by string replacement afterwards.

use crate::dialect::Dialect;
use crate::dict;
use crate::error::{DacError, DacResult};
use crate::spec::Specification;
use std::sync::Arc;

/// Render-time state: dialect, placeholder cursor, current-table key.
pub struct RenderCtx {
    dialect: Arc<dyn Dialect>,
    cursor: usize,
    key: Arc<Specification>,
}

impl RenderCtx {
    pub fn new(dialect: Arc<dyn Dialect>, key: Arc<Specification>) -> Self {
        Self {
            dialect,
            cursor: 0,
            key,
        }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn dialect_arc(&self) -> Arc<dyn Dialect> {
        self.dialect.clone()
    }

    /// The specification the current-table key points at.
    pub fn key(&self) -> &Arc<Specification> {
        &self.key
    }

    /// Number of placeholders emitted so far.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Emit the next positional placeholder (`$N` / `?`).
    pub fn next_placeholder(&mut self, out: &mut String) {
        self.cursor += 1;
        self.dialect.placeholder(self.cursor, out);
    }

    /// Advance the cursor by `n` without emitting.
    ///
    /// Used when a template reserves slots that a nested renderer fills
    /// later, so downstream numbering stays aligned.
    pub fn skip_placeholders(&mut self, n: usize) {
        self.cursor += n;
    }

    /// Quote an identifier per dialect rules; already-quoted input passes
    /// through unchanged.
    pub fn format_ident(&self, ident: &str, out: &mut String) {
        self.dialect.format_ident(ident, out);
    }

    /// Convenience form of [`format_ident`](Self::format_ident).
    pub fn quote(&self, ident: &str) -> String {
        let mut out = String::with_capacity(ident.len() + 2);
        self.dialect.format_ident(ident, &mut out);
        out
    }

    /// Quoted `[schema.]table` of the current key.
    pub fn table_sql(&self) -> String {
        table_sql_of(self.dialect.as_ref(), &self.key)
    }

    /// Resolve a field name against the current-table scope into its quoted
    /// column identifier.
    pub fn localize(&self, field: &str) -> DacResult<String> {
        // Dictionary fast path; falls back to the specification scan.
        if let Some(col) = dict::column(self.key.type_id, field) {
            return Ok(self.quote(&col));
        }
        match self.key.column_by_field(field) {
            Some(col) => Ok(self.quote(&col.name)),
            None => Err(DacError::render_field(
                self.key.name.clone(),
                field,
                "field does not resolve to a column",
            )),
        }
    }

    /// Resolve a field into its fully qualified quoted form
    /// (`"table"."column"`), used by correlated sub-queries.
    pub fn localize_qualified(&self, field: &str) -> DacResult<String> {
        let col = self.localize(field)?;
        let mut out = self.quote(&self.key.name);
        out.push('.');
        out.push_str(&col);
        Ok(out)
    }

    /// Fork a context with a fresh cursor for an isolated sub-render.
    pub fn fork(&self) -> RenderCtx {
        RenderCtx {
            dialect: self.dialect.clone(),
            cursor: 0,
            key: self.key.clone(),
        }
    }

    /// Rebind the current-table key, keeping the cursor.
    pub fn switch_key(&mut self, key: Arc<Specification>) -> Arc<Specification> {
        std::mem::replace(&mut self.key, key)
    }

    /// Run `f` with the key temporarily rebound; cursor advances carry over.
    pub fn with_key<R>(
        &mut self,
        key: Arc<Specification>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let prev = self.switch_key(key);
        let out = f(self);
        self.key = prev;
        out
    }
}

/// Quoted `[schema.]table` of a specification.
pub fn table_sql_of(dialect: &dyn Dialect, spec: &Specification) -> String {
    let mut out = String::new();
    if !spec.schema.is_empty() {
        dialect.format_ident(&spec.schema, &mut out);
        out.push('.');
    }
    dialect.format_ident(&spec.name, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect;
    use crate::model::{FieldDef, Model, SemanticType, TableInfo};
    use crate::spec::spec_of;
    use crate::value::Value;

    #[derive(Default)]
    struct Thing {
        id: i64,
    }

    impl Model for Thing {
        fn table() -> TableInfo {
            TableInfo::new("app", "thing")
        }

        fn fields() -> Vec<FieldDef> {
            vec![FieldDef::new("Id", "id,pk", SemanticType::Int)]
        }

        fn get(&self, _field: &str) -> DacResult<Value> {
            Ok(self.id.into())
        }

        fn set(&mut self, _field: &str, _value: Value) -> DacResult<()> {
            Ok(())
        }
    }

    #[test]
    fn placeholders_are_monotonic_postgres() {
        let d = dialect::dialect("postgres").unwrap();
        let spec = spec_of::<Thing>().unwrap();
        let mut ctx = RenderCtx::new(d, spec);
        let mut out = String::new();
        ctx.next_placeholder(&mut out);
        out.push(' ');
        ctx.skip_placeholders(2);
        ctx.next_placeholder(&mut out);
        assert_eq!(out, "$1 $4");
        assert_eq!(ctx.cursor(), 4);
    }

    #[test]
    fn localize_and_qualify() {
        let d = dialect::dialect("postgres").unwrap();
        let spec = spec_of::<Thing>().unwrap();
        let ctx = RenderCtx::new(d, spec);
        assert_eq!(ctx.localize("Id").unwrap(), "\"id\"");
        assert_eq!(ctx.localize_qualified("Id").unwrap(), "\"thing\".\"id\"");
        assert_eq!(ctx.table_sql(), "\"app\".\"thing\"");
        assert!(ctx.localize("Nope").is_err());
    }

    #[test]
    fn fork_resets_cursor() {
        let d = dialect::dialect("mysql").unwrap();
        let spec = spec_of::<Thing>().unwrap();
        let mut ctx = RenderCtx::new(d, spec);
        let mut out = String::new();
        ctx.next_placeholder(&mut out);
        let fork = ctx.fork();
        assert_eq!(fork.cursor(), 0);
        assert_eq!(ctx.cursor(), 1);
        assert_eq!(out, "?");
    }
}
