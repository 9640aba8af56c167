//! Builder facade.
//!
//! One entry point per operation: resolve the record's specification, refuse
//! views for mutating shapes, run lifecycle hooks and audit fills, invoke the
//! dialect template, bind arguments, and hand the finished [`Statement`] to
//! the caller's executor.

use crate::audit;
use crate::bind::{self, FieldValue};
use crate::cond::{Arguments, Cond};
use crate::context::RenderCtx;
use crate::dialect::template::{self, QueryOptions, Template, ViewOptions};
use crate::dialect::{self, Dialect, Statement};
use crate::error::{DacError, DacResult};
use crate::expr::QueryExpr;
use crate::model::{Authorization, Model};
use crate::spec::{spec_of, Specification};
use std::sync::Arc;

/// Statement builder bound to a dialect and an optional authorization
/// context.
#[derive(Clone)]
pub struct Builder {
    dialect: Arc<dyn Dialect>,
    auth: Option<Arc<dyn Authorization>>,
}

impl Builder {
    /// A builder over a registered dialect.
    pub fn new(dialect_name: &str) -> DacResult<Self> {
        Ok(Self {
            dialect: dialect::dialect(dialect_name)?,
            auth: None,
        })
    }

    /// Attach the authorization context used by audit fills.
    pub fn with_authorization(mut self, auth: Arc<dyn Authorization>) -> Self {
        self.auth = Some(auth);
        self
    }

    fn auth_ref(&self) -> Option<&dyn Authorization> {
        self.auth.as_deref()
    }

    fn ctx<T: Model>(&self) -> DacResult<(Arc<Specification>, RenderCtx)> {
        let spec = spec_of::<T>()?;
        let ctx = RenderCtx::new(self.dialect.clone(), spec.clone());
        Ok((spec, ctx))
    }

    fn refuse_view(spec: &Specification, op: &str) -> DacResult<()> {
        if spec.view {
            let label = if spec.name.is_empty() {
                spec.type_name.to_string()
            } else {
                spec.name.clone()
            };
            return Err(DacError::invariant(label, format!("{op} cannot target a view")));
        }
        Ok(())
    }

    fn finish(op: &'static str, spec: &Specification, template: Template, mut args: Arguments) -> Statement {
        let Template {
            method,
            sql,
            returning,
            selected,
            tail,
            ..
        } = template;
        args.positional.extend(tail.positional);
        args.named.extend(tail.named);
        tracing::debug!(op, table = %spec.name, sql = %sql, "built statement");
        Statement {
            method,
            query: sql,
            args,
            returning,
            selected,
        }
    }

    /// Insert one or more records.
    pub fn build_insert<T: Model>(&self, records: &mut [T]) -> DacResult<Statement> {
        let (spec, mut ctx) = self.ctx::<T>()?;
        Self::refuse_view(&spec, "insert")?;
        for record in records.iter_mut() {
            record.before_insert()?;
            audit::fill_create(record, &spec, self.auth_ref())?;
        }
        let template = template::insert(&mut ctx, records.len())?;
        let mut args = Arguments::new();
        for record in records.iter() {
            bind::bind_plan(&spec, &template.plan, record, &mut args)?;
        }
        Ok(Self::finish("insert", &spec, template, args))
    }

    /// Insert-or-update against the record's conflict key set.
    pub fn build_upsert<T: Model>(&self, records: &mut [T]) -> DacResult<Statement> {
        let (spec, mut ctx) = self.ctx::<T>()?;
        Self::refuse_view(&spec, "upsert")?;
        for record in records.iter_mut() {
            record.before_insert()?;
            audit::fill_create(record, &spec, self.auth_ref())?;
        }
        let template = template::upsert(&mut ctx, records.len())?;
        let mut args = Arguments::new();
        for record in records.iter() {
            bind::bind_plan(&spec, &template.plan, record, &mut args)?;
        }
        Ok(Self::finish("upsert", &spec, template, args))
    }

    /// Insert one record only when the source sub-query yields a row.
    pub fn build_insert_when_exists<T: Model>(
        &self,
        record: &mut T,
        source: &QueryExpr,
    ) -> DacResult<Statement> {
        self.insert_when(record, source, true)
    }

    /// Insert one record only when the source sub-query yields no row.
    pub fn build_insert_when_not_exists<T: Model>(
        &self,
        record: &mut T,
        source: &QueryExpr,
    ) -> DacResult<Statement> {
        self.insert_when(record, source, false)
    }

    fn insert_when<T: Model>(
        &self,
        record: &mut T,
        source: &QueryExpr,
        when_exists: bool,
    ) -> DacResult<Statement> {
        let (spec, mut ctx) = self.ctx::<T>()?;
        Self::refuse_view(&spec, "insert")?;
        record.before_insert()?;
        audit::fill_create(record, &spec, self.auth_ref())?;
        let template = template::insert_when(&mut ctx, when_exists, source)?;
        let mut args = Arguments::new();
        bind::bind_plan(&spec, &template.plan, record, &mut args)?;
        Ok(Self::finish("insert_when", &spec, template, args))
    }

    /// Full-record update by primary key, with optimistic-lock enforcement
    /// when a version column exists.
    pub fn build_update<T: Model>(&self, record: &mut T) -> DacResult<Statement> {
        let (spec, mut ctx) = self.ctx::<T>()?;
        Self::refuse_view(&spec, "update")?;
        record.before_update()?;
        audit::fill_modify(record, &spec, self.auth_ref())?;
        let template = template::update(&mut ctx)?;
        let mut args = Arguments::new();
        bind::bind_plan(&spec, &template.plan, record, &mut args)?;
        Ok(Self::finish("update", &spec, template, args))
    }

    /// Update an explicit set of fields, optionally filtered. Modification
    /// audit fields are injected when present and not already listed.
    pub fn build_update_fields<T: Model>(
        &self,
        fields: Vec<FieldValue>,
        cond: Option<&Cond>,
    ) -> DacResult<Statement> {
        let (spec, mut ctx) = self.ctx::<T>()?;
        Self::refuse_view(&spec, "update")?;

        let mut all = Vec::with_capacity(fields.len() + 2);
        for fv in fields {
            let Some(col) = spec.column_by_field(&fv.field) else {
                return Err(DacError::render_field(
                    spec.name.clone(),
                    fv.field,
                    "field does not resolve to a column",
                ));
            };
            let value = bind::normalize(&spec, col, fv.value)?;
            all.push(FieldValue {
                field: fv.field,
                value,
            });
        }
        all.extend(audit::modify_values(&spec, self.auth_ref(), &all)?);

        let template = template::update_fields(&mut ctx, &all, cond)?;
        Ok(Self::finish("update_fields", &spec, template, Arguments::new()))
    }

    /// Delete by primary key; becomes a soft-delete update when deletion
    /// audit columns exist.
    pub fn build_delete<T: Model>(&self, record: &mut T) -> DacResult<Statement> {
        let (spec, mut ctx) = self.ctx::<T>()?;
        Self::refuse_view(&spec, "delete")?;
        record.before_delete()?;
        if spec.soft_delete() {
            audit::fill_delete(record, &spec, self.auth_ref())?;
        }
        let template = template::delete(&mut ctx)?;
        let mut args = Arguments::new();
        bind::bind_plan(&spec, &template.plan, record, &mut args)?;
        Ok(Self::finish("delete", &spec, template, args))
    }

    /// Delete every row matching a condition.
    pub fn build_delete_by<T: Model>(&self, cond: &Cond) -> DacResult<Statement> {
        let (spec, mut ctx) = self.ctx::<T>()?;
        Self::refuse_view(&spec, "delete")?;
        let audit_values = if spec.soft_delete() {
            audit::delete_values(&spec, self.auth_ref())?
        } else {
            Vec::new()
        };
        let template = template::delete_by(&mut ctx, cond, &audit_values)?;
        Ok(Self::finish("delete_by", &spec, template, Arguments::new()))
    }

    /// `SELECT 1 AS _exist …` existence probe.
    pub fn build_exist<T: Model>(&self, cond: Option<&Cond>) -> DacResult<Statement> {
        let (spec, mut ctx) = self.ctx::<T>()?;
        let template = template::exist(&mut ctx, cond)?;
        Ok(Self::finish("exist", &spec, template, Arguments::new()))
    }

    /// `SELECT COUNT(1) AS _count …` row count.
    pub fn build_count<T: Model>(&self, cond: Option<&Cond>) -> DacResult<Statement> {
        let (spec, mut ctx) = self.ctx::<T>()?;
        let template = template::count(&mut ctx, cond)?;
        Ok(Self::finish("count", &spec, template, Arguments::new()))
    }

    /// Full projection query, including embedded JSON relation graphs.
    pub fn build_query<T: Model>(&self, opts: &QueryOptions) -> DacResult<Statement> {
        let (spec, mut ctx) = self.ctx::<T>()?;
        let template = template::query(&mut ctx, opts)?;
        Ok(Self::finish("query", &spec, template, Arguments::new()))
    }

    /// Query over a view specification, with grouping support.
    pub fn build_view<T: Model>(&self, opts: &ViewOptions) -> DacResult<Statement> {
        let (spec, mut ctx) = self.ctx::<T>()?;
        let template = template::view(&mut ctx, opts)?;
        Ok(Self::finish("view", &spec, template, Arguments::new()))
    }
}
