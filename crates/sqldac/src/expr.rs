//! Sub-query, aggregate, order and group expressions.

use crate::cond::{Arguments, Cond};
use crate::context::{table_sql_of, RenderCtx};
use crate::error::{DacError, DacResult};
use crate::model::{Model, SpecResolver};

/// Aggregate function applied by sub-query and virtual-column expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            AggFunc::Count => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Avg => "AVG",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        }
    }

    pub(crate) fn parse(token: &str) -> Option<AggFunc> {
        match token.to_ascii_lowercase().as_str() {
            "count" => Some(AggFunc::Count),
            "sum" => Some(AggFunc::Sum),
            "avg" => Some(AggFunc::Avg),
            "min" => Some(AggFunc::Min),
            "max" => Some(AggFunc::Max),
            _ => None,
        }
    }
}

/// A sub-query expression: either a literal SQL string or a correlated
/// `(SELECT [agg(]column[)] FROM table [WHERE cond])` against another record.
///
/// The literal form must not carry a condition; mixing the two is a render
/// error.
#[derive(Clone)]
pub struct QueryExpr {
    raw: Option<String>,
    target: Option<SpecResolver>,
    field: Option<String>,
    agg: Option<AggFunc>,
    cond: Option<Box<Cond>>,
}

impl std::fmt::Debug for QueryExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExpr")
            .field("raw", &self.raw)
            .field("field", &self.field)
            .field("agg", &self.agg)
            .field("filtered", &self.cond.is_some())
            .finish()
    }
}

impl QueryExpr {
    /// A literal sub-query.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            raw: Some(sql.into()),
            target: None,
            field: None,
            agg: None,
            cond: None,
        }
    }

    /// A correlated sub-query selecting `field` from `T`'s table.
    pub fn select<T: Model>(field: impl Into<String>) -> Self {
        Self {
            raw: None,
            target: Some(crate::spec::spec_of::<T>),
            field: Some(field.into()),
            agg: None,
            cond: None,
        }
    }

    /// Wrap the selected column in an aggregate function.
    pub fn aggregate(mut self, func: AggFunc) -> Self {
        self.agg = Some(func);
        self
    }

    /// Attach a WHERE condition, rendered against the target table's scope.
    pub fn filter(mut self, cond: Cond) -> Self {
        self.cond = Some(Box::new(cond));
        self
    }

    pub(crate) fn render(
        &self,
        ctx: &mut RenderCtx,
        out: &mut String,
        args: &mut Arguments,
    ) -> DacResult<()> {
        if let Some(raw) = &self.raw {
            if self.cond.is_some() {
                return Err(DacError::render(
                    ctx.key().name.clone(),
                    "literal sub-query cannot carry a condition",
                ));
            }
            if raw.starts_with('(') {
                out.push_str(raw);
            } else {
                out.push('(');
                out.push_str(raw);
                out.push(')');
            }
            return Ok(());
        }

        let Some(resolve) = self.target else {
            return Err(DacError::render(
                ctx.key().name.clone(),
                "sub-query expression has neither a literal query nor a target",
            ));
        };
        let target = resolve()?;
        let Some(field) = &self.field else {
            return Err(DacError::render(
                target.name.clone(),
                "sub-query expression selects no field",
            ));
        };
        let Some(column) = target.column_by_field(field) else {
            return Err(DacError::render_field(
                target.name.clone(),
                field.clone(),
                "field does not resolve to a column",
            ));
        };

        out.push_str("(SELECT ");
        let col = ctx.quote(&column.name);
        match self.agg {
            Some(func) => {
                out.push_str(func.sql());
                out.push('(');
                out.push_str(&col);
                out.push(')');
            }
            None => out.push_str(&col),
        }
        out.push_str(" FROM ");
        out.push_str(&table_sql_of(ctx.dialect(), &target));
        if let Some(cond) = &self.cond {
            out.push_str(" WHERE ");
            ctx.with_key(target.clone(), |ctx| cond.render(ctx, out, args))?;
        }
        out.push(')');
        Ok(())
    }
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub desc: bool,
}

/// ORDER BY list over record field names.
#[derive(Debug, Clone, Default)]
pub struct Orders {
    items: Vec<Order>,
}

impl Orders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ascending sort.
    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.items.push(Order {
            field: field.into(),
            desc: false,
        });
        self
    }

    /// Add a descending sort.
    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.items.push(Order {
            field: field.into(),
            desc: true,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render `ORDER BY col [DESC], ...`; renders nothing when empty.
    pub(crate) fn render(&self, ctx: &RenderCtx, out: &mut String) -> DacResult<()> {
        if self.items.is_empty() {
            return Ok(());
        }
        out.push_str("ORDER BY ");
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&ctx.localize(&item.field)?);
            if item.desc {
                out.push_str(" DESC");
            }
        }
        Ok(())
    }
}

/// GROUP BY clause with optional HAVING.
#[derive(Debug, Clone, Default)]
pub struct GroupBy {
    fields: Vec<String>,
    having: Option<Cond>,
}

impl GroupBy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grouping field.
    pub fn by(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Attach a HAVING condition.
    pub fn having(mut self, cond: Cond) -> Self {
        self.having = Some(cond);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render `GROUP BY col {, col} [HAVING cond]`.
    pub(crate) fn render(
        &self,
        ctx: &mut RenderCtx,
        out: &mut String,
        args: &mut Arguments,
    ) -> DacResult<()> {
        if self.fields.is_empty() {
            if self.having.is_some() {
                return Err(DacError::render(
                    ctx.key().name.clone(),
                    "HAVING requires a GROUP BY field list",
                ));
            }
            return Ok(());
        }
        out.push_str("GROUP BY ");
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&ctx.localize(field)?);
        }
        if let Some(cond) = &self.having {
            out.push_str(" HAVING ");
            cond.render(ctx, out, args)?;
        }
        Ok(())
    }
}
