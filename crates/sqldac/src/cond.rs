//! Condition tree.
//!
//! A [`Cond`] is a tree of predicates joined by AND/OR, rendered against the
//! current-table scope of a [`RenderCtx`]. Predicates name record fields, not
//! column identifiers; resolution happens at render time so a condition can be
//! built before any specification exists.

use crate::context::RenderCtx;
use crate::error::{DacError, DacResult};
use crate::expr::QueryExpr;
use crate::value::Value;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    NotIn,
    Between,
    /// JSON containment (`@>` on PostgreSQL, `JSON_CONTAINS` on MySQL).
    JsonContains,
    /// JSON key existence (`?` / `JSON_CONTAINS_PATH 'one'`).
    JsonHasKey,
    /// Any of the given keys exists (`?|` / `JSON_CONTAINS_PATH 'one'`).
    JsonHasAnyKey,
    /// All of the given keys exist (`?&` / `JSON_CONTAINS_PATH 'all'`).
    JsonHasAllKeys,
}

impl CmpOp {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Like => "LIKE",
            CmpOp::In => "IN",
            CmpOp::NotIn => "NOT IN",
            CmpOp::Between => "BETWEEN",
            CmpOp::JsonContains
            | CmpOp::JsonHasKey
            | CmpOp::JsonHasAnyKey
            | CmpOp::JsonHasAllKeys => "",
        }
    }

    pub(crate) fn is_json(self) -> bool {
        matches!(
            self,
            CmpOp::JsonContains
                | CmpOp::JsonHasKey
                | CmpOp::JsonHasAnyKey
                | CmpOp::JsonHasAllKeys
        )
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone)]
pub enum Operand {
    /// Bound as the next positional argument.
    Arg(Value),
    /// Rendered inline as a SQL literal.
    Literal(Value),
    /// Emitted as `@name` and bound by name.
    Named(String, Value),
    /// Parenthesized comma list for IN/NOT IN; the two bounds for BETWEEN.
    List(Vec<Value>),
    /// Sub-query.
    Query(QueryExpr),
}

/// Collected statement arguments, positional and named.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: Value) {
        self.positional.push(value);
    }

    pub fn push_named(&mut self, name: impl Into<String>, value: Value) {
        self.named.push((name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// One `field OP operand` leaf.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub field: String,
    /// JSON path applied to the column before comparing.
    pub path: Option<String>,
    pub op: CmpOp,
    pub operand: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Junction {
    And,
    Or,
}

impl Junction {
    fn sql(self) -> &'static str {
        match self {
            Junction::And => " AND ",
            Junction::Or => " OR ",
        }
    }
}

/// Condition tree node.
#[derive(Debug, Clone)]
pub enum Cond {
    Pred(Predicate),
    Join {
        junction: Junction,
        left: Box<Cond>,
        right: Box<Cond>,
        grouped: bool,
    },
}

impl Cond {
    fn pred(field: impl Into<String>, op: CmpOp, operand: Operand) -> Cond {
        Cond::Pred(Predicate {
            field: field.into(),
            path: None,
            op,
            operand,
        })
    }

    /// A predicate with an explicit operator and a positional operand.
    pub fn is(field: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Cond {
        Cond::pred(field, op, Operand::Arg(value.into()))
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::is(field, CmpOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::is(field, CmpOp::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::is(field, CmpOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::is(field, CmpOp::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::is(field, CmpOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Cond {
        Cond::is(field, CmpOp::Lte, value)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<Value>) -> Cond {
        Cond::is(field, CmpOp::Like, pattern)
    }

    /// A predicate whose operand renders inline as a literal.
    pub fn literal(field: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Cond {
        Cond::pred(field, op, Operand::Literal(value.into()))
    }

    /// A predicate bound by name, emitted as `@name`.
    pub fn named(
        field: impl Into<String>,
        op: CmpOp,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Cond {
        Cond::pred(field, op, Operand::Named(name.into(), value.into()))
    }

    pub fn in_list<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Cond {
        Cond::pred(
            field,
            CmpOp::In,
            Operand::List(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn not_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Cond {
        Cond::pred(
            field,
            CmpOp::NotIn,
            Operand::List(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn between(
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Cond {
        Cond::pred(
            field,
            CmpOp::Between,
            Operand::List(vec![low.into(), high.into()]),
        )
    }

    /// A predicate comparing against a sub-query.
    pub fn query(field: impl Into<String>, op: CmpOp, query: QueryExpr) -> Cond {
        Cond::pred(field, op, Operand::Query(query))
    }

    pub fn in_query(field: impl Into<String>, query: QueryExpr) -> Cond {
        Cond::query(field, CmpOp::In, query)
    }

    pub fn not_in_query(field: impl Into<String>, query: QueryExpr) -> Cond {
        Cond::query(field, CmpOp::NotIn, query)
    }

    /// JSON containment of `value` in the column's document.
    pub fn json_contains(field: impl Into<String>, value: serde_json::Value) -> Cond {
        Cond::pred(field, CmpOp::JsonContains, Operand::Arg(Value::Json(value)))
    }

    pub fn json_has_key(field: impl Into<String>, key: impl Into<Value>) -> Cond {
        Cond::pred(field, CmpOp::JsonHasKey, Operand::Arg(key.into()))
    }

    pub fn json_has_any<V: Into<Value>>(
        field: impl Into<String>,
        keys: impl IntoIterator<Item = V>,
    ) -> Cond {
        Cond::pred(
            field,
            CmpOp::JsonHasAnyKey,
            Operand::List(keys.into_iter().map(Into::into).collect()),
        )
    }

    pub fn json_has_all<V: Into<Value>>(
        field: impl Into<String>,
        keys: impl IntoIterator<Item = V>,
    ) -> Cond {
        Cond::pred(
            field,
            CmpOp::JsonHasAllKeys,
            Operand::List(keys.into_iter().map(Into::into).collect()),
        )
    }

    /// Compare a JSON path inside the column (`col->>'path' OP value`).
    pub fn at_path(
        field: impl Into<String>,
        path: impl Into<String>,
        op: CmpOp,
        value: impl Into<Value>,
    ) -> Cond {
        Cond::Pred(Predicate {
            field: field.into(),
            path: Some(path.into()),
            op,
            operand: Operand::Arg(value.into()),
        })
    }

    pub fn and(self, other: Cond) -> Cond {
        Cond::Join {
            junction: Junction::And,
            left: Box::new(self),
            right: Box::new(other),
            grouped: false,
        }
    }

    pub fn or(self, other: Cond) -> Cond {
        Cond::Join {
            junction: Junction::Or,
            left: Box::new(self),
            right: Box::new(other),
            grouped: false,
        }
    }

    /// Mark this sub-tree for parenthesized rendering.
    pub fn grouped(self) -> Cond {
        match self {
            Cond::Join {
                junction,
                left,
                right,
                ..
            } => Cond::Join {
                junction,
                left,
                right,
                grouped: true,
            },
            pred => pred,
        }
    }

    /// Render into `out`, appending bound values to `args`.
    pub fn render(
        &self,
        ctx: &mut RenderCtx,
        out: &mut String,
        args: &mut Arguments,
    ) -> DacResult<()> {
        match self {
            Cond::Pred(pred) => render_pred(pred, ctx, out, args),
            Cond::Join {
                junction,
                left,
                right,
                grouped,
            } => {
                if *grouped {
                    out.push('(');
                }
                left.render(ctx, out, args)?;
                out.push_str(junction.sql());
                right.render(ctx, out, args)?;
                if *grouped {
                    out.push(')');
                }
                Ok(())
            }
        }
    }
}

fn render_pred(
    pred: &Predicate,
    ctx: &mut RenderCtx,
    out: &mut String,
    args: &mut Arguments,
) -> DacResult<()> {
    let column = ctx.localize(&pred.field)?;

    if pred.op.is_json() {
        let dialect = ctx.dialect_arc();
        return dialect.render_json_predicate(&column, pred.op, &pred.operand, ctx, out, args);
    }

    let lhs = match &pred.path {
        Some(path) => {
            let mut buf = String::new();
            ctx.dialect().json_path_expr(&column, path, &mut buf);
            buf
        }
        None => column,
    };

    match pred.op {
        CmpOp::In | CmpOp::NotIn => render_in(pred, &lhs, ctx, out, args),
        CmpOp::Between => render_between(pred, &lhs, ctx, out, args),
        _ => {
            out.push_str(&lhs);
            out.push(' ');
            out.push_str(pred.op.sql());
            out.push(' ');
            match &pred.operand {
                Operand::Arg(v) => {
                    ctx.next_placeholder(out);
                    args.push(v.clone());
                }
                Operand::Literal(v) => v.write_literal(out),
                Operand::Named(name, v) => {
                    out.push('@');
                    out.push_str(name);
                    args.push_named(name.clone(), v.clone());
                }
                Operand::Query(q) => q.render(ctx, out, args)?,
                Operand::List(_) => {
                    return Err(DacError::render_field(
                        ctx.key().name.clone(),
                        pred.field.clone(),
                        format!("operator {} takes a single operand", pred.op.sql()),
                    ));
                }
            }
            Ok(())
        }
    }
}

fn render_in(
    pred: &Predicate,
    lhs: &str,
    ctx: &mut RenderCtx,
    out: &mut String,
    args: &mut Arguments,
) -> DacResult<()> {
    match &pred.operand {
        Operand::List(values) => {
            // An empty membership test degenerates to a constant truth value
            // instead of invalid SQL.
            if values.is_empty() {
                out.push_str(match pred.op {
                    CmpOp::In => "1=0",
                    _ => "1=1",
                });
                return Ok(());
            }
            out.push_str(lhs);
            out.push(' ');
            out.push_str(pred.op.sql());
            out.push_str(" (");
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                ctx.next_placeholder(out);
                args.push(v.clone());
            }
            out.push(')');
            Ok(())
        }
        // The sub-query brings its own parentheses; reusing them avoids
        // `IN ((SELECT ...))`.
        Operand::Query(q) => {
            out.push_str(lhs);
            out.push(' ');
            out.push_str(pred.op.sql());
            out.push(' ');
            q.render(ctx, out, args)
        }
        _ => Err(DacError::render_field(
            ctx.key().name.clone(),
            pred.field.clone(),
            format!("operator {} requires a value list or sub-query", pred.op.sql()),
        )),
    }
}

fn render_between(
    pred: &Predicate,
    lhs: &str,
    ctx: &mut RenderCtx,
    out: &mut String,
    args: &mut Arguments,
) -> DacResult<()> {
    let Operand::List(values) = &pred.operand else {
        return Err(DacError::render_field(
            ctx.key().name.clone(),
            pred.field.clone(),
            "BETWEEN requires exactly two operands",
        ));
    };
    if values.len() != 2 {
        return Err(DacError::render_field(
            ctx.key().name.clone(),
            pred.field.clone(),
            "BETWEEN requires exactly two operands",
        ));
    }
    out.push_str(lhs);
    out.push_str(" BETWEEN ");
    ctx.next_placeholder(out);
    args.push(values[0].clone());
    out.push_str(" AND ");
    ctx.next_placeholder(out);
    args.push(values[1].clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect;
    use crate::model::{FieldDef, Model, SemanticType, TableInfo};
    use crate::spec::spec_of;

    #[derive(Default)]
    struct Account {
        id: i64,
        name: String,
        age: i64,
    }

    impl Model for Account {
        fn table() -> TableInfo {
            TableInfo::new("", "account")
        }

        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::new("Id", "id,pk,incr", SemanticType::Int),
                FieldDef::new("Name", "name", SemanticType::Text),
                FieldDef::new("Age", "age", SemanticType::Int),
                FieldDef::new("Meta", "meta,json", SemanticType::Json),
            ]
        }

        fn get(&self, field: &str) -> DacResult<Value> {
            Ok(match field {
                "Id" => self.id.into(),
                "Name" => self.name.clone().into(),
                "Age" => self.age.into(),
                _ => Value::Null,
            })
        }

        fn set(&mut self, _field: &str, _value: Value) -> DacResult<()> {
            Ok(())
        }
    }

    use crate::value::Value;

    fn pg_ctx() -> RenderCtx {
        RenderCtx::new(
            dialect::dialect("postgres").unwrap(),
            spec_of::<Account>().unwrap(),
        )
    }

    fn my_ctx() -> RenderCtx {
        RenderCtx::new(
            dialect::dialect("mysql").unwrap(),
            spec_of::<Account>().unwrap(),
        )
    }

    fn render(cond: &Cond, ctx: &mut RenderCtx) -> (String, Arguments) {
        let mut out = String::new();
        let mut args = Arguments::new();
        cond.render(ctx, &mut out, &mut args).unwrap();
        (out, args)
    }

    #[test]
    fn grouped_or_inside_and() {
        let cond = Cond::eq("Name", "bob").and(Cond::gt("Age", 18).or(Cond::lt("Age", 3)).grouped());
        let (sql, args) = render(&cond, &mut pg_ctx());
        assert_eq!(sql, r#""name" = $1 AND ("age" > $2 OR "age" < $3)"#);
        assert_eq!(args.positional.len(), 3);
    }

    #[test]
    fn in_list_numbers_placeholders() {
        let cond = Cond::in_list("Age", [1i64, 2, 3]);
        let (sql, args) = render(&cond, &mut my_ctx());
        assert_eq!(sql, "`age` IN (?, ?, ?)");
        assert_eq!(args.positional.len(), 3);
    }

    #[test]
    fn empty_membership_degenerates() {
        let (sql, _) = render(&Cond::in_list("Age", Vec::<i64>::new()), &mut pg_ctx());
        assert_eq!(sql, "1=0");
        let (sql, _) = render(&Cond::not_in("Age", Vec::<i64>::new()), &mut pg_ctx());
        assert_eq!(sql, "1=1");
    }

    #[test]
    fn between_binds_two() {
        let (sql, args) = render(&Cond::between("Age", 18, 30), &mut pg_ctx());
        assert_eq!(sql, r#""age" BETWEEN $1 AND $2"#);
        assert_eq!(args.positional, vec![Value::Int(18), Value::Int(30)]);
    }

    #[test]
    fn between_rejects_wrong_arity() {
        let cond = Cond::Pred(Predicate {
            field: "Age".into(),
            path: None,
            op: CmpOp::Between,
            operand: Operand::List(vec![Value::Int(1)]),
        });
        let mut out = String::new();
        let mut args = Arguments::new();
        assert!(cond.render(&mut pg_ctx(), &mut out, &mut args).is_err());
    }

    #[test]
    fn named_argument_is_emitted_by_name() {
        let cond = Cond::named("Name", CmpOp::Eq, "who", "bob");
        let (sql, args) = render(&cond, &mut pg_ctx());
        assert_eq!(sql, r#""name" = @who"#);
        assert_eq!(args.named, vec![("who".to_string(), Value::Text("bob".into()))]);
        assert!(args.positional.is_empty());
    }

    #[test]
    fn literal_renders_inline() {
        let cond = Cond::literal("Name", CmpOp::Eq, "bo'b");
        let (sql, args) = render(&cond, &mut pg_ctx());
        assert_eq!(sql, r#""name" = 'bo''b'"#);
        assert!(args.is_empty());
    }

    #[test]
    fn in_sub_query_reuses_its_parens() {
        let q = QueryExpr::select::<Account>("Id").filter(Cond::gt("Age", 21));
        let cond = Cond::in_query("Id", q);
        let (sql, args) = render(&cond, &mut pg_ctx());
        assert_eq!(
            sql,
            r#""id" IN (SELECT "id" FROM "account" WHERE "age" > $1)"#
        );
        assert_eq!(args.positional, vec![Value::Int(21)]);
    }

    #[test]
    fn unresolved_field_names_the_table() {
        let cond = Cond::eq("Missing", 1);
        let mut out = String::new();
        let mut args = Arguments::new();
        let err = cond.render(&mut pg_ctx(), &mut out, &mut args).unwrap_err();
        assert!(err.to_string().contains("account"));
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn json_contains_postgres() {
        let cond = Cond::json_contains("Meta", serde_json::json!({"a": 1}));
        let (sql, args) = render(&cond, &mut pg_ctx());
        assert_eq!(sql, r#""meta" @> $1"#);
        assert_eq!(args.positional.len(), 1);
    }

    #[test]
    fn json_path_comparison_mysql() {
        let cond = Cond::at_path("Meta", "color", CmpOp::Eq, "red");
        let (sql, _) = render(&cond, &mut my_ctx());
        assert_eq!(sql, "`meta`->>'$.color' = ?");
    }
}
