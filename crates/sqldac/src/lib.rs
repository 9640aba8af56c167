//! # sqldac
//!
//! A dialect-pluggable SQL data access core for PostgreSQL and MySQL.
//!
//! sqldac turns annotated record types into ready-to-execute SQL: it builds
//! the statement text and the ordered argument list, and reads driver rows
//! back into records. It performs no I/O of its own; the caller executes the
//! returned [`Statement`] with whatever driver it likes.
//!
//! ## Features
//!
//! - **Memoized specifications**: a record's table mapping is parsed once,
//!   on first use, under a single-flight lock
//! - **Column kinds**: primary keys, audit columns, optimistic locking, JSON
//!   payloads, virtual sub-query columns, and relation projections, all from
//!   field annotations
//! - **Two dialects built in**: `postgres` (`$N`, double-quote) and `mysql`
//!   (`?`, backtick); more can be registered by name
//! - **Embedded graphs, no N+1**: references and links project as
//!   `row_to_json` / `JSON_OBJECT` sub-queries and decode back in one pass
//! - **Audit fills**: created/modified/deleted by+at columns are filled from
//!   an authorization context at build time
//!
//! ## Example
//!
//! ```ignore
//! use sqldac::{Builder, Cond, FieldDef, Model, SemanticType, TableInfo};
//!
//! #[derive(Default)]
//! struct User {
//!     id: String,
//!     name: String,
//! }
//!
//! impl Model for User {
//!     fn table() -> TableInfo {
//!         TableInfo::new("", "user")
//!     }
//!     fn fields() -> Vec<FieldDef> {
//!         vec![
//!             FieldDef::new("Id", "id,pk", SemanticType::Text),
//!             FieldDef::new("Name", "name", SemanticType::Text),
//!         ]
//!     }
//!     // get / set elided
//!     # fn get(&self, _: &str) -> sqldac::DacResult<sqldac::Value> { unimplemented!() }
//!     # fn set(&mut self, _: &str, _: sqldac::Value) -> sqldac::DacResult<()> { unimplemented!() }
//! }
//!
//! let builder = Builder::new("postgres")?;
//! let mut rows = [User { id: "u1".into(), name: "alice".into() }];
//! let stmt = builder.build_insert(&mut rows)?;
//! assert_eq!(stmt.query, r#"INSERT INTO "user" ("id","name") VALUES ($1,$2)"#);
//! ```

pub mod audit;
pub mod bind;
pub mod builder;
pub mod cond;
pub mod context;
pub mod dialect;
pub mod dict;
pub mod error;
pub mod expr;
pub mod model;
pub mod reader;
pub mod spec;
pub mod value;

pub use bind::FieldValue;
pub use builder::Builder;
pub use cond::{Arguments, CmpOp, Cond, Junction, Operand, Predicate};
pub use context::RenderCtx;
pub use dialect::template::{QueryOptions, ViewOptions};
pub use dialect::{dialect, register_dialect, Dialect, Method, Statement};
pub use error::{DacError, DacResult};
pub use expr::{AggFunc, GroupBy, Order, Orders, QueryExpr};
pub use model::{
    AuthId, Authorization, FieldDef, Model, SemanticType, SpecResolver, SqlRow, SqlRows, TableInfo,
};
pub use reader::{apply_last_insert_id, apply_returning, read_count, read_exist, read_one, read_rows};
pub use spec::{spec_of, Column, ColumnKind, LinkOrder, Specification, VirtualShape};
pub use value::Value;
