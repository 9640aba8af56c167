//! Record declarations and collaborator contracts.
//!
//! A record type participates in statement building by implementing [`Model`]:
//! it names its table through a [`TableInfo`] descriptor and describes its
//! fields through [`FieldDef`]s carrying the `name[,kind[,options]]`
//! annotation grammar. Annotations are parsed once, on first use, by the
//! specification cache; the caller never parses them.

use crate::error::DacResult;
use crate::spec::Specification;
use crate::value::Value;
use std::sync::Arc;

/// Resolves the [`Specification`] of a mapped record type.
///
/// Stored as a plain function pointer so field definitions stay `'static`
/// and mapping resolution can be deferred until projection rendering, which
/// is what breaks reference cycles.
pub type SpecResolver = fn() -> DacResult<Arc<Specification>>;

/// Semantic type tag of a record field.
///
/// Drives kind/type validation at specification build and value decoding in
/// the result reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticType {
    Bool,
    Int,
    Uint,
    Float,
    Text,
    Bytes,
    Datetime,
    Date,
    Time,
    Json,
    /// A struct (or optional struct) field holding a mapped record.
    Mapping,
    /// A sequence of mapped records.
    MappingArray,
}

impl SemanticType {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            SemanticType::Bool => "bool",
            SemanticType::Int => "int",
            SemanticType::Uint => "uint",
            SemanticType::Float => "float",
            SemanticType::Text => "text",
            SemanticType::Bytes => "bytes",
            SemanticType::Datetime => "datetime",
            SemanticType::Date => "date",
            SemanticType::Time => "time",
            SemanticType::Json => "json",
            SemanticType::Mapping => "mapping",
            SemanticType::MappingArray => "mapping array",
        }
    }
}

/// Table descriptor returned by [`Model::table`].
#[derive(Debug, Clone)]
pub struct TableInfo {
    /// Schema name; empty when the connection default applies.
    pub schema: &'static str,
    /// Table (or view) name.
    pub name: &'static str,
    /// Whether this record maps a read-only view.
    pub view: bool,
    /// Field names participating in upsert conflict detection.
    pub conflicts: &'static [&'static str],
    /// Base specification for views declared over another record's table.
    pub base: Option<SpecResolver>,
}

impl TableInfo {
    /// Descriptor for a plain table.
    pub fn new(schema: &'static str, name: &'static str) -> Self {
        Self {
            schema,
            name,
            view: false,
            conflicts: &[],
            base: None,
        }
    }

    /// Descriptor for a view with its own schema/name.
    pub fn view(schema: &'static str, name: &'static str) -> Self {
        Self {
            schema,
            name,
            view: true,
            conflicts: &[],
            base: None,
        }
    }

    /// Descriptor for a view projected over another record's table.
    pub fn view_of<T: Model>() -> Self {
        Self {
            schema: "",
            name: "",
            view: true,
            conflicts: &[],
            base: Some(crate::spec::spec_of::<T>),
        }
    }

    /// Set the conflict field names used by upsert templates.
    pub fn with_conflicts(mut self, conflicts: &'static [&'static str]) -> Self {
        self.conflicts = conflicts;
        self
    }
}

/// One field declaration of a record.
#[derive(Clone)]
pub struct FieldDef {
    /// Source-level field identifier.
    pub field: &'static str,
    /// Column annotation: `name[,kind[,options]]`.
    pub annotation: &'static str,
    /// Semantic type tag of the field.
    pub semantic: SemanticType,
    /// Mapping resolver for reference/link/links fields.
    pub mapping: Option<SpecResolver>,
    /// Expansion for anonymous embeds; flattened depth-first by the cache.
    pub embed: Option<fn() -> Vec<FieldDef>>,
}

impl std::fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("field", &self.field)
            .field("annotation", &self.annotation)
            .field("semantic", &self.semantic)
            .field("mapped", &self.mapping.is_some())
            .field("embed", &self.embed.is_some())
            .finish()
    }
}

impl FieldDef {
    /// A scalar field.
    pub fn new(field: &'static str, annotation: &'static str, semantic: SemanticType) -> Self {
        Self {
            field,
            annotation,
            semantic,
            mapping: None,
            embed: None,
        }
    }

    /// A reference/link field mapped to another record type.
    pub fn mapped<T: Model>(field: &'static str, annotation: &'static str) -> Self {
        Self {
            field,
            annotation,
            semantic: SemanticType::Mapping,
            mapping: Some(crate::spec::spec_of::<T>),
            embed: None,
        }
    }

    /// A links (1:N) field mapped to a sequence of another record type.
    pub fn mapped_many<T: Model>(field: &'static str, annotation: &'static str) -> Self {
        Self {
            field,
            annotation,
            semantic: SemanticType::MappingArray,
            mapping: Some(crate::spec::spec_of::<T>),
            embed: None,
        }
    }

    /// An anonymous embed whose fields are flattened in place.
    pub fn embed(fields: fn() -> Vec<FieldDef>) -> Self {
        Self {
            field: "",
            annotation: "",
            semantic: SemanticType::Json,
            mapping: None,
            embed: Some(fields),
        }
    }
}

/// A record type that maps to a table or view.
///
/// Implementations are usually mechanical; `get`/`set` dispatch on the
/// source-level field name and convert through [`Value`]. Mapping fields
/// accept `Value::Json` on `set` and decode through serde.
///
/// The `before_*` hooks run inside the build calls, ahead of audit fills
/// and binding. The builder performs no I/O, so the `after_insert`,
/// `after_update` and `after_delete` hooks are the caller's to fire once
/// its executor reports success; only `after_query` is driven from inside
/// the crate, by the result reader.
pub trait Model: Default + Send + Sync + 'static {
    /// Table descriptor.
    fn table() -> TableInfo;

    /// Field declarations in source order.
    fn fields() -> Vec<FieldDef>;

    /// Extract a field value by source-level name.
    fn get(&self, field: &str) -> DacResult<Value>;

    /// Assign a field value by source-level name.
    fn set(&mut self, field: &str, value: Value) -> DacResult<()>;

    fn before_insert(&mut self) -> DacResult<()> {
        Ok(())
    }

    fn after_insert(&mut self) -> DacResult<()> {
        Ok(())
    }

    fn before_update(&mut self) -> DacResult<()> {
        Ok(())
    }

    fn after_update(&mut self) -> DacResult<()> {
        Ok(())
    }

    fn before_delete(&mut self) -> DacResult<()> {
        Ok(())
    }

    fn after_delete(&mut self) -> DacResult<()> {
        Ok(())
    }

    /// Invoked on each record after the result reader has populated it.
    fn after_query(&mut self) -> DacResult<()> {
        Ok(())
    }
}

/// Identity loaded from the authorization context for audit columns.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthId {
    Text(String),
    Int(i64),
}

/// Authorization provider consumed by the audit-setup helpers.
pub trait Authorization: Send + Sync {
    /// The current identity, or `None` when no authorization is present.
    fn load(&self) -> Option<AuthId>;
}

/// One result row handed back by the caller's executor.
pub trait SqlRow {
    /// Value of the named column, or `None` when the column is absent.
    fn value(&self, column: &str) -> Option<Value>;
}

/// Row iterator contract over the caller's executor result.
pub trait SqlRows {
    type Row: SqlRow;

    /// Advance to the next row.
    fn next(&mut self) -> DacResult<Option<Self::Row>>;
}
