//! Record specifications.
//!
//! A [`Specification`] is the memoized table mapping of a record type: table
//! names, ordered [`Column`]s with their kinds, and the conflict key set.
//! Specifications are built once, on first use, and shared read-only for the
//! process lifetime.

mod cache;
mod parse;

pub use cache::spec_of;

use crate::error::DacResult;
use crate::model::{SemanticType, SpecResolver};
use std::any::TypeId;
use std::sync::Arc;

/// Shape of a virtual (sub-query) column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualShape {
    /// Scalar sub-query: `(⟨query⟩) AS col`.
    Basic,
    /// Single JSON object projection.
    Object,
    /// JSON array projection.
    Array,
    /// Aggregate over another column: `func(col) AS col_func`.
    Aggregate,
}

/// Ordering of a links (1:N) projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOrder {
    /// Field name on the away record.
    pub field: String,
    pub desc: bool,
}

/// Role of a column in SQL generation.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    Normal,
    Pk {
        incr: bool,
    },
    CreatedBy,
    CreatedAt,
    ModifiedBy,
    ModifiedAt,
    DeletedBy,
    DeletedAt,
    /// Optimistic-lock version column.
    Version,
    Json,
    Virtual {
        sql: String,
        shape: VirtualShape,
    },
    /// 1:1 outbound reference. `host` is the field on this record whose
    /// column correlates with the target's `away` field.
    Reference {
        host: String,
        away: String,
    },
    /// 1:1 inbound link; correlation reads `away.awayCol = host.hostCol`.
    Link {
        host: String,
        away: String,
    },
    /// 1:N inbound collection.
    Links {
        host: String,
        away: String,
        order: Option<LinkOrder>,
        length: Option<u64>,
    },
}

impl ColumnKind {
    pub(crate) fn token(&self) -> &'static str {
        match self {
            ColumnKind::Normal => "normal",
            ColumnKind::Pk { .. } => "pk",
            ColumnKind::CreatedBy => "acb",
            ColumnKind::CreatedAt => "act",
            ColumnKind::ModifiedBy => "amb",
            ColumnKind::ModifiedAt => "amt",
            ColumnKind::DeletedBy => "adb",
            ColumnKind::DeletedAt => "adt",
            ColumnKind::Version => "aol",
            ColumnKind::Json => "json",
            ColumnKind::Virtual { .. } => "vc",
            ColumnKind::Reference { .. } => "ref",
            ColumnKind::Link { .. } => "link",
            ColumnKind::Links { .. } => "links",
        }
    }
}

/// One column of a specification.
#[derive(Clone)]
pub struct Column {
    /// Source-level field identifier.
    pub field: String,
    /// Positional index within the declaring record (embeds flattened).
    pub field_idx: usize,
    /// Database identifier.
    pub name: String,
    pub kind: ColumnKind,
    pub semantic: SemanticType,
    /// Target specification resolver for reference/link/links columns.
    pub mapping: Option<SpecResolver>,
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("field", &self.field)
            .field("field_idx", &self.field_idx)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("semantic", &self.semantic)
            .finish()
    }
}

impl Column {
    /// Whether this column appears in INSERT column lists.
    ///
    /// Auto-increment PKs are excluded (they move to RETURNING); the version
    /// column stays in the list but is written as a literal `1`, never bound.
    /// Reference columns are included and bind the away-field scalar the
    /// record carries, null when the reference is unset.
    pub fn in_insert_columns(&self) -> bool {
        match &self.kind {
            ColumnKind::Pk { incr } => !incr,
            ColumnKind::Normal
            | ColumnKind::CreatedBy
            | ColumnKind::CreatedAt
            | ColumnKind::Json
            | ColumnKind::Reference { .. }
            | ColumnKind::Version => true,
            _ => false,
        }
    }

    /// Whether a value for this column is bound as an INSERT argument.
    pub fn in_insert_plan(&self) -> bool {
        self.in_insert_columns() && !matches!(self.kind, ColumnKind::Version)
    }

    /// Whether this column appears in the SET list of a full-record UPDATE.
    pub fn in_update_set(&self) -> bool {
        matches!(
            self.kind,
            ColumnKind::Normal
                | ColumnKind::Json
                | ColumnKind::ModifiedBy
                | ColumnKind::ModifiedAt
                | ColumnKind::Reference { .. }
        )
    }

    /// Whether callers may target this column through update-fields.
    pub fn field_updatable(&self) -> bool {
        matches!(
            self.kind,
            ColumnKind::Normal
                | ColumnKind::Json
                | ColumnKind::ModifiedBy
                | ColumnKind::ModifiedAt
                | ColumnKind::Reference { .. }
        )
    }

    /// Whether this column can source an argument value.
    pub fn argument_source(&self) -> bool {
        !matches!(
            self.kind,
            ColumnKind::Virtual { .. } | ColumnKind::Link { .. } | ColumnKind::Links { .. }
        )
    }

    /// Whether this column projects as an embedded JSON sub-object.
    pub fn json_projected(&self) -> bool {
        matches!(
            self.kind,
            ColumnKind::Reference { .. }
                | ColumnKind::Link { .. }
                | ColumnKind::Links { .. }
                | ColumnKind::Virtual {
                    shape: VirtualShape::Object | VirtualShape::Array,
                    ..
                }
        )
    }

    /// Resolve the mapping target specification, when present.
    pub fn mapping_spec(&self) -> DacResult<Option<Arc<Specification>>> {
        match self.mapping {
            Some(resolve) => Ok(Some(resolve()?)),
            None => Ok(None),
        }
    }
}

/// Memoized table mapping of a record type.
pub struct Specification {
    pub type_id: TypeId,
    /// Short record type name, used in error metadata.
    pub type_name: &'static str,
    /// Schema; empty when unset.
    pub schema: String,
    /// Table or view name; empty for a view that only declares a base.
    pub name: String,
    pub view: bool,
    /// Base specification resolver for projected views.
    pub base: Option<SpecResolver>,
    /// Columns in flattened declaration order.
    pub columns: Vec<Column>,
    /// Conflict key set, as field names.
    pub conflicts: Vec<String>,
}

impl std::fmt::Debug for Specification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Specification")
            .field("type_name", &self.type_name)
            .field("schema", &self.schema)
            .field("name", &self.name)
            .field("view", &self.view)
            .field("columns", &self.columns)
            .field("conflicts", &self.conflicts)
            .finish()
    }
}

impl Specification {
    /// Find a column by source-level field name. O(n) over a small list.
    pub fn column_by_field(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Find a column by database identifier.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary-key column, when declared.
    pub fn pk(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| matches!(c.kind, ColumnKind::Pk { .. }))
    }

    /// The optimistic-lock version column, when declared.
    pub fn version(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| matches!(c.kind, ColumnKind::Version))
    }

    fn by_kind(&self, want: fn(&ColumnKind) -> bool) -> Option<&Column> {
        self.columns.iter().find(|c| want(&c.kind))
    }

    pub fn created_by(&self) -> Option<&Column> {
        self.by_kind(|k| matches!(k, ColumnKind::CreatedBy))
    }

    pub fn created_at(&self) -> Option<&Column> {
        self.by_kind(|k| matches!(k, ColumnKind::CreatedAt))
    }

    pub fn modified_by(&self) -> Option<&Column> {
        self.by_kind(|k| matches!(k, ColumnKind::ModifiedBy))
    }

    pub fn modified_at(&self) -> Option<&Column> {
        self.by_kind(|k| matches!(k, ColumnKind::ModifiedAt))
    }

    pub fn deleted_by(&self) -> Option<&Column> {
        self.by_kind(|k| matches!(k, ColumnKind::DeletedBy))
    }

    pub fn deleted_at(&self) -> Option<&Column> {
        self.by_kind(|k| matches!(k, ColumnKind::DeletedAt))
    }

    /// Whether deletes are expressed as soft-delete updates.
    pub fn soft_delete(&self) -> bool {
        self.deleted_by().is_some() || self.deleted_at().is_some()
    }

    /// Conflict columns resolved from the conflict field names.
    ///
    /// Field names were validated at build time, so resolution cannot fail.
    pub fn conflict_columns(&self) -> Vec<&Column> {
        self.conflicts
            .iter()
            .filter_map(|f| self.column_by_field(f))
            .collect()
    }
}
