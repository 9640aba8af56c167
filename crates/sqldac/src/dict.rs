//! Process-wide name dictionary.
//!
//! Maps record type identities to table names and `(type, field)` pairs to
//! column names. Entries are written while a specification is being scanned
//! and read on the rendering hot path; overwrites are unconditional.

use dashmap::DashMap;
use std::any::TypeId;
use std::sync::{Arc, OnceLock};

/// Table names of a record type.
#[derive(Debug, Clone)]
pub struct TableNames {
    /// Schema, when declared.
    pub schema: Option<Arc<str>>,
    /// Table name.
    pub name: Arc<str>,
}

static TABLES: OnceLock<DashMap<TypeId, TableNames>> = OnceLock::new();
static COLUMNS: OnceLock<DashMap<TypeId, Arc<DashMap<String, Arc<str>>>>> = OnceLock::new();

fn tables() -> &'static DashMap<TypeId, TableNames> {
    TABLES.get_or_init(DashMap::new)
}

fn columns() -> &'static DashMap<TypeId, Arc<DashMap<String, Arc<str>>>> {
    COLUMNS.get_or_init(DashMap::new)
}

/// Table names of a type, when registered.
pub fn table(type_id: TypeId) -> Option<TableNames> {
    tables().get(&type_id).map(|e| e.clone())
}

/// Column name of a `(type, field)` pair, when registered.
pub fn column(type_id: TypeId, field: &str) -> Option<Arc<str>> {
    let per_type = columns().get(&type_id)?.clone();
    let col = per_type.get(field)?;
    Some(col.clone())
}

/// Register (or overwrite) a type's table names.
pub fn set_table(type_id: TypeId, schema: Option<&str>, name: &str) {
    tables().insert(
        type_id,
        TableNames {
            schema: schema.filter(|s| !s.is_empty()).map(Arc::from),
            name: Arc::from(name),
        },
    );
}

/// Register (or overwrite) a `(type, field)` column name.
pub fn set_column(type_id: TypeId, field: &str, column: &str) {
    let per_type = columns()
        .entry(type_id)
        .or_insert_with(|| Arc::new(DashMap::new()))
        .clone();
    per_type.insert(field.to_string(), Arc::from(column));
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    #[test]
    fn set_and_get_roundtrip() {
        let tid = TypeId::of::<Marker>();
        set_table(tid, Some("app"), "user");
        set_column(tid, "Id", "id");
        set_column(tid, "Name", "name");

        let t = table(tid).unwrap();
        assert_eq!(t.schema.as_deref(), Some("app"));
        assert_eq!(&*t.name, "user");
        assert_eq!(column(tid, "Name").as_deref(), Some("name"));
        assert!(column(tid, "Missing").is_none());
    }

    #[test]
    fn empty_schema_is_none() {
        struct Other;
        let tid = TypeId::of::<Other>();
        set_table(tid, Some(""), "doc");
        assert!(table(tid).unwrap().schema.is_none());
    }

    #[test]
    fn overwrite_wins() {
        struct Third;
        let tid = TypeId::of::<Third>();
        set_table(tid, None, "old");
        set_table(tid, None, "new");
        assert_eq!(&*table(tid).unwrap().name, "new");
    }
}
