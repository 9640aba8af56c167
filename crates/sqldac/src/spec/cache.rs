//! Specification cache.
//!
//! `spec_of::<T>()` builds the specification of `T` on first use and memoizes
//! it for the process lifetime. Builds run under a single-flight lock:
//! concurrent callers for the same type observe exactly one build and share
//! the same `Arc`. A failed build leaves no partial entry behind.

use super::parse::build_column;
use super::{ColumnKind, Specification};
use crate::dict;
use crate::error::{DacError, DacResult};
use crate::model::{FieldDef, Model};
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::{Arc, Mutex, OnceLock};

static SPECS: OnceLock<DashMap<TypeId, Arc<Specification>>> = OnceLock::new();
static BUILD: Mutex<()> = Mutex::new(());

fn specs() -> &'static DashMap<TypeId, Arc<Specification>> {
    SPECS.get_or_init(DashMap::new)
}

/// The memoized specification of `T`.
pub fn spec_of<T: Model>() -> DacResult<Arc<Specification>> {
    let type_id = TypeId::of::<T>();
    if let Some(spec) = specs().get(&type_id) {
        return Ok(spec.clone());
    }

    // Single-flight: the build lock serializes first-use builds; the
    // double-check keeps losers of the race from rebuilding.
    let _guard = BUILD.lock().unwrap_or_else(|poison| poison.into_inner());
    if let Some(spec) = specs().get(&type_id) {
        return Ok(spec.clone());
    }

    let spec = Arc::new(build::<T>()?);
    publish_names(&spec);
    specs().insert(type_id, spec.clone());
    Ok(spec)
}

fn build<T: Model>() -> DacResult<Specification> {
    let info = T::table();
    let type_name = short_type_name::<T>();
    let table_label = if info.name.is_empty() {
        type_name
    } else {
        info.name
    };

    if info.name.is_empty() && info.base.is_none() {
        return Err(DacError::config(
            type_name,
            "table descriptor declares neither a name nor a view base",
        ));
    }
    if !info.view && info.name.is_empty() {
        return Err(DacError::config(type_name, "empty table name"));
    }
    if !info.view && info.base.is_some() {
        return Err(DacError::config(
            table_label,
            "only views may declare a base specification",
        ));
    }

    let mut columns = Vec::new();
    flatten(table_label, T::fields(), &mut columns)?;
    if columns.is_empty() {
        return Err(DacError::config(table_label, "record declares no columns"));
    }

    let mut spec = Specification {
        type_id: TypeId::of::<T>(),
        type_name,
        schema: info.schema.to_string(),
        name: info.name.to_string(),
        view: info.view,
        base: info.base,
        columns,
        conflicts: info.conflicts.iter().map(|s| s.to_string()).collect(),
    };
    validate(&mut spec)?;
    Ok(spec)
}

/// Flatten field definitions depth-first, expanding anonymous embeds.
fn flatten(
    table: &str,
    defs: Vec<FieldDef>,
    out: &mut Vec<super::Column>,
) -> DacResult<()> {
    for def in defs {
        if let Some(expand) = def.embed {
            flatten(table, expand(), out)?;
            continue;
        }
        let idx = out.len();
        let column = build_column(table, &def, idx)?;
        if out.iter().any(|c| c.field == column.field) {
            return Err(DacError::config_field(
                table,
                column.field,
                "duplicate field declaration",
            ));
        }
        if out.iter().any(|c| c.name == column.name) {
            return Err(DacError::config_field(
                table,
                column.field,
                format!("duplicate column name '{}'", column.name),
            ));
        }
        out.push(column);
    }
    Ok(())
}

fn validate(spec: &mut Specification) -> DacResult<()> {
    let table = spec.name.clone();

    let pk_count = spec
        .columns
        .iter()
        .filter(|c| matches!(c.kind, ColumnKind::Pk { .. }))
        .count();
    if pk_count > 1 {
        return Err(DacError::invariant(&table, "more than one pk column"));
    }
    let aol_count = spec
        .columns
        .iter()
        .filter(|c| matches!(c.kind, ColumnKind::Version))
        .count();
    if aol_count > 1 {
        return Err(DacError::invariant(&table, "more than one aol column"));
    }

    for conflict in &spec.conflicts {
        let Some(col) = spec.column_by_field(conflict) else {
            return Err(DacError::invariant_field(
                &table,
                conflict.clone(),
                "conflict field does not resolve to a column",
            ));
        };
        if matches!(
            col.kind,
            ColumnKind::Virtual { .. } | ColumnKind::Link { .. } | ColumnKind::Links { .. }
        ) {
            return Err(DacError::invariant_field(
                &table,
                conflict.clone(),
                format!("conflict field cannot be a {} column", col.kind.token()),
            ));
        }
    }

    // Relation host fields must resolve locally; away fields are validated
    // against the target specification when the projection is built.
    for col in &spec.columns {
        let host = match &col.kind {
            ColumnKind::Reference { host, .. }
            | ColumnKind::Link { host, .. }
            | ColumnKind::Links { host, .. } => host,
            _ => continue,
        };
        if spec.column_by_field(host).is_none() {
            return Err(DacError::invariant_field(
                &table,
                col.field.clone(),
                format!("host field '{host}' does not resolve to a column"),
            ));
        }
    }

    Ok(())
}

fn publish_names(spec: &Specification) {
    dict::set_table(
        spec.type_id,
        if spec.schema.is_empty() {
            None
        } else {
            Some(&spec.schema)
        },
        &spec.name,
    );
    for col in &spec.columns {
        dict::set_column(spec.type_id, &col.field, &col.name);
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, SemanticType, TableInfo};
    use crate::value::Value;

    #[derive(Default)]
    struct User {
        id: String,
        name: String,
        age: i64,
    }

    impl Model for User {
        fn table() -> TableInfo {
            TableInfo::new("", "user").with_conflicts(&["Name"])
        }

        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::new("Id", "id,pk", SemanticType::Text),
                FieldDef::new("Name", "name", SemanticType::Text),
                FieldDef::new("Age", "age", SemanticType::Int),
            ]
        }

        fn get(&self, field: &str) -> DacResult<Value> {
            Ok(match field {
                "Id" => self.id.clone().into(),
                "Name" => self.name.clone().into(),
                "Age" => self.age.into(),
                _ => Value::Null,
            })
        }

        fn set(&mut self, _field: &str, _value: Value) -> DacResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct TwoPks;

    impl Model for TwoPks {
        fn table() -> TableInfo {
            TableInfo::new("", "two_pks")
        }

        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::new("A", "a,pk", SemanticType::Int),
                FieldDef::new("B", "b,pk", SemanticType::Int),
            ]
        }

        fn get(&self, _field: &str) -> DacResult<Value> {
            Ok(Value::Null)
        }

        fn set(&mut self, _field: &str, _value: Value) -> DacResult<()> {
            Ok(())
        }
    }

    #[test]
    fn builds_and_memoizes() {
        let a = spec_of::<User>().unwrap();
        let b = spec_of::<User>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name, "user");
        assert_eq!(a.columns.len(), 3);
        assert_eq!(a.conflicts, vec!["Name".to_string()]);
        assert_eq!(a.pk().unwrap().name, "id");
    }

    #[test]
    fn concurrent_callers_share_one_spec() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| spec_of::<User>().unwrap()))
            .collect();
        let specs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for s in &specs[1..] {
            assert!(Arc::ptr_eq(&specs[0], s));
        }
    }

    #[test]
    fn two_pks_fail_the_build() {
        let err = spec_of::<TwoPks>().unwrap_err();
        assert!(err.is_invariant());
        // A failed build leaves no cache entry.
        assert!(spec_of::<TwoPks>().is_err());
    }

    #[test]
    fn dictionary_is_populated() {
        let spec = spec_of::<User>().unwrap();
        let t = crate::dict::table(spec.type_id).unwrap();
        assert_eq!(&*t.name, "user");
        assert_eq!(
            crate::dict::column(spec.type_id, "Age").as_deref(),
            Some("age")
        );
    }
}
