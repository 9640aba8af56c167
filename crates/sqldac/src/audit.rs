//! Audit-setup helpers.
//!
//! Create/modify/delete paths fill audit columns from the authorization
//! context before binding: `by` columns take the loaded identity, `at`
//! columns take the current time in the column's representation.

use crate::bind::FieldValue;
use crate::error::{DacError, DacResult};
use crate::model::{AuthId, Authorization, Model, SemanticType};
use crate::spec::{Column, Specification};
use crate::value::Value;
use chrono::{NaiveDateTime, Timelike};

/// Current UTC time without sub-second noise, so emitted timestamps match the
/// canonical `YYYY-MM-DD HH:MM:SS` form.
pub fn now() -> NaiveDateTime {
    let now = chrono::Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

fn identity(
    spec: &Specification,
    auth: Option<&dyn Authorization>,
    col: &Column,
) -> DacResult<Value> {
    let Some(auth) = auth else {
        return Err(DacError::audit(
            spec.name.clone(),
            format!("audit column '{}' requires an authorization context", col.name),
        ));
    };
    let Some(id) = auth.load() else {
        return Err(DacError::audit(
            spec.name.clone(),
            "authorization context is empty",
        ));
    };
    match (col.semantic, id) {
        (SemanticType::Text, AuthId::Text(s)) => Ok(Value::Text(s)),
        (SemanticType::Text, AuthId::Int(i)) => Ok(Value::Text(i.to_string())),
        (SemanticType::Int, AuthId::Int(i)) => Ok(Value::Int(i)),
        (SemanticType::Int, AuthId::Text(s)) => s.parse().map(Value::Int).map_err(|_| {
            DacError::audit(
                spec.name.clone(),
                format!("authorization id '{s}' is not numeric for column '{}'", col.name),
            )
        }),
        (other, _) => Err(DacError::audit(
            spec.name.clone(),
            format!("audit column '{}' has unsupported type {}", col.name, other.describe()),
        )),
    }
}

fn timestamp(col: &Column) -> Value {
    let now = now();
    match col.semantic {
        SemanticType::Int => Value::Int(now.and_utc().timestamp()),
        SemanticType::Uint => Value::Uint(now.and_utc().timestamp().max(0) as u64),
        _ => Value::DateTime(now),
    }
}

/// Fill created-by/created-at fields on a record about to be inserted.
pub fn fill_create<T: Model>(
    record: &mut T,
    spec: &Specification,
    auth: Option<&dyn Authorization>,
) -> DacResult<()> {
    if let Some(col) = spec.created_by() {
        let v = identity(spec, auth, col)?;
        record.set(&col.field, v)?;
    }
    if let Some(col) = spec.created_at() {
        record.set(&col.field, timestamp(col))?;
    }
    Ok(())
}

/// Fill modified-by/modified-at fields on a record about to be updated.
pub fn fill_modify<T: Model>(
    record: &mut T,
    spec: &Specification,
    auth: Option<&dyn Authorization>,
) -> DacResult<()> {
    if let Some(col) = spec.modified_by() {
        let v = identity(spec, auth, col)?;
        record.set(&col.field, v)?;
    }
    if let Some(col) = spec.modified_at() {
        record.set(&col.field, timestamp(col))?;
    }
    Ok(())
}

/// Fill deleted-by/deleted-at fields on a record about to be soft-deleted.
pub fn fill_delete<T: Model>(
    record: &mut T,
    spec: &Specification,
    auth: Option<&dyn Authorization>,
) -> DacResult<()> {
    if let Some(col) = spec.deleted_by() {
        let v = identity(spec, auth, col)?;
        record.set(&col.field, v)?;
    }
    if let Some(col) = spec.deleted_at() {
        record.set(&col.field, timestamp(col))?;
    }
    Ok(())
}

/// Synthetic modification-audit values for update-fields, skipping any the
/// caller already listed.
pub fn modify_values(
    spec: &Specification,
    auth: Option<&dyn Authorization>,
    listed: &[FieldValue],
) -> DacResult<Vec<FieldValue>> {
    let mut extra = Vec::new();
    if let Some(col) = spec.modified_by() {
        if !listed.iter().any(|f| f.field == col.field) {
            extra.push(FieldValue {
                field: col.field.clone(),
                value: identity(spec, auth, col)?,
            });
        }
    }
    if let Some(col) = spec.modified_at() {
        if !listed.iter().any(|f| f.field == col.field) {
            extra.push(FieldValue {
                field: col.field.clone(),
                value: timestamp(col),
            });
        }
    }
    Ok(extra)
}

/// Deletion-audit values bound ahead of a delete-by condition.
pub fn delete_values(
    spec: &Specification,
    auth: Option<&dyn Authorization>,
) -> DacResult<Vec<FieldValue>> {
    let mut values = Vec::new();
    if let Some(col) = spec.deleted_by() {
        values.push(FieldValue {
            field: col.field.clone(),
            value: identity(spec, auth, col)?,
        });
    }
    if let Some(col) = spec.deleted_at() {
        values.push(FieldValue {
            field: col.field.clone(),
            value: timestamp(col),
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, TableInfo};
    use crate::spec::spec_of;

    struct Bob;

    impl Authorization for Bob {
        fn load(&self) -> Option<AuthId> {
            Some(AuthId::Text("bob".into()))
        }
    }

    struct Nobody;

    impl Authorization for Nobody {
        fn load(&self) -> Option<AuthId> {
            None
        }
    }

    #[derive(Default)]
    struct Note {
        author: String,
        created: Option<NaiveDateTime>,
    }

    impl Model for Note {
        fn table() -> TableInfo {
            TableInfo::new("", "note")
        }

        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::new("Id", "id,pk", SemanticType::Int),
                FieldDef::new("Author", "author", SemanticType::Text),
                FieldDef::new("CreatedBy", "created_by,acb", SemanticType::Text),
                FieldDef::new("CreatedAt", "created_at,act", SemanticType::Datetime),
            ]
        }

        fn get(&self, field: &str) -> DacResult<Value> {
            Ok(match field {
                "CreatedBy" => self.author.clone().into(),
                "CreatedAt" => self.created.into(),
                _ => Value::Null,
            })
        }

        fn set(&mut self, field: &str, value: Value) -> DacResult<()> {
            match field {
                "CreatedBy" => {
                    self.author = value.as_text().unwrap_or_default().to_string();
                }
                "CreatedAt" => self.created = value.as_datetime(),
                _ => {}
            }
            Ok(())
        }
    }

    #[test]
    fn fill_create_sets_identity_and_time() {
        let spec = spec_of::<Note>().unwrap();
        let mut note = Note::default();
        fill_create(&mut note, &spec, Some(&Bob)).unwrap();
        assert_eq!(note.author, "bob");
        assert!(note.created.is_some());
    }

    #[test]
    fn missing_authorization_is_an_audit_error() {
        let spec = spec_of::<Note>().unwrap();
        let mut note = Note::default();
        let err = fill_create(&mut note, &spec, None).unwrap_err();
        assert!(err.is_audit());
        let err = fill_create(&mut note, &spec, Some(&Nobody)).unwrap_err();
        assert!(err.is_audit());
    }

    #[test]
    fn modify_values_skip_listed_fields() {
        #[derive(Default)]
        struct Doc;
        impl Model for Doc {
            fn table() -> TableInfo {
                TableInfo::new("", "audited_doc")
            }
            fn fields() -> Vec<FieldDef> {
                vec![
                    FieldDef::new("Id", "id,pk", SemanticType::Int),
                    FieldDef::new("Body", "body", SemanticType::Text),
                    FieldDef::new("ModifiedBy", "modified_by,amb", SemanticType::Text),
                    FieldDef::new("ModifiedAt", "modified_at,amt", SemanticType::Datetime),
                ]
            }
            fn get(&self, _: &str) -> DacResult<Value> {
                Ok(Value::Null)
            }
            fn set(&mut self, _: &str, _: Value) -> DacResult<()> {
                Ok(())
            }
        }

        let spec = spec_of::<Doc>().unwrap();
        let listed = vec![FieldValue::new("ModifiedBy", "alice")];
        let extra = modify_values(&spec, Some(&Bob), &listed).unwrap();
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[0].field, "ModifiedAt");
    }
}
