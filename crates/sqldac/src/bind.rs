//! Argument binder.
//!
//! Extracts values from records in the order a template's binding plan
//! dictates, normalizing them per column kind before they reach the driver.

use crate::cond::Arguments;
use crate::error::{DacError, DacResult};
use crate::model::Model;
use crate::spec::{Column, ColumnKind, Specification};
use crate::value::Value;

/// An explicit `(field, value)` pair for update-fields and audit injection.
#[derive(Debug, Clone)]
pub struct FieldValue {
    pub field: String,
    pub value: Value,
}

impl FieldValue {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Bind one record's values for every field in the plan.
pub fn bind_plan<T: Model>(
    spec: &Specification,
    plan: &[String],
    record: &T,
    args: &mut Arguments,
) -> DacResult<()> {
    for field in plan {
        let Some(col) = spec.column_by_field(field) else {
            return Err(DacError::bind(
                spec.name.clone(),
                format!("plan field '{field}' does not resolve to a column"),
            ));
        };
        if !col.argument_source() {
            return Err(DacError::bind(
                spec.name.clone(),
                format!(
                    "a {} column cannot source an argument ('{field}')",
                    col.kind.token()
                ),
            ));
        }
        let raw = record.get(field)?;
        args.push(normalize(spec, col, raw)?);
    }
    Ok(())
}

/// Normalize a raw field value for its column: JSON kinds become a JSON
/// payload, date-only and time-only values are widened to the column's
/// datetime form. Reference columns carry the away-field scalar and pass
/// through (null when the reference is unset).
pub fn normalize(spec: &Specification, col: &Column, value: Value) -> DacResult<Value> {
    if matches!(col.kind, ColumnKind::Json) {
        return json_payload(spec, col, value);
    }
    if matches!(value, Value::Null) {
        return Ok(value);
    }
    use crate::model::SemanticType;
    let widened = match (col.semantic, &value) {
        (SemanticType::Datetime, Value::Date(_) | Value::Time(_)) => {
            value.as_datetime().map(Value::DateTime)
        }
        (SemanticType::Date, Value::DateTime(_)) => value.as_date().map(Value::Date),
        (SemanticType::Time, Value::DateTime(_)) => value.as_time().map(Value::Time),
        _ => None,
    };
    Ok(widened.unwrap_or(value))
}

fn json_payload(spec: &Specification, col: &Column, value: Value) -> DacResult<Value> {
    let parsed = match value {
        Value::Json(v) => v,
        Value::Null => serde_json::Value::Null,
        Value::Text(s) => serde_json::from_str(&s).map_err(|e| {
            DacError::bind_field(spec.name.clone(), col.field.clone(), e.to_string())
        })?,
        Value::Bytes(b) => serde_json::from_slice(&b).map_err(|e| {
            DacError::bind_field(spec.name.clone(), col.field.clone(), e.to_string())
        })?,
        Value::Bool(b) => serde_json::Value::Bool(b),
        Value::Int(i) => serde_json::Value::from(i),
        Value::Uint(u) => serde_json::Value::from(u),
        Value::Float(f) => serde_json::Value::from(f),
        other => {
            return Err(DacError::bind_field(
                spec.name.clone(),
                col.field.clone(),
                format!("cannot encode {other:?} as a JSON payload"),
            ))
        }
    };
    Ok(Value::Json(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, SemanticType, TableInfo};
    use crate::spec::spec_of;
    use chrono::NaiveDate;

    #[derive(Default)]
    struct Event {
        id: i64,
        day: Option<NaiveDate>,
        payload: Option<serde_json::Value>,
    }

    impl Model for Event {
        fn table() -> TableInfo {
            TableInfo::new("", "event")
        }

        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::new("Id", "id,pk", SemanticType::Int),
                FieldDef::new("Day", "day", SemanticType::Datetime),
                FieldDef::new("Payload", "payload,json", SemanticType::Json),
            ]
        }

        fn get(&self, field: &str) -> DacResult<Value> {
            Ok(match field {
                "Id" => self.id.into(),
                "Day" => self.day.into(),
                "Payload" => self.payload.clone().map(Value::Json).unwrap_or(Value::Null),
                _ => Value::Null,
            })
        }

        fn set(&mut self, _field: &str, _value: Value) -> DacResult<()> {
            Ok(())
        }
    }

    #[test]
    fn binds_plan_in_order() {
        let spec = spec_of::<Event>().unwrap();
        let record = Event {
            id: 7,
            day: NaiveDate::from_ymd_opt(2024, 5, 1),
            payload: Some(serde_json::json!({"k": 1})),
        };
        let mut args = Arguments::new();
        let plan = vec!["Payload".to_string(), "Id".to_string()];
        bind_plan(&spec, &plan, &record, &mut args).unwrap();
        assert_eq!(args.positional.len(), 2);
        assert!(matches!(args.positional[0], Value::Json(_)));
        assert_eq!(args.positional[1], Value::Int(7));
    }

    #[test]
    fn date_widens_to_datetime() {
        let spec = spec_of::<Event>().unwrap();
        let col = spec.column_by_field("Day").unwrap();
        let v = normalize(
            &spec,
            col,
            Value::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
        )
        .unwrap();
        match v {
            Value::DateTime(dt) => {
                assert_eq!(dt.to_string(), "2024-05-01 00:00:00");
            }
            other => panic!("expected datetime, got {other:?}"),
        }
    }

    #[test]
    fn null_json_becomes_a_null_token() {
        let spec = spec_of::<Event>().unwrap();
        let col = spec.column_by_field("Payload").unwrap();
        let v = normalize(&spec, col, Value::Null).unwrap();
        assert_eq!(v, Value::Json(serde_json::Value::Null));
    }

    #[test]
    fn invalid_json_text_is_a_bind_error() {
        let spec = spec_of::<Event>().unwrap();
        let col = spec.column_by_field("Payload").unwrap();
        let err = normalize(&spec, col, Value::Text("{not json".into())).unwrap_err();
        assert!(err.to_string().contains("event"));
    }
}
