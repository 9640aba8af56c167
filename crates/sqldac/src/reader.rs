//! Result reader.
//!
//! Maps driver rows back into records using the ordered field list the query
//! template produced. Scalar columns decode by semantic type; JSON and
//! mapping columns are scanned as raw JSON and decoded afterwards, never
//! handed to a type-specific scanner.

use crate::error::{DacError, DacResult};
use crate::model::{Model, SemanticType, SqlRow, SqlRows};
use crate::spec::{Column, ColumnKind, Specification, VirtualShape};
use crate::value::Value;

/// The result-set column name a projection emitted for this column.
fn column_alias(col: &Column) -> String {
    if let ColumnKind::Virtual {
        sql,
        shape: VirtualShape::Aggregate,
    } = &col.kind
    {
        let func = sql.split(':').next().unwrap_or_default();
        return format!("{}_{}", col.name, func.to_ascii_lowercase());
    }
    col.name.clone()
}

/// Decode one driver value into the shape the record's `set` expects.
pub fn decode(col: &Column, value: Value) -> DacResult<Value> {
    if matches!(value, Value::Null) {
        return Ok(Value::Null);
    }
    // Embedded JSON graphs and JSON payloads decode from raw text or bytes.
    let json_like = matches!(col.kind, ColumnKind::Json)
        || matches!(col.semantic, SemanticType::Mapping | SemanticType::MappingArray);
    if json_like {
        let parsed = match value {
            Value::Json(v) => v,
            Value::Text(s) => serde_json::from_str(&s)
                .map_err(|e| DacError::decode(col.name.clone(), e.to_string()))?,
            Value::Bytes(b) => serde_json::from_slice(&b)
                .map_err(|e| DacError::decode(col.name.clone(), e.to_string()))?,
            other => {
                return Err(DacError::decode(
                    col.name.clone(),
                    format!("expected a JSON document, got {other:?}"),
                ))
            }
        };
        return Ok(Value::Json(parsed));
    }

    let decoded = match col.semantic {
        SemanticType::Bool => match value {
            Value::Bool(b) => Some(Value::Bool(b)),
            Value::Int(i) => Some(Value::Bool(i != 0)),
            Value::Uint(u) => Some(Value::Bool(u != 0)),
            _ => None,
        },
        SemanticType::Int => value.as_int().map(Value::Int),
        SemanticType::Uint => value.as_uint().map(Value::Uint),
        SemanticType::Float => match value {
            Value::Float(f) => Some(Value::Float(f)),
            Value::Int(i) => Some(Value::Float(i as f64)),
            Value::Uint(u) => Some(Value::Float(u as f64)),
            _ => None,
        },
        SemanticType::Text => match value {
            Value::Text(s) => Some(Value::Text(s)),
            Value::Bytes(b) => String::from_utf8(b).ok().map(Value::Text),
            _ => None,
        },
        SemanticType::Bytes => match value {
            Value::Bytes(b) => Some(Value::Bytes(b)),
            Value::Text(s) => Some(Value::Bytes(s.into_bytes())),
            _ => None,
        },
        SemanticType::Datetime => value.as_datetime().map(Value::DateTime),
        SemanticType::Date => value.as_date().map(Value::Date),
        SemanticType::Time => value.as_time().map(Value::Time),
        SemanticType::Json | SemanticType::Mapping | SemanticType::MappingArray => None,
    };
    decoded.ok_or_else(|| {
        DacError::decode(
            col.name.clone(),
            format!("cannot decode driver value as {}", col.semantic.describe()),
        )
    })
}

/// Read every row into a fresh record, invoking the post-load hook on each.
pub fn read_rows<T: Model, R: SqlRows>(
    spec: &Specification,
    selected: &[String],
    rows: &mut R,
) -> DacResult<Vec<T>> {
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = T::default();
        for field in selected {
            let Some(col) = spec.column_by_field(field) else {
                return Err(DacError::decode(
                    field.clone(),
                    format!("selected field does not resolve to a column of '{}'", spec.name),
                ));
            };
            let Some(raw) = row.value(&column_alias(col)) else {
                continue;
            };
            record.set(field, decode(col, raw)?)?;
        }
        record.after_query()?;
        out.push(record);
    }
    Ok(out)
}

/// Read the first record of a result set, if any.
pub fn read_one<T: Model, R: SqlRows>(
    spec: &Specification,
    selected: &[String],
    rows: &mut R,
) -> DacResult<Option<T>> {
    Ok(read_rows(spec, selected, rows)?.into_iter().next())
}

/// Write RETURNING rows back into the originating records.
///
/// With only a key field in `returning`, rows map to records positionally.
/// With extra fields (the upsert case) each row is matched to the record
/// whose values equal the row's on every extra field.
pub fn apply_returning<T: Model, R: SqlRows>(
    spec: &Specification,
    returning: &[String],
    records: &mut [T],
    rows: &mut R,
) -> DacResult<()> {
    let Some(key_field) = returning.first() else {
        return Ok(());
    };
    let Some(key_col) = spec.column_by_field(key_field) else {
        return Err(DacError::decode(
            key_field.clone(),
            format!("returning field does not resolve to a column of '{}'", spec.name),
        ));
    };
    let match_fields = &returning[1..];

    let mut next = 0usize;
    while let Some(row) = rows.next()? {
        let Some(raw) = row.value(&key_col.name) else {
            continue;
        };
        let key = decode(key_col, raw)?;
        if match_fields.is_empty() {
            if next >= records.len() {
                break;
            }
            records[next].set(key_field, key)?;
            next += 1;
            continue;
        }
        for record in records.iter_mut() {
            let mut matched = true;
            for field in match_fields {
                let Some(col) = spec.column_by_field(field) else {
                    matched = false;
                    break;
                };
                let row_value = match row.value(&col.name) {
                    Some(v) => decode(col, v)?,
                    None => Value::Null,
                };
                if record.get(field)? != row_value {
                    matched = false;
                    break;
                }
            }
            if matched {
                record.set(key_field, key.clone())?;
                break;
            }
        }
    }
    Ok(())
}

/// Write sequential `LAST_INSERT_ID` keys back into the inserted records.
pub fn apply_last_insert_id<T: Model>(
    returning: &[String],
    records: &mut [T],
    last_insert_id: i64,
) -> DacResult<()> {
    let Some(field) = returning.first() else {
        return Ok(());
    };
    for (i, record) in records.iter_mut().enumerate() {
        record.set(field, Value::Int(last_insert_id + i as i64))?;
    }
    Ok(())
}

/// Interpret an exist-shape result set.
pub fn read_exist<R: SqlRows>(rows: &mut R) -> DacResult<bool> {
    Ok(rows.next()?.is_some())
}

/// Interpret a count-shape result set.
pub fn read_count<R: SqlRows>(rows: &mut R) -> DacResult<i64> {
    match rows.next()? {
        Some(row) => match row.value("_count").as_ref().and_then(Value::as_int) {
            Some(n) => Ok(n),
            None => Err(DacError::decode("_count", "count column missing or non-numeric")),
        },
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDef, TableInfo};
    use crate::spec::spec_of;
    use std::collections::HashMap;

    struct MapRow(HashMap<String, Value>);

    impl SqlRow for MapRow {
        fn value(&self, column: &str) -> Option<Value> {
            self.0.get(column).cloned()
        }
    }

    struct VecRows(Vec<MapRow>);

    impl SqlRows for VecRows {
        type Row = MapRow;

        fn next(&mut self) -> DacResult<Option<MapRow>> {
            if self.0.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.0.remove(0)))
            }
        }
    }

    fn row(pairs: &[(&str, Value)]) -> MapRow {
        MapRow(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[derive(Default)]
    struct Reading {
        id: i64,
        label: String,
        loaded: bool,
    }

    impl Model for Reading {
        fn table() -> TableInfo {
            TableInfo::new("", "reading")
        }

        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef::new("Id", "id,pk,incr", SemanticType::Int),
                FieldDef::new("Label", "label", SemanticType::Text),
            ]
        }

        fn get(&self, field: &str) -> DacResult<Value> {
            Ok(match field {
                "Id" => self.id.into(),
                "Label" => self.label.clone().into(),
                _ => Value::Null,
            })
        }

        fn set(&mut self, field: &str, value: Value) -> DacResult<()> {
            match field {
                "Id" => self.id = value.as_int().unwrap_or_default(),
                "Label" => {
                    self.label = value.as_text().unwrap_or_default().to_string();
                }
                _ => {}
            }
            Ok(())
        }

        fn after_query(&mut self) -> DacResult<()> {
            self.loaded = true;
            Ok(())
        }
    }

    #[test]
    fn reads_rows_and_runs_post_load_hook() {
        let spec = spec_of::<Reading>().unwrap();
        let selected = vec!["Id".to_string(), "Label".to_string()];
        let mut rows = VecRows(vec![
            row(&[("id", Value::Int(1)), ("label", Value::Text("a".into()))]),
            row(&[("id", Value::Uint(2)), ("label", Value::Bytes(b"b".to_vec()))]),
        ]);
        let records: Vec<Reading> = read_rows(&spec, &selected, &mut rows).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].id, 2);
        assert_eq!(records[1].label, "b");
        assert!(records.iter().all(|r| r.loaded));
    }

    #[test]
    fn positional_returning_writes_keys_in_order() {
        let spec = spec_of::<Reading>().unwrap();
        let mut records = vec![Reading::default(), Reading::default()];
        let mut rows = VecRows(vec![
            row(&[("id", Value::Int(10))]),
            row(&[("id", Value::Int(11))]),
        ]);
        apply_returning(&spec, &["Id".to_string()], &mut records, &mut rows).unwrap();
        assert_eq!(records[0].id, 10);
        assert_eq!(records[1].id, 11);
    }

    #[test]
    fn matched_returning_pairs_rows_by_extra_fields() {
        let spec = spec_of::<Reading>().unwrap();
        let mut records = vec![
            Reading {
                label: "x".into(),
                ..Default::default()
            },
            Reading {
                label: "y".into(),
                ..Default::default()
            },
        ];
        // Rows come back in the opposite order.
        let mut rows = VecRows(vec![
            row(&[("id", Value::Int(5)), ("label", Value::Text("y".into()))]),
            row(&[("id", Value::Int(4)), ("label", Value::Text("x".into()))]),
        ]);
        apply_returning(
            &spec,
            &["Id".to_string(), "Label".to_string()],
            &mut records,
            &mut rows,
        )
        .unwrap();
        assert_eq!(records[0].id, 4);
        assert_eq!(records[1].id, 5);
    }

    #[test]
    fn last_insert_id_is_sequential() {
        let mut records = vec![Reading::default(), Reading::default(), Reading::default()];
        apply_last_insert_id(&["Id".to_string()], &mut records, 100).unwrap();
        assert_eq!(records[0].id, 100);
        assert_eq!(records[2].id, 102);
    }

    #[test]
    fn count_and_exist_shapes() {
        let mut rows = VecRows(vec![row(&[("_count", Value::Int(42))])]);
        assert_eq!(read_count(&mut rows).unwrap(), 42);
        let mut rows = VecRows(vec![]);
        assert_eq!(read_count(&mut rows).unwrap(), 0);
        let mut rows = VecRows(vec![row(&[("_exist", Value::Int(1))])]);
        assert!(read_exist(&mut rows).unwrap());
    }
}
