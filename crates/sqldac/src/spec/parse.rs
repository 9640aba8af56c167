//! Field annotation parsing.
//!
//! Grammar: `name[,kind[,options]]`. Recognized kind tokens and their option
//! grammar:
//!
//! | kind                  | options                             |
//! |-----------------------|-------------------------------------|
//! | `pk`                  | optional `incr`                     |
//! | `acb`/`act`/`amb`/`amt`/`adb`/`adt` | none                 |
//! | `aol`                 | none                                |
//! | `json`                | none                                |
//! | `vc`                  | `⟨sql⟩[,basic|object|array]` or `⟨func:column⟩,agg` |
//! | `ref` / `link`        | `hostField+awayField`               |
//! | `links`               | `hostField+awayField[,order,length]`|

use super::{Column, ColumnKind, LinkOrder, VirtualShape};
use crate::error::{DacError, DacResult};
use crate::model::{FieldDef, SemanticType};

/// Build a column from a field definition, validating the kind/type
/// combination. `table` is only used for error metadata.
pub(super) fn build_column(table: &str, def: &FieldDef, field_idx: usize) -> DacResult<Column> {
    let annotation = def.annotation.trim();
    if annotation.is_empty() {
        return Err(DacError::config_field(
            table,
            def.field,
            "empty column annotation",
        ));
    }

    // Only the name and kind are split off here; a kind's options may
    // themselves contain commas (vc sub-queries), so each kind parser owns
    // the rest of the annotation.
    let mut parts = annotation.splitn(3, ',');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err(DacError::config_field(
            table,
            def.field,
            "empty column name",
        ));
    }
    let kind_token = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("");
    let options: Vec<&str> = if rest.trim().is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(str::trim).collect()
    };

    let kind = match kind_token {
        "" => ColumnKind::Normal,
        "pk" => parse_pk(table, def, &options)?,
        "acb" => by_kind(table, def, ColumnKind::CreatedBy)?,
        "amb" => by_kind(table, def, ColumnKind::ModifiedBy)?,
        "adb" => by_kind(table, def, ColumnKind::DeletedBy)?,
        "act" => at_kind(table, def, ColumnKind::CreatedAt)?,
        "amt" => at_kind(table, def, ColumnKind::ModifiedAt)?,
        "adt" => at_kind(table, def, ColumnKind::DeletedAt)?,
        "aol" => parse_aol(table, def)?,
        "json" => parse_json(table, def)?,
        "vc" => parse_virtual(table, def, rest)?,
        "ref" => parse_relation(table, def, &options, RelationKind::Reference)?,
        "link" => parse_relation(table, def, &options, RelationKind::Link)?,
        "links" => parse_relation(table, def, &options, RelationKind::Links)?,
        other => {
            return Err(DacError::config_field(
                table,
                def.field,
                format!("unknown column kind '{other}'"),
            ));
        }
    };

    // Non-mapping kinds must not be declared on mapping-typed fields.
    if !matches!(
        kind,
        ColumnKind::Reference { .. } | ColumnKind::Link { .. } | ColumnKind::Links { .. }
    ) && matches!(
        def.semantic,
        SemanticType::Mapping | SemanticType::MappingArray
    ) {
        return Err(DacError::invariant_field(
            table,
            def.field,
            format!("{} column cannot have a mapping type", kind.token()),
        ));
    }

    Ok(Column {
        field: def.field.to_string(),
        field_idx,
        name: name.to_string(),
        kind,
        semantic: def.semantic,
        mapping: def.mapping,
    })
}

fn parse_pk(table: &str, def: &FieldDef, options: &[&str]) -> DacResult<ColumnKind> {
    let incr = match options {
        [] => false,
        ["incr"] => true,
        _ => {
            return Err(DacError::config_field(
                table,
                def.field,
                "pk accepts only the 'incr' option",
            ));
        }
    };
    match def.semantic {
        SemanticType::Int | SemanticType::Uint => Ok(ColumnKind::Pk { incr }),
        SemanticType::Text if !incr => Ok(ColumnKind::Pk { incr }),
        SemanticType::Text => Err(DacError::invariant_field(
            table,
            def.field,
            "pk,incr requires an integer field",
        )),
        other => Err(DacError::invariant_field(
            table,
            def.field,
            format!("pk requires int, uint or text, got {}", other.describe()),
        )),
    }
}

fn by_kind(table: &str, def: &FieldDef, kind: ColumnKind) -> DacResult<ColumnKind> {
    match def.semantic {
        SemanticType::Int | SemanticType::Text => Ok(kind),
        // The authorization id is either a string or a signed integer;
        // unsigned audit-by columns cannot be filled and are rejected here.
        SemanticType::Uint => Err(DacError::invariant_field(
            table,
            def.field,
            format!("{} does not accept an unsigned field", kind.token()),
        )),
        other => Err(DacError::invariant_field(
            table,
            def.field,
            format!(
                "{} requires int or text, got {}",
                kind.token(),
                other.describe()
            ),
        )),
    }
}

fn at_kind(table: &str, def: &FieldDef, kind: ColumnKind) -> DacResult<ColumnKind> {
    match def.semantic {
        SemanticType::Datetime | SemanticType::Int | SemanticType::Uint => Ok(kind),
        other => Err(DacError::invariant_field(
            table,
            def.field,
            format!(
                "{} requires datetime or millisecond epoch int, got {}",
                kind.token(),
                other.describe()
            ),
        )),
    }
}

fn parse_aol(table: &str, def: &FieldDef) -> DacResult<ColumnKind> {
    match def.semantic {
        SemanticType::Int | SemanticType::Uint => Ok(ColumnKind::Version),
        other => Err(DacError::invariant_field(
            table,
            def.field,
            format!("aol requires int or uint, got {}", other.describe()),
        )),
    }
}

fn parse_json(table: &str, def: &FieldDef) -> DacResult<ColumnKind> {
    match def.semantic {
        SemanticType::Json | SemanticType::Bytes => Ok(ColumnKind::Json),
        other => Err(DacError::invariant_field(
            table,
            def.field,
            format!("json requires a json or bytes field, got {}", other.describe()),
        )),
    }
}

fn parse_virtual(table: &str, def: &FieldDef, rest: &str) -> DacResult<ColumnKind> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(DacError::config_field(
            table,
            def.field,
            "vc requires a sub-query option",
        ));
    }
    // The sub-query may itself contain commas; only a trailing shape token is
    // split off, anything else stays part of the SQL.
    let (sql, shape) = match rest.rsplit_once(',') {
        Some((sql, tail)) => match tail.trim() {
            "basic" => (sql.trim(), VirtualShape::Basic),
            "object" => (sql.trim(), VirtualShape::Object),
            "array" => (sql.trim(), VirtualShape::Array),
            "agg" => (sql.trim(), VirtualShape::Aggregate),
            _ => (rest, VirtualShape::Basic),
        },
        None => (rest, VirtualShape::Basic),
    };
    if sql.is_empty() {
        return Err(DacError::config_field(
            table,
            def.field,
            "vc requires a non-empty sub-query",
        ));
    }
    // Aggregate form is `func:column`.
    if shape == VirtualShape::Aggregate && !sql.contains(':') {
        return Err(DacError::config_field(
            table,
            def.field,
            "vc aggregate requires the 'func:column' form",
        ));
    }
    Ok(ColumnKind::Virtual {
        sql: sql.to_string(),
        shape,
    })
}

enum RelationKind {
    Reference,
    Link,
    Links,
}

fn parse_relation(
    table: &str,
    def: &FieldDef,
    options: &[&str],
    rel: RelationKind,
) -> DacResult<ColumnKind> {
    let token = match rel {
        RelationKind::Reference => "ref",
        RelationKind::Link => "link",
        RelationKind::Links => "links",
    };

    if def.mapping.is_none() {
        return Err(DacError::config_field(
            table,
            def.field,
            format!("{token} requires a mapped record field"),
        ));
    }
    let want = match rel {
        RelationKind::Links => SemanticType::MappingArray,
        _ => SemanticType::Mapping,
    };
    if def.semantic != want {
        return Err(DacError::invariant_field(
            table,
            def.field,
            format!("{token} requires a {} field", want.describe()),
        ));
    }

    let Some((host, away)) = options.first().and_then(|o| o.split_once('+')) else {
        return Err(DacError::config_field(
            table,
            def.field,
            format!("{token} requires the 'hostField+awayField' option"),
        ));
    };
    let (host, away) = (host.trim(), away.trim());
    if host.is_empty() || away.is_empty() {
        return Err(DacError::config_field(
            table,
            def.field,
            format!("{token} host/away fields must be non-empty"),
        ));
    }

    match rel {
        RelationKind::Reference => Ok(ColumnKind::Reference {
            host: host.to_string(),
            away: away.to_string(),
        }),
        RelationKind::Link => Ok(ColumnKind::Link {
            host: host.to_string(),
            away: away.to_string(),
        }),
        RelationKind::Links => {
            let order = match options.get(1) {
                None | Some(&"") => None,
                Some(term) => Some(parse_order(table, def, term)?),
            };
            let length = match options.get(2) {
                None | Some(&"") => None,
                Some(n) => Some(n.parse::<u64>().map_err(|_| {
                    DacError::config_field(
                        table,
                        def.field,
                        format!("links length '{n}' is not a number"),
                    )
                })?),
            };
            Ok(ColumnKind::Links {
                host: host.to_string(),
                away: away.to_string(),
                order,
                length,
            })
        }
    }
}

fn parse_order(table: &str, def: &FieldDef, term: &str) -> DacResult<LinkOrder> {
    let mut it = term.split_whitespace();
    let field = it.next().unwrap_or_default();
    if field.is_empty() {
        return Err(DacError::config_field(
            table,
            def.field,
            "links order field must be non-empty",
        ));
    }
    let desc = match it.next() {
        None => false,
        Some(d) if d.eq_ignore_ascii_case("desc") => true,
        Some(d) if d.eq_ignore_ascii_case("asc") => false,
        Some(other) => {
            return Err(DacError::config_field(
                table,
                def.field,
                format!("links order direction '{other}' is not asc/desc"),
            ));
        }
    };
    Ok(LinkOrder {
        field: field.to_string(),
        desc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(annotation: &'static str, semantic: SemanticType) -> FieldDef {
        FieldDef::new("F", annotation, semantic)
    }

    #[test]
    fn plain_name_is_normal() {
        let col = build_column("t", &def("name", SemanticType::Text), 0).unwrap();
        assert_eq!(col.name, "name");
        assert_eq!(col.kind, ColumnKind::Normal);
    }

    #[test]
    fn pk_incr() {
        let col = build_column("t", &def("id,pk,incr", SemanticType::Int), 0).unwrap();
        assert_eq!(col.kind, ColumnKind::Pk { incr: true });
    }

    #[test]
    fn pk_incr_rejects_text() {
        let err = build_column("t", &def("id,pk,incr", SemanticType::Text), 0).unwrap_err();
        assert!(err.is_invariant());
    }

    #[test]
    fn pk_rejects_datetime() {
        let err = build_column("t", &def("id,pk", SemanticType::Datetime), 0).unwrap_err();
        assert!(err.is_invariant());
    }

    #[test]
    fn audit_by_rejects_unsigned() {
        let err = build_column("t", &def("create_by,acb", SemanticType::Uint), 0).unwrap_err();
        assert!(err.is_invariant());
    }

    #[test]
    fn audit_at_accepts_epoch_int() {
        let col = build_column("t", &def("create_at,act", SemanticType::Int), 0).unwrap();
        assert_eq!(col.kind, ColumnKind::CreatedAt);
    }

    #[test]
    fn aol_requires_integer() {
        assert!(build_column("t", &def("version,aol", SemanticType::Text), 0).is_err());
        assert!(build_column("t", &def("version,aol", SemanticType::Int), 0).is_ok());
    }

    #[test]
    fn virtual_default_shape_is_basic() {
        let col = build_column(
            "t",
            &def("cnt,vc,SELECT 1", SemanticType::Int),
            0,
        )
        .unwrap();
        assert_eq!(
            col.kind,
            ColumnKind::Virtual {
                sql: "SELECT 1".into(),
                shape: VirtualShape::Basic
            }
        );
    }

    #[test]
    fn virtual_sql_may_contain_commas() {
        let col = build_column(
            "t",
            &def("latest,vc,SELECT id, name FROM writer,object", SemanticType::Json),
            0,
        )
        .unwrap();
        assert_eq!(
            col.kind,
            ColumnKind::Virtual {
                sql: "SELECT id, name FROM writer".into(),
                shape: VirtualShape::Object
            }
        );
    }

    #[test]
    fn virtual_trailing_non_shape_segment_stays_in_the_sql() {
        let col = build_column("t", &def("pair,vc,COALESCE(a, b)", SemanticType::Int), 0).unwrap();
        assert_eq!(
            col.kind,
            ColumnKind::Virtual {
                sql: "COALESCE(a, b)".into(),
                shape: VirtualShape::Basic
            }
        );
    }

    #[test]
    fn virtual_aggregate_requires_func_column_form() {
        assert!(build_column("t", &def("views,vc,count,agg", SemanticType::Int), 0).is_err());
        let col =
            build_column("t", &def("views,vc,count:views,agg", SemanticType::Int), 0).unwrap();
        assert!(matches!(
            col.kind,
            ColumnKind::Virtual {
                shape: VirtualShape::Aggregate,
                ..
            }
        ));
    }

    #[test]
    fn relation_requires_mapping_resolver() {
        let err = build_column(
            "t",
            &def("author,ref,AuthorId+Id", SemanticType::Mapping),
            0,
        )
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn links_order_and_length() {
        let mut d = def("members,links,Id+GroupId,Name desc,10", SemanticType::MappingArray);
        d.mapping = Some(|| {
            Err(crate::error::DacError::config("x", "unused in this test"))
        });
        let col = build_column("t", &d, 0).unwrap();
        assert_eq!(
            col.kind,
            ColumnKind::Links {
                host: "Id".into(),
                away: "GroupId".into(),
                order: Some(LinkOrder {
                    field: "Name".into(),
                    desc: true
                }),
                length: Some(10),
            }
        );
    }

    #[test]
    fn unknown_kind_is_config_error() {
        let err = build_column("t", &def("x,wat", SemanticType::Text), 0).unwrap_err();
        assert!(err.is_config());
    }
}
