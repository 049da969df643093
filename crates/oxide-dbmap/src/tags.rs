//! Field annotation parsing.
//!
//! Annotations use a comma-separated grammar:
//!
//! ```text
//! tag        := segment (',' segment)*
//! segment    := bare-word | key ':' value
//! key        := name | size | index | relation | notnull | primarykey | autoincrement | unique
//! bare-word  := "-" | "ignorefield" | flag | <legacy column name>
//! ```
//!
//! For example `#[db("name: person_id, notnull, index: idx_person")]`.
//! A value-taking key written without a colon is a legacy column name,
//! so `#[db("size")]` maps the field to a column called `size`.
//! Two namespaces are read, `db` first and then `gorp`; the first
//! non-empty annotation wins and the other is not consulted.

use tracing::debug;

use crate::error::{DbMapError, Result};
use crate::record::{FieldDef, FieldType, RecordRef};

/// Namespaces consulted for annotations, in precedence order.
pub const TAG_NAMESPACES: [&str; 2] = ["db", "gorp"];

/// A declared one-to-many relation.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDescriptor {
    /// Child record type, when the field holds one.
    pub child: Option<RecordRef>,
    /// Foreign-key field or column on the child.
    pub foreign_key: String,
}

/// Normalized metadata for one struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Struct field name.
    pub name: String,
    /// Column name override from `name:` or a bare legacy name.
    pub column_name: Option<String>,
    pub field_type: FieldType,
    /// Size hint from `size:`; 0 means the dialect default.
    pub max_size: usize,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    /// Indexes this field participates in, in annotation order.
    pub index_names: Vec<String>,
    pub relation: Option<RelationDescriptor>,
    /// Excluded from persistence; no other marker is set.
    pub ignored: bool,
}

impl FieldDescriptor {
    /// Descriptor of an unannotated field.
    #[must_use]
    pub fn unannotated(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            column_name: None,
            field_type,
            max_size: 0,
            nullable: true,
            primary_key: false,
            auto_increment: false,
            unique: false,
            index_names: Vec::new(),
            relation: None,
            ignored: false,
        }
    }

    /// Column name, defaulting to the field name.
    #[must_use]
    pub fn column(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.name)
    }

    fn ignore(&mut self) {
        *self = Self {
            ignored: true,
            ..Self::unannotated(std::mem::take(&mut self.name), self.field_type)
        };
    }
}

/// Picks the annotation that applies to a field.
#[must_use]
pub fn select_tag(def: &FieldDef) -> Option<&'static str> {
    TAG_NAMESPACES.iter().find_map(|namespace| {
        def.tags
            .iter()
            .find(|(ns, tag)| ns == namespace && !tag.trim().is_empty())
            .map(|(_, tag)| *tag)
    })
}

fn parse_flag(field: &str, key: &str, value: Option<&str>) -> Result<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("" | "true" | "yes" | "1") => Ok(true),
        Some("false" | "no" | "0") => Ok(false),
        Some(other) => Err(DbMapError::InvalidTag {
            field: field.to_string(),
            message: format!("{key} expects a boolean, got {other:?}"),
        }),
    }
}

fn required<'a>(field: &str, key: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DbMapError::InvalidTag {
            field: field.to_string(),
            message: format!("{key} requires a value"),
        }),
    }
}

/// Parses one field's annotations into a descriptor.
///
/// # Errors
///
/// Returns [`DbMapError::InvalidTag`] for malformed values, such as a
/// non-numeric `size`, and for relations on fields that hold no child
/// records.
pub fn parse_field(def: &FieldDef) -> Result<FieldDescriptor> {
    let mut desc = FieldDescriptor::unannotated(def.name, def.field_type);
    let Some(tag) = select_tag(def) else {
        return Ok(desc);
    };

    for segment in tag.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (key, value) = match segment.split_once(':') {
            Some((key, value)) => (key.trim(), Some(value.trim())),
            None => (segment, None),
        };
        match key.to_ascii_lowercase().as_str() {
            "-" | "ignorefield" if value.is_none() => {
                desc.ignore();
                return Ok(desc);
            }
            "name" | "size" | "index" | "relation" if value.is_none() => {
                desc.column_name = Some(segment.to_string());
            }
            "name" => desc.column_name = Some(required(def.name, key, value)?.to_string()),
            "size" => {
                let raw = required(def.name, key, value)?;
                desc.max_size = raw.parse().map_err(|_| DbMapError::InvalidTag {
                    field: def.name.to_string(),
                    message: format!("size expects a non-negative integer, got {raw:?}"),
                })?;
            }
            "index" => {
                let index = required(def.name, key, value)?.to_string();
                if !desc.index_names.contains(&index) {
                    desc.index_names.push(index);
                }
            }
            "relation" => {
                let foreign_key = required(def.name, key, value)?.to_string();
                if def.child.is_none() {
                    return Err(DbMapError::InvalidTag {
                        field: def.name.to_string(),
                        message: "relation requires a Vec of records".to_string(),
                    });
                }
                desc.relation = Some(RelationDescriptor {
                    child: def.child,
                    foreign_key,
                });
            }
            "notnull" => desc.nullable = !parse_flag(def.name, key, value)?,
            "primarykey" => desc.primary_key = parse_flag(def.name, key, value)?,
            "autoincrement" => desc.auto_increment = parse_flag(def.name, key, value)?,
            "unique" => desc.unique = parse_flag(def.name, key, value)?,
            _ if value.is_none() => desc.column_name = Some(segment.to_string()),
            _ => debug!(field = def.name, key, "Ignoring unknown tag key"),
        }
    }

    if desc.primary_key {
        desc.nullable = false;
    }
    Ok(desc)
}

/// Parses every field of a record, in declaration order.
///
/// # Errors
///
/// Returns the first field that fails to parse.
pub fn parse_fields(defs: &[FieldDef]) -> Result<Vec<FieldDescriptor>> {
    defs.iter().map(parse_field).collect()
}
