/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::constants::BlockIdT;

use std::fmt::{self, Formatter};

/// Data types recognized for relation fields. Values are stored as trimmed
/// ASCII text regardless of type; the type only governs how predicates
/// compare them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Str,
}

impl FieldType {
    /// The tag used in the catalog text and CSV headers.
    pub fn tag(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Str => "string",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "int" => Some(FieldType::Int),
            "float" => Some(FieldType::Float),
            "string" => Some(FieldType::Str),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single column of a relation.
///
/// For fixed relations `size` is the byte width of the column; for variable
/// relations widths are per-record and `size` is -1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub size: i32,
}

impl Field {
    pub fn new(name: &str, field_type: FieldType, size: i32) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            size,
        }
    }
}

/// A named relation: its schema, the data blocks it occupies, and (for
/// fixed relations) the header block of its primary-key hash index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub is_fixed: bool,
    pub fields: Vec<Field>,
    pub blocks: Vec<BlockIdT>,
    pub hash_index_block: Option<BlockIdT>,
}

impl Relation {
    /// Byte width of one record of a fixed relation.
    pub fn record_size(&self) -> usize {
        self.fields.iter().map(|f| f.size.max(0) as usize).sum()
    }

    /// Index of the named field, if present.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Byte offset of a field within a fixed record.
    pub fn field_offset(&self, index: usize) -> usize {
        self.fields[..index]
            .iter()
            .map(|f| f.size.max(0) as usize)
            .sum()
    }

    /// The primary key is always the first field.
    pub fn primary_key(&self) -> &Field {
        &self.fields[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Relation {
        Relation {
            name: "emp".to_string(),
            is_fixed: true,
            fields: vec![
                Field::new("id", FieldType::Str, 4),
                Field::new("name", FieldType::Str, 8),
                Field::new("age", FieldType::Int, 2),
            ],
            blocks: vec![2],
            hash_index_block: None,
        }
    }

    #[test]
    fn test_record_size_and_offsets() {
        let rel = sample();
        assert_eq!(rel.record_size(), 14);
        assert_eq!(rel.field_offset(0), 0);
        assert_eq!(rel.field_offset(1), 4);
        assert_eq!(rel.field_offset(2), 12);
    }

    #[test]
    fn test_field_lookup() {
        let rel = sample();
        assert_eq!(rel.field_index("age"), Some(2));
        assert_eq!(rel.field_index("salary"), None);
        assert_eq!(rel.primary_key().name, "id");
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(FieldType::from_tag("int"), Some(FieldType::Int));
        assert_eq!(FieldType::from_tag("float"), Some(FieldType::Float));
        assert_eq!(FieldType::from_tag("string"), Some(FieldType::Str));
        assert_eq!(FieldType::from_tag("varchar"), None);
    }
}
