/*
 * Copyright (c) 2026.  The platterdb developers.
 * Please refer to the LICENSE file at the repository root for more information
 * about this project and its license.
 */

use crate::constants::FIELD_SUBHEADER_SIZE;
use crate::page::{read_ascii_int, write_ascii_int, PageError};
use crate::relation::Field;

use thiserror::Error;

/// How to treat a value longer than its fixed-width field.
///
/// Explicit inserts reject the record; CSV bulk loads truncate silently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overflow {
    Reject,
    Truncate,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("expected {expected} values, got {actual}")]
    FieldCountMismatch { expected: usize, actual: usize },

    #[error("value '{value}' exceeds the {size}-byte field '{field}'")]
    ValueTooLong {
        field: String,
        value: String,
        size: usize,
    },

    #[error("field value of {0} bytes cannot be encoded in a variable record")]
    ValueTooLongForSubHeader(usize),

    #[error(transparent)]
    Page(#[from] PageError),
}

/// Encode a fixed record: each value space-padded to its field width and
/// concatenated in schema order.
pub fn encode_fixed(
    fields: &[Field],
    values: &[String],
    overflow: Overflow,
) -> Result<Vec<u8>, RecordError> {
    if values.len() != fields.len() {
        return Err(RecordError::FieldCountMismatch {
            expected: fields.len(),
            actual: values.len(),
        });
    }

    let mut record = Vec::with_capacity(fields.iter().map(|f| f.size.max(0) as usize).sum());
    for (field, value) in fields.iter().zip(values) {
        let size = field.size.max(0) as usize;
        let value = value.trim();
        if value.len() > size && overflow == Overflow::Reject {
            return Err(RecordError::ValueTooLong {
                field: field.name.clone(),
                value: value.to_string(),
                size,
            });
        }
        let mut bytes = value.as_bytes().to_vec();
        bytes.truncate(size);
        bytes.resize(size, b' ');
        record.extend_from_slice(&bytes);
    }
    Ok(record)
}

/// Decode a fixed record into trimmed per-field values.
pub fn decode_fixed(fields: &[Field], record: &[u8]) -> Vec<String> {
    let mut values = Vec::with_capacity(fields.len());
    let mut offset = 0;
    for field in fields {
        let size = field.size.max(0) as usize;
        let raw = &record[offset..offset + size];
        values.push(String::from_utf8_lossy(raw).trim().to_string());
        offset += size;
    }
    values
}

/// Encode a variable record: a sub-header of one 3-character (offset,
/// length) pair per field, then the trimmed field values concatenated.
pub fn encode_var(fields: &[Field], values: &[String]) -> Result<Vec<u8>, RecordError> {
    if values.len() != fields.len() {
        return Err(RecordError::FieldCountMismatch {
            expected: fields.len(),
            actual: values.len(),
        });
    }

    let trimmed: Vec<&str> = values.iter().map(|v| v.trim()).collect();
    let header_size = fields.len() * FIELD_SUBHEADER_SIZE;
    let payload: usize = trimmed.iter().map(|v| v.len()).sum();
    let mut record = vec![0u8; header_size + payload];

    let mut relative = 0usize;
    for (i, value) in trimmed.iter().enumerate() {
        if value.len() > 999 || relative > 999 {
            return Err(RecordError::ValueTooLongForSubHeader(value.len().max(relative)));
        }
        let entry = i * FIELD_SUBHEADER_SIZE;
        write_ascii_int(&mut record, entry, 3, relative as i32)?;
        write_ascii_int(&mut record, entry + 3, 3, value.len() as i32)?;
        let start = header_size + relative;
        record[start..start + value.len()].copy_from_slice(value.as_bytes());
        relative += value.len();
    }
    Ok(record)
}

/// Decode a variable record into trimmed per-field values.
pub fn decode_var(fields: &[Field], record: &[u8]) -> Result<Vec<String>, RecordError> {
    let header_size = fields.len() * FIELD_SUBHEADER_SIZE;
    let mut values = Vec::with_capacity(fields.len());
    for i in 0..fields.len() {
        let entry = i * FIELD_SUBHEADER_SIZE;
        let relative = read_ascii_int(record, entry, 3)?;
        let length = read_ascii_int(record, entry + 3, 3)?;
        let start = header_size + relative.max(0) as usize;
        let end = start + length.max(0) as usize;
        if end > record.len() {
            return Err(RecordError::Page(PageError::OutOfBounds {
                offset: end,
                len: record.len(),
            }));
        }
        values.push(String::from_utf8_lossy(&record[start..end]).trim().to_string());
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::FieldType;

    fn fixed_fields() -> Vec<Field> {
        vec![
            Field::new("id", FieldType::Str, 4),
            Field::new("name", FieldType::Str, 8),
            Field::new("age", FieldType::Int, 2),
        ]
    }

    fn var_fields() -> Vec<Field> {
        vec![
            Field::new("id", FieldType::Str, -1),
            Field::new("bio", FieldType::Str, -1),
        ]
    }

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fixed_round_trip() {
        let fields = fixed_fields();
        let record = encode_fixed(&fields, &values(&["0001", "Alice", "30"]), Overflow::Reject)
            .unwrap();
        assert_eq!(record, b"0001Alice   30");
        assert_eq!(
            decode_fixed(&fields, &record),
            values(&["0001", "Alice", "30"])
        );
    }

    #[test]
    fn test_fixed_overflow_rejected() {
        let fields = fixed_fields();
        let err = encode_fixed(
            &fields,
            &values(&["0001", "Maximiliano", "30"]),
            Overflow::Reject,
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::ValueTooLong { .. }));
    }

    #[test]
    fn test_fixed_overflow_truncated_on_load() {
        let fields = fixed_fields();
        let record = encode_fixed(
            &fields,
            &values(&["0001", "Maximiliano", "30"]),
            Overflow::Truncate,
        )
        .unwrap();
        assert_eq!(record, b"0001Maximili30");
    }

    #[test]
    fn test_fixed_field_count_checked() {
        let fields = fixed_fields();
        assert!(matches!(
            encode_fixed(&fields, &values(&["0001"]), Overflow::Reject),
            Err(RecordError::FieldCountMismatch { .. })
        ));
    }

    #[test]
    fn test_var_round_trip() {
        let fields = var_fields();
        let record = encode_var(&fields, &values(&["7", "likes storage engines"])).unwrap();
        // Sub-header: (000, 001) and (001, 021).
        assert_eq!(&record[..12], b"000001001021");
        assert_eq!(
            decode_var(&fields, &record).unwrap(),
            values(&["7", "likes storage engines"])
        );
    }

    #[test]
    fn test_var_trims_before_encoding() {
        let fields = var_fields();
        let record = encode_var(&fields, &values(&["  7 ", " x "])).unwrap();
        assert_eq!(decode_var(&fields, &record).unwrap(), values(&["7", "x"]));
    }

    #[test]
    fn test_var_decode_rejects_short_record() {
        let fields = var_fields();
        let mut record = encode_var(&fields, &values(&["abc", "def"])).unwrap();
        record.truncate(record.len() - 2);
        assert!(decode_var(&fields, &record).is_err());
    }
}
