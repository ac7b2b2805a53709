// src/parsers/fields.rs

use std::collections::HashMap;

/// A single typed field value. Coercion happens once, at the parse
/// boundary; a field the source marked empty has no entry at all.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

pub type FieldMap = HashMap<String, FieldValue>;

/// Attempts to cast numbers in a raw capture map to ints or floats.
///
/// Per field: `-` means "no value" and the field is omitted; a value with a
/// decimal point is tried as a float (so `10.5` never lands as an integer)
/// and kept as text when that fails (`10.0.0.1`); everything else is tried
/// as an integer, then kept as text.
pub fn typeify(raw: &HashMap<&str, &str>) -> FieldMap {
    let mut map = FieldMap::with_capacity(raw.len());
    for (&key, &value) in raw {
        if value == "-" {
            continue;
        }
        let typed = if value.contains('.') {
            match value.parse::<f64>() {
                Ok(f) => FieldValue::Float(f),
                Err(_) => FieldValue::Text(value.to_string()),
            }
        } else if let Ok(i) = value.parse::<i64>() {
            FieldValue::Integer(i)
        } else {
            FieldValue::Text(value.to_string())
        };
        map.insert(key.to_string(), typed);
    }
    map
}
