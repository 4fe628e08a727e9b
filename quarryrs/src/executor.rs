//! Query results and DuckDB value conversion.

use duckdb::types::Value as DuckValue;
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
}

/// Result set of one preview or query: ordered columns plus rows as JSON
/// maps, so text and JSON rendering share one representation.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Map<String, Value>>,
}

/// Convert a DuckDB value into JSON, preserving numeric typing: integer
/// columns become JSON integers, floats keep their fractional digits, and
/// DECIMAL goes through f64 so `3.0` stays `3.0` rather than `"3.0"`.
pub(crate) fn value_to_json(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::from(i),
        DuckValue::SmallInt(i) => Value::from(i),
        DuckValue::Int(i) => Value::from(i),
        DuckValue::BigInt(i) => Value::from(i),
        DuckValue::HugeInt(i) => Value::String(i.to_string()),
        DuckValue::UHugeInt(i) => Value::String(i.to_string()),
        DuckValue::UTinyInt(i) => Value::from(i),
        DuckValue::USmallInt(i) => Value::from(i),
        DuckValue::UInt(i) => Value::from(i),
        DuckValue::UBigInt(i) => Value::from(i),
        DuckValue::Float(f) => Value::from(f),
        DuckValue::Double(f) => Value::from(f),
        DuckValue::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(d.to_string())),
        DuckValue::Timestamp(unit, t) => Value::String(format!("{t} ({unit:?})")),
        DuckValue::Text(s) => Value::String(s),
        DuckValue::Blob(bytes) => Value::String(hex::encode(bytes)),
        DuckValue::Geometry(bytes) => Value::String(hex::encode(bytes)),
        DuckValue::Date32(d) => Value::from(d),
        DuckValue::Time64(unit, t) => Value::String(format!("{t} ({unit:?})")),
        DuckValue::Interval {
            months,
            days,
            nanos,
        } => Value::String(format!("{months} months {days} days {nanos} nanos")),
        DuckValue::List(items) => Value::Array(items.into_iter().map(value_to_json).collect()),
        DuckValue::Enum(s) => Value::String(s),
        DuckValue::Struct(fields) => {
            let mut map = Map::new();
            for (key, val) in fields.iter() {
                map.insert(key.clone(), value_to_json(val.clone()));
            }
            Value::Object(map)
        }
        DuckValue::Array(items) => Value::Array(items.into_iter().map(value_to_json).collect()),
        DuckValue::Map(entries) => {
            let pairs: Vec<Value> = entries
                .iter()
                .map(|(k, v)| {
                    Value::Array(vec![value_to_json(k.clone()), value_to_json(v.clone())])
                })
                .collect();
            Value::Array(pairs)
        }
        DuckValue::Union(inner) => value_to_json(*inner),
        // `Value` is #[non_exhaustive]; render variants added by future
        // duckdb releases through their Debug form.
        other => Value::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_values_have_no_fraction() {
        assert_eq!(value_to_json(DuckValue::Int(5)).to_string(), "5");
        assert_eq!(value_to_json(DuckValue::BigInt(1)).to_string(), "1");
    }

    #[test]
    fn test_float_values_keep_fraction() {
        assert_eq!(value_to_json(DuckValue::Double(3.0)).to_string(), "3.0");
        assert_eq!(value_to_json(DuckValue::Double(4.3)).to_string(), "4.3");
    }

    #[test]
    fn test_null_maps_to_json_null() {
        assert!(value_to_json(DuckValue::Null).is_null());
    }
}
