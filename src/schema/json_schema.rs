use serde_json::{json, Map, Value as JsonValue};

use crate::types::{DataType, Field, Schema};

/// JSON-schema property for a single field. Every column is nullable.
///
/// Columns whose type is still unknown are declared as nullable strings.
pub fn json_schema_for_field(field: &Field) -> JsonValue {
    match field.data_type {
        DataType::Int64 => json!({ "type": ["null", "integer"] }),
        DataType::Float64 => json!({ "type": ["null", "number"] }),
        DataType::Bool => json!({ "type": ["null", "boolean"] }),
        DataType::Date => json!({ "type": ["null", "string"], "format": "date" }),
        DataType::DateTime => json!({ "type": ["null", "string"], "format": "date-time" }),
        DataType::Time => json!({ "type": ["null", "string"], "format": "time" }),
        DataType::Utf8 | DataType::Unknown => json!({ "type": ["null", "string"] }),
    }
}

/// JSON-schema object describing a whole stream, with properties in column order.
pub fn json_schema_for_stream(schema: &Schema) -> JsonValue {
    let properties: Map<String, JsonValue> = schema
        .fields
        .iter()
        .map(|f| (f.name.clone(), json_schema_for_field(f)))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
    })
}
