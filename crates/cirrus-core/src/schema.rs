//! JSON schema construction for filter and action option blocks.

use serde_json::{json, Map, Value};

/// Build the schema for one filter or action block.
///
/// The block must carry `type: <type_name>`; `properties` lists the other
/// accepted keys and `required` the mandatory ones. Unknown keys are
/// rejected.
pub fn type_schema(type_name: &str, properties: Value, required: &[&str]) -> Value {
    let mut props = Map::new();
    props.insert("type".to_string(), json!({ "enum": [type_name] }));
    if let Value::Object(extra) = properties {
        props.extend(extra);
    }

    let mut req = vec![Value::String("type".to_string())];
    req.extend(required.iter().map(|r| Value::String(r.to_string())));

    json!({
        "type": "object",
        "additionalProperties": false,
        "required": req,
        "properties": props,
    })
}

/// The comparison operators accepted by count-style filters.
pub fn comparison_operators() -> Value {
    json!({ "enum": ["eq", "equal", "ne", "not-equal", "gt", "greater-than", "gte", "ge",
                     "lt", "less-than", "lte", "le"] })
}

/// Properties shared by every value-style filter.
pub fn value_properties() -> Value {
    json!({
        "key": { "type": "string" },
        "value": {},
        "op": { "enum": ["eq", "equal", "ne", "not-equal", "gt", "greater-than", "gte", "ge",
                         "lt", "less-than", "lte", "le", "in", "not-in", "ni", "contains"] },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_schema_requires_type_and_listed_keys() {
        let schema = type_schema("tag", json!({ "key": { "type": "string" } }), &["key"]);
        assert_eq!(schema["required"], json!(["type", "key"]));
        assert_eq!(schema["properties"]["type"], json!({ "enum": ["tag"] }));
        assert_eq!(schema["additionalProperties"], json!(false));
    }
}
