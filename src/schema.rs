// Schema sanitization for tool declarations
//
// Gemini's OpenAI-compatibility layer validates tool parameter schemas
// against a restricted dialect: no $ref resolution, no combinators, and
// a short whitelist of constraint keywords. Anything outside that set is
// a hard request rejection, so we strip unsupported vocabulary before
// forwarding rather than letting the upstream 400 the whole request.
//
// The transform is pure: it builds a new tree and never mutates the
// input, which also makes it trivially idempotent - every rule is a
// deletion or a canonicalizing rewrite, never an addition a second pass
// would re-trigger.

use serde_json::{Map, Value};

/// Schema-metadata and reference keys the upstream has no resolver for.
const REFERENCE_KEYS: &[&str] = &["$ref", "$schema", "$id", "$defs", "definitions"];

/// Combinator keys the upstream rejects outright. Dropping these can lose
/// legitimate constraints, but the alternative is a hard rejection of the
/// whole request.
const COMBINATOR_KEYS: &[&str] = &["anyOf", "oneOf", "allOf", "not"];

/// Constraint and structural keys outside the upstream's whitelist.
const UNSUPPORTED_KEYS: &[&str] = &[
    "exclusiveMinimum",
    "exclusiveMaximum",
    "const",
    "contentEncoding",
    "contentMediaType",
    "prefixItems",
    "contains",
    "minContains",
    "maxContains",
    "propertyNames",
    "patternProperties",
    "dependentSchemas",
    "dependentRequired",
];

/// Numeric constraint keys that are only valid on numeric types.
const NUMERIC_KEYS: &[&str] = &["minimum", "maximum", "multipleOf"];

/// Sanitize a JSON-Schema fragment into the upstream's restricted dialect.
///
/// Total over arbitrary JSON: scalars, arrays, and null pass through;
/// objects are rewritten key by key and recursed into. Never panics,
/// never mutates the input.
pub fn sanitize(node: &Value) -> Value {
    match node {
        Value::Object(obj) => sanitize_object(obj),
        // Arrays only appear inside keys we recurse into explicitly
        // (properties/items), so a bare array passes through untouched.
        other => other.clone(),
    }
}

fn sanitize_object(obj: &Map<String, Value>) -> Value {
    let mut out = Map::new();

    for (key, value) in obj {
        if REFERENCE_KEYS.contains(&key.as_str())
            || COMBINATOR_KEYS.contains(&key.as_str())
            || UNSUPPORTED_KEYS.contains(&key.as_str())
        {
            continue;
        }

        match key.as_str() {
            // Only two format values survive the upstream's validator.
            "format" => {
                if matches!(value.as_str(), Some("enum") | Some("date-time")) {
                    out.insert(key.clone(), value.clone());
                }
            }
            // Type arrays collapse to a scalar type plus nullable.
            "type" => match value {
                Value::Array(types) => {
                    let has_null = types.iter().any(|t| t.as_str() == Some("null"));
                    let first_non_null = types
                        .iter()
                        .filter_map(|t| t.as_str())
                        .find(|t| *t != "null");
                    match first_non_null {
                        Some(scalar) => {
                            out.insert("type".to_string(), Value::String(scalar.to_string()));
                            if has_null {
                                out.insert("nullable".to_string(), Value::Bool(true));
                            }
                        }
                        // Never leave a node typeless: an all-null (or
                        // empty) type array falls back to plain string.
                        None => {
                            out.insert("type".to_string(), Value::String("string".to_string()));
                        }
                    }
                }
                other => {
                    out.insert(key.clone(), other.clone());
                }
            },
            // `false` means "closed object", which the upstream does not
            // support reliably - treat as unspecified. An object-valued
            // additionalProperties is itself a schema and gets recursed.
            "additionalProperties" => match value {
                Value::Bool(false) => {}
                Value::Object(_) => {
                    out.insert(key.clone(), sanitize(value));
                }
                other => {
                    out.insert(key.clone(), other.clone());
                }
            },
            // Schema generators routinely emit `required: []`.
            "required" => {
                if value.as_array().map(|a| !a.is_empty()).unwrap_or(true) {
                    out.insert(key.clone(), value.clone());
                }
            }
            "properties" => match value {
                Value::Object(props) => {
                    let props: Map<String, Value> = props
                        .iter()
                        .map(|(name, schema)| (name.clone(), sanitize(schema)))
                        .collect();
                    out.insert(key.clone(), Value::Object(props));
                }
                other => {
                    out.insert(key.clone(), other.clone());
                }
            },
            "items" => {
                // Tuple-typed items (an array of schemas) is unsupported;
                // only a single schema is recursed.
                match value {
                    Value::Object(_) => {
                        out.insert(key.clone(), sanitize(value));
                    }
                    Value::Array(_) => {}
                    other => {
                        out.insert(key.clone(), other.clone());
                    }
                }
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }

    // Numeric bounds are only meaningful (and only accepted) on numeric
    // types, and the collapsed `type` above is what the upstream sees.
    let is_numeric = matches!(
        out.get("type").and_then(|t| t.as_str()),
        Some("number") | Some("integer")
    );
    if !is_numeric {
        for key in NUMERIC_KEYS {
            out.remove(*key);
        }
    }

    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(sanitize(&json!(null)), json!(null));
        assert_eq!(sanitize(&json!(42)), json!(42));
        assert_eq!(sanitize(&json!("text")), json!("text"));
        assert_eq!(sanitize(&json!(true)), json!(true));
    }

    #[test]
    fn test_reference_keys_dropped() {
        let schema = json!({
            "$ref": "#/definitions/foo",
            "$schema": "http://json-schema.org/draft-07/schema#",
            "$id": "https://example.com/schema",
            "definitions": {"foo": {"type": "string"}},
            "$defs": {"bar": {"type": "number"}}
        });
        assert_eq!(sanitize(&schema), json!({}));
    }

    #[test]
    fn test_combinators_dropped() {
        let schema = json!({
            "anyOf": [{"type": "string"}],
            "oneOf": [{"type": "number"}],
            "allOf": [{"type": "object"}],
            "not": {"type": "null"}
        });
        assert_eq!(sanitize(&schema), json!({}));
    }

    #[test]
    fn test_unsupported_constraints_dropped() {
        let schema = json!({
            "type": "object",
            "exclusiveMinimum": 0,
            "exclusiveMaximum": 10,
            "const": "fixed",
            "contentEncoding": "base64",
            "contentMediaType": "image/png",
            "prefixItems": [{"type": "string"}],
            "contains": {"type": "number"},
            "minContains": 1,
            "maxContains": 3,
            "propertyNames": {"pattern": "^[a-z]+$"},
            "patternProperties": {"^x-": {}},
            "dependentSchemas": {},
            "dependentRequired": {}
        });
        assert_eq!(sanitize(&schema), json!({"type": "object"}));
    }

    #[test]
    fn test_format_whitelist() {
        assert_eq!(
            sanitize(&json!({"type": "string", "format": "date-time"})),
            json!({"type": "string", "format": "date-time"})
        );
        assert_eq!(
            sanitize(&json!({"type": "string", "format": "enum"})),
            json!({"type": "string", "format": "enum"})
        );
        assert_eq!(
            sanitize(&json!({"type": "string", "format": "uri"})),
            json!({"type": "string"})
        );
    }

    #[test]
    fn test_type_array_collapses_with_nullable() {
        assert_eq!(
            sanitize(&json!({"type": ["string", "null"]})),
            json!({"type": "string", "nullable": true})
        );
        assert_eq!(
            sanitize(&json!({"type": ["null", "integer"]})),
            json!({"type": "integer", "nullable": true})
        );
    }

    #[test]
    fn test_type_array_all_null_falls_back_to_string() {
        assert_eq!(sanitize(&json!({"type": ["null"]})), json!({"type": "string"}));
        assert_eq!(sanitize(&json!({"type": []})), json!({"type": "string"}));
    }

    #[test]
    fn test_additional_properties_false_dropped() {
        assert_eq!(
            sanitize(&json!({"type": "object", "additionalProperties": false})),
            json!({"type": "object"})
        );
        // `true` is meaningless but harmless, passes through
        assert_eq!(
            sanitize(&json!({"additionalProperties": true})),
            json!({"additionalProperties": true})
        );
    }

    #[test]
    fn test_additional_properties_schema_recursed() {
        let schema = json!({
            "type": "object",
            "additionalProperties": {"type": "string", "const": "x"}
        });
        assert_eq!(
            sanitize(&schema),
            json!({"type": "object", "additionalProperties": {"type": "string"}})
        );
    }

    #[test]
    fn test_empty_required_dropped() {
        assert_eq!(sanitize(&json!({"type": "object", "required": []})), json!({"type": "object"}));
        assert_eq!(
            sanitize(&json!({"required": ["name"]})),
            json!({"required": ["name"]})
        );
    }

    #[test]
    fn test_numeric_bounds_only_on_numeric_types() {
        assert_eq!(
            sanitize(&json!({"type": "integer", "minimum": 0, "maximum": 10})),
            json!({"type": "integer", "minimum": 0, "maximum": 10})
        );
        assert_eq!(
            sanitize(&json!({"type": "number", "multipleOf": 0.5})),
            json!({"type": "number", "multipleOf": 0.5})
        );
        assert_eq!(
            sanitize(&json!({"type": "string", "minimum": 1})),
            json!({"type": "string"})
        );
        // No type at all: bounds dropped too
        assert_eq!(sanitize(&json!({"minimum": 1})), json!({}));
    }

    #[test]
    fn test_recursion_into_properties_and_items() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": ["string", "null"], "format": "hostname"},
                "tags": {
                    "type": "array",
                    "items": {"type": "string", "const": "tag"}
                }
            }
        });
        let expected = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "nullable": true},
                "tags": {
                    "type": "array",
                    "items": {"type": "string"}
                }
            }
        });
        assert_eq!(sanitize(&schema), expected);
    }

    #[test]
    fn test_tuple_items_dropped() {
        let schema = json!({
            "type": "array",
            "items": [{"type": "string"}, {"type": "number"}]
        });
        assert_eq!(sanitize(&schema), json!({"type": "array"}));
    }

    #[test]
    fn test_deeply_nested_self_referential_shape() {
        // A tree-of-nodes schema that references itself via $ref; every
        // level must come out clean.
        let schema = json!({
            "type": "object",
            "properties": {
                "value": {"type": ["number", "null"], "exclusiveMinimum": 0},
                "children": {
                    "type": "array",
                    "items": {"$ref": "#"}
                }
            },
            "additionalProperties": false
        });
        let expected = json!({
            "type": "object",
            "properties": {
                "value": {"type": "number", "nullable": true},
                "children": {
                    "type": "array",
                    "items": {}
                }
            }
        });
        assert_eq!(sanitize(&schema), expected);
    }

    #[test]
    fn test_idempotent() {
        let schemas = [
            json!({"type": ["string", "null"], "format": "uuid", "anyOf": []}),
            json!({"type": "object", "properties": {"a": {"$ref": "#"}}, "required": []}),
            json!({"type": ["null"], "minimum": 3}),
            json!({"additionalProperties": false, "items": {"const": 1}}),
            json!(null),
            json!([1, 2, 3]),
        ];
        for schema in &schemas {
            let once = sanitize(schema);
            let twice = sanitize(&once);
            assert_eq!(once, twice, "sanitize not idempotent for {schema}");
        }
    }

    #[test]
    fn test_input_not_mutated() {
        let schema = json!({"type": ["string", "null"], "anyOf": []});
        let before = schema.clone();
        let _ = sanitize(&schema);
        assert_eq!(schema, before);
    }
}
