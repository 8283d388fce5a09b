//! HTTP → RPC request decoding.
//!
//! # Data Flow
//! ```text
//! JSON body (per body mapping)  ─┐
//! query string                  ─┼→ merged message (proto field names)
//! path parameters               ─┘     → required check, zero-value fill
//! ```
//!
//! Later sources overwrite earlier ones, so path beats query beats body.
//! The result is a JSON object keyed by proto names that deserializes
//! directly into the prost message type.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use serde_json::{Map, Number, Value};

use crate::contract::{BodyMapping, FieldDescriptor, FieldKind, MessageSchema};
use crate::routing::MethodBinding;
use crate::translate::TranslateError;

/// Build the request message for a resolved binding.
pub fn decode_request(
    binding: &MethodBinding,
    params: &[(String, String)],
    query: Option<&str>,
    body: &[u8],
) -> Result<Value, TranslateError> {
    let schema = binding.rpc_method.request;
    let mut message = Map::new();

    match binding.body {
        BodyMapping::None => {}
        BodyMapping::Whole => {
            let value = parse_body(body)?.unwrap_or_else(|| Value::Object(Map::new()));
            let Value::Object(object) = value else {
                return Err(TranslateError::BodyNotObject);
            };
            merge_object(schema, &mut message, object, "")?;
        }
        BodyMapping::Field(name) => {
            if let (Some(field), Some(value)) = (schema.field(name), parse_body(body)?) {
                if let Some(decoded) = decode_value(field, value, field.name)? {
                    message.insert(field.name.to_string(), decoded);
                }
            }
        }
    }

    if let Some(query) = query {
        for (key, raw) in parse_query(query)? {
            if params.iter().any(|(bound, _)| *bound == key) {
                continue;
            }
            match schema.field_path(&key) {
                Some(field) if field.kind.is_scalar() => {
                    set_path(schema, &mut message, &key, &raw, &key)?;
                }
                _ => tracing::trace!(key = %key, "Ignoring unknown query parameter"),
            }
        }
    }

    for (path, raw) in params {
        set_path(schema, &mut message, path, raw, path)?;
    }

    finalize(schema, &mut message, "")?;
    Ok(Value::Object(message))
}

/// Decode a JSON object that uses proto or JSON field names into the
/// canonical proto-named form, with zero values filled in.
#[cfg(test)]
pub(crate) fn decode_message(schema: &MessageSchema, value: Value) -> Result<Value, TranslateError> {
    let Value::Object(object) = value else {
        return Err(TranslateError::BodyNotObject);
    };
    let mut message = Map::new();
    merge_object(schema, &mut message, object, "")?;
    finalize(schema, &mut message, "")?;
    Ok(Value::Object(message))
}

/// `application/x-www-form-urlencoded` pairs. Values that do not decode
/// to UTF-8 are rejected rather than repaired.
fn parse_query(query: &str) -> Result<Vec<(String, String)>, TranslateError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key, key)?;
            let value = decode_component(value, &key)?;
            Ok((key, value))
        })
        .collect()
}

fn decode_component(raw: &str, field: &str) -> Result<String, TranslateError> {
    let spaced: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| TranslateError::InvalidValue {
            field: field.to_string(),
            expected: "utf-8 text",
            value: raw.to_string(),
        })
}

fn parse_body(body: &[u8]) -> Result<Option<Value>, TranslateError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(err) => Err(TranslateError::InvalidJson(err.to_string())),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn merge_object(
    schema: &MessageSchema,
    target: &mut Map<String, Value>,
    object: Map<String, Value>,
    prefix: &str,
) -> Result<(), TranslateError> {
    for (key, value) in object {
        let Some(field) = schema.field(&key) else {
            tracing::trace!(field = %join(prefix, &key), "Ignoring unknown field");
            continue;
        };
        let path = join(prefix, field.name);
        match decode_value(field, value, &path)? {
            Some(decoded) => {
                target.insert(field.name.to_string(), decoded);
            }
            None => {
                target.remove(field.name);
            }
        }
    }
    Ok(())
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(field: &FieldDescriptor, path: &str, value: &Value) -> TranslateError {
    TranslateError::TypeMismatch {
        field: path.to_string(),
        expected: field.kind.type_name(),
        found: json_type(value),
    }
}

fn invalid(field: &FieldDescriptor, path: &str, value: impl ToString) -> TranslateError {
    TranslateError::InvalidValue {
        field: path.to_string(),
        expected: field.kind.type_name(),
        value: value.to_string(),
    }
}

/// Integer value of a JSON number; `1.0` and `1e2` count as integers.
fn integral(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
        .or_else(|| n.as_f64().and_then(integral_float))
}

fn integral_float(f: f64) -> Option<i128> {
    // Anything past 2^64 is out of range for every integer field anyway.
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 2f64.powi(64)).then_some(f as i128)
}

fn integer_in<T>(field: &FieldDescriptor, path: &str, value: &Value) -> Result<Value, TranslateError>
where
    T: TryFrom<i128> + Into<Number> + std::str::FromStr,
{
    let parsed: Option<T> = match value {
        Value::Number(n) => integral(n).and_then(|n| T::try_from(n).ok()),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<T>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .and_then(integral_float)
                    .and_then(|n| T::try_from(n).ok())
            })
        }
        other => return Err(mismatch(field, path, other)),
    };
    parsed
        .map(|n| Value::Number(n.into()))
        .ok_or_else(|| invalid(field, path, value))
}

/// Strictly decode one JSON value against its field type.
/// Returns `None` for `null` (absent).
fn decode_value(
    field: &FieldDescriptor,
    value: Value,
    path: &str,
) -> Result<Option<Value>, TranslateError> {
    if value.is_null() {
        return Ok(None);
    }
    let decoded = match field.kind {
        FieldKind::String => match value {
            Value::String(_) => value,
            other => return Err(mismatch(field, path, &other)),
        },
        FieldKind::Bool => match value {
            Value::Bool(_) => value,
            other => return Err(mismatch(field, path, &other)),
        },
        FieldKind::Int32 => integer_in::<i32>(field, path, &value)?,
        FieldKind::Int64 => integer_in::<i64>(field, path, &value)?,
        FieldKind::UInt32 => integer_in::<u32>(field, path, &value)?,
        FieldKind::UInt64 => integer_in::<u64>(field, path, &value)?,
        FieldKind::Double => {
            let parsed = match &value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                other => return Err(mismatch(field, path, other)),
            };
            parsed
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid(field, path, &value))?
        }
        FieldKind::Message(nested) => match value {
            Value::Object(object) => {
                let mut inner = Map::new();
                merge_object(nested, &mut inner, object, path)?;
                Value::Object(inner)
            }
            other => return Err(mismatch(field, path, &other)),
        },
    };
    Ok(Some(decoded))
}

/// Coerce a path or query string to the field's type.
fn coerce(field: &FieldDescriptor, raw: &str, path: &str) -> Result<Value, TranslateError> {
    match field.kind {
        FieldKind::String => Ok(Value::String(raw.to_string())),
        FieldKind::Bool => match raw {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid(field, path, raw)),
        },
        FieldKind::Message(_) => Err(TranslateError::TypeMismatch {
            field: path.to_string(),
            expected: field.kind.type_name(),
            found: "string",
        }),
        _ => decode_value(field, Value::String(raw.to_string()), path)?
            .ok_or_else(|| invalid(field, path, raw)),
    }
}

fn set_path(
    schema: &MessageSchema,
    target: &mut Map<String, Value>,
    path: &str,
    raw: &str,
    full_path: &str,
) -> Result<(), TranslateError> {
    match path.split_once('.') {
        None => {
            if let Some(field) = schema.field(path) {
                target.insert(field.name.to_string(), coerce(field, raw, full_path)?);
            }
            Ok(())
        }
        Some((head, rest)) => {
            let Some(field) = schema.field(head) else {
                return Ok(());
            };
            let FieldKind::Message(nested) = field.kind else {
                return Ok(());
            };
            let entry = target
                .entry(field.name.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            match entry {
                Value::Object(inner) => set_path(nested, inner, rest, raw, full_path),
                _ => Ok(()),
            }
        }
    }
}

fn zero_value(kind: FieldKind) -> Option<Value> {
    match kind {
        FieldKind::String => Some(Value::String(String::new())),
        FieldKind::Bool => Some(Value::Bool(false)),
        FieldKind::Int32 | FieldKind::Int64 | FieldKind::UInt32 | FieldKind::UInt64 => {
            Some(Value::Number(0.into()))
        }
        FieldKind::Double => Number::from_f64(0.0).map(Value::Number),
        FieldKind::Message(_) => None,
    }
}

/// Check required fields and fill zero values for the rest.
fn finalize(
    schema: &MessageSchema,
    message: &mut Map<String, Value>,
    prefix: &str,
) -> Result<(), TranslateError> {
    for field in schema.fields {
        let path = join(prefix, field.name);
        if !message.contains_key(field.name) {
            if field.required {
                return Err(TranslateError::MissingField(path));
            }
            if let Some(zero) = zero_value(field.kind) {
                message.insert(field.name.to_string(), zero);
            }
            continue;
        }
        if let (FieldKind::Message(nested), Some(Value::Object(inner))) =
            (field.kind, message.get_mut(field.name))
        {
            finalize(nested, inner, &path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::example::{ExampleRequest, EXAMPLE_SERVICE};
    use crate::contract::{FieldDescriptor, HttpRule, MethodDescriptor, ServiceDescriptor};
    use crate::routing::RoutingTable;
    use axum::http::Method;
    use serde_json::json;

    static FILTER: MessageSchema = MessageSchema {
        name: "test.Filter",
        fields: &[
            FieldDescriptor::optional("min_score", "minScore", FieldKind::Double),
            FieldDescriptor::optional("owner_id", "ownerId", FieldKind::UInt64),
        ],
    };

    static LIST_REQUEST: MessageSchema = MessageSchema {
        name: "test.ListRequest",
        fields: &[
            FieldDescriptor::required("shelf", "shelf", FieldKind::String),
            FieldDescriptor::optional("page_size", "pageSize", FieldKind::Int32),
            FieldDescriptor::optional("total", "total", FieldKind::Int64),
            FieldDescriptor::optional("deep", "deep", FieldKind::Bool),
            FieldDescriptor::optional("filter", "filter", FieldKind::Message(&FILTER)),
        ],
    };

    static LIST_RESPONSE: MessageSchema = MessageSchema {
        name: "test.ListResponse",
        fields: &[],
    };

    static SHELVES: ServiceDescriptor = ServiceDescriptor {
        package: "test.v1",
        name: "Shelves",
        methods: &[
            MethodDescriptor {
                name: "List",
                request: &LIST_REQUEST,
                response: &LIST_RESPONSE,
                http: &[HttpRule::get("/v1/shelves/{shelf}/books")],
            },
            MethodDescriptor {
                name: "Search",
                request: &LIST_REQUEST,
                response: &LIST_RESPONSE,
                http: &[HttpRule::post("/v1/shelves/{shelf}/search", BodyMapping::Field("filter"))],
            },
            MethodDescriptor {
                name: "Create",
                request: &LIST_REQUEST,
                response: &LIST_RESPONSE,
                http: &[HttpRule::post("/v1/shelves", BodyMapping::Whole)],
            },
        ],
    };

    fn decode(
        service: &'static ServiceDescriptor,
        method: Method,
        path: &str,
        query: Option<&str>,
        body: &str,
    ) -> Result<Value, TranslateError> {
        let table = RoutingTable::build(service).unwrap();
        let found = table.resolve(&method, path).unwrap();
        decode_request(found.binding, &found.params, query, body.as_bytes())
    }

    #[test]
    fn test_whole_body_becomes_message() {
        let value = decode(&EXAMPLE_SERVICE, Method::POST, "/v1/greet", None, r#"{"name":"Ada"}"#)
            .unwrap();
        let request: ExampleRequest = serde_json::from_value(value).unwrap();
        assert_eq!(request.name, "Ada");
    }

    #[test]
    fn test_path_param_becomes_message() {
        let value = decode(&EXAMPLE_SERVICE, Method::GET, "/v1/greet/Grace", None, "").unwrap();
        assert_eq!(value, json!({"name": "Grace"}));
    }

    #[test]
    fn test_wrong_json_type_is_rejected() {
        let err = decode(&EXAMPLE_SERVICE, Method::POST, "/v1/greet", None, r#"{"name":123}"#)
            .unwrap_err();
        assert_eq!(
            err,
            TranslateError::TypeMismatch {
                field: "name".into(),
                expected: "string",
                found: "number",
            }
        );
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let err =
            decode(&EXAMPLE_SERVICE, Method::POST, "/v1/greet", None, r#"{"name":"#).unwrap_err();
        assert!(matches!(err, TranslateError::InvalidJson(_)));

        let err = decode(&EXAMPLE_SERVICE, Method::POST, "/v1/greet", None, "[1,2]").unwrap_err();
        assert_eq!(err, TranslateError::BodyNotObject);
    }

    #[test]
    fn test_missing_required_field() {
        let err = decode(&EXAMPLE_SERVICE, Method::POST, "/v1/greet", None, "").unwrap_err();
        assert_eq!(err, TranslateError::MissingField("name".into()));

        let err = decode(&EXAMPLE_SERVICE, Method::POST, "/v1/greet", None, r#"{"name":null}"#)
            .unwrap_err();
        assert_eq!(err, TranslateError::MissingField("name".into()));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let value = decode(
            &EXAMPLE_SERVICE,
            Method::POST,
            "/v1/greet",
            None,
            r#"{"name":"Ada","mood":"cheerful"}"#,
        )
        .unwrap();
        assert_eq!(value, json!({"name": "Ada"}));
    }

    #[test]
    fn test_query_coercion_and_zero_fill() {
        let value = decode(
            &SHELVES,
            Method::GET,
            "/v1/shelves/fiction/books",
            Some("pageSize=10&total=9007199254740993&deep=1&filter.minScore=2.5&bogus=x"),
            "",
        )
        .unwrap();
        assert_eq!(
            value,
            json!({
                "shelf": "fiction",
                "page_size": 10,
                "total": 9007199254740993i64,
                "deep": true,
                "filter": {"min_score": 2.5, "owner_id": 0},
            })
        );
    }

    #[test]
    fn test_path_beats_query_beats_body() {
        let value = decode(
            &SHELVES,
            Method::POST,
            "/v1/shelves",
            Some("shelf=from-query&page_size=7"),
            r#"{"shelf":"from-body","pageSize":3,"deep":true}"#,
        )
        .unwrap();
        assert_eq!(value["shelf"], "from-query");
        assert_eq!(value["page_size"], 7);
        assert_eq!(value["deep"], true);

        let value = decode(
            &SHELVES,
            Method::GET,
            "/v1/shelves/from-path/books",
            Some("shelf=from-query"),
            "",
        )
        .unwrap();
        assert_eq!(value["shelf"], "from-path");
    }

    #[test]
    fn test_body_field_mapping() {
        let value = decode(
            &SHELVES,
            Method::POST,
            "/v1/shelves/poetry/search",
            None,
            r#"{"ownerId":"18446744073709551615"}"#,
        )
        .unwrap();
        assert_eq!(value["filter"]["owner_id"], json!(u64::MAX));
        assert_eq!(value["filter"]["min_score"], json!(0.0));
    }

    #[test]
    fn test_bad_query_value_is_rejected() {
        let err = decode(
            &SHELVES,
            Method::GET,
            "/v1/shelves/fiction/books",
            Some("pageSize=ten"),
            "",
        )
        .unwrap_err();
        assert!(matches!(err, TranslateError::InvalidValue { ref field, .. } if field == "pageSize"));
    }

    #[test]
    fn test_int32_overflow_is_rejected() {
        let err = decode(
            &SHELVES,
            Method::POST,
            "/v1/shelves",
            None,
            r#"{"shelf":"x","pageSize":4294967296}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TranslateError::InvalidValue { .. }));
    }

    #[test]
    fn test_integral_floats_are_integers() {
        let value = decode(
            &SHELVES,
            Method::POST,
            "/v1/shelves",
            None,
            r#"{"shelf":"x","pageSize":1e2,"total":3.0}"#,
        )
        .unwrap();
        assert_eq!(value["page_size"], 100);
        assert_eq!(value["total"], 3);

        let err = decode(
            &SHELVES,
            Method::POST,
            "/v1/shelves",
            None,
            r#"{"shelf":"x","pageSize":2.5}"#,
        )
        .unwrap_err();
        assert!(matches!(err, TranslateError::InvalidValue { ref field, .. } if field == "pageSize"));
    }

    #[test]
    fn test_query_must_be_utf8() {
        let err = decode(
            &SHELVES,
            Method::GET,
            "/v1/shelves/fiction/books",
            Some("pageSize=%FF"),
            "",
        )
        .unwrap_err();
        assert_eq!(
            err,
            TranslateError::InvalidValue {
                field: "pageSize".into(),
                expected: "utf-8 text",
                value: "%FF".into(),
            }
        );

        let value = decode(
            &SHELVES,
            Method::GET,
            "/v1/shelves/fiction/books",
            Some("filter.minScore=1%2E5&deep=true"),
            "",
        )
        .unwrap();
        assert_eq!(value["filter"]["min_score"], json!(1.5));
    }
}
